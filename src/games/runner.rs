//! Task runner hosting one mini-game controller.
//!
//! Each controller is a plain state machine. The runner owns it inside a
//! tokio task, feeds it commands and ticks, publishes snapshots and forwards
//! shared game-state patches. Dropping the [`GameHandle`] aborts the task,
//! which drops every pending tick with it.

use std::time::Duration;

use rand::rngs::StdRng;
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time::{Instant, sleep_until},
};
use tracing::debug;

use crate::state::game_state::GameStatePatch;

const COMMAND_CAPACITY: usize = 16;

/// Reasons a controller refuses a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    /// The command does not apply to the current phase.
    #[error("`{command}` cannot be applied while {phase}")]
    InvalidCommand {
        /// Phase the controller was in.
        phase: &'static str,
        /// Rejected command.
        command: &'static str,
    },
    /// A pad index outside the grid.
    #[error("pad {0} does not exist")]
    PadOutOfRange(usize),
    /// The command is understood but cannot run with the current table.
    #[error("{0}")]
    Rejected(String),
    /// The controller task is gone.
    #[error("the game has been closed")]
    Stopped,
}

/// Everything a controller may touch while handling a command or a tick.
pub struct MachineContext<'a> {
    /// Clock reading for this step.
    pub now: Instant,
    /// Random source owned by the runner.
    pub rng: &'a mut StdRng,
    outbox: &'a mut Vec<GameStatePatch>,
}

impl<'a> MachineContext<'a> {
    /// Build a context around a clock reading, a random source and an outbox.
    pub fn new(now: Instant, rng: &'a mut StdRng, outbox: &'a mut Vec<GameStatePatch>) -> Self {
        Self { now, rng, outbox }
    }

    /// Queue a change for the room's shared game state.
    pub fn publish(&mut self, patch: GameStatePatch) {
        self.outbox.push(patch);
    }
}

/// A mini-game controller driven by commands and periodic ticks.
pub trait GameMachine: Send + 'static {
    /// User input understood by the controller.
    type Command: std::fmt::Debug + Send + 'static;
    /// Read model published after every step.
    type Snapshot: Clone + Send + Sync + 'static;

    /// Apply one command.
    fn handle(
        &mut self,
        command: Self::Command,
        ctx: &mut MachineContext<'_>,
    ) -> Result<(), GameError>;

    /// Advance animations and timers.
    fn tick(&mut self, ctx: &mut MachineContext<'_>);

    /// How often [`GameMachine::tick`] should run in the current phase.
    /// `None` means nothing is animating and no timer is pending.
    fn tick_interval(&self) -> Option<Duration>;

    /// Read model at `now`.
    fn snapshot(&self, now: Instant) -> Self::Snapshot;
}

type Reply<M> = oneshot::Sender<Result<<M as GameMachine>::Snapshot, GameError>>;

struct Envelope<M: GameMachine> {
    command: M::Command,
    reply: Reply<M>,
}

/// Cloneable access to a running controller.
pub struct GameClient<M: GameMachine> {
    commands: mpsc::Sender<Envelope<M>>,
    snapshots: watch::Receiver<M::Snapshot>,
}

impl<M: GameMachine> Clone for GameClient<M> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            snapshots: self.snapshots.clone(),
        }
    }
}

impl<M: GameMachine> GameClient<M> {
    /// Send a command and wait for the resulting snapshot.
    pub async fn send(&self, command: M::Command) -> Result<M::Snapshot, GameError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Envelope { command, reply })
            .await
            .map_err(|_| GameError::Stopped)?;
        response.await.map_err(|_| GameError::Stopped)?
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> M::Snapshot {
        self.snapshots.borrow().clone()
    }

    /// Watch every snapshot the controller publishes.
    pub fn subscribe(&self) -> watch::Receiver<M::Snapshot> {
        self.snapshots.clone()
    }
}

/// Owner of a running controller. Dropping it tears the controller down.
pub struct GameHandle<M: GameMachine> {
    client: GameClient<M>,
    task: JoinHandle<()>,
}

impl<M: GameMachine> GameHandle<M> {
    /// Cloneable client for commands and snapshots.
    pub fn client(&self) -> GameClient<M> {
        self.client.clone()
    }

    /// Whether the controller task has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Tear the controller down now.
    pub fn shutdown(self) {
        drop(self);
    }
}

impl<M: GameMachine> Drop for GameHandle<M> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn a controller task. Patches queued by the controller are forwarded
/// to `publisher` in the order they were produced.
pub fn spawn<M: GameMachine>(
    machine: M,
    rng: StdRng,
    publisher: Option<mpsc::UnboundedSender<GameStatePatch>>,
) -> GameHandle<M> {
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
    let (snapshots_tx, snapshots_rx) = watch::channel(machine.snapshot(Instant::now()));
    let task = tokio::spawn(run(machine, rng, commands_rx, snapshots_tx, publisher));

    GameHandle {
        client: GameClient {
            commands: commands_tx,
            snapshots: snapshots_rx,
        },
        task,
    }
}

async fn run<M: GameMachine>(
    mut machine: M,
    mut rng: StdRng,
    mut commands: mpsc::Receiver<Envelope<M>>,
    snapshots: watch::Sender<M::Snapshot>,
    publisher: Option<mpsc::UnboundedSender<GameStatePatch>>,
) {
    let mut outbox = Vec::new();
    let mut next_tick = machine.tick_interval().map(|every| Instant::now() + every);

    loop {
        tokio::select! {
            envelope = commands.recv() => {
                let Some(Envelope { command, reply }) = envelope else {
                    break;
                };
                let now = Instant::now();
                let mut ctx = MachineContext::new(now, &mut rng, &mut outbox);
                let result = machine
                    .handle(command, &mut ctx)
                    .map(|()| machine.snapshot(now));
                if let Ok(snapshot) = &result {
                    snapshots.send_replace(snapshot.clone());
                }
                let _ = reply.send(result);
                next_tick = reschedule(next_tick, machine.tick_interval(), now);
            }
            _ = wait_until(next_tick) => {
                let now = Instant::now();
                let mut ctx = MachineContext::new(now, &mut rng, &mut outbox);
                machine.tick(&mut ctx);
                snapshots.send_replace(machine.snapshot(now));
                next_tick = machine.tick_interval().map(|every| now + every);
            }
        }

        for patch in outbox.drain(..) {
            if let Some(publisher) = &publisher {
                if publisher.send(patch).is_err() {
                    debug!("game state publisher closed; dropping patch");
                }
            }
        }
    }

    debug!("game controller stopped");
}

/// Keep an already scheduled tick, start one if the machine just began
/// animating, or drop it when nothing is pending anymore.
fn reschedule(
    current: Option<Instant>,
    interval: Option<Duration>,
    now: Instant,
) -> Option<Instant> {
    match (current, interval) {
        (_, None) => None,
        (Some(at), Some(_)) => Some(at),
        (None, Some(every)) => Some(now + every),
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
