use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use utoipa::ToSchema;

use crate::{
    games::{
        countdown::{Countdown, Tick},
        roster::{Player, TurnOrder},
        runner::{GameError, GameMachine, MachineContext},
    },
    state::game_state::{GamePayload, GameStatePatch},
};

/// Length of one hot-seat round.
pub const ROUND_SECONDS: u32 = 30;
/// Number of fake dice frames before the starter is chosen.
pub const ROLL_TICKS: u32 = 12;
/// Delay between two dice frames.
pub const ROLL_TICK: Duration = Duration::from_millis(120);
/// Polling period of the round timer.
pub const TIMER_POLL: Duration = Duration::from_millis(200);

/// Phases of a hot-seat table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HotSeatPhase {
    /// Rolling the dice to pick who starts.
    Deciding,
    /// Waiting for a tap to start the timer.
    Ready,
    /// The player is being grilled.
    Running,
    /// Time is up; the table decides.
    Review,
}

impl HotSeatPhase {
    fn label(self) -> &'static str {
        match self {
            HotSeatPhase::Deciding => "deciding",
            HotSeatPhase::Ready => "ready",
            HotSeatPhase::Running => "running",
            HotSeatPhase::Review => "review",
        }
    }
}

/// Verdict after a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// The answers were good enough.
    Pass,
    /// The player owes the group a drink.
    Drink,
}

/// Input accepted by the hot-seat table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotSeatCommand {
    /// Roll again for a starter.
    Roll,
    /// Tap to launch the round timer.
    StartTimer,
    /// Restart the timer for the same player.
    ResetTimer,
    /// Close the round and pass the seat on.
    Resolve(Verdict),
}

/// Verdict given to a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerdictRecord {
    /// Player who was in the seat.
    pub player: Player,
    /// What the table decided.
    pub verdict: Verdict,
}

/// Read model of a hot-seat table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotSeatSnapshot {
    /// Current phase.
    pub phase: HotSeatPhase,
    /// Seats in turn order.
    pub seats: Vec<Player>,
    /// Index of the player in the seat (flickers while deciding).
    pub current_index: usize,
    /// Whole seconds left on the round timer.
    pub seconds_remaining: u32,
    /// Timer ring progress, 0 to 1.
    pub progress: f64,
    /// Verdict on the previous player.
    pub last_verdict: Option<VerdictRecord>,
}

/// Hot-seat controller: `deciding → ready → running → review → ready`.
#[derive(Debug, Clone)]
pub struct HotSeat {
    turns: TurnOrder,
    phase: HotSeatPhase,
    roll_ticks: u32,
    countdown: Countdown,
    last_verdict: Option<VerdictRecord>,
}

impl HotSeat {
    /// Seat the players and start rolling for a starter.
    pub fn new(players: &[Player]) -> Self {
        Self {
            turns: TurnOrder::new(players),
            phase: HotSeatPhase::Deciding,
            roll_ticks: 0,
            countdown: Countdown::new(ROUND_SECONDS),
            last_verdict: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> HotSeatPhase {
        self.phase
    }

    /// Player in the seat.
    pub fn current(&self) -> &Player {
        self.turns.current()
    }

    fn prepare_player(&mut self, index: usize, ctx: &mut MachineContext<'_>) {
        self.countdown.cancel();
        self.turns.set_current(index);
        self.phase = HotSeatPhase::Ready;

        let player_id = self.turns.current().id.clone();
        ctx.publish(
            GameStatePatch::turn(player_id.clone()).with_payload(GamePayload::HotSeat {
                player_id,
                last_verdict: self.last_verdict.as_ref().map(|record| record.verdict),
            }),
        );
    }

    fn invalid(&self, command: &'static str) -> GameError {
        GameError::InvalidCommand {
            phase: self.phase.label(),
            command,
        }
    }
}

impl GameMachine for HotSeat {
    type Command = HotSeatCommand;
    type Snapshot = HotSeatSnapshot;

    fn handle(
        &mut self,
        command: HotSeatCommand,
        ctx: &mut MachineContext<'_>,
    ) -> Result<(), GameError> {
        match (self.phase, command) {
            (HotSeatPhase::Ready | HotSeatPhase::Review, HotSeatCommand::Roll) => {
                self.countdown.cancel();
                self.roll_ticks = 0;
                self.phase = HotSeatPhase::Deciding;
            }
            (HotSeatPhase::Ready, HotSeatCommand::StartTimer) => {
                self.countdown.start(ctx.now);
                self.phase = HotSeatPhase::Running;
            }
            (HotSeatPhase::Ready | HotSeatPhase::Running, HotSeatCommand::ResetTimer) => {
                let index = self.turns.current_index();
                self.prepare_player(index, ctx);
            }
            (HotSeatPhase::Review, HotSeatCommand::Resolve(verdict)) => {
                self.last_verdict = Some(VerdictRecord {
                    player: self.turns.current().clone(),
                    verdict,
                });
                let next = crate::games::roster::advance(self.turns.current_index(), self.turns.len());
                self.prepare_player(next, ctx);
            }
            (_, HotSeatCommand::Roll) => return Err(self.invalid("roll")),
            (_, HotSeatCommand::StartTimer) => return Err(self.invalid("start_timer")),
            (_, HotSeatCommand::ResetTimer) => return Err(self.invalid("reset_timer")),
            (_, HotSeatCommand::Resolve(_)) => return Err(self.invalid("resolve")),
        }
        Ok(())
    }

    fn tick(&mut self, ctx: &mut MachineContext<'_>) {
        match self.phase {
            HotSeatPhase::Deciding => {
                let seats = self.turns.len();
                self.roll_ticks += 1;
                self.turns.set_current(ctx.rng.random_range(0..seats));
                if self.roll_ticks >= ROLL_TICKS {
                    let chosen = ctx.rng.random_range(0..seats);
                    self.prepare_player(chosen, ctx);
                }
            }
            HotSeatPhase::Running => {
                if self.countdown.tick(ctx.now) == Tick::Expired {
                    self.phase = HotSeatPhase::Review;
                }
            }
            HotSeatPhase::Ready | HotSeatPhase::Review => {}
        }
    }

    fn tick_interval(&self) -> Option<Duration> {
        match self.phase {
            HotSeatPhase::Deciding => Some(ROLL_TICK),
            HotSeatPhase::Running => Some(TIMER_POLL),
            HotSeatPhase::Ready | HotSeatPhase::Review => None,
        }
    }

    fn snapshot(&self, now: Instant) -> HotSeatSnapshot {
        HotSeatSnapshot {
            phase: self.phase,
            seats: self.turns.seats().to_vec(),
            current_index: self.turns.current_index(),
            seconds_remaining: self.countdown.remaining_secs(now),
            progress: self.countdown.progress(now),
            last_verdict: self.last_verdict.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{games::runner, state::game_state::FieldPatch};
    use rand::{SeedableRng, rngs::StdRng};

    fn players(count: usize) -> Vec<Player> {
        (0..count)
            .map(|index| Player::remote(format!("u{index}"), format!("P{index}")))
            .collect()
    }

    struct Bench {
        rng: StdRng,
        outbox: Vec<GameStatePatch>,
        now: Instant,
    }

    impl Bench {
        fn new() -> Self {
            Self {
                rng: StdRng::seed_from_u64(42),
                outbox: Vec::new(),
                now: Instant::now(),
            }
        }

        fn ctx(&mut self) -> MachineContext<'_> {
            MachineContext::new(self.now, &mut self.rng, &mut self.outbox)
        }
    }

    fn finish_roll(game: &mut HotSeat, bench: &mut Bench) {
        for _ in 0..ROLL_TICKS {
            bench.now += ROLL_TICK;
            game.tick(&mut bench.ctx());
        }
    }

    #[test]
    fn roll_settles_after_twelve_ticks() {
        let mut bench = Bench::new();
        let mut game = HotSeat::new(&players(4));
        for _ in 0..ROLL_TICKS - 1 {
            game.tick(&mut bench.ctx());
            assert_eq!(game.phase(), HotSeatPhase::Deciding);
        }
        game.tick(&mut bench.ctx());
        assert_eq!(game.phase(), HotSeatPhase::Ready);
        assert_eq!(game.tick_interval(), None);
        assert_eq!(bench.outbox.len(), 1);
        assert_eq!(
            bench.outbox[0].turn_user,
            FieldPatch::Set(game.current().id.clone())
        );
    }

    #[test]
    fn full_round_goes_to_review_and_advances_on_verdict() {
        let mut bench = Bench::new();
        let mut game = HotSeat::new(&players(3));
        finish_roll(&mut game, &mut bench);
        let starter = game.turns.current_index();

        game.handle(HotSeatCommand::StartTimer, &mut bench.ctx()).unwrap();
        assert_eq!(game.phase(), HotSeatPhase::Running);

        bench.now += Duration::from_secs(29);
        game.tick(&mut bench.ctx());
        assert_eq!(game.phase(), HotSeatPhase::Running);
        assert_eq!(game.snapshot(bench.now).seconds_remaining, 1);

        bench.now += Duration::from_secs(1);
        game.tick(&mut bench.ctx());
        assert_eq!(game.phase(), HotSeatPhase::Review);
        assert_eq!(game.snapshot(bench.now).seconds_remaining, 0);

        game.handle(HotSeatCommand::Resolve(Verdict::Drink), &mut bench.ctx())
            .unwrap();
        assert_eq!(game.phase(), HotSeatPhase::Ready);
        assert_eq!(game.turns.current_index(), (starter + 1) % 3);
        let record = game.last_verdict.clone().unwrap();
        assert_eq!(record.verdict, Verdict::Drink);
        assert_eq!(record.player.id, format!("u{starter}"));
    }

    #[test]
    fn reset_timer_keeps_the_same_player() {
        let mut bench = Bench::new();
        let mut game = HotSeat::new(&players(2));
        finish_roll(&mut game, &mut bench);
        let seat = game.turns.current_index();
        game.handle(HotSeatCommand::StartTimer, &mut bench.ctx()).unwrap();
        bench.now += Duration::from_secs(10);
        game.handle(HotSeatCommand::ResetTimer, &mut bench.ctx()).unwrap();
        assert_eq!(game.phase(), HotSeatPhase::Ready);
        assert_eq!(game.turns.current_index(), seat);
        assert_eq!(game.snapshot(bench.now).seconds_remaining, ROUND_SECONDS);
    }

    #[test]
    fn commands_out_of_phase_are_rejected() {
        let mut bench = Bench::new();
        let mut game = HotSeat::new(&players(2));
        assert_eq!(
            game.handle(HotSeatCommand::StartTimer, &mut bench.ctx()),
            Err(GameError::InvalidCommand {
                phase: "deciding",
                command: "start_timer"
            })
        );
        finish_roll(&mut game, &mut bench);
        assert!(
            game.handle(HotSeatCommand::Resolve(Verdict::Pass), &mut bench.ctx())
                .is_err()
        );
        game.handle(HotSeatCommand::StartTimer, &mut bench.ctx()).unwrap();
        bench.now += Duration::from_secs(31);
        game.tick(&mut bench.ctx());
        assert!(
            game.handle(HotSeatCommand::ResetTimer, &mut bench.ctx())
                .is_err()
        );
    }

    #[test]
    fn empty_table_plays_with_a_solo_seat() {
        let mut bench = Bench::new();
        let mut game = HotSeat::new(&[]);
        finish_roll(&mut game, &mut bench);
        assert_eq!(game.current().display_name, "Player 1");
        game.handle(HotSeatCommand::StartTimer, &mut bench.ctx()).unwrap();
        bench.now += Duration::from_secs(30);
        game.tick(&mut bench.ctx());
        game.handle(HotSeatCommand::Resolve(Verdict::Pass), &mut bench.ctx())
            .unwrap();
        assert_eq!(game.turns.current_index(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn runner_drives_the_roll_and_timer() {
        let handle = runner::spawn(HotSeat::new(&players(3)), StdRng::seed_from_u64(1), None);
        let client = handle.client();

        tokio::time::sleep(ROLL_TICK * ROLL_TICKS + Duration::from_millis(10)).await;
        assert_eq!(client.snapshot().phase, HotSeatPhase::Ready);

        let snapshot = client.send(HotSeatCommand::StartTimer).await.unwrap();
        assert_eq!(snapshot.phase, HotSeatPhase::Running);
        assert_eq!(snapshot.seconds_remaining, ROUND_SECONDS);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(client.snapshot().phase, HotSeatPhase::Review);

        handle.shutdown();
        tokio::task::yield_now().await;
        assert_eq!(
            client.send(HotSeatCommand::Resolve(Verdict::Pass)).await,
            Err(GameError::Stopped)
        );
    }
}
