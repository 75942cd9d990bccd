use std::{fmt, sync::Arc, time::Duration};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use utoipa::ToSchema;

use crate::{
    games::{
        feedback::{Feedback, FeedbackCue, best_effort},
        roster::{Player, TurnOrder},
        runner::{GameError, GameMachine, MachineContext},
    },
    state::game_state::{GamePayload, GameStatePatch},
};

/// Number of pads on the 3x3 grid.
pub const PAD_COUNT: usize = 9;

/// Which flavour of the trap game is on the table. Both share the rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrapSkin {
    /// Loopy Trap.
    #[default]
    Loopy,
    /// Tipsy Trap.
    Tipsy,
}

/// Visible state of one pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PadState {
    /// Not tapped yet.
    Untouched,
    /// Tapped and safe.
    Safe,
    /// Tapped and it was the trap.
    Trap,
}

/// Round status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TrapStatus {
    /// Nobody tapped yet.
    Idle,
    /// At least one safe pad revealed.
    Playing,
    /// Somebody found the trap; input is closed until reset.
    TrapHit,
}

/// Input accepted by the trap table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapCommand {
    /// Current player taps a pad.
    Tap(usize),
    /// Hide a new trap and start over from the first player.
    ResetRound,
}

/// Read model of a trap table. The trap index stays hidden until found.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrapSnapshot {
    /// Skin on the table.
    pub skin: TrapSkin,
    /// Round status.
    pub status: TrapStatus,
    /// Pads in grid order.
    pub pads: Vec<PadState>,
    /// Pads still untouched.
    pub pads_left: usize,
    /// Seats in turn order.
    pub seats: Vec<Player>,
    /// Index of the player about to tap.
    pub current_index: usize,
    /// Player who found the trap.
    pub loser: Option<Player>,
}

/// Hidden-trap grid controller: `idle → playing → trapHit`.
pub struct TrapGame {
    skin: TrapSkin,
    turns: TurnOrder,
    pads: [PadState; PAD_COUNT],
    trap: usize,
    status: TrapStatus,
    loser: Option<Player>,
    feedback: Arc<dyn Feedback>,
}

impl fmt::Debug for TrapGame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrapGame")
            .field("skin", &self.skin)
            .field("status", &self.status)
            .field("pads", &self.pads)
            .field("current", &self.turns.current_index())
            .finish_non_exhaustive()
    }
}

impl TrapGame {
    /// Seat the players and hide the first trap.
    pub fn new<R: Rng + ?Sized>(
        skin: TrapSkin,
        players: &[Player],
        feedback: Arc<dyn Feedback>,
        rng: &mut R,
    ) -> Self {
        Self {
            skin,
            turns: TurnOrder::new(players),
            pads: [PadState::Untouched; PAD_COUNT],
            trap: rng.random_range(0..PAD_COUNT),
            status: TrapStatus::Idle,
            loser: None,
            feedback,
        }
    }

    /// Round status.
    pub fn status(&self) -> TrapStatus {
        self.status
    }

    /// Player about to tap.
    pub fn current(&self) -> &Player {
        self.turns.current()
    }

    fn tap(&mut self, index: usize, ctx: &mut MachineContext<'_>) -> Result<(), GameError> {
        if self.status == TrapStatus::TrapHit {
            return Err(GameError::InvalidCommand {
                phase: "trap_hit",
                command: "tap",
            });
        }
        let pad = self.pads.get_mut(index).ok_or(GameError::PadOutOfRange(index))?;
        if *pad != PadState::Untouched {
            best_effort(self.feedback.as_ref(), FeedbackCue::ImpactLight);
            return Ok(());
        }

        if index == self.trap {
            *pad = PadState::Trap;
            self.status = TrapStatus::TrapHit;
            let loser = self.turns.current().clone();
            best_effort(self.feedback.as_ref(), FeedbackCue::NotifyError);
            best_effort(
                self.feedback.as_ref(),
                FeedbackCue::Announce(format!("{} hit the trap", loser.display_name)),
            );
            self.loser = Some(loser);
            self.publish(ctx);
            return Ok(());
        }

        *pad = PadState::Safe;
        self.status = TrapStatus::Playing;
        self.turns.advance();
        best_effort(self.feedback.as_ref(), FeedbackCue::ImpactLight);
        best_effort(self.feedback.as_ref(), FeedbackCue::Announce("Safe pad".into()));
        self.publish(ctx);
        Ok(())
    }

    fn reset_round(&mut self, ctx: &mut MachineContext<'_>) {
        self.pads = [PadState::Untouched; PAD_COUNT];
        self.status = TrapStatus::Idle;
        self.loser = None;
        self.turns.rewind();
        self.trap = ctx.rng.random_range(0..PAD_COUNT);
        self.publish(ctx);
    }

    fn publish(&self, ctx: &mut MachineContext<'_>) {
        let safe_pads = self
            .pads
            .iter()
            .enumerate()
            .filter(|(_, pad)| **pad == PadState::Safe)
            .map(|(index, _)| index)
            .collect();
        ctx.publish(
            GameStatePatch::turn(self.turns.current().id.clone()).with_payload(GamePayload::Trap {
                skin: self.skin,
                safe_pads,
                loser: self.loser.as_ref().map(|player| player.id.clone()),
            }),
        );
    }
}

impl GameMachine for TrapGame {
    type Command = TrapCommand;
    type Snapshot = TrapSnapshot;

    fn handle(
        &mut self,
        command: TrapCommand,
        ctx: &mut MachineContext<'_>,
    ) -> Result<(), GameError> {
        match command {
            TrapCommand::Tap(index) => self.tap(index, ctx),
            TrapCommand::ResetRound => {
                self.reset_round(ctx);
                Ok(())
            }
        }
    }

    fn tick(&mut self, _ctx: &mut MachineContext<'_>) {}

    fn tick_interval(&self) -> Option<Duration> {
        None
    }

    fn snapshot(&self, _now: Instant) -> TrapSnapshot {
        TrapSnapshot {
            skin: self.skin,
            status: self.status,
            pads: self.pads.to_vec(),
            pads_left: self
                .pads
                .iter()
                .filter(|pad| **pad == PadState::Untouched)
                .count(),
            seats: self.turns.seats().to_vec(),
            current_index: self.turns.current_index(),
            loser: self.loser.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::feedback::FeedbackError;
    use rand::{SeedableRng, rngs::StdRng};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<FeedbackCue>>);

    impl Feedback for Recorder {
        fn cue(&self, cue: FeedbackCue) -> Result<(), FeedbackError> {
            self.0.lock().unwrap().push(cue);
            Ok(())
        }
    }

    struct Broken;

    impl Feedback for Broken {
        fn cue(&self, _cue: FeedbackCue) -> Result<(), FeedbackError> {
            Err(FeedbackError("no haptics on this device".into()))
        }
    }

    fn players(count: usize) -> Vec<Player> {
        (0..count)
            .map(|index| Player::remote(format!("u{index}"), format!("P{index}")))
            .collect()
    }

    fn tap(game: &mut TrapGame, rng: &mut StdRng, index: usize) -> Result<(), GameError> {
        let mut outbox = Vec::new();
        let mut ctx = MachineContext::new(Instant::now(), rng, &mut outbox);
        game.handle(TrapCommand::Tap(index), &mut ctx)
    }

    fn reset(game: &mut TrapGame, rng: &mut StdRng) {
        let mut outbox = Vec::new();
        let mut ctx = MachineContext::new(Instant::now(), rng, &mut outbox);
        game.handle(TrapCommand::ResetRound, &mut ctx).unwrap();
    }

    #[test]
    fn grid_hides_exactly_one_trap() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut game = TrapGame::new(TrapSkin::Loopy, &players(2), Arc::new(Recorder::default()), &mut rng);
        let mut traps = 0;
        for index in 0..PAD_COUNT {
            let mut fresh = TrapGame::new(TrapSkin::Loopy, &players(2), Arc::new(Recorder::default()), &mut StdRng::seed_from_u64(0));
            fresh.trap = game.trap;
            tap(&mut fresh, &mut rng, index).unwrap();
            if fresh.status() == TrapStatus::TrapHit {
                traps += 1;
            }
        }
        assert_eq!(traps, 1);
        assert!(game.trap < PAD_COUNT);
        reset(&mut game, &mut rng);
        assert!(game.trap < PAD_COUNT);
    }

    #[test]
    fn resets_draw_a_new_trap() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut game = TrapGame::new(TrapSkin::Tipsy, &players(3), Arc::new(Recorder::default()), &mut rng);
        let mut seen = vec![game.trap];
        for _ in 0..20 {
            reset(&mut game, &mut rng);
            seen.push(game.trap);
        }
        seen.sort_unstable();
        seen.dedup();
        assert!(seen.len() > 1, "trap never moved across resets");
    }

    #[test]
    fn safe_taps_rotate_and_trap_ends_the_round() {
        let mut rng = StdRng::seed_from_u64(5);
        let feedback = Arc::new(Recorder::default());
        let mut game = TrapGame::new(TrapSkin::Loopy, &players(3), feedback.clone(), &mut rng);
        let trap = game.trap;
        let safe = (trap + 1) % PAD_COUNT;

        tap(&mut game, &mut rng, safe).unwrap();
        assert_eq!(game.status(), TrapStatus::Playing);
        assert_eq!(game.current().id, "u1");

        // Already revealed: nothing changes but the light cue.
        tap(&mut game, &mut rng, safe).unwrap();
        assert_eq!(game.current().id, "u1");

        tap(&mut game, &mut rng, trap).unwrap();
        assert_eq!(game.status(), TrapStatus::TrapHit);
        let snapshot = game.snapshot(Instant::now());
        assert_eq!(snapshot.loser.as_ref().map(|p| p.id.as_str()), Some("u1"));
        assert_eq!(snapshot.pads[trap], PadState::Trap);
        assert_eq!(snapshot.pads_left, PAD_COUNT - 2);

        let other = (trap + 2) % PAD_COUNT;
        assert!(matches!(
            tap(&mut game, &mut rng, other),
            Err(GameError::InvalidCommand { .. })
        ));

        let cues = feedback.0.lock().unwrap().clone();
        assert_eq!(
            cues,
            vec![
                FeedbackCue::ImpactLight,
                FeedbackCue::Announce("Safe pad".into()),
                FeedbackCue::ImpactLight,
                FeedbackCue::NotifyError,
                FeedbackCue::Announce("P1 hit the trap".into()),
            ]
        );
    }

    #[test]
    fn reset_clears_pads_and_rewinds() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut game = TrapGame::new(TrapSkin::Loopy, &players(2), Arc::new(Broken), &mut rng);
        let trap = game.trap;
        tap(&mut game, &mut rng, (trap + 1) % PAD_COUNT).unwrap();
        tap(&mut game, &mut rng, trap).unwrap();
        reset(&mut game, &mut rng);
        let snapshot = game.snapshot(Instant::now());
        assert_eq!(snapshot.status, TrapStatus::Idle);
        assert_eq!(snapshot.current_index, 0);
        assert_eq!(snapshot.pads_left, PAD_COUNT);
        assert!(snapshot.loser.is_none());
    }

    #[test]
    fn out_of_range_pad_is_refused() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut game = TrapGame::new(TrapSkin::Loopy, &players(1), Arc::new(Recorder::default()), &mut rng);
        assert_eq!(tap(&mut game, &mut rng, PAD_COUNT), Err(GameError::PadOutOfRange(PAD_COUNT)));
    }

    #[test]
    fn empty_table_still_has_a_player() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut game = TrapGame::new(TrapSkin::Tipsy, &[], Arc::new(Recorder::default()), &mut rng);
        let trap = game.trap;
        tap(&mut game, &mut rng, (trap + 1) % PAD_COUNT).unwrap();
        assert_eq!(game.current().display_name, "Player 1");
        tap(&mut game, &mut rng, trap).unwrap();
        assert_eq!(
            game.snapshot(Instant::now()).loser.map(|p| p.display_name),
            Some("Player 1".to_string())
        );
    }
}
