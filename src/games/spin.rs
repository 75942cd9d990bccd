use std::time::Duration;

use rand::{Rng, seq::IndexedRandom};
use serde::Serialize;
use tokio::time::Instant;

use crate::{
    games::{
        roster::Player,
        runner::{GameError, GameMachine, MachineContext},
    },
    state::game_state::{GamePayload, GameStatePatch},
};

/// Length of the bottle animation.
pub const SPIN_DURATION: Duration = Duration::from_millis(2200);

/// Shown when somebody spins an empty circle.
pub const EMPTY_TABLE_MESSAGE: &str = "Add players before spinning the bottle.";

/// Bring any angle into `[0, 360)`.
pub fn normalize_angle(degrees: f64) -> f64 {
    let normalized = degrees.rem_euclid(360.0);
    // rem_euclid may round up to exactly 360 for tiny negative inputs.
    if normalized >= 360.0 { 0.0 } else { normalized }
}

/// Seat the bottle points at after stopping at `angle`.
///
/// Seats sit evenly around the circle, seat 0 at the top (-90°). Each seat
/// owns a slice of `360 / seats` degrees centred on it. Returns `None` for
/// an empty circle.
pub fn resolve_spin(angle: f64, seats: usize) -> Option<usize> {
    if seats == 0 {
        return None;
    }
    let step = 360.0 / seats as f64;
    let pointer = normalize_angle(normalize_angle(angle) + 90.0);
    let slot = ((pointer + step / 2.0) / step).floor() as usize;
    Some(slot % seats)
}

/// Cubic ease-out over `t ∈ [0, 1]`.
pub fn ease_out_cubic(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

/// Input accepted by the spin table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinCommand {
    /// Spin the bottle.
    Spin,
    /// Hide the prompt card.
    Dismiss,
}

/// Phases of a spin table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpinPhase {
    /// Waiting for a spin.
    Ready,
    /// Bottle is turning.
    Spinning,
    /// A prompt is on screen.
    Prompt,
}

/// Read model of a spin table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinSnapshot {
    /// Current phase.
    pub phase: SpinPhase,
    /// Seats around the circle.
    pub seats: Vec<Player>,
    /// Bottle angle at snapshot time, in degrees.
    pub angle: f64,
    /// Angle the current spin will stop at (not normalized).
    pub target_angle: f64,
    /// Player the bottle landed on.
    pub active_player: Option<Player>,
    /// Prompt drawn for that player.
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Spinning {
    from: f64,
    to: f64,
    started_at: Instant,
}

impl Spinning {
    fn angle_at(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.started_at).as_secs_f64();
        let t = elapsed / SPIN_DURATION.as_secs_f64();
        self.from + (self.to - self.from) * ease_out_cubic(t)
    }

    fn is_done(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started_at) >= SPIN_DURATION
    }
}

/// Spin-the-bottle controller.
#[derive(Debug, Clone)]
pub struct SpinTable {
    seats: Vec<Player>,
    prompts: Vec<String>,
    rotation: f64,
    spinning: Option<Spinning>,
    active: Option<usize>,
    prompt: Option<String>,
}

impl SpinTable {
    /// Arrange the players around the bottle.
    pub fn new(players: &[Player], prompts: Vec<String>) -> Self {
        Self {
            seats: players.to_vec(),
            prompts,
            rotation: 0.0,
            spinning: None,
            active: None,
            prompt: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> SpinPhase {
        if self.spinning.is_some() {
            SpinPhase::Spinning
        } else if self.prompt.is_some() {
            SpinPhase::Prompt
        } else {
            SpinPhase::Ready
        }
    }

    fn start_spin(&mut self, ctx: &mut MachineContext<'_>) -> Result<(), GameError> {
        if self.seats.is_empty() {
            return Err(GameError::Rejected(EMPTY_TABLE_MESSAGE.to_string()));
        }
        if self.phase() != SpinPhase::Ready {
            return Ok(());
        }
        let random_angle = ctx.rng.random_range(0.0..360.0);
        let extra_turns = f64::from(ctx.rng.random_range(4..=6u32)) * 360.0;
        self.active = None;
        self.spinning = Some(Spinning {
            from: self.rotation,
            to: self.rotation + random_angle + extra_turns,
            started_at: ctx.now,
        });
        Ok(())
    }

    fn finish_spin(&mut self, target: f64, ctx: &mut MachineContext<'_>) {
        self.spinning = None;
        self.rotation = normalize_angle(target);
        let Some(index) = resolve_spin(self.rotation, self.seats.len()) else {
            return;
        };
        self.active = Some(index);
        self.prompt = self.prompts.choose(ctx.rng).cloned();

        let player_id = self.seats[index].id.clone();
        ctx.publish(GameStatePatch::turn(player_id.clone()).with_payload(GamePayload::Spin {
            player_id,
            prompt: self.prompt.clone(),
        }));
    }
}

impl GameMachine for SpinTable {
    type Command = SpinCommand;
    type Snapshot = SpinSnapshot;

    fn handle(
        &mut self,
        command: SpinCommand,
        ctx: &mut MachineContext<'_>,
    ) -> Result<(), GameError> {
        match command {
            SpinCommand::Spin => self.start_spin(ctx),
            SpinCommand::Dismiss => {
                self.prompt = None;
                Ok(())
            }
        }
    }

    fn tick(&mut self, ctx: &mut MachineContext<'_>) {
        if let Some(spin) = self.spinning {
            if spin.is_done(ctx.now) {
                self.finish_spin(spin.to, ctx);
            }
        }
    }

    fn tick_interval(&self) -> Option<Duration> {
        self.spinning.map(|_| SPIN_DURATION)
    }

    fn snapshot(&self, now: Instant) -> SpinSnapshot {
        let (angle, target_angle) = match &self.spinning {
            Some(spin) => (spin.angle_at(now), spin.to),
            None => (self.rotation, self.rotation),
        };
        SpinSnapshot {
            phase: self.phase(),
            seats: self.seats.clone(),
            angle,
            target_angle,
            active_player: self.active.and_then(|index| self.seats.get(index).cloned()),
            prompt: self.prompt.clone(),
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

    fn prompts() -> Vec<String> {
        vec!["Wildcard: everybody drinks!".into()]
    }

    #[test]
    fn four_seats_resolve_at_right_angles() {
        // step = 90, seat 0 at the top.
        assert_eq!(resolve_spin(0.0, 4), Some(1));
        assert_eq!(resolve_spin(90.0, 4), Some(2));
        assert_eq!(resolve_spin(180.0, 4), Some(3));
        assert_eq!(resolve_spin(270.0, 4), Some(0));
    }

    #[test]
    fn slices_are_centred_on_seats() {
        assert_eq!(resolve_spin(44.9, 4), Some(1));
        assert_eq!(resolve_spin(45.0, 4), Some(2));
        assert_eq!(resolve_spin(314.9, 4), Some(0));
        assert_eq!(resolve_spin(315.0, 4), Some(1));
        assert_eq!(resolve_spin(-90.0, 4), Some(0));
        assert_eq!(resolve_spin(3.0 * 360.0 + 90.0, 4), Some(2));
    }

    #[test]
    fn degenerate_circles() {
        assert_eq!(resolve_spin(123.0, 0), None);
        for angle in [0.0, 17.5, 180.0, 359.99] {
            assert_eq!(resolve_spin(angle, 1), Some(0));
        }
    }

    #[test]
    fn normalize_stays_in_range() {
        assert_eq!(normalize_angle(360.0), 0.0);
        assert_eq!(normalize_angle(-90.0), 270.0);
        assert_eq!(normalize_angle(1530.0), 90.0);
        let tiny = normalize_angle(-1e-15);
        assert!((0.0..360.0).contains(&tiny));
    }

    #[test]
    fn ease_out_hits_both_ends() {
        assert_eq!(ease_out_cubic(0.0), 0.0);
        assert_eq!(ease_out_cubic(1.0), 1.0);
        assert!(ease_out_cubic(0.5) > 0.5);
        assert_eq!(ease_out_cubic(3.0), 1.0);
    }

    #[test]
    fn empty_table_refuses_to_spin() {
        let mut table = SpinTable::new(&[], prompts());
        let mut rng = StdRng::seed_from_u64(0);
        let mut outbox = Vec::new();
        let mut ctx = MachineContext::new(Instant::now(), &mut rng, &mut outbox);
        assert_eq!(
            table.handle(SpinCommand::Spin, &mut ctx),
            Err(GameError::Rejected(EMPTY_TABLE_MESSAGE.into()))
        );
        assert_eq!(table.phase(), SpinPhase::Ready);
    }

    #[test]
    fn spin_lands_on_the_resolved_seat() {
        let mut table = SpinTable::new(&players(5), prompts());
        let mut rng = StdRng::seed_from_u64(21);
        let mut outbox = Vec::new();
        let start = Instant::now();

        let mut ctx = MachineContext::new(start, &mut rng, &mut outbox);
        table.handle(SpinCommand::Spin, &mut ctx).unwrap();
        let target = table.spinning.unwrap().to;
        assert!(target >= 4.0 * 360.0 && target < 7.0 * 360.0);

        // Spinning again mid-animation changes nothing.
        table.handle(SpinCommand::Spin, &mut ctx).unwrap();
        assert_eq!(table.spinning.unwrap().to, target);

        let end = start + SPIN_DURATION;
        let mut ctx = MachineContext::new(end, &mut rng, &mut outbox);
        table.tick(&mut ctx);

        let snapshot = table.snapshot(end);
        assert_eq!(snapshot.phase, SpinPhase::Prompt);
        let expected = resolve_spin(target, 5).unwrap();
        assert_eq!(snapshot.active_player.unwrap().id, format!("u{expected}"));
        assert_eq!(snapshot.prompt.as_deref(), Some("Wildcard: everybody drinks!"));
        assert_eq!(snapshot.angle, normalize_angle(target));
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].turn_user, FieldPatch::Set(format!("u{expected}")));
    }

    #[tokio::test(start_paused = true)]
    async fn runner_resolves_after_the_animation() {
        let handle = runner::spawn(SpinTable::new(&players(1), prompts()), StdRng::seed_from_u64(5), None);
        let client = handle.client();

        let snapshot = client.send(SpinCommand::Spin).await.unwrap();
        assert_eq!(snapshot.phase, SpinPhase::Spinning);

        tokio::time::sleep(SPIN_DURATION + Duration::from_millis(5)).await;
        let snapshot = client.snapshot();
        assert_eq!(snapshot.phase, SpinPhase::Prompt);
        assert_eq!(snapshot.active_player.unwrap().id, "u0");

        let snapshot = client.send(SpinCommand::Dismiss).await.unwrap();
        assert_eq!(snapshot.phase, SpinPhase::Ready);
        assert!(snapshot.prompt.is_none());
    }
}
