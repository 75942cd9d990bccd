use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use utoipa::ToSchema;

use crate::{
    games::{
        countdown::{Countdown, Tick},
        runner::{GameError, GameMachine, MachineContext},
    },
    state::game_state::{FieldPatch, GamePayload, GameStatePatch},
};

/// Letters a round can land on.
pub const LETTERS: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
/// Length of one answering round.
pub const TIMER_SECONDS: u32 = 30;
/// Nominal length of the letter roll.
pub const ROLL_DURATION: Duration = Duration::from_millis(1600);
/// Delay between two letter frames.
pub const ROLL_TICK: Duration = Duration::from_millis(70);
/// Polling period of the round timer.
pub const TIMER_POLL: Duration = Duration::from_millis(250);

const MIN_ROLL_TICKS: u32 = 18;

/// Number of letter frames shown before the final letter is drawn.
pub fn roll_ticks() -> u32 {
    let nominal = ROLL_DURATION.as_millis() / ROLL_TICK.as_millis();
    MIN_ROLL_TICKS.max(u32::try_from(nominal).unwrap_or(MIN_ROLL_TICKS))
}

/// A category players answer in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Category {
    /// Title shown on the card.
    pub title: String,
    /// Decorative emoji.
    pub emoji: String,
}

impl Category {
    /// Build a category card.
    pub fn new(title: impl Into<String>, emoji: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            emoji: emoji.into(),
        }
    }
}

/// Phases of a categories table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoriesPhase {
    /// Waiting for a category pick.
    Idle,
    /// Shuffling letters.
    Rolling,
    /// Answer timer running.
    Countdown,
    /// Answer timer frozen.
    Paused,
    /// Time is up.
    Finished,
}

impl CategoriesPhase {
    fn label(self) -> &'static str {
        match self {
            CategoriesPhase::Idle => "idle",
            CategoriesPhase::Rolling => "rolling",
            CategoriesPhase::Countdown => "countdown",
            CategoriesPhase::Paused => "paused",
            CategoriesPhase::Finished => "finished",
        }
    }
}

/// Input accepted by the categories table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoriesCommand {
    /// Pick a category by its position in the list and roll a letter.
    Select(usize),
    /// Pause or resume the answer timer.
    ToggleTimer,
    /// Forget the category and letter and go back to idle.
    NextRound,
}

/// Read model of a categories table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoriesSnapshot {
    /// Current phase.
    pub phase: CategoriesPhase,
    /// Picked category.
    pub category: Option<Category>,
    /// Letter on screen; flickers while rolling.
    pub letter: Option<char>,
    /// Whole seconds left on the answer timer.
    pub seconds_remaining: u32,
    /// Timer ring progress, 0 to 1.
    pub progress: f64,
}

/// Letter-roll controller:
/// `idle → rolling → countdown ⇄ paused → finished → idle`.
#[derive(Debug, Clone)]
pub struct CategoriesGame {
    categories: Vec<Category>,
    phase: CategoriesPhase,
    selected: Option<Category>,
    letter: Option<char>,
    ticks: u32,
    countdown: Countdown,
}

impl CategoriesGame {
    /// Open a table over the given category deck.
    pub fn new(categories: Vec<Category>) -> Self {
        Self {
            categories,
            phase: CategoriesPhase::Idle,
            selected: None,
            letter: None,
            ticks: 0,
            countdown: Countdown::new(TIMER_SECONDS),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> CategoriesPhase {
        self.phase
    }

    fn invalid(&self, command: &'static str) -> GameError {
        GameError::InvalidCommand {
            phase: self.phase.label(),
            command,
        }
    }

    fn select(&mut self, index: usize, ctx: &mut MachineContext<'_>) -> Result<(), GameError> {
        if matches!(
            self.phase,
            CategoriesPhase::Rolling | CategoriesPhase::Countdown
        ) {
            return Ok(());
        }
        let category = self
            .categories
            .get(index)
            .cloned()
            .ok_or_else(|| GameError::Rejected(format!("category {index} does not exist")))?;

        self.countdown.cancel();
        self.ticks = 0;
        self.letter = None;
        self.phase = CategoriesPhase::Rolling;
        ctx.publish(GameStatePatch {
            payload: FieldPatch::Clear,
            ..GameStatePatch::category(category.title.clone())
        });
        self.selected = Some(category);
        Ok(())
    }

    fn random_letter<R: Rng + ?Sized>(rng: &mut R) -> char {
        LETTERS[rng.random_range(0..LETTERS.len())] as char
    }
}

impl GameMachine for CategoriesGame {
    type Command = CategoriesCommand;
    type Snapshot = CategoriesSnapshot;

    fn handle(
        &mut self,
        command: CategoriesCommand,
        ctx: &mut MachineContext<'_>,
    ) -> Result<(), GameError> {
        match command {
            CategoriesCommand::Select(index) => self.select(index, ctx),
            CategoriesCommand::ToggleTimer => match self.phase {
                CategoriesPhase::Countdown => {
                    if self.countdown.pause(ctx.now) {
                        self.phase = CategoriesPhase::Paused;
                    }
                    Ok(())
                }
                CategoriesPhase::Paused => {
                    self.countdown.resume(ctx.now);
                    self.phase = CategoriesPhase::Countdown;
                    Ok(())
                }
                _ => Err(self.invalid("toggle_timer")),
            },
            CategoriesCommand::NextRound => {
                self.countdown.cancel();
                self.ticks = 0;
                self.selected = None;
                self.letter = None;
                self.phase = CategoriesPhase::Idle;
                ctx.publish(GameStatePatch {
                    category: FieldPatch::Clear,
                    payload: FieldPatch::Clear,
                    ..GameStatePatch::default()
                });
                Ok(())
            }
        }
    }

    fn tick(&mut self, ctx: &mut MachineContext<'_>) {
        match self.phase {
            CategoriesPhase::Rolling => {
                self.ticks += 1;
                self.letter = Some(Self::random_letter(ctx.rng));
                if self.ticks >= roll_ticks() {
                    let letter = Self::random_letter(ctx.rng);
                    self.letter = Some(letter);
                    self.countdown.start(ctx.now);
                    self.phase = CategoriesPhase::Countdown;
                    if let Some(category) = &self.selected {
                        ctx.publish(GameStatePatch::category(category.title.clone()).with_payload(
                            GamePayload::Categories {
                                category: category.title.clone(),
                                letter: Some(letter),
                            },
                        ));
                    }
                }
            }
            CategoriesPhase::Countdown => {
                if self.countdown.tick(ctx.now) == Tick::Expired {
                    self.phase = CategoriesPhase::Finished;
                }
            }
            CategoriesPhase::Idle | CategoriesPhase::Paused | CategoriesPhase::Finished => {}
        }
    }

    fn tick_interval(&self) -> Option<Duration> {
        match self.phase {
            CategoriesPhase::Rolling => Some(ROLL_TICK),
            CategoriesPhase::Countdown => Some(TIMER_POLL),
            CategoriesPhase::Idle | CategoriesPhase::Paused | CategoriesPhase::Finished => None,
        }
    }

    fn snapshot(&self, now: Instant) -> CategoriesSnapshot {
        let (seconds_remaining, progress) = match self.phase {
            CategoriesPhase::Idle | CategoriesPhase::Rolling => (TIMER_SECONDS, 0.0),
            _ => (self.countdown.remaining_secs(now), self.countdown.progress(now)),
        };
        CategoriesSnapshot {
            phase: self.phase,
            category: self.selected.clone(),
            letter: self.letter,
            seconds_remaining,
            progress,
        }
    }
}
