use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Haptic and accessibility cues emitted by the mini-games.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "cue", content = "message", rename_all = "snake_case")]
pub enum FeedbackCue {
    /// Light impact, used for safe moves.
    ImpactLight,
    /// Error notification, used when a player loses.
    NotifyError,
    /// Screen reader announcement.
    Announce(String),
}

/// Delivery failure of a feedback cue.
#[derive(Debug, Error)]
#[error("feedback unavailable: {0}")]
pub struct FeedbackError(pub String);

/// Sink for feedback cues. Implementations may fail; callers never care.
pub trait Feedback: Send + Sync {
    /// Deliver one cue.
    fn cue(&self, cue: FeedbackCue) -> Result<(), FeedbackError>;
}

/// Feedback sink that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFeedback;

impl Feedback for LogFeedback {
    fn cue(&self, cue: FeedbackCue) -> Result<(), FeedbackError> {
        debug!(?cue, "feedback cue");
        Ok(())
    }
}

/// Deliver a cue and swallow any failure.
pub fn best_effort(feedback: &dyn Feedback, cue: FeedbackCue) {
    if let Err(err) = feedback.cue(cue) {
        debug!(error = %err, "dropping feedback cue");
    }
}
