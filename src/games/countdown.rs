//! Deadline-based countdown shared by the timed mini-games.
//!
//! The discrete seconds readout is always recomputed from a deadline instead
//! of counting ticks, so a late or skipped tick never makes the timer drift.
//! A paired [`Progress`] value interpolates linearly over the same span and
//! reaches `1.0` exactly when the readout reaches zero.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

/// Linear 0→1 animation value running alongside a countdown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    from: f64,
    started_at: Instant,
    span: Duration,
}

impl Progress {
    /// Start animating from `from` towards `1.0` over `span`.
    pub fn start(from: f64, started_at: Instant, span: Duration) -> Self {
        Self {
            from: from.clamp(0.0, 1.0),
            started_at,
            span,
        }
    }

    /// Interpolated value at `now`.
    pub fn value_at(&self, now: Instant) -> f64 {
        if self.span.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started_at).as_secs_f64();
        let t = (elapsed / self.span.as_secs_f64()).min(1.0);
        self.from + (1.0 - self.from) * t
    }
}

/// Outcome of polling a countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Still counting; carries the whole seconds left.
    Running(u32),
    /// The deadline passed on this poll. Reported exactly once per run.
    Expired,
    /// Not running (idle, paused, or already expired).
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Idle,
    Running { deadline: Instant, progress: Progress },
    Paused { remaining: u32, progress: f64 },
    Expired,
}

/// Lifecycle label of a countdown, suitable for snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CountdownStatus {
    /// Never started or cancelled.
    Idle,
    /// Counting down.
    Running,
    /// Frozen by a pause.
    Paused,
    /// Reached zero.
    Expired,
}

/// Countdown over a fixed number of seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Countdown {
    total: u32,
    state: State,
}

impl Countdown {
    /// Create an idle countdown of `total` seconds.
    pub fn new(total: u32) -> Self {
        Self {
            total,
            state: State::Idle,
        }
    }

    /// Configured length in seconds.
    pub fn total_secs(&self) -> u32 {
        self.total
    }

    /// Start a full run from `now`.
    pub fn start(&mut self, now: Instant) {
        self.start_from(self.total, now);
    }

    /// Start a run with `seconds` left, clamped to the configured total.
    ///
    /// The progress animation picks up at `(total - seconds) / total`.
    pub fn start_from(&mut self, seconds: u32, now: Instant) {
        let seconds = seconds.min(self.total);
        let span = Duration::from_secs(u64::from(seconds));
        self.state = State::Running {
            deadline: now + span,
            progress: Progress::start(self.fraction_elapsed(seconds), now, span),
        };
    }

    /// Whole seconds left at `now`, rounded up.
    pub fn remaining_secs(&self, now: Instant) -> u32 {
        match self.state {
            State::Idle => self.total,
            State::Running { deadline, .. } => ceil_secs(deadline.saturating_duration_since(now)),
            State::Paused { remaining, .. } => remaining,
            State::Expired => 0,
        }
    }

    /// Animation value at `now`.
    pub fn progress(&self, now: Instant) -> f64 {
        match self.state {
            State::Idle => 0.0,
            State::Running { progress, .. } => progress.value_at(now),
            State::Paused { progress, .. } => progress,
            State::Expired => 1.0,
        }
    }

    /// Poll the countdown; the transition to zero is reported once.
    pub fn tick(&mut self, now: Instant) -> Tick {
        match self.state {
            State::Running { .. } => match self.remaining_secs(now) {
                0 => {
                    self.state = State::Expired;
                    Tick::Expired
                }
                remaining => Tick::Running(remaining),
            },
            _ => Tick::Inactive,
        }
    }

    /// Freeze the readout and the animation. Returns false when not running
    /// or when the deadline already passed.
    pub fn pause(&mut self, now: Instant) -> bool {
        let State::Running { progress, .. } = self.state else {
            return false;
        };
        let remaining = self.remaining_secs(now);
        if remaining == 0 {
            return false;
        }
        self.state = State::Paused {
            remaining,
            progress: progress.value_at(now),
        };
        true
    }

    /// Continue a paused countdown with a fresh deadline for the frozen seconds.
    pub fn resume(&mut self, now: Instant) -> bool {
        let State::Paused { remaining, .. } = self.state else {
            return false;
        };
        self.start_from(remaining, now);
        true
    }

    /// Drop any run in progress.
    pub fn cancel(&mut self) {
        self.state = State::Idle;
    }

    /// Current lifecycle label.
    pub fn status(&self) -> CountdownStatus {
        match self.state {
            State::Idle => CountdownStatus::Idle,
            State::Running { .. } => CountdownStatus::Running,
            State::Paused { .. } => CountdownStatus::Paused,
            State::Expired => CountdownStatus::Expired,
        }
    }

    fn fraction_elapsed(&self, seconds_left: u32) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        f64::from(self.total - seconds_left) / f64::from(self.total)
    }
}

fn ceil_secs(duration: Duration) -> u32 {
    let millis = duration.as_millis();
    u32::try_from(millis.div_ceil(1000)).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    fn remaining_is_monotonic_and_expires_once() {
        let start = Instant::now();
        let mut countdown = Countdown::new(30);
        countdown.start(start);

        let mut previous = u32::MAX;
        let mut expirations = 0;
        // Irregular polling granularity: 170ms, 430ms, 1.9s...
        let steps = [170u64, 430, 1900, 2_600, 250, 9_000, 8_000, 7_650, 200, 100];
        let mut elapsed = 0;
        for step in steps {
            elapsed += step;
            let now = start + Duration::from_millis(elapsed);
            let remaining = countdown.remaining_secs(now);
            assert!(remaining <= previous, "remaining went up at {elapsed}ms");
            previous = remaining;
            if countdown.tick(now) == Tick::Expired {
                expirations += 1;
                assert!(elapsed >= 30_000);
            }
        }
        assert_eq!(countdown.tick(start + 40 * SECOND), Tick::Inactive);
        assert_eq!(expirations, 1);
        assert_eq!(countdown.remaining_secs(start + 40 * SECOND), 0);
        assert_eq!(countdown.progress(start + 40 * SECOND), 1.0);
    }

    #[test]
    fn readout_rounds_up_partial_seconds() {
        let start = Instant::now();
        let mut countdown = Countdown::new(30);
        countdown.start(start);
        assert_eq!(countdown.remaining_secs(start), 30);
        assert_eq!(countdown.remaining_secs(start + Duration::from_millis(1)), 30);
        assert_eq!(countdown.remaining_secs(start + Duration::from_millis(1_000)), 29);
        assert_eq!(countdown.remaining_secs(start + Duration::from_millis(29_999)), 1);
        assert_eq!(countdown.remaining_secs(start + 30 * SECOND), 0);
    }

    #[test]
    fn progress_and_readout_finish_together() {
        let start = Instant::now();
        let mut countdown = Countdown::new(10);
        countdown.start(start);
        let halfway = countdown.progress(start + 5 * SECOND);
        assert!((halfway - 0.5).abs() < 1e-9);
        let end = start + 10 * SECOND;
        assert_eq!(countdown.remaining_secs(end), 0);
        assert_eq!(countdown.progress(end), 1.0);
    }

    #[test]
    fn pause_then_resume_keeps_the_remaining_budget() {
        let start = Instant::now();
        let mut countdown = Countdown::new(30);
        countdown.start(start);

        let paused_at = start + Duration::from_millis(12_400);
        assert!(countdown.pause(paused_at));
        let frozen = countdown.remaining_secs(paused_at);
        assert_eq!(frozen, 18);

        // Time passes while paused; nothing moves.
        let later = paused_at + 60 * SECOND;
        assert_eq!(countdown.remaining_secs(later), frozen);
        assert_eq!(countdown.tick(later), Tick::Inactive);
        assert_eq!(countdown.status(), CountdownStatus::Paused);

        assert!(countdown.resume(later));
        let expected_start = f64::from(30 - frozen) / 30.0;
        assert!((countdown.progress(later) - expected_start).abs() < 1e-9);
        assert_eq!(countdown.remaining_secs(later), frozen);

        let almost = later + Duration::from_millis(u64::from(frozen) * 1000 - 1);
        assert_eq!(countdown.tick(almost), Tick::Running(1));
        assert_eq!(countdown.tick(later + u32_secs(frozen)), Tick::Expired);
    }

    #[test]
    fn pause_is_refused_unless_running() {
        let now = Instant::now();
        let mut countdown = Countdown::new(5);
        assert!(!countdown.pause(now));
        assert!(!countdown.resume(now));
        countdown.start(now);
        assert!(!countdown.pause(now + 5 * SECOND));
    }

    #[test]
    fn cancel_returns_to_idle() {
        let now = Instant::now();
        let mut countdown = Countdown::new(5);
        countdown.start(now);
        countdown.cancel();
        assert_eq!(countdown.status(), CountdownStatus::Idle);
        assert_eq!(countdown.remaining_secs(now + 10 * SECOND), 5);
        assert_eq!(countdown.tick(now + 10 * SECOND), Tick::Inactive);
    }

    fn u32_secs(secs: u32) -> Duration {
        Duration::from_secs(u64::from(secs))
    }
}
