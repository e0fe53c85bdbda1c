//! Chess-style game clocks: a monotonic time budget with increment/delay semantics.

use std::time::{Duration, Instant};

use thiserror::Error;

/// A clock is unbounded if its configured component is `inf`/`∞`; we represent that as
/// [`Duration::MAX`] internally rather than threading an `Option` through every arithmetic site.
const UNBOUNDED: Duration = Duration::MAX;

/// Parse failures for the `"<total_time>[| <increment>][ d<delay>]"` clock configuration
/// grammar.
///
/// Grounded in `original_source/tests/pyggp/gameclocks/test_game_clock_configuration.py`'s
/// exception names (`MalformedStringGameClockConfigurationError`,
/// `TotalTimeInvalidFloatGameClockConfigurationError`, etc).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GameClockConfigError {
    #[error("clock configuration string `{0}` does not match the expected grammar")]
    Malformed(String),
    #[error("total time component `{0}` is not a non-negative number")]
    BadTotalTime(String),
    #[error("increment component `{0}` is not a non-negative number")]
    BadIncrement(String),
    #[error("delay component `{0}` is not a non-negative number")]
    BadDelay(String),
}

/// Parsed configuration of a [`GameClock`]: total time, increment, and delay, each in
/// nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameClockConfig {
    pub total_time: Duration,
    pub increment: Duration,
    pub delay: Duration,
}

impl GameClockConfig {
    pub fn new(total_time: Duration, increment: Duration, delay: Duration) -> Self {
        Self {
            total_time,
            increment,
            delay,
        }
    }

    /// A clock configuration with no time at all: permits zero search iterations.
    pub fn zero() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO, Duration::ZERO)
    }

    pub fn into_clock(self) -> GameClock {
        GameClock::new(self)
    }

    /// Parses `"<total_time>[| <increment>][ d<delay>]"`. Omitted components default to `0`;
    /// `inf`/`∞` map to an unbounded component. Whitespace is permitted anywhere between tokens.
    pub fn from_str_config(s: &str) -> Result<Self, GameClockConfigError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(GameClockConfigError::Malformed(s.to_owned()));
        }

        let (before_delay, delay_part) = match trimmed.split_once('d') {
            Some((before, after)) => (before, Some(after)),
            None => (trimmed, None),
        };

        let (total_part, increment_part) = match before_delay.split_once('|') {
            Some((before, after)) => (before.trim(), Some(after.trim())),
            None => (before_delay.trim(), None),
        };

        if total_part.is_empty() && increment_part.is_none() && delay_part.is_none() {
            return Err(GameClockConfigError::Malformed(s.to_owned()));
        }
        if let Some(increment_part) = increment_part {
            // A `|` demands a total_time on its left: `"| 10"` omits it and is malformed,
            // whereas omitting the whole pipe clause (e.g. `"d20"`) is the valid default-to-zero
            // case.
            if increment_part.is_empty() || total_part.is_empty() {
                return Err(GameClockConfigError::Malformed(s.to_owned()));
            }
        }

        let total_time = if total_part.is_empty() {
            Duration::ZERO
        } else {
            parse_duration_component(total_part)
                .ok_or_else(|| GameClockConfigError::BadTotalTime(total_part.to_owned()))?
        };
        let increment = match increment_part {
            None => Duration::ZERO,
            Some(part) => parse_duration_component(part)
                .ok_or_else(|| GameClockConfigError::BadIncrement(part.to_owned()))?,
        };
        let delay = match delay_part {
            None => Duration::ZERO,
            Some(part) => {
                let part = part.trim();
                if part.is_empty() {
                    return Err(GameClockConfigError::Malformed(s.to_owned()));
                }
                parse_duration_component(part)
                    .ok_or_else(|| GameClockConfigError::BadDelay(part.to_owned()))?
            }
        };

        Ok(Self::new(total_time, increment, delay))
    }
}

fn parse_duration_component(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s == "inf" || s == "∞" {
        return Some(UNBOUNDED);
    }
    let seconds: f64 = s.parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some(Duration::from_secs_f64(seconds))
}

/// Lifecycle of a [`GameClock`]: armed at the start of a move, running while the agent searches,
/// stopped (and its budget updated) once the move is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClockState {
    Armed(Instant),
    Running(Instant),
    Stopped,
}

/// A monotonic time budget with increment and delay, modeled after chess clocks.
///
/// `total_time` is the remaining budget, `increment` is added back after a move completes, and
/// `delay` is free time granted at the start of each move that is not deducted if the move
/// completes within it.
#[derive(Debug, Clone)]
pub struct GameClock {
    config: GameClockConfig,
    total_time: Duration,
    state: ClockState,
}

impl GameClock {
    pub fn new(config: GameClockConfig) -> Self {
        Self {
            config,
            total_time: config.total_time,
            state: ClockState::Stopped,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.total_time
    }

    pub fn delay(&self) -> Duration {
        self.config.delay
    }

    pub fn increment(&self) -> Duration {
        self.config.increment
    }

    /// Records the wall-clock start of a move. Transitions `Stopped -> Armed -> Running`; calling
    /// `arm` again before `stop` simply re-records the start time.
    pub fn arm(&mut self) {
        let now = Instant::now();
        log::debug!(
            "arming clock: {:?} remaining, {:?} delay",
            self.total_time,
            self.config.delay
        );
        self.state = ClockState::Armed(now);
    }

    /// Marks the clock as actively counting down, distinct from the instant it was armed only in
    /// bookkeeping terms -- both share the same start instant, the `Armed -> Running` transition
    /// is a pure state label here, not a second timestamp.
    fn running_since(&mut self) -> Instant {
        match self.state {
            ClockState::Armed(start) | ClockState::Running(start) => {
                self.state = ClockState::Running(start);
                start
            }
            ClockState::Stopped => {
                self.arm();
                self.running_since()
            }
        }
    }

    fn elapsed(&self) -> Duration {
        match self.state {
            ClockState::Armed(start) | ClockState::Running(start) => start.elapsed(),
            ClockState::Stopped => Duration::ZERO,
        }
    }

    /// `true` iff the elapsed time since the last `arm()` exceeds `total_time + delay`. Monotonic:
    /// once true for a given arm, stays true until re-armed. Uses `saturating_add` since either
    /// component may be `Duration::MAX` (an unbounded `inf`/`∞` clock configuration).
    pub fn is_expired(&self) -> bool {
        if matches!(self.state, ClockState::Stopped) {
            return false;
        }
        self.elapsed() > self.total_time.saturating_add(self.config.delay)
    }

    /// Stops the clock and updates the remaining budget: no deduction if the elapsed time fits
    /// within the delay, otherwise `total_time -= (elapsed - delay)`, then `total_time +=
    /// increment`.
    pub fn stop(&mut self) {
        self.running_since();
        let elapsed = self.elapsed();
        if elapsed > self.config.delay {
            let overrun = elapsed - self.config.delay;
            self.total_time = self.total_time.saturating_sub(overrun);
        }
        self.total_time = self.total_time.saturating_add(self.config.increment);
        log::debug!(
            "stopped clock after {elapsed:?}: {:?} remaining",
            self.total_time
        );
        self.state = ClockState::Stopped;
    }
}
