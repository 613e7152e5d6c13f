//! Window configuration and the admission counter it governs.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::{CrptError, Result};

/// Time unit used to express a window as "N calls per unit".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
}

impl TimeUnit {
    /// Get the duration of one unit.
    pub fn duration(&self) -> Duration {
        match self {
            TimeUnit::Millisecond => Duration::from_millis(1),
            TimeUnit::Second => Duration::from_secs(1),
            TimeUnit::Minute => Duration::from_secs(60),
            TimeUnit::Hour => Duration::from_secs(3600),
            TimeUnit::Day => Duration::from_secs(86400),
        }
    }
}

impl std::str::FromStr for TimeUnit {
    type Err = CrptError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "millisecond" | "ms" => Ok(TimeUnit::Millisecond),
            "second" | "s" => Ok(TimeUnit::Second),
            "minute" | "m" => Ok(TimeUnit::Minute),
            "hour" | "h" => Ok(TimeUnit::Hour),
            "day" | "d" => Ok(TimeUnit::Day),
            other => Err(CrptError::InvalidConfiguration(format!(
                "unknown time unit '{}'",
                other
            ))),
        }
    }
}

/// The period length and the number of calls admitted per period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    duration: Duration,
    max_calls: u32,
}

impl Window {
    /// Create a window, rejecting a zero duration or a non-positive quota.
    ///
    /// `max_calls` is signed so that values coming from loosely typed input
    /// (negative numbers included) are rejected here rather than wrapped.
    pub fn new(duration: Duration, max_calls: i64) -> Result<Self> {
        if duration.is_zero() {
            return Err(CrptError::InvalidConfiguration(
                "window duration must be greater than zero".to_string(),
            ));
        }
        if max_calls < 1 {
            return Err(CrptError::InvalidConfiguration(format!(
                "max calls per window must be at least 1, got {}",
                max_calls
            )));
        }
        let max_calls = u32::try_from(max_calls).map_err(|_| {
            CrptError::InvalidConfiguration(format!(
                "max calls per window must not exceed {}, got {}",
                u32::MAX,
                max_calls
            ))
        })?;

        Ok(Self {
            duration,
            max_calls,
        })
    }

    /// A window of exactly one `unit` admitting `max_calls` calls.
    pub fn per(unit: TimeUnit, max_calls: i64) -> Result<Self> {
        Self::new(unit.duration(), max_calls)
    }

    /// Get the window duration.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Get the number of calls admitted per window.
    pub fn max_calls(&self) -> u32 {
        self.max_calls
    }
}

/// Mutable admission state for the active window.
///
/// Only ever touched while holding the limiter's mutex.
#[derive(Debug)]
pub(crate) struct LimiterState {
    /// Calls admitted since the last reset
    count: u32,
    /// When the counter was last cleared
    last_reset: Instant,
    /// Number of resets performed so far
    resets: u64,
    /// Set once the limiter has been torn down
    closed: bool,
}

impl LimiterState {
    pub(crate) fn new() -> Self {
        Self {
            count: 0,
            last_reset: Instant::now(),
            resets: 0,
            closed: false,
        }
    }

    /// Admit one call if the window still has capacity.
    pub(crate) fn try_admit(&mut self, max_calls: u32) -> bool {
        if self.count < max_calls {
            self.count += 1;
            true
        } else {
            false
        }
    }

    /// Clear the counter for a new window.
    pub(crate) fn reset(&mut self) {
        self.count = 0;
        self.last_reset = Instant::now();
        self.resets += 1;
    }

    pub(crate) fn close(&mut self) -> bool {
        let was_open = !self.closed;
        self.closed = true;
        was_open
    }

    pub(crate) fn count(&self) -> u32 {
        self.count
    }

    pub(crate) fn last_reset(&self) -> Instant {
        self.last_reset
    }

    pub(crate) fn resets(&self) -> u64 {
        self.resets
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_unit_duration() {
        assert_eq!(TimeUnit::Millisecond.duration(), Duration::from_millis(1));
        assert_eq!(TimeUnit::Second.duration(), Duration::from_secs(1));
        assert_eq!(TimeUnit::Minute.duration(), Duration::from_secs(60));
        assert_eq!(TimeUnit::Hour.duration(), Duration::from_secs(3600));
        assert_eq!(TimeUnit::Day.duration(), Duration::from_secs(86400));
    }

    #[test]
    fn test_time_unit_from_str() {
        assert_eq!("second".parse::<TimeUnit>().unwrap(), TimeUnit::Second);
        assert_eq!("MINUTE".parse::<TimeUnit>().unwrap(), TimeUnit::Minute);
        assert_eq!("ms".parse::<TimeUnit>().unwrap(), TimeUnit::Millisecond);
        assert!("fortnight".parse::<TimeUnit>().is_err());
    }

    #[test]
    fn test_window_rejects_non_positive_quota() {
        let zero = Window::new(Duration::from_secs(1), 0);
        assert!(matches!(zero, Err(CrptError::InvalidConfiguration(_))));

        let negative = Window::new(Duration::from_secs(1), -1);
        assert!(matches!(negative, Err(CrptError::InvalidConfiguration(_))));

        let window = Window::new(Duration::from_secs(1), 1).unwrap();
        assert_eq!(window.max_calls(), 1);
    }

    #[test]
    fn test_window_rejects_zero_duration() {
        let result = Window::new(Duration::ZERO, 5);
        assert!(matches!(result, Err(CrptError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_window_rejects_oversized_quota() {
        let result = Window::new(Duration::from_secs(1), i64::from(u32::MAX) + 1);
        assert!(matches!(result, Err(CrptError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_window_per_unit() {
        let window = Window::per(TimeUnit::Minute, 30).unwrap();
        assert_eq!(window.duration(), Duration::from_secs(60));
        assert_eq!(window.max_calls(), 30);
    }

    #[test]
    fn test_state_admits_up_to_quota() {
        let mut state = LimiterState::new();

        for _ in 0..3 {
            assert!(state.try_admit(3));
        }
        assert!(!state.try_admit(3));
        assert_eq!(state.count(), 3);
    }

    #[test]
    fn test_state_reset_clears_count() {
        let mut state = LimiterState::new();
        state.try_admit(1);

        state.reset();

        assert_eq!(state.count(), 0);
        assert_eq!(state.resets(), 1);
        assert!(state.try_admit(1));
    }

    #[test]
    fn test_state_close_reports_first_transition() {
        let mut state = LimiterState::new();
        assert!(state.close());
        assert!(!state.close());
        assert!(state.is_closed());
    }
}
