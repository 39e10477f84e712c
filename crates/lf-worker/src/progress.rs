//! Progress throttling
//!
//! A unit reports progress at most once per interval. The first report and
//! the final 100% always go through.

use std::time::{Duration, Instant};

/// Default minimum spacing between progress reports
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    interval: Duration,
    last_emit: Option<Instant>,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: None,
        }
    }

    /// Decide whether `percent` should be reported at `now`; records the
    /// emission when it should.
    pub fn should_emit(&mut self, percent: u8, now: Instant) -> bool {
        let due = match self.last_emit {
            None => true,
            Some(_) if percent >= 100 => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };
        if due {
            self.last_emit = Some(now);
        }
        due
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRESS_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_report_always_emits() {
        let mut throttle = ProgressThrottle::default();
        assert!(throttle.should_emit(0, Instant::now()));
    }

    #[test]
    fn test_reports_within_interval_are_dropped() {
        let mut throttle = ProgressThrottle::new(Duration::from_millis(250));
        let t0 = Instant::now();

        assert!(throttle.should_emit(0, t0));
        assert!(!throttle.should_emit(10, t0 + Duration::from_millis(100)));
        assert!(!throttle.should_emit(20, t0 + Duration::from_millis(249)));
        assert!(throttle.should_emit(30, t0 + Duration::from_millis(250)));
        assert!(!throttle.should_emit(40, t0 + Duration::from_millis(400)));
        assert!(throttle.should_emit(50, t0 + Duration::from_millis(500)));
    }

    #[test]
    fn test_completion_bypasses_interval() {
        let mut throttle = ProgressThrottle::new(Duration::from_secs(10));
        let t0 = Instant::now();

        assert!(throttle.should_emit(0, t0));
        assert!(!throttle.should_emit(99, t0));
        assert!(throttle.should_emit(100, t0));
    }
}
