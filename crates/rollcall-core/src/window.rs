//! Session liveness.
//!
//! A code is live while `now - generated_at <= validity`. Expiry is logical:
//! nothing fires when a window closes, it is evaluated lazily at scan time.

use chrono::{DateTime, Duration, Utc};

use crate::config::AttendanceConfig;

/// Returns `true` if a code generated at `generated_at` is still live at `now`.
#[must_use]
pub fn is_live(generated_at: DateTime<Utc>, now: DateTime<Utc>, validity: Duration) -> bool {
    now - generated_at <= validity
}

/// Fixed-length attendance window anchored at a code's generation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionWindow {
    validity: Duration,
}

impl SessionWindow {
    /// Create a window of the given validity.
    #[must_use]
    pub const fn new(validity: Duration) -> Self {
        Self { validity }
    }

    /// Create a window from the attendance configuration.
    #[must_use]
    pub fn from_config(config: &AttendanceConfig) -> Self {
        Self::new(config.validity())
    }

    /// The validity duration.
    #[must_use]
    pub const fn validity(&self) -> Duration {
        self.validity
    }

    /// See [`is_live`].
    #[must_use]
    pub fn is_live(&self, generated_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        is_live(generated_at, now, self.validity)
    }

    /// Last instant at which the code is live.
    #[must_use]
    pub fn expires_at(&self, generated_at: DateTime<Utc>) -> DateTime<Utc> {
        generated_at + self.validity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, 10, 5, 0).unwrap()
    }

    #[test]
    fn test_live_at_generation_for_any_validity() {
        for minutes in [0, 1, 10, 60, 24 * 60] {
            assert!(is_live(t0(), t0(), Duration::minutes(minutes)));
        }
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let d = Duration::minutes(60);
        assert!(is_live(t0(), t0() + d, d));
        assert!(!is_live(t0(), t0() + d + Duration::milliseconds(1), d));
    }

    #[test]
    fn test_monotonic_in_now() {
        let window = SessionWindow::new(Duration::minutes(10));
        let mut was_live = true;
        for minute in 0..30 {
            let live = window.is_live(t0(), t0() + Duration::minutes(minute));
            // once expired, never live again
            assert!(was_live || !live);
            was_live = live;
        }
        assert!(!was_live);
    }

    #[test]
    fn test_expiry_matches_validity() {
        let window = SessionWindow::from_config(&AttendanceConfig::default());
        let expires_at = window.expires_at(t0());
        assert_eq!(expires_at, t0() + Duration::minutes(60));
        assert!(window.is_live(t0(), expires_at));
    }
}
