//! Wall-clock stamps in the configured local time zone.

use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;

/// Stamps events in the site's local time zone
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    tz: Tz,
}

impl Clock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Current time in the configured zone, carried with its fixed offset
    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.tz).fixed_offset()
    }

    /// Re-express a stored UTC instant in the configured zone
    pub fn localize(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.tz).fixed_offset()
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_carries_zone_offset() {
        let clock = Clock::new(chrono_tz::America::El_Salvador);
        let now = clock.now();
        // El Salvador observes CST year-round
        assert_eq!(now.offset().local_minus_utc(), -6 * 3600);
    }

    #[test]
    fn test_default_is_utc() {
        let clock = Clock::default();
        assert_eq!(clock.now().offset().local_minus_utc(), 0);
        assert_eq!(clock.timezone(), Tz::UTC);
    }
}
