use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use super::{GetElapsed, GetNow, GetUnixTime};

/// Zero-sized type, delegates to `std::time`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl GetNow for SystemClock {
    type Instant = Instant;

    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl GetElapsed for SystemClock {
    #[inline]
    fn elapsed(&self, since: Instant) -> Duration {
        since.elapsed()
    }
}

impl GetUnixTime for SystemClock {
    fn unix_seconds(&self) -> i64 {
        // A clock set before 1970 reports the epoch itself.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_is_small_right_after_now() {
        let clock = SystemClock;
        let start = clock.now();
        assert!(clock.elapsed(start) < Duration::from_secs(1));
    }

    #[test]
    fn unix_seconds_is_after_2024() {
        assert!(SystemClock.unix_seconds() > 1_704_067_200);
    }
}
