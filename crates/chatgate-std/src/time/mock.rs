#![cfg(any(test, feature = "test-support"))]

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use super::{GetElapsed, GetNow, GetUnixTime};

/// Time only moves when [`advance`](MockClock::advance) is called.
///
/// The monotonic offset and the wall clock move together: advancing by five
/// seconds also moves [`unix_seconds`](GetUnixTime::unix_seconds) by five.
#[derive(Debug, Clone)]
pub struct MockClock {
    state: Arc<Mutex<MockState>>,
}

#[derive(Debug)]
struct MockState {
    offset: Duration,
    unix_base: i64,
}

/// Offset from the moment the [`MockClock`] was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MockInstant(pub Duration);

impl MockClock {
    /// Starts at offset zero and the given wall-clock second.
    pub fn at_unix(unix_base: i64) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                offset: Duration::ZERO,
                unix_base,
            })),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.lock().offset += by;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::at_unix(0)
    }
}

impl GetNow for MockClock {
    type Instant = MockInstant;

    fn now(&self) -> MockInstant {
        MockInstant(self.lock().offset)
    }
}

impl GetElapsed for MockClock {
    fn elapsed(&self, since: MockInstant) -> Duration {
        self.lock().offset.saturating_sub(since.0)
    }
}

impl GetUnixTime for MockClock {
    fn unix_seconds(&self) -> i64 {
        let state = self.lock();
        state.unix_base + state.offset.as_secs() as i64
    }
}
