mod mock;
mod system;

use std::time::Duration;

#[cfg(any(test, feature = "test-support"))]
pub use mock::{MockClock, MockInstant};
pub use system::SystemClock;

/// Monotonic "now". Each implementation picks its own instant type
/// (`std::time::Instant` in production, an offset in tests).
pub trait GetNow {
    type Instant: Copy + Send;

    fn now(&self) -> Self::Instant;
}

pub trait GetElapsed: GetNow {
    fn elapsed(&self, since: Self::Instant) -> Duration;
}

/// Wall-clock seconds since the Unix epoch, as carried by `created` fields
/// on the wire.
pub trait GetUnixTime {
    fn unix_seconds(&self) -> i64;
}
