//! Zero-cost seams over `std` for chatgate.
//!
//! | Concern | Trait(s) | Production | Test |
//! |---------|----------|------------|------|
//! | Env vars | [`ReadEnv`] | [`SystemEnv`] | [`InMemoryEnv`]* |
//! | Time | [`GetNow`], [`GetElapsed`], [`GetUnixTime`] | [`SystemClock`] | [`MockClock`]* |
//!
//! *Available with `#[cfg(test)]` or the `"test-support"` feature.
//!
//! Every type here is `Send + Sync`, so test doubles can sit inside axum
//! state and cross `tokio::spawn` boundaries the same way the production
//! types do.

pub mod env;
pub mod time;

pub use env::{ReadEnv, SystemEnv};
pub use time::{GetElapsed, GetNow, GetUnixTime, SystemClock};

#[cfg(any(test, feature = "test-support"))]
pub use env::InMemoryEnv;
#[cfg(any(test, feature = "test-support"))]
pub use time::{MockClock, MockInstant};
