mod in_memory;
mod system;

use std::env::VarError;
use std::str::FromStr;

#[cfg(any(test, feature = "test-support"))]
pub use in_memory::InMemoryEnv;
pub use system::SystemEnv;

/// Read access to process-style environment variables.
pub trait ReadEnv {
    fn var(&self, key: &str) -> Result<String, VarError>;

    /// Parses `key` when present.
    ///
    /// `None` when the variable is unset, `Some(Err(raw))` when it is set but
    /// does not parse, so callers can log the offending value.
    fn parsed<T: FromStr>(&self, key: &str) -> Option<Result<T, String>> {
        let raw = self.var(key).ok()?;
        Some(raw.trim().parse::<T>().map_err(|_| raw))
    }
}
