use std::env;

use super::ReadEnv;

/// Zero-sized type, delegates to `std::env`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl ReadEnv for SystemEnv {
    #[inline]
    fn var(&self, key: &str) -> Result<String, env::VarError> {
        env::var(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_variable_is_not_present() {
        assert!(matches!(
            SystemEnv.var("CHATGATE_SURELY_UNSET_VARIABLE_7731"),
            Err(env::VarError::NotPresent)
        ));
    }
}
