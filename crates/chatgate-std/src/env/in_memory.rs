#![cfg(any(test, feature = "test-support"))]

use std::collections::HashMap;
use std::env;
use std::sync::{Arc, Mutex, PoisonError};

use super::ReadEnv;

/// Environment backed by a shared map; never touches the process environment.
///
/// Clones share the same variables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEnv {
    vars: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.vars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) {
        self.vars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

impl ReadEnv for InMemoryEnv {
    fn var(&self, key: &str) -> Result<String, env::VarError> {
        self.vars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or(env::VarError::NotPresent)
    }
}
