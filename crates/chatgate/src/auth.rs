//! Bearer token to user resolution.
//!
//! Only identifies the caller. Whether that caller may use a model or an app
//! is decided by the workers.

use crate::token::SubjectToken;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("unknown bearer token")]
    UnknownToken,
}

/// Maps API keys to the user id that owns them.
#[derive(Clone, Default)]
pub struct ApiKeys(Arc<HashMap<String, SubjectToken>>);

impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKeys({} keys)", self.0.len())
    }
}

impl ApiKeys {
    /// Parses `token=user,token2=user2`. Returns the keys and the entries that
    /// were skipped because they are malformed or name an unusable user id.
    pub fn parse(raw: &str) -> (Self, Vec<String>) {
        let mut keys = HashMap::new();
        let mut rejected = Vec::new();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let parsed = entry
                .split_once('=')
                .map(|(token, user)| (token.trim(), user.trim()))
                .filter(|(token, _)| !token.is_empty())
                .and_then(|(token, user)| {
                    SubjectToken::new("owner", user)
                        .ok()
                        .map(|user| (token.to_string(), user))
                });
            match parsed {
                Some((token, user)) => {
                    keys.insert(token, user);
                }
                None => rejected.push(entry.split('=').next().unwrap_or_default().to_string()),
            }
        }
        (Self(Arc::new(keys)), rejected)
    }

    pub fn with_key(self, token: impl Into<String>, user: SubjectToken) -> Self {
        let mut keys = Arc::unwrap_or_clone(self.0);
        keys.insert(token.into(), user);
        Self(Arc::new(keys))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Resolves `Authorization: Bearer <token>` to its user.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<SubjectToken, AuthError> {
        let token = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)?;

        self.0.get(token).cloned().ok_or(AuthError::UnknownToken)
    }
}
