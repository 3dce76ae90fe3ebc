//! NATS-safe subject pieces.
//!
//! Owner and session identifiers are embedded as single subject tokens:
//! `{prefix}.session.{owner}.{session}.updates`. Validation follows
//! [NATS subject naming](https://docs.nats.io/nats-concepts/subjects#characters-allowed-and-recommended-for-subject-names):
//! ASCII only, rejecting `.` `*` `>` and whitespace. The prefix may contain
//! dots but not empty tokens.

use std::sync::Arc;

const MAX_TOKEN_LENGTH: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenViolation {
    Empty,
    InvalidCharacter(char),
    TooLong(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", describe(.field, .violation))]
pub struct TokenError {
    pub field: &'static str,
    pub violation: TokenViolation,
}

fn describe(field: &str, violation: &TokenViolation) -> String {
    match violation {
        TokenViolation::Empty => format!("{field} must not be empty"),
        TokenViolation::InvalidCharacter(ch) => {
            format!("{field} contains invalid character: {ch:?}")
        }
        TokenViolation::TooLong(len) => {
            format!("{field} is too long: {len} characters (max {MAX_TOKEN_LENGTH})")
        }
    }
}

fn check(field: &'static str, value: &str, allow_dots: bool) -> Result<(), TokenError> {
    let fail = |violation| TokenError { field, violation };
    if value.is_empty() {
        return Err(fail(TokenViolation::Empty));
    }
    let mut count = 0;
    for ch in value.chars() {
        count += 1;
        if count > MAX_TOKEN_LENGTH {
            return Err(fail(TokenViolation::TooLong(value.chars().count())));
        }
        let forbidden = !ch.is_ascii()
            || ch == '*'
            || ch == '>'
            || ch.is_whitespace()
            || (ch == '.' && !allow_dots);
        if forbidden {
            return Err(fail(TokenViolation::InvalidCharacter(ch)));
        }
    }
    if allow_dots && (value.contains("..") || value.starts_with('.') || value.ends_with('.')) {
        return Err(fail(TokenViolation::InvalidCharacter('.')));
    }
    Ok(())
}

/// One subject token. Invalid instances are unrepresentable.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubjectToken(Arc<str>);

impl SubjectToken {
    pub fn new(field: &'static str, value: impl AsRef<str>) -> Result<Self, TokenError> {
        let value = value.as_ref();
        check(field, value, false)?;
        Ok(Self(value.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubjectToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::ops::Deref for SubjectToken {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

/// Dotted subject prefix such as `chatgate` or `prod.chatgate`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubjectPrefix(Arc<str>);

impl SubjectPrefix {
    pub fn new(value: impl AsRef<str>) -> Result<Self, TokenError> {
        let value = value.as_ref();
        check("prefix", value, true)?;
        Ok(Self(value.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubjectPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
