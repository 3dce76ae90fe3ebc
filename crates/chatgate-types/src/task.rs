//! The unit of work handed to the worker pool.

use crate::session::Interaction;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Create the session, then run the interaction.
    New,
    /// Append the interaction to an existing session.
    Continue,
}

/// Built once per request and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub owner: String,
    pub session_id: String,
    pub model: String,
    pub mode: SessionMode,
    pub interaction: Interaction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    pub assistant_id: String,
    /// Whether the caller consumes partial output.
    #[serde(default)]
    pub stream: bool,
}
