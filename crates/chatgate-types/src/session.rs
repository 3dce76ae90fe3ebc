//! Sessions as stored by the session store and carried in worker updates.
//!
//! The bridge only reads these; workers and the store own every mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata key a worker sets on an interaction produced by a tool run.
pub const TOOL_ID_METADATA_KEY: &str = "tool_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreatorType {
    User,
    System,
    Assistant,
    Tool,
}

impl CreatorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::System => "system",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionState {
    #[default]
    Waiting,
    Editing,
    Complete,
    Error,
}

/// Token counts reported by the worker for one interaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: String,
    #[serde(default)]
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub updated: DateTime<Utc>,
    pub creator: CreatorType,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub state: InteractionState,
    #[serde(default)]
    pub finished: bool,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default)]
    pub usage: Usage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Interaction {
    /// A complete, finished interaction authored by `creator`.
    pub fn complete(id: impl Into<String>, creator: CreatorType, message: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            created: now,
            updated: now,
            creator,
            message: message.into(),
            state: InteractionState::Complete,
            finished: true,
            metadata: HashMap::new(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            usage: Usage::default(),
            error: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state == InteractionState::Complete
    }

    /// The tool run that produced this interaction, if any.
    pub fn tool_id(&self) -> Option<&str> {
        self.metadata
            .get(TOOL_ID_METADATA_KEY)
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub owner: String,
    /// Empty when the session was not started from an application.
    #[serde(default)]
    pub parent_app: String,
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub updated: DateTime<Utc>,
    #[serde(default)]
    pub interactions: Vec<Interaction>,
}

impl Session {
    pub fn last_interaction(&self) -> Option<&Interaction> {
        self.interactions.last()
    }

    pub fn belongs_to_app(&self) -> bool {
        !self.parent_app.is_empty()
    }
}
