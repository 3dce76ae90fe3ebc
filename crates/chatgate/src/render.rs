//! Maps session state onto the chat-completion wire schema.
//!
//! The model field always echoes what the caller asked for; clients match on
//! it, so the server never rewrites it.

use chatgate_types::{
    CHUNK_OBJECT, COMPLETION_OBJECT, ChatCompletion, ChatCompletionChunk, ChunkChoice,
    CompletionChoice, Delta, FINISH_REASON_STOP, Interaction, ResponseMessage,
};

const ASSISTANT_ROLE: &str = "assistant";

#[derive(Debug, Clone)]
pub struct Renderer {
    session_id: String,
    model: String,
}

impl Renderer {
    pub fn new(session_id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            model: model.into(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn chunk(&self, delta: Delta, finish_reason: Option<&str>, created: i64) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.session_id.clone(),
            created,
            model: self.model.clone(),
            object: CHUNK_OBJECT.to_string(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason: finish_reason.map(str::to_string),
            }],
        }
    }

    /// First fragment of every stream: assistant role, no content.
    pub fn opening(&self, created: i64) -> ChatCompletionChunk {
        self.chunk(
            Delta {
                role: Some(ASSISTANT_ROLE.to_string()),
                content: String::new(),
            },
            None,
            created,
        )
    }

    pub fn progress(&self, text: &str, created: i64) -> ChatCompletionChunk {
        self.chunk(
            Delta {
                role: None,
                content: text.to_string(),
            },
            None,
            created,
        )
    }

    pub fn terminal(&self, text: &str, created: i64) -> ChatCompletionChunk {
        self.chunk(
            Delta {
                role: None,
                content: text.to_string(),
            },
            Some(FINISH_REASON_STOP),
            created,
        )
    }

    /// Aggregate response built from the final interaction. Usage is copied as reported.
    pub fn completion(&self, interaction: &Interaction, created: i64) -> ChatCompletion {
        ChatCompletion {
            id: self.session_id.clone(),
            created,
            model: self.model.clone(),
            object: COMPLETION_OBJECT.to_string(),
            choices: vec![CompletionChoice {
                index: 0,
                message: ResponseMessage {
                    role: ASSISTANT_ROLE.to_string(),
                    content: interaction.message.clone(),
                    tool_calls: interaction.tool_calls.clone(),
                    tool_call_id: interaction.tool_call_id.clone(),
                },
                finish_reason: FINISH_REASON_STOP.to_string(),
            }],
            usage: interaction.usage,
        }
    }
}
