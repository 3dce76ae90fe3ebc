//! Turns an inbound chat request into the task for the worker pool.

use crate::token::{SubjectToken, TokenError};
use chatgate_types::{
    ChatRequest, CreatorType, Interaction, RequestMessage, Session, SessionMode, Task,
};
use serde::Deserialize;

const DEFAULT_ASSISTANT_ID: &str = "0";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("messages must not be empty")]
    NoMessages,
    #[error("only 1 message is allowed for now")]
    TooManyMessages,
    #[error("invalid role '{0}', available roles: 'user', 'system', 'assistant'")]
    InvalidRole(String),
    #[error("invalid message content, should only contain 1 entry and it should be a string")]
    InvalidContent,
    #[error("only user interactions are allowed for existing sessions")]
    NonUserContinuation,
    #[error(transparent)]
    InvalidToken(#[from] TokenError),
}

/// Query parameters that take priority over the body for new sessions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryOverrides {
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub app_id: Option<String>,
    pub assistant_id: Option<String>,
}

fn creator_for(role: &str) -> Result<CreatorType, RequestError> {
    match role {
        "user" => Ok(CreatorType::User),
        "system" => Ok(CreatorType::System),
        "assistant" => Ok(CreatorType::Assistant),
        other => Err(RequestError::InvalidRole(other.to_string())),
    }
}

fn to_interaction(message: &RequestMessage) -> Result<Interaction, RequestError> {
    let creator = creator_for(&message.role)?;
    let text = message
        .content
        .single_text()
        .ok_or(RequestError::InvalidContent)?;
    Ok(Interaction::complete(
        uuid::Uuid::new_v4().to_string(),
        creator,
        text,
    ))
}

/// The single interaction carried by `messages`.
pub fn single_interaction(messages: &[RequestMessage]) -> Result<Interaction, RequestError> {
    match messages {
        [] => Err(RequestError::NoMessages),
        [message] => to_interaction(message),
        _ => Err(RequestError::TooManyMessages),
    }
}

/// Server-assigned identifier for a session started by this request.
pub fn new_session_id() -> Result<SubjectToken, TokenError> {
    SubjectToken::new("session_id", format!("ses_{}", uuid::Uuid::new_v4().simple()))
}

fn pick(query: &Option<String>, body: &Option<String>) -> Option<String> {
    query
        .as_ref()
        .or(body.as_ref())
        .filter(|v| !v.is_empty())
        .cloned()
}

pub fn new_session_task(
    owner: &SubjectToken,
    session_id: &SubjectToken,
    request: &ChatRequest,
    overrides: &QueryOverrides,
    interaction: Interaction,
) -> Task {
    let model = overrides
        .model
        .as_ref()
        .filter(|m| !m.is_empty())
        .unwrap_or(&request.model)
        .clone();
    Task {
        owner: owner.to_string(),
        session_id: session_id.to_string(),
        model,
        mode: SessionMode::New,
        interaction,
        system_prompt: pick(&overrides.system_prompt, &request.system_prompt),
        app_id: pick(&overrides.app_id, &request.app_id),
        assistant_id: pick(&overrides.assistant_id, &request.assistant_id)
            .unwrap_or_else(|| DEFAULT_ASSISTANT_ID.to_string()),
        stream: request.stream,
    }
}

/// Task appending `interaction` to an existing session. The model comes from
/// the stored session, not from the request.
pub fn continuation_task(
    owner: &SubjectToken,
    session: &Session,
    request: &ChatRequest,
    interaction: Interaction,
) -> Result<Task, RequestError> {
    if interaction.creator != CreatorType::User {
        return Err(RequestError::NonUserContinuation);
    }
    Ok(Task {
        owner: owner.to_string(),
        session_id: session.id.clone(),
        model: session.model_name.clone(),
        mode: SessionMode::Continue,
        interaction,
        system_prompt: None,
        app_id: Some(session.parent_app.clone()).filter(|app| !app.is_empty()),
        assistant_id: request
            .assistant_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| DEFAULT_ASSISTANT_ID.to_string()),
        stream: request.stream,
    })
}
