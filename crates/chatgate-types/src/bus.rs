//! Envelope published by workers on a session's update topic.

use crate::session::Session;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeKind {
    SessionUpdate,
    WorkerTaskResponse,
    /// Any kind this bridge does not act on.
    #[serde(other)]
    Other,
}

/// Output of the worker for one step of a task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerTaskResponse {
    #[serde(default)]
    pub session_id: String,
    /// Partial text for progress updates; may be empty on the final one.
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusEnvelope {
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub owner: String,
    /// Current state of the session, when the worker attaches it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_task_response: Option<WorkerTaskResponse>,
}

impl BusEnvelope {
    pub fn session_update(session: Session) -> Self {
        Self {
            kind: EnvelopeKind::SessionUpdate,
            session_id: session.id.clone(),
            owner: session.owner.clone(),
            session: Some(session),
            worker_task_response: None,
        }
    }

    pub fn worker_response(
        owner: impl Into<String>,
        session_id: impl Into<String>,
        message: impl Into<String>,
        done: bool,
    ) -> Self {
        let session_id = session_id.into();
        Self {
            kind: EnvelopeKind::WorkerTaskResponse,
            session_id: session_id.clone(),
            owner: owner.into(),
            session: None,
            worker_task_response: Some(WorkerTaskResponse {
                session_id,
                message: message.into(),
                done,
                error: None,
            }),
        }
    }
}
