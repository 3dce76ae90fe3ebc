//! Classifies raw update-topic payloads.
//!
//! Rules apply in order; the first match wins:
//!
//! 1. The attached session belongs to an app and its last interaction is a
//!    finished tool run → [`Event::ToolCompleted`]
//! 2. Worker response marked done → [`Event::WorkerDone`]
//! 3. Worker response not done → [`Event::Progress`]
//! 4. Session update whose last interaction is complete → [`Event::SessionSnapshot`]
//! 5. Anything else → [`Event::Ignorable`]

use chatgate_types::{BusEnvelope, EnvelopeKind, Session};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Progress { partial_text: String },
    /// Carries the session and envelope kind it was decoded from so a
    /// blocking exchange can use a session update as the final snapshot.
    ToolCompleted {
        final_text: String,
        session: Session,
        kind: EnvelopeKind,
    },
    WorkerDone { final_text: String },
    SessionSnapshot { session: Session },
    Ignorable,
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Progress { .. } => "progress",
            Self::ToolCompleted { .. } => "tool_completed",
            Self::WorkerDone { .. } => "worker_done",
            Self::SessionSnapshot { .. } => "session_snapshot",
            Self::Ignorable => "ignorable",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("undecodable session event: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

pub fn decode(payload: &[u8]) -> Result<Event, DecodeError> {
    let envelope: BusEnvelope = serde_json::from_slice(payload)?;
    Ok(classify(envelope))
}

fn classify(envelope: BusEnvelope) -> Event {
    let BusEnvelope {
        kind,
        session,
        worker_task_response,
        ..
    } = envelope;

    if let Some(session) = session.as_ref().filter(|s| is_tool_completion(s)) {
        let final_text = session
            .last_interaction()
            .map(|i| i.message.clone())
            .unwrap_or_default();
        return Event::ToolCompleted {
            final_text,
            session: session.clone(),
            kind,
        };
    }

    if let Some(response) = worker_task_response {
        return if response.done {
            Event::WorkerDone {
                final_text: response.message,
            }
        } else {
            Event::Progress {
                partial_text: response.message,
            }
        };
    }

    match session {
        Some(session)
            if kind == EnvelopeKind::SessionUpdate
                && session.last_interaction().is_some_and(|i| i.is_complete()) =>
        {
            Event::SessionSnapshot { session }
        }
        _ => Event::Ignorable,
    }
}

fn is_tool_completion(session: &Session) -> bool {
    session.belongs_to_app()
        && session
            .last_interaction()
            .is_some_and(|last| last.tool_id().is_some() && last.finished)
}
