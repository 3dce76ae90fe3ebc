//! Waits for the finished session and returns it whole.
//!
//! Progress and worker-done events are ignored. The exchange ends on a
//! session snapshot, or on a tool completion carried by a session update whose
//! session is already complete. A worker that only ever reports done therefore never satisfies a
//! blocking caller; the deadline does.

use crate::context::{Done, RequestContext};
use crate::decoder::{Event, decode};
use crate::subscription::Subscription;
use chatgate_nats::EventSubscriber;
use chatgate_types::{EnvelopeKind, Interaction, Session};
use tracing::{debug, info, instrument, warn};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BlockingError {
    #[error("session update not received")]
    SessionUpdateNotReceived,
    #[error("request cancelled")]
    Cancelled,
    #[error("session update does not contain any interactions")]
    NoInteractions,
}

#[instrument(name = "chatgate.block", skip_all, fields(subject = %subscription.subject()))]
pub async fn respond<S: EventSubscriber>(
    mut subscription: Subscription<S>,
    ctx: &RequestContext,
) -> Result<Session, BlockingError> {
    let result = wait_for_session(&mut subscription, ctx).await;
    subscription.release().await;

    match &result {
        Ok(session) => info!(
            session_id = %session.id,
            interactions = session.interactions.len(),
            "Session update received"
        ),
        Err(e) => warn!(error = %e, "No session update"),
    }
    result
}

async fn wait_for_session<S: EventSubscriber>(
    subscription: &mut Subscription<S>,
    ctx: &RequestContext,
) -> Result<Session, BlockingError> {
    loop {
        let payload = tokio::select! {
            biased;
            done = ctx.done() => return Err(match done {
                Done::Cancelled => BlockingError::Cancelled,
                Done::DeadlineExceeded => BlockingError::SessionUpdateNotReceived,
            }),
            payload = subscription.next_payload() => payload,
        };
        let Some(payload) = payload else {
            return Err(BlockingError::SessionUpdateNotReceived);
        };

        match decode(&payload) {
            Ok(Event::SessionSnapshot { session }) => return Ok(session),
            Ok(Event::ToolCompleted { session, kind: EnvelopeKind::SessionUpdate, .. })
                if session.last_interaction().is_some_and(Interaction::is_complete) =>
            {
                return Ok(session);
            }
            Ok(event) => debug!(kind = event.kind(), "Ignoring session event"),
            Err(e) => warn!(error = %e, "Skipping session event"),
        }
    }
}

/// Last interaction of a finished session; the one the response reports.
pub fn final_interaction(session: &Session) -> Result<&Interaction, BlockingError> {
    session
        .last_interaction()
        .ok_or(BlockingError::NoInteractions)
}
