//! Hands a task to the worker pool.
//!
//! Callers must already hold the session's update subscription when calling
//! [`Dispatcher::dispatch`]; a fast worker would otherwise publish into the void.

use crate::subjects;
use crate::token::{SubjectPrefix, SubjectToken, TokenError};
use chatgate_nats::{FlushClient, NatsError, PublishClient, PublishOptions, publish_json};
use chatgate_types::Task;
use tracing::{info, instrument, warn};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("task cannot be addressed: {0}")]
    InvalidAddress(#[from] TokenError),
    #[error("failed to start work: {0}")]
    Publish(#[from] NatsError),
}

#[derive(Clone)]
pub struct Dispatcher<N> {
    client: N,
    prefix: SubjectPrefix,
}

impl<N: PublishClient + FlushClient> Dispatcher<N> {
    pub fn new(client: N, prefix: SubjectPrefix) -> Self {
        Self { client, prefix }
    }

    /// Publishes `task` once to `{prefix}.work.{owner}.{session}` and flushes,
    /// so enqueue failures surface here. No retries.
    #[instrument(name = "chatgate.dispatch", skip(self, task), fields(owner = %task.owner, session_id = %task.session_id))]
    pub async fn dispatch(&self, task: &Task) -> Result<(), DispatchError> {
        let owner = SubjectToken::new("owner", &task.owner)?;
        let session = SubjectToken::new("session_id", &task.session_id)?;
        let subject = subjects::work_queue(&self.prefix, &owner, &session);

        match publish_json(&self.client, &subject, task, PublishOptions::simple().with_flush()).await
        {
            Ok(()) => {
                info!(subject = %subject, mode = ?task.mode, "Task dispatched");
                Ok(())
            }
            Err(e) => {
                warn!(subject = %subject, error = %e, "Task dispatch failed");
                Err(e.into())
            }
        }
    }
}
