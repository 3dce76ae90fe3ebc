//! Read-only access to the session store over NATS request/reply.

use crate::subjects;
use crate::token::{SubjectPrefix, SubjectToken};
use chatgate_nats::{NatsError, RequestClient, request_json};
use chatgate_types::Session;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

#[derive(Debug, Serialize, Deserialize)]
pub struct GetSessionRequest {
    pub session_id: String,
}

/// `session` is absent when the id is unknown; `error` is set when the store
/// itself failed.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GetSessionReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session store unavailable: {0}")]
    Unavailable(#[from] NatsError),
    #[error("session store failed: {0}")]
    Failed(String),
}

#[derive(Clone)]
pub struct SessionStore<N> {
    client: N,
    subject: String,
    timeout: Duration,
}

impl<N: RequestClient> SessionStore<N> {
    pub fn new(client: N, prefix: &SubjectPrefix, timeout: Duration) -> Self {
        Self {
            client,
            subject: subjects::store_session_get(prefix),
            timeout,
        }
    }

    #[instrument(name = "chatgate.store.get", skip(self), fields(session_id = %session_id))]
    pub async fn get(&self, session_id: &SubjectToken) -> Result<Option<Session>, StoreError> {
        let request = GetSessionRequest {
            session_id: session_id.to_string(),
        };
        let reply: GetSessionReply =
            request_json(&self.client, &self.subject, &request, self.timeout)
                .await
                .inspect_err(|e| warn!(error = %e, "Session store request failed"))?;

        if let Some(error) = reply.error {
            warn!(error = %error, "Session store reported an error");
            return Err(StoreError::Failed(error));
        }
        debug!(found = reply.session.is_some(), "Session lookup");
        Ok(reply.session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatgate_nats::MockNatsClient;
    use serde_json::json;

    const SUBJECT: &str = "chatgate.store.session.get";

    fn store(bus: &MockNatsClient) -> SessionStore<MockNatsClient> {
        SessionStore::new(
            bus.clone(),
            &SubjectPrefix::new("chatgate").unwrap(),
            Duration::from_secs(1),
        )
    }

    fn id(value: &str) -> SubjectToken {
        SubjectToken::new("session_id", value).unwrap()
    }

    #[tokio::test]
    async fn returns_stored_session() {
        let bus = MockNatsClient::new();
        bus.set_response(
            SUBJECT,
            serde_json::to_vec(&json!({
                "session": {"id": "ses_1", "owner": "alice", "model_name": "llama3"}
            }))
            .unwrap(),
        );

        let session = store(&bus).get(&id("ses_1")).await.unwrap().unwrap();

        assert_eq!(session.owner, "alice");
        assert_eq!(session.model_name, "llama3");
        let (subject, payload) = &bus.requests()[0];
        assert_eq!(subject, SUBJECT);
        let sent: GetSessionRequest = serde_json::from_slice(payload).unwrap();
        assert_eq!(sent.session_id, "ses_1");
    }

    #[tokio::test]
    async fn unknown_session_is_none() {
        let bus = MockNatsClient::new();
        bus.set_response(SUBJECT, "{}");

        assert!(store(&bus).get(&id("ses_404")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn store_error_reply_is_failure() {
        let bus = MockNatsClient::new();
        bus.set_response(SUBJECT, r#"{"error":"database is locked"}"#);

        let err = store(&bus).get(&id("ses_1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Failed(ref e) if e == "database is locked"));
    }

    #[tokio::test]
    async fn request_failure_is_unavailable() {
        let bus = MockNatsClient::new();
        bus.fail_next_request();

        let err = store(&bus).get(&id("ses_1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
