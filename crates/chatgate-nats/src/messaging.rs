use crate::client::{FlushClient, PublishClient, RequestClient};
use async_nats::header::HeaderMap;
use opentelemetry::propagation::Injector;
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

struct HeaderMapCarrier<'a>(&'a mut HeaderMap);

impl Injector for HeaderMapCarrier<'_> {
    fn set(&mut self, key: &str, value: String) {
        self.0.insert(key, value.as_str());
    }
}

pub fn inject_trace_context(headers: &mut HeaderMap) {
    let cx = Span::current().context();
    opentelemetry::global::get_text_map_propagator(|propagator| {
        propagator.inject_context(&cx, &mut HeaderMapCarrier(headers));
    });
}

pub fn headers_with_trace_context() -> HeaderMap {
    let mut headers = HeaderMap::new();
    inject_trace_context(&mut headers);
    headers
}

/// A publish is attempted once; a failure goes straight back to the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublishOptions {
    /// Flush after publishing so the server has the message before we return.
    pub flush: bool,
}

impl PublishOptions {
    pub fn simple() -> Self {
        Self::default()
    }

    pub fn with_flush(mut self) -> Self {
        self.flush = true;
        self
    }
}

#[derive(Debug)]
pub enum NatsError {
    Serialize(serde_json::Error),
    Deserialize(serde_json::Error),
    Publish {
        subject: String,
        error: String,
    },
    Flush {
        subject: String,
        error: String,
    },
    Request {
        subject: String,
        error: String,
    },
    Timeout {
        subject: String,
    },
}

impl std::fmt::Display for NatsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serialize(e) => write!(f, "Failed to serialize request: {}", e),
            Self::Deserialize(e) => write!(f, "Failed to deserialize response: {}", e),
            Self::Publish { subject, error } => {
                write!(f, "Publish to '{}' failed: {}", subject, error)
            }
            Self::Flush { subject, error } => {
                write!(f, "Flush after publishing to '{}' failed: {}", subject, error)
            }
            Self::Request { subject, error } => {
                write!(f, "Request to '{}' failed: {}", subject, error)
            }
            Self::Timeout { subject } => write!(f, "Request to '{}' timed out", subject),
        }
    }
}

impl std::error::Error for NatsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Serialize(e) | Self::Deserialize(e) => Some(e),
            _ => None,
        }
    }
}

/// Serializes `message` as JSON and publishes it with the current trace context.
pub async fn publish_json<N, T>(
    client: &N,
    subject: &str,
    message: &T,
    options: PublishOptions,
) -> Result<(), NatsError>
where
    N: PublishClient + FlushClient,
    T: Serialize,
{
    let payload = bytes::Bytes::from(serde_json::to_vec(message).map_err(NatsError::Serialize)?);
    let headers = headers_with_trace_context();

    client
        .publish_with_headers(subject.to_string(), headers, payload)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, subject, "Publish failed");
            NatsError::Publish {
                subject: subject.to_string(),
                error: e.to_string(),
            }
        })?;

    if options.flush {
        client.flush().await.map_err(|e| NatsError::Flush {
            subject: subject.to_string(),
            error: e.to_string(),
        })?;
    }
    Ok(())
}

/// JSON request/reply bounded by `timeout`.
pub async fn request_json<N, Req, Res>(
    client: &N,
    subject: &str,
    request: &Req,
    timeout: Duration,
) -> Result<Res, NatsError>
where
    N: RequestClient,
    Req: Serialize,
    Res: DeserializeOwned,
{
    let payload = serde_json::to_vec(request).map_err(NatsError::Serialize)?;
    let headers = headers_with_trace_context();

    let response = tokio::time::timeout(
        timeout,
        client.request_with_headers(subject.to_string(), headers, payload.into()),
    )
    .await
    .map_err(|_| NatsError::Timeout {
        subject: subject.to_string(),
    })?
    .map_err(|e| NatsError::Request {
        subject: subject.to_string(),
        error: e.to_string(),
    })?;

    serde_json::from_slice(&response.payload).map_err(|e| {
        tracing::error!(
            payload = %String::from_utf8_lossy(&response.payload),
            error = %e,
            "Failed to deserialize NATS response"
        );
        NatsError::Deserialize(e)
    })
}
