//! HTTP surface: authenticate, validate, open the exchange, then answer as an
//! SSE stream or a single JSON completion.

use crate::auth::ApiKeys;
use crate::bridge::Bridge;
use crate::config::Config;
use crate::context::RequestContext;
use crate::error::ApiError;
use crate::request::QueryOverrides;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use chatgate_nats::{FlushClient, PublishClient, RequestClient, SubscribeClient};
use chatgate_std::{GetElapsed, GetNow, GetUnixTime};
use chatgate_types::ChatRequest;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, instrument};

/// Fragments buffered between the exchange and a slow client.
const FRAGMENT_BUFFER: usize = 32;

pub struct AppState<N, C> {
    bridge: Arc<Bridge<N, C>>,
    api_keys: ApiKeys,
    response_timeout: Duration,
}

impl<N, C> Clone for AppState<N, C> {
    fn clone(&self) -> Self {
        Self {
            bridge: Arc::clone(&self.bridge),
            api_keys: self.api_keys.clone(),
            response_timeout: self.response_timeout,
        }
    }
}

impl<N, C> AppState<N, C> {
    pub fn new(bridge: Bridge<N, C>, config: &Config) -> Self {
        Self {
            bridge: Arc::new(bridge),
            api_keys: config.api_keys().clone(),
            response_timeout: config.response_timeout(),
        }
    }
}

/// Builds the router. Both chat paths share one handler.
pub fn router<N, C>(state: AppState<N, C>, max_body_bytes: usize) -> Router
where
    N: SubscribeClient + PublishClient + FlushClient + RequestClient,
    C: GetNow + GetElapsed + GetUnixTime + Send + Sync + 'static,
{
    Router::new()
        .route("/v1/chat/completions", post(chat::<N, C>))
        .route("/api/v1/sessions/chat", post(chat::<N, C>))
        .route("/healthz", get(healthz))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

#[instrument(
    name = "chatgate.chat",
    skip_all,
    fields(
        owner = tracing::field::Empty,
        session_id = tracing::field::Empty,
        stream = tracing::field::Empty,
    )
)]
async fn chat<N, C>(
    State(state): State<AppState<N, C>>,
    Query(overrides): Query<QueryOverrides>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError>
where
    N: SubscribeClient + PublishClient + FlushClient + RequestClient,
    C: GetNow + GetElapsed + GetUnixTime + Send + Sync + 'static,
{
    let owner = state.api_keys.authenticate(&headers)?;
    let request: ChatRequest =
        serde_json::from_slice(&body).map_err(|e| ApiError::InvalidBody(e.to_string()))?;

    let span = tracing::Span::current();
    span.record("owner", owner.as_str());
    span.record("stream", request.stream);

    let bridge = &state.bridge;
    let (task, renderer) = bridge.prepare(&owner, &request, &overrides).await.inspect_err(|e| {
        bridge.metrics().record_error("prepare", e.reason());
    })?;
    span.record("session_id", task.session_id.as_str());

    let exchange = bridge.open(task, renderer).await.inspect_err(|e| {
        bridge.metrics().record_error("open", e.reason());
    })?;

    if !request.stream {
        let ctx = RequestContext::with_timeout(CancellationToken::new(), state.response_timeout);
        let completion = bridge.block(exchange, ctx).await?;
        return Ok(Json(completion).into_response());
    }

    let (sender, receiver) = mpsc::channel(FRAGMENT_BUFFER);
    let token = CancellationToken::new();
    let ctx = RequestContext::with_timeout(token.clone(), state.response_timeout);
    let bridge = Arc::clone(&state.bridge);
    tokio::spawn(
        async move {
            if let Err(e) = bridge.stream(exchange, sender, ctx).await {
                debug!(error = %e, "Stream ended with client error");
            }
        }
        .instrument(span),
    );
    info!("Streaming response started");

    // Dropping the response body drops the guard and cancels the exchange.
    let client_gone = token.drop_guard();
    let events = ReceiverStream::new(receiver).map(move |chunk| {
        let _ = &client_gone;
        Event::default().json_data(chunk)
    });
    Ok(Sse::new(events).into_response())
}
