use crate::auth::AuthError;
use crate::dispatcher::DispatchError;
use crate::request::RequestError;
use crate::responder::BlockingError;
use crate::store::StoreError;
use crate::subscription::SubscribeFailed;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Everything a chat request can fail with before or instead of a response body.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Unauthorized(#[from] AuthError),
    #[error("invalid request body: {0}")]
    InvalidBody(String),
    #[error(transparent)]
    InvalidRequest(#[from] RequestError),
    #[error("session {0} not found")]
    SessionNotFound(String),
    #[error("session {0} belongs to another user")]
    ForeignSession(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Subscribe(#[from] SubscribeFailed),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Blocking(#[from] BlockingError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::InvalidBody(_) | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Self::ForeignSession(_) => StatusCode::FORBIDDEN,
            Self::Store(_) => StatusCode::BAD_GATEWAY,
            Self::Blocking(BlockingError::SessionUpdateNotReceived) => StatusCode::GATEWAY_TIMEOUT,
            Self::Subscribe(_) | Self::Dispatch(_) | Self::Blocking(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Low-cardinality label for the error counter.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::InvalidBody(_) => "invalid_body",
            Self::InvalidRequest(_) => "invalid_request",
            Self::SessionNotFound(_) => "session_not_found",
            Self::ForeignSession(_) => "foreign_session",
            Self::Store(_) => "store_unavailable",
            Self::Subscribe(_) => "subscribe_failed",
            Self::Dispatch(_) => "dispatch_failed",
            Self::Blocking(BlockingError::SessionUpdateNotReceived) => "session_update_not_received",
            Self::Blocking(BlockingError::Cancelled) => "cancelled",
            Self::Blocking(BlockingError::NoInteractions) => "no_interactions",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Chat request failed");
        } else {
            tracing::info!(error = %self, status = status.as_u16(), "Chat request rejected");
        }
        (status, self.to_string()).into_response()
    }
}
