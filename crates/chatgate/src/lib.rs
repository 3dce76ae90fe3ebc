//! Chat-completion HTTP API in front of a NATS worker pool.
//!
//! A request is turned into a [`Task`](chatgate_types::Task) on
//! `{prefix}.work.{owner}.{session}`; the worker's progress comes back on
//! `{prefix}.session.{owner}.{session}.updates` and is relayed either as an
//! SSE stream or as one blocking JSON completion.

pub mod auth;
pub mod bridge;
pub mod config;
pub mod context;
pub mod decoder;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod metrics;
pub mod render;
pub mod request;
pub mod responder;
pub mod server;
pub mod signal;
pub mod store;
pub mod subjects;
pub mod subscription;
pub mod telemetry;
pub mod token;

pub use auth::{ApiKeys, AuthError};
pub use bridge::{Bridge, Exchange};
pub use config::{Args, Config};
pub use context::{Done, RequestContext};
pub use decoder::{DecodeError, Event, decode};
pub use dispatcher::{DispatchError, Dispatcher};
pub use error::ApiError;
pub use http::{AppState, router};
pub use metrics::Metrics;
pub use render::Renderer;
pub use store::{SessionStore, StoreError};
pub use subscription::{SubscribeFailed, Subscription};
pub use token::{SubjectPrefix, SubjectToken, TokenError};
pub use chatgate_nats::{NatsAuth, NatsConfig};
