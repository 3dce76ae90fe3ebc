//! # chatgate-nats
//!
//! NATS plumbing shared by the chatgate crates.
//!
//! - Per-operation client traits so services depend only on what they use
//!   (monomorphized, no boxing)
//! - [`EventSubscriber`]: a subscription is a stream of messages plus an
//!   explicit unsubscribe
//! - Connection config from the environment and connect with reconnection
//! - JSON publish / request helpers that carry the current trace context
//! - An in-memory mock bus for tests (`test-support` feature)
//!
//! ```rust,no_run
//! use chatgate_nats::{NatsConfig, connect};
//! use chatgate_std::SystemEnv;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = NatsConfig::from_env(&SystemEnv);
//!     let client = connect(&config).await.expect("Failed to connect");
//! }
//! ```

pub mod auth;
pub mod client;
pub mod connect;
pub mod messaging;

#[cfg(any(test, feature = "test-support"))]
pub mod mocks;

pub use auth::{NatsAuth, NatsConfig};
pub use client::{
    EventSubscriber, FlushClient, PublishClient, RequestClient, SubscribeClient,
    UnsubscribeFailed,
};
pub use connect::{ConnectError, connect};
pub use messaging::{
    NatsError, PublishOptions, headers_with_trace_context, inject_trace_context, publish_json,
    request_json,
};

#[cfg(any(test, feature = "test-support"))]
pub use mocks::{BusOp, MockError, MockNatsClient, MockSubscriber};
