//! The two ways an exchange ends.
//!
//! Both consume an already-open [`Subscription`](crate::subscription::Subscription)
//! and release it on every exit path. They stop on different
//! signals: streaming on the worker's done or tool-completed marker, blocking
//! on a session update whose last interaction is complete.

pub mod blocking;
pub mod streaming;

use chatgate_types::ChatCompletionChunk;
use std::future::Future;
use tokio::sync::mpsc;

pub use blocking::{BlockingError, final_interaction};
pub use streaming::{StreamEnd, StreamError, StreamSummary};

/// Destination for streamed fragments, written in order.
pub trait FragmentSink: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    fn write(
        &mut self,
        chunk: ChatCompletionChunk,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

#[derive(Debug, thiserror::Error)]
#[error("client stream closed")]
pub struct ClientGone;

impl FragmentSink for mpsc::Sender<ChatCompletionChunk> {
    type Error = ClientGone;

    async fn write(&mut self, chunk: ChatCompletionChunk) -> Result<(), ClientGone> {
        mpsc::Sender::send(self, chunk).await.map_err(|_| ClientGone)
    }
}
