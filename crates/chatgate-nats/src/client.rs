use async_nats::subject::ToSubject;
use async_nats::{Client as NatsAsyncClient, HeaderMap, Message, Subscriber};
use bytes::Bytes;
use futures::Stream;
use std::error::Error;
use std::future::Future;

/// Error returned when an unsubscribe request could not be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubscribeFailed(pub String);

impl std::fmt::Display for UnsubscribeFailed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to unsubscribe: {}", self.0)
    }
}

impl Error for UnsubscribeFailed {}

/// A live subscription: the messages delivered to it, in delivery order, and
/// a way to stop delivery.
///
/// Dropping the handle also stops delivery; `unsubscribe` exists so exit paths
/// can release it explicitly and observe failures.
pub trait EventSubscriber: Stream<Item = Message> + Send + Unpin + 'static {
    fn unsubscribe(&mut self) -> impl Future<Output = Result<(), UnsubscribeFailed>> + Send;
}

pub trait SubscribeClient: Send + Sync + Clone + 'static {
    type SubscribeError: Error + Send + Sync;
    type Subscriber: EventSubscriber;

    fn subscribe<S: ToSubject + Send>(
        &self,
        subject: S,
    ) -> impl Future<Output = Result<Self::Subscriber, Self::SubscribeError>> + Send;
}

pub trait RequestClient: Send + Sync + Clone + 'static {
    type RequestError: Error + Send + Sync;

    fn request_with_headers<S: ToSubject + Send>(
        &self,
        subject: S,
        headers: HeaderMap,
        payload: Bytes,
    ) -> impl Future<Output = Result<Message, Self::RequestError>> + Send;
}

pub trait PublishClient: Send + Sync + Clone + 'static {
    type PublishError: Error + Send + Sync;

    fn publish_with_headers<S: ToSubject + Send>(
        &self,
        subject: S,
        headers: HeaderMap,
        payload: Bytes,
    ) -> impl Future<Output = Result<(), Self::PublishError>> + Send;
}

pub trait FlushClient: Send + Sync + Clone + 'static {
    type FlushError: Error + Send + Sync;

    fn flush(&self) -> impl Future<Output = Result<(), Self::FlushError>> + Send;
}

impl EventSubscriber for Subscriber {
    async fn unsubscribe(&mut self) -> Result<(), UnsubscribeFailed> {
        Subscriber::unsubscribe(self)
            .await
            .map_err(|e| UnsubscribeFailed(e.to_string()))
    }
}

impl SubscribeClient for NatsAsyncClient {
    type SubscribeError = async_nats::client::SubscribeError;
    type Subscriber = Subscriber;

    async fn subscribe<S: ToSubject + Send>(
        &self,
        subject: S,
    ) -> Result<Subscriber, Self::SubscribeError> {
        NatsAsyncClient::subscribe(self, subject).await
    }
}

impl RequestClient for NatsAsyncClient {
    type RequestError = async_nats::client::RequestError;

    async fn request_with_headers<S: ToSubject + Send>(
        &self,
        subject: S,
        headers: HeaderMap,
        payload: Bytes,
    ) -> Result<Message, Self::RequestError> {
        NatsAsyncClient::request_with_headers(self, subject, headers, payload).await
    }
}

impl PublishClient for NatsAsyncClient {
    type PublishError = async_nats::client::PublishError;

    async fn publish_with_headers<S: ToSubject + Send>(
        &self,
        subject: S,
        headers: HeaderMap,
        payload: Bytes,
    ) -> Result<(), Self::PublishError> {
        NatsAsyncClient::publish_with_headers(self, subject, headers, payload).await
    }
}

impl FlushClient for NatsAsyncClient {
    type FlushError = async_nats::client::FlushError;

    async fn flush(&self) -> Result<(), Self::FlushError> {
        NatsAsyncClient::flush(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsubscribe_failed_display_includes_reason() {
        let err = UnsubscribeFailed("connection closed".to_string());
        assert_eq!(err.to_string(), "Failed to unsubscribe: connection closed");
    }
}
