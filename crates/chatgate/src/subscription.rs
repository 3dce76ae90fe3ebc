//! A session's update subscription, owned by one exchange.

use bytes::Bytes;
use chatgate_nats::{EventSubscriber, SubscribeClient};
use futures::StreamExt;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
#[error("failed to subscribe to '{subject}': {reason}")]
pub struct SubscribeFailed {
    pub subject: String,
    pub reason: String,
}

/// Open subscription to one subject.
///
/// [`release`](Subscription::release) may be called any number of times;
/// only the first call unsubscribes. Dropping an unreleased subscription
/// also stops delivery.
pub struct Subscription<S: EventSubscriber> {
    subject: String,
    inner: S,
    released: bool,
}

impl<S: EventSubscriber> Subscription<S> {
    pub async fn open<N>(client: &N, subject: String) -> Result<Self, SubscribeFailed>
    where
        N: SubscribeClient<Subscriber = S>,
    {
        let inner = client
            .subscribe(subject.clone())
            .await
            .map_err(|e| SubscribeFailed {
                subject: subject.clone(),
                reason: e.to_string(),
            })?;
        debug!(subject = %subject, "Subscribed to session updates");
        Ok(Self {
            subject,
            inner,
            released: false,
        })
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Next payload in delivery order; `None` once the subscription ends.
    pub async fn next_payload(&mut self) -> Option<Bytes> {
        if self.released {
            return None;
        }
        self.inner.next().await.map(|message| message.payload)
    }

    pub async fn release(&mut self) {
        if std::mem::replace(&mut self.released, true) {
            return;
        }
        match self.inner.unsubscribe().await {
            Ok(()) => debug!(subject = %self.subject, "Unsubscribed from session updates"),
            Err(e) => warn!(subject = %self.subject, error = %e, "Failed to unsubscribe"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatgate_nats::{BusOp, MockNatsClient};

    #[tokio::test]
    async fn open_then_receive_in_order() {
        let bus = MockNatsClient::new();
        let mut sub = Subscription::open(&bus, "chatgate.session.a.s.updates".into())
            .await
            .unwrap();

        bus.emit("chatgate.session.a.s.updates", "one");
        bus.emit("chatgate.session.a.s.updates", "two");

        assert_eq!(sub.next_payload().await.unwrap(), "one");
        assert_eq!(sub.next_payload().await.unwrap(), "two");
        assert_eq!(sub.subject(), "chatgate.session.a.s.updates");
    }

    #[tokio::test]
    async fn release_twice_unsubscribes_once() {
        let bus = MockNatsClient::new();
        let mut sub = Subscription::open(&bus, "updates".into()).await.unwrap();

        sub.release().await;
        sub.release().await;

        assert!(sub.is_released());
        assert!(bus.active_subscriptions().is_empty());
        assert_eq!(
            bus.journal(),
            vec![
                BusOp::Subscribe("updates".into()),
                BusOp::Unsubscribe("updates".into())
            ]
        );
        assert!(sub.next_payload().await.is_none());
    }

    #[tokio::test]
    async fn failed_unsubscribe_is_logged_not_raised() {
        let bus = MockNatsClient::new();
        let mut sub = Subscription::open(&bus, "updates".into()).await.unwrap();
        bus.fail_next_unsubscribe();

        sub.release().await;
        sub.release().await;

        assert!(sub.is_released());
    }

    #[tokio::test]
    async fn open_failure_reports_subject() {
        let bus = MockNatsClient::new();
        bus.fail_next_subscribe();

        let err = Subscription::open(&bus, "updates".into()).await.err().unwrap();
        assert_eq!(err.subject, "updates");
        assert!(bus.active_subscriptions().is_empty());
    }

    #[tokio::test]
    async fn drop_releases_registration() {
        let bus = MockNatsClient::new();
        let sub = Subscription::open(&bus, "updates".into()).await.unwrap();
        drop(sub);
        assert!(bus.active_subscriptions().is_empty());
    }
}
