//! In-memory bus for tests.
//!
//! Publishes are delivered to matching subscriptions on the same mock, every
//! operation lands in a journal, and failures can be injected one at a time.

use crate::client::{
    EventSubscriber, FlushClient, PublishClient, RequestClient, SubscribeClient,
    UnsubscribeFailed,
};
use async_nats::subject::ToSubject;
use async_nats::{HeaderMap, Message};
use bytes::Bytes;
use futures::Stream;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct MockError(pub String);

impl std::fmt::Display for MockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for MockError {}

/// One bus operation as seen by the mock, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusOp {
    Subscribe(String),
    Publish(String),
    Unsubscribe(String),
    Request(String),
}

struct Registration {
    id: u64,
    subject: String,
    sender: Option<mpsc::UnboundedSender<Message>>,
}

struct Script {
    trigger: String,
    target: String,
    payloads: Vec<Bytes>,
}

#[derive(Default)]
struct BusState {
    journal: Vec<BusOp>,
    published: Vec<(String, Bytes)>,
    requests: Vec<(String, Bytes)>,
    registrations: Vec<Registration>,
    next_id: u64,
    responses: HashMap<String, Bytes>,
    scripts: Vec<Script>,
    fail_publish: bool,
    fail_subscribe: bool,
    fail_request: bool,
    fail_unsubscribe: bool,
}

impl BusState {
    fn deliver(&mut self, subject: &str, payload: Bytes) {
        for registration in &self.registrations {
            if !subject_matches(&registration.subject, subject) {
                continue;
            }
            if let Some(sender) = &registration.sender {
                let _ = sender.send(message(subject, payload.clone()));
            }
        }
    }

    fn release(&mut self, id: u64) -> Option<String> {
        let index = self.registrations.iter().position(|r| r.id == id)?;
        Some(self.registrations.remove(index).subject)
    }
}

fn message(subject: &str, payload: Bytes) -> Message {
    Message {
        subject: subject.into(),
        reply: None,
        length: payload.len(),
        payload,
        headers: None,
        status: None,
        description: None,
    }
}

/// NATS subject matching with `*` (one token) and `>` (one or more trailing tokens).
fn subject_matches(pattern: &str, subject: &str) -> bool {
    let mut subject_tokens = subject.split('.');
    for token in pattern.split('.') {
        match (token, subject_tokens.next()) {
            (">", Some(_)) => return true,
            ("*", Some(_)) => {}
            (expected, Some(actual)) if expected == actual => {}
            _ => return false,
        }
    }
    subject_tokens.next().is_none()
}

#[derive(Clone, Default)]
pub struct MockNatsClient {
    state: Arc<Mutex<BusState>>,
}

impl std::fmt::Debug for MockNatsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("MockNatsClient")
            .field("journal", &state.journal)
            .field("subscriptions", &state.registrations.len())
            .finish()
    }
}

impl MockNatsClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every subscribe, publish, unsubscribe and request so far, in order.
    pub fn journal(&self) -> Vec<BusOp> {
        self.state.lock().unwrap().journal.clone()
    }

    pub fn published(&self) -> Vec<(String, Bytes)> {
        self.state.lock().unwrap().published.clone()
    }

    pub fn requests(&self) -> Vec<(String, Bytes)> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Subjects of subscriptions that are still registered.
    pub fn active_subscriptions(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .registrations
            .iter()
            .map(|r| r.subject.clone())
            .collect()
    }

    /// Delivers `payload` on `subject` as if another client had published it.
    pub fn emit(&self, subject: &str, payload: impl Into<Bytes>) {
        self.state.lock().unwrap().deliver(subject, payload.into());
    }

    /// When something is published on `trigger`, deliver `payloads` on `target`
    /// before the publish call returns. Fires once.
    pub fn script_on_publish<P: Into<Bytes>>(
        &self,
        trigger: &str,
        target: &str,
        payloads: impl IntoIterator<Item = P>,
    ) {
        self.state.lock().unwrap().scripts.push(Script {
            trigger: trigger.to_string(),
            target: target.to_string(),
            payloads: payloads.into_iter().map(Into::into).collect(),
        });
    }

    /// Ends the message stream of every subscription matching `subject`,
    /// like a server-side close. The subscriptions stay registered.
    pub fn close_subscriptions(&self, subject: &str) {
        let mut state = self.state.lock().unwrap();
        for registration in &mut state.registrations {
            if subject_matches(&registration.subject, subject) {
                registration.sender = None;
            }
        }
    }

    pub fn set_response(&self, subject: &str, response: impl Into<Bytes>) {
        self.state
            .lock()
            .unwrap()
            .responses
            .insert(subject.to_string(), response.into());
    }

    pub fn fail_next_publish(&self) {
        self.state.lock().unwrap().fail_publish = true;
    }

    pub fn fail_next_subscribe(&self) {
        self.state.lock().unwrap().fail_subscribe = true;
    }

    pub fn fail_next_request(&self) {
        self.state.lock().unwrap().fail_request = true;
    }

    pub fn fail_next_unsubscribe(&self) {
        self.state.lock().unwrap().fail_unsubscribe = true;
    }
}

impl SubscribeClient for MockNatsClient {
    type SubscribeError = MockError;
    type Subscriber = MockSubscriber;

    async fn subscribe<S: ToSubject + Send>(&self, subject: S) -> Result<MockSubscriber, MockError> {
        let subject = subject.to_subject().to_string();
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.fail_subscribe) {
            return Err(MockError("simulated subscribe failure".to_string()));
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        state.next_id += 1;
        let id = state.next_id;
        state.registrations.push(Registration {
            id,
            subject: subject.clone(),
            sender: Some(sender),
        });
        state.journal.push(BusOp::Subscribe(subject));

        Ok(MockSubscriber {
            id,
            state: Arc::clone(&self.state),
            receiver,
            released: false,
        })
    }
}

impl PublishClient for MockNatsClient {
    type PublishError = MockError;

    async fn publish_with_headers<S: ToSubject + Send>(
        &self,
        subject: S,
        _headers: HeaderMap,
        payload: Bytes,
    ) -> Result<(), MockError> {
        let subject = subject.to_subject().to_string();
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.fail_publish) {
            return Err(MockError("simulated publish failure".to_string()));
        }

        state.journal.push(BusOp::Publish(subject.clone()));
        state.published.push((subject.clone(), payload.clone()));
        state.deliver(&subject, payload);

        let (fired, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut state.scripts)
            .into_iter()
            .partition(|script| subject_matches(&script.trigger, &subject));
        state.scripts = pending;
        for script in fired {
            for payload in script.payloads {
                state.deliver(&script.target, payload);
            }
        }
        Ok(())
    }
}

impl FlushClient for MockNatsClient {
    type FlushError = MockError;

    async fn flush(&self) -> Result<(), MockError> {
        Ok(())
    }
}

impl RequestClient for MockNatsClient {
    type RequestError = MockError;

    async fn request_with_headers<S: ToSubject + Send>(
        &self,
        subject: S,
        _headers: HeaderMap,
        payload: Bytes,
    ) -> Result<Message, MockError> {
        let subject = subject.to_subject().to_string();
        let mut state = self.state.lock().unwrap();
        state.journal.push(BusOp::Request(subject.clone()));
        state.requests.push((subject.clone(), payload));
        if std::mem::take(&mut state.fail_request) {
            return Err(MockError("simulated request failure".to_string()));
        }

        match state.responses.get(&subject) {
            Some(response) => Ok(message(&subject, response.clone())),
            None => Err(MockError(format!(
                "no response configured for subject: {}",
                subject
            ))),
        }
    }
}

pub struct MockSubscriber {
    id: u64,
    state: Arc<Mutex<BusState>>,
    receiver: mpsc::UnboundedReceiver<Message>,
    released: bool,
}

impl Stream for MockSubscriber {
    type Item = Message;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Message>> {
        self.receiver.poll_recv(cx)
    }
}

impl EventSubscriber for MockSubscriber {
    async fn unsubscribe(&mut self) -> Result<(), UnsubscribeFailed> {
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.fail_unsubscribe) {
            return Err(UnsubscribeFailed("simulated unsubscribe failure".to_string()));
        }
        if self.released {
            return Ok(());
        }
        self.released = true;
        if let Some(subject) = state.release(self.id) {
            state.journal.push(BusOp::Unsubscribe(subject));
        }
        self.receiver.close();
        Ok(())
    }
}

impl Drop for MockSubscriber {
    fn drop(&mut self) {
        if !self.released {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.release(self.id);
        }
    }
}
