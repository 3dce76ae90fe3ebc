//! One chat exchange end to end: resolve the session, subscribe to its
//! updates, dispatch the task, then answer streaming or blocking.
//!
//! The subscription is always open before the task is published. Every path
//! out of [`Bridge::open`], [`Bridge::stream`] and [`Bridge::block`] leaves the
//! subscription released.

use crate::context::RequestContext;
use crate::dispatcher::Dispatcher;
use crate::error::ApiError;
use crate::metrics::Metrics;
use crate::render::Renderer;
use crate::request::{
    QueryOverrides, RequestError, continuation_task, new_session_id, new_session_task,
    single_interaction,
};
use crate::responder::{self, FragmentSink, StreamEnd, StreamError, StreamSummary, final_interaction};
use crate::store::SessionStore;
use crate::subjects;
use crate::subscription::Subscription;
use crate::token::{SubjectPrefix, SubjectToken};
use chatgate_nats::{EventSubscriber, FlushClient, PublishClient, RequestClient, SubscribeClient};
use chatgate_std::{GetElapsed, GetNow, GetUnixTime};
use chatgate_types::{ChatCompletion, ChatRequest, Task};
use std::time::Duration;
use tracing::{info, instrument};

/// A dispatched task whose updates are being received.
pub struct Exchange<S: EventSubscriber> {
    pub task: Task,
    pub renderer: Renderer,
    pub subscription: Subscription<S>,
}

pub struct Bridge<N, C> {
    client: N,
    dispatcher: Dispatcher<N>,
    store: SessionStore<N>,
    prefix: SubjectPrefix,
    clock: C,
    metrics: Metrics,
}

impl<N, C> Bridge<N, C>
where
    N: SubscribeClient + PublishClient + FlushClient + RequestClient + Clone,
    C: GetNow + GetElapsed + GetUnixTime,
{
    pub fn new(client: N, prefix: SubjectPrefix, store_timeout: Duration, clock: C, metrics: Metrics) -> Self {
        Self {
            dispatcher: Dispatcher::new(client.clone(), prefix.clone()),
            store: SessionStore::new(client.clone(), &prefix, store_timeout),
            client,
            prefix,
            clock,
            metrics,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Builds the task for `request`, reading the stored session when the
    /// request continues one. The renderer echoes the model the caller asked
    /// for, or the stored session's model on continuation.
    #[instrument(name = "chatgate.prepare", skip_all, fields(owner = %owner, continuation = request.session_id.is_some()))]
    pub async fn prepare(
        &self,
        owner: &SubjectToken,
        request: &ChatRequest,
        overrides: &QueryOverrides,
    ) -> Result<(Task, Renderer), ApiError> {
        let interaction = single_interaction(&request.messages)?;

        let task = match request.session_id.as_deref().filter(|id| !id.is_empty()) {
            None => {
                let session_id = new_session_id().map_err(RequestError::from)?;
                new_session_task(owner, &session_id, request, overrides, interaction)
            }
            Some(session_id) => {
                let session_id = SubjectToken::new("session_id", session_id)
                    .map_err(RequestError::from)?;
                let session = self
                    .store
                    .get(&session_id)
                    .await?
                    .ok_or_else(|| ApiError::SessionNotFound(session_id.to_string()))?;
                if session.owner != owner.as_str() {
                    return Err(ApiError::ForeignSession(session_id.to_string()));
                }
                continuation_task(owner, &session, request, interaction)?
            }
        };

        let renderer = Renderer::new(task.session_id.clone(), task.model.clone());
        Ok((task, renderer))
    }

    /// Subscribes to the session's updates, then dispatches `task`. On dispatch
    /// failure the subscription is released and nothing is returned.
    #[instrument(name = "chatgate.open", skip_all, fields(owner = %task.owner, session_id = %task.session_id))]
    pub async fn open(
        &self,
        task: Task,
        renderer: Renderer,
    ) -> Result<Exchange<N::Subscriber>, ApiError> {
        let owner = SubjectToken::new("owner", &task.owner).map_err(RequestError::from)?;
        let session = SubjectToken::new("session_id", &task.session_id)
            .map_err(RequestError::from)?;
        let topic = subjects::session_updates(&self.prefix, &owner, &session);

        let mut subscription = Subscription::open(&self.client, topic).await?;
        if let Err(e) = self.dispatcher.dispatch(&task).await {
            subscription.release().await;
            return Err(e.into());
        }

        Ok(Exchange {
            task,
            renderer,
            subscription,
        })
    }

    /// Streams the exchange into `sink` until a terminal event, cancellation
    /// or the deadline in `ctx`.
    pub async fn stream<W: FragmentSink>(
        &self,
        exchange: Exchange<N::Subscriber>,
        mut sink: W,
        ctx: RequestContext,
    ) -> Result<StreamSummary, StreamError> {
        let started = self.clock.now();
        let Exchange {
            renderer,
            subscription,
            ..
        } = exchange;

        let result =
            responder::streaming::respond(subscription, &renderer, &mut sink, &ctx, &self.clock).await;

        let duration = self.clock.elapsed(started).as_secs_f64();
        match &result {
            Ok(summary) => {
                self.metrics.record_fragments(summary.fragments);
                let completed = summary.end == StreamEnd::Completed;
                self.metrics.record_request("stream", duration, completed);
                if summary.end == StreamEnd::SubscriptionEnded {
                    self.metrics.record_error("stream", "subscription_ended");
                }
            }
            Err(e) => {
                self.metrics.record_fragments(e.fragment);
                self.metrics.record_request("stream", duration, false);
                self.metrics.record_error("stream", "client_write_failed");
            }
        }
        result
    }

    /// Waits for the finished session and renders it as one completion.
    pub async fn block(
        &self,
        exchange: Exchange<N::Subscriber>,
        ctx: RequestContext,
    ) -> Result<ChatCompletion, ApiError> {
        let started = self.clock.now();
        let Exchange {
            renderer,
            subscription,
            ..
        } = exchange;

        let result = responder::blocking::respond(subscription, &ctx)
            .await
            .and_then(|session| {
                let interaction = final_interaction(&session)?;
                Ok(renderer.completion(interaction, self.clock.unix_seconds()))
            })
            .map_err(ApiError::from);

        let duration = self.clock.elapsed(started).as_secs_f64();
        self.metrics.record_request("blocking", duration, result.is_ok());
        match &result {
            Ok(completion) => info!(
                session_id = %completion.id,
                total_tokens = completion.usage.total_tokens,
                "Blocking response ready"
            ),
            Err(e) => self.metrics.record_error("blocking", e.reason()),
        }
        result
    }
}
