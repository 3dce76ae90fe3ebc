//! Relays worker output as it arrives.
//!
//! One opening fragment, one fragment per progress event, then exactly one
//! terminal fragment on worker-done or tool-completed. Session snapshots are
//! not a terminal signal here. After cancellation nothing more is written.

use super::FragmentSink;
use crate::context::{Done, RequestContext};
use crate::decoder::{Event, decode};
use crate::render::Renderer;
use crate::subscription::Subscription;
use chatgate_nats::EventSubscriber;
use chatgate_std::GetUnixTime;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// Terminal fragment written.
    Completed,
    /// Client went away or the deadline passed; nothing more was written.
    Stopped(Done),
    /// The subscription closed before any terminal event.
    SubscriptionEnded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    pub end: StreamEnd,
    pub fragments: usize,
}

#[derive(Debug, thiserror::Error)]
#[error("failed to write fragment {fragment} to client: {source}")]
pub struct StreamError {
    pub fragment: usize,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

struct Writer<'a, W, C> {
    sink: &'a mut W,
    renderer: &'a Renderer,
    clock: &'a C,
    ctx: &'a RequestContext,
    fragments: usize,
}

enum Step {
    Written,
    Stopped(Done),
}

impl<W: FragmentSink, C: GetUnixTime> Writer<'_, W, C> {
    async fn write(&mut self, text: Option<&str>, terminal: bool) -> Result<Step, StreamError> {
        let created = self.clock.unix_seconds();
        let chunk = match (text, terminal) {
            (None, _) => self.renderer.opening(created),
            (Some(text), false) => self.renderer.progress(text, created),
            (Some(text), true) => self.renderer.terminal(text, created),
        };
        let written = tokio::select! {
            biased;
            done = self.ctx.done() => return Ok(Step::Stopped(done)),
            written = self.sink.write(chunk) => written,
        };
        written.map_err(|e| StreamError {
            fragment: self.fragments,
            source: Box::new(e),
        })?;
        self.fragments += 1;
        Ok(Step::Written)
    }
}

/// Streams the exchange into `sink` and releases `subscription` before returning.
#[instrument(name = "chatgate.stream", skip_all, fields(session_id = %renderer.session_id(), model = %renderer.model()))]
pub async fn respond<S, W, C>(
    mut subscription: Subscription<S>,
    renderer: &Renderer,
    sink: &mut W,
    ctx: &RequestContext,
    clock: &C,
) -> Result<StreamSummary, StreamError>
where
    S: EventSubscriber,
    W: FragmentSink,
    C: GetUnixTime,
{
    let mut writer = Writer {
        sink,
        renderer,
        clock,
        ctx,
        fragments: 0,
    };
    let result = relay(&mut subscription, &mut writer).await;
    subscription.release().await;

    let fragments = writer.fragments;
    match result {
        Ok(end) => {
            match end {
                StreamEnd::Completed => info!(fragments, "Stream completed"),
                StreamEnd::Stopped(done) => info!(fragments, reason = ?done, "Stream stopped by client context"),
                StreamEnd::SubscriptionEnded => error!(
                    fragments,
                    subject = %subscription.subject(),
                    "Session updates ended before a terminal event"
                ),
            }
            Ok(StreamSummary { end, fragments })
        }
        Err(e) => {
            warn!(fragments, error = %e, "Stream aborted");
            Err(e)
        }
    }
}

async fn relay<S, W, C>(
    subscription: &mut Subscription<S>,
    writer: &mut Writer<'_, W, C>,
) -> Result<StreamEnd, StreamError>
where
    S: EventSubscriber,
    W: FragmentSink,
    C: GetUnixTime,
{
    if let Some(done) = writer.ctx.is_done() {
        return Ok(StreamEnd::Stopped(done));
    }
    if let Step::Stopped(done) = writer.write(None, false).await? {
        return Ok(StreamEnd::Stopped(done));
    }

    loop {
        let payload = tokio::select! {
            biased;
            done = writer.ctx.done() => return Ok(StreamEnd::Stopped(done)),
            payload = subscription.next_payload() => payload,
        };
        let Some(payload) = payload else {
            return Ok(StreamEnd::SubscriptionEnded);
        };

        let event = match decode(&payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Skipping session event");
                continue;
            }
        };
        debug!(kind = event.kind(), "Session event");

        let step = match event {
            Event::Progress { partial_text } => writer.write(Some(&partial_text), false).await?,
            Event::ToolCompleted { final_text, .. } => {
                return Ok(match writer.write(Some(&final_text), true).await? {
                    Step::Written => StreamEnd::Completed,
                    Step::Stopped(done) => StreamEnd::Stopped(done),
                });
            }
            Event::WorkerDone { .. } => {
                return Ok(match writer.write(Some(""), true).await? {
                    Step::Written => StreamEnd::Completed,
                    Step::Stopped(done) => StreamEnd::Stopped(done),
                });
            }
            Event::SessionSnapshot { .. } | Event::Ignorable => continue,
        };
        if let Step::Stopped(done) = step {
            return Ok(StreamEnd::Stopped(done));
        }
    }
}
