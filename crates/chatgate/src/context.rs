//! Per-request cancellation: client disconnect or the request deadline,
//! whichever comes first.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Done {
    Cancelled,
    DeadlineExceeded,
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    pub fn with_timeout(token: CancellationToken, timeout: Duration) -> Self {
        Self {
            token,
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Resolves once the request is cancelled or its deadline passes.
    pub async fn done(&self) -> Done {
        let deadline = async {
            match self.deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Done::Cancelled,
            _ = deadline => Done::DeadlineExceeded,
        }
    }

    pub fn is_done(&self) -> Option<Done> {
        if self.token.is_cancelled() {
            Some(Done::Cancelled)
        } else if self.deadline.is_some_and(|at| Instant::now() >= at) {
            Some(Done::DeadlineExceeded)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_resolves_done() {
        let token = CancellationToken::new();
        let ctx = RequestContext::new(token.clone());
        assert_eq!(ctx.is_done(), None);

        token.cancel();

        assert_eq!(ctx.is_done(), Some(Done::Cancelled));
        assert_eq!(ctx.done().await, Done::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_resolves_done() {
        let ctx = RequestContext::with_timeout(CancellationToken::new(), Duration::from_secs(30));

        tokio::time::advance(Duration::from_secs(29)).await;
        assert_eq!(ctx.is_done(), None);

        assert_eq!(ctx.done().await, Done::DeadlineExceeded);
        assert_eq!(ctx.is_done(), Some(Done::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_wins_over_elapsed_deadline() {
        let token = CancellationToken::new();
        let ctx = RequestContext::with_timeout(token.clone(), Duration::from_secs(1));
        tokio::time::advance(Duration::from_secs(2)).await;
        token.cancel();

        assert_eq!(ctx.done().await, Done::Cancelled);
    }
}
