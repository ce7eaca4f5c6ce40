//! Request-scoped cancellation and deadline
//!
//! Passed through every classifier stage down to the store. There is no
//! per-strategy timeout; the deadline covers the whole request.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Context with no deadline that is never cancelled unless asked to
    pub fn new() -> Self {
        Self::default()
    }

    /// Context that expires `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Child context sharing the cancellation tree and deadline
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Fail fast when the caller cancelled or the deadline passed
    pub fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(Error::DeadlineExceeded);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_context_is_live() {
        assert!(RequestContext::new().check().is_ok());
    }

    #[test]
    fn test_cancel_propagates_to_child() {
        let parent = RequestContext::new();
        let child = parent.child();
        parent.cancel();
        assert!(matches!(child.check(), Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_expired_deadline() {
        let ctx = RequestContext::with_timeout(Duration::from_millis(0));
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(matches!(ctx.check(), Err(Error::DeadlineExceeded)));
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
    }
}
