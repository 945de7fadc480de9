//! Cancellation tokens for scheduled tasks
//!
//! A token is shared between the code that may cancel an operation and the
//! operation itself. The scheduler races the token against task completion;
//! tasks that want to stop early must observe the same token themselves.

use std::sync::Arc;

use tokio::sync::watch;

/// Cloneable cancellation token carrying the reason it was cancelled with
#[derive(Debug, Clone)]
pub struct CancellationToken {
    reason: Arc<watch::Sender<Option<String>>>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    /// Create a new token that has not been cancelled
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            reason: Arc::new(sender),
        }
    }

    /// Create a new pre-cancelled token
    pub fn cancelled_with(reason: impl Into<String>) -> Self {
        let token = Self::new();
        token.cancel(reason);
        token
    }

    /// Request cancellation; only the first reason is kept
    pub fn cancel(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.reason.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
    }

    /// Check if cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.reason.borrow().is_some()
    }

    pub fn reason(&self) -> Option<String> {
        self.reason.borrow().clone()
    }

    /// Resolve with the cancellation reason once the token is cancelled
    pub async fn cancelled(&self) -> String {
        let mut receiver = self.reason.subscribe();
        loop {
            if let Some(reason) = receiver.borrow_and_update().clone() {
                return reason;
            }
            if receiver.changed().await.is_err() {
                // sender lives as long as self, so this branch never completes
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancelled_resolves_with_first_reason() {
        let token = CancellationToken::new();
        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { token.cancelled().await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        token.cancel("user aborted");
        token.cancel("second reason");
        assert_eq!(waiter.await.unwrap(), "user aborted");
        assert_eq!(token.reason().as_deref(), Some("user aborted"));
    }

    #[tokio::test]
    async fn test_pre_cancelled_token() {
        let token = CancellationToken::cancelled_with("stop");
        assert!(token.is_cancelled());
        assert_eq!(token.cancelled().await, "stop");
    }
}
