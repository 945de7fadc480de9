//! Built-in event listeners
//!
//! - [`ConsoleLoggingListener`]: logs events through `tracing`
//! - [`ChannelListener`]: forwards events to a tokio channel, e.g. for a UI task
//! - [`MockEventListener`]: captures events for assertions in tests

use std::error::Error;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::events::{EventListener, SendTransactionEvent};

pub mod console_logging;
pub mod mock_listener;

pub use console_logging::{ConsoleLoggingListener, LogLevel};
pub use mock_listener::MockEventListener;

/// Forwards every event to an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelListener {
    sender: mpsc::UnboundedSender<SendTransactionEvent>,
}

impl ChannelListener {
    /// Create a listener together with the receiving end of its channel
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SendTransactionEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl EventListener for ChannelListener {
    async fn handle_event(
        &mut self,
        event: &SendTransactionEvent,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.sender
            .send(event.clone())
            .map_err(|_| "event receiver dropped".into())
    }

    fn name(&self) -> &'static str {
        "ChannelListener"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_listener_forwards_events() {
        let (mut listener, mut receiver) = ChannelListener::new();
        let event = SendTransactionEvent::JobSubmitted {
            job_id: "job-1".to_string(),
        };
        listener.handle_event(&event).await.unwrap();
        assert_eq!(receiver.recv().await, Some(event.clone()));

        drop(receiver);
        assert!(listener.handle_event(&event).await.is_err());
    }
}
