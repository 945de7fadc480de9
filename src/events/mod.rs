//! Event system for transaction sending
//!
//! The assembler reports its progress through [`SendTransactionEvent`]s
//! delivered to registered [`EventListener`]s by an [`EventDispatcher`].
//! Listener failures are isolated: they are logged and never interrupt the
//! operation or other listeners.
//!
//! ```rust,ignore
//! use hathor_wallet_tx::events::{EventDispatcher, listeners::ConsoleLoggingListener};
//!
//! let mut dispatcher = EventDispatcher::new();
//! dispatcher.register(Box::new(ConsoleLoggingListener::default()))?;
//! ```

use std::collections::{HashMap, HashSet};
use std::error::Error;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

pub mod listeners;
pub mod types;

pub use types::*;

/// Errors that can occur during event dispatcher operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventDispatcherError {
    #[error("Listener with name '{0}' is already registered")]
    DuplicateListener(String),
    #[error("Cannot register listener: maximum of {max} listeners allowed, currently have {current}")]
    TooManyListeners { current: usize, max: usize },
    #[error("Invalid listener name: '{0}'")]
    InvalidListenerName(String),
}

#[derive(Debug, Default, Clone)]
pub struct EventStats {
    pub total_events_dispatched: usize,
    pub total_listener_calls: usize,
    pub total_listener_errors: usize,
    pub events_by_type: HashMap<&'static str, usize>,
    pub errors_by_listener: HashMap<String, usize>,
}

/// Trait for handling send-transaction events asynchronously
#[async_trait]
pub trait EventListener: Send + Sync {
    /// Handle an event
    ///
    /// Errors are logged by the dispatcher and do not reach the operation.
    async fn handle_event(
        &mut self,
        event: &SendTransactionEvent,
    ) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Name used for logging and duplicate detection
    fn name(&self) -> &'static str {
        "UnnamedListener"
    }

    fn wants_event(&self, _event: &SendTransactionEvent) -> bool {
        true
    }
}

/// Delivers events to listeners in registration order
#[derive(Default)]
pub struct EventDispatcher {
    listeners: Vec<Box<dyn EventListener>>,
    registered_names: HashSet<String>,
    max_listeners: Option<usize>,
    stats: EventStats,
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.registered_names)
            .field("max_listeners", &self.max_listeners)
            .finish()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dispatcher refusing more than `max_listeners` listeners
    pub fn new_with_limit(max_listeners: usize) -> Self {
        Self {
            max_listeners: Some(max_listeners),
            ..Self::default()
        }
    }

    /// Register a listener; names must be unique and non-blank
    pub fn register(
        &mut self,
        listener: Box<dyn EventListener>,
    ) -> Result<(), EventDispatcherError> {
        let listener_name = listener.name().to_string();
        if listener_name.trim().is_empty() {
            return Err(EventDispatcherError::InvalidListenerName(listener_name));
        }
        if self.registered_names.contains(&listener_name) {
            return Err(EventDispatcherError::DuplicateListener(listener_name));
        }
        if let Some(max) = self.max_listeners {
            if self.listeners.len() >= max {
                return Err(EventDispatcherError::TooManyListeners {
                    current: self.listeners.len(),
                    max,
                });
            }
        }

        debug!("Registering event listener: {}", listener_name);
        self.registered_names.insert(listener_name);
        self.listeners.push(listener);
        Ok(())
    }

    /// Dispatch an event to every interested listener
    pub async fn dispatch(&mut self, event: SendTransactionEvent) {
        let event_type = event.event_type();
        self.stats.total_events_dispatched += 1;
        *self.stats.events_by_type.entry(event_type).or_insert(0) += 1;

        for listener in &mut self.listeners {
            if !listener.wants_event(&event) {
                continue;
            }
            self.stats.total_listener_calls += 1;
            if let Err(e) = listener.handle_event(&event).await {
                let listener_name = listener.name().to_string();
                warn!("Event listener '{}' failed on {}: {}", listener_name, event_type, e);
                self.stats.total_listener_errors += 1;
                *self
                    .stats
                    .errors_by_listener
                    .entry(listener_name)
                    .or_insert(0) += 1;
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn get_stats(&self) -> EventStats {
        self.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::listeners::MockEventListener;

    struct FailingListener;

    #[async_trait]
    impl EventListener for FailingListener {
        async fn handle_event(
            &mut self,
            _event: &SendTransactionEvent,
        ) -> Result<(), Box<dyn Error + Send + Sync>> {
            Err("listener failure".into())
        }

        fn name(&self) -> &'static str {
            "FailingListener"
        }
    }

    #[tokio::test]
    async fn test_failing_listener_is_isolated() {
        let mut dispatcher = EventDispatcher::new();
        let mock = MockEventListener::new();
        let captured = mock.get_captured_events();
        dispatcher.register(Box::new(FailingListener)).unwrap();
        dispatcher.register(Box::new(mock)).unwrap();

        dispatcher
            .dispatch(SendTransactionEvent::SendTxSuccess {
                tx_id: "aa".to_string(),
            })
            .await;

        assert_eq!(captured.lock().unwrap().len(), 1);
        let stats = dispatcher.get_stats();
        assert_eq!(stats.total_listener_errors, 1);
        assert_eq!(stats.events_by_type["send-tx-success"], 1);
    }

    #[test]
    fn test_registration_validation() {
        let mut dispatcher = EventDispatcher::new_with_limit(1);
        dispatcher.register(Box::new(FailingListener)).unwrap();
        assert_eq!(
            dispatcher.register(Box::new(FailingListener)),
            Err(EventDispatcherError::DuplicateListener("FailingListener".to_string()))
        );
        assert!(matches!(
            dispatcher.register(Box::new(MockEventListener::new())),
            Err(EventDispatcherError::TooManyListeners { current: 1, max: 1 })
        ));
    }
}
