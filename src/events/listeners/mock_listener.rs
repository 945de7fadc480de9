//! Mock event listener for testing scenarios
//!
//! Captures every event it receives so tests can assert on the sequence the
//! assembler produced.
//!
//! ```rust,ignore
//! let mock = MockEventListener::new();
//! let captured = mock.get_captured_events();
//! dispatcher.register(Box::new(mock))?;
//! // ... run the operation ...
//! assert_eq!(captured.lock().unwrap().last().unwrap().event_type(), "send-tx-success");
//! ```

use std::error::Error;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::events::{EventListener, SendTransactionEvent};

/// Listener that records events in a shared vector
#[derive(Clone, Default)]
pub struct MockEventListener {
    captured_events: Arc<Mutex<Vec<SendTransactionEvent>>>,
    /// Event types that make `handle_event` fail
    fail_on: Vec<&'static str>,
}

impl MockEventListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail (after capturing) whenever an event of one of these types arrives
    pub fn failing_on(event_types: Vec<&'static str>) -> Self {
        Self {
            fail_on: event_types,
            ..Self::default()
        }
    }

    fn events(&self) -> MutexGuard<'_, Vec<SendTransactionEvent>> {
        self.captured_events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Shared handle to the captured events
    pub fn get_captured_events(&self) -> Arc<Mutex<Vec<SendTransactionEvent>>> {
        self.captured_events.clone()
    }

    pub fn event_count(&self) -> usize {
        self.events().len()
    }

    /// Event type names in the order they were received
    pub fn event_types(&self) -> Vec<&'static str> {
        self.events()
            .iter()
            .map(SendTransactionEvent::event_type)
            .collect()
    }

    pub fn event_type_count(&self, event_type: &str) -> usize {
        self.events()
            .iter()
            .filter(|event| event.event_type() == event_type)
            .count()
    }

    pub fn get_last_event(&self) -> Option<SendTransactionEvent> {
        self.events().last().cloned()
    }

    pub fn clear(&self) {
        self.events().clear();
    }
}

#[async_trait]
impl EventListener for MockEventListener {
    async fn handle_event(
        &mut self,
        event: &SendTransactionEvent,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.events().push(event.clone());
        if self.fail_on.contains(&event.event_type()) {
            return Err(format!("mock failure on {}", event.event_type()).into());
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "MockEventListener"
    }
}
