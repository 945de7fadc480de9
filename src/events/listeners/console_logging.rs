//! Logging listener forwarding send-transaction events to `tracing`

use std::error::Error;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{EventListener, SendTransactionEvent};

/// Which events get logged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Only failures
    ErrorsOnly,
    /// Start, success, failures and mining milestones
    #[default]
    Normal,
    /// Everything, including estimation updates
    Verbose,
}

impl LogLevel {
    pub fn should_log(&self, event: &SendTransactionEvent) -> bool {
        match self {
            LogLevel::ErrorsOnly => event.is_error(),
            LogLevel::Normal => !matches!(event, SendTransactionEvent::EstimationUpdated { .. }),
            LogLevel::Verbose => true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConsoleLoggingListener {
    log_level: LogLevel,
}

impl ConsoleLoggingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }
}

#[async_trait]
impl EventListener for ConsoleLoggingListener {
    async fn handle_event(
        &mut self,
        event: &SendTransactionEvent,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        if !self.log_level.should_log(event) {
            return Ok(());
        }
        match event {
            SendTransactionEvent::SendTxStart { tx_hex } => {
                info!("Sending transaction ({} bytes)", tx_hex.len() / 2)
            }
            SendTransactionEvent::MineTxStarted { .. } => info!("Mining transaction"),
            SendTransactionEvent::JobSubmitted { job_id } => info!("Mining job {} submitted", job_id),
            SendTransactionEvent::EstimationUpdated { job_id, estimation } => {
                debug!("Mining job {} estimation: {:?}s", job_id, estimation)
            }
            SendTransactionEvent::JobDone { job_id, data } => {
                info!("Mining job {} done with nonce {}", job_id, data.nonce)
            }
            SendTransactionEvent::MineTxEnded { data } => {
                info!("Mining ended at timestamp {}", data.timestamp)
            }
            SendTransactionEvent::SendTxSuccess { tx_id } => info!("Transaction {} pushed", tx_id),
            SendTransactionEvent::SendError { message, inputs } if inputs.is_empty() => {
                warn!("Send failed: {}", message)
            }
            SendTransactionEvent::SendError { message, inputs } => {
                let refs: Vec<String> = inputs.iter().map(ToString::to_string).collect();
                warn!("Send failed: {} (inputs: {})", message, refs.join(", "))
            }
            SendTransactionEvent::UnexpectedError { message } => {
                error!("Unexpected error while sending: {}", message)
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "ConsoleLoggingListener"
    }

    fn wants_event(&self, event: &SendTransactionEvent) -> bool {
        self.log_level.should_log(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_filtering() {
        let estimation = SendTransactionEvent::EstimationUpdated {
            job_id: "job".to_string(),
            estimation: Some(3),
        };
        let failure = SendTransactionEvent::UnexpectedError {
            message: "x".to_string(),
        };
        assert!(!LogLevel::Normal.should_log(&estimation));
        assert!(LogLevel::Verbose.should_log(&estimation));
        assert!(LogLevel::ErrorsOnly.should_log(&failure));
        assert!(!LogLevel::ErrorsOnly.should_log(&SendTransactionEvent::SendTxSuccess {
            tx_id: "aa".to_string()
        }));
    }
}
