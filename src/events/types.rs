//! Event types emitted while a transaction is being sent

use serde::{Deserialize, Serialize};

use crate::{data_structures::transaction::MinedTxData, errors::OutputRef};

/// Lifecycle events of [`crate::send_transaction::SendTransaction`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SendTransactionEvent {
    /// The mined transaction is about to be pushed
    SendTxStart { tx_hex: String },
    MineTxStarted { tx_hex: String },
    /// The mining service accepted the job
    JobSubmitted { job_id: String },
    /// New time estimate, in seconds, from the mining service
    EstimationUpdated { job_id: String, estimation: Option<u64> },
    JobDone { job_id: String, data: MinedTxData },
    MineTxEnded { data: MinedTxData },
    /// The network accepted the transaction
    SendTxSuccess { tx_id: String },
    /// A known failure; `inputs` lists offending outputs when relevant
    SendError {
        message: String,
        inputs: Vec<OutputRef>,
    },
    /// A failure that should not happen with valid collaborators
    UnexpectedError { message: String },
}

impl SendTransactionEvent {
    /// Stable kebab-case name of the event
    pub fn event_type(&self) -> &'static str {
        match self {
            SendTransactionEvent::SendTxStart { .. } => "send-tx-start",
            SendTransactionEvent::MineTxStarted { .. } => "mine-tx-started",
            SendTransactionEvent::JobSubmitted { .. } => "job-submitted",
            SendTransactionEvent::EstimationUpdated { .. } => "estimation-updated",
            SendTransactionEvent::JobDone { .. } => "job-done",
            SendTransactionEvent::MineTxEnded { .. } => "mine-tx-ended",
            SendTransactionEvent::SendTxSuccess { .. } => "send-tx-success",
            SendTransactionEvent::SendError { .. } => "send-error",
            SendTransactionEvent::UnexpectedError { .. } => "unexpected-error",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            SendTransactionEvent::SendError { .. } | SendTransactionEvent::UnexpectedError { .. }
        )
    }
}
