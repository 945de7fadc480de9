//! Proof-of-work mining collaborator
//!
//! Transactions are mined by a remote service: the assembler submits the
//! serialized transaction, then polls the job until it is done or fails.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{data_structures::transaction::MinedTxData, errors::WalletResult};

/// State of a submitted mining job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    /// Still mining; `estimation` is the expected remaining time in seconds
    Pending { estimation: Option<u64> },
    Done(MinedTxData),
    Failed { message: String },
}

#[async_trait]
pub trait MiningService: Send + Sync {
    /// Submit a serialized transaction and return the job id
    async fn submit_job(&self, tx_hex: &str) -> WalletResult<String>;

    async fn poll_job(&self, job_id: &str) -> WalletResult<JobStatus>;
}
