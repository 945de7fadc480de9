//! Full-node API used to push transactions

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::WalletResult;

/// Response of the full node to a push
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushTxResponse {
    pub success: bool,
    /// Rejection reason when `success` is false
    pub message: Option<String>,
}

impl PushTxResponse {
    pub fn accepted() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

#[async_trait]
pub trait NetworkApi: Send + Sync {
    /// Push a signed, mined transaction
    ///
    /// A rejection by the node is an `Ok` response with `success == false`;
    /// `Err` is reserved for transport failures.
    async fn push_tx(&self, tx_hex: &str) -> WalletResult<PushTxResponse>;
}
