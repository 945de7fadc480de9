use serde::{Deserialize, Serialize};

use crate::{
    data_structures::{
        address::Network,
        script::parse_output_script,
        transaction::Transaction,
        tx_data::DataInput,
    },
    errors::{WalletError, WalletResult},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryInput {
    pub tx_id: String,
    pub index: u8,
    pub token: String,
    pub value: u64,
    pub authorities: u8,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryOutput {
    pub value: u64,
    pub token: String,
    pub token_data: u8,
    /// `None` for data-carrier outputs
    pub address: Option<String>,
    pub timelock: Option<u32>,
    pub spent_by: Option<String>,
}

/// Record of a transaction as kept in the wallet's history cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxHistory {
    pub tx_id: String,
    pub version: u8,
    pub timestamp: u32,
    pub token_name: Option<String>,
    pub token_symbol: Option<String>,
    pub inputs: Vec<HistoryInput>,
    pub outputs: Vec<HistoryOutput>,
    pub is_voided: bool,
}

impl TxHistory {
    /// Build a history record from a pushed transaction and the inputs it spent
    pub fn from_transaction(
        tx: &Transaction,
        inputs: &[DataInput],
        network: &Network,
    ) -> WalletResult<Self> {
        let tx_id = tx.hash.clone().ok_or(WalletError::TransactionIsNull)?;
        let outputs = tx
            .outputs
            .iter()
            .map(|output| {
                let parsed = parse_output_script(&output.script, network);
                HistoryOutput {
                    value: output.value,
                    token: tx.output_token(output).unwrap_or_default(),
                    token_data: output.token_data,
                    address: parsed.as_ref().map(|p| p.address.to_string()),
                    timelock: parsed.and_then(|p| p.timelock),
                    spent_by: None,
                }
            })
            .collect();
        Ok(Self {
            tx_id,
            version: tx.version,
            timestamp: tx.timestamp,
            token_name: tx.token_info.as_ref().map(|i| i.name.clone()),
            token_symbol: tx.token_info.as_ref().map(|i| i.symbol.clone()),
            inputs: inputs
                .iter()
                .map(|i| HistoryInput {
                    tx_id: i.tx_id.clone(),
                    index: i.index,
                    token: i.token.clone(),
                    value: i.value,
                    authorities: i.authorities,
                    address: i.address.clone(),
                })
                .collect(),
            outputs,
            is_voided: false,
        })
    }
}
