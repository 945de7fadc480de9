//! Error types for wallet transaction operations
//!
//! All fallible operations in this crate return [`WalletResult`]. Errors raised
//! while assembling a transaction are also reported to registered event
//! listeners as [`crate::events::SendTransactionEvent::SendError`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reference to a transaction output, used both as a reservation key and as
/// diagnostic payload on input errors
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutputRef {
    pub tx_id: String,
    pub index: u8,
}

impl OutputRef {
    pub fn new(tx_id: impl Into<String>, index: u8) -> Self {
        Self {
            tx_id: tx_id.into(),
            index,
        }
    }
}

impl fmt::Display for OutputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_id, self.index)
    }
}

/// Errors produced while encoding or decoding wire data
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializationError {
    #[error("Unknown token info version: {0}")]
    UnknownTokenInfoVersion(u8),
    #[error("Token name cannot be empty")]
    EmptyTokenName,
    #[error("Token symbol cannot be empty")]
    EmptyTokenSymbol,
    #[error("Field '{field}' is too long: {len} bytes (max {max})")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
    #[error("Unexpected end of buffer while reading {0}")]
    UnexpectedEof(&'static str),
    #[error("Invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),
    #[error("Invalid token uid: {0}")]
    InvalidTokenUid(String),
    #[error("Unknown header id: {0:#04x}")]
    UnknownHeader(u8),
    #[error("Hex decoding error: {0}")]
    HexDecodingError(String),
    #[error("JSON serialization error: {0}")]
    JsonSerializationError(String),
    #[error("JSON deserialization error: {0}")]
    JsonDeserializationError(String),
    #[error("{0} trailing bytes after transaction")]
    TrailingBytes(usize),
}

impl From<hex::FromHexError> for SerializationError {
    fn from(err: hex::FromHexError) -> Self {
        SerializationError::HexDecodingError(err.to_string())
    }
}

/// Errors produced by the task scheduler
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("Task aborted: {0}")]
    Aborted(String),
    #[error("Concurrency must be at least 1, got {0}")]
    InvalidConcurrency(usize),
    #[error("Task was dropped before completing")]
    TaskDropped,
}

/// Main error type for wallet transaction operations
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Invalid input: {message}")]
    InvalidInput {
        message: String,
        inputs: Vec<OutputRef>,
    },
    #[error("Insufficient funds of token {token}: requested {requested}, available {available}")]
    InsufficientFunds {
        token: String,
        requested: u64,
        available: u64,
    },
    #[error("Insufficient inputs of token {token}: requested {requested}, provided {available}")]
    InsufficientInputs {
        token: String,
        requested: u64,
        available: u64,
    },
    #[error("Unsupported wallet type: {0}")]
    UnsupportedWalletType(String),
    #[error("Transaction is null")]
    TransactionIsNull,
    #[error("Pin is required")]
    PinRequired,
    #[error("Token {0} not found")]
    TokenNotFound(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid output: {0}")]
    InvalidOutput(String),
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Output {0} is already selected as input by another operation")]
    UtxoAlreadyReserved(OutputRef),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Mining error: {0}")]
    Mining(String),
    #[error("Transaction rejected by the network: {0}")]
    PushRejected(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Signing error: {0}")]
    Signing(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Serialization(#[from] SerializationError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

impl WalletError {
    /// Convenience constructor for input errors referencing a single output
    pub fn invalid_input(message: impl Into<String>, input: OutputRef) -> Self {
        WalletError::InvalidInput {
            message: message.into(),
            inputs: vec![input],
        }
    }

    /// Outputs referenced by this error, if it carries any
    pub fn offending_inputs(&self) -> &[OutputRef] {
        match self {
            WalletError::InvalidInput { inputs, .. } => inputs,
            _ => &[],
        }
    }
}

pub type WalletResult<T> = Result<T, WalletError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_carries_reference() {
        let err = WalletError::invalid_input("not found", OutputRef::new("aa", 3));
        assert_eq!(err.offending_inputs(), &[OutputRef::new("aa", 3)]);
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_serialization_error_converts() {
        let err: WalletError = SerializationError::UnknownTokenInfoVersion(7).into();
        assert_eq!(err.to_string(), "Unknown token info version: 7");
        assert!(err.offending_inputs().is_empty());
    }
}
