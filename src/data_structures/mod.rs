//! Transaction, token and address types shared by every module

pub mod address;
pub mod create_token_transaction;
pub mod script;
pub mod token;
pub mod transaction;
pub mod tx_data;

pub use address::{Address, AddressKind, Network};
pub use create_token_transaction::{CreateTokenTransaction, TokenInfo};
pub use token::{is_native_token, TokenMetadata, TokenVersion};
pub use transaction::{FeeEntry, FeeHeader, Header, Input, MinedTxData, Output, Transaction};
pub use tx_data::{
    AddressOutput, DataInput, DataOutput, HasVersion, NanoAction, TransactionResult, TxDraft,
};
