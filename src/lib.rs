//! Transaction assembly for Hathor wallets
//!
//! This crate turns a list of desired outputs into a signed, mined and pushed
//! transaction: it selects and reserves unspent outputs per token, computes
//! native-token fees and deposits, adds change, signs the inputs and drives
//! the mining service and full node. Key material, persistent storage and
//! network transports are supplied by the embedding wallet through the
//! [`storage::WalletStorage`], [`signing::TransactionSigner`],
//! [`mining::MiningService`] and [`network::NetworkApi`] traits.
//!
//! ## Sending
//!
//! ```no_run
//! use hathor_wallet_tx::{
//!     AddressOutput, DataOutput, SendTransaction, SendTransactionConfig, WalletResult,
//!     WalletServices,
//! };
//!
//! async fn send(services: WalletServices, to: &str) -> WalletResult<()> {
//!     let config = SendTransactionConfig::default();
//!     let output = DataOutput::to_address(AddressOutput::new(to, 100, "00"), &config.network)?;
//!     let mut send = SendTransaction::new(services, config)
//!         .with_outputs(vec![output])
//!         .with_pin("123456");
//!     let tx = send.run(None).await?;
//!     println!("pushed {:?}", tx.hash);
//!     Ok(())
//! }
//! ```
//!
//! Independent sends can be serialized through a [`scheduler::TaskScheduler`]
//! so that they never compete for the same outputs.

pub mod config;
pub mod constants;
pub mod data_structures;
pub mod errors;
pub mod events;
pub mod fee;
pub mod mining;
pub mod network;
pub mod scheduler;
pub mod send_transaction;
pub mod signing;
pub mod storage;
pub mod testing;
pub mod tokens;
pub mod utils;
pub mod utxo;

pub use config::{SchedulerConfig, SelectionStrategy, SendTransactionConfig};
pub use data_structures::{
    AddressOutput, CreateTokenTransaction, DataInput, DataOutput, Network, TokenMetadata,
    TokenVersion, Transaction, TxDraft,
};
pub use errors::{OutputRef, SchedulerError, SerializationError, WalletError, WalletResult};
pub use events::{EventDispatcher, EventListener, SendTransactionEvent};
pub use fee::Fee;
pub use scheduler::{AddOptions, CancellationToken, TaskScheduler};
pub use send_transaction::{RunUntil, SendState, SendTransaction, WalletServices};
pub use storage::{MemoryWalletStorage, WalletStorage};
pub use tokens::{prepare_create_token_data, CreateTokenOptions};
