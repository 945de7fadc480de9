//! Storage abstraction layer for wallet state
//!
//! This module provides a trait-based storage interface that the transaction
//! assembler consumes, along with an in-memory backend. Persistent backends
//! live outside this crate and implement [`WalletStorage`].

pub mod memory;
pub mod storage_trait;
pub mod stored_output;
pub mod tx_history;

pub use memory::*;
pub use storage_trait::*;
pub use stored_output::*;
pub use tx_history::*;
