//! Storage trait definition for wallet state consumed by transaction assembly
//!
//! This module defines the `WalletStorage` trait through which the assembler
//! reads unspent outputs, addresses and token metadata, reserves outputs it is
//! about to spend and records pushed transactions.

use std::{str::FromStr, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    data_structures::{token::TokenMetadata, transaction::Transaction},
    errors::{OutputRef, WalletError, WalletResult},
};

use super::stored_output::UnspentOutput;
use super::tx_history::TxHistory;

/// Query filters for retrieving unspent outputs
#[derive(Debug, Clone, Default)]
pub struct UtxoFilter {
    /// Filter by token uid
    pub token: Option<String>,
    /// Exact authority bitmask to match (`Some(0)` = value outputs only)
    pub authorities: Option<u8>,
    /// Skip locked, timelocked and reserved outputs
    pub only_available: bool,
    /// Restrict to these addresses
    pub addresses: Option<Vec<String>>,
    /// Maximum number of outputs to return
    pub max_utxos: Option<usize>,
}

impl UtxoFilter {
    /// Create a new empty filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by token uid
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Filter by authority bitmask
    pub fn with_authorities(mut self, authorities: u8) -> Self {
        self.authorities = Some(authorities);
        self
    }

    /// Only outputs that can be spent right now
    pub fn only_available(mut self) -> Self {
        self.only_available = true;
        self
    }

    pub fn with_addresses(mut self, addresses: Vec<String>) -> Self {
        self.addresses = Some(addresses);
        self
    }

    pub fn with_max_utxos(mut self, max: usize) -> Self {
        self.max_utxos = Some(max);
        self
    }

    /// Filter used by value-transfer selection: unlocked value outputs of a token
    pub fn spendable(token: impl Into<String>) -> Self {
        Self::new().with_token(token).with_authorities(0).only_available()
    }

    pub fn matches(&self, utxo: &UnspentOutput) -> bool {
        self.token.as_ref().map_or(true, |t| *t == utxo.token)
            && self.authorities.map_or(true, |a| a == utxo.authorities)
            && self
                .addresses
                .as_ref()
                .map_or(true, |addrs| addrs.contains(&utxo.address))
    }
}

/// Kind of wallet, deciding which script type its own outputs use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletType {
    P2pkh,
    Multisig,
}

impl FromStr for WalletType {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "p2pkh" => Ok(WalletType::P2pkh),
            "multisig" => Ok(WalletType::Multisig),
            other => Err(WalletError::UnsupportedWalletType(other.to_string())),
        }
    }
}

/// Public data of a wallet address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInfo {
    pub address: String,
    pub bip32_index: u32,
    /// Compressed public key, hex encoded
    pub public_key: String,
}

/// Options used when asking the storage for a change address
#[derive(Debug, Clone, Default)]
pub struct ChangeAddressOptions {
    /// Caller-chosen change address; must belong to the wallet
    pub change_address: Option<String>,
}

/// Trait for wallet storage backends
#[async_trait]
pub trait WalletStorage: Send + Sync {
    // === UTXO Methods ===

    /// Get unspent outputs matching the filter
    async fn get_unspent_outputs(&self, filter: UtxoFilter) -> WalletResult<Vec<UnspentOutput>>;

    /// Get a transaction by id, if the wallet knows it
    async fn get_tx(&self, tx_id: &str) -> WalletResult<Option<Transaction>>;

    /// Mark (or unmark) an output as selected by an in-flight operation
    ///
    /// Selecting is a compare-and-set: it returns `false` without changing
    /// anything when the output is already selected. Selections expire after
    /// `ttl` so a crashed operation cannot starve later ones.
    async fn utxo_select_as_input(
        &self,
        utxo: &OutputRef,
        selected: bool,
        ttl: Duration,
    ) -> WalletResult<bool>;

    /// Check whether an output is currently selected by an in-flight operation
    async fn is_utxo_selected_as_input(&self, utxo: &OutputRef) -> WalletResult<bool>;

    /// Check whether an output has been spent by a known transaction
    async fn is_utxo_spent(&self, utxo: &OutputRef) -> WalletResult<bool>;

    // === Address Methods ===

    async fn is_address_mine(&self, address: &str) -> WalletResult<bool>;

    async fn get_address_info(&self, address: &str) -> WalletResult<Option<AddressInfo>>;

    /// Resolve the address to send change to
    async fn get_change_address(&self, options: ChangeAddressOptions) -> WalletResult<String>;

    // === Wallet Methods ===

    async fn get_wallet_type(&self) -> WalletResult<WalletType>;

    async fn get_token(&self, uid: &str) -> WalletResult<Option<TokenMetadata>>;

    /// Record a transaction in the history cache, marking its inputs spent
    async fn add_tx(&self, history: &TxHistory) -> WalletResult<()>;
}
