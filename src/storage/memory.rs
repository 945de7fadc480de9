//! In-memory storage backend
//!
//! Keeps the whole wallet state behind a single mutex so that reservation
//! check-and-set is atomic. Used by tests and by short-lived wallets that
//! resync from the full node on start.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;

use crate::{
    data_structures::{
        address::Network, script::parse_output_script, token::TokenMetadata,
        transaction::Transaction,
    },
    errors::{OutputRef, WalletError, WalletResult},
    utils::current_timestamp,
};

use super::{
    storage_trait::{AddressInfo, ChangeAddressOptions, UtxoFilter, WalletStorage, WalletType},
    stored_output::UnspentOutput,
    tx_history::TxHistory,
};

/// Simulated failures for testing error paths
#[derive(Debug, Clone, Default)]
pub struct MemoryFailureModes {
    /// Fail every `get_unspent_outputs` call
    pub fail_get_unspent_outputs: bool,
    /// Fail every `add_tx` call
    pub fail_add_tx: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    utxos: HashMap<OutputRef, UnspentOutput>,
    spent: HashSet<OutputRef>,
    selected: HashMap<OutputRef, Instant>,
    transactions: HashMap<String, Transaction>,
    history: Vec<TxHistory>,
    addresses: Vec<AddressInfo>,
    current_address: usize,
    tokens: HashMap<String, TokenMetadata>,
    failure_modes: MemoryFailureModes,
}

impl MemoryState {
    fn is_selected(&self, utxo: &OutputRef) -> bool {
        self.selected
            .get(utxo)
            .map(|expires| *expires > Instant::now())
            .unwrap_or(false)
    }

    /// Forget reservations whose TTL has run out
    fn prune_expired(&mut self) {
        let now = Instant::now();
        self.selected.retain(|_, expires| *expires > now);
    }

    fn is_mine(&self, address: &str) -> bool {
        self.addresses.iter().any(|a| a.address == address)
    }
}

/// Wallet storage kept entirely in memory
#[derive(Debug, Clone)]
pub struct MemoryWalletStorage {
    state: Arc<Mutex<MemoryState>>,
    wallet_type: WalletType,
    network: Network,
}

impl MemoryWalletStorage {
    pub fn new(network: Network) -> Self {
        Self::with_wallet_type(network, WalletType::P2pkh)
    }

    pub fn with_wallet_type(network: Network, wallet_type: WalletType) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            wallet_type,
            network,
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Register a wallet address; the first one becomes the change address
    pub fn add_address(&self, info: AddressInfo) {
        let mut state = self.state();
        if !state.is_mine(&info.address) {
            state.addresses.push(info);
        }
    }

    /// Move the change address cursor to the next registered address
    pub fn advance_current_address(&self) {
        let mut state = self.state();
        if state.current_address + 1 < state.addresses.len() {
            state.current_address += 1;
        }
    }

    pub fn add_token(&self, token: TokenMetadata) {
        self.state().tokens.insert(token.uid.clone(), token);
    }

    pub fn add_utxo(&self, utxo: UnspentOutput) {
        self.state().utxos.insert(utxo.output_ref(), utxo);
    }

    /// Register a transaction and create UTXOs for the outputs paying the wallet
    pub fn add_transaction(&self, tx: Transaction) -> WalletResult<()> {
        let tx_id = tx.hash.clone().ok_or(WalletError::TransactionIsNull)?;
        let mut state = self.state();
        for (index, output) in tx.outputs.iter().enumerate() {
            let Some(parsed) = parse_output_script(&output.script, &self.network) else {
                continue;
            };
            let address = parsed.address.to_string();
            if !state.is_mine(&address) {
                continue;
            }
            let Some(token) = tx.output_token(output) else {
                continue;
            };
            let mut utxo = UnspentOutput::new(tx_id.clone(), index as u8, token, output.value, address);
            if output.is_authority() {
                utxo.authorities = output.value as u8;
            }
            utxo.timelock = parsed.timelock;
            state.utxos.insert(utxo.output_ref(), utxo);
        }
        state.transactions.insert(tx_id, tx);
        Ok(())
    }

    pub fn set_failure_modes(&self, modes: MemoryFailureModes) {
        self.state().failure_modes = modes;
    }

    pub fn history(&self) -> Vec<TxHistory> {
        self.state().history.clone()
    }

    /// Number of outputs currently selected by in-flight operations
    pub fn selected_count(&self) -> usize {
        let mut state = self.state();
        state.prune_expired();
        state.selected.len()
    }
}

#[async_trait]
impl WalletStorage for MemoryWalletStorage {
    async fn get_unspent_outputs(&self, filter: UtxoFilter) -> WalletResult<Vec<UnspentOutput>> {
        let state = self.state();
        if state.failure_modes.fail_get_unspent_outputs {
            return Err(WalletError::Storage(
                "Simulated failure: get_unspent_outputs".to_string(),
            ));
        }
        let now = current_timestamp();
        let mut utxos: Vec<UnspentOutput> = state
            .utxos
            .values()
            .filter(|u| !state.spent.contains(&u.output_ref()))
            .filter(|u| filter.matches(u))
            .filter(|u| {
                !filter.only_available
                    || (!u.locked && !u.is_time_locked(now) && !state.is_selected(&u.output_ref()))
            })
            .cloned()
            .collect();
        // storage order is insertion-independent; keep it stable for callers
        utxos.sort_by(|a, b| a.tx_id.cmp(&b.tx_id).then(a.index.cmp(&b.index)));
        if let Some(max) = filter.max_utxos {
            utxos.truncate(max);
        }
        Ok(utxos)
    }

    async fn get_tx(&self, tx_id: &str) -> WalletResult<Option<Transaction>> {
        Ok(self.state().transactions.get(tx_id).cloned())
    }

    async fn utxo_select_as_input(
        &self,
        utxo: &OutputRef,
        selected: bool,
        ttl: Duration,
    ) -> WalletResult<bool> {
        let mut state = self.state();
        if !selected {
            return Ok(state.selected.remove(utxo).is_some());
        }
        state.prune_expired();
        if state.is_selected(utxo) {
            debug!("Output {} already selected as input", utxo);
            return Ok(false);
        }
        state.selected.insert(utxo.clone(), Instant::now() + ttl);
        Ok(true)
    }

    async fn is_utxo_selected_as_input(&self, utxo: &OutputRef) -> WalletResult<bool> {
        Ok(self.state().is_selected(utxo))
    }

    async fn is_utxo_spent(&self, utxo: &OutputRef) -> WalletResult<bool> {
        Ok(self.state().spent.contains(utxo))
    }

    async fn is_address_mine(&self, address: &str) -> WalletResult<bool> {
        Ok(self.state().is_mine(address))
    }

    async fn get_address_info(&self, address: &str) -> WalletResult<Option<AddressInfo>> {
        Ok(self
            .state()
            .addresses
            .iter()
            .find(|a| a.address == address)
            .cloned())
    }

    async fn get_change_address(&self, options: ChangeAddressOptions) -> WalletResult<String> {
        let state = self.state();
        if let Some(address) = options.change_address {
            if !state.is_mine(&address) {
                return Err(WalletError::InvalidAddress(format!(
                    "Change address {address} is not from this wallet"
                )));
            }
            return Ok(address);
        }
        state
            .addresses
            .get(state.current_address)
            .map(|a| a.address.clone())
            .ok_or_else(|| WalletError::Storage("Wallet has no addresses".to_string()))
    }

    async fn get_wallet_type(&self) -> WalletResult<WalletType> {
        Ok(self.wallet_type)
    }

    async fn get_token(&self, uid: &str) -> WalletResult<Option<TokenMetadata>> {
        if crate::data_structures::token::is_native_token(uid) {
            return Ok(Some(TokenMetadata::native()));
        }
        Ok(self.state().tokens.get(uid).cloned())
    }

    async fn add_tx(&self, history: &TxHistory) -> WalletResult<()> {
        let mut state = self.state();
        if state.failure_modes.fail_add_tx {
            return Err(WalletError::Storage("Simulated failure: add_tx".to_string()));
        }
        for input in &history.inputs {
            let output_ref = OutputRef::new(input.tx_id.clone(), input.index);
            state.selected.remove(&output_ref);
            state.utxos.remove(&output_ref);
            state.spent.insert(output_ref);
        }
        for (index, output) in history.outputs.iter().enumerate() {
            let Some(address) = output.address.as_ref().filter(|a| state.is_mine(a)) else {
                continue;
            };
            let mut utxo = UnspentOutput::new(
                history.tx_id.clone(),
                index as u8,
                output.token.clone(),
                output.value,
                address.clone(),
            );
            if output.token_data & crate::constants::TOKEN_AUTHORITY_MASK != 0 {
                utxo.authorities = output.value as u8;
            }
            utxo.timelock = output.timelock;
            state.utxos.insert(utxo.output_ref(), utxo);
        }
        state.history.push(history.clone());
        Ok(())
    }
}
