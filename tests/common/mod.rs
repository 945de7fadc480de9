//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use hathor_wallet_tx::{
    data_structures::{
        address::{Address, AddressKind},
        script::output_script,
        transaction::{Output, Transaction},
    },
    storage::{AddressInfo, UnspentOutput},
    testing::{MockMiningService, MockNetworkApi, MockSigner},
    AddressOutput, DataOutput, MemoryWalletStorage, Network, SendTransactionConfig, WalletServices,
};

pub const PIN: &str = "123456";

/// Route `tracing` output to the test harness, filtered by `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Wallet state and collaborators shared by one test
pub struct TestWallet {
    pub storage: Arc<MemoryWalletStorage>,
    pub signer: MockSigner,
    pub miner: MockMiningService,
    pub network: MockNetworkApi,
    pub address: String,
}

impl TestWallet {
    pub fn new() -> Self {
        Self::with_storage(MemoryWalletStorage::new(Network::testnet()))
    }

    pub fn with_storage(storage: MemoryWalletStorage) -> Self {
        let address = wallet_address(0);
        storage.add_address(AddressInfo {
            address: address.clone(),
            bip32_index: 0,
            public_key: "02".repeat(33),
        });
        Self {
            storage: Arc::new(storage),
            signer: MockSigner::new(PIN),
            miner: MockMiningService::new(),
            network: MockNetworkApi::new(),
            address,
        }
    }

    pub fn services(&self) -> WalletServices {
        WalletServices {
            storage: self.storage.clone(),
            signer: Arc::new(self.signer.clone()),
            miner: Arc::new(self.miner.clone()),
            network: Arc::new(self.network.clone()),
        }
    }

    pub fn config(&self) -> SendTransactionConfig {
        SendTransactionConfig::new(Network::testnet())
            .with_shuffle_outputs(false)
            .with_mining_poll_interval(Duration::from_millis(10))
            .with_mining_max_polls(5)
    }

    pub fn fund(&self, tx_id: &str, value: u64) {
        self.storage
            .add_utxo(UnspentOutput::native(tx_id, 0, value, self.address.as_str()));
    }

    pub fn fund_token(&self, tx_id: &str, token: &str, value: u64) {
        self.storage
            .add_utxo(UnspentOutput::new(tx_id, 0, token, value, self.address.as_str()));
    }

    /// Register a transaction paying `value` of `token` to `address`
    pub fn add_funding_tx(&self, tx_id: &str, token: &str, value: u64, address: &str) {
        let parsed = Address::parse(address, &Network::testnet()).expect("valid address");
        let (token_data, tokens) = if token == "00" {
            (0, Vec::new())
        } else {
            (1, vec![token.to_string()])
        };
        let mut tx = Transaction::new(
            Vec::new(),
            vec![Output::new(value, token_data, output_script(&parsed, None))],
            tokens,
        );
        tx.hash = Some(tx_id.to_string());
        self.storage.add_transaction(tx).expect("funding tx has a hash");
    }
}

/// Address with a deterministic hash, only index 0 belongs to the test wallet
pub fn wallet_address(seed: u8) -> String {
    Address::from_hash([seed; 20], AddressKind::P2pkh, &Network::testnet()).to_string()
}

pub fn recipient() -> String {
    wallet_address(0xee)
}

pub fn output(address: &str, value: u64, token: &str) -> DataOutput {
    DataOutput::to_address(AddressOutput::new(address, value, token), &Network::testnet())
        .expect("valid address")
}

pub fn tx_id(byte: &str) -> String {
    byte.repeat(32)
}
