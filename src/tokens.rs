//! Drafts for transactions creating a new custom token
//!
//! The created token has no uid until the transaction is hashed, so its
//! outputs are drafted against [`NEW_TOKEN_UID`] and serialized with token
//! index 1. The draft is then sent through
//! [`crate::send_transaction::SendTransaction::from_draft`].

use std::collections::HashMap;

use tracing::debug;

use crate::{
    config::SendTransactionConfig,
    constants::{NATIVE_TOKEN_UID, TOKEN_MELT_MASK, TOKEN_MINT_MASK},
    data_structures::{
        create_token_transaction::TokenInfo,
        token::{TokenMetadata, TokenVersion},
        transaction::{FeeHeader, Header},
        tx_data::{AddressOutput, DataOutput, TxDraft},
    },
    errors::{WalletError, WalletResult},
    fee::{get_data_script_fee, get_mint_deposit, Fee},
    storage::{ChangeAddressOptions, WalletStorage},
    utxo::{release_utxos, select_and_reserve},
};

/// Stand-in uid for the token being created
pub const NEW_TOKEN_UID: &str = "new-token";

#[derive(Debug, Clone)]
pub struct CreateTokenOptions {
    pub name: String,
    pub symbol: String,
    pub amount: u64,
    /// Receives the minted amount; the wallet's current address when unset
    pub address: Option<String>,
    pub change_address: Option<String>,
    pub create_mint: bool,
    pub mint_authority_address: Option<String>,
    pub create_melt: bool,
    pub melt_authority_address: Option<String>,
    /// Data-carrier outputs, each paid with one unit of the native token
    pub data: Vec<String>,
    pub version: TokenVersion,
}

impl CreateTokenOptions {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, amount: u64) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            amount,
            address: None,
            change_address: None,
            create_mint: true,
            mint_authority_address: None,
            create_melt: true,
            melt_authority_address: None,
            data: Vec::new(),
            version: TokenVersion::Deposit,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_change_address(mut self, address: impl Into<String>) -> Self {
        self.change_address = Some(address.into());
        self
    }

    pub fn with_version(mut self, version: TokenVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_authorities(mut self, create_mint: bool, create_melt: bool) -> Self {
        self.create_mint = create_mint;
        self.create_melt = create_melt;
        self
    }

    pub fn with_data(mut self, data: Vec<String>) -> Self {
        self.data = data;
        self
    }
}

/// Build the draft of a create-token transaction, reserving its native inputs
pub async fn prepare_create_token_data(
    storage: &dyn WalletStorage,
    options: CreateTokenOptions,
    config: &SendTransactionConfig,
) -> WalletResult<TxDraft> {
    let info = TokenInfo::new(options.name.clone(), options.symbol.clone());
    info.validate()?;
    if options.amount == 0 {
        return Err(WalletError::InvalidAmount(
            "minted amount must be positive".to_string(),
        ));
    }
    if options.version == TokenVersion::Native {
        return Err(WalletError::InvalidState(
            "new tokens cannot use the native version".to_string(),
        ));
    }

    let network = &config.network;
    let address = match &options.address {
        Some(address) => address.clone(),
        None => {
            storage
                .get_change_address(ChangeAddressOptions::default())
                .await?
        }
    };

    let mut outputs = vec![DataOutput::to_address(
        AddressOutput::new(address.clone(), options.amount, NEW_TOKEN_UID),
        network,
    )?];
    if options.create_mint {
        let authority_address = options.mint_authority_address.as_ref().unwrap_or(&address);
        outputs.push(DataOutput::to_address(
            AddressOutput::authority(authority_address.clone(), NEW_TOKEN_UID, TOKEN_MINT_MASK),
            network,
        )?);
    }
    if options.create_melt {
        let authority_address = options.melt_authority_address.as_ref().unwrap_or(&address);
        outputs.push(DataOutput::to_address(
            AddressOutput::authority(authority_address.clone(), NEW_TOKEN_UID, TOKEN_MELT_MASK),
            network,
        )?);
    }
    for data in &options.data {
        let output = DataOutput::data(data.as_str());
        output.validate_data()?;
        outputs.push(output);
    }

    let (deposit, fee) = match options.version {
        TokenVersion::Fee => {
            let tokens = HashMap::from([(
                NEW_TOKEN_UID.to_string(),
                TokenMetadata::new(NEW_TOKEN_UID, &options.name, &options.symbol, TokenVersion::Fee),
            )]);
            (0, Fee::calculate(&[], &outputs, &tokens, None)?)
        }
        _ => (get_mint_deposit(options.amount), 0),
    };
    let required = deposit + fee + get_data_script_fee(options.data.len());
    debug!(
        "Creating token {} ({}): deposit {}, fee {}, native required {}",
        options.name, options.symbol, deposit, fee, required
    );

    let selection = select_and_reserve(
        storage,
        NATIVE_TOKEN_UID,
        required,
        config.selection_strategy,
        config.utxo_reservation_ttl,
    )
    .await?;
    if !selection.is_sufficient(required) {
        return Err(WalletError::InsufficientFunds {
            token: NATIVE_TOKEN_UID.to_string(),
            requested: required,
            available: selection.amount,
        });
    }
    let inputs: Vec<_> = selection.utxos.iter().map(|u| u.to_data_input()).collect();

    let change = selection.change(required);
    if change > 0 {
        let change_output = match storage
            .get_change_address(ChangeAddressOptions {
                change_address: options.change_address.clone(),
            })
            .await
            .and_then(|a| DataOutput::to_address(AddressOutput::change(a, change, NATIVE_TOKEN_UID), network))
        {
            Ok(output) => output,
            Err(e) => {
                let refs: Vec<_> = inputs.iter().map(|i| i.output_ref()).collect();
                release_utxos(storage, &refs).await;
                return Err(e);
            }
        };
        outputs.push(change_output);
    }

    let mut draft = TxDraft::new(inputs, outputs, Vec::new());
    draft.token_info = Some(info);
    if fee > 0 {
        draft.headers.push(Header::Fee(FeeHeader::native(fee)));
    }
    Ok(draft)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        constants::{FEE_PER_OUTPUT, MAX_DATA_SCRIPT_LENGTH},
        data_structures::address::{Address, AddressKind, Network},
        storage::{AddressInfo, MemoryWalletStorage, UnspentOutput},
    };

    fn wallet() -> (MemoryWalletStorage, String) {
        let network = Network::testnet();
        let address = Address::from_hash([7; 20], AddressKind::P2pkh, &network).to_string();
        let storage = MemoryWalletStorage::new(network);
        storage.add_address(AddressInfo {
            address: address.clone(),
            bip32_index: 0,
            public_key: "02".repeat(33),
        });
        (storage, address)
    }

    #[tokio::test]
    async fn test_deposit_token_locks_one_percent() {
        let (storage, address) = wallet();
        storage.add_utxo(UnspentOutput::native("aa", 0, 50, address.as_str()));
        let config = SendTransactionConfig::new(Network::testnet());

        let draft = prepare_create_token_data(
            &storage,
            CreateTokenOptions::new("TokenName", "TKN", 1_000),
            &config,
        )
        .await
        .unwrap();

        assert_eq!(draft.inputs.len(), 1);
        // minted amount, mint and melt authorities, change of 50 - 10
        assert_eq!(draft.outputs.len(), 4);
        assert_eq!(draft.outputs[3].value(), 40);
        assert!(draft.headers.is_empty());
        let tx = draft.to_transaction(&config.network).unwrap();
        assert!(tx.is_create_token());
        assert_eq!(tx.outputs[0].token_data, 1);
        assert_eq!(tx.outputs[1].token_data, 0x81);
        assert_eq!(storage.selected_count(), 1);
    }

    #[tokio::test]
    async fn test_fee_token_pays_per_output() {
        let (storage, address) = wallet();
        storage.add_utxo(UnspentOutput::native("aa", 0, 10, address.as_str()));
        let config = SendTransactionConfig::new(Network::testnet());

        let draft = prepare_create_token_data(
            &storage,
            CreateTokenOptions::new("TokenName", "TKN", 1_000).with_version(TokenVersion::Fee),
            &config,
        )
        .await
        .unwrap();

        assert_eq!(draft.inputs.len(), 1);
        assert_eq!(draft.headers, vec![Header::Fee(FeeHeader::native(FEE_PER_OUTPUT))]);
        let change: u64 = draft
            .outputs
            .iter()
            .filter(|o| o.is_change())
            .map(|o| o.value())
            .sum();
        assert_eq!(change, 10 - FEE_PER_OUTPUT);
    }

    #[tokio::test]
    async fn test_insufficient_deposit_reserves_nothing() {
        let (storage, address) = wallet();
        storage.add_utxo(UnspentOutput::native("aa", 0, 5, address.as_str()));
        let config = SendTransactionConfig::new(Network::testnet());

        let err = prepare_create_token_data(
            &storage,
            CreateTokenOptions::new("TokenName", "TKN", 1_000),
            &config,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            WalletError::InsufficientFunds { requested: 10, available: 5, .. }
        ));
        assert_eq!(storage.selected_count(), 0);
    }

    #[tokio::test]
    async fn test_oversized_data_output_rejected() {
        let (storage, address) = wallet();
        storage.add_utxo(UnspentOutput::native("aa", 0, 50, address.as_str()));
        let config = SendTransactionConfig::new(Network::testnet());
        let options = CreateTokenOptions::new("TokenName", "TKN", 100)
            .with_data(vec!["x".repeat(MAX_DATA_SCRIPT_LENGTH + 1)]);

        let err = prepare_create_token_data(&storage, options, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::InvalidOutput(_)));
        assert_eq!(storage.selected_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_symbol_rejected() {
        let (storage, _) = wallet();
        let config = SendTransactionConfig::new(Network::testnet());
        let err = prepare_create_token_data(&storage, CreateTokenOptions::new("Name", "", 1), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::Serialization(_)));
    }
}
