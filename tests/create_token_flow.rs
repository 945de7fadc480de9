//! Creating tokens through a prepared draft

mod common;

use common::{tx_id, TestWallet, PIN};
use hathor_wallet_tx::{
    constants::FEE_PER_OUTPUT,
    data_structures::TransactionResult,
    storage::UtxoFilter,
    tokens::{prepare_create_token_data, CreateTokenOptions},
    CreateTokenTransaction, SendState, SendTransaction, TokenVersion, TxDraft, WalletError,
    WalletStorage,
};

#[tokio::test]
async fn test_fee_token_creation_end_to_end() {
    let wallet = TestWallet::new();
    wallet.fund(&tx_id("aa"), 10);
    let config = wallet.config();

    let draft = prepare_create_token_data(
        wallet.storage.as_ref(),
        CreateTokenOptions::new("TokenName", "TKN", 500).with_version(TokenVersion::Fee),
        &config,
    )
    .await
    .unwrap();
    let mut send = SendTransaction::from_draft(wallet.services(), draft, config)
        .unwrap()
        .with_pin(PIN);
    assert_eq!(send.state(), SendState::Prepared);
    assert_eq!(send.reserved().len(), 1);

    let tx = send.run(None).await.unwrap();

    assert_eq!(send.state(), SendState::Pushed);
    assert_eq!(tx.inputs.len(), 1);
    assert_eq!(tx.fee_header().map(|h| h.total()), Some(FEE_PER_OUTPUT));
    let created = CreateTokenTransaction::from_transaction(tx.clone()).unwrap();
    assert_eq!(created.name(), "TokenName");
    assert_eq!(created.symbol(), "TKN");

    let parsed = CreateTokenTransaction::from_bytes(&tx.to_bytes().unwrap()).unwrap();
    assert_eq!(parsed.as_transaction().outputs, tx.outputs);

    // the minted amount and both authorities now belong to the wallet
    let token_uid = tx.hash.clone().unwrap();
    let minted = wallet
        .storage
        .get_unspent_outputs(UtxoFilter::new().with_token(token_uid))
        .await
        .unwrap();
    assert_eq!(minted.len(), 3);
    assert_eq!(minted.iter().filter(|u| u.is_authority()).count(), 2);
    let history = wallet.storage.history();
    assert_eq!(history[0].token_name.as_deref(), Some("TokenName"));
    assert_eq!(wallet.storage.selected_count(), 0);
}

#[tokio::test]
async fn test_draft_export_round_trip_resumes_send() {
    let wallet = TestWallet::new();
    wallet.fund(&tx_id("aa"), 100);
    let config = wallet.config();

    let draft = prepare_create_token_data(
        wallet.storage.as_ref(),
        CreateTokenOptions::new("Deposit", "DEP", 1_000).with_authorities(true, false),
        &config,
    )
    .await
    .unwrap();
    let json = draft.to_json().unwrap();
    let restored = TxDraft::from_json(&json).unwrap();
    assert_eq!(restored, draft);

    let mut send = SendTransaction::from_draft(wallet.services(), restored, config).unwrap();
    let tx = send.prepare_tx_from(vec![vec![0x30; 70]]).await.unwrap();
    // minted amount, mint authority, change of 100 - 10
    let values: Vec<u64> = tx.outputs.iter().map(|o| o.value).collect();
    assert_eq!(values, vec![1_000, 1, 90]);
    assert!(tx.headers.is_empty());
}

#[tokio::test]
async fn test_insufficient_deposit_fails_creation() {
    let wallet = TestWallet::new();
    wallet.fund(&tx_id("aa"), 3);

    let err = prepare_create_token_data(
        wallet.storage.as_ref(),
        CreateTokenOptions::new("Deposit", "DEP", 1_000),
        &wallet.config(),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        WalletError::InsufficientFunds { requested: 10, available: 3, .. }
    ));
    assert_eq!(wallet.storage.selected_count(), 0);
}
