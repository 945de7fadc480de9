//! Assembling, signing, mining and pushing transactions
//!
//! A [`SendTransaction`] moves through `Idle -> Prepared -> Signed -> Mined ->
//! Pushed`. [`SendTransaction::run`] drives it to the end, or stops early with
//! a [`RunUntil`] so that another party can co-sign between steps.
//!
//! Outputs picked while preparing stay reserved in storage until the
//! transaction is pushed. Every failure while preparing, mining or pushing
//! releases them again and is reported both as the returned error and as a
//! [`SendTransactionEvent::SendError`]. Retrying mining or pushing reserves the
//! draft inputs again first, and fails if another operation took them.

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    config::SendTransactionConfig,
    data_structures::{
        script::p2pkh_input_data,
        transaction::{MinedTxData, Transaction},
        tx_data::{DataOutput, TxDraft},
    },
    errors::{OutputRef, SerializationError, WalletError, WalletResult},
    events::{EventDispatcher, EventDispatcherError, EventListener, SendTransactionEvent},
    mining::{JobStatus, MiningService},
    network::NetworkApi,
    signing::{Pin, TransactionSigner},
    storage::{TxHistory, WalletStorage, WalletType},
    utxo::{release_utxos, reserve_utxos},
};

mod prepare;

/// Collaborators a transaction needs, shared between transactions
#[derive(Clone)]
pub struct WalletServices {
    pub storage: Arc<dyn WalletStorage>,
    pub signer: Arc<dyn TransactionSigner>,
    pub miner: Arc<dyn MiningService>,
    pub network: Arc<dyn NetworkApi>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    Idle,
    Prepared,
    Signed,
    Mined,
    Pushed,
}

/// Last step [`SendTransaction::run`] performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunUntil {
    PrepareTx,
    SignTx,
    MineTx,
}

pub struct SendTransaction {
    services: WalletServices,
    config: SendTransactionConfig,
    outputs: Vec<DataOutput>,
    inputs: Vec<OutputRef>,
    change_address: Option<String>,
    pin: Option<Pin>,
    state: SendState,
    draft: Option<TxDraft>,
    transaction: Option<Transaction>,
    reserved: Vec<OutputRef>,
    dispatcher: EventDispatcher,
}

impl SendTransaction {
    pub fn new(services: WalletServices, config: SendTransactionConfig) -> Self {
        Self {
            services,
            config,
            outputs: Vec::new(),
            inputs: Vec::new(),
            change_address: None,
            pin: None,
            state: SendState::Idle,
            draft: None,
            transaction: None,
            reserved: Vec::new(),
            dispatcher: EventDispatcher::new(),
        }
    }

    /// Continue from a draft built elsewhere, whose inputs are already reserved
    pub fn from_draft(
        services: WalletServices,
        draft: TxDraft,
        config: SendTransactionConfig,
    ) -> WalletResult<Self> {
        let transaction = draft.to_transaction(&config.network)?;
        let mut send = Self::new(services, config);
        send.outputs = draft.outputs.clone();
        send.reserved = draft.inputs.iter().map(|i| i.output_ref()).collect();
        send.transaction = Some(transaction);
        send.draft = Some(draft);
        send.state = SendState::Prepared;
        Ok(send)
    }

    pub fn with_outputs(mut self, outputs: Vec<DataOutput>) -> Self {
        self.outputs = outputs;
        self
    }

    /// Spend these outputs instead of selecting inputs for their tokens
    pub fn with_inputs(mut self, inputs: Vec<OutputRef>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_change_address(mut self, address: impl Into<String>) -> Self {
        self.change_address = Some(address.into());
        self
    }

    pub fn with_pin(mut self, pin: impl Into<String>) -> Self {
        self.pin = Some(Pin::new(pin.into()));
        self
    }

    /// Replace the PIN, e.g. to retry signing after a wrong one
    pub fn set_pin(&mut self, pin: impl Into<String>) {
        self.pin = Some(Pin::new(pin.into()));
    }

    pub fn with_dispatcher(mut self, dispatcher: EventDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn register_listener(
        &mut self,
        listener: Box<dyn EventListener>,
    ) -> Result<(), EventDispatcherError> {
        self.dispatcher.register(listener)
    }

    pub fn state(&self) -> SendState {
        self.state
    }

    pub fn draft(&self) -> Option<&TxDraft> {
        self.draft.as_ref()
    }

    pub fn transaction(&self) -> Option<&Transaction> {
        self.transaction.as_ref()
    }

    /// Outputs currently reserved by this transaction
    pub fn reserved(&self) -> &[OutputRef] {
        &self.reserved
    }

    fn expect_state(&self, expected: SendState) -> WalletResult<()> {
        if self.state != expected {
            return Err(WalletError::InvalidState(format!(
                "expected {:?} transaction, found {:?}",
                expected, self.state
            )));
        }
        Ok(())
    }

    fn current(&self) -> WalletResult<&Transaction> {
        self.transaction.as_ref().ok_or(WalletError::TransactionIsNull)
    }

    /// Report an error to listeners, releasing reservations when asked
    async fn fail(&mut self, err: WalletError, release: bool) -> WalletError {
        if release {
            self.release_utxos().await;
        }
        self.dispatcher
            .dispatch(SendTransactionEvent::SendError {
                message: err.to_string(),
                inputs: err.offending_inputs().to_vec(),
            })
            .await;
        err
    }

    /// Release every output reserved by this transaction
    pub async fn release_utxos(&mut self) {
        let refs = std::mem::take(&mut self.reserved);
        if refs.is_empty() {
            return;
        }
        debug!("Releasing {} reserved outputs", refs.len());
        release_utxos(self.services.storage.as_ref(), &refs).await;
    }

    /// Reserve the draft inputs again after an earlier failure released them
    async fn reclaim_reservations(&mut self) -> WalletResult<()> {
        if !self.reserved.is_empty() {
            return Ok(());
        }
        let refs: Vec<OutputRef> = match &self.draft {
            Some(draft) => draft.inputs.iter().map(|i| i.output_ref()).collect(),
            None => return Ok(()),
        };
        if refs.is_empty() {
            return Ok(());
        }
        debug!("Reserving {} draft inputs again", refs.len());
        reserve_utxos(
            self.services.storage.as_ref(),
            &refs,
            self.config.utxo_reservation_ttl,
        )
        .await?;
        self.reserved = refs;
        Ok(())
    }

    /// Resolve inputs, change and fee into a draft, reserving the inputs
    pub async fn prepare_tx_data(&mut self) -> WalletResult<TxDraft> {
        if let Some(draft) = &self.draft {
            return Ok(draft.clone());
        }
        if let Err(e) = self.expect_state(SendState::Idle) {
            return Err(self.fail(e, false).await);
        }
        match self.resolve_draft().await {
            Ok(draft) => {
                self.draft = Some(draft.clone());
                Ok(draft)
            }
            Err(e) => Err(self.fail(e, true).await),
        }
    }

    /// Build the unsigned transaction
    pub async fn prepare_tx(&mut self) -> WalletResult<&Transaction> {
        if let Err(e) = self.expect_state(SendState::Idle) {
            return Err(self.fail(e, false).await);
        }
        let draft = self.prepare_tx_data().await?;
        match draft.to_transaction(&self.config.network) {
            Ok(tx) => {
                self.transaction = Some(tx);
                self.state = SendState::Prepared;
                self.current()
            }
            Err(e) => {
                self.draft = None;
                Err(self.fail(e, true).await)
            }
        }
    }

    /// Sign every input with the wallet keys unlocked by the PIN
    pub async fn sign_tx(&mut self) -> WalletResult<&Transaction> {
        match self.sign_inputs().await {
            Ok(input_data) => {
                self.apply_input_data(input_data)?;
                self.current()
            }
            Err(e) => Err(self.fail(e, false).await),
        }
    }

    async fn sign_inputs(&self) -> WalletResult<Vec<Vec<u8>>> {
        self.expect_state(SendState::Prepared)?;
        if self.services.storage.get_wallet_type().await? != WalletType::P2pkh {
            return Err(WalletError::UnsupportedWalletType(
                "multisig transactions are signed with prepare_tx_from".to_string(),
            ));
        }
        let pin = self.pin.as_ref().ok_or(WalletError::PinRequired)?;
        let draft = self.draft.as_ref().ok_or(WalletError::TransactionIsNull)?;
        let data_to_sign = self.current()?.data_to_sign()?;

        let mut input_data = Vec::with_capacity(draft.inputs.len());
        for input in &draft.inputs {
            let signature = self
                .services
                .signer
                .sign(&data_to_sign, pin.as_str(), &input.address)
                .await?;
            let public_key = self.public_key(&input.address).await?;
            input_data.push(p2pkh_input_data(&signature, &public_key)?);
        }
        Ok(input_data)
    }

    /// Finish the transaction with signatures produced outside the wallet,
    /// one per input in draft order
    pub async fn prepare_tx_from(&mut self, signatures: Vec<Vec<u8>>) -> WalletResult<&Transaction> {
        match self.input_data_from(signatures).await {
            Ok(input_data) => {
                self.apply_input_data(input_data)?;
                self.current()
            }
            Err(e) => Err(self.fail(e, false).await),
        }
    }

    async fn input_data_from(&self, signatures: Vec<Vec<u8>>) -> WalletResult<Vec<Vec<u8>>> {
        self.expect_state(SendState::Prepared)?;
        let draft = self.draft.as_ref().ok_or(WalletError::TransactionIsNull)?;
        if signatures.len() != draft.inputs.len() {
            return Err(WalletError::Signing(format!(
                "expected {} signatures, got {}",
                draft.inputs.len(),
                signatures.len()
            )));
        }
        let mut input_data = Vec::with_capacity(signatures.len());
        for (input, signature) in draft.inputs.iter().zip(&signatures) {
            let public_key = self.public_key(&input.address).await?;
            input_data.push(p2pkh_input_data(signature, &public_key)?);
        }
        Ok(input_data)
    }

    async fn public_key(&self, address: &str) -> WalletResult<Vec<u8>> {
        let info = self
            .services
            .storage
            .get_address_info(address)
            .await?
            .ok_or_else(|| {
                WalletError::Signing(format!("address {address} is not from this wallet"))
            })?;
        Ok(hex::decode(&info.public_key).map_err(SerializationError::from)?)
    }

    fn apply_input_data(&mut self, input_data: Vec<Vec<u8>>) -> WalletResult<()> {
        let tx = self
            .transaction
            .as_mut()
            .ok_or(WalletError::TransactionIsNull)?;
        for (input, data) in tx.inputs.iter_mut().zip(input_data) {
            input.data = data;
        }
        self.state = SendState::Signed;
        Ok(())
    }

    /// Mine the signed transaction through the mining service
    pub async fn mine_tx(&mut self) -> WalletResult<MinedTxData> {
        if let Err(e) = self.expect_state(SendState::Signed) {
            return Err(self.fail(e, false).await);
        }
        match self.mine().await {
            Ok(data) => Ok(data),
            Err(e) => Err(self.fail(e, true).await),
        }
    }

    async fn mine(&mut self) -> WalletResult<MinedTxData> {
        self.reclaim_reservations().await?;
        let tx_hex = self.current()?.to_hex()?;
        self.dispatcher
            .dispatch(SendTransactionEvent::MineTxStarted {
                tx_hex: tx_hex.clone(),
            })
            .await;
        let job_id = self.services.miner.submit_job(&tx_hex).await?;
        debug!("Submitted mining job {}", job_id);
        self.dispatcher
            .dispatch(SendTransactionEvent::JobSubmitted {
                job_id: job_id.clone(),
            })
            .await;

        for poll in 0..self.config.mining_max_polls {
            if poll > 0 {
                tokio::time::sleep(self.config.mining_poll_interval).await;
            }
            match self.services.miner.poll_job(&job_id).await? {
                JobStatus::Pending { estimation } => {
                    self.dispatcher
                        .dispatch(SendTransactionEvent::EstimationUpdated {
                            job_id: job_id.clone(),
                            estimation,
                        })
                        .await;
                }
                JobStatus::Done(data) => {
                    self.dispatcher
                        .dispatch(SendTransactionEvent::JobDone {
                            job_id: job_id.clone(),
                            data: data.clone(),
                        })
                        .await;
                    self.transaction
                        .as_mut()
                        .ok_or(WalletError::TransactionIsNull)?
                        .apply_mined_data(&data);
                    self.state = SendState::Mined;
                    self.dispatcher
                        .dispatch(SendTransactionEvent::MineTxEnded { data: data.clone() })
                        .await;
                    return Ok(data);
                }
                JobStatus::Failed { message } => return Err(WalletError::Mining(message)),
            }
        }
        Err(WalletError::Mining(format!(
            "job {} not done after {} polls",
            job_id, self.config.mining_max_polls
        )))
    }

    /// Push the mined transaction and record it in the wallet history
    pub async fn handle_push_tx(&mut self) -> WalletResult<&Transaction> {
        if let Err(e) = self.expect_state(SendState::Mined) {
            return Err(self.fail(e, false).await);
        }
        let tx_hex = match self.current().and_then(Transaction::to_hex) {
            Ok(tx_hex) => tx_hex,
            Err(e) => return Err(self.fail(e, true).await),
        };
        self.dispatcher
            .dispatch(SendTransactionEvent::SendTxStart { tx_hex })
            .await;
        let tx_id = match self.push().await {
            Ok(tx_id) => tx_id,
            Err(e) => return Err(self.fail(e, true).await),
        };
        self.state = SendState::Pushed;
        info!("Transaction {} accepted by the network", tx_id);

        if let Err(e) = self.record_history().await {
            self.dispatcher
                .dispatch(SendTransactionEvent::UnexpectedError {
                    message: e.to_string(),
                })
                .await;
            return Err(e);
        }
        // spent now, the reservations are moot
        self.reserved.clear();
        self.dispatcher
            .dispatch(SendTransactionEvent::SendTxSuccess { tx_id })
            .await;
        self.current()
    }

    async fn push(&mut self) -> WalletResult<String> {
        self.reclaim_reservations().await?;
        let tx = self
            .transaction
            .as_mut()
            .ok_or(WalletError::TransactionIsNull)?;
        let tx_id = tx.update_hash()?.to_string();
        let tx_hex = tx.to_hex()?;
        let response = self.services.network.push_tx(&tx_hex).await?;
        if !response.success {
            return Err(WalletError::PushRejected(
                response
                    .message
                    .unwrap_or_else(|| "no reason given".to_string()),
            ));
        }
        Ok(tx_id)
    }

    async fn record_history(&self) -> WalletResult<()> {
        let draft = self.draft.as_ref().ok_or(WalletError::TransactionIsNull)?;
        let history = TxHistory::from_transaction(self.current()?, &draft.inputs, &self.config.network)?;
        self.services.storage.add_tx(&history).await
    }

    /// Drive the transaction forward from its current state
    ///
    /// Returns the transaction as it is after the last step performed.
    pub async fn run(&mut self, until: Option<RunUntil>) -> WalletResult<Transaction> {
        if self.state == SendState::Idle {
            self.prepare_tx().await?;
        }
        if until == Some(RunUntil::PrepareTx) {
            return self.current().cloned();
        }
        if self.state == SendState::Prepared {
            self.sign_tx().await?;
        }
        if until == Some(RunUntil::SignTx) {
            return self.current().cloned();
        }
        if self.state == SendState::Signed {
            self.mine_tx().await?;
        }
        if until == Some(RunUntil::MineTx) {
            return self.current().cloned();
        }
        if self.state == SendState::Mined {
            self.handle_push_tx().await?;
        }
        self.current().cloned()
    }
}
