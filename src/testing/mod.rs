//! Mock collaborators for deterministic testing
//!
//! Together with [`crate::storage::MemoryWalletStorage`] these let the whole
//! send flow run without keys, a mining service or a full node.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::{
    data_structures::transaction::MinedTxData,
    errors::{WalletError, WalletResult},
    mining::{JobStatus, MiningService},
    network::{NetworkApi, PushTxResponse},
    signing::TransactionSigner,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Signer accepting a single PIN and producing deterministic signatures
#[derive(Debug, Clone)]
pub struct MockSigner {
    pin: String,
    calls: Arc<AtomicUsize>,
}

impl MockSigner {
    pub fn new(pin: impl Into<String>) -> Self {
        Self {
            pin: pin.into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Signature this signer produces for `address` over `data_to_sign`
    pub fn expected_signature(data_to_sign: &[u8], address: &str) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(address.as_bytes());
        hasher.update(data_to_sign);
        hasher.finalize().to_vec()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransactionSigner for MockSigner {
    async fn sign(&self, data_to_sign: &[u8], pin: &str, address: &str) -> WalletResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if pin != self.pin {
            return Err(WalletError::Signing("Invalid PIN".to_string()));
        }
        Ok(Self::expected_signature(data_to_sign, address))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockMiningFailureModes {
    /// Fail every `submit_job` call
    pub fail_submit: bool,
    /// Fail every `poll_job` call
    pub fail_poll: bool,
}

/// Mining service replaying a scripted sequence of job statuses
///
/// Once the script runs out every poll reports the job done with
/// [`MockMiningService::mined_data`].
#[derive(Debug, Clone)]
pub struct MockMiningService {
    statuses: Arc<Mutex<VecDeque<JobStatus>>>,
    submitted: Arc<Mutex<Vec<String>>>,
    polls: Arc<AtomicUsize>,
    failure_modes: Arc<Mutex<MockMiningFailureModes>>,
}

impl Default for MockMiningService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMiningService {
    pub fn new() -> Self {
        Self {
            statuses: Arc::new(Mutex::new(VecDeque::new())),
            submitted: Arc::new(Mutex::new(Vec::new())),
            polls: Arc::new(AtomicUsize::new(0)),
            failure_modes: Arc::new(Mutex::new(MockMiningFailureModes::default())),
        }
    }

    pub fn mined_data() -> MinedTxData {
        MinedTxData {
            parents: vec!["00".repeat(32), "11".repeat(32)],
            timestamp: 1_700_000_000,
            nonce: 42,
            weight: 17.5,
        }
    }

    /// Queue statuses returned by the next polls
    pub fn with_statuses(self, statuses: Vec<JobStatus>) -> Self {
        lock(&self.statuses).extend(statuses);
        self
    }

    pub fn set_failure_modes(&self, modes: MockMiningFailureModes) {
        *lock(&self.failure_modes) = modes;
    }

    /// Hex of every submitted transaction
    pub fn submitted(&self) -> Vec<String> {
        lock(&self.submitted).clone()
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MiningService for MockMiningService {
    async fn submit_job(&self, tx_hex: &str) -> WalletResult<String> {
        if lock(&self.failure_modes).fail_submit {
            return Err(WalletError::Mining("Mock failure: submit_job".to_string()));
        }
        let mut submitted = lock(&self.submitted);
        submitted.push(tx_hex.to_string());
        Ok(format!("job-{}", submitted.len()))
    }

    async fn poll_job(&self, _job_id: &str) -> WalletResult<JobStatus> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        if lock(&self.failure_modes).fail_poll {
            return Err(WalletError::Mining("Mock failure: poll_job".to_string()));
        }
        Ok(lock(&self.statuses)
            .pop_front()
            .unwrap_or_else(|| JobStatus::Done(Self::mined_data())))
    }
}

/// How [`MockNetworkApi`] answers pushes
#[derive(Debug, Clone, Default)]
pub enum MockPushMode {
    #[default]
    Accept,
    Reject(String),
    TransportError(String),
}

/// Full node recording every pushed transaction
#[derive(Debug, Clone, Default)]
pub struct MockNetworkApi {
    mode: Arc<Mutex<MockPushMode>>,
    pushed: Arc<Mutex<Vec<String>>>,
    calls: Arc<AtomicUsize>,
}

impl MockNetworkApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(message: impl Into<String>) -> Self {
        let api = Self::new();
        api.set_mode(MockPushMode::Reject(message.into()));
        api
    }

    pub fn set_mode(&self, mode: MockPushMode) {
        *lock(&self.mode) = mode;
    }

    /// Hex of every accepted transaction
    pub fn pushed(&self) -> Vec<String> {
        lock(&self.pushed).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NetworkApi for MockNetworkApi {
    async fn push_tx(&self, tx_hex: &str) -> WalletResult<PushTxResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mode = lock(&self.mode).clone();
        match mode {
            MockPushMode::Accept => {
                lock(&self.pushed).push(tx_hex.to_string());
                Ok(PushTxResponse::accepted())
            }
            MockPushMode::Reject(message) => Ok(PushTxResponse::rejected(message)),
            MockPushMode::TransportError(message) => Err(WalletError::Network(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_signer_rejects_wrong_pin() {
        let signer = MockSigner::new("123456");
        assert!(signer.sign(b"data", "000000", "addr").await.is_err());
        let signature = signer.sign(b"data", "123456", "addr").await.unwrap();
        assert_eq!(signature, MockSigner::expected_signature(b"data", "addr"));
        assert_eq!(signer.call_count(), 2);
    }

    #[tokio::test]
    async fn test_miner_replays_script_then_finishes() {
        let miner = MockMiningService::new().with_statuses(vec![JobStatus::Pending {
            estimation: Some(3),
        }]);
        let job_id = miner.submit_job("00").await.unwrap();
        assert_eq!(
            miner.poll_job(&job_id).await.unwrap(),
            JobStatus::Pending { estimation: Some(3) }
        );
        assert_eq!(
            miner.poll_job(&job_id).await.unwrap(),
            JobStatus::Done(MockMiningService::mined_data())
        );
        assert_eq!(miner.poll_count(), 2);
    }

    #[tokio::test]
    async fn test_network_modes() {
        let api = MockNetworkApi::rejecting("double spend");
        let response = api.push_tx("00").await.unwrap();
        assert!(!response.success);
        api.set_mode(MockPushMode::TransportError("offline".to_string()));
        assert!(matches!(api.push_tx("00").await, Err(WalletError::Network(_))));
        assert!(api.pushed().is_empty());
        assert_eq!(api.call_count(), 2);
    }
}
