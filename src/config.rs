//! Configuration for transaction assembly and task scheduling
//!
//! Both configurations have sensible defaults, fluent `with_*` setters and can
//! be loaded from JSON so that embedding applications can keep them alongside
//! their own settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    data_structures::address::Network,
    errors::{SchedulerError, SerializationError, WalletError, WalletResult},
};

/// Strategy used to pick unspent outputs for a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Smallest single output that covers the amount, otherwise largest first
    #[default]
    Best,
    /// First outputs returned by storage until the amount is covered
    Fast,
}

/// Configuration for [`crate::send_transaction::SendTransaction`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SendTransactionConfig {
    /// Network the addresses belong to
    pub network: Network,
    /// How long outputs stay reserved for an in-flight transaction
    #[serde(with = "duration_millis")]
    pub utxo_reservation_ttl: Duration,
    /// Interval between mining job status polls
    #[serde(with = "duration_millis")]
    pub mining_poll_interval: Duration,
    /// Give up mining after this many polls
    pub mining_max_polls: u32,
    /// Shuffle outputs when change outputs were generated
    pub shuffle_outputs: bool,
    pub selection_strategy: SelectionStrategy,
}

impl Default for SendTransactionConfig {
    fn default() -> Self {
        Self {
            network: Network::mainnet(),
            utxo_reservation_ttl: Duration::from_secs(60),
            mining_poll_interval: Duration::from_secs(1),
            mining_max_polls: 300,
            shuffle_outputs: true,
            selection_strategy: SelectionStrategy::Best,
        }
    }
}

impl SendTransactionConfig {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            ..Self::default()
        }
    }

    pub fn with_utxo_reservation_ttl(mut self, ttl: Duration) -> Self {
        self.utxo_reservation_ttl = ttl;
        self
    }

    pub fn with_mining_poll_interval(mut self, interval: Duration) -> Self {
        self.mining_poll_interval = interval;
        self
    }

    pub fn with_mining_max_polls(mut self, polls: u32) -> Self {
        self.mining_max_polls = polls;
        self
    }

    pub fn with_shuffle_outputs(mut self, shuffle: bool) -> Self {
        self.shuffle_outputs = shuffle;
        self
    }

    pub fn with_selection_strategy(mut self, strategy: SelectionStrategy) -> Self {
        self.selection_strategy = strategy;
        self
    }

    pub fn from_json(json: &str) -> WalletResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| SerializationError::JsonDeserializationError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> WalletResult<()> {
        if self.mining_max_polls == 0 {
            return Err(WalletError::Configuration(
                "mining_max_polls must be at least 1".to_string(),
            ));
        }
        if self.utxo_reservation_ttl.is_zero() {
            return Err(WalletError::Configuration(
                "utxo_reservation_ttl must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for [`crate::scheduler::TaskScheduler`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum number of tasks running at once
    pub concurrent: usize,
    /// Interval of the self-healing dispatch poll
    #[serde(with = "duration_millis")]
    pub job_interval: Duration,
    /// Capacity of the lifecycle event channel
    pub event_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrent: 1,
            job_interval: Duration::from_millis(1000),
            event_capacity: 256,
        }
    }
}

impl SchedulerConfig {
    pub fn with_concurrent(mut self, concurrent: usize) -> Self {
        self.concurrent = concurrent;
        self
    }

    pub fn with_job_interval(mut self, interval: Duration) -> Self {
        self.job_interval = interval;
        self
    }

    pub fn from_json(json: &str) -> WalletResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| SerializationError::JsonDeserializationError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.concurrent == 0 {
            return Err(SchedulerError::InvalidConcurrency(self.concurrent));
        }
        Ok(())
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
