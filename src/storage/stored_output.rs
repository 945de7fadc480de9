use serde::{Deserialize, Serialize};

use crate::{
    constants::NATIVE_TOKEN_UID,
    data_structures::tx_data::DataInput,
    errors::OutputRef,
};

/// A spendable output owned by the wallet, as tracked by the storage layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnspentOutput {
    pub tx_id: String,
    pub index: u8,
    pub token: String,
    /// Amount, or the authority bitmask for authority outputs
    pub value: u64,
    pub address: String,
    /// Authority bitmask: 0 = none, bit 0 = mint, bit 1 = melt
    pub authorities: u8,
    /// Unix timestamp before which the output cannot be spent
    pub timelock: Option<u32>,
    /// Locked by the protocol (e.g. block rewards still maturing)
    pub locked: bool,
}

impl UnspentOutput {
    pub fn new(
        tx_id: impl Into<String>,
        index: u8,
        token: impl Into<String>,
        value: u64,
        address: impl Into<String>,
    ) -> Self {
        Self {
            tx_id: tx_id.into(),
            index,
            token: token.into(),
            value,
            address: address.into(),
            authorities: 0,
            timelock: None,
            locked: false,
        }
    }

    /// Native-token output helper
    pub fn native(tx_id: impl Into<String>, index: u8, value: u64, address: impl Into<String>) -> Self {
        Self::new(tx_id, index, NATIVE_TOKEN_UID, value, address)
    }

    pub fn with_authorities(mut self, authorities: u8) -> Self {
        self.authorities = authorities;
        self
    }

    pub fn with_timelock(mut self, timelock: u32) -> Self {
        self.timelock = Some(timelock);
        self
    }

    pub fn with_locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    pub fn output_ref(&self) -> OutputRef {
        OutputRef::new(self.tx_id.clone(), self.index)
    }

    pub fn is_authority(&self) -> bool {
        self.authorities != 0
    }

    pub fn is_time_locked(&self, now: u32) -> bool {
        self.timelock.map(|t| t > now).unwrap_or(false)
    }

    /// Whether the output can fund a value transfer at the given time
    pub fn is_spendable_value(&self, now: u32) -> bool {
        !self.is_authority() && !self.locked && !self.is_time_locked(now)
    }

    pub fn to_data_input(&self) -> DataInput {
        DataInput {
            tx_id: self.tx_id.clone(),
            index: self.index,
            token: self.token.clone(),
            value: self.value,
            authorities: self.authorities,
            address: self.address.clone(),
        }
    }
}
