//! Draft transaction data produced by the assembler before it is bound to a
//! concrete [`Transaction`]

use semver::Version;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    constants::{
        CREATE_TOKEN_TX_VERSION, DATA_SCRIPT_OUTPUT_VALUE, DEFAULT_TX_VERSION,
        MAX_DATA_SCRIPT_LENGTH, NATIVE_TOKEN_UID, TOKEN_AUTHORITY_MASK,
    },
    data_structures::{
        address::{Address, AddressKind, Network},
        create_token_transaction::TokenInfo,
        script,
        transaction::{Header, Input, Output, Transaction},
    },
    errors::{OutputRef, SerializationError, WalletError, WalletResult},
};

const SUPPORTED_VERSION: &str = "1.0.0";

pub fn get_supported_version() -> Version {
    Version::new(1, 0, 0)
}

pub trait HasVersion {
    fn get_version(&self) -> &Version;
}

/// JSON export with a format version, so partially built transactions can be
/// handed to co-signers and read back
pub trait TransactionResult: HasVersion + Serialize + DeserializeOwned + Sized {
    fn from_json(s: &str) -> WalletResult<Self> {
        let value: serde_json::Value = serde_json::from_str(s)
            .map_err(|e| SerializationError::JsonDeserializationError(e.to_string()))?;
        let version = value.get("version").ok_or_else(|| {
            SerializationError::JsonDeserializationError("Missing version".into())
        })?;
        let version: Version = serde_json::from_value(version.clone())
            .map_err(|e| SerializationError::JsonDeserializationError(e.to_string()))?;
        if version != get_supported_version() {
            return Err(SerializationError::JsonDeserializationError(format!(
                "Unsupported version. Expected '{SUPPORTED_VERSION}', got '{version}'"
            ))
            .into());
        }

        let deserialized_obj: Self = serde_json::from_value(value)
            .map_err(|e| SerializationError::JsonDeserializationError(e.to_string()))?;

        Ok(deserialized_obj)
    }

    fn to_json(&self) -> WalletResult<String> {
        serde_json::to_string(&self)
            .map_err(|e| SerializationError::JsonSerializationError(e.to_string()).into())
    }
}

/// An output consumed by the transaction being assembled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataInput {
    pub tx_id: String,
    pub index: u8,
    pub token: String,
    pub value: u64,
    pub authorities: u8,
    pub address: String,
}

impl DataInput {
    pub fn output_ref(&self) -> OutputRef {
        OutputRef::new(self.tx_id.clone(), self.index)
    }

    pub fn is_authority(&self) -> bool {
        self.authorities != 0
    }
}

/// Output locked to an address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressOutput {
    pub address: String,
    /// Amount, or zero for authority outputs
    pub value: u64,
    pub token: String,
    pub timelock: Option<u32>,
    pub authorities: u8,
    pub is_change: bool,
}

impl AddressOutput {
    pub fn new(address: impl Into<String>, value: u64, token: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            value,
            token: token.into(),
            timelock: None,
            authorities: 0,
            is_change: false,
        }
    }

    pub fn with_timelock(mut self, timelock: u32) -> Self {
        self.timelock = Some(timelock);
        self
    }

    pub fn authority(address: impl Into<String>, token: impl Into<String>, authorities: u8) -> Self {
        Self {
            authorities,
            ..Self::new(address, 0, token)
        }
    }

    pub fn change(address: impl Into<String>, value: u64, token: impl Into<String>) -> Self {
        Self {
            is_change: true,
            ..Self::new(address, value, token)
        }
    }
}

/// Output of a draft transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataOutput {
    P2pkh(AddressOutput),
    P2sh(AddressOutput),
    /// Data carrier, always worth [`DATA_SCRIPT_OUTPUT_VALUE`] of the native token
    Data { data: String },
}

impl DataOutput {
    /// Build an address output, choosing P2PKH or P2SH from the address version
    pub fn to_address(output: AddressOutput, network: &Network) -> WalletResult<Self> {
        let address = Address::parse(&output.address, network)?;
        Ok(match address.kind() {
            AddressKind::P2pkh => DataOutput::P2pkh(output),
            AddressKind::P2sh => DataOutput::P2sh(output),
        })
    }

    pub fn data(data: impl Into<String>) -> Self {
        DataOutput::Data { data: data.into() }
    }

    /// Reject data-carrier payloads over [`MAX_DATA_SCRIPT_LENGTH`] bytes
    pub fn validate_data(&self) -> WalletResult<()> {
        match self {
            DataOutput::Data { data } if data.len() > MAX_DATA_SCRIPT_LENGTH => {
                Err(WalletError::InvalidOutput(format!(
                    "data output of {} bytes exceeds the maximum of {}",
                    data.len(),
                    MAX_DATA_SCRIPT_LENGTH
                )))
            }
            _ => Ok(()),
        }
    }

    pub fn token(&self) -> &str {
        match self {
            DataOutput::P2pkh(o) | DataOutput::P2sh(o) => &o.token,
            DataOutput::Data { .. } => NATIVE_TOKEN_UID,
        }
    }

    pub fn value(&self) -> u64 {
        match self {
            DataOutput::P2pkh(o) | DataOutput::P2sh(o) => o.value,
            DataOutput::Data { .. } => DATA_SCRIPT_OUTPUT_VALUE,
        }
    }

    pub fn authorities(&self) -> u8 {
        match self {
            DataOutput::P2pkh(o) | DataOutput::P2sh(o) => o.authorities,
            DataOutput::Data { .. } => 0,
        }
    }

    pub fn is_authority(&self) -> bool {
        self.authorities() != 0
    }

    pub fn is_change(&self) -> bool {
        matches!(self, DataOutput::P2pkh(o) | DataOutput::P2sh(o) if o.is_change)
    }

    pub fn address(&self) -> Option<&str> {
        match self {
            DataOutput::P2pkh(o) | DataOutput::P2sh(o) => Some(&o.address),
            DataOutput::Data { .. } => None,
        }
    }

    pub fn script(&self, network: &Network) -> WalletResult<Vec<u8>> {
        match self {
            DataOutput::P2pkh(o) | DataOutput::P2sh(o) => {
                let address = Address::parse(&o.address, network)?;
                Ok(script::output_script(&address, o.timelock))
            }
            DataOutput::Data { data } => Ok(script::data_script(data.as_bytes())?),
        }
    }
}

/// Nano-contract actions that move tokens in or out of a contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NanoAction {
    Deposit { token: String, amount: u64 },
    Withdrawal { token: String, amount: u64 },
    GrantAuthority { token: String, authorities: u8 },
    AcquireAuthority { token: String, authorities: u8 },
}

/// Fully resolved, balanced transaction data that has not been signed yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxDraft {
    pub version: Version,
    pub inputs: Vec<DataInput>,
    pub outputs: Vec<DataOutput>,
    /// Custom tokens referenced by the outputs, native token excluded
    pub tokens: Vec<String>,
    pub headers: Vec<Header>,
    pub token_info: Option<TokenInfo>,
}

impl HasVersion for TxDraft {
    fn get_version(&self) -> &Version {
        &self.version
    }
}

impl TransactionResult for TxDraft {}

impl TxDraft {
    pub fn new(inputs: Vec<DataInput>, outputs: Vec<DataOutput>, tokens: Vec<String>) -> Self {
        Self {
            version: get_supported_version(),
            inputs,
            outputs,
            tokens,
            headers: Vec::new(),
            token_info: None,
        }
    }

    fn token_data(&self, output: &DataOutput) -> WalletResult<u8> {
        let token = output.token();
        let index = if token == NATIVE_TOKEN_UID {
            0
        } else if self.token_info.is_some() {
            // the created token is implicitly the first custom token
            1
        } else {
            self.tokens
                .iter()
                .position(|t| t == token)
                .map(|i| i + 1)
                .ok_or_else(|| {
                    WalletError::InvalidOutput(format!("token {token} missing from token list"))
                })?
        };
        if index > 0x7f {
            return Err(WalletError::InvalidOutput(format!(
                "too many tokens in transaction: {index}"
            )));
        }
        let index = index as u8;
        Ok(if output.is_authority() {
            index | TOKEN_AUTHORITY_MASK
        } else {
            index
        })
    }

    /// Materialize the draft into an unsigned transaction
    pub fn to_transaction(&self, network: &Network) -> WalletResult<Transaction> {
        let inputs = self
            .inputs
            .iter()
            .map(|i| Input::new(i.tx_id.clone(), i.index))
            .collect();
        let outputs = self
            .outputs
            .iter()
            .map(|o| {
                let value = if o.is_authority() {
                    o.authorities() as u64
                } else {
                    o.value()
                };
                Ok(Output::new(value, self.token_data(o)?, o.script(network)?))
            })
            .collect::<WalletResult<Vec<_>>>()?;
        let mut tx = Transaction::new(inputs, outputs, Vec::new());
        match &self.token_info {
            Some(info) => {
                tx.version = CREATE_TOKEN_TX_VERSION;
                tx.token_info = Some(info.clone());
            }
            None => {
                tx.version = DEFAULT_TX_VERSION;
                tx.tokens = self.tokens.clone();
            }
        }
        tx.headers = self.headers.clone();
        Ok(tx)
    }
}
