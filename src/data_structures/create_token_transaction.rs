//! Create-token transactions
//!
//! A create-token transaction carries the name and symbol of the new token in
//! a versioned block placed right after the funds section:
//! `[version:1][name_len:1][name][symbol_len:1][symbol]`.

use serde::{Deserialize, Serialize};

use crate::{
    constants::{
        CREATE_TOKEN_TX_VERSION, MAX_TOKEN_NAME_SIZE, MAX_TOKEN_SYMBOL_SIZE, TOKEN_INFO_VERSION,
    },
    data_structures::transaction::{ByteReader, Input, Output, Transaction},
    errors::{SerializationError, WalletError, WalletResult},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub name: String,
    pub symbol: String,
}

impl TokenInfo {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
        }
    }

    pub fn validate(&self) -> Result<(), SerializationError> {
        if self.name.is_empty() {
            return Err(SerializationError::EmptyTokenName);
        }
        if self.symbol.is_empty() {
            return Err(SerializationError::EmptyTokenSymbol);
        }
        if self.name.len() > MAX_TOKEN_NAME_SIZE {
            return Err(SerializationError::FieldTooLong {
                field: "token name",
                len: self.name.len(),
                max: MAX_TOKEN_NAME_SIZE,
            });
        }
        if self.symbol.len() > MAX_TOKEN_SYMBOL_SIZE {
            return Err(SerializationError::FieldTooLong {
                field: "token symbol",
                len: self.symbol.len(),
                max: MAX_TOKEN_SYMBOL_SIZE,
            });
        }
        Ok(())
    }

    pub(crate) fn serialize(&self, buf: &mut Vec<u8>) -> Result<(), SerializationError> {
        self.validate()?;
        buf.push(TOKEN_INFO_VERSION);
        buf.push(self.name.len() as u8);
        buf.extend_from_slice(self.name.as_bytes());
        buf.push(self.symbol.len() as u8);
        buf.extend_from_slice(self.symbol.as_bytes());
        Ok(())
    }

    pub(crate) fn deserialize(reader: &mut ByteReader<'_>) -> Result<Self, SerializationError> {
        let version = reader.read_u8("token info version")?;
        if version != TOKEN_INFO_VERSION {
            return Err(SerializationError::UnknownTokenInfoVersion(version));
        }
        let name_len = reader.read_u8("token name length")? as usize;
        let name = std::str::from_utf8(reader.read_bytes(name_len, "token name")?)
            .map_err(|_| SerializationError::InvalidUtf8("token name"))?
            .to_string();
        let symbol_len = reader.read_u8("token symbol length")? as usize;
        let symbol = std::str::from_utf8(reader.read_bytes(symbol_len, "token symbol")?)
            .map_err(|_| SerializationError::InvalidUtf8("token symbol"))?
            .to_string();
        Ok(Self { name, symbol })
    }
}

/// A transaction that creates a new custom token
///
/// The created token's uid is the transaction hash; its outputs refer to it
/// through token index 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTokenTransaction(Transaction);

impl CreateTokenTransaction {
    pub fn new(
        name: impl Into<String>,
        symbol: impl Into<String>,
        inputs: Vec<Input>,
        outputs: Vec<Output>,
    ) -> Self {
        let mut tx = Transaction::new(inputs, outputs, Vec::new());
        tx.version = CREATE_TOKEN_TX_VERSION;
        tx.token_info = Some(TokenInfo::new(name, symbol));
        Self(tx)
    }

    pub fn from_transaction(tx: Transaction) -> WalletResult<Self> {
        if !tx.is_create_token() || tx.token_info.is_none() {
            return Err(WalletError::InvalidState(format!(
                "transaction version {} is not a create-token transaction",
                tx.version
            )));
        }
        Ok(Self(tx))
    }

    pub fn from_bytes(bytes: &[u8]) -> WalletResult<Self> {
        Self::from_transaction(Transaction::from_bytes(bytes)?)
    }

    pub fn name(&self) -> &str {
        self.token_info().map(|i| i.name.as_str()).unwrap_or_default()
    }

    pub fn symbol(&self) -> &str {
        self.token_info().map(|i| i.symbol.as_str()).unwrap_or_default()
    }

    fn token_info(&self) -> Option<&TokenInfo> {
        self.0.token_info.as_ref()
    }

    pub fn to_bytes(&self) -> WalletResult<Vec<u8>> {
        self.0.to_bytes()
    }

    pub fn as_transaction(&self) -> &Transaction {
        &self.0
    }

    pub fn into_transaction(self) -> Transaction {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::transaction::MinedTxData;

    fn sample() -> CreateTokenTransaction {
        let mut input = Input::new("ab".repeat(32), 0);
        input.data = vec![0x47; 10];
        let outputs = vec![Output::new(100, 1, vec![0xac]), Output::new(9, 0, vec![0xac])];
        let mut tx = CreateTokenTransaction::new("TokenName", "TKN", vec![input], outputs);
        tx.0.apply_mined_data(&MinedTxData {
            parents: vec!["01".repeat(32)],
            timestamp: 1_650_000_000,
            nonce: 7,
            weight: 8.0,
        });
        tx
    }

    #[test]
    fn test_create_token_round_trip() {
        let tx = sample();
        let parsed = CreateTokenTransaction::from_bytes(&tx.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed.name(), "TokenName");
        assert_eq!(parsed.symbol(), "TKN");
        assert_eq!(parsed.as_transaction().inputs, tx.as_transaction().inputs);
        assert_eq!(parsed.as_transaction().outputs, tx.as_transaction().outputs);
        assert_eq!(parsed.as_transaction().nonce, 7);
    }

    #[test]
    fn test_token_info_sits_between_funds_and_graph() {
        let tx = sample();
        let bytes = tx.to_bytes().unwrap();
        let mut info = Vec::new();
        tx.token_info().unwrap().serialize(&mut info).unwrap();
        let data_to_sign = tx.as_transaction().data_to_sign().unwrap();
        assert!(data_to_sign.ends_with(&info));
        // the full funds section also carries the 10 bytes of input data
        let offset = data_to_sign.len() - info.len() + 10;
        assert_eq!(&bytes[offset..offset + info.len()], info.as_slice());
    }

    #[test]
    fn test_unknown_token_info_version_rejected() {
        let tx = sample();
        let mut bytes = tx.to_bytes().unwrap();
        let data_to_sign = tx.as_transaction().data_to_sign().unwrap();
        let info_len = 1 + 1 + "TokenName".len() + 1 + "TKN".len();
        let offset = data_to_sign.len() - info_len + 10;
        assert_eq!(bytes[offset], TOKEN_INFO_VERSION);
        bytes[offset] = 9;
        let err = CreateTokenTransaction::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err,
            WalletError::Serialization(SerializationError::UnknownTokenInfoVersion(9))
        ));
    }

    #[test]
    fn test_empty_name_or_symbol_fails_serialization() {
        let tx = CreateTokenTransaction::new("", "TKN", vec![], vec![]);
        assert!(matches!(
            tx.to_bytes().unwrap_err(),
            WalletError::Serialization(SerializationError::EmptyTokenName)
        ));
        let tx = CreateTokenTransaction::new("Name", "", vec![], vec![]);
        assert!(matches!(
            tx.to_bytes().unwrap_err(),
            WalletError::Serialization(SerializationError::EmptyTokenSymbol)
        ));
    }

    #[test]
    fn test_regular_transaction_is_not_create_token() {
        let tx = Transaction::new(vec![], vec![], vec![]);
        assert!(CreateTokenTransaction::from_bytes(&tx.to_bytes().unwrap()).is_err());
    }
}
