use serde::{Deserialize, Serialize};

use crate::constants::NATIVE_TOKEN_UID;

/// Protocol version of a token, deciding how operations on it are paid for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum TokenVersion {
    Native = 0,
    /// Minting locks a native-token deposit, melting releases it
    #[default]
    Deposit = 1,
    /// Every non-authority output pays [`crate::constants::FEE_PER_OUTPUT`]
    Fee = 2,
}

impl TokenVersion {
    pub fn is_fee_model(&self) -> bool {
        matches!(self, TokenVersion::Fee)
    }
}

/// Token metadata as known by the wallet storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub uid: String,
    pub name: String,
    pub symbol: String,
    pub version: TokenVersion,
}

impl TokenMetadata {
    pub fn new(
        uid: impl Into<String>,
        name: impl Into<String>,
        symbol: impl Into<String>,
        version: TokenVersion,
    ) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
            symbol: symbol.into(),
            version,
        }
    }

    pub fn native() -> Self {
        Self::new(NATIVE_TOKEN_UID, "Hathor", "HTR", TokenVersion::Native)
    }
}

pub fn is_native_token(uid: &str) -> bool {
    uid == NATIVE_TOKEN_UID
}
