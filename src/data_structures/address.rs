//! Base58 address decoding
//!
//! Addresses are 25 bytes once decoded: a network version byte, the 20-byte
//! public key (or redeem script) hash and a 4-byte checksum taken from the
//! double SHA-256 of the first 21 bytes.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{WalletError, WalletResult};

const ADDRESS_SIZE: usize = 25;
const HASH_SIZE: usize = 20;
const CHECKSUM_SIZE: usize = 4;

/// Address version bytes of a network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub name: String,
    pub p2pkh_version: u8,
    pub p2sh_version: u8,
}

impl Network {
    pub fn mainnet() -> Self {
        Self {
            name: "mainnet".to_string(),
            p2pkh_version: 0x28,
            p2sh_version: 0x64,
        }
    }

    pub fn testnet() -> Self {
        Self {
            name: "testnet".to_string(),
            p2pkh_version: 0x49,
            p2sh_version: 0x87,
        }
    }

    pub fn privnet() -> Self {
        Self {
            name: "privnet".to_string(),
            p2pkh_version: 0x49,
            p2sh_version: 0x87,
        }
    }

    pub fn from_name(name: &str) -> WalletResult<Self> {
        match name {
            "mainnet" => Ok(Self::mainnet()),
            "testnet" => Ok(Self::testnet()),
            "privnet" => Ok(Self::privnet()),
            other => Err(WalletError::Configuration(format!(
                "Unknown network: {other}"
            ))),
        }
    }
}

impl Default for Network {
    fn default() -> Self {
        Self::mainnet()
    }
}

/// Kind of script an address locks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressKind {
    P2pkh,
    P2sh,
}

/// A decoded, checksum-verified address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    base58: String,
    kind: AddressKind,
    hash: [u8; HASH_SIZE],
}

fn checksum(payload: &[u8]) -> [u8; CHECKSUM_SIZE] {
    let digest = Sha256::digest(Sha256::digest(payload));
    let mut out = [0u8; CHECKSUM_SIZE];
    out.copy_from_slice(&digest[..CHECKSUM_SIZE]);
    out
}

impl Address {
    /// Decode and validate a base58 address against a network
    pub fn parse(base58: &str, network: &Network) -> WalletResult<Self> {
        let bytes = bs58::decode(base58)
            .into_vec()
            .map_err(|e| WalletError::InvalidAddress(format!("{base58}: {e}")))?;
        if bytes.len() != ADDRESS_SIZE {
            return Err(WalletError::InvalidAddress(format!(
                "{base58}: expected {ADDRESS_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        let (payload, check) = bytes.split_at(ADDRESS_SIZE - CHECKSUM_SIZE);
        if checksum(payload) != check {
            return Err(WalletError::InvalidAddress(format!(
                "{base58}: invalid checksum"
            )));
        }
        let kind = if payload[0] == network.p2pkh_version {
            AddressKind::P2pkh
        } else if payload[0] == network.p2sh_version {
            AddressKind::P2sh
        } else {
            return Err(WalletError::InvalidAddress(format!(
                "{base58}: version byte {:#04x} does not belong to {}",
                payload[0], network.name
            )));
        };
        let mut hash = [0u8; HASH_SIZE];
        hash.copy_from_slice(&payload[1..]);
        Ok(Self {
            base58: base58.to_string(),
            kind,
            hash,
        })
    }

    /// Encode a hash into an address of the given kind
    pub fn from_hash(hash: [u8; HASH_SIZE], kind: AddressKind, network: &Network) -> Self {
        let version = match kind {
            AddressKind::P2pkh => network.p2pkh_version,
            AddressKind::P2sh => network.p2sh_version,
        };
        let mut payload = Vec::with_capacity(ADDRESS_SIZE);
        payload.push(version);
        payload.extend_from_slice(&hash);
        let check = checksum(&payload);
        payload.extend_from_slice(&check);
        Self {
            base58: bs58::encode(payload).into_string(),
            kind,
            hash,
        }
    }

    pub fn kind(&self) -> AddressKind {
        self.kind
    }

    pub fn hash(&self) -> &[u8; HASH_SIZE] {
        &self.hash
    }

    pub fn as_str(&self) -> &str {
        &self.base58
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base58)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_encode_decode() {
        let network = Network::testnet();
        let address = Address::from_hash([7u8; 20], AddressKind::P2pkh, &network);
        let parsed = Address::parse(address.as_str(), &network).unwrap();
        assert_eq!(parsed.kind(), AddressKind::P2pkh);
        assert_eq!(parsed.hash(), &[7u8; 20]);
    }

    #[test]
    fn test_p2sh_address() {
        let network = Network::mainnet();
        let address = Address::from_hash([1u8; 20], AddressKind::P2sh, &network);
        assert_eq!(
            Address::parse(address.as_str(), &network).unwrap().kind(),
            AddressKind::P2sh
        );
    }

    #[test]
    fn test_wrong_network_rejected() {
        let address = Address::from_hash([7u8; 20], AddressKind::P2pkh, &Network::testnet());
        let err = Address::parse(address.as_str(), &Network::mainnet()).unwrap_err();
        assert!(matches!(err, WalletError::InvalidAddress(_)));
    }

    #[test]
    fn test_bad_checksum_rejected() {
        let network = Network::testnet();
        let mut bytes = vec![network.p2pkh_version];
        bytes.extend_from_slice(&[9u8; 20]);
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        let encoded = bs58::encode(bytes).into_string();
        assert!(Address::parse(&encoded, &network).is_err());
    }
}
