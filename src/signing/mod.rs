//! Signing collaborator
//!
//! Key material never enters this crate. The signer derives the private key of
//! an address, decrypting the wallet keys with the PIN, and signs the
//! transaction's signing data with it.

use async_trait::async_trait;
use zeroize::Zeroizing;

use crate::errors::WalletResult;

#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Sign `data_to_sign` with the key of `address`
    ///
    /// Returns the DER-encoded signature. A wrong PIN is reported as
    /// [`crate::errors::WalletError::Signing`].
    async fn sign(&self, data_to_sign: &[u8], pin: &str, address: &str) -> WalletResult<Vec<u8>>;
}

/// PIN kept zeroed in memory once dropped
pub type Pin = Zeroizing<String>;
