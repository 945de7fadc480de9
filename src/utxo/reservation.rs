//! Reserving selected outputs for an in-flight transaction
//!
//! Reservation goes through [`WalletStorage::utxo_select_as_input`], a
//! compare-and-set, so two concurrent assemblies never spend the same output.

use std::time::Duration;

use tracing::{debug, warn};

use crate::{
    config::SelectionStrategy,
    errors::{OutputRef, WalletError, WalletResult},
    storage::WalletStorage,
    utxo::selection::{select_utxos, UtxoSelection},
};

/// Attempts before giving up when other operations keep winning the race
const MAX_RESERVE_ATTEMPTS: usize = 3;

/// Reserve every given output, or none of them
pub async fn reserve_utxos(
    storage: &dyn WalletStorage,
    refs: &[OutputRef],
    ttl: Duration,
) -> WalletResult<()> {
    let mut reserved = Vec::with_capacity(refs.len());
    for output_ref in refs {
        match storage.utxo_select_as_input(output_ref, true, ttl).await {
            Ok(true) => reserved.push(output_ref.clone()),
            Ok(false) => {
                release_utxos(storage, &reserved).await;
                return Err(WalletError::UtxoAlreadyReserved(output_ref.clone()));
            }
            Err(e) => {
                release_utxos(storage, &reserved).await;
                return Err(e);
            }
        }
    }
    Ok(())
}

/// Release reservations; failures are logged since callers are already
/// unwinding another error
pub async fn release_utxos(storage: &dyn WalletStorage, refs: &[OutputRef]) {
    for output_ref in refs {
        if let Err(e) = storage
            .utxo_select_as_input(output_ref, false, Duration::ZERO)
            .await
        {
            warn!("Failed to release reservation of {}: {}", output_ref, e);
        }
    }
}

/// Select outputs of `token` covering `amount` and reserve them
///
/// A shortfall is returned unreserved so the caller can report it. When
/// another operation reserves one of the chosen outputs first, selection is
/// retried against the remaining outputs.
pub async fn select_and_reserve(
    storage: &dyn WalletStorage,
    token: &str,
    amount: u64,
    strategy: SelectionStrategy,
    ttl: Duration,
) -> WalletResult<UtxoSelection> {
    let mut last_conflict = None;
    for attempt in 1..=MAX_RESERVE_ATTEMPTS {
        let selection = select_utxos(storage, token, amount, strategy).await?;
        if !selection.is_sufficient(amount) {
            return Ok(selection);
        }
        let refs: Vec<OutputRef> = selection.utxos.iter().map(|u| u.output_ref()).collect();
        match reserve_utxos(storage, &refs, ttl).await {
            Ok(()) => return Ok(selection),
            Err(WalletError::UtxoAlreadyReserved(conflict)) => {
                debug!(
                    "Output {} taken by another operation, reselecting (attempt {})",
                    conflict, attempt
                );
                last_conflict = Some(conflict);
            }
            Err(e) => return Err(e),
        }
    }
    Err(match last_conflict {
        Some(conflict) => WalletError::UtxoAlreadyReserved(conflict),
        None => WalletError::InvalidState("output reservation did not run".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data_structures::address::Network,
        storage::{MemoryWalletStorage, UnspentOutput},
    };

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_reserve_is_all_or_nothing() {
        let storage = MemoryWalletStorage::new(Network::testnet());
        let taken = OutputRef::new("bb", 0);
        storage.utxo_select_as_input(&taken, true, TTL).await.unwrap();

        let err = reserve_utxos(&storage, &[OutputRef::new("aa", 0), taken.clone()], TTL)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::UtxoAlreadyReserved(r) if r == taken));
        assert!(!storage
            .is_utxo_selected_as_input(&OutputRef::new("aa", 0))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_selections_are_disjoint() {
        let storage = MemoryWalletStorage::new(Network::testnet());
        storage.add_utxo(UnspentOutput::native("aa", 0, 50, "addr"));
        storage.add_utxo(UnspentOutput::native("bb", 0, 50, "addr"));

        let (first, second) = tokio::join!(
            select_and_reserve(&storage, "00", 40, SelectionStrategy::Best, TTL),
            select_and_reserve(&storage, "00", 40, SelectionStrategy::Best, TTL),
        );
        let (first, second) = (first.unwrap(), second.unwrap());
        assert!(first.is_sufficient(40) && second.is_sufficient(40));
        assert_ne!(first.utxos[0].output_ref(), second.utxos[0].output_ref());
        assert_eq!(storage.selected_count(), 2);

        let third = select_and_reserve(&storage, "00", 40, SelectionStrategy::Best, TTL)
            .await
            .unwrap();
        assert!(!third.is_sufficient(40));
        assert_eq!(storage.selected_count(), 2);
    }
}
