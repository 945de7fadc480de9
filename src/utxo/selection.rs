//! Unspent output selection for a single token
//!
//! Selection never fails on a shortfall: the caller compares
//! [`UtxoSelection::amount`] against the requested amount and decides how to
//! report it. Only a zero target is rejected outright.

use tracing::debug;

use crate::{
    config::SelectionStrategy,
    errors::{WalletError, WalletResult},
    storage::{UnspentOutput, UtxoFilter, WalletStorage},
    utils::current_timestamp,
};

/// Outputs chosen to fund an amount of one token
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UtxoSelection {
    pub utxos: Vec<UnspentOutput>,
    /// Sum of the selected values
    pub amount: u64,
}

impl UtxoSelection {
    fn from_utxos(utxos: Vec<UnspentOutput>) -> Self {
        let amount = utxos.iter().map(|u| u.value).sum();
        Self { utxos, amount }
    }

    pub fn is_sufficient(&self, target: u64) -> bool {
        self.amount >= target
    }

    /// Value left over after paying `target`
    pub fn change(&self, target: u64) -> u64 {
        self.amount.saturating_sub(target)
    }
}

fn accumulate<'a>(candidates: impl Iterator<Item = &'a UnspentOutput>, target: u64) -> UtxoSelection {
    let mut selection = UtxoSelection::default();
    for utxo in candidates {
        if selection.is_sufficient(target) {
            break;
        }
        selection.amount += utxo.value;
        selection.utxos.push(utxo.clone());
    }
    selection
}

/// Smallest single output covering `target`, otherwise largest first
///
/// Candidates are ordered by `(value, tx_id, index)` so the result does not
/// depend on the order storage returned them in.
pub fn best_utxo_selection(mut candidates: Vec<UnspentOutput>, target: u64) -> UtxoSelection {
    candidates.sort_by(|a, b| {
        a.value
            .cmp(&b.value)
            .then_with(|| a.tx_id.cmp(&b.tx_id))
            .then_with(|| a.index.cmp(&b.index))
    });
    if let Some(single) = candidates.iter().find(|u| u.value >= target) {
        return UtxoSelection::from_utxos(vec![single.clone()]);
    }
    accumulate(candidates.iter().rev(), target)
}

/// Outputs in the order given until `target` is covered
pub fn fast_utxo_selection(candidates: Vec<UnspentOutput>, target: u64) -> UtxoSelection {
    accumulate(candidates.iter(), target)
}

/// Select spendable outputs of `token` from storage to cover `amount`
///
/// Authority, locked, timelocked and reserved outputs are never considered.
/// The selection is not reserved; callers reserve it before using it.
pub async fn select_utxos(
    storage: &dyn WalletStorage,
    token: &str,
    amount: u64,
    strategy: SelectionStrategy,
) -> WalletResult<UtxoSelection> {
    if amount == 0 {
        return Err(WalletError::InvalidAmount(format!(
            "cannot select outputs for a zero amount of token {token}"
        )));
    }
    let now = current_timestamp();
    let candidates: Vec<UnspentOutput> = storage
        .get_unspent_outputs(UtxoFilter::spendable(token))
        .await?
        .into_iter()
        .filter(|u| u.token == token && u.is_spendable_value(now))
        .collect();

    let selection = match strategy {
        SelectionStrategy::Best => best_utxo_selection(candidates, amount),
        SelectionStrategy::Fast => fast_utxo_selection(candidates, amount),
    };
    debug!(
        "Selected {} outputs of token {} worth {} for {}",
        selection.utxos.len(),
        token,
        selection.amount,
        amount
    );
    Ok(selection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data_structures::address::Network, storage::MemoryWalletStorage};

    fn utxo(tx: &str, value: u64) -> UnspentOutput {
        UnspentOutput::native(tx, 0, value, "addr")
    }

    fn values(selection: &UtxoSelection) -> Vec<u64> {
        selection.utxos.iter().map(|u| u.value).collect()
    }

    #[test]
    fn test_best_prefers_smallest_covering_output() {
        let selection = best_utxo_selection(
            vec![utxo("a", 50), utxo("b", 7), utxo("c", 12), utxo("d", 10)],
            9,
        );
        assert_eq!(values(&selection), vec![10]);
        assert_eq!(selection.amount, 10);
        assert_eq!(selection.change(9), 1);
    }

    #[test]
    fn test_best_accumulates_largest_first() {
        let selection = best_utxo_selection(
            vec![utxo("a", 5), utxo("b", 30), utxo("c", 20), utxo("d", 1)],
            45,
        );
        assert_eq!(values(&selection), vec![30, 20]);
        assert!(selection.is_sufficient(45));
    }

    #[test]
    fn test_best_tie_break_is_deterministic() {
        let forward = best_utxo_selection(vec![utxo("b", 10), utxo("a", 10)], 10);
        let backward = best_utxo_selection(vec![utxo("a", 10), utxo("b", 10)], 10);
        assert_eq!(forward, backward);
        assert_eq!(forward.utxos[0].tx_id, "a");
    }

    #[test]
    fn test_shortfall_is_reported_not_raised() {
        let selection = best_utxo_selection(vec![utxo("a", 5), utxo("b", 3)], 10);
        assert_eq!(selection.amount, 8);
        assert!(!selection.is_sufficient(10));
        assert_eq!(selection.utxos.len(), 2);
    }

    #[test]
    fn test_fast_keeps_given_order() {
        let selection = fast_utxo_selection(vec![utxo("a", 1), utxo("b", 100), utxo("c", 2)], 50);
        assert_eq!(values(&selection), vec![1, 100]);
    }

    #[tokio::test]
    async fn test_select_utxos_rejects_zero() {
        let storage = MemoryWalletStorage::new(Network::testnet());
        let err = select_utxos(&storage, "00", 0, SelectionStrategy::Best)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::InvalidAmount(_)));
    }

    #[tokio::test]
    async fn test_select_utxos_skips_unusable_outputs() {
        let storage = MemoryWalletStorage::new(Network::testnet());
        storage.add_utxo(utxo("a", 40));
        storage.add_utxo(utxo("b", 500).with_authorities(1));
        storage.add_utxo(utxo("c", 500).with_locked(true));
        storage.add_utxo(utxo("d", 500).with_timelock(u32::MAX));
        storage.add_utxo(UnspentOutput::new("e", 0, "01", 500, "addr"));

        let selection = select_utxos(&storage, "00", 100, SelectionStrategy::Best)
            .await
            .unwrap();
        assert_eq!(values(&selection), vec![40]);
        assert!(!selection.is_sufficient(100));

        let enough = select_utxos(&storage, "00", 30, SelectionStrategy::Fast)
            .await
            .unwrap();
        assert!(enough.is_sufficient(30));
    }
}
