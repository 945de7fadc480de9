pub mod reservation;
pub mod selection;

pub use reservation::{release_utxos, reserve_utxos, select_and_reserve};
pub use selection::{best_utxo_selection, fast_utxo_selection, select_utxos, UtxoSelection};
