//! Native-token fees and deposits owed by a transaction
//!
//! Fee-model tokens pay [`FEE_PER_OUTPUT`] for every non-authority output.
//! Deposit-model tokens pay nothing here; their cost is the mint deposit, see
//! [`get_mint_deposit`].

use std::collections::{BTreeMap, HashMap};

use crate::{
    constants::{DATA_SCRIPT_OUTPUT_VALUE, FEE_PER_OUTPUT, TOKEN_DEPOSIT_PERCENT},
    data_structures::{
        token::{is_native_token, TokenMetadata},
        tx_data::{DataInput, DataOutput, NanoAction},
    },
    errors::{WalletError, WalletResult},
    storage::WalletStorage,
};

#[derive(Debug, Default, Clone, Copy)]
struct TokenUsage {
    inputs: u64,
    outputs: u64,
}

/// Per-token count of non-authority inputs and outputs, native token excluded
fn token_usage<'a>(
    inputs: &'a [DataInput],
    outputs: &'a [DataOutput],
    nano_actions: Option<&'a [NanoAction]>,
) -> BTreeMap<&'a str, TokenUsage> {
    let mut usage: BTreeMap<&str, TokenUsage> = BTreeMap::new();
    for input in inputs.iter().filter(|i| !i.is_authority()) {
        usage.entry(input.token.as_str()).or_default().inputs += 1;
    }
    for output in outputs.iter().filter(|o| !o.is_authority()) {
        usage.entry(output.token()).or_default().outputs += 1;
    }
    for action in nano_actions.unwrap_or_default() {
        match action {
            NanoAction::Deposit { token, .. } => usage.entry(token.as_str()).or_default().outputs += 1,
            NanoAction::Withdrawal { token, .. } => usage.entry(token.as_str()).or_default().inputs += 1,
            NanoAction::GrantAuthority { .. } | NanoAction::AcquireAuthority { .. } => {}
        }
    }
    usage.retain(|token, _| !is_native_token(token));
    usage
}

/// Fee calculator for fee-model tokens
pub struct Fee;

impl Fee {
    /// Fee in native-token units owed by the given inputs, outputs and actions
    ///
    /// Every custom token involved must have an entry in `tokens`, otherwise
    /// the fee would be understated and [`WalletError::TokenNotFound`] is
    /// returned instead.
    pub fn calculate(
        inputs: &[DataInput],
        outputs: &[DataOutput],
        tokens: &HashMap<String, TokenMetadata>,
        nano_actions: Option<&[NanoAction]>,
    ) -> WalletResult<u64> {
        let mut fee = 0u64;
        for (token, usage) in token_usage(inputs, outputs, nano_actions) {
            let metadata = tokens
                .get(token)
                .ok_or_else(|| WalletError::TokenNotFound(token.to_string()))?;
            if !metadata.version.is_fee_model() {
                continue;
            }
            fee += if usage.outputs == 0 && usage.inputs > 0 {
                // melting everything still costs one output
                FEE_PER_OUTPUT
            } else {
                usage.outputs * FEE_PER_OUTPUT
            };
        }
        Ok(fee)
    }

    /// Same as [`Fee::calculate`], resolving token metadata through storage
    pub async fn calculate_from_storage(
        storage: &dyn WalletStorage,
        inputs: &[DataInput],
        outputs: &[DataOutput],
        nano_actions: Option<&[NanoAction]>,
    ) -> WalletResult<u64> {
        let mut tokens = HashMap::new();
        for token in token_usage(inputs, outputs, nano_actions).keys() {
            let metadata = storage
                .get_token(token)
                .await?
                .ok_or_else(|| WalletError::TokenNotFound(token.to_string()))?;
            tokens.insert(token.to_string(), metadata);
        }
        Self::calculate(inputs, outputs, &tokens, nano_actions)
    }
}

/// Native-token deposit required to mint `amount` of a deposit-model token
pub fn get_mint_deposit(amount: u64) -> u64 {
    let scaled = amount as u128 * TOKEN_DEPOSIT_PERCENT as u128;
    scaled.div_ceil(100) as u64
}

/// Native-token amount released by melting `amount` of a deposit-model token
pub fn get_melt_withdraw(amount: u64) -> u64 {
    (amount as u128 * TOKEN_DEPOSIT_PERCENT as u128 / 100) as u64
}

/// Native-token cost of `count` data-carrier outputs
pub fn get_data_script_fee(count: usize) -> u64 {
    count as u64 * DATA_SCRIPT_OUTPUT_VALUE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::{
        address::Network,
        token::TokenVersion,
        tx_data::AddressOutput,
    };
    use crate::storage::MemoryWalletStorage;

    const FEE_TOKEN: &str = "fee-token";
    const DEPOSIT_TOKEN: &str = "deposit-token";

    fn token_map() -> HashMap<String, TokenMetadata> {
        HashMap::from([
            (
                FEE_TOKEN.to_string(),
                TokenMetadata::new(FEE_TOKEN, "Fee", "FEE", TokenVersion::Fee),
            ),
            (
                DEPOSIT_TOKEN.to_string(),
                TokenMetadata::new(DEPOSIT_TOKEN, "Deposit", "DEP", TokenVersion::Deposit),
            ),
        ])
    }

    fn input(token: &str, authorities: u8) -> DataInput {
        DataInput {
            tx_id: "aa".repeat(32),
            index: 0,
            token: token.to_string(),
            value: 10,
            authorities,
            address: "addr".to_string(),
        }
    }

    fn output(token: &str) -> DataOutput {
        DataOutput::P2pkh(AddressOutput::new("addr", 5, token))
    }

    #[test]
    fn test_fee_per_fee_model_output() {
        let inputs = vec![input(FEE_TOKEN, 0), input(DEPOSIT_TOKEN, 0), input("00", 0)];
        let outputs = vec![
            output(FEE_TOKEN),
            output(FEE_TOKEN),
            output(DEPOSIT_TOKEN),
            output("00"),
            DataOutput::data("memo"),
        ];
        let tokens = token_map();
        let fee = Fee::calculate(&inputs, &outputs, &tokens, None).unwrap();
        assert_eq!(fee, 2 * FEE_PER_OUTPUT);
        // idempotent
        assert_eq!(Fee::calculate(&inputs, &outputs, &tokens, None).unwrap(), fee);
    }

    #[test]
    fn test_melt_only_charges_floor() {
        let fee = Fee::calculate(&[input(FEE_TOKEN, 0)], &[], &token_map(), None).unwrap();
        assert_eq!(fee, FEE_PER_OUTPUT);
    }

    #[test]
    fn test_authorities_are_not_counted() {
        let inputs = vec![input(FEE_TOKEN, 1)];
        let outputs = vec![DataOutput::P2pkh(AddressOutput::authority("addr", FEE_TOKEN, 1))];
        let fee = Fee::calculate(&inputs, &outputs, &token_map(), None).unwrap();
        assert_eq!(fee, 0);
    }

    #[test]
    fn test_missing_metadata_fails() {
        let err = Fee::calculate(&[], &[output("unknown")], &token_map(), None).unwrap_err();
        assert!(matches!(err, WalletError::TokenNotFound(t) if t == "unknown"));
    }

    #[test]
    fn test_nano_actions_count_as_virtual_outputs_and_inputs() {
        let deposit = [NanoAction::Deposit {
            token: FEE_TOKEN.to_string(),
            amount: 3,
        }];
        assert_eq!(
            Fee::calculate(&[], &[], &token_map(), Some(&deposit)).unwrap(),
            FEE_PER_OUTPUT
        );

        let withdrawal = [NanoAction::Withdrawal {
            token: FEE_TOKEN.to_string(),
            amount: 3,
        }];
        assert_eq!(
            Fee::calculate(&[], &[], &token_map(), Some(&withdrawal)).unwrap(),
            FEE_PER_OUTPUT
        );

        let native = [NanoAction::Deposit {
            token: "00".to_string(),
            amount: 3,
        }];
        assert_eq!(Fee::calculate(&[], &[], &token_map(), Some(&native)).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_calculate_from_storage() {
        let storage = MemoryWalletStorage::new(Network::testnet());
        storage.add_token(TokenMetadata::new(FEE_TOKEN, "Fee", "FEE", TokenVersion::Fee));
        let fee = Fee::calculate_from_storage(&storage, &[], &[output(FEE_TOKEN)], None)
            .await
            .unwrap();
        assert_eq!(fee, FEE_PER_OUTPUT);

        let err = Fee::calculate_from_storage(&storage, &[], &[output(DEPOSIT_TOKEN)], None)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::TokenNotFound(_)));
    }

    #[test]
    fn test_deposit_helpers_round_in_network_favor() {
        assert_eq!(get_mint_deposit(100), 1);
        assert_eq!(get_mint_deposit(101), 2);
        assert_eq!(get_mint_deposit(1), 1);
        assert_eq!(get_melt_withdraw(199), 1);
        assert_eq!(get_melt_withdraw(99), 0);
        assert_eq!(get_data_script_fee(3), 3 * DATA_SCRIPT_OUTPUT_VALUE);
    }
}
