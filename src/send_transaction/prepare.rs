//! Resolution of the caller's outputs and inputs into a balanced draft
//!
//! Every custom token is resolved first, then the fee is computed over the
//! complete set of custom-token inputs and outputs, and only then is the
//! native token resolved, since it also has to cover the fee.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use tracing::debug;

use crate::{
    constants::{MAX_OUTPUT_VALUE, MAX_OUTPUTS, NATIVE_TOKEN_UID},
    data_structures::{
        address::{Address, Network},
        script::parse_output_script,
        token::is_native_token,
        transaction::{FeeHeader, Header},
        tx_data::{AddressOutput, DataInput, DataOutput, TxDraft},
    },
    errors::{OutputRef, WalletError, WalletResult},
    fee::Fee,
    storage::{ChangeAddressOptions, UnspentOutput, WalletStorage},
    utils::current_timestamp,
    utxo::{reserve_utxos, select_and_reserve},
};

use super::SendTransaction;

/// Tokens of a transaction, in order of first appearance, and whether their
/// inputs are chosen automatically
#[derive(Debug, Default)]
pub(super) struct TokenMap {
    order: Vec<String>,
    choose_inputs: HashMap<String, bool>,
}

impl TokenMap {
    fn add(&mut self, token: &str) {
        if !self.choose_inputs.contains_key(token) {
            self.order.push(token.to_string());
            self.choose_inputs.insert(token.to_string(), true);
        }
    }

    fn contains(&self, token: &str) -> bool {
        self.choose_inputs.contains_key(token)
    }

    /// Explicit inputs disable automatic selection for their token only
    fn set_explicit(&mut self, token: &str) {
        if let Some(choose) = self.choose_inputs.get_mut(token) {
            *choose = false;
        }
    }

    fn choose_inputs(&self, token: &str) -> bool {
        self.choose_inputs.get(token).copied().unwrap_or(true)
    }

    fn custom_tokens(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|t| !is_native_token(t))
            .cloned()
            .collect()
    }
}

/// Sum of the non-authority output values of a token
fn required_amount(outputs: &[DataOutput], token: &str) -> u64 {
    outputs
        .iter()
        .filter(|o| !o.is_authority() && o.token() == token)
        .map(DataOutput::value)
        .sum()
}

fn validate_output(output: &DataOutput, network: &Network) -> WalletResult<()> {
    let (DataOutput::P2pkh(o) | DataOutput::P2sh(o)) = output else {
        return output.validate_data();
    };
    Address::parse(&o.address, network)?;
    if o.authorities != 0 {
        return Ok(());
    }
    if o.value == 0 {
        return Err(WalletError::InvalidOutput(format!(
            "output to {} has no value",
            o.address
        )));
    }
    if o.value > MAX_OUTPUT_VALUE {
        return Err(WalletError::InvalidOutput(format!(
            "output value {} exceeds the maximum of {}",
            o.value, MAX_OUTPUT_VALUE
        )));
    }
    Ok(())
}

/// Look up the outputs referenced by explicit inputs
async fn resolve_explicit_inputs(
    storage: &dyn WalletStorage,
    refs: &[OutputRef],
    network: &Network,
) -> WalletResult<Vec<DataInput>> {
    let now = current_timestamp();
    let mut resolved: Vec<DataInput> = Vec::with_capacity(refs.len());
    for output_ref in refs {
        if resolved.iter().any(|i| i.output_ref() == *output_ref) {
            return Err(WalletError::invalid_input(
                "input is duplicated",
                output_ref.clone(),
            ));
        }
        let tx = storage
            .get_tx(&output_ref.tx_id)
            .await?
            .ok_or_else(|| WalletError::invalid_input("transaction not found", output_ref.clone()))?;
        let output = tx.outputs.get(output_ref.index as usize).ok_or_else(|| {
            WalletError::invalid_input("output index out of range", output_ref.clone())
        })?;
        let token = tx.output_token(output).ok_or_else(|| {
            WalletError::invalid_input("output token is unknown", output_ref.clone())
        })?;
        let parsed = parse_output_script(&output.script, network).ok_or_else(|| {
            WalletError::invalid_input("output script is not spendable", output_ref.clone())
        })?;
        if parsed.timelock.is_some_and(|t| t > now) {
            return Err(WalletError::invalid_input(
                "output is time locked",
                output_ref.clone(),
            ));
        }
        resolved.push(DataInput {
            tx_id: output_ref.tx_id.clone(),
            index: output_ref.index,
            token,
            value: output.value,
            authorities: if output.is_authority() {
                output.value as u8
            } else {
                0
            },
            address: parsed.address.to_string(),
        });
    }
    Ok(resolved)
}

impl SendTransaction {
    /// Resolve inputs, change outputs and the fee of the requested outputs
    ///
    /// Every output chosen is reserved before this returns; on error the
    /// caller releases [`SendTransaction::reserved`].
    pub(super) async fn resolve_draft(&mut self) -> WalletResult<TxDraft> {
        let network = self.config.network.clone();
        let storage = self.services.storage.clone();
        if self.outputs.is_empty() {
            return Err(WalletError::InvalidOutput(
                "transaction has no outputs".to_string(),
            ));
        }
        if self.outputs.len() > MAX_OUTPUTS {
            return Err(WalletError::InvalidOutput(format!(
                "{} outputs exceed the maximum of {}",
                self.outputs.len(),
                MAX_OUTPUTS
            )));
        }

        let mut token_map = TokenMap::default();
        for output in &self.outputs {
            validate_output(output, &network)?;
            token_map.add(output.token());
        }

        let explicit = resolve_explicit_inputs(storage.as_ref(), &self.inputs, &network).await?;
        for input in &explicit {
            if !token_map.contains(&input.token) && !is_native_token(&input.token) {
                return Err(WalletError::invalid_input(
                    format!("input token {} is not in the outputs", input.token),
                    input.output_ref(),
                ));
            }
            token_map.add(&input.token);
            token_map.set_explicit(&input.token);
        }

        let mut inputs: Vec<DataInput> = Vec::new();
        let mut outputs = self.outputs.clone();
        let mut change_address = None;
        let mut has_change = false;

        let tokens = token_map.custom_tokens();
        for token in &tokens {
            let required = required_amount(&self.outputs, token);
            let change = if token_map.choose_inputs(token) {
                self.auto_select(token, required, &mut inputs).await?
            } else {
                let token_inputs = explicit.iter().filter(|i| i.token == *token).cloned().collect();
                self.use_explicit_inputs(token, required, token_inputs, &mut inputs)
                    .await?
            };
            if change > 0 {
                outputs.push(self.change_output(token, change, &mut change_address).await?);
                has_change = true;
            }
        }

        // every custom-token input and output is known from here on
        let fee = Fee::calculate_from_storage(storage.as_ref(), &inputs, &outputs, None).await?;

        let native_inputs: Vec<DataInput> = explicit
            .iter()
            .filter(|i| is_native_token(&i.token))
            .cloned()
            .collect();
        let native_outputs = required_amount(&self.outputs, NATIVE_TOKEN_UID);
        if fee == 0 && native_outputs == 0 && !native_inputs.is_empty() {
            return Err(WalletError::InvalidInput {
                message: "native token inputs given but no fee is due".to_string(),
                inputs: native_inputs.iter().map(DataInput::output_ref).collect(),
            });
        }
        let native_required = native_outputs + fee;
        let native_change = if !token_map.choose_inputs(NATIVE_TOKEN_UID) {
            self.use_explicit_inputs(NATIVE_TOKEN_UID, native_required, native_inputs, &mut inputs)
                .await?
        } else if native_required > 0 {
            self.auto_select(NATIVE_TOKEN_UID, native_required, &mut inputs)
                .await?
        } else {
            0
        };
        if native_change > 0 {
            outputs.push(
                self.change_output(NATIVE_TOKEN_UID, native_change, &mut change_address)
                    .await?,
            );
            has_change = true;
        }

        if has_change && self.config.shuffle_outputs {
            outputs.shuffle(&mut rand::thread_rng());
        }

        let mut draft = TxDraft::new(inputs, outputs, tokens);
        if fee > 0 {
            draft.headers.push(Header::Fee(FeeHeader::native(fee)));
        }
        debug!(
            "Prepared draft with {} inputs, {} outputs and fee {}",
            draft.inputs.len(),
            draft.outputs.len(),
            fee
        );
        Ok(draft)
    }

    /// Select and reserve outputs of `token`, returning the change
    async fn auto_select(
        &mut self,
        token: &str,
        required: u64,
        inputs: &mut Vec<DataInput>,
    ) -> WalletResult<u64> {
        if required == 0 {
            return Ok(0);
        }
        let selection = select_and_reserve(
            self.services.storage.as_ref(),
            token,
            required,
            self.config.selection_strategy,
            self.config.utxo_reservation_ttl,
        )
        .await?;
        if !selection.is_sufficient(required) {
            return Err(WalletError::InsufficientFunds {
                token: token.to_string(),
                requested: required,
                available: selection.amount,
            });
        }
        self.reserved
            .extend(selection.utxos.iter().map(UnspentOutput::output_ref));
        inputs.extend(selection.utxos.iter().map(UnspentOutput::to_data_input));
        Ok(selection.change(required))
    }

    /// Validate and reserve caller-chosen inputs of `token`, returning the change
    async fn use_explicit_inputs(
        &mut self,
        token: &str,
        required: u64,
        token_inputs: Vec<DataInput>,
        inputs: &mut Vec<DataInput>,
    ) -> WalletResult<u64> {
        let storage = self.services.storage.clone();
        for input in &token_inputs {
            let output_ref = input.output_ref();
            if storage.is_utxo_spent(&output_ref).await? {
                return Err(WalletError::invalid_input("output is already spent", output_ref));
            }
            if !storage.is_address_mine(&input.address).await? {
                return Err(WalletError::invalid_input(
                    "output does not belong to this wallet",
                    output_ref,
                ));
            }
            if input.token != token {
                return Err(WalletError::invalid_input(
                    format!("output is of token {}, expected {}", input.token, token),
                    output_ref,
                ));
            }
            if storage.is_utxo_selected_as_input(&output_ref).await? {
                return Err(WalletError::invalid_input(
                    "output is selected by another operation",
                    output_ref,
                ));
            }
        }

        let available: u64 = token_inputs
            .iter()
            .filter(|i| !i.is_authority())
            .map(|i| i.value)
            .sum();
        if available < required {
            return Err(WalletError::InsufficientInputs {
                token: token.to_string(),
                requested: required,
                available,
            });
        }

        let refs: Vec<OutputRef> = token_inputs.iter().map(DataInput::output_ref).collect();
        reserve_utxos(storage.as_ref(), &refs, self.config.utxo_reservation_ttl).await?;
        self.reserved.extend(refs);
        inputs.extend(token_inputs);
        Ok(available - required)
    }

    async fn change_output(
        &self,
        token: &str,
        value: u64,
        change_address: &mut Option<String>,
    ) -> WalletResult<DataOutput> {
        let address = match change_address.clone() {
            Some(address) => address,
            None => {
                let address = self
                    .services
                    .storage
                    .get_change_address(ChangeAddressOptions {
                        change_address: self.change_address.clone(),
                    })
                    .await?;
                *change_address = Some(address.clone());
                address
            }
        };
        DataOutput::to_address(
            AddressOutput::change(address, value, token),
            &self.config.network,
        )
    }
}
