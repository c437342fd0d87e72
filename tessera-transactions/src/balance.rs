//! The balancing fixed point: surplus computation, size-guarded change
//! splitting, collateral derivation, and the fee/size iteration that
//! `TxBuilder::complete` drives to convergence.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use tessera_primitives::{
    AssetName, Address, CanonicalCbor, PolicyId, ProtocolParameters, Transaction, TransactionBody,
    TransactionId, TransactionOutput, Value,
};

use crate::assemble::CollateralPlan;
use crate::error::{BalancingError, TxBuilderError, ValidationError};
use crate::{fees, TxBuilder};

/// The fee affects the encoded size, which affects the fee; with minimal-width
/// integers the iteration settles after the fee's width stops changing. Five
/// passes is enough from a standing start (fee zero), with room for one
/// evaluator-induced resize.
pub(crate) const MAX_BALANCE_PASSES: usize = 5;

impl TxBuilder {
    /// Balances the transaction and renders it to its final canonical form.
    ///
    /// Runs the fee/size iteration: compute the surplus of inputs over
    /// outputs at the current fee, rebuild change, serialize the candidate,
    /// re-derive the fee from its size and execution units, and repeat until
    /// the fee reproduces itself. Script execution units are obtained from
    /// the configured evaluator, invoked only when the transaction's
    /// non-fee structure changes.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::MissingChangeAddress`] / [`ValidationError::MissingEvaluator`]
    ///   when required collaborators were never provided.
    /// - [`BalancingError::InsufficientFunds`] when inputs cannot cover
    ///   outputs plus fee.
    /// - [`BalancingError::ValueSizeExceeded`], [`BalancingError::TransactionTooLarge`],
    ///   [`BalancingError::MissingCollateral`], [`BalancingError::FeeDidNotConverge`]
    ///   per the corresponding limit.
    pub async fn complete(mut self) -> Result<Transaction, TxBuilderError> {
        let change_address = self
            .change_address
            .clone()
            .ok_or(ValidationError::MissingChangeAddress)?;
        if !self.redeemers.is_empty() && self.evaluator.is_none() {
            return Err(ValidationError::MissingEvaluator.into());
        }

        let withdrawn: u64 = self.withdrawals.values().sum();
        let total_input = self
            .inputs
            .iter()
            .fold(Value::zero(), |acc, u| acc.merge(&u.output.value))
            .merge(&self.mint.credit())
            .merge(&Value::from_coin(withdrawn));
        let total_output = self
            .outputs
            .iter()
            .fold(Value::zero(), |acc, o| acc.merge(&o.value))
            .merge(&self.mint.debit());

        let ref_script_fee =
            fees::reference_script_fee(&self.params, self.referenced_script_size()?);

        let mut fee = 0u64;
        let mut evaluated_for: Option<TransactionId> = None;
        let mut settled: Option<Transaction> = None;

        for pass in 1..=MAX_BALANCE_PASSES {
            let surplus = total_input
                .checked_sub(&total_output)
                .and_then(|v| v.checked_sub(&Value::from_coin(fee)))
                .ok_or(BalancingError::InsufficientFunds)?;
            let change = split_change(&surplus, &change_address, &self.params)?;
            let collateral = self.collateral_plan(fee, &change_address);

            let witness = self.assemble_witness_set();
            if !witness.redeemers.is_empty() {
                let body = self.assemble_body(&witness, &change, fee, &collateral);
                let key = structural_key(&body, change.len());
                if evaluated_for != Some(key) {
                    let candidate = Transaction {
                        body,
                        witness_set: witness,
                        is_valid: true,
                        auxiliary_data: self.auxiliary_data.clone(),
                    }
                    .to_cbor();
                    let resolved = self.resolved_utxos();
                    let measured = {
                        let evaluator = self
                            .evaluator
                            .as_ref()
                            .ok_or(ValidationError::MissingEvaluator)?;
                        evaluator.evaluate(&candidate, &resolved, &self.params).await?
                    };
                    let witness = self.assemble_witness_set();
                    self.apply_ex_units(&witness, &measured);
                    evaluated_for = Some(key);
                }
            }

            let witness = self.assemble_witness_set();
            let body = self.assemble_body(&witness, &change, fee, &collateral);
            let tx = Transaction {
                body,
                witness_set: witness,
                is_valid: true,
                auxiliary_data: self.auxiliary_data.clone(),
            };
            let size = tx.cbor_len();
            let execution_fee = fees::execution_fee(
                &self.params.execution_prices,
                tx.witness_set.redeemers.iter().map(|r| &r.ex_units),
            );
            let next_fee = fees::linear_fee(&self.params, size) + ref_script_fee + execution_fee;
            debug!(pass, size, fee = next_fee, "balancing pass");
            if next_fee == fee {
                settled = Some(tx);
                break;
            }
            fee = next_fee;
        }

        let tx = settled.ok_or(BalancingError::FeeDidNotConverge(MAX_BALANCE_PASSES))?;
        self.validate(&tx)?;
        Ok(tx)
    }

    /// Collateral body fields for the current fee: the requirement is
    /// `ceil(fee * collateral_percentage / 100)`, the rest of the provided
    /// coin comes back via a return output to the change address.
    fn collateral_plan(&self, fee: u64, change_address: &Address) -> CollateralPlan {
        if self.redeemers.is_empty() || self.collateral.is_empty() {
            return CollateralPlan::default();
        }
        let mut inputs: Vec<_> = self.collateral.iter().map(|u| u.input).collect();
        inputs.sort();
        let required = (fee * self.params.collateral_percentage).div_ceil(100);
        let provided: u64 = self.collateral.iter().map(|u| u.output.value.coin()).sum();
        let return_output = provided
            .checked_sub(required)
            .filter(|rest| *rest > 0)
            .map(|rest| {
                TransactionOutput::new(change_address.clone(), Value::from_coin(rest))
            });
        CollateralPlan {
            inputs,
            total: Some(required),
            return_output,
        }
    }

    fn validate(&self, tx: &Transaction) -> Result<(), BalancingError> {
        let size = tx.cbor_len();
        if size > self.params.max_tx_size as usize {
            return Err(BalancingError::TransactionTooLarge {
                size,
                max: self.params.max_tx_size,
            });
        }
        let outputs = tx
            .body
            .outputs
            .iter()
            .chain(tx.body.collateral_return.as_ref());
        for output in outputs {
            if output.value.cbor_len() > self.params.max_value_size as usize {
                return Err(BalancingError::ValueSizeExceeded);
            }
        }
        if !tx.witness_set.redeemers.is_empty() {
            if tx.body.collateral.is_empty()
                || tx.body.collateral.len() > self.params.max_collateral_inputs as usize
            {
                return Err(BalancingError::MissingCollateral);
            }
            if self.collateral.iter().any(|u| u.output.value.has_assets()) {
                return Err(BalancingError::MissingCollateral);
            }
            let provided: u64 = self.collateral.iter().map(|u| u.output.value.coin()).sum();
            if provided < tx.body.total_collateral.unwrap_or(0) {
                return Err(BalancingError::MissingCollateral);
            }
        }
        Ok(())
    }
}

/// Splits a surplus into change outputs, greedily packing asset entries
/// until the padded value-size guard trips, then sealing the partial output
/// with its minimum coin. The last output carries the remaining coin, so the
/// split always sums back to the surplus exactly.
pub(crate) fn split_change(
    surplus: &Value,
    address: &Address,
    params: &ProtocolParameters,
) -> Result<Vec<TransactionOutput>, BalancingError> {
    if surplus.is_zero() {
        return Ok(Vec::new());
    }
    if fees::value_fits(surplus, params, fees::CHANGE_VALUE_PADDING) {
        return Ok(vec![TransactionOutput::new(
            address.clone(),
            surplus.clone(),
        )]);
    }
    let mut outputs = Vec::new();
    let mut bag: BTreeMap<PolicyId, BTreeMap<AssetName, u64>> = BTreeMap::new();
    let mut coin_used = 0u64;
    for (policy, name, quantity) in surplus.asset_entries() {
        let mut grown = bag.clone();
        grown.entry(*policy).or_default().insert(name.clone(), quantity);
        // Probe with the full surplus coin: an upper bound on the coin any
        // split output can carry, so a passing probe cannot regress once the
        // real coin is filled in.
        if fees::value_fits(
            &Value::new(surplus.coin(), grown.clone()),
            params,
            fees::CHANGE_VALUE_PADDING,
        ) {
            bag = grown;
            continue;
        }
        if bag.is_empty() {
            return Err(BalancingError::ValueSizeExceeded);
        }
        let sealed = minimum_coin_output(address, std::mem::take(&mut bag), params);
        coin_used += sealed.value.coin();
        outputs.push(sealed);
        bag.entry(*policy).or_default().insert(name.clone(), quantity);
        if !fees::value_fits(
            &Value::new(surplus.coin(), bag.clone()),
            params,
            fees::CHANGE_VALUE_PADDING,
        ) {
            // A single entry that does not fit on its own can never fit.
            return Err(BalancingError::ValueSizeExceeded);
        }
    }
    let remainder = surplus
        .coin()
        .checked_sub(coin_used)
        .ok_or(BalancingError::InsufficientFunds)?;
    outputs.push(TransactionOutput::new(
        address.clone(),
        Value::new(remainder, bag),
    ));
    trace!(outputs = outputs.len(), "split change");
    Ok(outputs)
}

/// An output carrying `assets` with the smallest self-consistent coin:
/// `coins_per_utxo_byte * serialized_size`, iterated because the coin's own
/// width is part of the size.
fn minimum_coin_output(
    address: &Address,
    assets: BTreeMap<PolicyId, BTreeMap<AssetName, u64>>,
    params: &ProtocolParameters,
) -> TransactionOutput {
    let mut coin = 0u64;
    loop {
        let candidate =
            TransactionOutput::new(address.clone(), Value::new(coin, assets.clone()));
        let next = params.coins_per_utxo_byte * candidate.cbor_len() as u64;
        if next <= coin {
            return candidate;
        }
        coin = next;
    }
}

/// Cache key for evaluator invocations: the body with every fee-derived
/// field neutralized (fee, script-data hash, collateral totals, change
/// coins), so only structural edits re-trigger evaluation.
fn structural_key(body: &TransactionBody, change_count: usize) -> TransactionId {
    let mut body = body.clone();
    body.fee = 0;
    body.script_data_hash = None;
    body.total_collateral = None;
    body.collateral_return = None;
    let keep = body.outputs.len() - change_count;
    for output in body.outputs.iter_mut().skip(keep) {
        output.value = output.value.with_coin(0);
    }
    body.id()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> Address {
        Address::new("addr", vec![0x01; 57]).unwrap()
    }

    fn policy(byte: u8) -> PolicyId {
        PolicyId::new([byte; 28])
    }

    fn name(i: u16) -> AssetName {
        AssetName::new(i.to_be_bytes().to_vec()).unwrap()
    }

    mod split_change {
        use super::*;

        #[test]
        fn zero_surplus_yields_no_change() {
            let out = split_change(&Value::zero(), &addr(), &ProtocolParameters::mainnet());
            assert_eq!(out.unwrap(), Vec::new());
        }

        #[test]
        fn small_surplus_is_one_output() {
            let surplus = Value::from_coin(1_000_000).with_asset(policy(1), name(0), 5);
            let outputs =
                split_change(&surplus, &addr(), &ProtocolParameters::mainnet()).unwrap();
            assert_eq!(outputs.len(), 1);
            assert_eq!(outputs[0].value, surplus);
        }

        #[test]
        fn split_outputs_sum_back_to_the_surplus() {
            let mut surplus = Value::from_coin(500_000_000_000);
            for i in 0..1200u16 {
                surplus = surplus.with_asset(policy((i % 7) as u8), name(i), u64::from(i) + 1);
            }
            let outputs =
                split_change(&surplus, &addr(), &ProtocolParameters::mainnet()).unwrap();
            assert!(outputs.len() > 1, "1200 assets cannot fit one value");
            let total = outputs
                .iter()
                .fold(Value::zero(), |acc, o| acc.merge(&o.value));
            assert_eq!(total, surplus);
        }

        #[test]
        fn sealed_outputs_get_a_size_priced_coin() {
            let mut surplus = Value::from_coin(500_000_000_000);
            for i in 0..1200u16 {
                surplus = surplus.with_asset(policy((i % 7) as u8), name(i), 1);
            }
            let params = ProtocolParameters::mainnet();
            let outputs = split_change(&surplus, &addr(), &params).unwrap();
            for sealed in &outputs[..outputs.len() - 1] {
                assert_eq!(
                    sealed.value.coin(),
                    params.coins_per_utxo_byte * sealed.cbor_len() as u64
                );
            }
        }

        #[test]
        fn every_split_value_respects_the_guard() {
            let mut surplus = Value::from_coin(500_000_000_000);
            for i in 0..1200u16 {
                surplus = surplus.with_asset(policy((i % 7) as u8), name(i), 1);
            }
            let params = ProtocolParameters::mainnet();
            for output in split_change(&surplus, &addr(), &params).unwrap() {
                assert!(output.value.cbor_len() <= params.max_value_size as usize);
            }
        }
    }

    mod minimum_coin_output {
        use super::*;

        #[test]
        fn coin_is_consistent_with_its_own_width() {
            let mut assets: BTreeMap<PolicyId, BTreeMap<AssetName, u64>> = BTreeMap::new();
            assets.entry(policy(1)).or_default().insert(name(1), 10);
            let params = ProtocolParameters::mainnet();
            let out = minimum_coin_output(&addr(), assets, &params);
            assert_eq!(
                out.value.coin(),
                params.coins_per_utxo_byte * out.cbor_len() as u64
            );
        }
    }

    mod structural_key {
        use super::*;
        use tessera_primitives::TransactionInput;

        fn body() -> TransactionBody {
            TransactionBody {
                inputs: vec![TransactionInput::new(TransactionId::new([1; 32]), 0)],
                outputs: vec![
                    TransactionOutput::new(addr(), Value::from_coin(10)),
                    TransactionOutput::new(addr(), Value::from_coin(90)),
                ],
                fee: 170_000,
                ..Default::default()
            }
        }

        #[test]
        fn fee_and_change_coin_do_not_disturb_the_key() {
            let a = body();
            let mut b = body();
            b.fee = 180_000;
            b.outputs[1].value = Value::from_coin(80);
            assert_eq!(structural_key(&a, 1), structural_key(&b, 1));
        }

        #[test]
        fn payment_outputs_do_disturb_the_key() {
            let a = body();
            let mut b = body();
            b.outputs[0].value = Value::from_coin(11);
            assert_ne!(structural_key(&a, 1), structural_key(&b, 1));
        }

        #[test]
        fn new_inputs_disturb_the_key() {
            let a = body();
            let mut b = body();
            b.inputs.push(TransactionInput::new(TransactionId::new([2; 32]), 1));
            assert_ne!(structural_key(&a, 1), structural_key(&b, 1));
        }
    }
}
