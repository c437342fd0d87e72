//! Rendering builder state into canonical transaction records: input-set
//! ordering, redeemer pointer resolution, the script-data hash, and the
//! reference-script size scan.

use std::collections::BTreeMap;

use minicbor::Encoder;

use tessera_primitives::codec::{script_payload_len, Enc, EncodeError, ScriptSizeError};
use tessera_primitives::{
    blake2b_256, AuxiliaryData, CanonicalCbor, ExUnits, Hash, PolicyId, Redeemer, RedeemerTag,
    TransactionBody, TransactionInput, TransactionOutput, UnspentOutput, WitnessSet,
};

use crate::{RedeemerPurpose, TxBuilder};

/// Collateral fields of a candidate body, derived from the current fee.
#[derive(Debug, Default)]
pub(crate) struct CollateralPlan {
    pub(crate) inputs: Vec<TransactionInput>,
    pub(crate) total: Option<u64>,
    pub(crate) return_output: Option<TransactionOutput>,
}

impl TxBuilder {
    pub(crate) fn sorted_inputs(&self) -> Vec<TransactionInput> {
        let mut inputs: Vec<_> = self.inputs.iter().map(|u| u.input).collect();
        inputs.sort();
        inputs
    }

    /// Redeemer pointer for each pending redeemer: spend redeemers point at
    /// the input's position in the sorted input set, mint redeemers at the
    /// policy's position in the sorted mint. A redeemer whose target is gone
    /// (a mint that netted out to zero) resolves to `None` and is dropped.
    pub(crate) fn resolved_redeemer_keys(&self) -> Vec<Option<(RedeemerTag, u64)>> {
        let inputs = self.sorted_inputs();
        let policies: Vec<PolicyId> = self.mint.assets().keys().copied().collect();
        self.redeemers
            .iter()
            .map(|pending| match &pending.purpose {
                RedeemerPurpose::Spend(input) => inputs
                    .iter()
                    .position(|i| i == input)
                    .map(|pos| (RedeemerTag::Spend, pos as u64)),
                RedeemerPurpose::Mint(policy) => policies
                    .iter()
                    .position(|p| p == policy)
                    .map(|pos| (RedeemerTag::Mint, pos as u64)),
            })
            .collect()
    }

    pub(crate) fn assemble_witness_set(&self) -> WitnessSet {
        let keys = self.resolved_redeemer_keys();
        let mut redeemers: Vec<Redeemer> = self
            .redeemers
            .iter()
            .zip(&keys)
            .filter_map(|(pending, key)| {
                key.map(|(tag, index)| Redeemer {
                    tag,
                    index,
                    data: pending.data.clone(),
                    ex_units: pending.ex_units,
                })
            })
            .collect();
        redeemers.sort_by_key(|r| (r.tag, r.index));
        WitnessSet {
            plutus_data: self.datums.clone(),
            redeemers,
        }
    }

    /// Writes measured execution units back onto the pending redeemers.
    /// `measured` is keyed by position in `witness`'s redeemer list.
    pub(crate) fn apply_ex_units(
        &mut self,
        witness: &WitnessSet,
        measured: &BTreeMap<u64, ExUnits>,
    ) {
        let keys = self.resolved_redeemer_keys();
        for (pos, units) in measured {
            let Some(target) = witness.redeemers.get(*pos as usize) else {
                continue;
            };
            for (pending, key) in self.redeemers.iter_mut().zip(&keys) {
                if *key == Some((target.tag, target.index)) {
                    pending.ex_units = *units;
                }
            }
        }
    }

    /// The script-data hash commits the body to the witness data the scripts
    /// will see. Datums without redeemers hash between empty-map sentinels;
    /// otherwise the preimage is redeemers, datums (when present), then the
    /// cost-model language views.
    pub(crate) fn script_data_hash(&self, witness: &WitnessSet) -> Option<Hash<32>> {
        if witness.redeemers.is_empty() && witness.plutus_data.is_empty() {
            return None;
        }
        let mut preimage = Vec::new();
        match witness.plutus_data_cbor() {
            Some(datums) if witness.redeemers.is_empty() => {
                preimage.push(0xa0);
                preimage.extend(datums);
                preimage.push(0xa0);
            }
            datums => {
                preimage.extend(witness.redeemers_cbor());
                if let Some(datums) = datums {
                    preimage.extend(datums);
                }
                preimage.extend(self.language_views());
            }
        }
        Some(blake2b_256(&preimage))
    }

    fn language_views(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut e = Encoder::new(&mut buf);
        encode_language_views(&self.params.cost_models, &mut e)
            .unwrap_or_else(|_| unreachable!("vec writes are infallible"));
        buf
    }

    pub(crate) fn assemble_body(
        &self,
        witness: &WitnessSet,
        change: &[TransactionOutput],
        fee: u64,
        collateral: &CollateralPlan,
    ) -> TransactionBody {
        let mut outputs = self.outputs.clone();
        outputs.extend_from_slice(change);
        let mut reference_inputs: Vec<_> =
            self.reference_inputs.iter().map(|u| u.input).collect();
        reference_inputs.sort();
        TransactionBody {
            inputs: self.sorted_inputs(),
            outputs,
            fee,
            ttl: self.ttl,
            certificates: self.certificates.clone(),
            withdrawals: self.withdrawals.clone(),
            auxiliary_data_hash: self.auxiliary_data.as_ref().map(AuxiliaryData::hash),
            validity_start: self.validity_start,
            mint: self.mint.clone(),
            script_data_hash: self.script_data_hash(witness),
            collateral: collateral.inputs.clone(),
            required_signers: self.required_signers.clone(),
            network_id: self.network_id,
            collateral_return: collateral.return_output.clone(),
            total_collateral: collateral.total,
            reference_inputs,
        }
    }

    /// Everything the evaluator may need to resolve: spent, referenced, and
    /// collateral outputs.
    pub(crate) fn resolved_utxos(&self) -> Vec<UnspentOutput> {
        self.inputs
            .iter()
            .chain(&self.reference_inputs)
            .chain(&self.collateral)
            .cloned()
            .collect()
    }

    /// Total payload bytes of scripts attached by reference, via the codec
    /// probe; the scripts themselves stay opaque.
    pub(crate) fn referenced_script_size(&self) -> Result<usize, ScriptSizeError> {
        let mut total = 0;
        for utxo in self.inputs.iter().chain(&self.reference_inputs) {
            if let Some(script) = &utxo.output.script_ref {
                total += script_payload_len(&script.to_cbor())?;
            }
        }
        Ok(total)
    }
}

fn encode_language_views(
    models: &BTreeMap<u8, Vec<i64>>,
    e: &mut Enc<'_>,
) -> Result<(), EncodeError> {
    e.map(models.len() as u64)?;
    for (language, costs) in models {
        e.u8(*language)?;
        e.array(costs.len() as u64)?;
        for cost in costs {
            e.i64(*cost)?;
        }
    }
    Ok(())
}
