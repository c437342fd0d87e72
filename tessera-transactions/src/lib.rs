//! A transaction builder for extended-UTXO ledgers: describe intent
//! (inputs, payments, mints, metadata, scripts), then let [`TxBuilder::complete`]
//! balance the transaction — computing change, the fee fixed point, script
//! execution budgets and collateral — and render it to canonical CBOR.
//!
//! ```no_run
//! # async fn demo() -> Result<(), tessera_transactions::TxBuilderError> {
//! use tessera_primitives::{Address, ProtocolParameters};
//! use tessera_transactions::TxBuilder;
//!
//! # let (utxo, recipient, me): (tessera_primitives::UnspentOutput, Address, Address) = todo!();
//! let tx = TxBuilder::new(ProtocolParameters::mainnet())
//!     .add_input(utxo)?
//!     .pay_coin(recipient, 5_000_000)
//!     .set_change_address(me)
//!     .complete()
//!     .await?;
//! # Ok(()) }
//! ```
//!
//! The builder is one-shot: it is consumed by `complete()`. Signing and
//! submission happen elsewhere; the output of this crate is an unsigned,
//! balanced, canonically-encoded transaction.

mod assemble;
mod balance;
pub mod error;
pub mod eval;
pub mod fees;

pub use error::{BalancingError, ScriptEvaluationError, TxBuilderError, ValidationError};
pub use eval::{FixedEvaluator, ScriptEvaluator};

use std::collections::BTreeMap;
use std::fmt;

use tessera_primitives::{
    AddrKeyhash, Address, AssetName, AuxiliaryData, Certificate, Datum, ExUnits, Mint, NetworkId,
    PlutusData, PolicyId, ProtocolParameters, TransactionOutput, UnspentOutput, Value,
};

pub(crate) enum RedeemerPurpose {
    Spend(tessera_primitives::TransactionInput),
    Mint(PolicyId),
}

pub(crate) struct PendingRedeemer {
    pub(crate) purpose: RedeemerPurpose,
    pub(crate) data: PlutusData,
    pub(crate) ex_units: ExUnits,
}

/// Accumulates a transaction description and balances it on `complete()`.
///
/// Mutators are chainable and order-insensitive; the rendered transaction is
/// canonical regardless of the order in which inputs, outputs or mints were
/// added. Methods that register an input return `Result` and reject
/// duplicates immediately.
pub struct TxBuilder {
    pub(crate) params: ProtocolParameters,
    pub(crate) inputs: Vec<UnspentOutput>,
    pub(crate) reference_inputs: Vec<UnspentOutput>,
    pub(crate) collateral: Vec<UnspentOutput>,
    pub(crate) outputs: Vec<TransactionOutput>,
    pub(crate) mint: Mint,
    pub(crate) certificates: Vec<Certificate>,
    pub(crate) withdrawals: BTreeMap<Address, u64>,
    pub(crate) required_signers: Vec<AddrKeyhash>,
    pub(crate) redeemers: Vec<PendingRedeemer>,
    pub(crate) datums: Vec<PlutusData>,
    pub(crate) auxiliary_data: Option<AuxiliaryData>,
    pub(crate) change_address: Option<Address>,
    pub(crate) ttl: Option<u64>,
    pub(crate) validity_start: Option<u64>,
    pub(crate) network_id: Option<NetworkId>,
    pub(crate) evaluator: Option<Box<dyn ScriptEvaluator>>,
}

impl TxBuilder {
    pub fn new(params: ProtocolParameters) -> Self {
        Self {
            params,
            inputs: Vec::new(),
            reference_inputs: Vec::new(),
            collateral: Vec::new(),
            outputs: Vec::new(),
            mint: Mint::default(),
            certificates: Vec::new(),
            withdrawals: BTreeMap::new(),
            required_signers: Vec::new(),
            redeemers: Vec::new(),
            datums: Vec::new(),
            auxiliary_data: None,
            change_address: None,
            ttl: None,
            validity_start: None,
            network_id: None,
            evaluator: None,
        }
    }

    /// Spends a UTXO held by a key. Fails on a duplicate outpoint.
    pub fn add_input(mut self, utxo: UnspentOutput) -> Result<Self, ValidationError> {
        self.check_new_input(&utxo)?;
        self.inputs.push(utxo);
        Ok(self)
    }

    /// Spends a script-locked UTXO: registers the spend redeemer and,
    /// when the output commits to a datum by hash, the datum preimage the
    /// validator will be given.
    pub fn add_script_input(
        mut self,
        utxo: UnspentOutput,
        redeemer: PlutusData,
        datum: Option<PlutusData>,
    ) -> Result<Self, ValidationError> {
        self.check_new_input(&utxo)?;
        self.redeemers.push(PendingRedeemer {
            purpose: RedeemerPurpose::Spend(utxo.input),
            data: redeemer,
            ex_units: ExUnits::default(),
        });
        if let Some(datum) = datum {
            self.datums.push(datum);
        }
        self.inputs.push(utxo);
        Ok(self)
    }

    /// References a UTXO without spending it. A reference script attached to
    /// it becomes available to validators and is charged the tiered
    /// reference-script fee.
    pub fn add_reference_input(mut self, utxo: UnspentOutput) -> Self {
        if !self.reference_inputs.iter().any(|u| u.input == utxo.input) {
            self.reference_inputs.push(utxo);
        }
        self
    }

    /// Reserves a UTXO as collateral for script execution. Collateral must
    /// be pure coin; this is checked when the transaction completes.
    pub fn provide_collateral(mut self, utxo: UnspentOutput) -> Self {
        self.collateral.push(utxo);
        self
    }

    /// Pays plain coin to an address.
    pub fn pay_coin(self, address: Address, coin: u64) -> Self {
        self.add_output(TransactionOutput::new(address, Value::from_coin(coin)))
    }

    /// Pays an arbitrary value (coin and/or assets) to an address.
    pub fn pay_assets(self, address: Address, value: Value) -> Self {
        self.add_output(TransactionOutput::new(address, value))
    }

    /// Locks a value at an address (typically a script address) under a
    /// datum.
    pub fn lock_assets(self, address: Address, value: Value, datum: Datum) -> Self {
        self.add_output(TransactionOutput::new(address, value).with_datum(datum))
    }

    /// Adds a fully-formed output.
    pub fn add_output(mut self, output: TransactionOutput) -> Self {
        self.outputs.push(output);
        self
    }

    /// Mints (positive) or burns (negative) assets under one policy. The
    /// redeemer is required when the policy is a Plutus script.
    pub fn add_mint(
        mut self,
        policy: PolicyId,
        assets: BTreeMap<AssetName, i64>,
        redeemer: Option<PlutusData>,
    ) -> Self {
        for (name, quantity) in assets {
            self.mint.insert(policy, name, quantity);
        }
        if let Some(data) = redeemer {
            self.redeemers.push(PendingRedeemer {
                purpose: RedeemerPurpose::Mint(policy),
                data,
                ex_units: ExUnits::default(),
            });
        }
        self
    }

    pub fn add_certificate(mut self, certificate: Certificate) -> Self {
        self.certificates.push(certificate);
        self
    }

    /// Withdraws staking rewards; the coin is credited to the transaction's
    /// inputs during balancing.
    pub fn add_withdrawal(mut self, account: Address, coin: u64) -> Self {
        self.withdrawals.insert(account, coin);
        self
    }

    pub fn add_required_signer(mut self, signer: AddrKeyhash) -> Self {
        self.required_signers.push(signer);
        self
    }

    pub fn set_ttl(mut self, slot: u64) -> Self {
        self.ttl = Some(slot);
        self
    }

    pub fn set_validity_start(mut self, slot: u64) -> Self {
        self.validity_start = Some(slot);
        self
    }

    pub fn set_network_id(mut self, id: NetworkId) -> Self {
        self.network_id = Some(id);
        self
    }

    /// Where the balancing surplus goes. Required before `complete()`.
    pub fn set_change_address(mut self, address: Address) -> Self {
        self.change_address = Some(address);
        self
    }

    pub fn set_auxiliary_data(mut self, aux: AuxiliaryData) -> Self {
        self.auxiliary_data = Some(aux);
        self
    }

    /// Installs the evaluator that measures script execution units.
    /// Required whenever the transaction carries redeemers.
    pub fn use_evaluator(mut self, evaluator: Box<dyn ScriptEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    fn check_new_input(&self, utxo: &UnspentOutput) -> Result<(), ValidationError> {
        if self.inputs.iter().any(|u| u.input == utxo.input) {
            return Err(ValidationError::DuplicateInput(utxo.input));
        }
        Ok(())
    }
}

impl fmt::Debug for TxBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxBuilder")
            .field("inputs", &self.inputs.len())
            .field("reference_inputs", &self.reference_inputs.len())
            .field("outputs", &self.outputs.len())
            .field("redeemers", &self.redeemers.len())
            .field("change_address", &self.change_address)
            .field("evaluator", &self.evaluator.is_some())
            .finish_non_exhaustive()
    }
}
