//! Pluggable script evaluation.
//!
//! The builder never executes Plutus scripts itself. It hands a serialized
//! candidate transaction (plus the outputs its inputs resolve to) to a
//! [`ScriptEvaluator`] and applies the execution units that come back.

use std::collections::BTreeMap;

use async_trait::async_trait;

use tessera_primitives::{ExUnits, ProtocolParameters, UnspentOutput};

use crate::error::ScriptEvaluationError;

/// Measures execution units for every redeemer of a candidate transaction.
///
/// `candidate` is the full canonical encoding of the in-progress transaction;
/// its redeemers carry placeholder (possibly zero) units. The result maps a
/// redeemer's position in the witness-set redeemer list to its measured
/// units; positions left out keep their current units.
#[async_trait]
pub trait ScriptEvaluator: Send + Sync {
    async fn evaluate(
        &self,
        candidate: &[u8],
        resolved: &[UnspentOutput],
        params: &ProtocolParameters,
    ) -> Result<BTreeMap<u64, ExUnits>, ScriptEvaluationError>;
}

/// Evaluator that answers the first redeemer with one fixed budget. Useful
/// in tests and for single-script transactions whose worst-case units are
/// known up front.
#[derive(Debug, Clone, Copy)]
pub struct FixedEvaluator {
    pub units: ExUnits,
}

#[async_trait]
impl ScriptEvaluator for FixedEvaluator {
    async fn evaluate(
        &self,
        _candidate: &[u8],
        _resolved: &[UnspentOutput],
        _params: &ProtocolParameters,
    ) -> Result<BTreeMap<u64, ExUnits>, ScriptEvaluationError> {
        Ok(BTreeMap::from([(0, self.units)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_evaluator_answers_index_zero() {
        let eval = FixedEvaluator {
            units: ExUnits::new(10, 20),
        };
        let out = eval
            .evaluate(&[], &[], &ProtocolParameters::mainnet())
            .await
            .unwrap();
        assert_eq!(out.get(&0), Some(&ExUnits::new(10, 20)));
    }
}
