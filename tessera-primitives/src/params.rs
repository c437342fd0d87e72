//! Protocol parameters consumed by fee estimation and balancing.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An exact non-negative rational. Execution-unit prices are rationals on
/// chain; keeping them exact makes the script fee integer math.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RationalNumber {
    pub numerator: u64,
    pub denominator: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExUnitPrices {
    pub memory: RationalNumber,
    pub steps: RationalNumber,
}

/// Tiered pricing for scripts attached by reference: the first `range` bytes
/// cost `base` per byte, each subsequent tier multiplies the per-byte price
/// by `multiplier`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReferenceScriptFeeSchedule {
    pub base: f64,
    pub multiplier: f64,
    pub range: u64,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProtocolParameters {
    /// Per-byte component of the linear fee.
    pub min_fee_coefficient: u64,
    /// Constant component of the linear fee.
    pub min_fee_constant: u64,
    /// Maximum serialized size of a single output's value.
    pub max_value_size: u32,
    /// Maximum serialized size of a whole transaction.
    pub max_tx_size: u32,
    /// Minimum-coin rate per serialized output byte.
    pub coins_per_utxo_byte: u64,
    /// Collateral requirement as a percentage of the fee.
    pub collateral_percentage: u64,
    pub max_collateral_inputs: u32,
    pub min_fee_reference_scripts: ReferenceScriptFeeSchedule,
    pub execution_prices: ExUnitPrices,
    /// Cost models per Plutus language version, folded into the script-data
    /// hash as language views.
    pub cost_models: BTreeMap<u8, Vec<i64>>,
}

impl ProtocolParameters {
    /// Current mainnet values.
    pub fn mainnet() -> Self {
        Self {
            min_fee_coefficient: 44,
            min_fee_constant: 155_381,
            max_value_size: 5_000,
            max_tx_size: 16_384,
            coins_per_utxo_byte: 4_310,
            collateral_percentage: 150,
            max_collateral_inputs: 3,
            min_fee_reference_scripts: ReferenceScriptFeeSchedule {
                base: 15.0,
                multiplier: 1.2,
                range: 25_600,
            },
            execution_prices: ExUnitPrices {
                memory: RationalNumber {
                    numerator: 577,
                    denominator: 10_000,
                },
                steps: RationalNumber {
                    numerator: 721,
                    denominator: 10_000_000,
                },
            },
            cost_models: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mainnet_defaults() {
        let p = ProtocolParameters::mainnet();
        assert_eq!(p.min_fee_constant, 155_381);
        assert_eq!(p.min_fee_coefficient, 44);
        assert_eq!(p.execution_prices.memory.denominator, 10_000);
        assert_eq!(p.min_fee_reference_scripts.range, 25_600);
    }
}
