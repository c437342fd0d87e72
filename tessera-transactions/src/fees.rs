//! Fee model: linear size fee, tiered reference-script fee, execution-unit
//! pricing, and the serialized-value size guard.

use tessera_primitives::{
    CanonicalCbor, ExUnitPrices, ExUnits, ProtocolParameters, Value,
};

/// Headroom factor applied when sizing change values, so a value that passes
/// the guard still fits after its coin settles at full width.
pub const CHANGE_VALUE_PADDING: f64 = 0.95;

/// The linear fee: `constant + coefficient * serialized_size`.
pub fn linear_fee(params: &ProtocolParameters, tx_size: usize) -> u64 {
    params.min_fee_constant + params.min_fee_coefficient * tx_size as u64
}

/// Tiered fee for scripts attached by reference.
///
/// Each `range`-byte tier is charged at the current per-byte price, starting
/// at `base` and multiplying by `multiplier` per tier; the total is rounded
/// up once at the end.
pub fn reference_script_fee(params: &ProtocolParameters, total_script_size: usize) -> u64 {
    let schedule = &params.min_fee_reference_scripts;
    let range = schedule.range as f64;
    let mut price = schedule.base;
    let mut remaining = total_script_size as f64;
    let mut fee = 0.0;
    while remaining > 0.0 {
        fee += remaining.min(range) * price;
        remaining -= range;
        price *= schedule.multiplier;
    }
    fee.ceil() as u64
}

/// Price of the summed execution units, rounded up once over the combined
/// rational so the result is exact.
pub fn execution_fee<'a>(
    prices: &ExUnitPrices,
    units: impl IntoIterator<Item = &'a ExUnits>,
) -> u64 {
    let (mut mem, mut steps) = (0u128, 0u128);
    for u in units {
        mem += u.mem as u128;
        steps += u.steps as u128;
    }
    if mem == 0 && steps == 0 {
        return 0;
    }
    let mem_den = prices.memory.denominator as u128;
    let step_den = prices.steps.denominator as u128;
    let common = mem_den * step_den;
    let numerator =
        mem * prices.memory.numerator as u128 * step_den + steps * prices.steps.numerator as u128 * mem_den;
    ((numerator + common - 1) / common) as u64
}

/// Whether a value's encoding fits within the protocol's per-output value
/// size, scaled down by `padding`.
pub fn value_fits(value: &Value, params: &ProtocolParameters, padding: f64) -> bool {
    value.cbor_len() as f64 <= params.max_value_size as f64 * padding
}
