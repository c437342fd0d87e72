//! The multiasset value algebra.
//!
//! A [`Value`] is coin plus a two-level bag of native assets. Values are kept
//! in canonical form at all times: no zero quantities, no empty policy maps.
//! That makes structural equality coincide with semantic equality and makes
//! the canonical CBOR encoding a direct walk of the maps.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::codec::{CanonicalCbor, Enc, EncodeError};
use crate::hash::PolicyId;

/// An asset name within a policy, at most 32 bytes.
///
/// Ordered by length then bytes. For definite-length byte strings of this
/// size that is exactly the order of the canonical CBOR encodings (a longer
/// string gets a larger head), so sorted map iteration emits keys in wire
/// order.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AssetName(Vec<u8>);

pub const MAX_ASSET_NAME_LEN: usize = 32;

#[derive(Debug, Error, PartialEq)]
pub enum AssetNameError {
    #[error("asset name is {0} bytes, maximum is 32")]
    TooLong(usize),
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

impl AssetName {
    pub fn new(bytes: Vec<u8>) -> Result<Self, AssetNameError> {
        if bytes.len() > MAX_ASSET_NAME_LEN {
            return Err(AssetNameError::TooLong(bytes.len()));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Ord for AssetName {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for AssetName {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for AssetName {
    type Err = AssetNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(hex::decode(s)?)
    }
}

impl fmt::Display for AssetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl fmt::Debug for AssetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetName({})", hex::encode(&self.0))
    }
}

impl CanonicalCbor for AssetName {
    fn encode_cbor(&self, e: &mut Enc<'_>) -> Result<(), EncodeError> {
        e.bytes(&self.0)?;
        Ok(())
    }
}

/// Coin plus native assets, always in canonical form.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Value {
    coin: u64,
    assets: BTreeMap<PolicyId, BTreeMap<AssetName, u64>>,
}

impl Value {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn from_coin(coin: u64) -> Self {
        Self {
            coin,
            assets: BTreeMap::new(),
        }
    }

    /// Builder-style asset insertion; accumulates with any existing quantity
    /// and drops the entry again if the result is zero.
    pub fn with_asset(mut self, policy: PolicyId, name: AssetName, quantity: u64) -> Self {
        self.add_asset(policy, name, quantity);
        self
    }

    pub fn with_coin(&self, coin: u64) -> Self {
        Self {
            coin,
            assets: self.assets.clone(),
        }
    }

    /// Builds a value from raw parts, restoring canonical form (zero
    /// quantities and empty policies dropped).
    pub fn new(coin: u64, assets: BTreeMap<PolicyId, BTreeMap<AssetName, u64>>) -> Self {
        let mut v = Self { coin, assets };
        v.normalize();
        v
    }

    fn normalize(&mut self) {
        for bag in self.assets.values_mut() {
            bag.retain(|_, q| *q != 0);
        }
        self.assets.retain(|_, bag| !bag.is_empty());
    }

    fn add_asset(&mut self, policy: PolicyId, name: AssetName, quantity: u64) {
        if quantity == 0 {
            return;
        }
        *self
            .assets
            .entry(policy)
            .or_default()
            .entry(name)
            .or_insert(0) += quantity;
    }

    pub fn coin(&self) -> u64 {
        self.coin
    }

    pub fn assets(&self) -> &BTreeMap<PolicyId, BTreeMap<AssetName, u64>> {
        &self.assets
    }

    pub fn quantity_of(&self, policy: &PolicyId, name: &AssetName) -> u64 {
        self.assets
            .get(policy)
            .and_then(|bag| bag.get(name))
            .copied()
            .unwrap_or(0)
    }

    pub fn is_zero(&self) -> bool {
        self.coin == 0 && self.assets.is_empty()
    }

    pub fn has_assets(&self) -> bool {
        !self.assets.is_empty()
    }

    /// Number of distinct (policy, asset) entries.
    pub fn asset_count(&self) -> usize {
        self.assets.values().map(BTreeMap::len).sum()
    }

    pub fn asset_entries(&self) -> impl Iterator<Item = (&PolicyId, &AssetName, u64)> {
        self.assets
            .iter()
            .flat_map(|(policy, bag)| bag.iter().map(move |(name, q)| (policy, name, *q)))
    }

    /// Component-wise sum. Quantities are ledger-bounded well below `u64`
    /// range, so plain addition is used, as in wire-level value arithmetic
    /// generally.
    pub fn merge(&self, other: &Value) -> Value {
        let mut out = self.clone();
        out.coin += other.coin;
        for (policy, name, q) in other.asset_entries() {
            out.add_asset(*policy, name.clone(), q);
        }
        out
    }

    /// Component-wise difference; `None` if any component of `other` exceeds
    /// the corresponding component of `self`. Zero results are dropped.
    pub fn checked_sub(&self, other: &Value) -> Option<Value> {
        let coin = self.coin.checked_sub(other.coin)?;
        let mut assets = self.assets.clone();
        for (policy, name, q) in other.asset_entries() {
            let bag = assets.get_mut(policy)?;
            let have = bag.get_mut(name)?;
            *have = have.checked_sub(q)?;
            if *have == 0 {
                bag.remove(name);
            }
        }
        assets.retain(|_, bag| !bag.is_empty());
        Some(Value { coin, assets })
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({} coin, {} assets)", self.coin, self.asset_count())
    }
}

impl CanonicalCbor for Value {
    fn encode_cbor(&self, e: &mut Enc<'_>) -> Result<(), EncodeError> {
        if self.assets.is_empty() {
            e.u64(self.coin)?;
            return Ok(());
        }
        e.array(2)?;
        e.u64(self.coin)?;
        e.map(self.assets.len() as u64)?;
        for (policy, bag) in &self.assets {
            policy.encode_cbor(e)?;
            e.map(bag.len() as u64)?;
            for (name, quantity) in bag {
                name.encode_cbor(e)?;
                e.u64(*quantity)?;
            }
        }
        Ok(())
    }
}

/// Pending mint/burn quantities, keyed like a `Value` but signed.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Mint(BTreeMap<PolicyId, BTreeMap<AssetName, i64>>);

impl Mint {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Accumulates a signed quantity; entries that net out to zero are
    /// removed so a mint immediately cancelled by a burn leaves no residue.
    pub fn insert(&mut self, policy: PolicyId, name: AssetName, quantity: i64) {
        if quantity == 0 {
            return;
        }
        let bag = self.0.entry(policy).or_default();
        let slot = bag.entry(name.clone()).or_insert(0);
        *slot += quantity;
        if *slot == 0 {
            bag.remove(&name);
        }
        if bag.is_empty() {
            self.0.remove(&policy);
        }
    }

    pub fn assets(&self) -> &BTreeMap<PolicyId, BTreeMap<AssetName, i64>> {
        &self.0
    }

    /// The minted (positive) half as a `Value`, credited to the input side
    /// during balancing.
    pub fn credit(&self) -> Value {
        self.project(|q| u64::try_from(q).ok())
    }

    /// The burned (negative) half, as positive quantities, debited to the
    /// output side during balancing.
    pub fn debit(&self) -> Value {
        self.project(|q| u64::try_from(q.checked_neg()?).ok())
    }

    fn project(&self, pick: impl Fn(i64) -> Option<u64>) -> Value {
        let mut value = Value::zero();
        for (policy, bag) in &self.0 {
            for (name, q) in bag {
                if let Some(q) = pick(*q).filter(|q| *q > 0) {
                    value.add_asset(*policy, name.clone(), q);
                }
            }
        }
        value
    }
}

impl CanonicalCbor for Mint {
    fn encode_cbor(&self, e: &mut Enc<'_>) -> Result<(), EncodeError> {
        e.map(self.0.len() as u64)?;
        for (policy, bag) in &self.0 {
            policy.encode_cbor(e)?;
            e.map(bag.len() as u64)?;
            for (name, quantity) in bag {
                name.encode_cbor(e)?;
                e.i64(*quantity)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(byte: u8) -> PolicyId {
        PolicyId::new([byte; 28])
    }

    fn name(bytes: &[u8]) -> AssetName {
        AssetName::new(bytes.to_vec()).unwrap()
    }

    mod canonical_form {
        use super::*;

        #[test]
        fn zero_quantities_never_materialize() {
            let v = Value::from_coin(5).with_asset(policy(1), name(b"a"), 0);
            assert!(!v.has_assets());
            assert_eq!(v, Value::from_coin(5));
        }

        #[test]
        fn subtraction_drops_emptied_policies() {
            let v = Value::from_coin(10).with_asset(policy(1), name(b"a"), 3);
            let d = v
                .checked_sub(&Value::zero().with_asset(policy(1), name(b"a"), 3))
                .unwrap();
            assert!(!d.has_assets());
            assert_eq!(d.coin(), 10);
        }

        #[test]
        fn equal_values_encode_identically() {
            let a = Value::from_coin(7)
                .with_asset(policy(2), name(b"b"), 1)
                .with_asset(policy(1), name(b"a"), 1);
            let b = Value::from_coin(7)
                .with_asset(policy(1), name(b"a"), 1)
                .with_asset(policy(2), name(b"b"), 1);
            assert_eq!(a.to_cbor(), b.to_cbor());
        }
    }

    mod asset_name_order {
        use super::*;

        #[test]
        fn shorter_names_sort_first() {
            // Canonical CBOR orders byte-string keys by encoded bytes, which
            // for short strings is (length, bytes).
            assert!(name(b"z") < name(b"aa"));
            assert!(name(b"aa") < name(b"ab"));
        }

        #[test]
        fn order_matches_encoded_bytes() {
            let names = [name(b""), name(b"z"), name(b"aa"), name(b"zz"), name(b"aaa")];
            let mut by_ord = names.to_vec();
            by_ord.sort();
            let mut by_wire = names.to_vec();
            by_wire.sort_by_key(|n| n.to_cbor());
            assert_eq!(by_ord, by_wire);
        }

        #[test]
        fn bad_hex_is_rejected() {
            let err = "not hex".parse::<AssetName>().unwrap_err();
            let again = "not hex".parse::<AssetName>().unwrap_err();
            assert!(matches!(err, AssetNameError::Hex(_)));
            assert_eq!(err, again);
        }
    }

    mod arithmetic {
        use super::*;

        #[test]
        fn merge_sums_components() {
            let a = Value::from_coin(3).with_asset(policy(1), name(b"a"), 2);
            let b = Value::from_coin(4)
                .with_asset(policy(1), name(b"a"), 5)
                .with_asset(policy(2), name(b"b"), 1);
            let sum = a.merge(&b);
            assert_eq!(sum.coin(), 7);
            assert_eq!(sum.quantity_of(&policy(1), &name(b"a")), 7);
            assert_eq!(sum.quantity_of(&policy(2), &name(b"b")), 1);
        }

        #[test]
        fn checked_sub_fails_on_any_negative_component() {
            let a = Value::from_coin(10).with_asset(policy(1), name(b"a"), 1);
            let more_assets = Value::from_coin(1).with_asset(policy(1), name(b"a"), 2);
            assert!(a.checked_sub(&more_assets).is_none());
            assert!(a.checked_sub(&Value::from_coin(11)).is_none());
            let missing = Value::zero().with_asset(policy(9), name(b"x"), 1);
            assert!(a.checked_sub(&missing).is_none());
        }

        #[test]
        fn sub_then_merge_is_identity() {
            let a = Value::from_coin(10)
                .with_asset(policy(1), name(b"a"), 5)
                .with_asset(policy(2), name(b"b"), 3);
            let b = Value::from_coin(4).with_asset(policy(1), name(b"a"), 2);
            let diff = a.checked_sub(&b).unwrap();
            assert_eq!(diff.merge(&b), a);
        }
    }

    mod mint {
        use super::*;

        #[test]
        fn splits_into_credit_and_debit() {
            let mut mint = Mint::default();
            mint.insert(policy(1), name(b"new"), 10);
            mint.insert(policy(2), name(b"old"), -4);
            assert_eq!(mint.credit().quantity_of(&policy(1), &name(b"new")), 10);
            assert!(mint.credit().quantity_of(&policy(2), &name(b"old")) == 0);
            assert_eq!(mint.debit().quantity_of(&policy(2), &name(b"old")), 4);
        }

        #[test]
        fn cancelling_quantities_leave_no_residue() {
            let mut mint = Mint::default();
            mint.insert(policy(1), name(b"a"), 5);
            mint.insert(policy(1), name(b"a"), -5);
            assert!(mint.is_empty());
        }
    }

    mod encoding {
        use super::*;

        #[test]
        fn pure_coin_encodes_as_bare_integer() {
            assert_eq!(Value::from_coin(0).to_cbor(), vec![0x00]);
            assert_eq!(Value::from_coin(1000).to_cbor(), vec![0x19, 0x03, 0xe8]);
        }

        #[test]
        fn multiasset_encodes_as_pair() {
            let v = Value::from_coin(1).with_asset(policy(0xaa), name(b"n"), 2);
            let bytes = v.to_cbor();
            // [1, {h'aa..': {h'6e': 2}}]
            assert_eq!(bytes[0], 0x82);
            assert_eq!(bytes[1], 0x01);
            assert_eq!(bytes[2], 0xa1);
            assert_eq!(bytes[3], 0x58);
            assert_eq!(bytes[4], 28);
            assert_eq!(bytes.len(), 2 + 1 + 2 + 28 + 1 + 2 + 1);
        }
    }
}
