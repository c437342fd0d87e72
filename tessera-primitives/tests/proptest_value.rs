use proptest::collection::btree_map;
use proptest::prelude::*;

use tessera_primitives::{AssetName, CanonicalCbor, PolicyId, Value};

fn arb_policy() -> impl Strategy<Value = PolicyId> {
    // A handful of distinct policies keeps overlap between generated values
    // likely, which is where the algebra is interesting.
    (0u8..4).prop_map(|b| PolicyId::new([b; 28]))
}

fn arb_name() -> impl Strategy<Value = AssetName> {
    proptest::collection::vec(any::<u8>(), 0..8)
        .prop_map(|bytes| AssetName::new(bytes).unwrap())
}

fn arb_value() -> impl Strategy<Value = Value> {
    (
        0u64..1_000_000_000,
        btree_map(arb_policy(), btree_map(arb_name(), 0u64..1_000_000, 0..4), 0..3),
    )
        .prop_map(|(coin, assets)| Value::new(coin, assets))
}

proptest! {
    #[test]
    fn merge_is_commutative(a in arb_value(), b in arb_value()) {
        prop_assert_eq!(a.merge(&b), b.merge(&a));
    }

    #[test]
    fn merge_is_associative(a in arb_value(), b in arb_value(), c in arb_value()) {
        prop_assert_eq!(a.merge(&b).merge(&c), a.merge(&b.merge(&c)));
    }

    #[test]
    fn zero_is_identity(a in arb_value()) {
        prop_assert_eq!(a.merge(&Value::zero()), a.clone());
        prop_assert_eq!(Value::zero().merge(&a), a);
    }

    #[test]
    fn sub_undoes_merge(a in arb_value(), b in arb_value()) {
        let sum = a.merge(&b);
        prop_assert_eq!(sum.checked_sub(&b), Some(a.clone()));
        prop_assert_eq!(sum.checked_sub(&a), Some(b));
    }

    #[test]
    fn checked_sub_never_underflows(a in arb_value(), b in arb_value()) {
        if let Some(diff) = a.checked_sub(&b) {
            prop_assert_eq!(diff.merge(&b), a);
        } else {
            // At least one component of b must exceed a.
            let coin_short = a.coin() < b.coin();
            let asset_short = b
                .asset_entries()
                .any(|(p, n, q)| a.quantity_of(p, n) < q);
            prop_assert!(coin_short || asset_short);
        }
    }

    #[test]
    fn equal_values_share_an_encoding(a in arb_value()) {
        let b = a.clone();
        prop_assert_eq!(a.to_cbor(), b.to_cbor());
    }

    #[test]
    fn encoding_is_order_insensitive(entries in proptest::collection::vec((arb_policy(), arb_name(), 1u64..1_000), 0..8)) {
        let forward = entries.iter().fold(Value::zero(), |v, (p, n, q)| {
            v.with_asset(*p, n.clone(), *q)
        });
        let backward = entries.iter().rev().fold(Value::zero(), |v, (p, n, q)| {
            v.with_asset(*p, n.clone(), *q)
        });
        prop_assert_eq!(forward.to_cbor(), backward.to_cbor());
    }
}
