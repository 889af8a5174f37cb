// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PROPERTY-BASED TESTS — antelope-vm
//
// These tests verify invariants that MUST hold for ALL possible inputs.
// proptest generates thousands of random inputs per property.
//
// ZERO production code changes — this is a #[cfg(test)] integration test.
// Run: cargo test --release -p antelope-vm --test prop_store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use antelope_vm::iterator_cache::{IteratorCache, RowRef};
use antelope_vm::name::Name;
use antelope_vm::store::{Checksum256, OrderedF64, Row, SecondaryIndex, SecondaryKey, Store};
use proptest::prelude::*;

const CODE: Name = Name(1);
const SCOPE: Name = Name(2);
const TABLE: Name = Name(3);

#[derive(Debug, Clone, Copy)]
enum Op {
    Insert(u64),
    Erase(u64),
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    proptest::collection::vec(
        (any::<bool>(), 0u64..64).prop_map(|(insert, k)| {
            if insert {
                Op::Insert(k)
            } else {
                Op::Erase(k)
            }
        }),
        0..200,
    )
}

proptest! {
    /// PROPERTY: replaying Insert/Erase ops against a primary index always
    /// leaves at most one row per key (spec §4.3: primary keys are unique),
    /// and `erase` leaves no dangling secondary entries behind.
    #[test]
    fn prop_primary_index_stays_unique_and_erase_is_total(ops in arb_ops()) {
        let mut store = Store::new();
        let table_id = store.get_or_create_table_id(CODE, SCOPE, TABLE);
        for op in ops {
            let table = store.table_mut(table_id).unwrap();
            match op {
                Op::Insert(k) => {
                    table.idx64.set(k, Name(9), SecondaryKey::U64(k));
                    table.primary.insert(k, Row { primary_key: k, payer: Name(9), value: vec![] });
                }
                Op::Erase(k) => {
                    table.erase(k);
                }
            }
        }
        let table = store.table(table_id).unwrap();
        let mut seen = std::collections::HashSet::new();
        for key in table.primary.keys() {
            prop_assert!(seen.insert(*key), "duplicate primary key {key}");
        }
        // every live primary key still has its idx64 entry, and no erased
        // key left one behind.
        for key in 0u64..64 {
            let has_row = table.primary.contains_key(&key);
            let has_idx = table.idx64.get_by_primary(key).is_some();
            prop_assert_eq!(has_row, has_idx, "row/secondary-entry mismatch for key {key}");
        }
    }

    /// PROPERTY: a u64 secondary index, populated from arbitrary distinct
    /// primary/secondary key pairs, always iterates in non-decreasing
    /// (secondary_key, primary_key) order (spec §4.4).
    #[test]
    fn prop_secondary_u64_iterates_in_order(
        mut pairs in proptest::collection::vec((0u64..50, any::<u64>()), 0..100)
    ) {
        pairs.sort_by_key(|&(pk, _)| pk);
        pairs.dedup_by_key(|&mut (pk, _)| pk);

        let mut idx = SecondaryIndex::default();
        for &(pk, sk) in &pairs {
            idx.set(pk, Name(1), SecondaryKey::U64(sk));
        }

        let mut collected = Vec::new();
        let mut current = idx.lower_bound(SecondaryKey::U64(0)).copied();
        while let Some(entry) = current {
            collected.push((entry.secondary_key, entry.primary_key));
            current = idx.next(&entry).copied();
        }

        let mut expected = collected.clone();
        expected.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        prop_assert_eq!(collected, expected);
    }

    /// PROPERTY: Checksum256's stored bytes never change no matter what
    /// value is stored — only `Ord` applies the half-swap-and-reverse
    /// transform (spec §4.4/§9).
    #[test]
    fn prop_checksum256_storage_is_untransformed(bytes in proptest::collection::vec(any::<u8>(), 32..=32)) {
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        let c = Checksum256(arr);
        prop_assert_eq!(c.0, arr);
    }

    /// PROPERTY: OrderedF64 preserves the numeric order of any finite pair
    /// of f64 values (spec §4.4: idx_double is expected to order like IEEE
    /// doubles for non-NaN input).
    #[test]
    fn prop_ordered_f64_preserves_pairwise_order(a in -1.0e30f64..1.0e30, b in -1.0e30f64..1.0e30) {
        let oa = OrderedF64::from_f64(a);
        let ob = OrderedF64::from_f64(b);
        prop_assert_eq!(a < b, oa < ob);
        prop_assert_eq!(a == b, oa == ob);
    }

    /// PROPERTY: end-of-table sentinels are stable and unique per table
    /// across any sequence of (possibly repeated) table visits (spec §4.2).
    #[test]
    fn prop_end_iterator_stable_per_table(table_ids in proptest::collection::vec(0u64..20, 0..200)) {
        let mut cache = IteratorCache::new();
        let mut seen: std::collections::HashMap<u64, i64> = std::collections::HashMap::new();
        for table_id in table_ids {
            let end = cache.cache_table(table_id);
            prop_assert!(end < -1);
            if let Some(&prev) = seen.get(&table_id) {
                prop_assert_eq!(end, prev);
            } else {
                seen.insert(table_id, end);
            }
            prop_assert_eq!(cache.table_from_end_iterator(end), Some(table_id));
        }
        // every minted sentinel is distinct across distinct tables
        let mut sentinels: Vec<i64> = seen.values().copied().collect();
        let before = sentinels.len();
        sentinels.sort();
        sentinels.dedup();
        prop_assert_eq!(sentinels.len(), before);
    }

    /// PROPERTY: a removed (tombstoned) iterator handle never resolves to a
    /// row again, regardless of how many live handles surround it (spec
    /// §4.2).
    #[test]
    fn prop_removed_handle_never_resurfaces(
        n in 1usize..30,
        remove_at in 0usize..30,
    ) {
        let mut cache = IteratorCache::new();
        let mut handles = Vec::new();
        for i in 0..n {
            handles.push(cache.add(RowRef { table_id: 0, primary_key: i as u64 }));
        }
        let idx = remove_at % n;
        let removed = handles[idx];
        prop_assert!(cache.remove(removed));
        prop_assert!(cache.get(removed).is_none());
        for (i, &h) in handles.iter().enumerate() {
            if i != idx {
                prop_assert!(cache.get(h).is_some());
            }
        }
    }
}
