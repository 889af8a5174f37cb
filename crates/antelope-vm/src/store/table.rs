//! One (code, scope, table) triple's primary index plus its four parallel
//! secondary indices (spec §3, §4.3, §4.4).

use super::key::SecondaryKey;
use crate::name::Name;
use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};

pub type TableId = u64;

#[derive(Debug, Clone)]
pub struct Row {
    pub primary_key: u64,
    pub payer: Name,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
pub struct IndexEntry {
    pub primary_key: u64,
    pub secondary_key: SecondaryKey,
    pub payer: Name,
}

/// A single secondary index: ordered on `(secondary_key, primary_key)`,
/// unique on `primary_key` alone (spec §4.4: "Uniqueness is on the full
/// (table, primary) — multiple entries may share a secondary key").
///
/// `by_primary` is the reverse map that lets `set`/`delete`/`find_primary`
/// locate an entry's current secondary key in O(log n) without scanning
/// `by_key` — the teacher's tables key everything off an owning map plus a
/// side index (`WasmEngine.contract_locks` next to `WasmEngine.contracts`);
/// this is the same shape applied to one table's secondary index.
#[derive(Debug, Default, Clone)]
pub struct SecondaryIndex {
    by_key: BTreeMap<(SecondaryKey, u64), IndexEntry>,
    by_primary: BTreeMap<u64, SecondaryKey>,
}

impl SecondaryIndex {
    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Insert a fresh entry, or replace the existing one for `primary_key`
    /// if present (spec §4.4 `set(old?, new)`).
    pub fn set(&mut self, primary_key: u64, payer: Name, key: SecondaryKey) {
        if let Some(old_key) = self.by_primary.remove(&primary_key) {
            self.by_key.remove(&(old_key, primary_key));
        }
        self.by_key.insert(
            (key, primary_key),
            IndexEntry {
                primary_key,
                secondary_key: key,
                payer,
            },
        );
        self.by_primary.insert(primary_key, key);
    }

    pub fn delete(&mut self, primary_key: u64) {
        if let Some(old_key) = self.by_primary.remove(&primary_key) {
            self.by_key.remove(&(old_key, primary_key));
        }
    }

    /// Entry with the least primary key matching `key` exactly — spec
    /// §4.4's `ignore_primary_key` query, implemented as a lower bound
    /// seeded at primary key 0 followed by an equality check, rather than
    /// a query-time comparator flag.
    pub fn get_exact_secondary(&self, key: SecondaryKey) -> Option<&IndexEntry> {
        let entry = self.by_key.range((key, 0)..).next()?.1;
        (entry.secondary_key == key).then_some(entry)
    }

    pub fn get_by_primary(&self, primary_key: u64) -> Option<&IndexEntry> {
        let key = *self.by_primary.get(&primary_key)?;
        self.by_key.get(&(key, primary_key))
    }

    /// First entry with secondary key >= `key`.
    pub fn lower_bound(&self, key: SecondaryKey) -> Option<&IndexEntry> {
        self.by_key.range((key, 0)..).next().map(|(_, v)| v)
    }

    /// First entry with secondary key > `key`.
    pub fn upper_bound(&self, key: SecondaryKey) -> Option<&IndexEntry> {
        self.by_key
            .range((Excluded((key, u64::MAX)), Unbounded))
            .next()
            .map(|(_, v)| v)
    }

    pub fn next(&self, current: &IndexEntry) -> Option<&IndexEntry> {
        self.by_key
            .range((
                Excluded((current.secondary_key, current.primary_key)),
                Unbounded,
            ))
            .next()
            .map(|(_, v)| v)
    }

    pub fn prev(&self, current: &IndexEntry) -> Option<&IndexEntry> {
        self.by_key
            .range((
                Unbounded,
                Excluded((current.secondary_key, current.primary_key)),
            ))
            .next_back()
            .map(|(_, v)| v)
    }

    /// Maximum element (spec §4.3 calls the primary-index equivalent
    /// `penultimate`; the name is historical, not a hint about position).
    pub fn penultimate(&self) -> Option<&IndexEntry> {
        self.by_key.values().next_back()
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    pub id: TableId,
    pub code: Name,
    pub scope: Name,
    pub table: Name,
    pub primary: BTreeMap<u64, Row>,
    pub idx64: SecondaryIndex,
    pub idx128: SecondaryIndex,
    pub idx256: SecondaryIndex,
    pub idx_double: SecondaryIndex,
}

impl Table {
    pub fn new(id: TableId, code: Name, scope: Name, table: Name) -> Self {
        Table {
            id,
            code,
            scope,
            table,
            primary: BTreeMap::new(),
            idx64: SecondaryIndex::default(),
            idx128: SecondaryIndex::default(),
            idx256: SecondaryIndex::default(),
            idx_double: SecondaryIndex::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }

    /// Removes the row and every secondary entry referencing it —
    /// spec §3's invariant that a removed row leaves zero dangling
    /// `IndexEntry`s behind.
    pub fn erase(&mut self, primary_key: u64) -> Option<Row> {
        let row = self.primary.remove(&primary_key)?;
        self.idx64.delete(primary_key);
        self.idx128.delete(primary_key);
        self.idx256.delete(primary_key);
        self.idx_double.delete(primary_key);
        Some(row)
    }

    pub fn lower_bound(&self, key: u64) -> Option<&Row> {
        self.primary.range(key..).next().map(|(_, v)| v)
    }

    pub fn upper_bound(&self, key: u64) -> Option<&Row> {
        self.primary
            .range((Excluded(key), Unbounded))
            .next()
            .map(|(_, v)| v)
    }

    pub fn next(&self, key: u64) -> Option<&Row> {
        self.primary
            .range((Excluded(key), Unbounded))
            .next()
            .map(|(_, v)| v)
    }

    pub fn prev(&self, key: u64) -> Option<&Row> {
        self.primary
            .range((Unbounded, Excluded(key)))
            .next_back()
            .map(|(_, v)| v)
    }

    pub fn penultimate(&self) -> Option<&Row> {
        self.primary.values().next_back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        Table::new(1, Name::new(1), Name::new(2), Name::new(3))
    }

    #[test]
    fn primary_bounds_and_steps() {
        let mut t = table();
        for k in [1, 3, 5] {
            t.primary.insert(
                k,
                Row {
                    primary_key: k,
                    payer: Name::new(1),
                    value: vec![],
                },
            );
        }
        assert_eq!(t.lower_bound(4).unwrap().primary_key, 5);
        assert_eq!(t.prev(5).unwrap().primary_key, 3);
        assert!(t.next(5).is_none());
        assert_eq!(t.penultimate().unwrap().primary_key, 5);
        assert!(t.prev(1).is_none());
    }

    #[test]
    fn erase_removes_all_secondary_entries() {
        let mut t = table();
        t.primary.insert(
            1,
            Row {
                primary_key: 1,
                payer: Name::new(9),
                value: vec![],
            },
        );
        t.idx64.set(1, Name::new(9), SecondaryKey::U64(100));
        t.idx128.set(1, Name::new(9), SecondaryKey::U128(100));
        assert!(t.erase(1).is_some());
        assert!(t.idx64.get_by_primary(1).is_none());
        assert!(t.idx128.get_by_primary(1).is_none());
    }

    #[test]
    fn secondary_find_ignores_primary() {
        let mut idx = SecondaryIndex::default();
        idx.set(1, Name::new(1), SecondaryKey::U128(0x100));
        idx.set(2, Name::new(1), SecondaryKey::U128(0x100));
        idx.set(3, Name::new(1), SecondaryKey::U128(0x200));

        let found = idx.get_exact_secondary(SecondaryKey::U128(0x100)).unwrap();
        assert_eq!(found.primary_key, 1);

        let n1 = idx.next(found).unwrap();
        assert_eq!(n1.primary_key, 2);
        let n2 = idx.next(n1).unwrap();
        assert_eq!(n2.primary_key, 3);
        assert!(idx.next(n2).is_none());
    }

    #[test]
    fn secondary_update_moves_entry() {
        let mut idx = SecondaryIndex::default();
        idx.set(1, Name::new(1), SecondaryKey::U64(5));
        idx.set(1, Name::new(1), SecondaryKey::U64(50));
        assert!(idx.get_exact_secondary(SecondaryKey::U64(5)).is_none());
        assert_eq!(
            idx.get_exact_secondary(SecondaryKey::U64(50))
                .unwrap()
                .primary_key,
            1
        );
    }

    #[test]
    fn secondary_lower_upper_bound() {
        let mut idx = SecondaryIndex::default();
        idx.set(1, Name::new(1), SecondaryKey::U64(10));
        idx.set(2, Name::new(1), SecondaryKey::U64(20));
        assert_eq!(idx.lower_bound(SecondaryKey::U64(15)).unwrap().primary_key, 2);
        assert_eq!(idx.upper_bound(SecondaryKey::U64(10)).unwrap().primary_key, 2);
        assert!(idx.upper_bound(SecondaryKey::U64(20)).is_none());
    }
}
