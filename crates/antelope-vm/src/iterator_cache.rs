//! Per-action iterator handle arena (spec §4.2).
//!
//! Contracts address rows through small non-negative integer handles rather
//! than pointers or keys; negative handles below `-1` are end-of-table
//! sentinels, one per table visited during this action. Mirrors the
//! teacher's convention of keying everything off a dense, process-local
//! counter (`WasmEngine`'s per-owner `nonce` map), but scoped to a single
//! `Context` and destroyed with it (spec §3 Lifecycle).

use crate::store::TableId;
use std::collections::HashMap;

/// A row reference cached under a positive handle. Generic over the key
/// type so the same cache handles primary rows (`PrimaryKeyRef`) and
/// secondary entries (`SecondaryKeyRef`) without duplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRef {
    pub table_id: TableId,
    pub primary_key: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Live(RowRef),
    Tombstoned,
}

/// Per-`Context` iterator handle arena plus end-of-table sentinels.
#[derive(Debug, Default)]
pub struct IteratorCache {
    slots: Vec<Slot>,
    /// table_id -> end iterator (negative, strictly less than -1).
    end_of_table: HashMap<TableId, i64>,
    /// inverse of `end_of_table`, for `table_from_end_iterator`.
    table_of_end: HashMap<i64, TableId>,
    next_end: i64,
}

impl IteratorCache {
    pub fn new() -> Self {
        IteratorCache {
            slots: Vec::new(),
            end_of_table: HashMap::new(),
            table_of_end: HashMap::new(),
            next_end: -2,
        }
    }

    /// Idempotent: returns the table's existing end iterator, or allocates
    /// the next one (-2, -3, ...).
    pub fn cache_table(&mut self, table_id: TableId) -> i64 {
        if let Some(&e) = self.end_of_table.get(&table_id) {
            return e;
        }
        let e = self.next_end;
        self.next_end -= 1;
        self.end_of_table.insert(table_id, e);
        self.table_of_end.insert(e, table_id);
        e
    }

    pub fn add(&mut self, row: RowRef) -> i64 {
        self.slots.push(Slot::Live(row));
        (self.slots.len() - 1) as i64
    }

    pub fn get(&self, handle: i64) -> Option<RowRef> {
        if handle < 0 {
            return None;
        }
        match self.slots.get(handle as usize) {
            Some(Slot::Live(r)) => Some(*r),
            _ => None,
        }
    }

    pub fn set(&mut self, handle: i64, row: RowRef) -> bool {
        if handle < 0 {
            return false;
        }
        match self.slots.get_mut(handle as usize) {
            Some(slot @ Slot::Live(_)) => {
                *slot = Slot::Live(row);
                true
            }
            _ => false,
        }
    }

    pub fn remove(&mut self, handle: i64) -> bool {
        if handle < 0 {
            return false;
        }
        match self.slots.get_mut(handle as usize) {
            Some(slot @ Slot::Live(_)) => {
                *slot = Slot::Tombstoned;
                true
            }
            _ => false,
        }
    }

    pub fn table_of(&self, handle: i64) -> Option<TableId> {
        if handle < 0 {
            return self.table_from_end_iterator(handle);
        }
        match self.slots.get(handle as usize) {
            Some(Slot::Live(r)) => Some(r.table_id),
            _ => None,
        }
    }

    pub fn end_iterator_of_table(&self, table_id: TableId) -> Option<i64> {
        self.end_of_table.get(&table_id).copied()
    }

    pub fn table_from_end_iterator(&self, end: i64) -> Option<TableId> {
        self.table_of_end.get(&end).copied()
    }

    /// True for any negative handle strictly less than -1 that this cache
    /// minted — the definition of "end sentinel" (spec §4.2).
    pub fn is_end_iterator(&self, handle: i64) -> bool {
        handle < -1 && self.table_of_end.contains_key(&handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_table_is_idempotent() {
        let mut c = IteratorCache::new();
        let e1 = c.cache_table(7);
        let e2 = c.cache_table(7);
        assert_eq!(e1, e2);
        assert!(e1 < -1);
    }

    #[test]
    fn distinct_tables_get_distinct_sentinels() {
        let mut c = IteratorCache::new();
        let a = c.cache_table(1);
        let b = c.cache_table(2);
        assert_ne!(a, b);
        assert_eq!(c.table_from_end_iterator(a), Some(1));
        assert_eq!(c.table_from_end_iterator(b), Some(2));
    }

    #[test]
    fn handles_are_monotonic_and_non_negative() {
        let mut c = IteratorCache::new();
        let h0 = c.add(RowRef {
            table_id: 1,
            primary_key: 10,
        });
        let h1 = c.add(RowRef {
            table_id: 1,
            primary_key: 20,
        });
        assert_eq!(h0, 0);
        assert_eq!(h1, 1);
    }

    #[test]
    fn removed_handle_cannot_be_read() {
        let mut c = IteratorCache::new();
        let h = c.add(RowRef {
            table_id: 1,
            primary_key: 10,
        });
        assert!(c.get(h).is_some());
        assert!(c.remove(h));
        assert!(c.get(h).is_none());
        // tombstone does not un-remove on a later set()
        assert!(!c.set(
            h,
            RowRef {
                table_id: 1,
                primary_key: 11
            }
        ));
    }

    #[test]
    fn negative_non_end_handles_resolve_to_nothing() {
        let c = IteratorCache::new();
        assert!(c.get(-1).is_none());
        assert!(!c.is_end_iterator(-1));
    }
}
