//! Multi-index key-value store (spec §3, §4.3, §4.4).
//!
//! A [`Store`] owns every `(code, scope, table)` triple's [`Table`] and
//! allocates each a dense `TableId`, the same pattern the teacher uses for
//! `WasmEngine`'s per-owner nonce counters in `lib.rs` — a `BTreeMap` lookup
//! keyed on the logical identity, plus a monotonic counter for the opaque
//! id contracts and iterators actually address.

pub mod key;
pub mod table;

pub use key::{Checksum256, OrderedF64, SecondaryKey};
pub use table::{IndexEntry, Row, SecondaryIndex, Table, TableId};

use crate::name::Name;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct TableKey {
    code: Name,
    scope: Name,
    table: Name,
}

/// Owns every table created across the lifetime of a [`crate::Blockchain`].
/// Tables are never deleted even once empty (spec §4.3: "an empty table
/// still exists for iterator purposes until the contract is redeployed"),
/// matching how the teacher's `WasmEngine` never reclaims a `contracts`
/// slot once a code id has been assigned.
#[derive(Debug, Default)]
pub struct Store {
    tables: BTreeMap<TableId, Table>,
    by_identity: BTreeMap<TableKey, TableId>,
    next_id: TableId,
}

impl Store {
    pub fn new() -> Self {
        Store {
            tables: BTreeMap::new(),
            by_identity: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// Looks up a table without creating it — used by `db_find_i64` and
    /// friends, which must return the end iterator rather than fabricate
    /// a table that was never stored into.
    pub fn find_table_id(&self, code: Name, scope: Name, table: Name) -> Option<TableId> {
        self.by_identity
            .get(&TableKey { code, scope, table })
            .copied()
    }

    /// Looks up a table, creating an empty one if this is the first time
    /// this `(code, scope, table)` triple has been addressed — used by
    /// `db_store_i64`, which is allowed to bring a table into existence.
    pub fn get_or_create_table_id(&mut self, code: Name, scope: Name, table: Name) -> TableId {
        let key = TableKey { code, scope, table };
        if let Some(&id) = self.by_identity.get(&key) {
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.by_identity.insert(key, id);
        self.tables.insert(id, Table::new(id, code, scope, table));
        id
    }

    pub fn table(&self, id: TableId) -> Option<&Table> {
        self.tables.get(&id)
    }

    pub fn table_mut(&mut self, id: TableId) -> Option<&mut Table> {
        self.tables.get_mut(&id)
    }

    /// Drops all tables and identity mappings, but keeps the id counter
    /// monotonic — analogous to the teacher's `WasmEngine::deserialize_all`,
    /// which rebuilds contract state from a snapshot without resetting the
    /// ids already handed out to live references.
    pub fn reset(&mut self) {
        self.tables.clear();
        self.by_identity.clear();
    }

    /// Dumps every table's identity and row count to stderr. Wired to the
    /// `$vertPrintStorage` console token (spec §6) rather than exposed as
    /// its own host intrinsic — a debugging aid, not part of the ABI.
    pub fn debug_dump(&self) {
        for (key, &id) in &self.by_identity {
            let rows = self.tables.get(&id).map(|t| t.primary.len()).unwrap_or(0);
            eprintln!(
                "table {id} code={} scope={} table={} rows={rows}",
                key.code, key.scope, key.table
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_without_create_misses_on_unknown_table() {
        let store = Store::new();
        assert!(store
            .find_table_id(Name::new(1), Name::new(2), Name::new(3))
            .is_none());
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let mut store = Store::new();
        let a = store.get_or_create_table_id(Name::new(1), Name::new(2), Name::new(3));
        let b = store.get_or_create_table_id(Name::new(1), Name::new(2), Name::new(3));
        assert_eq!(a, b);
        assert_eq!(store.find_table_id(Name::new(1), Name::new(2), Name::new(3)), Some(a));
    }

    #[test]
    fn distinct_scopes_get_distinct_tables() {
        let mut store = Store::new();
        let a = store.get_or_create_table_id(Name::new(1), Name::new(2), Name::new(3));
        let b = store.get_or_create_table_id(Name::new(1), Name::new(9), Name::new(3));
        assert_ne!(a, b);
    }

    #[test]
    fn reset_clears_tables_but_not_id_counter() {
        let mut store = Store::new();
        store.get_or_create_table_id(Name::new(1), Name::new(2), Name::new(3));
        store.reset();
        assert!(store
            .find_table_id(Name::new(1), Name::new(2), Name::new(3))
            .is_none());
        let id = store.get_or_create_table_id(Name::new(4), Name::new(5), Name::new(6));
        assert_eq!(id, 1);
    }
}
