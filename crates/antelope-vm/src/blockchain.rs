//! Process-wide chain state (spec §9 "Global state"): accounts, the
//! multi-index [`Store`], the caller-injected clock/block number, the
//! activated-feature set, and the retained per-action trace list.
//!
//! Grounded on the teacher's `WasmEngine`, which owns `contracts:
//! BTreeMap<Name, Contract>` as a single struct threaded explicitly into
//! every execution rather than a process-global — this is that same shape,
//! generalized to the Antelope action-execution model (accounts +
//! multi-index tables instead of one flat state map per contract).

use crate::account::Account;
use crate::context::ActionTrace;
use crate::name::Name;
use crate::store::Store;
use std::collections::{BTreeMap, HashSet};

/// Block time/number source (spec §1: "block time and block number
/// sources" are external collaborators). Callers inject one; tests use
/// [`FixedClock`].
pub trait Clock {
    fn now_micros(&self) -> u64;
    fn block_num(&self) -> u32;
}

/// A `Clock` that always returns the same instant, settable at any time —
/// the shape spec §8's scenario 1 needs ("Set clock=500 ms; send exec(time)").
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedClock {
    micros: u64,
    block_num: u32,
}

impl FixedClock {
    pub fn new() -> Self {
        FixedClock::default()
    }

    pub fn set_millis(&mut self, millis: u64) {
        self.micros = millis * 1_000;
    }

    pub fn set_micros(&mut self, micros: u64) {
        self.micros = micros;
    }

    pub fn set_block_num(&mut self, block_num: u32) {
        self.block_num = block_num;
    }
}

impl Clock for FixedClock {
    fn now_micros(&self) -> u64 {
        self.micros
    }

    fn block_num(&self) -> u32 {
        self.block_num
    }
}

/// Owns every piece of state that survives across actions within one
/// process (spec §3 Lifecycle: "Accounts live in a process-wide Blockchain
/// state until explicit reset"). Passed explicitly into the [`crate::dispatcher::Dispatcher`]
/// and [`crate::host::HostEnv`] rather than held behind a process-global.
pub struct Blockchain {
    pub accounts: BTreeMap<Name, Account>,
    pub store: Store,
    pub clock: FixedClock,
    pub activated_features: HashSet<[u8; 32]>,
    pub traces: Vec<ActionTrace>,
}

impl Blockchain {
    pub fn new() -> Self {
        Blockchain {
            accounts: BTreeMap::new(),
            store: Store::new(),
            clock: FixedClock::new(),
            activated_features: HashSet::new(),
            traces: Vec::new(),
        }
    }

    /// Creates an account with an empty permission set if it doesn't
    /// already exist; returns the existing one unchanged otherwise.
    pub fn create_account(&mut self, name: Name) -> &mut Account {
        self.accounts
            .entry(name)
            .or_insert_with(|| Account::new(name, self.clock.now_micros()))
    }

    pub fn account(&self, name: Name) -> Option<&Account> {
        self.accounts.get(&name)
    }

    pub fn account_mut(&mut self, name: Name) -> Option<&mut Account> {
        self.accounts.get_mut(&name)
    }

    pub fn is_account(&self, name: Name) -> bool {
        self.accounts.contains_key(&name)
    }

    pub fn activate_feature(&mut self, digest: [u8; 32]) {
        self.activated_features.insert(digest);
    }

    pub fn is_feature_activated(&self, digest: &[u8; 32]) -> bool {
        self.activated_features.contains(digest)
    }

    /// Drops all accounts, tables, traces, and the activated-feature set,
    /// but keeps the clock's current reading (spec §3: "until explicit
    /// reset" — the clock is caller-owned, not chain state).
    pub fn reset(&mut self) {
        self.accounts.clear();
        self.store.reset();
        self.activated_features.clear();
        self.traces.clear();
    }
}

impl Default for Blockchain {
    fn default() -> Self {
        Blockchain::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_account_is_idempotent() {
        let mut chain = Blockchain::new();
        chain.create_account(Name::new(1));
        chain.create_account(Name::new(1));
        assert_eq!(chain.accounts.len(), 1);
        assert!(chain.is_account(Name::new(1)));
        assert!(!chain.is_account(Name::new(2)));
    }

    #[test]
    fn fixed_clock_reports_injected_time() {
        let mut clock = FixedClock::new();
        clock.set_millis(500);
        assert_eq!(clock.now_micros(), 500_000);
        clock.set_millis(1000);
        assert_eq!(clock.now_micros(), 1_000_000);
    }

    #[test]
    fn reset_clears_accounts_and_tables_but_keeps_clock() {
        let mut chain = Blockchain::new();
        chain.create_account(Name::new(1));
        chain.clock.set_millis(42);
        chain.reset();
        assert!(chain.accounts.is_empty());
        assert_eq!(chain.clock.now_micros(), 42_000);
    }

    #[test]
    fn feature_activation_membership() {
        let mut chain = Blockchain::new();
        let digest = [7u8; 32];
        assert!(!chain.is_feature_activated(&digest));
        chain.activate_feature(digest);
        assert!(chain.is_feature_activated(&digest));
    }
}
