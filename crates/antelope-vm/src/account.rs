//! Accounts, permissions, and weighted-threshold authorities.
//!
//! Not present in the teacher (a LOS-token VM has no multi-permission
//! account model), so this is built fresh from the well-known Antelope
//! `authority` ABI shape, trimmed of `wait_weight`/`delay_sec` since
//! deferred transactions are out of scope here. Grounded on the teacher's
//! own preference for small `BTreeMap`-keyed owning structs (`WasmEngine`'s
//! `contracts: BTreeMap<Name, Contract>`) rather than a graph library.

use crate::name::Name;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PermissionLevel {
    pub actor: Name,
    pub permission: Name,
}

impl PermissionLevel {
    pub fn new(actor: Name, permission: Name) -> Self {
        PermissionLevel { actor, permission }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyWeight {
    /// Opaque public-key bytes; this crate never verifies a signature
    /// against them (spec §9: `require_auth` trusts the already-resolved
    /// `Context.authorization` list, it does not re-check signatures).
    pub key_hash: [u8; 32],
    pub weight: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountWeight {
    pub permission: PermissionLevel,
    pub weight: u16,
}

/// A weighted-threshold authority: satisfied once the summed weight of
/// present keys and accounts meets `threshold`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Authority {
    pub threshold: u32,
    pub keys: Vec<KeyWeight>,
    pub accounts: Vec<AccountWeight>,
}

impl Authority {
    pub fn new(threshold: u32) -> Self {
        Authority {
            threshold,
            keys: Vec::new(),
            accounts: Vec::new(),
        }
    }

    /// True if the given set of already-authenticated permission levels
    /// satisfies this authority, walking one level of `accounts` weights
    /// directly (used by the dispatcher's inline-action authority check;
    /// `require_auth`/`require_auth2` don't call this — they check the
    /// transaction's authorization list directly, per spec §9).
    pub fn is_satisfied_by(&self, present: &[PermissionLevel]) -> bool {
        let mut total: u32 = 0;
        for account_weight in &self.accounts {
            if present.contains(&account_weight.permission) {
                total += account_weight.weight as u32;
            }
        }
        total >= self.threshold
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
    pub name: Name,
    pub parent: Name,
    pub authority: Authority,
}

/// spec §3: "carries WASM bytes (may be absent), ABI, code sequence
/// (monotonic counter incremented on code updates), creation time, and a
/// list of named permissions". The ABI text parser is out of scope (spec
/// §1), so `declared_actions` stands in for "the ABI" here: just the set
/// of action names the contract has declared itself able to receive,
/// which is all the dispatcher's inline-action check (spec §4.6) needs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Account {
    pub name: Name,
    pub creation_time: u64,
    pub permissions: BTreeMap<Name, Permission>,
    #[serde(default)]
    pub code: Option<Vec<u8>>,
    #[serde(default)]
    pub code_sequence: u32,
    #[serde(default)]
    pub declared_actions: BTreeSet<Name>,
}

impl Account {
    pub fn new(name: Name, creation_time: u64) -> Self {
        Account {
            name,
            creation_time,
            permissions: BTreeMap::new(),
            code: None,
            code_sequence: 0,
            declared_actions: BTreeSet::new(),
        }
    }

    pub fn permission(&self, name: Name) -> Option<&Permission> {
        self.permissions.get(&name)
    }

    /// Replaces the contract's WASM bytes, bumping `code_sequence` (spec
    /// §3 invariant: "monotonic counter incremented on code updates").
    pub fn set_code(&mut self, wasm: Vec<u8>) {
        self.code = Some(wasm);
        self.code_sequence += 1;
    }

    /// SHA-256 of the WASM bytes, or 32 zero bytes if no code is set
    /// (spec §4.5 `get_code_hash`).
    pub fn code_hash(&self) -> [u8; 32] {
        match &self.code {
            Some(wasm) => crate::crypto::sha256(wasm),
            None => [0u8; 32],
        }
    }

    /// Walks `parent` links from `permission` up to `"owner"`, returning
    /// true if any authority on the path is satisfied by `present` — the
    /// standard Antelope permission-hierarchy rule that satisfying a senior
    /// permission also satisfies any permission beneath it.
    pub fn satisfies(&self, permission: Name, present: &[PermissionLevel]) -> bool {
        let mut current = Some(permission);
        let mut guard = 0;
        while let Some(name) = current {
            guard += 1;
            if guard > self.permissions.len() + 1 {
                return false; // malformed parent cycle
            }
            let Some(perm) = self.permissions.get(&name) else {
                return false;
            };
            if perm.authority.is_satisfied_by(present) {
                return true;
            }
            current = if perm.parent.is_empty() {
                None
            } else {
                Some(perm.parent)
            };
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(w: u16) -> KeyWeight {
        KeyWeight {
            key_hash: [0u8; 32],
            weight: w,
        }
    }

    #[test]
    fn threshold_met_by_summed_account_weights() {
        let mut auth = Authority::new(10);
        auth.accounts.push(AccountWeight {
            permission: PermissionLevel::new(Name::new(1), Name::new(100)),
            weight: 6,
        });
        auth.accounts.push(AccountWeight {
            permission: PermissionLevel::new(Name::new(2), Name::new(100)),
            weight: 5,
        });
        let present = vec![PermissionLevel::new(Name::new(1), Name::new(100))];
        assert!(!auth.is_satisfied_by(&present));
        let present = vec![
            PermissionLevel::new(Name::new(1), Name::new(100)),
            PermissionLevel::new(Name::new(2), Name::new(100)),
        ];
        assert!(auth.is_satisfied_by(&present));
    }

    #[test]
    fn active_satisfies_owner_requirement_via_parent_walk() {
        let mut account = Account::new(Name::new(1), 0);
        let mut owner_auth = Authority::new(1);
        owner_auth.accounts.push(AccountWeight {
            permission: PermissionLevel::new(Name::new(1), Name::new(200)),
            weight: 1,
        });
        account.permissions.insert(
            Name::new(200),
            Permission {
                name: Name::new(200),
                parent: Name::EMPTY,
                authority: owner_auth,
            },
        );
        let mut active_auth = Authority::new(1);
        active_auth.keys.push(key(1));
        account.permissions.insert(
            Name::new(100),
            Permission {
                name: Name::new(100),
                parent: Name::new(200),
                authority: active_auth,
            },
        );

        let present = vec![PermissionLevel::new(Name::new(1), Name::new(200))];
        assert!(account.satisfies(Name::new(100), &present));
    }

    #[test]
    fn missing_permission_fails_closed() {
        let account = Account::new(Name::new(1), 0);
        assert!(!account.satisfies(Name::new(999), &[]));
    }

    #[test]
    fn code_hash_is_zero_until_code_is_set() {
        let mut account = Account::new(Name::new(1), 0);
        assert_eq!(account.code_hash(), [0u8; 32]);
        assert_eq!(account.code_sequence, 0);
        account.set_code(vec![1, 2, 3]);
        assert_ne!(account.code_hash(), [0u8; 32]);
        assert_eq!(account.code_sequence, 1);
        account.set_code(vec![4, 5, 6]);
        assert_eq!(account.code_sequence, 2);
    }
}
