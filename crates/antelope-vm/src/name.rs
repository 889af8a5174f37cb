//! Account/action/table identifiers.
//!
//! The Antelope "name" is a 64-bit integer; callers that need the base-32
//! text form (`"eosio.token"`) own the ABI codec for it (spec §1, out of
//! scope here) and hand us the raw `u64`. Ordering and equality are
//! unsigned, but the WASM ABI boundary passes names as signed `i64` values
//! (spec §6), so [`Name`] carries both conversions.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Name(pub u64);

impl Name {
    pub const EMPTY: Name = Name(0);

    pub fn new(value: u64) -> Self {
        Name(value)
    }

    /// Construct from the signed 64-bit representation used at the WASM
    /// ABI boundary (spec §6: "the WASM linear ABI uses signed 64-bit ints").
    pub fn from_i64(value: i64) -> Self {
        Name(value as u64)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Two's-complement reinterpretation for return across the ABI boundary.
    pub fn as_i64(self) -> i64 {
        self.0 as i64
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Name {
    fn from(value: u64) -> Self {
        Name(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_unsigned_roundtrip() {
        let n = Name::new(u64::MAX);
        assert_eq!(Name::from_i64(n.as_i64()), n);
    }

    #[test]
    fn empty_is_zero() {
        assert!(Name::EMPTY.is_empty());
        assert!(!Name::new(1).is_empty());
    }

    #[test]
    fn ordering_is_unsigned() {
        let a = Name::new(1);
        let b = Name::new(u64::MAX);
        // b's signed i64 representation is negative; Name ordering must
        // stay unsigned regardless.
        assert!(a < b);
        assert!(b.as_i64() < 0);
    }
}
