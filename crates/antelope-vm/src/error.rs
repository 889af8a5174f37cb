//! Error kinds raised by host intrinsics.
//!
//! Every intrinsic in [`crate::host`] returns `Result<T, HostError>`. Unlike
//! the rest of this workspace's `Result<T, String>` convention, the
//! Dispatcher needs to pattern-match on *kind* (assertion vs. OOB memory vs.
//! unimplemented stub) to decide how to unwind, so this is a small closed
//! enum rather than a string.

use std::fmt;

/// A guest assertion or host precondition failure. Both unwind the current
/// action identically (spec §7): the distinction only matters for how the
/// message is rendered back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssertError {
    /// `eosio_assert`/`eosio_assert_message`, or any host-side precondition
    /// (duplicate primary key, payer == 0, access violation, ...).
    Message(String),
    /// `eosio_assert_code`.
    Code(u64),
}

impl fmt::Display for AssertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssertError::Message(msg) => write!(f, "assertion failure: {msg}"),
            AssertError::Code(code) => write!(f, "assertion failure with error code: {code}"),
        }
    }
}

/// Out-of-bounds or otherwise invalid guest linear-memory access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryError {
    pub offset: u64,
    pub len: u64,
    pub memory_size: u64,
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "out of bounds memory access: offset {} len {} memory size {}",
            self.offset, self.len, self.memory_size
        )
    }
}

/// Fatal outcome of a host intrinsic call. `eosio_exit` is deliberately NOT
/// a variant here — it is a clean return, modeled on `Context::exited`
/// (spec §4.5/§7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    Assert(AssertError),
    Memory(MemoryError),
    /// One of the intrinsics spec.md §6 lists as a trap (`send_deferred`,
    /// long-double helpers, 128-bit shifts, ...).
    NotImplemented(&'static str),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::Assert(e) => write!(f, "{e}"),
            HostError::Memory(e) => write!(f, "{e}"),
            HostError::NotImplemented(what) => write!(f, "not implemented: {what}"),
        }
    }
}

impl std::error::Error for HostError {}

impl From<MemoryError> for HostError {
    fn from(e: MemoryError) -> Self {
        HostError::Memory(e)
    }
}

impl HostError {
    pub fn assert_msg(msg: impl Into<String>) -> Self {
        HostError::Assert(AssertError::Message(msg.into()))
    }

    pub fn assert_code(code: u64) -> Self {
        HostError::Assert(AssertError::Code(code))
    }
}
