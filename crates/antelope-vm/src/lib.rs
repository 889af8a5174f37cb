// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ANTELOPE-VM
//
// An in-process host environment for executing EOSIO/Antelope-ABI smart
// contract WASM modules: the host-function import surface a contract's
// `apply` export calls into, a multi-index key-value store backing the
// database intrinsics, and the action dispatch pipeline that resolves
// authorizations and drains the notification/inline-action queues an
// action's execution produces.
//
// - `wasmer` for the guest linear-memory adapter (guest compilation itself
//   is an external collaborator's job, not this crate's — see Non-goals)
// - RustCrypto (`sha1`/`sha2`/`ripemd`/`sha3`) plus `k256`/`bn`/`num-bigint`
//   for the crypto intrinsics
// - Host functions bridge guest linear memory via the `GuestMemory` trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

// Provide __rust_probestack stub for wasmer-vm 4.x compatibility with
// Rust 1.85+ where this symbol was removed from compiler_builtins.
// Safe: the kernel provides guard pages for stack overflow on modern systems.
#[cfg(all(
    any(target_arch = "x86_64", target_arch = "aarch64"),
    any(target_os = "linux", target_os = "macos")
))]
#[no_mangle]
pub extern "C" fn __rust_probestack() {}

/// Accounts, permissions, and weighted-threshold authorities.
pub mod account;
/// Process-wide chain state: accounts, the multi-index store, clock,
/// activated features, and the retained per-action trace list.
pub mod blockchain;
/// `memmove`/`memset`/`memcpy` and 128-bit arithmetic helpers a wasm32
/// guest's compiler-rt would otherwise supply.
pub mod compiler_rt;
/// Per-action execution state: iterator cache, console buffer, and
/// queued inline/notification actions.
pub mod context;
/// Hashing, signature recovery, and the pairing/modexp primitives the
/// crypto intrinsics wrap.
pub mod crypto;
/// Action pipeline: authority checks, the guest `apply` call, and
/// recursive draining of the notification and inline-action queues.
pub mod dispatcher;
/// Error kinds raised by host intrinsics.
pub mod error;
/// Host functions: the intrinsic surface a guest's `apply` export calls
/// into (database, crypto, authorization, printing, control flow).
pub mod host;
/// Per-`Context` arena of live database iterator handles.
pub mod iterator_cache;
/// Guest linear memory access, abstracted over test and wasmer backends.
pub mod memory;
/// The 64-bit Antelope "name" identifier.
pub mod name;
/// Multi-index key-value store backing the database intrinsics.
pub mod store;

pub use account::{Account, AccountWeight, Authority, KeyWeight, Permission, PermissionLevel};
pub use blockchain::{Blockchain, Clock, FixedClock};
pub use context::{Action, ActionTrace, AmbientTransaction, Context};
pub use dispatcher::{Dispatcher, GuestContract};
pub use error::{AssertError, HostError, MemoryError};
pub use host::HostEnv;
pub use memory::{GuestMemory, LinearMemoryView, VecMemory, WasmerMemory};
pub use name::Name;
pub use store::{Checksum256, OrderedF64, SecondaryKey, Store, Table, TableId};
