//! `HostEnv`: the complete contract-intrinsic surface (spec §4.5, §6).
//!
//! Every intrinsic here operates against the currently installed
//! [`crate::context::Context`] and [`crate::blockchain::Blockchain`], and
//! touches guest memory only through [`LinearMemoryView`] — the one
//! component of this crate allowed to see all four of guest memory,
//! `Store`, `Context`, and the crypto primitives (spec §2). Grounded on
//! the teacher's `host.rs`: one free-standing function per intrinsic,
//! guest memory accessed through small bounded helpers, nothing held
//! beyond the duration of a single call.

use crate::account::PermissionLevel;
use crate::context::{Action, Context};
use crate::blockchain::Blockchain;
use crate::crypto;
use crate::error::HostError;
use crate::iterator_cache::RowRef;
use crate::memory::{GuestMemory, LinearMemoryView};
use crate::name::Name;
use crate::store::key::{Checksum256, OrderedF64};
use crate::store::table::{IndexEntry, SecondaryIndex, Table};
use crate::store::SecondaryKey;

/// Borrows the chain, the in-flight action's context, and the guest
/// memory for the duration of one intrinsic call (spec §4.5: "HostEnv
/// ... the only component that touches guest memory, Store, Context, and
/// crypto").
pub struct HostEnv<'a> {
    pub chain: &'a mut Blockchain,
    pub context: &'a mut Context,
    pub memory: &'a mut dyn GuestMemory,
}

impl<'a> HostEnv<'a> {
    pub fn new(
        chain: &'a mut Blockchain,
        context: &'a mut Context,
        memory: &'a mut dyn GuestMemory,
    ) -> Self {
        HostEnv {
            chain,
            context,
            memory,
        }
    }

    fn mem(&mut self) -> LinearMemoryView<'_> {
        LinearMemoryView::new(&mut *self.memory)
    }

    // ---------------------------------------------------------------
    // Action introspection
    // ---------------------------------------------------------------

    /// `read_action_data(buf, len)`: `len==0` returns the payload length
    /// without copying (spec §4.5's "size idiom", used throughout §6).
    pub fn read_action_data(&mut self, buf: u32, len: u32) -> Result<u32, HostError> {
        if len == 0 {
            return Ok(self.context.data.len() as u32);
        }
        let n = len.min(self.context.data.len() as u32);
        let data = self.context.data[..n as usize].to_vec();
        self.mem().write_slice(buf, &data)?;
        Ok(n)
    }

    pub fn action_data_size(&self) -> u32 {
        self.context.data.len() as u32
    }

    pub fn current_receiver(&self) -> i64 {
        self.context.receiver.as_i64()
    }

    /// Zero when this action is not inline (spec §4.5: "signed 64-bit
    /// reinterpretation of the inline sender's Name (zero when not
    /// inline)").
    pub fn get_sender(&self) -> i64 {
        self.context.sender.as_i64()
    }

    pub fn set_action_return_value(&mut self, ptr: u32, len: u32) -> Result<(), HostError> {
        let bytes = self.mem().slice(ptr, len)?;
        self.context.return_value = bytes;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Authorization
    // ---------------------------------------------------------------

    /// `require_auth(name)`: fails unless `authorization` carries `name`
    /// under `active` or `owner` (spec §4.5).
    pub fn require_auth(&self, name: Name) -> Result<(), HostError> {
        let ok = self.context.authorization.iter().any(|p| {
            p.actor == name && (p.permission == active_name() || p.permission == owner_name())
        });
        if ok {
            Ok(())
        } else {
            Err(HostError::assert_msg(format!(
                "missing authority of {name}"
            )))
        }
    }

    pub fn has_auth(&self, name: Name) -> bool {
        self.require_auth(name).is_ok()
    }

    pub fn require_auth2(&self, name: Name, permission: Name) -> Result<(), HostError> {
        let ok = self
            .context
            .authorization
            .iter()
            .any(|p| p.actor == name && p.permission == permission);
        if ok {
            Ok(())
        } else {
            Err(HostError::assert_msg(format!(
                "missing authority of {name}/{permission}"
            )))
        }
    }

    pub fn is_account(&self, name: Name) -> bool {
        self.chain.is_account(name)
    }

    /// `get_code_hash(name, struct_version, out_ptr)`. `struct_version =
    /// min(0, v)` preserved verbatim per spec §9 Open Questions — this
    /// suppresses any non-zero positive version to 0 but passes negative
    /// inputs through unchanged, which looks inverted from the probably
    /// intended `max(0, v)`. Not "fixed" here.
    pub fn get_code_hash(&mut self, name: Name, struct_version: i32, out_ptr: u32) -> Result<(), HostError> {
        let account = self
            .chain
            .account(name)
            .ok_or_else(|| HostError::assert_msg(format!("unknown account {name}")))?;
        let clamped_version = struct_version.min(0);
        let hash = account.code_hash();
        let code_sequence = account.code_sequence;

        let mut out = Vec::with_capacity(4 + 4 + 32 + 4 + 4);
        out.extend_from_slice(&clamped_version.to_le_bytes());
        out.extend_from_slice(&code_sequence.to_le_bytes());
        out.extend_from_slice(&hash);
        out.extend_from_slice(&0u32.to_le_bytes()); // vm_type
        out.extend_from_slice(&0u32.to_le_bytes()); // vm_version
        self.mem().write_slice(out_ptr, &out)?;
        Ok(())
    }

    pub fn get_account_creation_time(&self, name: Name) -> Result<u64, HostError> {
        self.chain
            .account(name)
            .map(|a| a.creation_time)
            .ok_or_else(|| HostError::assert_msg(format!("unknown account {name}")))
    }

    // ---------------------------------------------------------------
    // Crypto
    // ---------------------------------------------------------------

    pub fn sha1(&mut self, data_ptr: u32, data_len: u32, out_ptr: u32) -> Result<(), HostError> {
        let data = self.mem().slice(data_ptr, data_len)?;
        self.mem().write_slice(out_ptr, &crypto::sha1_hash(&data))?;
        Ok(())
    }

    pub fn sha256(&mut self, data_ptr: u32, data_len: u32, out_ptr: u32) -> Result<(), HostError> {
        let data = self.mem().slice(data_ptr, data_len)?;
        self.mem().write_slice(out_ptr, &crypto::sha256(&data))?;
        Ok(())
    }

    pub fn sha512(&mut self, data_ptr: u32, data_len: u32, out_ptr: u32) -> Result<(), HostError> {
        let data = self.mem().slice(data_ptr, data_len)?;
        self.mem().write_slice(out_ptr, &crypto::sha512(&data))?;
        Ok(())
    }

    pub fn ripemd160(&mut self, data_ptr: u32, data_len: u32, out_ptr: u32) -> Result<(), HostError> {
        let data = self.mem().slice(data_ptr, data_len)?;
        self.mem().write_slice(out_ptr, &crypto::ripemd160(&data))?;
        Ok(())
    }

    fn assert_hash(
        &mut self,
        data_ptr: u32,
        data_len: u32,
        expected_ptr: u32,
        expected_len: u32,
        compute: impl Fn(&[u8]) -> Vec<u8>,
    ) -> Result<(), HostError> {
        let data = self.mem().slice(data_ptr, data_len)?;
        let expected = self.mem().slice(expected_ptr, expected_len)?;
        let actual = compute(&data);
        if actual == expected {
            Ok(())
        } else {
            Err(HostError::assert_msg("hash mismatch"))
        }
    }

    pub fn assert_sha1(&mut self, data_ptr: u32, data_len: u32, hash_ptr: u32) -> Result<(), HostError> {
        self.assert_hash(data_ptr, data_len, hash_ptr, 20, |d| crypto::sha1_hash(d).to_vec())
    }

    pub fn assert_sha256(&mut self, data_ptr: u32, data_len: u32, hash_ptr: u32) -> Result<(), HostError> {
        self.assert_hash(data_ptr, data_len, hash_ptr, 32, |d| crypto::sha256(d).to_vec())
    }

    pub fn assert_sha512(&mut self, data_ptr: u32, data_len: u32, hash_ptr: u32) -> Result<(), HostError> {
        self.assert_hash(data_ptr, data_len, hash_ptr, 64, |d| crypto::sha512(d).to_vec())
    }

    pub fn assert_ripemd160(&mut self, data_ptr: u32, data_len: u32, hash_ptr: u32) -> Result<(), HostError> {
        self.assert_hash(data_ptr, data_len, hash_ptr, 20, |d| crypto::ripemd160(d).to_vec())
    }

    pub fn sha3(
        &mut self,
        data_ptr: u32,
        data_len: u32,
        out_ptr: u32,
        out_len: u32,
        keccak: bool,
    ) -> Result<(), HostError> {
        let data = self.mem().slice(data_ptr, data_len)?;
        let digest = crypto::sha3(&data, out_len as usize, keccak);
        self.mem().write_slice(out_ptr, &digest)?;
        Ok(())
    }

    pub fn blake2_f(
        &mut self,
        rounds: u32,
        h_ptr: u32,
        m_ptr: u32,
        t0: u64,
        t1: u64,
        final_block: bool,
        out_ptr: u32,
    ) -> Result<(), HostError> {
        let mut h = [0u64; 8];
        for (i, slot) in h.iter_mut().enumerate() {
            *slot = self.mem().read_u64(h_ptr + (i as u32) * 8)?;
        }
        let mut m = [0u64; 16];
        for (i, slot) in m.iter_mut().enumerate() {
            *slot = self.mem().read_u64(m_ptr + (i as u32) * 8)?;
        }
        crypto::blake2_f(rounds, &mut h, &m, [t0, t1], final_block);
        let mut out = Vec::with_capacity(64);
        for word in h {
            out.extend_from_slice(&word.to_le_bytes());
        }
        self.mem().write_slice(out_ptr, &out)?;
        Ok(())
    }

    pub fn alt_bn128_add(&mut self, p1_ptr: u32, p2_ptr: u32, out_ptr: u32) -> Result<i32, HostError> {
        let p1: [u8; 64] = self.mem().slice(p1_ptr, 64)?.try_into().unwrap();
        let p2: [u8; 64] = self.mem().slice(p2_ptr, 64)?.try_into().unwrap();
        match crypto::alt_bn128_add(&p1, &p2) {
            Some(out) => {
                self.mem().write_slice(out_ptr, &out)?;
                Ok(0)
            }
            None => Ok(-1),
        }
    }

    pub fn alt_bn128_mul(&mut self, point_ptr: u32, scalar_ptr: u32, out_ptr: u32) -> Result<i32, HostError> {
        let point: [u8; 64] = self.mem().slice(point_ptr, 64)?.try_into().unwrap();
        let scalar: [u8; 32] = self.mem().slice(scalar_ptr, 32)?.try_into().unwrap();
        match crypto::alt_bn128_mul(&point, &scalar) {
            Some(out) => {
                self.mem().write_slice(out_ptr, &out)?;
                Ok(0)
            }
            None => Ok(-1),
        }
    }

    /// Returns `1` when the pairing product equals the identity, `0`
    /// otherwise, `-1` on malformed input — the sense spec §9 Open
    /// Questions preserves verbatim rather than flips to match raw
    /// EIP-197 ("opposite of EIP-197's convention" — kept as-is).
    pub fn alt_bn128_pair(&mut self, pairs_ptr: u32, pairs_len: u32) -> Result<i32, HostError> {
        let pairs = self.mem().slice(pairs_ptr, pairs_len)?;
        match crypto::alt_bn128_pair(&pairs) {
            Some(true) => Ok(1),
            Some(false) => Ok(0),
            None => Ok(-1),
        }
    }

    pub fn mod_exp(
        &mut self,
        base_ptr: u32,
        base_len: u32,
        exp_ptr: u32,
        exp_len: u32,
        mod_ptr: u32,
        mod_len: u32,
        out_ptr: u32,
    ) -> Result<i32, HostError> {
        let base = self.mem().slice(base_ptr, base_len)?;
        let exp = self.mem().slice(exp_ptr, exp_len)?;
        let modulus = self.mem().slice(mod_ptr, mod_len)?;
        if modulus.iter().all(|&b| b == 0) {
            return Ok(-1);
        }
        let mut result = crypto::mod_exp(&base, &exp, &modulus);
        if result.len() < mod_len as usize {
            let mut padded = vec![0u8; mod_len as usize - result.len()];
            padded.append(&mut result);
            result = padded;
        }
        self.mem().write_slice(out_ptr, &result)?;
        Ok(0)
    }

    /// `recover_key`: compact-signature layout — version byte (unused
    /// here, EOSIO's own K1 tag), then a 1-byte recid offset `(v-27)&0x3`,
    /// then `r || s` (spec §4.5).
    pub fn recover_key(
        &mut self,
        digest_ptr: u32,
        sig_ptr: u32,
        out_ptr: u32,
    ) -> Result<u32, HostError> {
        let digest: [u8; 32] = self.mem().slice(digest_ptr, 32)?.try_into().unwrap();
        let sig = self.mem().slice(sig_ptr, 66)?; // version + recid + r(32) + s(32)
        let recid = sig[1] & 0x3;
        let r: [u8; 32] = sig[2..34].try_into().unwrap();
        let s: [u8; 32] = sig[34..66].try_into().unwrap();
        let key = crypto::recover_key(&digest, recid, &r, &s)
            .ok_or_else(|| HostError::assert_msg("invalid signature"))?;
        self.mem().write_slice(out_ptr, &key)?;
        Ok(key.len() as u32)
    }

    pub fn assert_recover_key(
        &mut self,
        digest_ptr: u32,
        sig_ptr: u32,
        expected_ptr: u32,
    ) -> Result<(), HostError> {
        let digest: [u8; 32] = self.mem().slice(digest_ptr, 32)?.try_into().unwrap();
        let sig = self.mem().slice(sig_ptr, 66)?;
        let recid = sig[1] & 0x3;
        let r: [u8; 32] = sig[2..34].try_into().unwrap();
        let s: [u8; 32] = sig[34..66].try_into().unwrap();
        let expected = self.mem().slice(expected_ptr, 65)?;
        let recovered = crypto::recover_key(&digest, recid, &r, &s)
            .ok_or_else(|| HostError::assert_msg("invalid signature"))?;
        if recovered == expected {
            Ok(())
        } else {
            Err(HostError::assert_msg("recovered key does not match"))
        }
    }

    /// `k1_recover`: Ethereum-style layout — `v` in `[27,35)` then 32-byte
    /// `r` then 32-byte `s`. Returns 0 and writes the recovered key on
    /// success, -1 otherwise (spec §4.5).
    pub fn k1_recover(
        &mut self,
        sig_ptr: u32,
        digest_ptr: u32,
        out_ptr: u32,
        out_len: u32,
    ) -> Result<i32, HostError> {
        let sig = self.mem().slice(sig_ptr, 65)?;
        let digest: [u8; 32] = self.mem().slice(digest_ptr, 32)?.try_into().unwrap();
        let v = sig[0];
        let r: [u8; 32] = sig[1..33].try_into().unwrap();
        let s: [u8; 32] = sig[33..65].try_into().unwrap();
        match crypto::k1_recover(&digest, v, &r, &s) {
            Some(key) => {
                let n = (out_len as usize).min(key.len());
                self.mem().write_slice(out_ptr, &key[..n])?;
                Ok(0)
            }
            None => Ok(-1),
        }
    }

    // ---------------------------------------------------------------
    // Printing
    // ---------------------------------------------------------------

    /// All `prints*`/`print*` intrinsics funnel through here (spec §6):
    /// append to the action's console, except the `$vertPrintStorage`
    /// debug token, which dumps the store to stderr instead.
    fn print(&mut self, text: &str) {
        if text == "$vertPrintStorage" {
            self.chain.store.debug_dump();
            return;
        }
        self.context.console.push_str(text);
    }

    pub fn prints(&mut self, ptr: u32) -> Result<(), HostError> {
        let s = self.mem().read_cstr(ptr, None)?;
        self.print(&s);
        Ok(())
    }

    pub fn prints_l(&mut self, ptr: u32, len: u32) -> Result<(), HostError> {
        let s = self.mem().read_str(ptr, len)?;
        self.print(&s);
        Ok(())
    }

    pub fn printi(&mut self, value: i64) {
        self.print(&value.to_string());
    }

    pub fn printui(&mut self, value: u64) {
        self.print(&value.to_string());
    }

    pub fn printi128(&mut self, value: i128) {
        self.print(&value.to_string());
    }

    pub fn printui128(&mut self, value: u128) {
        self.print(&value.to_string());
    }

    pub fn printsf(&mut self, value: f32) {
        self.print(&value.to_string());
    }

    pub fn printdf(&mut self, value: f64) {
        self.print(&value.to_string());
    }

    pub fn printqf(&mut self, value: f64) {
        // long double has no native Rust type; render as f64 (spec treats
        // long-double *arithmetic* as unsupported, not this diagnostic).
        self.print(&value.to_string());
    }

    pub fn printn(&mut self, name: Name) {
        self.print(&name.to_string());
    }

    pub fn printhex(&mut self, ptr: u32, len: u32) -> Result<(), HostError> {
        let bytes = self.mem().slice(ptr, len)?;
        self.print(&hex::encode(bytes));
        Ok(())
    }

    // ---------------------------------------------------------------
    // Assertion / control
    // ---------------------------------------------------------------

    pub fn eosio_assert(&mut self, test: i32, msg_ptr: u32) -> Result<(), HostError> {
        if test != 0 {
            return Ok(());
        }
        let msg = self.mem().read_cstr(msg_ptr, None)?;
        Err(HostError::assert_msg(msg))
    }

    pub fn eosio_assert_message(&mut self, test: i32, msg_ptr: u32, msg_len: u32) -> Result<(), HostError> {
        if test != 0 {
            return Ok(());
        }
        let msg = self.mem().read_str(msg_ptr, msg_len)?;
        Err(HostError::assert_msg(msg))
    }

    pub fn eosio_assert_code(&mut self, test: i32, code: u64) -> Result<(), HostError> {
        if test != 0 {
            Ok(())
        } else {
            Err(HostError::assert_code(code))
        }
    }

    /// Terminates the guest call cleanly (spec §7: "not an error; return
    /// normally"). The Dispatcher checks `Context.exited` after the
    /// guest call returns rather than treating this as a `HostError`.
    pub fn eosio_exit(&mut self, code: i32) {
        self.context.exited = Some(code);
    }

    // ---------------------------------------------------------------
    // Chain / transaction
    // ---------------------------------------------------------------

    pub fn current_time(&self) -> u64 {
        self.chain.clock.now_micros()
    }

    pub fn get_block_num(&self) -> u32 {
        self.chain.clock.block_num()
    }

    pub fn is_feature_activated(&mut self, digest_ptr: u32) -> Result<bool, HostError> {
        let bytes = self.mem().slice(digest_ptr, 32)?;
        let digest: [u8; 32] = bytes.try_into().unwrap();
        Ok(self.chain.is_feature_activated(&digest))
    }

    /// `read_transaction(buf, len)`: same `len==0` size idiom as
    /// `read_action_data` (spec §4.5), copying from the ambient
    /// Transaction's caller-supplied opaque bytes rather than anything
    /// this crate encodes itself (spec §1 Non-goal: the Antelope
    /// primitive codec).
    pub fn read_transaction(&mut self, buf: u32, len: u32) -> Result<u32, HostError> {
        let raw_len = self.context.transaction.raw.len() as u32;
        if len == 0 {
            return Ok(raw_len);
        }
        let n = len.min(raw_len);
        let data = self.context.transaction.raw[..n as usize].to_vec();
        self.mem().write_slice(buf, &data)?;
        Ok(n)
    }

    pub fn transaction_size(&self) -> u32 {
        self.context.transaction.raw.len() as u32
    }

    pub fn tapos_block_num(&self) -> u32 {
        self.context.transaction.tapos_block_num
    }

    pub fn tapos_block_prefix(&self) -> u32 {
        self.context.transaction.tapos_block_prefix
    }

    pub fn expiration(&self) -> u32 {
        self.context.transaction.expiration
    }

    /// `get_action(kind, index, buf, buf_len)`: `kind==0` selects
    /// context-free actions, `kind==1` selects normal actions (spec
    /// §4.5). Returns `-1` when `index` is out of range for the
    /// selected list. The action is serialized with `serde_json` rather
    /// than the real Antelope wire format — that codec stays out of
    /// scope (spec §1) the same way `read_transaction`'s `raw` bytes are
    /// opaque; callers that need the genuine binary shape pass it
    /// through `raw` themselves and read it back via `read_transaction`.
    pub fn get_action(&mut self, kind: u32, index: u32, buf: u32, buf_len: u32) -> Result<i64, HostError> {
        let list = if kind == 0 {
            &self.context.transaction.context_free_actions
        } else {
            &self.context.transaction.actions
        };
        let Some(action) = list.get(index as usize) else {
            return Ok(-1);
        };
        let encoded = serde_json::to_vec(action).expect("Action serialization is infallible");
        if buf_len == 0 {
            return Ok(encoded.len() as i64);
        }
        let n = (buf_len as usize).min(encoded.len());
        self.mem().write_slice(buf, &encoded[..n])?;
        Ok(n as i64)
    }

    // ---------------------------------------------------------------
    // Notifications / inline actions (spec §4.6)
    // ---------------------------------------------------------------

    /// `require_recipient`: no-op for self, an already-notified account,
    /// or a non-contract recipient — spec §4.6: "self-notification and
    /// non-contract recipients are silently skipped". `Context::require_recipient`
    /// only knows about self/dedup; the contract-existence check needs
    /// `Blockchain`, so it lives here.
    pub fn require_recipient(&mut self, account: Name) {
        let is_contract = self
            .chain
            .account(account)
            .is_some_and(|a| a.code.is_some());
        if !is_contract {
            return;
        }
        self.context.require_recipient(account);
    }

    /// `send_inline`: the target must exist and must have declared this
    /// action in its ABI (spec §4.6). The ABI *text* parser is out of
    /// scope (spec §1); this crate tracks `Account::declared_actions` as
    /// the minimal stand-in the dispatcher needs.
    pub fn send_inline(
        &mut self,
        target: Name,
        action_name: Name,
        authorization: Vec<PermissionLevel>,
        data: Vec<u8>,
    ) -> Result<(), HostError> {
        let account = self
            .chain
            .account(target)
            .ok_or_else(|| HostError::assert_msg(format!("inline action sent to unknown account {target}")))?;
        if !account.declared_actions.contains(&action_name) {
            return Err(HostError::assert_msg(format!(
                "{target} does not declare action {action_name}"
            )));
        }
        self.context.send_inline(Action {
            account: target,
            name: action_name,
            authorization,
            data,
        });
        Ok(())
    }

    // ---------------------------------------------------------------
    // Database — primary index (db_*_i64)
    // ---------------------------------------------------------------

    pub fn db_store_i64(
        &mut self,
        scope: Name,
        table: Name,
        payer: Name,
        id: u64,
        data_ptr: u32,
        data_len: u32,
    ) -> Result<i64, HostError> {
        if payer.is_empty() {
            return Err(HostError::assert_msg("cannot create row with payer == 0"));
        }
        let data = self.mem().slice(data_ptr, data_len)?;
        let code = self.context.receiver;
        let table_id = self.chain.store.get_or_create_table_id(code, scope, table);
        let t = self.chain.store.table_mut(table_id).unwrap();
        if t.primary.contains_key(&id) {
            return Err(HostError::assert_msg(format!(
                "primary key {id} already exists"
            )));
        }
        t.primary.insert(
            id,
            crate::store::table::Row {
                primary_key: id,
                payer,
                value: data,
            },
        );
        let handle = self.context.iterators.add(RowRef {
            table_id,
            primary_key: id,
        });
        Ok(handle)
    }

    fn primary_row_ref(&self, iter: i64) -> Result<RowRef, HostError> {
        self.context
            .iterators
            .get(iter)
            .ok_or_else(|| HostError::assert_msg("invalid iterator"))
    }

    pub fn db_update_i64(
        &mut self,
        iter: i64,
        payer: Name,
        data_ptr: u32,
        data_len: u32,
    ) -> Result<(), HostError> {
        let row_ref = self.primary_row_ref(iter)?;
        let data = self.mem().slice(data_ptr, data_len)?;
        let table = self
            .chain
            .store
            .table_mut(row_ref.table_id)
            .ok_or_else(|| HostError::assert_msg("table no longer exists"))?;
        if table.code != self.context.receiver {
            return Err(HostError::assert_msg("only the table's code can update it"));
        }
        let row = table
            .primary
            .get_mut(&row_ref.primary_key)
            .ok_or_else(|| HostError::assert_msg("row no longer exists"))?;
        row.value = data;
        if !payer.is_empty() {
            row.payer = payer;
        }
        Ok(())
    }

    pub fn db_remove_i64(&mut self, iter: i64) -> Result<(), HostError> {
        let row_ref = self.primary_row_ref(iter)?;
        let table = self
            .chain
            .store
            .table_mut(row_ref.table_id)
            .ok_or_else(|| HostError::assert_msg("table no longer exists"))?;
        if table.code != self.context.receiver {
            return Err(HostError::assert_msg("only the table's code can remove from it"));
        }
        table.erase(row_ref.primary_key);
        self.context.iterators.remove(iter);
        Ok(())
    }

    /// `db_get_i64(iter, data, len)`: `len==0` returns the size only.
    pub fn db_get_i64(&mut self, iter: i64, data_ptr: u32, len: u32) -> Result<u32, HostError> {
        let row_ref = self.primary_row_ref(iter)?;
        let table = self
            .chain
            .store
            .table(row_ref.table_id)
            .ok_or_else(|| HostError::assert_msg("table no longer exists"))?;
        let row = table
            .primary
            .get(&row_ref.primary_key)
            .ok_or_else(|| HostError::assert_msg("row no longer exists"))?;
        if len == 0 {
            return Ok(row.value.len() as u32);
        }
        let n = len.min(row.value.len() as u32);
        let bytes = row.value[..n as usize].to_vec();
        self.mem().write_slice(data_ptr, &bytes)?;
        Ok(n)
    }

    pub fn db_next_i64(&mut self, iter: i64) -> i64 {
        self.step_primary(iter, Direction::Next)
    }

    pub fn db_previous_i64(&mut self, iter: i64) -> i64 {
        self.step_primary(iter, Direction::Prev)
    }

    fn step_primary(&mut self, iter: i64, dir: Direction) -> i64 {
        let table_id = match self.context.iterators.table_of(iter) {
            Some(t) => t,
            None => return -1,
        };
        let Some(table) = self.chain.store.table(table_id) else {
            return -1;
        };
        let stepped = match (dir, self.context.iterators.get(iter)) {
            (Direction::Next, Some(row_ref)) => table.next(row_ref.primary_key),
            (Direction::Prev, Some(row_ref)) => table.prev(row_ref.primary_key),
            (Direction::Next, None) => {
                // iter is an end sentinel: next(end) == -1 (spec §4.5).
                return -1;
            }
            (Direction::Prev, None) => table.penultimate(),
        };
        match stepped {
            Some(row) => {
                let primary_key = row.primary_key;
                self.context
                    .iterators
                    .add(RowRef { table_id, primary_key })
            }
            None => match dir {
                Direction::Next => self.context.iterators.cache_table(table_id),
                Direction::Prev => -1,
            },
        }
    }

    pub fn db_find_i64(&mut self, code: Name, scope: Name, table: Name, id: u64) -> i64 {
        let Some(table_id) = self.chain.store.find_table_id(code, scope, table) else {
            return -1;
        };
        let found = self
            .chain
            .store
            .table(table_id)
            .and_then(|t| t.primary.get(&id));
        match found {
            Some(_) => self.context.iterators.add(RowRef {
                table_id,
                primary_key: id,
            }),
            None => self.context.iterators.cache_table(table_id),
        }
    }

    pub fn db_lowerbound_i64(&mut self, code: Name, scope: Name, table: Name, id: u64) -> i64 {
        self.primary_bound(code, scope, table, id, Table::lower_bound)
    }

    pub fn db_upperbound_i64(&mut self, code: Name, scope: Name, table: Name, id: u64) -> i64 {
        self.primary_bound(code, scope, table, id, Table::upper_bound)
    }

    fn primary_bound(
        &mut self,
        code: Name,
        scope: Name,
        table: Name,
        id: u64,
        bound: impl Fn(&Table, u64) -> Option<&crate::store::table::Row>,
    ) -> i64 {
        let Some(table_id) = self.chain.store.find_table_id(code, scope, table) else {
            return -1;
        };
        let Some(t) = self.chain.store.table(table_id) else {
            return -1;
        };
        match bound(t, id) {
            Some(row) => {
                let primary_key = row.primary_key;
                self.context.iterators.add(RowRef { table_id, primary_key })
            }
            None => self.context.iterators.cache_table(table_id),
        }
    }

    pub fn db_end_i64(&mut self, code: Name, scope: Name, table: Name) -> i64 {
        match self.chain.store.find_table_id(code, scope, table) {
            Some(table_id) => self.context.iterators.cache_table(table_id),
            None => -1,
        }
    }

    // ---------------------------------------------------------------
    // Database — secondary indices (idx64 / idx128 / idx256 / idx_double)
    // ---------------------------------------------------------------

    fn secondary_store(
        &mut self,
        scope: Name,
        table: Name,
        payer: Name,
        id: u64,
        key: SecondaryKey,
        select: impl Fn(&mut Table) -> &mut SecondaryIndex,
    ) -> Result<i64, HostError> {
        if payer.is_empty() {
            return Err(HostError::assert_msg("cannot create row with payer == 0"));
        }
        let code = self.context.receiver;
        let table_id = self.chain.store.get_or_create_table_id(code, scope, table);
        let t = self.chain.store.table_mut(table_id).unwrap();
        select(t).set(id, payer, key);
        Ok(self.context.iterators.add(RowRef {
            table_id,
            primary_key: id,
        }))
    }

    fn secondary_update(
        &mut self,
        iter: i64,
        payer: Name,
        key: SecondaryKey,
        select: impl Fn(&mut Table) -> &mut SecondaryIndex,
    ) -> Result<(), HostError> {
        let row_ref = self.primary_row_ref(iter)?;
        let table = self
            .chain
            .store
            .table_mut(row_ref.table_id)
            .ok_or_else(|| HostError::assert_msg("table no longer exists"))?;
        if table.code != self.context.receiver {
            return Err(HostError::assert_msg("only the table's code can update it"));
        }
        let existing_payer = select(table)
            .get_by_primary(row_ref.primary_key)
            .map(|e| e.payer)
            .ok_or_else(|| HostError::assert_msg("secondary entry no longer exists"))?;
        let payer = if payer.is_empty() { existing_payer } else { payer };
        select(table).set(row_ref.primary_key, payer, key);
        Ok(())
    }

    fn secondary_remove(
        &mut self,
        iter: i64,
        select: impl Fn(&mut Table) -> &mut SecondaryIndex,
    ) -> Result<(), HostError> {
        let row_ref = self.primary_row_ref(iter)?;
        let table = self
            .chain
            .store
            .table_mut(row_ref.table_id)
            .ok_or_else(|| HostError::assert_msg("table no longer exists"))?;
        if table.code != self.context.receiver {
            return Err(HostError::assert_msg("only the table's code can remove from it"));
        }
        select(table).delete(row_ref.primary_key);
        self.context.iterators.remove(iter);
        Ok(())
    }

    fn secondary_find(
        &mut self,
        code: Name,
        scope: Name,
        table: Name,
        key: SecondaryKey,
        select: impl Fn(&Table) -> &SecondaryIndex,
    ) -> i64 {
        let Some(table_id) = self.chain.store.find_table_id(code, scope, table) else {
            return -1;
        };
        let found = self
            .chain
            .store
            .table(table_id)
            .and_then(|t| select(t).get_exact_secondary(key))
            .map(|e| e.primary_key);
        match found {
            Some(primary_key) => self.context.iterators.add(RowRef { table_id, primary_key }),
            None => self.context.iterators.cache_table(table_id),
        }
    }

    /// `find_primary`: looks up by primary key and writes the row's
    /// current secondary key back into the caller's buffer on success
    /// (spec §4.5).
    fn secondary_find_primary(
        &mut self,
        code: Name,
        scope: Name,
        table: Name,
        id: u64,
        select: impl Fn(&Table) -> &SecondaryIndex,
    ) -> Option<(i64, SecondaryKey)> {
        let table_id = self.chain.store.find_table_id(code, scope, table)?;
        let t = self.chain.store.table(table_id)?;
        let entry = select(t).get_by_primary(id)?;
        let key = entry.secondary_key;
        let handle = self
            .context
            .iterators
            .add(RowRef { table_id, primary_key: id });
        Some((handle, key))
    }

    fn secondary_bound(
        &mut self,
        code: Name,
        scope: Name,
        table: Name,
        key: SecondaryKey,
        select: impl Fn(&Table) -> &SecondaryIndex,
        bound: impl Fn(&SecondaryIndex, SecondaryKey) -> Option<IndexEntry>,
    ) -> i64 {
        let Some(table_id) = self.chain.store.find_table_id(code, scope, table) else {
            return -1;
        };
        let Some(t) = self.chain.store.table(table_id) else {
            return -1;
        };
        match bound(select(t), key) {
            Some(entry) => self.context.iterators.add(RowRef {
                table_id,
                primary_key: entry.primary_key,
            }),
            None => self.context.iterators.cache_table(table_id),
        }
    }

    fn secondary_end(&mut self, code: Name, scope: Name, table: Name) -> i64 {
        self.db_end_i64(code, scope, table)
    }

    fn secondary_step(
        &mut self,
        iter: i64,
        dir: Direction,
        select: impl Fn(&Table) -> &SecondaryIndex,
    ) -> i64 {
        let table_id = match self.context.iterators.table_of(iter) {
            Some(t) => t,
            None => return -1,
        };
        let Some(table) = self.chain.store.table(table_id) else {
            return -1;
        };
        let idx = select(table);
        let current = self.context.iterators.get(iter).and_then(|r| idx.get_by_primary(r.primary_key).copied());
        let stepped = match (dir, current) {
            (Direction::Next, Some(entry)) => idx.next(&entry).copied(),
            (Direction::Prev, Some(entry)) => idx.prev(&entry).copied(),
            (Direction::Next, None) => return -1,
            (Direction::Prev, None) => idx.penultimate().copied(),
        };
        match stepped {
            Some(entry) => self.context.iterators.add(RowRef {
                table_id,
                primary_key: entry.primary_key,
            }),
            None => match dir {
                Direction::Next => self.context.iterators.cache_table(table_id),
                Direction::Prev => -1,
            },
        }
    }

    // idx64
    pub fn db_idx64_store(&mut self, scope: Name, table: Name, payer: Name, id: u64, secondary: u64) -> Result<i64, HostError> {
        self.secondary_store(scope, table, payer, id, SecondaryKey::U64(secondary), |t| &mut t.idx64)
    }
    pub fn db_idx64_update(&mut self, iter: i64, payer: Name, secondary: u64) -> Result<(), HostError> {
        self.secondary_update(iter, payer, SecondaryKey::U64(secondary), |t| &mut t.idx64)
    }
    pub fn db_idx64_remove(&mut self, iter: i64) -> Result<(), HostError> {
        self.secondary_remove(iter, |t| &mut t.idx64)
    }
    pub fn db_idx64_find_secondary(&mut self, code: Name, scope: Name, table: Name, secondary: u64) -> i64 {
        self.secondary_find(code, scope, table, SecondaryKey::U64(secondary), |t| &t.idx64)
    }
    pub fn db_idx64_find_primary(&mut self, code: Name, scope: Name, table: Name, id: u64) -> Option<(i64, u64)> {
        self.secondary_find_primary(code, scope, table, id, |t| &t.idx64)
            .map(|(h, k)| (h, k.as_u64().unwrap()))
    }
    pub fn db_idx64_lowerbound(&mut self, code: Name, scope: Name, table: Name, secondary: u64) -> i64 {
        self.secondary_bound(code, scope, table, SecondaryKey::U64(secondary), |t| &t.idx64, |idx, k| idx.lower_bound(k).copied())
    }
    pub fn db_idx64_upperbound(&mut self, code: Name, scope: Name, table: Name, secondary: u64) -> i64 {
        self.secondary_bound(code, scope, table, SecondaryKey::U64(secondary), |t| &t.idx64, |idx, k| idx.upper_bound(k).copied())
    }
    pub fn db_idx64_end(&mut self, code: Name, scope: Name, table: Name) -> i64 {
        self.secondary_end(code, scope, table)
    }
    pub fn db_idx64_next(&mut self, iter: i64) -> i64 {
        self.secondary_step(iter, Direction::Next, |t| &t.idx64)
    }
    pub fn db_idx64_previous(&mut self, iter: i64) -> i64 {
        self.secondary_step(iter, Direction::Prev, |t| &t.idx64)
    }

    // idx128
    pub fn db_idx128_store(&mut self, scope: Name, table: Name, payer: Name, id: u64, secondary: u128) -> Result<i64, HostError> {
        self.secondary_store(scope, table, payer, id, SecondaryKey::U128(secondary), |t| &mut t.idx128)
    }
    pub fn db_idx128_update(&mut self, iter: i64, payer: Name, secondary: u128) -> Result<(), HostError> {
        self.secondary_update(iter, payer, SecondaryKey::U128(secondary), |t| &mut t.idx128)
    }
    pub fn db_idx128_remove(&mut self, iter: i64) -> Result<(), HostError> {
        self.secondary_remove(iter, |t| &mut t.idx128)
    }
    pub fn db_idx128_find_secondary(&mut self, code: Name, scope: Name, table: Name, secondary: u128) -> i64 {
        self.secondary_find(code, scope, table, SecondaryKey::U128(secondary), |t| &t.idx128)
    }
    pub fn db_idx128_find_primary(&mut self, code: Name, scope: Name, table: Name, id: u64) -> Option<(i64, u128)> {
        self.secondary_find_primary(code, scope, table, id, |t| &t.idx128)
            .map(|(h, k)| (h, k.as_u128().unwrap()))
    }
    pub fn db_idx128_lowerbound(&mut self, code: Name, scope: Name, table: Name, secondary: u128) -> i64 {
        self.secondary_bound(code, scope, table, SecondaryKey::U128(secondary), |t| &t.idx128, |idx, k| idx.lower_bound(k).copied())
    }
    pub fn db_idx128_upperbound(&mut self, code: Name, scope: Name, table: Name, secondary: u128) -> i64 {
        self.secondary_bound(code, scope, table, SecondaryKey::U128(secondary), |t| &t.idx128, |idx, k| idx.upper_bound(k).copied())
    }
    pub fn db_idx128_end(&mut self, code: Name, scope: Name, table: Name) -> i64 {
        self.secondary_end(code, scope, table)
    }
    pub fn db_idx128_next(&mut self, iter: i64) -> i64 {
        self.secondary_step(iter, Direction::Next, |t| &t.idx128)
    }
    pub fn db_idx128_previous(&mut self, iter: i64) -> i64 {
        self.secondary_step(iter, Direction::Prev, |t| &t.idx128)
    }

    // idx256 (checksum256)
    pub fn db_idx256_store(&mut self, scope: Name, table: Name, payer: Name, id: u64, secondary: [u8; 32]) -> Result<i64, HostError> {
        self.secondary_store(scope, table, payer, id, SecondaryKey::Bytes32(Checksum256(secondary)), |t| &mut t.idx256)
    }
    pub fn db_idx256_update(&mut self, iter: i64, payer: Name, secondary: [u8; 32]) -> Result<(), HostError> {
        self.secondary_update(iter, payer, SecondaryKey::Bytes32(Checksum256(secondary)), |t| &mut t.idx256)
    }
    pub fn db_idx256_remove(&mut self, iter: i64) -> Result<(), HostError> {
        self.secondary_remove(iter, |t| &mut t.idx256)
    }
    pub fn db_idx256_find_secondary(&mut self, code: Name, scope: Name, table: Name, secondary: [u8; 32]) -> i64 {
        self.secondary_find(code, scope, table, SecondaryKey::Bytes32(Checksum256(secondary)), |t| &t.idx256)
    }
    pub fn db_idx256_find_primary(&mut self, code: Name, scope: Name, table: Name, id: u64) -> Option<(i64, [u8; 32])> {
        self.secondary_find_primary(code, scope, table, id, |t| &t.idx256)
            .map(|(h, k)| (h, k.as_bytes32().unwrap()))
    }
    pub fn db_idx256_lowerbound(&mut self, code: Name, scope: Name, table: Name, secondary: [u8; 32]) -> i64 {
        self.secondary_bound(code, scope, table, SecondaryKey::Bytes32(Checksum256(secondary)), |t| &t.idx256, |idx, k| idx.lower_bound(k).copied())
    }
    pub fn db_idx256_upperbound(&mut self, code: Name, scope: Name, table: Name, secondary: [u8; 32]) -> i64 {
        self.secondary_bound(code, scope, table, SecondaryKey::Bytes32(Checksum256(secondary)), |t| &t.idx256, |idx, k| idx.upper_bound(k).copied())
    }
    pub fn db_idx256_end(&mut self, code: Name, scope: Name, table: Name) -> i64 {
        self.secondary_end(code, scope, table)
    }
    pub fn db_idx256_next(&mut self, iter: i64) -> i64 {
        self.secondary_step(iter, Direction::Next, |t| &t.idx256)
    }
    pub fn db_idx256_previous(&mut self, iter: i64) -> i64 {
        self.secondary_step(iter, Direction::Prev, |t| &t.idx256)
    }

    // idx_double
    pub fn db_idx_double_store(&mut self, scope: Name, table: Name, payer: Name, id: u64, secondary: f64) -> Result<i64, HostError> {
        self.secondary_store(scope, table, payer, id, SecondaryKey::F64(OrderedF64::from_f64(secondary)), |t| &mut t.idx_double)
    }
    pub fn db_idx_double_update(&mut self, iter: i64, payer: Name, secondary: f64) -> Result<(), HostError> {
        self.secondary_update(iter, payer, SecondaryKey::F64(OrderedF64::from_f64(secondary)), |t| &mut t.idx_double)
    }
    pub fn db_idx_double_remove(&mut self, iter: i64) -> Result<(), HostError> {
        self.secondary_remove(iter, |t| &mut t.idx_double)
    }
    pub fn db_idx_double_find_secondary(&mut self, code: Name, scope: Name, table: Name, secondary: f64) -> i64 {
        self.secondary_find(code, scope, table, SecondaryKey::F64(OrderedF64::from_f64(secondary)), |t| &t.idx_double)
    }
    pub fn db_idx_double_find_primary(&mut self, code: Name, scope: Name, table: Name, id: u64) -> Option<(i64, f64)> {
        self.secondary_find_primary(code, scope, table, id, |t| &t.idx_double)
            .map(|(h, k)| (h, k.as_f64().unwrap()))
    }
    pub fn db_idx_double_lowerbound(&mut self, code: Name, scope: Name, table: Name, secondary: f64) -> i64 {
        self.secondary_bound(code, scope, table, SecondaryKey::F64(OrderedF64::from_f64(secondary)), |t| &t.idx_double, |idx, k| idx.lower_bound(k).copied())
    }
    pub fn db_idx_double_upperbound(&mut self, code: Name, scope: Name, table: Name, secondary: f64) -> i64 {
        self.secondary_bound(code, scope, table, SecondaryKey::F64(OrderedF64::from_f64(secondary)), |t| &t.idx_double, |idx, k| idx.upper_bound(k).copied())
    }
    pub fn db_idx_double_end(&mut self, code: Name, scope: Name, table: Name) -> i64 {
        self.secondary_end(code, scope, table)
    }
    pub fn db_idx_double_next(&mut self, iter: i64) -> i64 {
        self.secondary_step(iter, Direction::Next, |t| &t.idx_double)
    }
    pub fn db_idx_double_previous(&mut self, iter: i64) -> i64 {
        self.secondary_step(iter, Direction::Prev, |t| &t.idx_double)
    }

    // ---------------------------------------------------------------
    // Stubs — traps (spec §4.5 "not implemented", §6's trap list)
    // ---------------------------------------------------------------

    /// Long-double and 128-bit-shift compiler-rt helpers, plus every
    /// intrinsic spec §6 lists parenthetically as `(trap)`
    /// (`send_context_free_inline`, `publication_time`,
    /// `check_transaction_authorization`, `check_permission_authorization`,
    /// `get_permission_last_used`, `send_deferred`, `cancel_deferred`,
    /// `get_context_free_data`, `get_active_producers`,
    /// `set_proposed_producers`, `set_blockchain_parameters_packed`,
    /// `get_blockchain_parameters_packed`) — these require either
    /// deferred-transaction support or privileged chain-parameter
    /// mutation, both explicit Non-goals (spec §1).
    pub fn not_implemented(&self, name: &'static str) -> HostError {
        HostError::NotImplemented(name)
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Next,
    Prev,
}

pub(crate) fn active_name() -> Name {
    Name::new(name_hash("active"))
}

pub(crate) fn owner_name() -> Name {
    Name::new(name_hash("owner"))
}

/// The implicit permission a sending contract's code carries when
/// authorizing an inline action (spec §4.6 step 2: `(sender, "eosio.code")`).
pub(crate) fn eosio_code_name() -> Name {
    Name::new(name_hash("eosio.code"))
}

/// Stable placeholder hash for the well-known `active`/`owner`/`eosio.code`
/// names (the base-32 name codec is out of scope per spec §1; these
/// constants are all the authorization check needs and are fixed for the
/// lifetime of the process).
pub(crate) fn name_hash(s: &str) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for b in s.bytes() {
        h ^= b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}
