//! Per-action execution state (spec §3, §4.5, §4.2).
//!
//! One [`Context`] exists per action dispatched, lives exactly as long as
//! that action's `apply` call, and owns the iterator cache, console buffer,
//! and queued inline/notification actions that call falls out with.

use crate::account::PermissionLevel;
use crate::iterator_cache::IteratorCache;
use crate::name::Name;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub account: Name,
    pub name: Name,
    pub authorization: Vec<PermissionLevel>,
    pub data: Vec<u8>,
}

/// The ambient Transaction the current action is running inside of (spec
/// §4.5 "Chain / transaction": `read_transaction`, `transaction_size`,
/// `tapos_block_num`, `tapos_block_prefix`, `expiration`, `get_action`).
/// `raw` is caller-supplied opaque bytes — the Antelope binary transaction
/// codec is a Non-goal (spec §1), so this core never encodes or decodes
/// it, only stores and returns what the caller handed it, exactly like a
/// Row's opaque value. Shared via `Rc` across a transaction's whole action
/// tree (single-threaded per spec §5, so no `Arc` needed) since every
/// notification/inline child observes the same ambient transaction as its
/// parent.
#[derive(Debug, Clone, Default)]
pub struct AmbientTransaction {
    pub raw: Vec<u8>,
    pub expiration: u32,
    pub tapos_block_num: u32,
    pub tapos_block_prefix: u32,
    pub context_free_actions: Vec<Action>,
    pub actions: Vec<Action>,
}

impl AmbientTransaction {
    pub fn empty() -> Rc<AmbientTransaction> {
        Rc::new(AmbientTransaction::default())
    }
}

/// Per-action trace (spec §6's `$vertPrintStorage`/console needs plus the
/// authorization list visible to a post-hoc inspector) — not present in the
/// teacher, added because spec §6 implies per-action console/trace
/// inspection that a flat global log can't express once notifications and
/// inline actions recurse.
#[derive(Debug, Clone, Default)]
pub struct ActionTrace {
    pub action_ordinal: u32,
    pub receiver: Name,
    pub first_receiver: Name,
    pub action_name: Name,
    pub authorization: Vec<PermissionLevel>,
    pub console: String,
    pub except: Option<String>,
}

/// Execution state for a single action's `apply` invocation.
#[derive(Debug)]
pub struct Context {
    pub receiver: Name,
    pub first_receiver: Name,
    pub action_name: Name,
    pub authorization: Vec<PermissionLevel>,
    pub data: Vec<u8>,

    pub iterators: IteratorCache,
    pub console: String,
    /// Set by `eosio_exit`: a clean early return, not an error (spec §7).
    pub exited: Option<i32>,
    pub return_value: Vec<u8>,

    pub inline_actions: Vec<Action>,
    /// Accounts notified via `require_recipient`, in call order, deduped.
    pub notified: Vec<Name>,
    /// Account whose inline action produced this one; `Name::EMPTY` for a
    /// top-level transaction action (spec §6 `get_sender`).
    pub sender: Name,
    /// The ambient Transaction this action runs inside of, shared with
    /// every notification/inline child the Dispatcher spawns from it.
    pub transaction: Rc<AmbientTransaction>,
}

impl Context {
    pub fn new(
        receiver: Name,
        first_receiver: Name,
        action_name: Name,
        authorization: Vec<PermissionLevel>,
        data: Vec<u8>,
    ) -> Self {
        Context {
            receiver,
            first_receiver,
            action_name,
            authorization,
            data,
            iterators: IteratorCache::new(),
            console: String::new(),
            exited: None,
            return_value: Vec::new(),
            inline_actions: Vec::new(),
            notified: Vec::new(),
            sender: Name::EMPTY,
            transaction: AmbientTransaction::empty(),
        }
    }

    /// Builds the `Context` for an inline or notification child action,
    /// recording which account's intrinsic call produced it (spec §3:
    /// `is_inline ⇔ sender != 0`) and inheriting the parent's ambient
    /// Transaction (every child in one dispatch tree observes the same
    /// transaction its parent does).
    pub fn child(
        receiver: Name,
        first_receiver: Name,
        action_name: Name,
        authorization: Vec<PermissionLevel>,
        data: Vec<u8>,
        sender: Name,
        transaction: Rc<AmbientTransaction>,
    ) -> Self {
        let mut ctx = Context::new(receiver, first_receiver, action_name, authorization, data);
        ctx.sender = sender;
        ctx.transaction = transaction;
        ctx
    }

    /// Spec §3: `is_inline ⇔ sender name ≠ 0`.
    pub fn is_inline(&self) -> bool {
        !self.sender.is_empty()
    }

    /// Spec §3: `is_notification ⇔ receiver ≠ first_receiver`.
    pub fn is_notification(&self) -> bool {
        self.receiver != self.first_receiver
    }

    pub fn has_auth(&self, account: Name) -> bool {
        self.authorization.iter().any(|p| p.actor == account)
    }

    /// Queues `account` for notification unless it's the receiver itself
    /// or already queued (spec §4.5: `require_recipient` is idempotent and
    /// a no-op for the current receiver).
    pub fn require_recipient(&mut self, account: Name) {
        if account == self.receiver || self.notified.contains(&account) {
            return;
        }
        self.notified.push(account);
    }

    pub fn send_inline(&mut self, action: Action) {
        self.inline_actions.push(action);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> Context {
        Context::new(
            Name::new(1),
            Name::new(1),
            Name::new(2),
            vec![PermissionLevel::new(Name::new(1), Name::new(100))],
            vec![],
        )
    }

    #[test]
    fn has_auth_checks_authorization_list() {
        let c = ctx();
        assert!(c.has_auth(Name::new(1)));
        assert!(!c.has_auth(Name::new(99)));
    }

    #[test]
    fn require_recipient_is_idempotent_and_skips_self() {
        let mut c = ctx();
        c.require_recipient(Name::new(1)); // self, no-op
        c.require_recipient(Name::new(5));
        c.require_recipient(Name::new(5));
        assert_eq!(c.notified, vec![Name::new(5)]);
    }

    #[test]
    fn is_inline_and_is_notification_follow_sender_and_receiver() {
        let c = ctx();
        assert!(!c.is_inline());
        assert!(!c.is_notification());

        let inline = Context::child(
            Name::new(2),
            Name::new(2),
            Name::new(3),
            vec![],
            vec![],
            Name::new(1),
            AmbientTransaction::empty(),
        );
        assert!(inline.is_inline());
        assert!(!inline.is_notification());

        let notified = Context::child(
            Name::new(9),
            Name::new(2),
            Name::new(3),
            vec![],
            vec![],
            Name::EMPTY,
            AmbientTransaction::empty(),
        );
        assert!(notified.is_notification());
    }
}
