//! Action pipeline (spec §4.6, §5): authority checks, the guest `apply`
//! call, and the recursive draining of the notification and inline-action
//! queues a single action's execution produces.
//!
//! Grounded on the teacher's `WasmEngine::call_contract`/`send_to_contract`
//! pair in `lib.rs`, which resolve a target contract, invoke it, and
//! forward a follow-up call — generalized here to the full
//! parent/notifications/inline recursion spec §4.6 describes, with a fresh
//! [`Context`] (and its [`crate::iterator_cache::IteratorCache`]) per child
//! rather than the teacher's single shared `WasmEngine` state.

use crate::account::PermissionLevel;
use crate::blockchain::Blockchain;
use crate::context::{Action, ActionTrace, AmbientTransaction, Context};
use crate::error::HostError;
use crate::host::{eosio_code_name, HostEnv};
use crate::memory::GuestMemory;
use crate::name::Name;
use std::rc::Rc;

/// Stands in for "a WASM engine that resolves imports and exposes ... an
/// `apply` export" (spec §1): the external collaborator whose `apply` the
/// Dispatcher invokes once per action, with a [`HostEnv`] the Dispatcher
/// has already wired up for that action. A real embedder implements this
/// over a `wasmer::Instance`'s exported `apply` function; tests implement
/// it with a plain struct that calls `HostEnv` intrinsics directly, the way
/// a compiled contract's generated bindings would.
pub trait GuestContract {
    fn apply(&mut self, host: &mut HostEnv) -> Result<(), HostError>;
}

/// Drives one action (and everything it transitively enqueues) to
/// completion. Owns nothing beyond the borrow of [`Blockchain`]; a fresh
/// `Dispatcher` is cheap to construct per top-level action.
pub struct Dispatcher<'a> {
    pub chain: &'a mut Blockchain,
}

impl<'a> Dispatcher<'a> {
    pub fn new(chain: &'a mut Blockchain) -> Self {
        Dispatcher { chain }
    }

    /// Entry point for a top-level action: `sender == Name::EMPTY`
    /// (not inline), `receiver == first_receiver == action.account`
    /// (spec §3: `is_inline`/`is_notification` are both false here).
    ///
    /// `memory` is the guest's linear memory — not part of `Blockchain` or
    /// `Context`, so it must be threaded in by the caller alongside
    /// `guest` rather than owned by the Dispatcher itself (spec §4.5:
    /// `HostEnv` "holds the GuestMemory handle for the instance being
    /// run", which only the caller driving that instance has).
    pub fn dispatch(
        &mut self,
        action: Action,
        memory: &mut dyn GuestMemory,
        guest: &mut dyn GuestContract,
    ) -> Result<(), HostError> {
        self.dispatch_transaction(action, AmbientTransaction::empty(), memory, guest)
    }

    /// Entry point for a top-level action running inside a specific ambient
    /// Transaction (spec §4.5's `read_transaction`/`transaction_size`/
    /// `tapos_block_num`/`tapos_block_prefix`/`expiration`/`get_action`
    /// group); every notification/inline child spawned from it shares the
    /// same `transaction`.
    pub fn dispatch_transaction(
        &mut self,
        action: Action,
        transaction: Rc<AmbientTransaction>,
        memory: &mut dyn GuestMemory,
        guest: &mut dyn GuestContract,
    ) -> Result<(), HostError> {
        let receiver = action.account;
        self.dispatch_inner(receiver, receiver, action, Name::EMPTY, transaction, memory, guest)
    }

    #[allow(clippy::too_many_arguments)]
    fn dispatch_inner(
        &mut self,
        receiver: Name,
        first_receiver: Name,
        action: Action,
        sender: Name,
        transaction: Rc<AmbientTransaction>,
        memory: &mut dyn GuestMemory,
        guest: &mut dyn GuestContract,
    ) -> Result<(), HostError> {
        self.check_authorization(&action.authorization, sender)?;

        let mut context = Context::child(
            receiver,
            first_receiver,
            action.name,
            action.authorization.clone(),
            action.data.clone(),
            sender,
            Rc::clone(&transaction),
        );

        let result = {
            let mut host = HostEnv::new(&mut *self.chain, &mut context, memory);
            guest.apply(&mut host)
        };

        let ordinal = self.chain.traces.len() as u32;
        if let Err(err) = result {
            self.chain.traces.push(ActionTrace {
                action_ordinal: ordinal,
                receiver,
                first_receiver,
                action_name: action.name,
                authorization: action.authorization.clone(),
                console: context.console.clone(),
                except: Some(err.to_string()),
            });
            return Err(err);
        }

        self.chain.traces.push(ActionTrace {
            action_ordinal: ordinal,
            receiver,
            first_receiver,
            action_name: action.name,
            authorization: action.authorization.clone(),
            console: context.console,
            except: None,
        });

        // eosio_exit: clean early return, no queue drained (spec §8 scenario 6).
        if context.exited.is_some() {
            return Ok(());
        }

        for notified in context.notified {
            let notification = Action {
                account: notified,
                name: action.name,
                authorization: action.authorization.clone(),
                data: action.data.clone(),
            };
            self.dispatch_inner(notified, first_receiver, notification, Name::EMPTY, Rc::clone(&transaction), memory, guest)?;
        }

        for inline in context.inline_actions {
            let target = inline.account;
            self.dispatch_inner(target, target, inline, receiver, Rc::clone(&transaction), memory, guest)?;
        }

        Ok(())
    }

    /// Spec §4.6 step 2: every authorization entry names an account and
    /// permission that must actually exist; inline actions additionally
    /// need the target account's authority graph satisfied by
    /// `(sender, "eosio.code")` — the one place this core walks a
    /// weighted-threshold authority without a real signature (spec §9).
    fn check_authorization(
        &self,
        authorization: &[PermissionLevel],
        sender: Name,
    ) -> Result<(), HostError> {
        let is_inline = !sender.is_empty();
        for entry in authorization {
            let account = self.chain.account(entry.actor).ok_or_else(|| {
                HostError::assert_msg(format!("unknown account {}", entry.actor))
            })?;
            if account.permission(entry.permission).is_none() {
                return Err(HostError::assert_msg(format!(
                    "unknown permission {}/{}",
                    entry.actor, entry.permission
                )));
            }
            if is_inline {
                let present = [PermissionLevel::new(sender, eosio_code_name())];
                if !account.satisfies(entry.permission, &present) {
                    return Err(HostError::assert_msg(format!(
                        "missing authority of {sender}@eosio.code for {}/{}",
                        entry.actor, entry.permission
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{Account, AccountWeight, Authority, KeyWeight, Permission};
    use crate::memory::VecMemory;

    struct StoreOneRow;

    impl GuestContract for StoreOneRow {
        fn apply(&mut self, host: &mut HostEnv) -> Result<(), HostError> {
            host.db_store_i64(Name::new(1), Name::new(2), host.context.receiver, 1, 0, 0)?;
            Ok(())
        }
    }

    struct ExitAfterStore;

    impl GuestContract for ExitAfterStore {
        fn apply(&mut self, host: &mut HostEnv) -> Result<(), HostError> {
            host.db_store_i64(Name::new(1), Name::new(2), host.context.receiver, 1, 0, 0)?;
            host.send_inline(Name::new(999), Name::new(1), vec![], vec![])?;
            host.eosio_exit(0);
            Ok(())
        }
    }

    struct SendInlineToB;

    impl GuestContract for SendInlineToB {
        fn apply(&mut self, host: &mut HostEnv) -> Result<(), HostError> {
            if host.context.receiver == Name::new(100) {
                host.send_inline(Name::new(200), Name::new(5), vec![], vec![]).unwrap();
            } else {
                let sender = host.get_sender();
                host.db_store_i64(Name::new(1), Name::new(2), host.context.receiver, sender as u64, 0, 0)?;
            }
            Ok(())
        }
    }

    fn account_with_active(name: Name) -> Account {
        let mut account = Account::new(name, 0);
        let mut active = Authority::new(1);
        active.keys.push(KeyWeight {
            key_hash: [0u8; 32],
            weight: 1,
        });
        account.permissions.insert(
            crate::host::active_name(),
            Permission {
                name: crate::host::active_name(),
                parent: crate::host::owner_name(),
                authority: active,
            },
        );
        account.permissions.insert(
            crate::host::owner_name(),
            Permission {
                name: crate::host::owner_name(),
                parent: Name::EMPTY,
                authority: Authority::new(1),
            },
        );
        account
    }

    #[test]
    fn dispatch_runs_apply_and_records_a_trace() {
        let mut chain = Blockchain::new();
        let a = Name::new(100);
        chain.accounts.insert(a, account_with_active(a));

        let mut mem = VecMemory::new(16);
        let mut guest = StoreOneRow;
        let action = Action {
            account: a,
            name: Name::new(1),
            authorization: vec![PermissionLevel::new(a, crate::host::active_name())],
            data: vec![],
        };
        let mut dispatcher = Dispatcher::new(&mut chain);
        dispatcher.dispatch(action, &mut mem, &mut guest).unwrap();
        assert_eq!(chain.traces.len(), 1);
        assert!(chain.traces[0].except.is_none());
    }

    #[test]
    fn unknown_authorizing_account_is_rejected() {
        let mut chain = Blockchain::new();
        let mut mem = VecMemory::new(16);
        let mut guest = StoreOneRow;
        let action = Action {
            account: Name::new(100),
            name: Name::new(1),
            authorization: vec![PermissionLevel::new(Name::new(999), crate::host::active_name())],
            data: vec![],
        };
        let mut dispatcher = Dispatcher::new(&mut chain);
        let err = dispatcher.dispatch(action, &mut mem, &mut guest).unwrap_err();
        assert!(matches!(err, HostError::Assert(_)));
    }

    #[test]
    fn eosio_exit_skips_queue_draining_but_keeps_store_writes() {
        let mut chain = Blockchain::new();
        let a = Name::new(100);
        let target = Name::new(999);
        chain.accounts.insert(a, account_with_active(a));
        chain.create_account(target);
        chain.account_mut(target).unwrap().declared_actions.insert(Name::new(1));

        let mut mem = VecMemory::new(16);
        let mut guest = ExitAfterStore;
        let action = Action {
            account: a,
            name: Name::new(1),
            authorization: vec![PermissionLevel::new(a, crate::host::active_name())],
            data: vec![],
        };
        let mut dispatcher = Dispatcher::new(&mut chain);
        dispatcher.dispatch(action, &mut mem, &mut guest).unwrap();
        // only the parent's own trace: the send_inline queued before exit never drains.
        assert_eq!(chain.traces.len(), 1);
        let table_id = chain.store.find_table_id(a, Name::new(1), Name::new(2)).unwrap();
        assert!(chain.store.table(table_id).unwrap().primary.contains_key(&1));
        assert!(chain.store.find_table_id(target, Name::new(1), Name::new(2)).is_none());
    }

    #[test]
    fn inline_action_reaches_target_with_sender_set() {
        let mut chain = Blockchain::new();
        let a = Name::new(100);
        let b = Name::new(200);
        chain.accounts.insert(a, account_with_active(a));
        chain.accounts.insert(b, account_with_active(b));
        b_declares(&mut chain, b, Name::new(5));

        let mut mem = VecMemory::new(16);
        let mut guest = SendInlineToB;
        let action = Action {
            account: a,
            name: Name::new(1),
            authorization: vec![PermissionLevel::new(a, crate::host::active_name())],
            data: vec![],
        };
        let mut dispatcher = Dispatcher::new(&mut chain);
        dispatcher.dispatch(action, &mut mem, &mut guest).unwrap();

        assert_eq!(chain.traces.len(), 2);
        let table_id = chain.store.find_table_id(b, Name::new(1), Name::new(2)).unwrap();
        assert!(chain.store.table(table_id).unwrap().primary.contains_key(&a.as_u64()));
    }

    fn b_declares(chain: &mut Blockchain, b: Name, action_name: Name) {
        chain.account_mut(b).unwrap().declared_actions.insert(action_name);
    }

    struct ReadTaposFromInline;

    impl GuestContract for ReadTaposFromInline {
        fn apply(&mut self, host: &mut HostEnv) -> Result<(), HostError> {
            if host.context.receiver == Name::new(100) {
                assert_eq!(host.tapos_block_num(), 77);
                host.send_inline(Name::new(200), Name::new(5), vec![], vec![]).unwrap();
            } else {
                // a notification/inline child sees the same ambient transaction.
                assert_eq!(host.tapos_block_num(), 77);
                assert_eq!(host.expiration(), 999);
            }
            Ok(())
        }
    }

    #[test]
    fn ambient_transaction_is_shared_with_inline_children() {
        let mut chain = Blockchain::new();
        let a = Name::new(100);
        let b = Name::new(200);
        chain.accounts.insert(a, account_with_active(a));
        chain.accounts.insert(b, account_with_active(b));
        b_declares(&mut chain, b, Name::new(5));

        let mut mem = VecMemory::new(16);
        let mut guest = ReadTaposFromInline;
        let action = Action {
            account: a,
            name: Name::new(1),
            authorization: vec![PermissionLevel::new(a, crate::host::active_name())],
            data: vec![],
        };
        let transaction = Rc::new(crate::context::AmbientTransaction {
            tapos_block_num: 77,
            expiration: 999,
            ..Default::default()
        });
        let mut dispatcher = Dispatcher::new(&mut chain);
        dispatcher
            .dispatch_transaction(action, transaction, &mut mem, &mut guest)
            .unwrap();
        assert_eq!(chain.traces.len(), 2);
    }
}
