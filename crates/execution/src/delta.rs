//! The journal: one tagged variant per state mutation, each carrying what
//! is needed to undo it. Reverting to a snapshot replays entries in reverse.

use crate::intra_block_state::IntraBlockState;
use crate::object::StateObject;
use database::kv;
use primitives::{Address, Bytes, B256, U256};

/// One journaled mutation of the intra-block state.
#[derive(Clone, Debug)]
pub enum Delta {
    /// Balance overwritten; `previous` restores it.
    BalanceChange { address: Address, previous: U256 },
    /// Nonce overwritten; `previous` restores it.
    NonceChange { address: Address, previous: u64 },
    /// Dirty-slot write; `previous` is the prior dirty entry, if any.
    StorageChange {
        address: Address,
        incarnation: u64,
        key: B256,
        previous: Option<B256>,
    },
    /// Code replaced; hash and cached code roll back together.
    CodeChange {
        address: Address,
        previous_hash: B256,
        previous_code: Option<Bytes>,
    },
    /// Object came alive; revert drops its current account again.
    AccountCreated { address: Address },
    /// Object replaced or destructed; revert reinstates it wholesale,
    /// storage included.
    AccountDestructed {
        address: Address,
        previous: Box<StateObject>,
    },
    /// Address entered the touched set.
    Touch { address: Address },
    /// Address entered the self-destruct set.
    Suicide { address: Address },
    /// Refund counter overwritten; `previous` restores it.
    RefundChange { previous: u64 },
    /// Log appended at `index`; revert truncates back to it.
    Log { index: usize },
}

impl Delta {
    pub(crate) fn revert<T: kv::Transaction>(self, state: &mut IntraBlockState<'_, T>) {
        match self {
            Delta::BalanceChange { address, previous } => {
                let object = state.objects.get_mut(&address).unwrap();
                object.current.as_mut().unwrap().balance = previous;
            }
            Delta::NonceChange { address, previous } => {
                let object = state.objects.get_mut(&address).unwrap();
                object.current.as_mut().unwrap().nonce = previous;
            }
            Delta::StorageChange {
                address,
                key,
                previous,
                ..
            } => {
                let storage = &mut state.objects.get_mut(&address).unwrap().dirty_storage;
                match previous {
                    Some(value) => {
                        storage.insert(key, value);
                    }
                    None => {
                        storage.remove(&key);
                    }
                }
            }
            Delta::CodeChange {
                address,
                previous_hash,
                previous_code,
            } => {
                let object = state.objects.get_mut(&address).unwrap();
                object.current.as_mut().unwrap().code_hash = previous_hash;
                object.code = previous_code;
            }
            Delta::AccountCreated { address } => {
                state.objects.get_mut(&address).unwrap().current = None;
            }
            Delta::AccountDestructed { address, previous } => {
                state.objects.insert(address, *previous);
            }
            Delta::Touch { address } => {
                state.touched.remove(&address);
            }
            Delta::Suicide { address } => {
                state.self_destructs.remove(&address);
            }
            Delta::RefundChange { previous } => {
                state.refund = previous;
            }
            Delta::Log { index } => {
                state.logs.truncate(index);
            }
        }
    }
}
