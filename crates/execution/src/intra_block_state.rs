//! Mutable, revertible view of the world during a single transaction.
//!
//! The interpreter drives this object; every mutation journals its inverse,
//! so nested call frames can snapshot and revert without unwinding. At the
//! transaction boundary the state is finalized, and at the block boundary
//! the accumulated objects drain into the [`Buffer`].

use crate::delta::Delta;
use crate::object::{CommittedValue, StateObject};
use database::{kv, Buffer, DbError};
use primitives::{
    fee, keccak256, Account, Address, Bytes, HashMap, HashSet, Log, B256, KECCAK_EMPTY, U256,
};

/// Token returned by [`IntraBlockState::snapshot`].
///
/// Every journal entry carries complete undo information, so the token is
/// just the journal length at the time of the snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Snapshot {
    journal_length: usize,
}

/// Per-transaction staging of accounts, storage, code, logs, refunds and
/// self-destructs, with journaled undo.
///
/// Reads fall through to the buffer lazily; a miss is not cached, so a
/// nonexistent account stays invisible until something creates it.
#[derive(Debug)]
pub struct IntraBlockState<'db, T: kv::Transaction> {
    db: &'db mut Buffer<T>,
    pub(crate) objects: HashMap<Address, StateObject>,
    pub(crate) touched: HashSet<Address>,
    pub(crate) self_destructs: HashSet<Address>,
    pub(crate) logs: Vec<Log>,
    pub(crate) refund: u64,
    journal: Vec<Delta>,
}

impl<'db, T: kv::Transaction> IntraBlockState<'db, T> {
    pub fn new(db: &'db mut Buffer<T>) -> Self {
        Self {
            db,
            objects: HashMap::default(),
            touched: HashSet::default(),
            self_destructs: HashSet::default(),
            logs: Vec::new(),
            refund: 0,
            journal: Vec::new(),
        }
    }

    /// Loads the object for `address` if the address is known to this block
    /// or to the database. Misses are not cached.
    fn load_object(&mut self, address: Address) -> Result<Option<&mut StateObject>, DbError> {
        if !self.objects.contains_key(&address) {
            let Some(account) = self.db.read_account(address)? else {
                return Ok(None);
            };
            self.objects.insert(
                address,
                StateObject {
                    initial: Some(account),
                    current: Some(account),
                    ..StateObject::default()
                },
            );
        }
        Ok(self.objects.get_mut(&address))
    }

    /// Makes sure an account exists at `address`, creating an empty one
    /// (journaled) if nothing lives there.
    fn ensure_object(&mut self, address: Address) -> Result<(), DbError> {
        if self.load_object(address)?.is_none() {
            self.objects.insert(address, StateObject::default());
        }
        let object = self.objects.get_mut(&address).unwrap();
        if object.current.is_none() {
            object.current = Some(Account::default());
            self.journal.push(Delta::AccountCreated { address });
        }
        Ok(())
    }

    fn touch(&mut self, address: Address) {
        if self.touched.insert(address) {
            self.journal.push(Delta::Touch { address });
        }
    }

    /// Whether an account currently exists at `address`.
    pub fn exists(&mut self, address: Address) -> Result<bool, DbError> {
        Ok(self
            .load_object(address)?
            .is_some_and(|object| object.current.is_some()))
    }

    pub fn get_balance(&mut self, address: Address) -> Result<U256, DbError> {
        Ok(self
            .load_object(address)?
            .and_then(|object| object.current.as_ref())
            .map_or(U256::ZERO, |account| account.balance))
    }

    pub fn add_to_balance(&mut self, address: Address, addend: U256) -> Result<(), DbError> {
        self.ensure_object(address)?;
        self.touch(address);
        let current = self.objects.get_mut(&address).unwrap().current.as_mut().unwrap();
        let previous = current.balance;
        current.balance = previous.wrapping_add(addend);
        self.journal.push(Delta::BalanceChange { address, previous });
        Ok(())
    }

    pub fn subtract_from_balance(
        &mut self,
        address: Address,
        subtrahend: U256,
    ) -> Result<(), DbError> {
        self.ensure_object(address)?;
        self.touch(address);
        let current = self.objects.get_mut(&address).unwrap().current.as_mut().unwrap();
        let previous = current.balance;
        current.balance = previous.wrapping_sub(subtrahend);
        self.journal.push(Delta::BalanceChange { address, previous });
        Ok(())
    }

    pub fn get_nonce(&mut self, address: Address) -> Result<u64, DbError> {
        Ok(self
            .load_object(address)?
            .and_then(|object| object.current.as_ref())
            .map_or(0, |account| account.nonce))
    }

    pub fn set_nonce(&mut self, address: Address, nonce: u64) -> Result<(), DbError> {
        self.ensure_object(address)?;
        self.touch(address);
        let current = self.objects.get_mut(&address).unwrap().current.as_mut().unwrap();
        let previous = current.nonce;
        current.nonce = nonce;
        self.journal.push(Delta::NonceChange { address, previous });
        Ok(())
    }

    pub fn get_code_hash(&mut self, address: Address) -> Result<B256, DbError> {
        Ok(self
            .load_object(address)?
            .and_then(|object| object.current.as_ref())
            .map_or(KECCAK_EMPTY, |account| account.code_hash))
    }

    pub fn get_code(&mut self, address: Address) -> Result<Bytes, DbError> {
        let code_hash = match self.load_object(address)? {
            Some(object) => {
                if let Some(code) = &object.code {
                    return Ok(code.clone());
                }
                match &object.current {
                    Some(current) if current.code_hash != KECCAK_EMPTY => current.code_hash,
                    _ => return Ok(Bytes::new()),
                }
            }
            None => return Ok(Bytes::new()),
        };
        let code = self.db.read_code(code_hash)?;
        self.objects.get_mut(&address).unwrap().code = Some(code.clone());
        Ok(code)
    }

    pub fn set_code(&mut self, address: Address, code: Bytes) -> Result<(), DbError> {
        self.ensure_object(address)?;
        self.touch(address);
        let code_hash = keccak256(&code);
        let object = self.objects.get_mut(&address).unwrap();
        let current = object.current.as_mut().unwrap();
        let previous_hash = current.code_hash;
        current.code_hash = code_hash;
        let previous_code = object.code.replace(code);
        self.journal.push(Delta::CodeChange {
            address,
            previous_hash,
            previous_code,
        });
        Ok(())
    }

    /// Value of the slot as the running transaction sees it: dirty writes
    /// first, then the transaction baseline, then the database.
    pub fn get_current_storage(&mut self, address: Address, key: B256) -> Result<B256, DbError> {
        if let Some(object) = self.objects.get(&address) {
            if object.current.is_some() {
                if let Some(value) = object.dirty_storage.get(&key) {
                    return Ok(*value);
                }
            }
        }
        self.get_original_storage(address, key)
    }

    /// Value of the slot at the start of the running transaction
    /// (EIP-2200's "original" value).
    pub fn get_original_storage(&mut self, address: Address, key: B256) -> Result<B256, DbError> {
        let incarnation = {
            let Some(object) = self.load_object(address)? else {
                return Ok(B256::ZERO);
            };
            let Some(current) = &object.current else {
                return Ok(B256::ZERO);
            };
            if let Some(committed) = object.committed_storage.get(&key) {
                return Ok(committed.original);
            }
            current.incarnation
        };

        // First sighting of the slot this block; the database value doubles
        // as the block-initial pre-image.
        let value = self.db.read_storage(address, incarnation, key)?;
        self.objects
            .get_mut(&address)
            .unwrap()
            .committed_storage
            .insert(
                key,
                CommittedValue {
                    initial: value,
                    original: value,
                },
            );
        Ok(value)
    }

    pub fn set_storage(&mut self, address: Address, key: B256, value: B256) -> Result<(), DbError> {
        let current_value = self.get_current_storage(address, key)?;
        if current_value == value {
            return Ok(());
        }
        let Some(object) = self.objects.get_mut(&address) else {
            return Ok(());
        };
        let Some(current) = &object.current else {
            return Ok(());
        };
        let incarnation = current.incarnation;
        let previous = object.dirty_storage.insert(key, value);
        self.journal.push(Delta::StorageChange {
            address,
            incarnation,
            key,
            previous,
        });
        Ok(())
    }

    /// Installs a fresh contract account at `address`.
    ///
    /// An existing account keeps its balance; nonce and code reset, the
    /// incarnation bumps past every epoch the address has ever had, and the
    /// new epoch starts with untouched storage.
    pub fn create_contract(&mut self, address: Address) -> Result<(), DbError> {
        let previous = self.load_object(address)?.map(|object| object.clone());

        let mut created = StateObject {
            current: Some(Account::default()),
            ..StateObject::default()
        };
        let mut prev_incarnation = 0;
        if let Some(previous_object) = &previous {
            created.initial = previous_object.initial;
            if let Some(current) = &previous_object.current {
                created.current.as_mut().unwrap().balance = current.balance;
                prev_incarnation = current.incarnation;
            } else if let Some(initial) = &previous_object.initial {
                prev_incarnation = initial.incarnation;
            }
        }
        if prev_incarnation == 0 {
            prev_incarnation = self.db.previous_incarnation(address)?;
        }
        created.current.as_mut().unwrap().incarnation = prev_incarnation + 1;

        match previous {
            Some(previous_object) => self.journal.push(Delta::AccountDestructed {
                address,
                previous: Box::new(previous_object),
            }),
            None => self.journal.push(Delta::AccountCreated { address }),
        }
        self.objects.insert(address, created);
        Ok(())
    }

    /// Schedules `address` for destruction at the end of the transaction.
    pub fn record_suicide(&mut self, address: Address) {
        if self.self_destructs.insert(address) {
            self.journal.push(Delta::Suicide { address });
        }
        self.touch(address);
    }

    /// Tombstones the account and wipes its staged storage.
    pub fn destruct(&mut self, address: Address) -> Result<(), DbError> {
        if self.load_object(address)?.is_none() {
            return Ok(());
        }
        let object = self.objects.get_mut(&address).unwrap();
        if object.current.is_none() {
            return Ok(());
        }
        let previous = object.clone();
        object.current = None;
        object.code = None;
        object.dirty_storage.clear();
        object.committed_storage.clear();
        self.journal.push(Delta::AccountDestructed {
            address,
            previous: Box::new(previous),
        });
        Ok(())
    }

    /// Destructs every account scheduled by [`Self::record_suicide`].
    pub fn destruct_suicides(&mut self) -> Result<(), DbError> {
        let scheduled: Vec<Address> = self.self_destructs.iter().copied().collect();
        for address in scheduled {
            self.destruct(address)?;
        }
        Ok(())
    }

    /// EIP-161 sweep: destructs every touched account left empty.
    pub fn destruct_touched_dead(&mut self) -> Result<(), DbError> {
        let touched: Vec<Address> = self.touched.iter().copied().collect();
        for address in touched {
            let dead = self
                .load_object(address)?
                .and_then(|object| object.current.as_ref())
                .is_some_and(Account::is_empty);
            if dead {
                self.destruct(address)?;
            }
        }
        Ok(())
    }

    pub fn add_log(&mut self, log: Log) {
        self.journal.push(Delta::Log {
            index: self.logs.len(),
        });
        self.logs.push(log);
    }

    /// Logs of the transaction in flight, in emission order.
    pub fn logs(&self) -> &[Log] {
        &self.logs
    }

    pub fn add_refund(&mut self, addend: u64) {
        self.journal.push(Delta::RefundChange {
            previous: self.refund,
        });
        self.refund += addend;
    }

    pub fn subtract_refund(&mut self, subtrahend: u64) {
        self.journal.push(Delta::RefundChange {
            previous: self.refund,
        });
        self.refund -= subtrahend;
    }

    /// Refund counter plus the per-self-destruct allowance.
    pub fn total_refund(&self) -> u64 {
        self.refund + fee::R_SELF_DESTRUCT * self.self_destructs.len() as u64
    }

    pub fn snapshot(&mut self) -> Snapshot {
        Snapshot {
            journal_length: self.journal.len(),
        }
    }

    /// Rewinds every observable mutation back to where `snapshot` was
    /// taken. Reverting across an already-finalized transaction is not
    /// possible: finalization drains the journal.
    pub fn revert_to_snapshot(&mut self, snapshot: Snapshot) {
        while self.journal.len() > snapshot.journal_length {
            let delta = self.journal.pop().unwrap();
            delta.revert(self);
        }
    }

    /// Resets the journal and the transaction substate. Runs before each
    /// transaction.
    pub fn clear_journal_and_substate(&mut self) {
        self.journal.clear();
        self.touched.clear();
        self.self_destructs.clear();
        self.logs.clear();
        self.refund = 0;
    }

    /// Commits the transaction in flight: dirty storage becomes the next
    /// transaction's baseline and the journal drains without reverting.
    pub fn finalize_transaction(&mut self) {
        for object in self.objects.values_mut() {
            for (key, value) in object.dirty_storage.drain() {
                let committed = object.committed_storage.entry(key).or_default();
                committed.original = value;
            }
        }
        self.journal.clear();
    }

    /// Drains every staged object into the buffer and flushes it under
    /// `block_number`.
    pub fn write_to_db(&mut self, block_number: u64) -> Result<(), DbError> {
        for (address, object) in &self.objects {
            self.db.update_account(*address, object.initial, object.current);

            if let (Some(current), Some(code)) = (&object.current, &object.code) {
                let newly_set = current.code_hash != KECCAK_EMPTY
                    && object
                        .initial
                        .map_or(true, |initial| initial.code_hash != current.code_hash);
                if newly_set {
                    self.db.update_account_code(
                        *address,
                        current.incarnation,
                        current.code_hash,
                        code.clone(),
                    );
                }
            }

            if let Some(current) = &object.current {
                for (key, committed) in &object.committed_storage {
                    self.db.update_storage(
                        *address,
                        current.incarnation,
                        *key,
                        committed.initial,
                        committed.original,
                    );
                }
            }
        }
        self.db.write_to_db(block_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use database::{tables, MemoryKv, Table, Transaction};
    use primitives::{address, b256};

    const ADDRESS: Address = address!("be00f0ab38cf49b3e90bcf9bd80192cd747b2abb");
    const SLOT: B256 = b256!("000000000000000000000000000000000000000000000000000000000000002a");

    fn seed_account(kv: &mut MemoryKv, address: Address, account: Account) {
        let mut table = kv.open(tables::PLAIN_STATE).unwrap();
        table
            .put(address.as_slice(), &account.encode_for_storage(false))
            .unwrap();
    }

    fn seed_storage(kv: &mut MemoryKv, address: Address, incarnation: u64, slot: B256, value: B256) {
        let mut table = kv.open(tables::PLAIN_STATE).unwrap();
        let prefix = database::keys::storage_prefix(address, incarnation);
        let mut entry = slot.to_vec();
        entry.extend_from_slice(database::keys::zeroless_view(&value));
        table.put(&prefix, &entry).unwrap();
    }

    #[test]
    fn nonexistent_accounts_read_as_defaults() {
        let mut buffer = Buffer::new(MemoryKv::default(), None);
        let mut state = IntraBlockState::new(&mut buffer);

        assert!(!state.exists(ADDRESS).unwrap());
        assert_eq!(state.get_balance(ADDRESS).unwrap(), U256::ZERO);
        assert_eq!(state.get_nonce(ADDRESS).unwrap(), 0);
        assert_eq!(state.get_code_hash(ADDRESS).unwrap(), KECCAK_EMPTY);
        assert_eq!(state.get_code(ADDRESS).unwrap(), Bytes::new());
        assert_eq!(state.get_current_storage(ADDRESS, SLOT).unwrap(), B256::ZERO);
    }

    #[test]
    fn balance_write_creates_the_account() {
        let mut buffer = Buffer::new(MemoryKv::default(), None);
        let mut state = IntraBlockState::new(&mut buffer);

        state.add_to_balance(ADDRESS, U256::from(5u64)).unwrap();
        assert!(state.exists(ADDRESS).unwrap());
        assert_eq!(state.get_balance(ADDRESS).unwrap(), U256::from(5u64));
    }

    #[test]
    fn revert_restores_every_observable() {
        let mut kv = MemoryKv::default();
        seed_account(
            &mut kv,
            ADDRESS,
            Account {
                nonce: 1,
                balance: U256::from(100u64),
                incarnation: 1,
                ..Account::default()
            },
        );
        seed_storage(&mut kv, ADDRESS, 1, SLOT, B256::with_last_byte(7));
        let mut buffer = Buffer::new(kv, None);
        let mut state = IntraBlockState::new(&mut buffer);

        state.add_refund(10);
        let snapshot = state.snapshot();

        state.add_to_balance(ADDRESS, U256::from(1u64)).unwrap();
        state.set_nonce(ADDRESS, 9).unwrap();
        state.set_storage(ADDRESS, SLOT, B256::with_last_byte(8)).unwrap();
        state.set_code(ADDRESS, Bytes::from_static(b"\x60\x00")).unwrap();
        state.add_log(Log::new_unchecked(ADDRESS, vec![], Bytes::new()));
        state.add_refund(90);
        state.record_suicide(ADDRESS);

        state.revert_to_snapshot(snapshot);

        assert_eq!(state.get_balance(ADDRESS).unwrap(), U256::from(100u64));
        assert_eq!(state.get_nonce(ADDRESS).unwrap(), 1);
        assert_eq!(
            state.get_current_storage(ADDRESS, SLOT).unwrap(),
            B256::with_last_byte(7)
        );
        assert_eq!(state.get_code_hash(ADDRESS).unwrap(), KECCAK_EMPTY);
        assert!(state.logs().is_empty());
        assert_eq!(state.total_refund(), 10);
        assert!(state.self_destructs.is_empty());
        assert!(!state.touched.contains(&ADDRESS));
    }

    #[test]
    fn nested_snapshots_revert_independently() {
        let mut buffer = Buffer::new(MemoryKv::default(), None);
        let mut state = IntraBlockState::new(&mut buffer);

        state.add_to_balance(ADDRESS, U256::from(1u64)).unwrap();
        let outer = state.snapshot();
        state.add_to_balance(ADDRESS, U256::from(2u64)).unwrap();
        let inner = state.snapshot();
        state.add_to_balance(ADDRESS, U256::from(4u64)).unwrap();

        state.revert_to_snapshot(inner);
        assert_eq!(state.get_balance(ADDRESS).unwrap(), U256::from(3u64));

        state.revert_to_snapshot(outer);
        assert_eq!(state.get_balance(ADDRESS).unwrap(), U256::from(1u64));
    }

    #[test]
    fn created_account_reverts_to_nonexistence() {
        let mut buffer = Buffer::new(MemoryKv::default(), None);
        let mut state = IntraBlockState::new(&mut buffer);

        let snapshot = state.snapshot();
        state.add_to_balance(ADDRESS, U256::from(1u64)).unwrap();
        assert!(state.exists(ADDRESS).unwrap());

        state.revert_to_snapshot(snapshot);
        assert!(!state.exists(ADDRESS).unwrap());
    }

    #[test]
    fn storage_baseline_moves_at_transaction_boundary() {
        let mut kv = MemoryKv::default();
        seed_account(
            &mut kv,
            ADDRESS,
            Account {
                incarnation: 1,
                ..Account::default()
            },
        );
        seed_storage(&mut kv, ADDRESS, 1, SLOT, B256::with_last_byte(1));
        let mut buffer = Buffer::new(kv, None);
        let mut state = IntraBlockState::new(&mut buffer);

        state.set_storage(ADDRESS, SLOT, B256::with_last_byte(2)).unwrap();
        assert_eq!(
            state.get_original_storage(ADDRESS, SLOT).unwrap(),
            B256::with_last_byte(1)
        );
        assert_eq!(
            state.get_current_storage(ADDRESS, SLOT).unwrap(),
            B256::with_last_byte(2)
        );

        state.finalize_transaction();
        state.clear_journal_and_substate();

        // Next transaction: the baseline is the previous transaction's
        // result, while the buffer still gets the block-initial value.
        assert_eq!(
            state.get_original_storage(ADDRESS, SLOT).unwrap(),
            B256::with_last_byte(2)
        );

        state.write_to_db(1).unwrap();
        let key = database::keys::plain_storage_key(ADDRESS, 1, SLOT);
        assert_eq!(
            buffer.storage_back_changes().get(&key).map(|b| b.as_ref()),
            Some(&[1u8][..])
        );
    }

    #[test]
    fn create_after_suicide_bumps_incarnation() {
        let mut kv = MemoryKv::default();
        let code_hash = b256!("0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f");
        seed_account(
            &mut kv,
            ADDRESS,
            Account {
                nonce: 1,
                balance: U256::from(50u64),
                code_hash,
                incarnation: 1,
            },
        );
        seed_storage(&mut kv, ADDRESS, 1, SLOT, B256::with_last_byte(7));
        let mut buffer = Buffer::new(kv, None);
        let mut state = IntraBlockState::new(&mut buffer);

        state.record_suicide(ADDRESS);
        state.create_contract(ADDRESS).unwrap();

        let current = state.objects[&ADDRESS].current.unwrap();
        assert_eq!(current.incarnation, 2);
        assert_eq!(current.balance, U256::from(50u64));
        assert_eq!(current.nonce, 0);

        // The previous epoch's storage is unreachable through the new
        // incarnation.
        assert_eq!(state.get_current_storage(ADDRESS, SLOT).unwrap(), B256::ZERO);

        state.destruct_suicides().unwrap();
        state.finalize_transaction();
        state.write_to_db(1).unwrap();

        assert_eq!(buffer.previous_incarnation(ADDRESS).unwrap(), 1);
        assert_eq!(buffer.read_account(ADDRESS).unwrap(), None);
    }

    #[test]
    fn recreation_after_block_level_destruct_consults_the_buffer() {
        let mut buffer = Buffer::new(MemoryKv::default(), None);
        // A contract destroyed in an earlier block left incarnation 3
        // behind.
        buffer.update_account(
            ADDRESS,
            Some(Account {
                incarnation: 3,
                ..Account::default()
            }),
            None,
        );
        let mut state = IntraBlockState::new(&mut buffer);

        state.create_contract(ADDRESS).unwrap();
        assert_eq!(state.objects[&ADDRESS].current.unwrap().incarnation, 4);
    }

    #[test]
    fn touched_dead_sweep_removes_empty_accounts() {
        let mut kv = MemoryKv::default();
        seed_account(&mut kv, ADDRESS, Account::default());
        let mut buffer = Buffer::new(kv, None);
        let mut state = IntraBlockState::new(&mut buffer);

        // A zero-value transfer touches without changing anything.
        state.add_to_balance(ADDRESS, U256::ZERO).unwrap();
        state.destruct_touched_dead().unwrap();
        state.finalize_transaction();
        state.write_to_db(1).unwrap();

        assert_eq!(buffer.read_account(ADDRESS).unwrap(), None);
        let mut kv = buffer.into_inner();
        let table = kv.open(tables::PLAIN_STATE).unwrap();
        assert_eq!(table.get(ADDRESS.as_slice()).unwrap(), None);
    }

    #[test]
    fn untouched_live_accounts_stay_out_of_the_sweep() {
        let mut kv = MemoryKv::default();
        seed_account(&mut kv, ADDRESS, Account::with_balance(U256::from(1u64)));
        let mut buffer = Buffer::new(kv, None);
        let mut state = IntraBlockState::new(&mut buffer);

        state.add_to_balance(ADDRESS, U256::ZERO).unwrap();
        state.destruct_touched_dead().unwrap();

        assert!(state.exists(ADDRESS).unwrap());
    }

    #[test]
    fn new_code_reaches_the_code_tables() {
        let mut buffer = Buffer::new(MemoryKv::default(), None);
        let mut state = IntraBlockState::new(&mut buffer);
        let code = Bytes::from_static(b"\x60\x01\x60\x02");

        state.create_contract(ADDRESS).unwrap();
        state.set_code(ADDRESS, code.clone()).unwrap();
        state.finalize_transaction();
        state.write_to_db(1).unwrap();

        assert_eq!(buffer.read_code(keccak256(&code)).unwrap(), code);
    }
}
