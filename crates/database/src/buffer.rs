//! Write-back cache between the staging state and the durable store.

use crate::changes::{AccountChanges, StorageChanges};
use crate::keys::{block_number_key, plain_storage_key, storage_prefix, zeroless_view};
use crate::kv::{DbError, Table, Transaction};
use crate::{access, tables};
use primitives::constants::HASH_LENGTH;
use primitives::{Account, Address, Bytes, HashSet, B256};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Write-through cache and change-set accumulator over one store
/// transaction.
///
/// Reads come from the dirty maps first and fall through to the store;
/// misses are never cached, a later write installs the value or a tombstone.
/// Writes stay in memory until [`Buffer::write_to_db`] flushes them in
/// deterministic order, together with the block's change-sets. Ordered maps
/// keep the flush output independent of insertion order.
#[derive(Debug)]
pub struct Buffer<T: Transaction> {
    txn: T,
    /// When set, store reads yield the state as of this block.
    historical_block: Option<u64>,

    /// Current accounts; `None` marks a deleted account.
    accounts: BTreeMap<Address, Option<Account>>,
    /// Current storage, per address and incarnation.
    storage: BTreeMap<Address, BTreeMap<u64, BTreeMap<B256, B256>>>,
    /// Previous non-zero incarnation of accounts deleted this batch.
    incarnations: BTreeMap<Address, u64>,
    hash_to_code: BTreeMap<B256, Bytes>,
    storage_prefix_to_code_hash: BTreeMap<(Address, u64), B256>,

    /// Account pre-images of the current block.
    account_back_changes: AccountChanges,
    /// Storage pre-images of the current block.
    storage_back_changes: StorageChanges,
    /// Addresses whose storage changed in the current block.
    changed_storage: HashSet<Address>,
}

impl<T: Transaction> Buffer<T> {
    /// Wraps `txn`; when `historical_block` is set, reads that fall through
    /// to the store see the state as of that block.
    pub fn new(txn: T, historical_block: Option<u64>) -> Self {
        Self {
            txn,
            historical_block,
            accounts: BTreeMap::new(),
            storage: BTreeMap::new(),
            incarnations: BTreeMap::new(),
            hash_to_code: BTreeMap::new(),
            storage_prefix_to_code_hash: BTreeMap::new(),
            account_back_changes: AccountChanges::default(),
            storage_back_changes: StorageChanges::default(),
            changed_storage: HashSet::default(),
        }
    }

    /// Releases the wrapped transaction, e.g. for the embedder to commit.
    pub fn into_inner(self) -> T {
        self.txn
    }

    /// Account pre-images accumulated for the current block.
    pub fn account_back_changes(&self) -> &AccountChanges {
        &self.account_back_changes
    }

    /// Storage pre-images accumulated for the current block.
    pub fn storage_back_changes(&self) -> &StorageChanges {
        &self.storage_back_changes
    }

    pub fn read_account(&mut self, address: Address) -> Result<Option<Account>, DbError> {
        if let Some(account) = self.accounts.get(&address) {
            return Ok(*account);
        }
        access::read_account(&mut self.txn, address, self.historical_block)
    }

    pub fn read_storage(
        &mut self,
        address: Address,
        incarnation: u64,
        slot: B256,
    ) -> Result<B256, DbError> {
        let cached = self
            .storage
            .get(&address)
            .and_then(|epochs| epochs.get(&incarnation))
            .and_then(|slots| slots.get(&slot));
        if let Some(value) = cached {
            return Ok(*value);
        }
        access::read_storage(&mut self.txn, address, incarnation, slot, self.historical_block)
    }

    pub fn read_code(&mut self, code_hash: B256) -> Result<Bytes, DbError> {
        if let Some(code) = self.hash_to_code.get(&code_hash) {
            return Ok(code.clone());
        }
        access::read_code(&mut self.txn, code_hash)
    }

    /// Previous non-zero incarnation of a self-destructed account; 0 if the
    /// address never hosted a destructed contract.
    pub fn previous_incarnation(&mut self, address: Address) -> Result<u64, DbError> {
        if let Some(incarnation) = self.incarnations.get(&address) {
            return Ok(*incarnation);
        }
        access::read_previous_incarnation(&mut self.txn, address)
    }

    /// Stages the transition of one account from its state at the start of
    /// the block (`initial`) to its state at the end (`current`, `None` for
    /// a deleted account).
    ///
    /// The pre-image lands in the account change-set when the account
    /// changed, was deleted, or had its storage touched this block; an
    /// untouched account stages nothing.
    pub fn update_account(
        &mut self,
        address: Address,
        initial: Option<Account>,
        current: Option<Account>,
    ) {
        let equal = current == initial;
        let account_deleted = current.is_none();

        if equal && !account_deleted && !self.changed_storage.contains(&address) {
            return;
        }

        let omit_code_hash = !account_deleted;
        let pre_image = initial
            .as_ref()
            .map(|account| account.encode_for_storage(omit_code_hash))
            .unwrap_or_default();
        self.account_back_changes.insert_first(address, pre_image);

        if equal {
            return;
        }

        self.accounts.insert(address, current);

        if account_deleted {
            if let Some(initial) = initial {
                if initial.incarnation > 0 {
                    self.incarnations.entry(address).or_insert(initial.incarnation);
                }
            }
        }
    }

    /// Stages newly deployed contract code.
    pub fn update_account_code(
        &mut self,
        address: Address,
        incarnation: u64,
        code_hash: B256,
        code: Bytes,
    ) {
        // Content-addressed; a repeat insert necessarily carries the same
        // value, so the first write stands.
        self.hash_to_code.entry(code_hash).or_insert(code);
        self.storage_prefix_to_code_hash
            .entry((address, incarnation))
            .or_insert(code_hash);
    }

    /// Stages the transition of one storage slot. A no-op when the value
    /// did not change.
    pub fn update_storage(
        &mut self,
        address: Address,
        incarnation: u64,
        slot: B256,
        initial: B256,
        current: B256,
    ) {
        if current == initial {
            return;
        }
        self.changed_storage.insert(address);

        let full_key = plain_storage_key(address, incarnation, slot);
        self.storage_back_changes
            .insert_first(full_key, Bytes::copy_from_slice(zeroless_view(&initial)));

        self.storage
            .entry(address)
            .or_default()
            .entry(incarnation)
            .or_default()
            .insert(slot, current);
    }

    /// Flushes everything staged into the store:
    ///
    /// 1. state-table upserts,
    /// 2. the incarnation map,
    /// 3. the code table,
    /// 4. the plain contract-code map,
    /// 5. the account change-set under the block key,
    /// 6. the storage change-set under the block key, if non-empty.
    ///
    /// The per-block change accumulators reset afterwards; the dirty caches
    /// stay and keep serving reads.
    pub fn write_to_db(&mut self, block_number: u64) -> Result<(), DbError> {
        debug!(
            block_number,
            accounts = self.accounts.len(),
            changed_accounts = self.account_back_changes.len(),
            changed_slots = self.storage_back_changes.len(),
            "flushing state buffer"
        );

        self.write_to_state_table()?;

        {
            let mut table = self.txn.open(tables::INCARNATION_MAP)?;
            for (address, incarnation) in &self.incarnations {
                table.put(address.as_slice(), &incarnation.to_be_bytes())?;
            }
        }
        {
            let mut table = self.txn.open(tables::CODE)?;
            for (code_hash, code) in &self.hash_to_code {
                table.put(code_hash.as_slice(), code)?;
            }
        }
        {
            let mut table = self.txn.open(tables::PLAIN_CONTRACT_CODE)?;
            for ((address, incarnation), code_hash) in &self.storage_prefix_to_code_hash {
                table.put(&storage_prefix(*address, *incarnation), code_hash.as_slice())?;
            }
        }

        let block_key = block_number_key(block_number);
        {
            let mut table = self.txn.open(tables::PLAIN_ACCOUNT_CHANGE_SET)?;
            table.put(&block_key, &self.account_back_changes.encode())?;
        }
        if !self.storage_back_changes.is_empty() {
            let mut table = self.txn.open(tables::PLAIN_STORAGE_CHANGE_SET)?;
            table.put(&block_key, &self.storage_back_changes.encode())?;
        }

        self.account_back_changes.clear();
        self.storage_back_changes.clear();
        self.changed_storage.clear();

        Ok(())
    }

    /// Upserts the ordered union of dirty accounts and dirty storage into
    /// the state table: per address first the account row (delete, then put
    /// if alive), then every staged slot of every incarnation.
    fn write_to_state_table(&mut self) -> Result<(), DbError> {
        let mut table = self.txn.open(tables::PLAIN_STATE)?;

        let keys: BTreeSet<Address> = self
            .accounts
            .keys()
            .chain(self.storage.keys())
            .copied()
            .collect();

        for address in keys {
            if let Some(account) = self.accounts.get(&address) {
                table.delete(address.as_slice())?;
                if let Some(account) = account {
                    table.put(address.as_slice(), &account.encode_for_storage(false))?;
                }
            }

            if let Some(epochs) = self.storage.get(&address) {
                for (incarnation, slots) in epochs {
                    let prefix = storage_prefix(address, *incarnation);
                    for (slot, value) in slots {
                        upsert_storage_value(&mut table, &prefix, slot, value)?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn upsert_storage_value(
    table: &mut impl Table,
    prefix: &[u8],
    slot: &B256,
    value: &B256,
) -> Result<(), DbError> {
    table.delete_dup(prefix, slot.as_slice())?;
    if !value.is_zero() {
        let stripped = zeroless_view(value);
        let mut entry = Vec::with_capacity(HASH_LENGTH + stripped.len());
        entry.extend_from_slice(slot.as_slice());
        entry.extend_from_slice(stripped);
        table.put(prefix, &entry)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::MemoryKv;
    use primitives::{address, b256, U256};

    fn contract_account(incarnation: u64) -> Account {
        Account {
            nonce: 1,
            balance: U256::from(100u64),
            code_hash: b256!("4ff996088d4a71a245b1a52e0521cc47a84e297c1ec880cb4d29306ce2b05a48"),
            incarnation,
        }
    }

    #[test]
    fn unchanged_account_stages_nothing() {
        let mut buffer = Buffer::new(MemoryKv::default(), None);
        let address = address!("9cbb0597a1ff0a35778ba4b378d2b48f40c7f7cb");
        let account = Account::with_balance(U256::from(7u64));

        buffer.update_account(address, Some(account), Some(account));
        assert!(buffer.account_back_changes().is_empty());
        buffer.write_to_db(1).unwrap();

        let table = buffer.txn.open(tables::PLAIN_STATE).unwrap();
        assert_eq!(table.get(address.as_slice()).unwrap(), None);
    }

    #[test]
    fn storage_touch_forces_account_pre_image() {
        let mut buffer = Buffer::new(MemoryKv::default(), None);
        let address = address!("9cbb0597a1ff0a35778ba4b378d2b48f40c7f7cb");
        let account = contract_account(1);
        let slot = b256!("0000000000000000000000000000000000000000000000000000000000000001");

        buffer.update_storage(address, 1, slot, B256::ZERO, B256::with_last_byte(3));
        buffer.update_account(address, Some(account), Some(account));

        let pre_image = buffer.account_back_changes().get(&address).unwrap();
        assert_eq!(
            Account::decode_for_storage(pre_image).unwrap().unwrap().incarnation,
            1
        );
    }

    #[test]
    fn deletion_records_previous_incarnation_once() {
        let mut buffer = Buffer::new(MemoryKv::default(), None);
        let address = address!("9cbb0597a1ff0a35778ba4b378d2b48f40c7f7cb");

        buffer.update_account(address, Some(contract_account(2)), None);
        buffer.update_account(address, Some(contract_account(5)), None);

        assert_eq!(buffer.previous_incarnation(address).unwrap(), 2);
        assert_eq!(buffer.read_account(address).unwrap(), None);
    }

    #[test]
    fn storage_pre_image_keeps_first_initial() {
        let mut buffer = Buffer::new(MemoryKv::default(), None);
        let address = address!("9cbb0597a1ff0a35778ba4b378d2b48f40c7f7cb");
        let slot = b256!("0000000000000000000000000000000000000000000000000000000000000001");
        let v1 = B256::with_last_byte(1);
        let v2 = B256::with_last_byte(2);

        buffer.update_storage(address, 1, slot, B256::ZERO, v1);
        buffer.update_storage(address, 1, slot, v1, v2);

        let key = plain_storage_key(address, 1, slot);
        assert_eq!(
            buffer.storage_back_changes().get(&key).map(|b| b.as_ref()),
            Some(&[][..])
        );
        assert_eq!(buffer.read_storage(address, 1, slot).unwrap(), v2);
    }

    #[test]
    fn write_to_db_flushes_state_and_change_sets() {
        let mut buffer = Buffer::new(MemoryKv::default(), None);
        let address = address!("9cbb0597a1ff0a35778ba4b378d2b48f40c7f7cb");
        let account = contract_account(1);
        let slot = b256!("0000000000000000000000000000000000000000000000000000000000000001");
        let value = B256::with_last_byte(42);

        buffer.update_account(address, None, Some(account));
        buffer.update_storage(address, 1, slot, B256::ZERO, value);
        buffer.write_to_db(7).unwrap();

        // Change accumulators reset for the next block.
        assert!(buffer.account_back_changes().is_empty());
        assert!(buffer.storage_back_changes().is_empty());

        let mut kv = buffer.into_inner();
        {
            let table = kv.open(tables::PLAIN_STATE).unwrap();
            let row = table.get(address.as_slice()).unwrap().unwrap();
            assert_eq!(Account::decode_for_storage(&row).unwrap(), Some(account));

            let prefix = storage_prefix(address, 1);
            let entry = table.get_dup(&prefix, slot.as_slice()).unwrap().unwrap();
            assert_eq!(&entry[..32], slot.as_slice());
            assert_eq!(&entry[32..], [42]);
        }
        {
            let table = kv.open(tables::PLAIN_ACCOUNT_CHANGE_SET).unwrap();
            let entry = table.get(&block_number_key(7)).unwrap().unwrap();
            let changes = AccountChanges::decode(&entry).unwrap();
            // The account did not exist before the block.
            assert_eq!(changes.get(&address).map(|b| b.len()), Some(0));
        }
        {
            let table = kv.open(tables::PLAIN_STORAGE_CHANGE_SET).unwrap();
            let entry = table.get(&block_number_key(7)).unwrap().unwrap();
            let changes = StorageChanges::decode(&entry).unwrap();
            let key = plain_storage_key(address, 1, slot);
            assert_eq!(changes.get(&key).map(|b| b.len()), Some(0));
        }
    }

    #[test]
    fn zero_storage_value_removes_the_row() {
        let mut buffer = Buffer::new(MemoryKv::default(), None);
        let address = address!("9cbb0597a1ff0a35778ba4b378d2b48f40c7f7cb");
        let slot = b256!("0000000000000000000000000000000000000000000000000000000000000001");
        let value = B256::with_last_byte(9);

        buffer.update_storage(address, 1, slot, B256::ZERO, value);
        buffer.write_to_db(1).unwrap();
        buffer.update_storage(address, 1, slot, value, B256::ZERO);
        buffer.write_to_db(2).unwrap();

        let mut kv = buffer.into_inner();
        let table = kv.open(tables::PLAIN_STATE).unwrap();
        let prefix = storage_prefix(address, 1);
        assert_eq!(table.get_dup(&prefix, slot.as_slice()).unwrap(), None);
    }

    #[test]
    fn historical_reads_replay_change_sets() {
        let mut buffer = Buffer::new(MemoryKv::default(), None);
        let address = address!("9cbb0597a1ff0a35778ba4b378d2b48f40c7f7cb");

        // Block 5 changes the balance from 10 to 20, block 8 from 20 to 30.
        let v10 = Account::with_balance(U256::from(10u64));
        let v20 = Account::with_balance(U256::from(20u64));
        let v30 = Account::with_balance(U256::from(30u64));
        buffer.update_account(address, Some(v10), Some(v20));
        buffer.write_to_db(5).unwrap();
        buffer.update_account(address, Some(v20), Some(v30));
        buffer.write_to_db(8).unwrap();

        let kv = buffer.into_inner();
        let mut historical = Buffer::new(kv, Some(4));
        assert_eq!(historical.read_account(address).unwrap(), Some(v10));

        let kv = historical.into_inner();
        let mut historical = Buffer::new(kv, Some(6));
        assert_eq!(historical.read_account(address).unwrap(), Some(v20));

        let kv = historical.into_inner();
        let mut latest = Buffer::new(kv, None);
        assert_eq!(latest.read_account(address).unwrap(), Some(v30));
    }
}
