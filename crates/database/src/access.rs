//! Read path against the durable store: current plain state, plus the
//! change-set-replay view of historical blocks.
//!
//! The historical view walks the change-set tables forward from the block
//! after the requested one; the first pre-image found is the value the
//! requested block saw, and absence of any later change means the current
//! plain state still holds.

use crate::changes::{AccountChanges, StorageChanges};
use crate::keys::{b256_from_zeroless, block_number_key, plain_storage_key, storage_prefix};
use crate::kv::{DbError, Table, Transaction};
use crate::tables;
use primitives::constants::HASH_LENGTH;
use primitives::{Account, Address, Bytes, B256};

/// Reads the account as of `historical_block`, or from the current state.
pub fn read_account<T: Transaction>(
    txn: &mut T,
    address: Address,
    historical_block: Option<u64>,
) -> Result<Option<Account>, DbError> {
    if let Some(block_number) = historical_block {
        let table = txn.open(tables::PLAIN_ACCOUNT_CHANGE_SET)?;
        let mut key = block_number_key(block_number + 1);
        while let Some((entry_key, entry)) = table.seek(&key)? {
            let changes = AccountChanges::decode(&entry)?;
            if let Some(pre_image) = changes.get(&address) {
                return Ok(Account::decode_for_storage(pre_image)?);
            }
            key = next_key(&entry_key);
        }
    }

    let table = txn.open(tables::PLAIN_STATE)?;
    match table.get(address.as_slice())? {
        Some(encoded) => Ok(Account::decode_for_storage(&encoded)?),
        None => Ok(None),
    }
}

/// Reads the storage slot as of `historical_block`, or from the current
/// state. Absent slots read as zero.
pub fn read_storage<T: Transaction>(
    txn: &mut T,
    address: Address,
    incarnation: u64,
    slot: B256,
    historical_block: Option<u64>,
) -> Result<B256, DbError> {
    if let Some(block_number) = historical_block {
        let table = txn.open(tables::PLAIN_STORAGE_CHANGE_SET)?;
        let full_key = plain_storage_key(address, incarnation, slot);
        let mut key = block_number_key(block_number + 1);
        while let Some((entry_key, entry)) = table.seek(&key)? {
            let changes = StorageChanges::decode(&entry)?;
            if let Some(pre_image) = changes.get(&full_key) {
                return b256_from_zeroless(pre_image)
                    .ok_or(DbError::Malformed(tables::PLAIN_STORAGE_CHANGE_SET.name));
            }
            key = next_key(&entry_key);
        }
    }

    let table = txn.open(tables::PLAIN_STATE)?;
    let prefix = storage_prefix(address, incarnation);
    match table.get_dup(&prefix, slot.as_slice())? {
        Some(entry) => {
            // Data item layout: slot || zero-stripped value.
            let value = entry
                .get(HASH_LENGTH..)
                .ok_or(DbError::Malformed(tables::PLAIN_STATE.name))?;
            b256_from_zeroless(value).ok_or(DbError::Malformed(tables::PLAIN_STATE.name))
        }
        None => Ok(B256::ZERO),
    }
}

/// Reads contract code by hash; unknown hashes read as empty code.
pub fn read_code<T: Transaction>(txn: &mut T, code_hash: B256) -> Result<Bytes, DbError> {
    let table = txn.open(tables::CODE)?;
    Ok(table.get(code_hash.as_slice())?.unwrap_or_default())
}

/// Reads the previous non-zero incarnation of a self-destructed account;
/// 0 if none was ever recorded.
pub fn read_previous_incarnation<T: Transaction>(
    txn: &mut T,
    address: Address,
) -> Result<u64, DbError> {
    let table = txn.open(tables::INCARNATION_MAP)?;
    match table.get(address.as_slice())? {
        Some(encoded) => {
            let be: [u8; 8] = encoded
                .as_ref()
                .try_into()
                .map_err(|_| DbError::Malformed(tables::INCARNATION_MAP.name))?;
            Ok(u64::from_be_bytes(be))
        }
        None => Ok(0),
    }
}

fn next_key(key: &[u8]) -> Vec<u8> {
    let mut next = Vec::with_capacity(key.len() + 1);
    next.extend_from_slice(key);
    next.push(0);
    next
}
