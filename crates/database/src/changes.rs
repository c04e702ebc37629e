//! Per-block change-sets: the pre-image of every account and storage slot
//! mutated in a block, keyed under the block number in the store.
//!
//! Pre-images record the value at the *start* of the block; the first write
//! wins, later writes to the same key are ignored. Replaying change-sets
//! forward is what makes historical state queries possible.

use crate::keys::PLAIN_STORAGE_KEY_LENGTH;
use primitives::constants::ADDRESS_LENGTH;
use primitives::{Address, Bytes};
use std::collections::BTreeMap;

/// Failure to decode a change-set table entry.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ChangeDecodeError {
    /// The input ends in the middle of an entry.
    #[error("change-set ends mid-entry")]
    UnexpectedEnd,
    /// Input continues after the announced number of entries.
    #[error("{0} trailing bytes after the last change-set entry")]
    TrailingBytes(usize),
}

/// Ordered map from address to the account's encoded pre-image.
///
/// An empty pre-image means the account did not exist at the start of the
/// block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountChanges(BTreeMap<Address, Bytes>);

impl AccountChanges {
    /// Records `pre_image` for `address` unless one is already present.
    pub fn insert_first(&mut self, address: Address, pre_image: Bytes) {
        self.0.entry(address).or_insert(pre_image);
    }

    pub fn get(&self, address: &Address) -> Option<&Bytes> {
        self.0.get(address)
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.0.contains_key(address)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &Bytes)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Serializes the set: a `u32` entry count, then per entry the address
    /// followed by a `u32`-length-prefixed pre-image.
    pub fn encode(&self) -> Bytes {
        let mut buffer = encode_header(self.0.len());
        for (address, pre_image) in &self.0 {
            buffer.extend_from_slice(address.as_slice());
            buffer.extend_from_slice(&(pre_image.len() as u32).to_be_bytes());
            buffer.extend_from_slice(pre_image);
        }
        buffer.into()
    }

    /// Deserializes [`Self::encode`] output.
    pub fn decode(mut encoded: &[u8]) -> Result<Self, ChangeDecodeError> {
        let count = take_count(&mut encoded)?;
        let mut changes = BTreeMap::new();
        for _ in 0..count {
            let address = Address::from_slice(take(&mut encoded, ADDRESS_LENGTH)?);
            let pre_image = take_value(&mut encoded)?;
            changes.insert(address, pre_image);
        }
        finish(encoded)?;
        Ok(Self(changes))
    }
}

/// Ordered map from the full storage key (`address || incarnation || slot`)
/// to the slot's zero-stripped pre-image.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StorageChanges(BTreeMap<[u8; PLAIN_STORAGE_KEY_LENGTH], Bytes>);

impl StorageChanges {
    /// Records `pre_image` for `key` unless one is already present.
    pub fn insert_first(&mut self, key: [u8; PLAIN_STORAGE_KEY_LENGTH], pre_image: Bytes) {
        self.0.entry(key).or_insert(pre_image);
    }

    pub fn get(&self, key: &[u8; PLAIN_STORAGE_KEY_LENGTH]) -> Option<&Bytes> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8; PLAIN_STORAGE_KEY_LENGTH], &Bytes)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Serializes the set: a `u32` entry count, then per entry the full
    /// storage key followed by a `u32`-length-prefixed pre-image.
    pub fn encode(&self) -> Bytes {
        let mut buffer = encode_header(self.0.len());
        for (key, pre_image) in &self.0 {
            buffer.extend_from_slice(key);
            buffer.extend_from_slice(&(pre_image.len() as u32).to_be_bytes());
            buffer.extend_from_slice(pre_image);
        }
        buffer.into()
    }

    /// Deserializes [`Self::encode`] output.
    pub fn decode(mut encoded: &[u8]) -> Result<Self, ChangeDecodeError> {
        let count = take_count(&mut encoded)?;
        let mut changes = BTreeMap::new();
        for _ in 0..count {
            let mut key = [0; PLAIN_STORAGE_KEY_LENGTH];
            key.copy_from_slice(take(&mut encoded, PLAIN_STORAGE_KEY_LENGTH)?);
            let pre_image = take_value(&mut encoded)?;
            changes.insert(key, pre_image);
        }
        finish(encoded)?;
        Ok(Self(changes))
    }
}

fn encode_header(count: usize) -> Vec<u8> {
    let mut buffer = Vec::new();
    buffer.extend_from_slice(&(count as u32).to_be_bytes());
    buffer
}

fn take<'a>(encoded: &mut &'a [u8], len: usize) -> Result<&'a [u8], ChangeDecodeError> {
    if encoded.len() < len {
        return Err(ChangeDecodeError::UnexpectedEnd);
    }
    let (bytes, rest) = encoded.split_at(len);
    *encoded = rest;
    Ok(bytes)
}

fn take_count(encoded: &mut &[u8]) -> Result<usize, ChangeDecodeError> {
    let be = take(encoded, 4)?;
    Ok(u32::from_be_bytes([be[0], be[1], be[2], be[3]]) as usize)
}

fn take_value(encoded: &mut &[u8]) -> Result<Bytes, ChangeDecodeError> {
    let len = take_count(encoded)?;
    Ok(Bytes::copy_from_slice(take(encoded, len)?))
}

fn finish(encoded: &[u8]) -> Result<(), ChangeDecodeError> {
    if encoded.is_empty() {
        Ok(())
    } else {
        Err(ChangeDecodeError::TrailingBytes(encoded.len()))
    }
}
