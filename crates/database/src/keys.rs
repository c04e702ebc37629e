//! Key and value codecs shared by the state tables and change-sets.

use primitives::constants::{ADDRESS_LENGTH, HASH_LENGTH, INCARNATION_LENGTH};
use primitives::{Address, B256};

/// `address || incarnation`, the row key of one storage epoch.
pub const STORAGE_PREFIX_LENGTH: usize = ADDRESS_LENGTH + INCARNATION_LENGTH;

/// `address || incarnation || slot`, the change-set key of one storage slot.
pub const PLAIN_STORAGE_KEY_LENGTH: usize = STORAGE_PREFIX_LENGTH + HASH_LENGTH;

/// Builds the storage row key of a contract's storage epoch.
pub fn storage_prefix(address: Address, incarnation: u64) -> [u8; STORAGE_PREFIX_LENGTH] {
    let mut prefix = [0; STORAGE_PREFIX_LENGTH];
    prefix[..ADDRESS_LENGTH].copy_from_slice(address.as_slice());
    prefix[ADDRESS_LENGTH..].copy_from_slice(&incarnation.to_be_bytes());
    prefix
}

/// Builds the full change-set key of one storage slot.
pub fn plain_storage_key(
    address: Address,
    incarnation: u64,
    slot: B256,
) -> [u8; PLAIN_STORAGE_KEY_LENGTH] {
    let mut key = [0; PLAIN_STORAGE_KEY_LENGTH];
    key[..STORAGE_PREFIX_LENGTH].copy_from_slice(&storage_prefix(address, incarnation));
    key[STORAGE_PREFIX_LENGTH..].copy_from_slice(slot.as_slice());
    key
}

/// Encodes a block number as a change-set table key.
///
/// The top three bits of the first byte carry the byte count, the rest is
/// the big-endian value, so lexicographic key order equals numeric order.
/// Numbers up to 2^53 - 1 are representable, far beyond any block height.
pub fn block_number_key(block_number: u64) -> Vec<u8> {
    debug_assert!(block_number < 1 << 53);
    let mut byte_count = 1;
    let mut limit: u64 = 32;
    while byte_count < 7 && block_number >= limit {
        byte_count += 1;
        limit <<= 8;
    }
    let be = block_number.to_be_bytes();
    let mut key = be[8 - byte_count..].to_vec();
    key[0] |= (byte_count as u8) << 5;
    key
}

/// Strips leading zero bytes; the all-zero word becomes the empty slice.
pub fn zeroless_view(value: &B256) -> &[u8] {
    let zeros = value.iter().take_while(|byte| **byte == 0).count();
    &value.as_slice()[zeros..]
}

/// Left-pads a zero-stripped value back to a 32-byte word.
///
/// `None` if the input is too long to have come from [`zeroless_view`].
pub fn b256_from_zeroless(bytes: &[u8]) -> Option<B256> {
    if bytes.len() > HASH_LENGTH {
        return None;
    }
    let mut value = B256::ZERO;
    value[HASH_LENGTH - bytes.len()..].copy_from_slice(bytes);
    Some(value)
}
