//! Widely used constants.

use alloy_primitives::{b256, B256};

/// Keccak-256 hash of the empty byte string.
///
/// The `code_hash` of every account without code.
pub const KECCAK_EMPTY: B256 =
    b256!("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470");

/// Root hash of an empty trie.
pub const EMPTY_ROOT: B256 =
    b256!("56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421");

/// Byte length of an [`Address`](alloy_primitives::Address).
pub const ADDRESS_LENGTH: usize = 20;

/// Byte length of a [`B256`] hash.
pub const HASH_LENGTH: usize = 32;

/// Byte length of a big-endian incarnation number.
pub const INCARNATION_LENGTH: usize = core::mem::size_of::<u64>();

/// 10^9, one gwei in wei.
pub const GIGA: u64 = 1_000_000_000;

/// 10^18, one ether in wei.
pub const ETHER: u64 = GIGA * GIGA;
