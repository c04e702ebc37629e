//! Contract for the durable ordered key-value store.
//!
//! The execution core is written against these traits only; production
//! backends (mdbx and friends) live with the embedder, while
//! [`MemoryKv`](crate::mem::MemoryKv) serves the tests.

use crate::tables::TableId;
use primitives::Bytes;

/// Failures surfaced by a store backend or by decoding what it returned.
///
/// A plain miss is not an error; reads of absent keys yield `None` or the
/// type's default further up the stack.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// The backend reported a failure.
    #[error("kv backend: {0}")]
    Backend(String),
    /// A table entry does not parse as what the schema says it holds.
    #[error("malformed entry in table {0}")]
    Malformed(&'static str),
    #[error(transparent)]
    Account(#[from] primitives::AccountDecodeError),
    #[error(transparent)]
    ChangeSet(#[from] crate::changes::ChangeDecodeError),
}

/// One open table inside a [`Transaction`].
///
/// Tables flagged [`dup_sort`](TableId::dup_sort) hold multiple sorted data
/// items per key; the `*_dup` operations address an item by a prefix of its
/// data, mirroring the dupsort surface of the ordered stores this contract
/// abstracts.
pub trait Table {
    /// Returns the value under `key`; for dup-sorted tables, the first
    /// data item.
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, DbError>;

    /// Returns the first data item under `key` that starts with `sub_key`,
    /// `sub_key` prefix included.
    fn get_dup(&self, key: &[u8], sub_key: &[u8]) -> Result<Option<Bytes>, DbError>;

    /// Stores `value` under `key`: replaces the existing value in a plain
    /// table, adds a data item in a dup-sorted one.
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), DbError>;

    /// Removes `key` and everything stored under it.
    fn delete(&mut self, key: &[u8]) -> Result<(), DbError>;

    /// Removes the data item under `key` that starts with `sub_key`, if any.
    fn delete_dup(&mut self, key: &[u8], sub_key: &[u8]) -> Result<(), DbError>;

    /// Returns the first `(key, value)` entry at or after `key`.
    fn seek(&self, key: &[u8]) -> Result<Option<(Bytes, Bytes)>, DbError>;
}

/// A store transaction, able to open tables by identity.
///
/// Exactly one [`Buffer`](crate::Buffer) owns a transaction for the duration
/// of a block; the embedder commits or discards it after the buffer has
/// flushed.
pub trait Transaction {
    /// Handle to an open table, borrowing the transaction.
    type TableHandle<'tx>: Table
    where
        Self: 'tx;

    /// Opens `table`, creating it on first use where the backend allows.
    fn open(&mut self, table: TableId) -> Result<Self::TableHandle<'_>, DbError>;
}
