//! # stele-database
//!
//! The write-back side of the execution core: a [`Buffer`] that caches reads
//! from, and stages writes to, an ordered key-value store, accumulating
//! per-block change-sets along the way.
//!
//! The store itself stays behind the [`kv`] contract; [`mem`] provides the
//! in-memory implementation the test suite runs against.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod access;
mod buffer;
pub mod changes;
pub mod keys;
pub mod kv;
pub mod mem;
pub mod tables;

pub use buffer::Buffer;
pub use changes::{AccountChanges, StorageChanges};
pub use kv::{DbError, Table, Transaction};
pub use mem::MemoryKv;
