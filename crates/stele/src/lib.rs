//! # stele
//!
//! An Ethereum-compatible block execution core. Replaying a validated
//! block's transactions against a prior world state yields the next world
//! state plus per-transaction receipts:
//!
//! - [`IntraBlockState`] stages accounts, storage, code, logs, refunds and
//!   self-destructs during a transaction, with nested snapshot/revert
//!   journaling for the interpreter's call frames.
//! - [`Buffer`] sits between the staging layer and the durable ordered
//!   key-value store: a write-through cache accumulating per-block
//!   change-sets, flushed in deterministic order.
//! - [`ExecutionProcessor`] drives a block to completion: intrinsic gas,
//!   preflight checks, fork-conditional semantics, rewards and receipts.
//!
//! The bytecode interpreter is consumed through the [`Evm`] trait; the
//! store stays behind [`database::kv`]. Block execution is strictly
//! sequential per block, and one `(IntraBlockState, Buffer, transaction)`
//! triple is owned by one caller at a time.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub use database;
pub use execution;
pub use primitives;

pub use database::{Buffer, DbError, MemoryKv};
pub use execution::{
    execute_block, CallResult, Evm, ExecutionError, ExecutionProcessor, IntraBlockState,
    ValidationError,
};
pub use primitives::{
    Account, Block, BlockHeader, ChainConfig, DaoConfig, Receipt, Transaction,
};
