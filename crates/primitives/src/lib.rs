//! # stele-primitives
//!
//! Primitive types and protocol parameters shared by the stele execution
//! core:
//!
//! - [`Account`] and its compact state-table encoding
//! - [`Block`], [`BlockHeader`] and [`Transaction`] value types
//! - [`Receipt`] and the [`logs_bloom`] accumulator
//! - [`ChainConfig`] fork-activation predicates
//! - Gas fee, refund and block-reward parameters
//! - Re-exports of the alloy primitive types for convenience
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod account;
mod block;
pub mod chain;
pub mod constants;
pub mod fee;
mod receipt;

pub use account::{Account, AccountDecodeError};
pub use block::{Block, BlockHeader, Transaction};
pub use chain::{ChainConfig, DaoConfig};
pub use constants::{ADDRESS_LENGTH, EMPTY_ROOT, ETHER, GIGA, HASH_LENGTH, INCARNATION_LENGTH, KECCAK_EMPTY};
pub use receipt::{logs_bloom, Receipt};

// Reexport alloy primitives.

pub use alloy_primitives::map::{self, hash_map, hash_set, HashMap, HashSet};
pub use alloy_primitives::{
    self, address, b256, bytes, fixed_bytes, hex, keccak256, Address, Bloom, Bytes, FixedBytes,
    Log, LogData, B256, U256,
};
