//! Fee, refund and reward schedule parameters.
//!
//! Names follow the Yellow Paper where it defines them.

use alloy_primitives::U256;

/// Paid for every transaction.
pub const G_TRANSACTION: u64 = 21_000;

/// Additionally paid for a contract-creating transaction, from Homestead on.
pub const G_TX_CREATE: u64 = 32_000;

/// Paid per zero byte of transaction data.
pub const G_TX_DATA_ZERO: u64 = 4;

/// Paid per non-zero byte of transaction data before Istanbul.
pub const G_TX_DATA_NON_ZERO_FRONTIER: u64 = 68;

/// Paid per non-zero byte of transaction data from Istanbul on (EIP-2028).
pub const G_TX_DATA_NON_ZERO_ISTANBUL: u64 = 16;

/// Refund granted per self-destructed account.
pub const R_SELF_DESTRUCT: u64 = 24_000;

/// Static block reward up to Byzantium: 5 ETH.
pub const FRONTIER_BLOCK_REWARD: U256 = U256::from_limbs([5_000_000_000_000_000_000, 0, 0, 0]);

/// Static block reward from Byzantium on (EIP-649): 3 ETH.
pub const BYZANTIUM_BLOCK_REWARD: U256 = U256::from_limbs([3_000_000_000_000_000_000, 0, 0, 0]);

/// Static block reward from Constantinople on (EIP-1234): 2 ETH.
pub const CONSTANTINOPLE_BLOCK_REWARD: U256 = U256::from_limbs([2_000_000_000_000_000_000, 0, 0, 0]);
