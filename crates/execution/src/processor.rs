//! Drives block execution: protocol checks, gas accounting, rewards and
//! receipt assembly around the opaque interpreter.

use crate::dao;
use crate::evm::Evm;
use crate::intra_block_state::IntraBlockState;
use crate::ExecutionError;
use database::{kv, DbError};
use primitives::{
    address, fee, logs_bloom, Address, Block, ChainConfig, Receipt, Transaction, U256,
};
use tracing::trace;

/// Subject of the Yellow Paper's Appendix K anomaly: the RIPEMD-160
/// precompile, touched and deleted on the main network.
const RIPEMD_ADDRESS: Address = address!("0000000000000000000000000000000000000003");

/// Protocol violations that abort transaction or block execution.
///
/// Interpreter failures are not validation errors: a failed transaction
/// still consumes gas and produces a receipt.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The transaction carries no recovered sender.
    #[error("missing sender")]
    MissingSender,
    /// Transaction nonce does not match the sender account.
    #[error("invalid nonce")]
    InvalidNonce,
    /// The gas limit does not cover the intrinsic gas.
    #[error("intrinsic gas")]
    IntrinsicGas,
    /// The sender cannot pay `gas_limit * gas_price + value` up front.
    #[error("insufficient funds")]
    InsufficientFunds,
    /// The block has no room left for the transaction's gas limit.
    #[error("block gas limit reached")]
    BlockGasLimitReached,
    /// The receipts do not add up to the header's gas total.
    #[error("gas mismatch for block {block_number}: header has {expected}, computed {computed}")]
    GasMismatch {
        block_number: u64,
        expected: u64,
        computed: u64,
    },
    /// The receipts trie root differs from the header's.
    #[error("receipts root mismatch for block {block_number}")]
    ReceiptsRootMismatch { block_number: u64 },
}

/// Gas charged before any bytecode runs, in 128-bit arithmetic so that the
/// per-byte products cannot overflow.
pub fn intrinsic_gas(txn: &Transaction, homestead: bool, istanbul: bool) -> u128 {
    let mut gas = u128::from(fee::G_TRANSACTION);
    if txn.to.is_none() && homestead {
        gas += u128::from(fee::G_TX_CREATE);
    }

    if txn.data.is_empty() {
        return gas;
    }

    let non_zero_bytes = txn.data.iter().filter(|byte| **byte != 0).count() as u128;
    let non_zero_gas = if istanbul {
        fee::G_TX_DATA_NON_ZERO_ISTANBUL
    } else {
        fee::G_TX_DATA_NON_ZERO_FRONTIER
    };
    gas += non_zero_bytes * u128::from(non_zero_gas);

    let zero_bytes = txn.data.len() as u128 - non_zero_bytes;
    gas + zero_bytes * u128::from(fee::G_TX_DATA_ZERO)
}

/// Executes the transactions of one block, in order, against an
/// [`IntraBlockState`].
#[derive(Debug)]
pub struct ExecutionProcessor<'db, 'env, T: kv::Transaction, E: Evm<T>> {
    state: IntraBlockState<'db, T>,
    evm: &'env mut E,
    block: &'env Block,
    config: &'env ChainConfig,
    cumulative_gas_used: u64,
}

impl<'db, 'env, T: kv::Transaction, E: Evm<T>> ExecutionProcessor<'db, 'env, T, E> {
    pub fn new(
        block: &'env Block,
        state: IntraBlockState<'db, T>,
        config: &'env ChainConfig,
        evm: &'env mut E,
    ) -> Self {
        Self {
            state,
            evm,
            block,
            config,
            cumulative_gas_used: 0,
        }
    }

    /// Gas still available to transactions of this block.
    pub fn available_gas(&self) -> u64 {
        self.block.header.gas_limit - self.cumulative_gas_used
    }

    /// Runs one transaction to completion and assembles its receipt.
    pub fn execute_transaction(&mut self, txn: &Transaction) -> Result<Receipt, ExecutionError> {
        let sender = txn.from.ok_or(ValidationError::MissingSender)?;

        let nonce = self.state.get_nonce(sender)?;
        if nonce != txn.nonce {
            return Err(ValidationError::InvalidNonce.into());
        }

        let block_number = self.block.header.number;
        let homestead = self.config.has_homestead(block_number);
        let spurious_dragon = self.config.has_spurious_dragon(block_number);
        let istanbul = self.config.has_istanbul(block_number);

        let g0 = intrinsic_gas(txn, homestead, istanbul);
        if u128::from(txn.gas_limit) < g0 {
            return Err(ValidationError::IntrinsicGas.into());
        }

        // `gas_limit * gas_price + value` may need more than 256 bits;
        // overflow means no balance can cover it.
        let gas_cost = U256::from(txn.gas_limit)
            .checked_mul(txn.gas_price)
            .ok_or(ValidationError::InsufficientFunds)?;
        let upfront_cost = gas_cost
            .checked_add(txn.value)
            .ok_or(ValidationError::InsufficientFunds)?;
        if self.state.get_balance(sender)? < upfront_cost {
            return Err(ValidationError::InsufficientFunds.into());
        }

        if self.available_gas() < txn.gas_limit {
            return Err(ValidationError::BlockGasLimitReached.into());
        }

        self.state.subtract_from_balance(sender, gas_cost)?;
        if txn.to.is_some() {
            // The interpreter itself bumps the nonce for contract creation.
            self.state.set_nonce(sender, nonce + 1)?;
        }

        self.state.clear_journal_and_substate();

        let vm_result = self
            .evm
            .execute(&mut self.state, txn, txn.gas_limit - g0 as u64)?;

        let gas_used = txn.gas_limit - self.refund_gas(txn, sender, vm_result.gas_left)?;

        // Award the miner.
        let beneficiary = self.block.header.beneficiary;
        self.state
            .add_to_balance(beneficiary, U256::from(gas_used) * txn.gas_price)?;

        self.state.destruct_suicides()?;
        if spurious_dragon {
            self.state.destruct_touched_dead()?;
        }

        self.state.finalize_transaction();

        self.cumulative_gas_used += gas_used;

        trace!(
            gas_used,
            cumulative_gas_used = self.cumulative_gas_used,
            success = vm_result.success,
            "transaction executed"
        );

        Ok(Receipt {
            success: vm_result.success,
            cumulative_gas_used: self.cumulative_gas_used,
            bloom: logs_bloom(self.state.logs()),
            logs: self.state.logs().to_vec(),
        })
    }

    /// Credits the sender for unspent and refunded gas; the refund is
    /// capped at half the gas consumed. Returns the final `gas_left`.
    fn refund_gas(
        &mut self,
        txn: &Transaction,
        sender: Address,
        gas_left: u64,
    ) -> Result<u64, DbError> {
        let refund = ((txn.gas_limit - gas_left) / 2).min(self.state.total_refund());
        let gas_left = gas_left + refund;
        self.state
            .add_to_balance(sender, U256::from(gas_left) * txn.gas_price)?;
        Ok(gas_left)
    }

    /// Executes the whole block and writes the post-state into the buffer.
    pub fn execute_block(&mut self) -> Result<Vec<Receipt>, ExecutionError> {
        let block = self.block;
        let config = self.config;
        let block_number = block.header.number;

        if let Some(dao_config) = &config.dao {
            if dao_config.block_number == block_number {
                dao::transfer_balances(&mut self.state, dao_config)?;
            }
        }

        self.cumulative_gas_used = 0;
        let mut receipts = Vec::with_capacity(block.transactions.len());
        for txn in &block.transactions {
            receipts.push(self.execute_transaction(txn)?);
        }

        self.apply_rewards()?;

        // Yellow Paper, Appendix K: anomalies on the main network.
        if config.ripemd_deletion_block == Some(block_number) {
            self.state.destruct(RIPEMD_ADDRESS)?;
        }

        self.state.write_to_db(block_number)?;

        Ok(receipts)
    }

    /// Pays the fork-selected block reward to the beneficiary and the
    /// distance-scaled share to each ommer's beneficiary.
    fn apply_rewards(&mut self) -> Result<(), DbError> {
        let block = self.block;
        let block_number = block.header.number;
        let block_reward = if self.config.has_constantinople(block_number) {
            fee::CONSTANTINOPLE_BLOCK_REWARD
        } else if self.config.has_byzantium(block_number) {
            fee::BYZANTIUM_BLOCK_REWARD
        } else {
            fee::FRONTIER_BLOCK_REWARD
        };

        let mut miner_reward = block_reward;
        for ommer in &block.ommers {
            let distance_factor = (8 + ommer.number).saturating_sub(block_number);
            let ommer_reward = (U256::from(distance_factor) * block_reward) >> 3;
            self.state.add_to_balance(ommer.beneficiary, ommer_reward)?;
            miner_reward += block_reward / U256::from(32);
        }

        self.state
            .add_to_balance(block.header.beneficiary, miner_reward)?;
        Ok(())
    }
}
