//! # stele-execution
//!
//! The state-transition function of the execution core: an
//! [`IntraBlockState`] staging layer with journaled undo, and an
//! [`ExecutionProcessor`] replaying a block's transactions through an
//! opaque [`Evm`] against it. The resulting world state drains into a
//! [`Buffer`](database::Buffer), which the caller flushes and commits.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod dao;
mod delta;
mod evm;
mod intra_block_state;
mod object;
mod processor;

pub use delta::Delta;
pub use evm::{CallResult, Evm};
pub use intra_block_state::{IntraBlockState, Snapshot};
pub use object::{CommittedValue, StateObject};
pub use processor::{intrinsic_gas, ExecutionProcessor, ValidationError};

use database::{Buffer, DbError};
use primitives::{Block, ChainConfig, Receipt, B256};

/// Errors aborting block execution. On either kind the caller discards the
/// store transaction; there is no partial commit.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Db(#[from] DbError),
}

/// Executes `block` on top of `buffer`, writes the post-state back, and
/// returns the per-transaction receipts.
///
/// `receipts_root` supplies the trie root over the receipts; it is consulted
/// only when Byzantium is active for this block, since trie construction
/// stays with the caller.
pub fn execute_block<T, E, F>(
    block: &Block,
    buffer: &mut Buffer<T>,
    config: &ChainConfig,
    evm: &mut E,
    receipts_root: F,
) -> Result<Vec<Receipt>, ExecutionError>
where
    T: database::kv::Transaction,
    E: Evm<T>,
    F: FnOnce(&[Receipt]) -> B256,
{
    let block_number = block.header.number;

    let state = IntraBlockState::new(buffer);
    let mut processor = ExecutionProcessor::new(block, state, config, evm);
    let receipts = processor.execute_block()?;

    let computed = receipts
        .last()
        .map_or(0, |receipt| receipt.cumulative_gas_used);
    if computed != block.header.gas_used {
        return Err(ValidationError::GasMismatch {
            block_number,
            expected: block.header.gas_used,
            computed,
        }
        .into());
    }

    if config.has_byzantium(block_number) && receipts_root(&receipts) != block.header.receipts_root
    {
        return Err(ValidationError::ReceiptsRootMismatch { block_number }.into());
    }

    Ok(receipts)
}
