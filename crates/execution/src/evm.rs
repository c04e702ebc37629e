use crate::intra_block_state::IntraBlockState;
use database::{kv, DbError};
use primitives::Transaction;

/// Outcome of one interpreter invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallResult {
    /// Whether execution finished without reverting or halting.
    pub success: bool,
    /// Gas remaining out of the allowance passed to [`Evm::execute`].
    pub gas_left: u64,
}

/// The bytecode interpreter, consumed as an opaque collaborator.
///
/// An implementation mutates world state only through the passed
/// [`IntraBlockState`] and rolls back its own failed frames via
/// [`IntraBlockState::snapshot`] / [`IntraBlockState::revert_to_snapshot`].
/// A failed transaction is an ordinary [`CallResult`], never an unwind
/// through the processor.
pub trait Evm<T: kv::Transaction> {
    /// Runs `txn` with `gas` available to its bytecode.
    fn execute(
        &mut self,
        state: &mut IntraBlockState<'_, T>,
        txn: &Transaction,
        gas: u64,
    ) -> Result<CallResult, DbError>;
}
