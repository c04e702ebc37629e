//! The DAO hard-fork irregular state change.

use crate::intra_block_state::IntraBlockState;
use database::{kv, DbError};
use primitives::DaoConfig;

/// Moves the balance of every drained account to the refund contract.
///
/// Runs at the fork block before any transaction executes.
pub fn transfer_balances<T: kv::Transaction>(
    state: &mut IntraBlockState<'_, T>,
    config: &DaoConfig,
) -> Result<(), DbError> {
    for address in &config.drained {
        let balance = state.get_balance(*address)?;
        state.add_to_balance(config.beneficiary, balance)?;
        state.subtract_from_balance(*address, balance)?;
    }
    Ok(())
}
