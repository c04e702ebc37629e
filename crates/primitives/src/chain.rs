//! Chain configuration, consumed by execution as a plain value.

use alloy_primitives::Address;

/// Fork activation schedule and chain-specific irregular state changes.
///
/// Every field is data; nothing here is looked up from process-wide state.
/// Callers build the value from their chain metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChainConfig {
    pub homestead_block: Option<u64>,
    pub spurious_dragon_block: Option<u64>,
    pub byzantium_block: Option<u64>,
    pub constantinople_block: Option<u64>,
    pub istanbul_block: Option<u64>,
    /// Block at which the touched precompile 0x03 is deleted; see Yellow
    /// Paper, Appendix K "Anomalies on the Main Network".
    pub ripemd_deletion_block: Option<u64>,
    /// DAO hard-fork balance transfer, where the chain applies one.
    pub dao: Option<DaoConfig>,
}

impl ChainConfig {
    pub fn has_homestead(&self, block_number: u64) -> bool {
        enabled(self.homestead_block, block_number)
    }

    pub fn has_spurious_dragon(&self, block_number: u64) -> bool {
        enabled(self.spurious_dragon_block, block_number)
    }

    pub fn has_byzantium(&self, block_number: u64) -> bool {
        enabled(self.byzantium_block, block_number)
    }

    pub fn has_constantinople(&self, block_number: u64) -> bool {
        enabled(self.constantinople_block, block_number)
    }

    pub fn has_istanbul(&self, block_number: u64) -> bool {
        enabled(self.istanbul_block, block_number)
    }
}

fn enabled(fork_block: Option<u64>, block_number: u64) -> bool {
    fork_block.is_some_and(|fork_block| fork_block <= block_number)
}

/// The DAO hard-fork irregular state change: at the fork block, the balances
/// of the drained accounts move to the refund contract before any
/// transaction executes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DaoConfig {
    /// Fork activation block.
    pub block_number: u64,
    /// Refund contract credited with the drained balances.
    pub beneficiary: Address,
    /// Accounts drained at the fork block.
    pub drained: Vec<Address>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forks_activate_at_their_block() {
        let config = ChainConfig {
            byzantium_block: Some(4_370_000),
            ..ChainConfig::default()
        };
        assert!(!config.has_byzantium(4_369_999));
        assert!(config.has_byzantium(4_370_000));
        assert!(config.has_byzantium(4_370_001));
        assert!(!config.has_istanbul(u64::MAX));
    }
}
