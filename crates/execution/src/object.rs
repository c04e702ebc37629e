use primitives::{Account, Bytes, HashMap, B256};

/// One account as staged during a block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateObject {
    /// Account at the start of the block, as read from the database.
    pub initial: Option<Account>,
    /// Account as of the latest mutation; `None` once destructed.
    pub current: Option<Account>,
    /// Contract code, loaded through the buffer or set this block.
    pub code: Option<Bytes>,
    /// Slots written by the transaction in flight.
    pub dirty_storage: HashMap<B256, B256>,
    /// Slots the block has seen, with their pre-transaction values.
    pub committed_storage: HashMap<B256, CommittedValue>,
}

/// Storage value tracked across transaction boundaries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommittedValue {
    /// Value at the beginning of the block.
    pub initial: B256,
    /// Value at the beginning of the transaction; see EIP-2200.
    pub original: B256,
}
