//! Registry of the tables the execution core touches.

/// Identity and layout of one store table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableId {
    pub name: &'static str,
    /// Dup-sorted tables hold multiple sorted data items per key.
    pub dup_sort: bool,
}

/// Current state: account rows keyed by address, storage rows keyed by
/// `address || incarnation` with `slot || value` data items.
pub const PLAIN_STATE: TableId = TableId {
    name: "PlainState",
    dup_sort: true,
};

/// Previous non-zero incarnation of self-destructed accounts, keyed by
/// address.
pub const INCARNATION_MAP: TableId = TableId {
    name: "IncarnationMap",
    dup_sort: false,
};

/// Contract code keyed by its keccak-256 hash.
pub const CODE: TableId = TableId {
    name: "Code",
    dup_sort: false,
};

/// Code hash keyed by storage prefix (`address || incarnation`).
pub const PLAIN_CONTRACT_CODE: TableId = TableId {
    name: "PlainContractCode",
    dup_sort: false,
};

/// Account pre-images keyed by block number.
pub const PLAIN_ACCOUNT_CHANGE_SET: TableId = TableId {
    name: "PlainAccountChangeSet",
    dup_sort: false,
};

/// Storage pre-images keyed by block number.
pub const PLAIN_STORAGE_CHANGE_SET: TableId = TableId {
    name: "PlainStorageChangeSet",
    dup_sort: false,
};
