use alloy_primitives::{Address, Bytes, B256, U256};

/// The header fields block execution consumes.
///
/// Header encoding, sealing and validation stay with the caller.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockHeader {
    /// Height of the block.
    pub number: u64,
    /// Address entitled to the block's fees and reward.
    pub beneficiary: Address,
    /// Gas allowance of the whole block.
    pub gas_limit: u64,
    /// Gas the block's transactions claim to consume in total.
    pub gas_used: u64,
    /// Trie root over the block's receipts.
    pub receipts_root: B256,
}

/// A block ready for execution: validated header, sender-recovered
/// transactions and ommer headers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    pub ommers: Vec<BlockHeader>,
}

/// A transaction message as seen by execution.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Transaction {
    pub nonce: u64,
    /// Price in wei per unit of gas.
    pub gas_price: U256,
    pub gas_limit: u64,
    /// Recipient; `None` for contract creation.
    pub to: Option<Address>,
    /// Wei transferred to the recipient or endowed to the created contract.
    pub value: U256,
    /// Call data or contract init code.
    pub data: Bytes,
    /// Sender recovered from the signature; `None` if recovery was skipped
    /// or failed.
    pub from: Option<Address>,
}
