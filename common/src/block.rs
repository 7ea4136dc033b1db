//! Block headers and candidate blocks

use crate::context::ConsensusContext;
use crate::encoding::WireWriter;
use crate::hash::BlockHash;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};

/// Block header
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub version: u32,
    pub previous_block_hash: BlockHash,
    pub merkle_root: BlockHash,
    pub timestamp: u32,
    pub bits: u32,
    pub nonce: u32,
}

impl Header {
    /// Size of a serialised header
    pub const SIZE: usize = 80;

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = WireWriter::with_capacity(Self::SIZE);
        writer.push_u32(self.version);
        writer.push_bytes(self.previous_block_hash.as_ref());
        writer.push_bytes(self.merkle_root.as_ref());
        writer.push_u32(self.timestamp);
        writer.push_u32(self.bits);
        writer.push_u32(self.nonce);
        writer.into_vec()
    }

    pub fn hash(&self) -> BlockHash {
        BlockHash::digest(&self.to_bytes())
    }
}

/// A block under validation
///
/// Transaction 0 is the coinbase. The context describes the chain state
/// the block is validated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<Transaction>,
    pub context: ConsensusContext,
}

impl Block {
    pub fn new(header: Header, transactions: Vec<Transaction>, context: ConsensusContext) -> Self {
        Self {
            header,
            transactions,
            context,
        }
    }

    pub fn hash(&self) -> BlockHash {
        self.header.hash()
    }

    /// Total inputs across all transactions, optionally excluding the coinbase
    pub fn total_inputs(&self, with_coinbase: bool) -> usize {
        let skip = if with_coinbase { 0 } else { 1 };
        self.transactions.iter().skip(skip).map(|tx| tx.inputs().len()).sum()
    }

    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first().filter(|tx| tx.is_coinbase())
    }
}
