//! Helpers for population tests

use crate::fast_chain::{FastChain, StoredOutput, TransactionPosition};
use agora_common::{
    Block, BlockHash, ConsensusContext, Header, Input, OutPoint, Output, Transaction, TxHash,
};
use anyhow::{bail, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fixed chain contents that counts every lookup
#[derive(Default)]
pub struct CountingChain {
    outputs: HashMap<OutPoint, StoredOutput>,
    unspent: HashMap<TxHash, u64>,
    positions: HashMap<TxHash, TransactionPosition>,
    failing: bool,
    calls: AtomicUsize,
}

impl CountingChain {
    pub fn with_output(mut self, outpoint: OutPoint, output: StoredOutput) -> Self {
        self.outputs.insert(outpoint, output);
        self
    }

    /// An unspent confirmed transaction at `height`
    pub fn with_unspent(mut self, hash: TxHash, height: u64) -> Self {
        self.unspent.insert(hash, height);
        self
    }

    pub fn with_position(mut self, hash: TxHash, position: TransactionPosition) -> Self {
        self.positions.insert(hash, position);
        self
    }

    /// Every lookup fails
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn count(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            bail!("store unavailable");
        }
        Ok(())
    }
}

impl FastChain for CountingChain {
    fn output(
        &self,
        outpoint: &OutPoint,
        _branch_height: u64,
        _require_confirmed: bool,
    ) -> Result<Option<StoredOutput>> {
        self.count()?;
        Ok(self.outputs.get(outpoint).cloned())
    }

    fn is_unspent_transaction(
        &self,
        hash: &TxHash,
        branch_height: u64,
        _require_confirmed: bool,
    ) -> Result<bool> {
        self.count()?;
        Ok(self.unspent.get(hash).is_some_and(|height| *height <= branch_height))
    }

    fn transaction_position(&self, hash: &TxHash) -> Result<Option<TransactionPosition>> {
        self.count()?;
        Ok(self.positions.get(hash).copied())
    }
}

/// A coinbase made unique by `tag`
pub fn coinbase(tag: u8) -> Transaction {
    Transaction::new(
        1,
        vec![Input::new(OutPoint::null(), vec![0x01, tag], 0xffff_ffff)],
        vec![Output::new(50, vec![0x51])],
        0,
    )
}

/// A transaction spending `(tag, index)` outpoints, where the outpoint hash
/// is `tag` repeated; it has one output
pub fn spend(outpoints: &[(u8, u32)]) -> Transaction {
    let inputs = outpoints
        .iter()
        .map(|(tag, index)| {
            Input::new(OutPoint::new(TxHash::new([*tag; 32]), *index), vec![], 0xffff_ffff)
        })
        .collect();
    Transaction::new(1, inputs, vec![Output::new(1, vec![0x51])], 0)
}

pub fn block(
    previous: BlockHash,
    context: ConsensusContext,
    transactions: Vec<Transaction>,
) -> Block {
    Block::new(
        Header {
            version: 1,
            previous_block_hash: previous,
            ..Header::default()
        },
        transactions,
        context,
    )
}
