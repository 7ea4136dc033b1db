//! Candidate chain segment above a fork point
//!
//! The front block links to the chain at the fork point; the back block is
//! the candidate under population.

use agora_common::{Block, BlockHash, Checkpoint, OutPoint, Output, PrevoutValidation, TxHash};

#[derive(Debug, Clone, Default)]
pub struct Branch {
    /// Height of the fork point, one below the first block
    height: u64,

    /// Blocks above the fork point, lowest first
    blocks: Vec<Block>,
}

impl Branch {
    pub fn new(height: u64) -> Self {
        Self {
            height,
            blocks: Vec::new(),
        }
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    /// Prepend a block; it must be the parent of the current front.
    ///
    /// Returns false, leaving the branch unchanged, if it does not link.
    pub fn push_front(&mut self, block: Block) -> bool {
        let linked = self
            .blocks
            .first()
            .map_or(true, |front| front.header.previous_block_hash == block.hash());

        if linked {
            self.blocks.insert(0, block);
        }
        linked
    }

    /// The candidate block
    pub fn top(&self) -> Option<&Block> {
        self.blocks.last()
    }

    /// Height of the candidate block
    pub fn top_height(&self) -> u64 {
        self.height + self.blocks.len() as u64
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Hash of the fork point block, null when empty
    pub fn hash(&self) -> BlockHash {
        self.blocks
            .first()
            .map(|front| front.header.previous_block_hash)
            .unwrap_or_default()
    }

    pub fn fork_point(&self) -> Checkpoint {
        Checkpoint::new(self.hash(), self.height)
    }

    /// Hash of the branch block at `height`, if the branch holds one
    pub fn block_hash(&self, height: u64) -> Option<BlockHash> {
        let index = height.checked_sub(self.height)?.checked_sub(1)?;
        self.blocks.get(usize::try_from(index).ok()?).map(Block::hash)
    }

    /// Candidate block with exclusive access, and the blocks below it
    pub fn split_top_mut(&mut self) -> Option<(&mut Block, &[Block])> {
        self.blocks.split_last_mut().map(|(top, below)| (top, &*below))
    }

    /// Mark `prevout` spent if a branch block below the candidate spends `outpoint`
    pub fn populate_spent(&self, outpoint: &OutPoint, prevout: &mut PrevoutValidation) {
        self.view().populate_spent(outpoint, prevout);
    }

    /// Resolve `outpoint` against outputs created within the branch
    pub fn populate_prevout(&self, outpoint: &OutPoint, prevout: &mut PrevoutValidation) {
        self.view().populate_prevout(outpoint, prevout);
    }

    fn view(&self) -> BranchView<'_> {
        match self.blocks.split_last() {
            Some((top, below)) => BranchView::new(
                self.height,
                below,
                top.transactions.iter().map(|tx| (tx.hash(), tx.outputs())).collect(),
                top.context.median_time_past(),
            ),
            None => BranchView::new(self.height, &[], Vec::new(), 0),
        }
    }
}

/// Read-only view of a branch while its candidate's sidecars are borrowed
/// mutably elsewhere.
///
/// The candidate is seen only through its transaction hashes and outputs.
pub(crate) struct BranchView<'a> {
    height: u64,
    below: &'a [Block],
    top: Vec<(&'a TxHash, &'a [Output])>,
    top_median_time_past: u32,
}

impl<'a> BranchView<'a> {
    pub(crate) fn new(
        height: u64,
        below: &'a [Block],
        top: Vec<(&'a TxHash, &'a [Output])>,
        top_median_time_past: u32,
    ) -> Self {
        Self {
            height,
            below,
            top,
            top_median_time_past,
        }
    }

    /// Spends within the candidate itself are left to block checks, so a
    /// branch of one block never reports a spend.
    pub(crate) fn populate_spent(&self, outpoint: &OutPoint, prevout: &mut PrevoutValidation) {
        let spent = self.below.iter().any(|block| {
            block.transactions.iter().skip(1).any(|tx| {
                tx.inputs().iter().any(|input| input.previous_output == *outpoint)
            })
        });

        if spent {
            prevout.spent = true;
            prevout.confirmed = true;
        }
    }

    /// Searches from the candidate downwards so the most recent creation of
    /// a duplicated hash wins.
    pub(crate) fn populate_prevout(&self, outpoint: &OutPoint, prevout: &mut PrevoutValidation) {
        prevout.cache = None;
        prevout.coinbase = false;
        prevout.height = 0;
        prevout.median_time_past = 0;

        if outpoint.is_null() {
            return;
        }

        let index = outpoint.index as usize;
        let top_index = self.below.len();

        let found = self
            .top
            .iter()
            .enumerate()
            .find(|(_, (hash, outputs))| **hash == outpoint.hash && index < outputs.len())
            .map(|(position, (_, outputs))| {
                (top_index, position, &outputs[index], self.top_median_time_past)
            })
            .or_else(|| {
                self.below.iter().enumerate().rev().find_map(|(block_index, block)| {
                    block
                        .transactions
                        .iter()
                        .enumerate()
                        .find(|(_, tx)| *tx.hash() == outpoint.hash && index < tx.outputs().len())
                        .map(|(position, tx)| {
                            let median_time_past = block.context.median_time_past();
                            (block_index, position, &tx.outputs()[index], median_time_past)
                        })
                })
            });

        if let Some((block_index, position, output, median_time_past)) = found {
            prevout.cache = Some(output.clone());
            prevout.coinbase = position == 0;
            prevout.height = self.height + block_index as u64 + 1;
            prevout.median_time_past = median_time_past;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_common::{ConsensusContext, Header, Input, RuleFork, Transaction};

    fn coinbase(tag: u8) -> Transaction {
        Transaction::new(
            1,
            vec![Input::new(OutPoint::null(), vec![tag], 0)],
            vec![Output::new(50, vec![tag])],
            0,
        )
    }

    fn block(previous: BlockHash, median_time_past: u32, transactions: Vec<Transaction>) -> Block {
        Block::new(
            Header {
                previous_block_hash: previous,
                timestamp: median_time_past,
                ..Header::default()
            },
            transactions,
            ConsensusContext::new(0, RuleFork::none(), false, median_time_past),
        )
    }

    /// Fork point at height 10, blocks at 11 and 12
    fn two_block_branch(first: Vec<Transaction>, second: Vec<Transaction>) -> Branch {
        let lower = block(BlockHash::new([9; 32]), 100, first);
        let upper = block(lower.hash(), 200, second);

        let mut branch = Branch::new(10);
        assert!(branch.push_front(upper));
        assert!(branch.push_front(lower));
        branch
    }

    #[test]
    fn empty_branch() {
        let branch = Branch::new(7);
        assert!(branch.is_empty());
        assert!(branch.top().is_none());
        assert_eq!(branch.top_height(), 7);
        assert!(branch.hash().is_null());
        assert_eq!(branch.fork_point(), Checkpoint::new(BlockHash::default(), 7));
    }

    #[test]
    fn push_front_requires_link() {
        let mut branch = two_block_branch(vec![coinbase(1)], vec![coinbase(2)]);
        let stranger = block(BlockHash::new([3; 32]), 50, vec![coinbase(3)]);

        assert!(!branch.push_front(stranger));
        assert_eq!(branch.len(), 2);
        assert_eq!(branch.top_height(), 12);
        assert_eq!(branch.hash(), BlockHash::new([9; 32]));
        assert_eq!(branch.fork_point().height, 10);
    }

    #[test]
    fn block_hash_by_height() {
        let branch = two_block_branch(vec![coinbase(1)], vec![coinbase(2)]);
        let blocks = branch.blocks();

        assert_eq!(branch.block_hash(10), None);
        assert_eq!(branch.block_hash(11), Some(blocks[0].hash()));
        assert_eq!(branch.block_hash(12), Some(blocks[1].hash()));
        assert_eq!(branch.block_hash(13), None);
    }

    #[test]
    fn single_block_branch_reports_unspent() {
        let outpoint = OutPoint::new(TxHash::new([4; 32]), 0);
        let spender = Transaction::new(1, vec![Input::new(outpoint, vec![], 0)], vec![], 0);

        let mut branch = Branch::new(10);
        assert!(branch.push_front(block(BlockHash::new([9; 32]), 100, vec![coinbase(1), spender])));

        let mut prevout = PrevoutValidation::default();
        branch.populate_spent(&outpoint, &mut prevout);
        assert!(!prevout.spent);
    }

    #[test]
    fn spend_below_candidate_is_found() {
        let outpoint = OutPoint::new(TxHash::new([4; 32]), 0);
        let spender = Transaction::new(1, vec![Input::new(outpoint, vec![], 0)], vec![], 0);
        let branch = two_block_branch(vec![coinbase(1), spender], vec![coinbase(2)]);

        let mut prevout = PrevoutValidation::default();
        branch.populate_spent(&outpoint, &mut prevout);
        assert!(prevout.spent);
        assert!(prevout.confirmed);

        let mut prevout = PrevoutValidation::default();
        branch.populate_spent(&OutPoint::new(TxHash::new([4; 32]), 1), &mut prevout);
        assert!(!prevout.spent);
    }

    #[test]
    fn prevout_found_in_lower_block() {
        let funding = Transaction::new(
            1,
            vec![],
            vec![Output::new(10, vec![]), Output::new(20, vec![])],
            0,
        );
        let outpoint = OutPoint::new(*funding.hash(), 1);
        let branch = two_block_branch(vec![coinbase(1), funding], vec![coinbase(2)]);

        let mut prevout = PrevoutValidation::default();
        branch.populate_prevout(&outpoint, &mut prevout);

        assert_eq!(prevout.cache, Some(Output::new(20, vec![])));
        assert_eq!(prevout.height, 11);
        assert_eq!(prevout.median_time_past, 100);
        assert!(!prevout.coinbase);
    }

    #[test]
    fn prevout_found_in_candidate_coinbase() {
        let top_coinbase = coinbase(2);
        let outpoint = OutPoint::new(*top_coinbase.hash(), 0);
        let branch = two_block_branch(vec![coinbase(1)], vec![top_coinbase]);

        let mut prevout = PrevoutValidation::default();
        branch.populate_prevout(&outpoint, &mut prevout);

        assert!(prevout.is_cached());
        assert!(prevout.coinbase);
        assert_eq!(prevout.height, 12);
        assert_eq!(prevout.median_time_past, 200);
    }

    #[test]
    fn prevout_index_out_of_range_is_unresolved() {
        let top_coinbase = coinbase(2);
        let outpoint = OutPoint::new(*top_coinbase.hash(), 1);
        let branch = two_block_branch(vec![coinbase(1)], vec![top_coinbase]);

        let mut prevout = PrevoutValidation {
            height: 99,
            ..PrevoutValidation::default()
        };
        branch.populate_prevout(&outpoint, &mut prevout);

        assert!(!prevout.is_cached());
        assert_eq!(prevout.height, 0);
    }
}
