//! Block population
//!
//! Resolves every non-coinbase input of a branch's candidate block against
//! the chain store and the branch itself, and flags pooled and duplicate
//! transactions.

use crate::branch::{Branch, BranchView};
use crate::error::PopulateError;
use crate::populate_base::PopulateBase;
use agora_common::{
    ConsensusContext, PrevoutSlot, PrevoutValidation, RuleFork, Transaction, TransactionParts,
    TxHash, TxValidation,
};
use tracing::debug;

const NAME: &str = "populate_block";

/// Exclusive access to one transaction's sidecar
struct TxSlot<'a> {
    hash: &'a TxHash,
    validation: &'a mut TxValidation,
}

/// Everything one bucket worker owns
struct BlockBucket<'a> {
    transactions: Vec<TxSlot<'a>>,
    prevouts: Vec<PrevoutSlot<'a>>,
}

pub struct BlockPopulator {
    base: PopulateBase,

    /// Check whether transactions are already pooled
    relay_transactions: bool,
}

impl BlockPopulator {
    pub fn new(base: PopulateBase, relay_transactions: bool) -> Self {
        Self {
            base,
            relay_transactions,
        }
    }

    /// Populate the candidate block at the top of `branch`.
    ///
    /// `handler` is called exactly once, after every bucket has finished.
    /// Success means population completed; collisions and unresolved or
    /// spent previous outputs are left on the sidecars.
    pub fn populate<H>(&self, branch: &mut Branch, handler: H)
    where
        H: FnOnce(Result<(), PopulateError>) + Send,
    {
        let branch_height = branch.height();
        let Some((top, below)) = branch.split_top_mut() else {
            handler(Err(PopulateError::EmptyBranch));
            return;
        };

        let context = top.context;
        if context.is_under_checkpoint() {
            debug!(height = context.height(), "Under checkpoint, skipping population");
            handler(Ok(()));
            return;
        }

        let top_median_time_past = context.median_time_past();
        let mut transactions: Vec<TransactionParts> =
            top.transactions.iter_mut().map(Transaction::parts_mut).collect();

        if let Some(coinbase) = transactions.first_mut() {
            if let Err(error) = self.populate_coinbase(branch_height, &context, coinbase) {
                handler(Err(error));
                return;
            }
        }

        let non_coinbase_inputs: usize =
            transactions.iter().skip(1).map(|tx| tx.prevouts.len()).sum();
        if non_coinbase_inputs == 0 {
            handler(Ok(()));
            return;
        }

        let view = BranchView::new(
            branch_height,
            below,
            transactions.iter().map(|tx| (tx.hash, tx.outputs)).collect(),
            top_median_time_past,
        );

        let buckets = self.base.dispatcher().buckets(non_coinbase_inputs);
        let partitions = Self::partition(transactions, buckets);
        debug!(
            height = context.height(),
            inputs = non_coinbase_inputs,
            buckets,
            "Populating block"
        );

        self.base.dispatcher().concurrent(
            NAME,
            partitions,
            |_bucket, partition| self.populate_bucket(branch_height, &context, &view, partition),
            handler,
        );
    }

    /// A coinbase originates value, so its input gets a synthetic sidecar
    fn populate_coinbase(
        &self,
        branch_height: u64,
        context: &ConsensusContext,
        coinbase: &mut TransactionParts,
    ) -> Result<(), PopulateError> {
        if let Some(slot) = coinbase.prevouts.first_mut() {
            *slot.prevout = PrevoutValidation {
                spent: false,
                confirmed: true,
                cache: None,
                coinbase: false,
                height: 0,
                median_time_past: 0,
            };
        }

        // Collisions destroy the unspent outputs of the earlier transaction
        // once allowed; before that a duplicate coinbase is invalid
        if !context.is_enabled(RuleFork::AllowCollisions) {
            self.base
                .populate_duplicate(branch_height, coinbase.hash, coinbase.validation, true)?;
        }

        Ok(())
    }

    /// Deal non-coinbase transactions round-robin by position and their
    /// inputs round-robin by flat input index across the block
    fn partition(transactions: Vec<TransactionParts>, buckets: usize) -> Vec<BlockBucket> {
        let mut partitions: Vec<BlockBucket> = (0..buckets)
            .map(|_| BlockBucket {
                transactions: Vec::new(),
                prevouts: Vec::new(),
            })
            .collect();

        let mut input_position = 0;
        for (position, tx) in transactions.into_iter().enumerate().skip(1) {
            let TransactionParts {
                hash,
                validation,
                prevouts,
                ..
            } = tx;

            partitions[position % buckets].transactions.push(TxSlot { hash, validation });
            for slot in prevouts {
                partitions[input_position % buckets].prevouts.push(slot);
                input_position += 1;
            }
        }

        partitions
    }

    fn populate_bucket(
        &self,
        branch_height: u64,
        context: &ConsensusContext,
        view: &BranchView,
        bucket: BlockBucket,
    ) -> Result<(), PopulateError> {
        let forks = context.enabled_forks();
        let collide = context.is_enabled(RuleFork::AllowCollisions);

        for tx in bucket.transactions {
            // Costs a lookup per transaction but avoids storing it twice
            if self.relay_transactions {
                self.base.populate_pooled(tx.hash, tx.validation, forks)?;
            }

            if !collide {
                self.base.populate_duplicate(branch_height, tx.hash, tx.validation, true)?;
            }
        }

        for slot in bucket.prevouts {
            self.base.populate_prevout(branch_height, slot.outpoint, slot.prevout, true)?;

            if !slot.prevout.spent {
                view.populate_spent(slot.outpoint, slot.prevout);
            }

            // Resolved even when spent
            if !slot.prevout.is_cached() {
                view.populate_prevout(slot.outpoint, slot.prevout);
            }
        }

        Ok(())
    }
}
