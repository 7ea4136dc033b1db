//! Lookup contract required from the chain store

use agora_common::{OutPoint, Output, RuleFork, TxHash};
use anyhow::Result;

/// A stored output with the metadata of the block that created it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredOutput {
    pub output: Output,

    /// Height of the creating block; zero for genesis and pool transactions
    pub height: u64,

    /// Median time past of the creating block
    pub median_time_past: u32,

    /// Created by a coinbase transaction
    pub coinbase: bool,

    /// Created by a confirmed transaction rather than a pooled one
    pub confirmed: bool,

    /// Height of the confirmed block that spent the output, if any
    pub spender_height: Option<u64>,
}

/// Where a transaction is held
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionPosition {
    /// Confirmed in a block
    Confirmed { height: u64, position: u32 },

    /// Held in the pool, validated under the given rules
    Pooled { forks: RuleFork },
}

/// Primitive lookups used by population.
///
/// Calls may block the worker thread; timeouts are the store's concern.
pub trait FastChain: Send + Sync {
    /// Output referenced by `outpoint`, considering confirmed outputs at or
    /// below `branch_height`, plus pooled outputs unless `require_confirmed`
    fn output(
        &self,
        outpoint: &OutPoint,
        branch_height: u64,
        require_confirmed: bool,
    ) -> Result<Option<StoredOutput>>;

    /// Whether a transaction with `hash` exists at or below `branch_height`
    /// with at least one output unspent
    fn is_unspent_transaction(
        &self,
        hash: &TxHash,
        branch_height: u64,
        require_confirmed: bool,
    ) -> Result<bool>;

    /// Position of a transaction, confirmed or pooled
    fn transaction_position(&self, hash: &TxHash) -> Result<Option<TransactionPosition>>;
}
