//! Validation sidecars
//!
//! Plain data carried beside transactions and inputs. Population fills
//! them in; the full validator reads them.

use crate::context::ConsensusContext;
use crate::transaction::Output;

/// State of the previous output an input spends
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrevoutValidation {
    /// Already consumed at or below the branch height
    pub spent: bool,

    /// Resolved output, `None` until populated
    pub cache: Option<Output>,

    /// In the persisted chain rather than only in the pool
    pub confirmed: bool,

    /// Created by a coinbase transaction
    pub coinbase: bool,

    /// Height of the block that created the output
    pub height: u64,

    /// Median time past of the block that created the output
    pub median_time_past: u32,
}

impl PrevoutValidation {
    /// True once the previous output has been resolved
    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    /// Back to the unresolved state
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Transaction-level validation state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxValidation {
    /// Hash collides with an unspent chain (or pool) transaction
    pub duplicate: bool,

    /// Already held in the pool
    pub pooled: bool,

    /// The pooled copy was validated under the current rules
    pub current: bool,

    /// Context of the block this transaction is validated for
    pub state: Option<ConsensusContext>,
}
