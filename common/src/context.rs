//! Consensus context attached to candidate blocks and pool transactions

use crate::forks::RuleFork;

/// Chain state a candidate is validated against.
///
/// For a pool transaction the height is that of the next block, so it is
/// always one above the chain height the transaction is resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsensusContext {
    height: u64,
    forks: RuleFork,
    under_checkpoint: bool,
    median_time_past: u32,
}

impl ConsensusContext {
    pub fn new(
        height: u64,
        forks: RuleFork,
        under_checkpoint: bool,
        median_time_past: u32,
    ) -> Self {
        Self {
            height,
            forks,
            under_checkpoint,
            median_time_past,
        }
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    /// Bitmask of active rules
    pub fn enabled_forks(&self) -> RuleFork {
        self.forks
    }

    pub fn is_enabled(&self, rule: RuleFork) -> bool {
        self.forks.contains(rule)
    }

    /// Blocks at or below a checkpoint skip contextual population
    pub fn is_under_checkpoint(&self) -> bool {
        self.under_checkpoint
    }

    pub fn median_time_past(&self) -> u32 {
        self.median_time_past
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_enabled_reads_bitmask() {
        let context = ConsensusContext::new(7, RuleFork::Bip30 | RuleFork::Bip34, false, 99);
        assert!(context.is_enabled(RuleFork::Bip30));
        assert!(!context.is_enabled(RuleFork::AllowCollisions));
        assert_eq!(context.height(), 7);
        assert_eq!(context.median_time_past(), 99);
        assert!(!context.is_under_checkpoint());
    }
}
