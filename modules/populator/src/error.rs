//! Error types for population

use agora_common::TxHash;

/// Errors reported through a population completion handler.
///
/// Absence of an error means population completed, not that the candidate
/// is valid: inconsistencies found along the way are left in the sidecars
/// for the full validator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PopulateError {
    /// A pool transaction collides with an unspent transaction hash.
    #[error("duplicate spend: transaction {hash} matches an unspent transaction")]
    DuplicateSpend { hash: TxHash },

    /// The branch holds no candidate block.
    #[error("branch has no candidate block")]
    EmptyBranch,

    /// The candidate carries no consensus context.
    #[error("transaction {hash} has no consensus context")]
    MissingContext { hash: TxHash },

    /// A pool transaction's context is for height zero, so has no chain below it.
    #[error("transaction {hash} has a context at height zero")]
    InvalidHeight { hash: TxHash },

    /// The chain store failed a lookup.
    #[error("store lookup failed: {0}")]
    Store(String),

    /// The blocking population task did not complete.
    #[error("population task failed: {0}")]
    Task(String),
}

impl From<anyhow::Error> for PopulateError {
    fn from(error: anyhow::Error) -> Self {
        Self::Store(format!("{error:#}"))
    }
}
