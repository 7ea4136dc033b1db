//! Error types for transaction graph operations.

use agora_common::TxHash;

/// Errors returned by [`TransactionGraph`](crate::transaction_graph::TransactionGraph) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// An entry with this hash is already in the graph.
    #[error("transaction already pooled: {hash}")]
    AlreadyPooled { hash: TxHash },

    /// A hash referenced by an operation is not in the graph.
    #[error("transaction not in pool: {hash}")]
    NotInPool { hash: TxHash },
}
