//! Agora transaction pool module
//! Tracks the dependencies between pooled transactions.

pub mod pool_error;
pub mod transaction_entry;
pub mod transaction_graph;

pub use pool_error::PoolError;
pub use transaction_entry::TransactionEntry;
pub use transaction_graph::TransactionGraph;
