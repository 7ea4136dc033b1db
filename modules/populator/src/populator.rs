//! Agora populator module
//! Resolves the previous outputs of candidate blocks and pool transactions
//! ahead of full validation, fanning lookups out over a worker pool.

use anyhow::{bail, Result};
use config::Config;
use std::sync::Arc;
use tracing::info;

pub mod branch;
pub mod dispatcher;
pub mod error;
pub mod fast_chain;
pub mod in_memory_chain;
pub mod populate_base;
pub mod populate_block;
pub mod populate_transaction;
pub mod synchronizer;

#[cfg(test)]
mod test_utils;

pub use branch::Branch;
pub use dispatcher::Dispatcher;
pub use error::PopulateError;
pub use fast_chain::{FastChain, StoredOutput, TransactionPosition};
pub use in_memory_chain::InMemoryChain;
pub use populate_base::PopulateBase;
pub use populate_block::BlockPopulator;
pub use populate_transaction::TransactionPopulator;
pub use synchronizer::Synchronizer;

use agora_common::Transaction;

const DEFAULT_THREADS: (&str, i64) = ("threads", 0);
const DEFAULT_RELAY_TRANSACTIONS: (&str, bool) = ("relay-transactions", true);

/// Populator configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulatorConfig {
    /// Worker threads, zero for one per core
    pub threads: usize,

    /// Look up pool membership of block transactions
    pub relay_transactions: bool,
}

impl Default for PopulatorConfig {
    fn default() -> Self {
        Self {
            threads: DEFAULT_THREADS.1 as usize,
            relay_transactions: DEFAULT_RELAY_TRANSACTIONS.1,
        }
    }
}

impl PopulatorConfig {
    pub fn parse(config: &Config) -> Result<Self> {
        let threads = config.get_int(DEFAULT_THREADS.0).unwrap_or(DEFAULT_THREADS.1);
        if threads < 0 {
            bail!("{} must not be negative, got {threads}", DEFAULT_THREADS.0);
        }

        Ok(Self {
            threads: threads as usize,
            relay_transactions: config
                .get_bool(DEFAULT_RELAY_TRANSACTIONS.0)
                .unwrap_or(DEFAULT_RELAY_TRANSACTIONS.1),
        })
    }
}

/// Block and transaction populators sharing one dispatcher and chain
pub struct Populator {
    blocks: Arc<BlockPopulator>,
    transactions: Arc<TransactionPopulator>,
}

impl Populator {
    /// Convenience constructor building a dedicated worker pool sized from
    /// `config`. Use [`Populator::with_dispatcher`] to share an existing pool.
    pub fn new(config: &PopulatorConfig, chain: Arc<dyn FastChain>) -> Result<Self> {
        let dispatcher = Dispatcher::with_threads(config.threads)?;
        info!(
            threads = dispatcher.size(),
            relay_transactions = config.relay_transactions,
            "Starting populator"
        );
        Ok(Self::with_dispatcher(dispatcher, chain, config.relay_transactions))
    }

    /// Build on an injected dispatcher
    pub fn with_dispatcher(
        dispatcher: Dispatcher,
        chain: Arc<dyn FastChain>,
        relay_transactions: bool,
    ) -> Self {
        Self {
            blocks: Arc::new(BlockPopulator::new(
                PopulateBase::new(dispatcher.clone(), chain.clone()),
                relay_transactions,
            )),
            transactions: Arc::new(TransactionPopulator::new(PopulateBase::new(
                dispatcher, chain,
            ))),
        }
    }

    pub fn block_populator(&self) -> &BlockPopulator {
        &self.blocks
    }

    pub fn transaction_populator(&self) -> &TransactionPopulator {
        &self.transactions
    }

    /// Populate the candidate at the top of `branch` off the async runtime
    /// and hand the branch back
    pub async fn populate_block(&self, mut branch: Branch) -> Result<Branch, PopulateError> {
        let blocks = self.blocks.clone();
        tokio::task::spawn_blocking(move || {
            let mut outcome = None;
            blocks.populate(&mut branch, |result| outcome = Some(result));
            match outcome {
                Some(result) => result.map(|()| branch),
                None => Err(PopulateError::Task("block handler not called".to_string())),
            }
        })
        .await
        .map_err(|error| PopulateError::Task(error.to_string()))?
    }

    /// Populate a pool transaction off the async runtime and hand it back
    pub async fn populate_transaction(
        &self,
        mut tx: Transaction,
    ) -> Result<Transaction, PopulateError> {
        let transactions = self.transactions.clone();
        tokio::task::spawn_blocking(move || {
            let mut outcome = None;
            transactions.populate(&mut tx, |result| outcome = Some(result));
            match outcome {
                Some(result) => result.map(|()| tx),
                None => Err(PopulateError::Task("transaction handler not called".to_string())),
            }
        })
        .await
        .map_err(|error| PopulateError::Task(error.to_string()))?
    }
}
