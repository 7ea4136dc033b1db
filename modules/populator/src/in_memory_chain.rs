//! In-memory chain store using DashMap
// Sharded locks let population workers look up concurrently while the
// owner confirms blocks or pools transactions.

use crate::fast_chain::{FastChain, StoredOutput, TransactionPosition};
use agora_common::{Block, OutPoint, RuleFork, Transaction, TxHash};
use anyhow::Result;
use dashmap::DashMap;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
struct TransactionRecord {
    position: TransactionPosition,

    /// Number of outputs the transaction created
    outputs: u32,
}

pub struct InMemoryChain {
    /// Outputs by outpoint, with spender tracking
    outputs: DashMap<OutPoint, StoredOutput>,

    /// Transactions by hash
    transactions: DashMap<TxHash, TransactionRecord>,
}

impl Default for InMemoryChain {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryChain {
    pub fn new() -> Self {
        info!("Storing chain in memory (DashMap)");
        Self {
            outputs: DashMap::new(),
            transactions: DashMap::new(),
        }
    }

    /// Confirm a block at `height`: index its outputs and mark the outputs
    /// its inputs spend
    pub fn confirm_block(&self, height: u64, block: &Block) {
        let median_time_past = block.context.median_time_past();

        for (position, tx) in block.transactions.iter().enumerate() {
            self.transactions.insert(
                *tx.hash(),
                TransactionRecord {
                    position: TransactionPosition::Confirmed {
                        height,
                        position: position as u32,
                    },
                    outputs: tx.outputs().len() as u32,
                },
            );

            for (index, output) in tx.outputs().iter().enumerate() {
                self.outputs.insert(
                    OutPoint::new(*tx.hash(), index as u32),
                    StoredOutput {
                        output: output.clone(),
                        height,
                        median_time_past,
                        coinbase: position == 0,
                        confirmed: true,
                        spender_height: None,
                    },
                );
            }

            for input in tx.inputs().iter().filter(|input| !input.previous_output.is_null()) {
                if let Some(mut spent) = self.outputs.get_mut(&input.previous_output) {
                    spent.spender_height = Some(height);
                }
            }
        }

        debug!(
            height,
            hash = %block.hash(),
            transactions = block.transactions.len(),
            "Confirmed block"
        );
    }

    /// Hold a transaction in the pool, validated under `forks`
    pub fn pool_transaction(&self, tx: &Transaction, forks: RuleFork) {
        self.transactions.insert(
            *tx.hash(),
            TransactionRecord {
                position: TransactionPosition::Pooled { forks },
                outputs: tx.outputs().len() as u32,
            },
        );

        for (index, output) in tx.outputs().iter().enumerate() {
            self.outputs.insert(
                OutPoint::new(*tx.hash(), index as u32),
                StoredOutput {
                    output: output.clone(),
                    height: 0,
                    median_time_past: 0,
                    coinbase: false,
                    confirmed: false,
                    spender_height: None,
                },
            );
        }

        debug!(hash = %tx.hash(), "Pooled transaction");
    }

    /// Number of indexed outputs, spent or not
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

impl FastChain for InMemoryChain {
    fn output(
        &self,
        outpoint: &OutPoint,
        branch_height: u64,
        require_confirmed: bool,
    ) -> Result<Option<StoredOutput>> {
        Ok(self
            .outputs
            .get(outpoint)
            .filter(|stored| {
                if stored.confirmed {
                    stored.height <= branch_height
                } else {
                    !require_confirmed
                }
            })
            .map(|stored| stored.clone()))
    }

    fn is_unspent_transaction(
        &self,
        hash: &TxHash,
        branch_height: u64,
        require_confirmed: bool,
    ) -> Result<bool> {
        let Some(record) = self.transactions.get(hash).map(|record| *record) else {
            return Ok(false);
        };

        match record.position {
            TransactionPosition::Confirmed { height, .. } if height > branch_height => {
                return Ok(false)
            }
            TransactionPosition::Pooled { .. } if require_confirmed => return Ok(false),
            _ => {}
        }

        Ok((0..record.outputs).any(|index| {
            self.outputs.get(&OutPoint::new(*hash, index)).is_some_and(|stored| {
                !matches!(stored.spender_height, Some(spender) if spender <= branch_height)
            })
        }))
    }

    fn transaction_position(&self, hash: &TxHash) -> Result<Option<TransactionPosition>> {
        Ok(self.transactions.get(hash).map(|record| record.position))
    }
}
