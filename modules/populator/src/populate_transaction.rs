//! Pool transaction population

use crate::dispatcher::partition;
use crate::error::PopulateError;
use crate::populate_base::PopulateBase;
use agora_common::Transaction;
use tracing::debug;

const NAME: &str = "populate_transaction";

pub struct TransactionPopulator {
    base: PopulateBase,
}

impl TransactionPopulator {
    pub fn new(base: PopulateBase) -> Self {
        Self { base }
    }

    /// Populate a transaction submitted for the pool.
    ///
    /// Its context is for the next block, so lookups run at the height
    /// below it. A transaction whose hash matches any unspent chain or pool
    /// transaction is rejected as a duplicate spend before any input is
    /// resolved. Spends by other pool transactions are not checked; those
    /// conflicts are the pool's concern.
    pub fn populate<H>(&self, tx: &mut Transaction, handler: H)
    where
        H: FnOnce(Result<(), PopulateError>) + Send,
    {
        let hash = *tx.hash();
        let Some(state) = tx.validation.state else {
            handler(Err(PopulateError::MissingContext { hash }));
            return;
        };

        let Some(chain_height) = state.height().checked_sub(1) else {
            handler(Err(PopulateError::InvalidHeight { hash }));
            return;
        };

        let parts = tx.parts_mut();

        // Collisions destroy value, so unlike blocks a pool transaction may
        // never collide whatever the active rules
        if let Err(error) =
            self.base.populate_duplicate(chain_height, parts.hash, parts.validation, false)
        {
            handler(Err(error));
            return;
        }

        if parts.validation.duplicate {
            debug!(%hash, chain_height, "Rejecting duplicate transaction");
            handler(Err(PopulateError::DuplicateSpend { hash }));
            return;
        }

        let inputs = parts.prevouts.len();
        if inputs == 0 {
            handler(Ok(()));
            return;
        }

        let buckets = self.base.dispatcher().buckets(inputs);
        debug!(%hash, inputs, buckets, "Populating transaction");

        self.base.dispatcher().concurrent(
            NAME,
            partition(parts.prevouts, buckets),
            |_bucket, slots| -> Result<(), PopulateError> {
                for slot in slots {
                    self.base.populate_prevout(chain_height, slot.outpoint, slot.prevout, false)?;
                }
                Ok(())
            },
            handler,
        );
    }
}
