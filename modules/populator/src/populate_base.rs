//! Population primitives shared by the block and transaction populators
//!
//! Each primitive writes one sidecar from store lookups. Callers hand in
//! exclusive references to exactly the sidecars being populated.

use crate::dispatcher::Dispatcher;
use crate::error::PopulateError;
use crate::fast_chain::{FastChain, TransactionPosition};
use agora_common::{OutPoint, PrevoutValidation, RuleFork, TxHash, TxValidation};
use std::sync::Arc;
use tracing::warn;

pub struct PopulateBase {
    dispatcher: Dispatcher,
    chain: Arc<dyn FastChain>,
}

impl PopulateBase {
    pub fn new(dispatcher: Dispatcher, chain: Arc<dyn FastChain>) -> Self {
        Self { dispatcher, chain }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Set `duplicate` when an unspent transaction with the same hash exists
    /// at or below `branch_height`
    pub fn populate_duplicate(
        &self,
        branch_height: u64,
        hash: &TxHash,
        validation: &mut TxValidation,
        require_confirmed: bool,
    ) -> Result<(), PopulateError> {
        validation.duplicate = self
            .chain
            .is_unspent_transaction(hash, branch_height, require_confirmed)
            .inspect_err(|error| warn!(%hash, "Duplicate lookup failed: {error:#}"))?;
        Ok(())
    }

    /// Set `pooled`, and `current` when the pooled copy was validated under
    /// `forks`
    pub fn populate_pooled(
        &self,
        hash: &TxHash,
        validation: &mut TxValidation,
        forks: RuleFork,
    ) -> Result<(), PopulateError> {
        let position = self
            .chain
            .transaction_position(hash)
            .inspect_err(|error| warn!(%hash, "Position lookup failed: {error:#}"))?;

        (validation.pooled, validation.current) = match position {
            Some(TransactionPosition::Pooled { forks: stored }) => (true, stored == forks),
            _ => (false, false),
        };
        Ok(())
    }

    /// Resolve the previous output of `outpoint` into `prevout`.
    ///
    /// The sidecar starts from the unresolved state, so a null or unknown
    /// outpoint leaves it empty. An output spent at or below
    /// `branch_height` is marked spent and its cache cleared. Genesis
    /// outputs are never considered spent here.
    pub fn populate_prevout(
        &self,
        branch_height: u64,
        outpoint: &OutPoint,
        prevout: &mut PrevoutValidation,
        require_confirmed: bool,
    ) -> Result<(), PopulateError> {
        prevout.reset();

        if outpoint.is_null() {
            return Ok(());
        }

        let Some(stored) = self
            .chain
            .output(outpoint, branch_height, require_confirmed)
            .inspect_err(|error| warn!(%outpoint, "Output lookup failed: {error:#}"))?
        else {
            return Ok(());
        };

        prevout.cache = Some(stored.output);
        prevout.height = stored.height;
        prevout.median_time_past = stored.median_time_past;
        prevout.coinbase = stored.coinbase;
        prevout.confirmed = stored.confirmed;

        if prevout.height == 0 {
            return Ok(());
        }

        if stored.spender_height.is_some_and(|spender| spender <= branch_height) {
            prevout.spent = true;
            prevout.confirmed = true;
            prevout.cache = None;
        }

        Ok(())
    }
}
