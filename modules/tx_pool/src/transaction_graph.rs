//! Arena owning the pool's transaction entries.
//!
//! Edges between entries are hashes into the arena, so removing an entry
//! detaches it from both its parents and its children.

use std::collections::{HashMap, VecDeque};

use agora_common::{Transaction, TxHash};
use tracing::debug;

use crate::pool_error::PoolError;
use crate::transaction_entry::TransactionEntry;

/// Dependency graph of pooled transactions.
///
/// Operations are single-threaded; the owning pool manager handles
/// concurrency.
#[derive(Debug, Default)]
pub struct TransactionGraph {
    entries: HashMap<TxHash, TransactionEntry>,
}

impl TransactionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an unlinked entry.
    pub fn insert(&mut self, entry: TransactionEntry) -> Result<(), PoolError> {
        let hash = *entry.hash();
        if self.entries.contains_key(&hash) {
            return Err(PoolError::AlreadyPooled { hash });
        }

        self.entries.insert(hash, entry);
        Ok(())
    }

    /// Add a populated transaction, linking it to every distinct pooled
    /// transaction whose outputs it spends.
    ///
    /// Only resolved, unconfirmed previous outputs can come from the pool.
    pub fn admit(&mut self, tx: &Transaction) -> Result<(), PoolError> {
        let hash = *tx.hash();
        self.insert(TransactionEntry::new(tx))?;

        let mut parents: Vec<TxHash> = Vec::new();
        for input in tx.inputs() {
            let parent = input.previous_output.hash;
            let from_pool = input.prevout.is_cached() && !input.prevout.confirmed;
            let pooled = self.entries.contains_key(&parent);
            if from_pool && pooled && parent != hash && !parents.contains(&parent) {
                parents.push(parent);
            }
        }

        for parent in &parents {
            self.link(parent, &hash)?;
        }

        debug!(%hash, parents = parents.len(), "Admitted pool transaction");
        Ok(())
    }

    /// Record that `child` spends outputs of `parent`. Linking an existing
    /// edge again does nothing.
    pub fn link(&mut self, parent: &TxHash, child: &TxHash) -> Result<(), PoolError> {
        if !self.entries.contains_key(parent) {
            return Err(PoolError::NotInPool { hash: *parent });
        }

        let entry = self.entries.get_mut(child).ok_or(PoolError::NotInPool { hash: *child })?;
        if entry.parents().contains(parent) {
            return Ok(());
        }
        entry.add_parent(*parent);

        if let Some(entry) = self.entries.get_mut(parent) {
            entry.add_child(*child);
        }
        Ok(())
    }

    /// Take an entry out of the graph, detaching it from its neighbours.
    ///
    /// Children left without parents become anchors.
    pub fn remove(&mut self, hash: &TxHash) -> Result<TransactionEntry, PoolError> {
        let entry = self.entries.remove(hash).ok_or(PoolError::NotInPool { hash: *hash })?;

        for parent in entry.parents() {
            if let Some(parent) = self.entries.get_mut(parent) {
                parent.remove_child(hash);
            }
        }
        for child in entry.children() {
            if let Some(child) = self.entries.get_mut(child) {
                child.remove_parent(hash);
            }
        }

        debug!(%hash, children = entry.children().len(), "Removed pool transaction");
        Ok(entry)
    }

    pub fn get(&self, hash: &TxHash) -> Option<&TransactionEntry> {
        self.entries.get(hash)
    }

    pub fn contains(&self, hash: &TxHash) -> bool {
        self.entries.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hashes of entries with no pooled parent, sorted.
    pub fn anchors(&self) -> Vec<TxHash> {
        let mut anchors: Vec<TxHash> = self
            .entries
            .values()
            .filter(|entry| entry.is_anchor())
            .map(|entry| *entry.hash())
            .collect();
        anchors.sort();
        anchors
    }

    /// Every transaction depending on `hash`, directly or not, in
    /// breadth-first order. The root itself is excluded.
    ///
    /// Marks are used to visit shared descendants once and are all cleared
    /// before returning.
    pub fn descendants(&mut self, hash: &TxHash) -> Result<Vec<TxHash>, PoolError> {
        let root = self.entries.get_mut(hash).ok_or(PoolError::NotInPool { hash: *hash })?;
        root.mark(true);

        let mut queue: VecDeque<TxHash> = root.children().iter().copied().collect();
        let mut found = Vec::new();

        while let Some(next) = queue.pop_front() {
            let Some(entry) = self.entries.get_mut(&next) else {
                continue;
            };
            if entry.is_marked() {
                continue;
            }

            entry.mark(true);
            queue.extend(entry.children().iter().copied());
            found.push(next);
        }

        for visited in found.iter().chain(std::iter::once(hash)) {
            if let Some(entry) = self.entries.get_mut(visited) {
                entry.mark(false);
            }
        }

        Ok(found)
    }
}
