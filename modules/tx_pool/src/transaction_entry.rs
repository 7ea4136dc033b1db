//! A node of the pool's transaction dependency graph.
//!
//! Edges are held as transaction hashes into the owning
//! [`TransactionGraph`](crate::transaction_graph::TransactionGraph), which
//! controls node lifetime. Nodes are mutated only by that owner.

use agora_common::{RuleFork, Transaction, TxHash};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionEntry {
    size: u32,
    sigops: u32,
    fees: u64,
    forks: RuleFork,
    hash: TxHash,
    marked: bool,

    /// Pool transactions whose outputs this one spends, in insertion order
    parents: Vec<TxHash>,

    /// Pool transactions spending this one's outputs, in insertion order
    children: Vec<TxHash>,
}

impl TransactionEntry {
    /// Entry for a populated transaction; forks are those it was validated
    /// under, or none if it carries no context
    pub fn new(tx: &Transaction) -> Self {
        Self {
            size: u32::try_from(tx.serialized_size()).unwrap_or(u32::MAX),
            sigops: u32::try_from(tx.signature_operations()).unwrap_or(u32::MAX),
            fees: tx.fees(),
            forks: tx
                .validation
                .state
                .as_ref()
                .map_or(RuleFork::none(), |state| state.enabled_forks()),
            hash: *tx.hash(),
            marked: false,
            parents: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Placeholder used to look up an entry by hash before its data is known
    pub fn from_hash(hash: TxHash) -> Self {
        Self {
            size: 0,
            sigops: 0,
            fees: 0,
            forks: RuleFork::none(),
            hash,
            marked: false,
            parents: Vec::new(),
            children: Vec::new(),
        }
    }

    /// No parent in the pool
    pub fn is_anchor(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn fees(&self) -> u64 {
        self.fees
    }

    pub fn forks(&self) -> RuleFork {
        self.forks
    }

    pub fn sigops(&self) -> u32 {
        self.sigops
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn hash(&self) -> &TxHash {
        &self.hash
    }

    /// Set the traversal mark
    pub fn mark(&mut self, value: bool) {
        self.marked = value;
    }

    pub fn is_marked(&self) -> bool {
        self.marked
    }

    pub fn parents(&self) -> &[TxHash] {
        &self.parents
    }

    pub fn children(&self) -> &[TxHash] {
        &self.children
    }

    pub fn add_parent(&mut self, parent: TxHash) {
        self.parents.push(parent);
    }

    pub fn add_child(&mut self, child: TxHash) {
        self.children.push(child);
    }

    /// Remove the first child with this hash, if present
    pub fn remove_child(&mut self, child: &TxHash) {
        if let Some(index) = self.children.iter().position(|hash| hash == child) {
            self.children.remove(index);
        }
    }

    /// Remove the first parent with this hash, if present
    pub fn remove_parent(&mut self, parent: &TxHash) {
        if let Some(index) = self.parents.iter().position(|hash| hash == parent) {
            self.parents.remove(index);
        }
    }
}

impl fmt::Display for TransactionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.hash, self.parents.len(), self.children.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_common::{ConsensusContext, Input, OutPoint, Output};

    const DEFAULT_TX_HASH: &str =
        "f702453dd03b0f055e5437d76128141803984fb10acb85fc3b2184fae2f3fa78";

    fn entry(tag: u8) -> TransactionEntry {
        TransactionEntry::from_hash(TxHash::new([tag; 32]))
    }

    #[test]
    fn default_transaction_entry() {
        let instance = TransactionEntry::new(&Transaction::default());
        assert_eq!(instance.size(), 10);
        assert_eq!(instance.sigops(), 0);
        assert_eq!(instance.fees(), 0);
        assert_eq!(instance.forks(), RuleFork::none());
        assert_eq!(instance.hash().to_string(), DEFAULT_TX_HASH);
        assert!(instance.is_anchor());
        assert!(!instance.is_marked());
        assert!(instance.parents().is_empty());
        assert!(instance.children().is_empty());
    }

    #[test]
    fn forks_come_from_the_validation_context() {
        let forks = RuleFork::Bip16 | RuleFork::Bip30;
        let mut tx = Transaction::new(
            1,
            vec![Input::new(OutPoint::new(TxHash::new([3; 32]), 0), vec![], 0)],
            vec![Output::new(4, vec![0xac])],
            0,
        );
        tx.validation.state = Some(ConsensusContext::new(9, forks, false, 0));

        let instance = TransactionEntry::new(&tx);
        assert_eq!(instance.forks(), forks);
        assert_eq!(instance.sigops(), 1);
        assert_eq!(instance.size() as usize, tx.serialized_size());
    }

    #[test]
    fn hash_entry_is_empty() {
        let hash = TxHash::new([7; 32]);
        let instance = TransactionEntry::from_hash(hash);
        assert_eq!(instance.size(), 0);
        assert_eq!(instance.sigops(), 0);
        assert_eq!(instance.fees(), 0);
        assert_eq!(instance.hash(), &hash);
        assert!(instance.is_anchor());
        assert!(!instance.is_marked());
    }

    #[test]
    fn parent_clears_anchor() {
        let mut instance = entry(1);
        instance.add_parent(*entry(2).hash());
        assert!(!instance.is_anchor());
        assert_eq!(instance.parents(), &[TxHash::new([2; 32])]);
    }

    #[test]
    fn child_keeps_anchor() {
        let mut instance = entry(1);
        instance.add_child(*entry(2).hash());
        assert!(instance.is_anchor());
        assert_eq!(instance.children().len(), 1);
    }

    #[test]
    fn mark_round_trip() {
        let mut instance = entry(1);
        instance.mark(true);
        assert!(instance.is_marked());
        instance.mark(false);
        assert!(!instance.is_marked());
    }

    #[test]
    fn remove_absent_child_is_noop() {
        let mut instance = entry(1);
        instance.add_child(TxHash::new([2; 32]));
        instance.remove_child(&TxHash::new([3; 32]));
        assert_eq!(instance.children(), &[TxHash::new([2; 32])]);
    }

    #[test]
    fn remove_only_child() {
        let mut instance = entry(1);
        instance.add_child(TxHash::new([2; 32]));
        instance.remove_child(&TxHash::new([2; 32]));
        assert!(instance.children().is_empty());
    }

    #[test]
    fn remove_one_of_two_children_keeps_order() {
        let mut instance = entry(1);
        instance.add_child(TxHash::new([2; 32]));
        instance.add_child(TxHash::new([3; 32]));
        instance.remove_child(&TxHash::new([2; 32]));
        assert_eq!(instance.children(), &[TxHash::new([3; 32])]);
    }

    #[test]
    fn remove_parent_restores_anchor() {
        let mut instance = entry(1);
        instance.add_parent(TxHash::new([2; 32]));
        instance.remove_parent(&TxHash::new([2; 32]));
        assert!(instance.is_anchor());
    }

    #[test]
    fn display_shows_hash_and_edge_counts() {
        let mut instance = entry(1);
        instance.add_parent(TxHash::new([2; 32]));
        instance.add_child(TxHash::new([3; 32]));
        instance.add_child(TxHash::new([4; 32]));
        assert_eq!(instance.to_string(), format!("{} 1 2", TxHash::new([1; 32])));
    }
}
