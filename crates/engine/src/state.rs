//! In-memory store of per-address [`WalletState`].
//!
//! State is ephemeral: after a restart every address starts `Idle` and is
//! rebuilt from the first observation window. Entries are created lazily on
//! the first classification of an address and never removed.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use burstwatch_common::address::normalize;
use burstwatch_common::types::{BurstTransition, Transaction, WalletState};

use crate::classifier::BurstClassifier;

/// Shared handle to all wallet states, keyed by lowercase address.
#[derive(Clone, Default)]
pub struct WalletStateStore {
    states: Arc<RwLock<HashMap<String, WalletState>>>,
    classifier: BurstClassifier,
}

impl WalletStateStore {
    pub fn new(classifier: BurstClassifier) -> Self {
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
            classifier,
        }
    }

    /// Run the classifier for one address and apply the result atomically.
    pub fn classify(
        &self,
        address: &str,
        transactions: &[Transaction],
        chain_height: u64,
        now: i64,
    ) -> BurstTransition {
        let mut states = self.states.write();
        let state = states.entry(normalize(address)).or_default();
        self.classifier.classify(state, transactions, chain_height, now)
    }

    /// Current state of one address, if it has been observed.
    pub fn get(&self, address: &str) -> Option<WalletState> {
        self.states.read().get(&normalize(address)).cloned()
    }

    /// Snapshot of every observed address.
    pub fn all(&self) -> HashMap<String, WalletState> {
        self.states.read().clone()
    }

    /// Addresses currently bursting, sorted by address.
    pub fn bursting(&self) -> Vec<(String, WalletState)> {
        let mut bursting: Vec<_> = self
            .states
            .read()
            .iter()
            .filter(|(_, state)| state.is_bursting)
            .map(|(address, state)| (address.clone(), state.clone()))
            .collect();
        bursting.sort_by(|a, b| a.0.cmp(&b.0));
        bursting
    }

    /// Highest `last_tx_block` across all states; used as a height fallback.
    pub fn max_last_tx_block(&self) -> Option<u64> {
        self.states
            .read()
            .values()
            .map(|state| state.last_tx_block)
            .max()
    }

    /// Number of observed addresses.
    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;

    const ADDR: &str = "0x00000000000000000000000000000000000000bb";
    const NOW: i64 = 1_700_000_000;

    fn tx(hash: &str, block: u64) -> Transaction {
        Transaction {
            hash: hash.to_string(),
            from: "0x00000000000000000000000000000000000000aa".to_string(),
            to: Some(ADDR.to_string()),
            value: U256::ZERO,
            block_number: block,
            timestamp: NOW,
            input: "0x".to_string(),
        }
    }

    #[test]
    fn test_state_created_lazily() {
        let store = WalletStateStore::default();
        assert!(store.is_empty());
        assert!(store.get(ADDR).is_none());

        store.classify(ADDR, &[tx("0xa", 50)], 60, NOW);

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(ADDR).unwrap().last_tx_block, 50);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let store = WalletStateStore::default();
        store.classify(&ADDR.to_uppercase().replace("0X", "0x"), &[tx("0xa", 7)], 8, NOW);

        assert_eq!(store.len(), 1);
        assert!(store.get(ADDR).is_some());
        assert!(store.all().contains_key(ADDR));
    }

    #[test]
    fn test_bursting_and_max_block() {
        let store = WalletStateStore::default();
        let other = "0x00000000000000000000000000000000000000cc";

        let burst = vec![tx("0xc", 102), tx("0xb", 101), tx("0xa", 100)];
        assert_eq!(
            store.classify(ADDR, &burst, 103, NOW),
            BurstTransition::BurstStarted
        );
        store.classify(other, &[tx("0xd", 90)], 103, NOW);

        let bursting = store.bursting();
        assert_eq!(bursting.len(), 1);
        assert_eq!(bursting[0].0, ADDR);
        assert_eq!(store.max_last_tx_block(), Some(102));
    }

    #[test]
    fn test_max_last_tx_block_empty() {
        let store = WalletStateStore::default();
        assert_eq!(store.max_last_tx_block(), None);
    }

    #[test]
    fn test_clones_share_state() {
        let store = WalletStateStore::default();
        let handle = store.clone();
        store.classify(ADDR, &[tx("0xa", 5)], 6, NOW);
        assert_eq!(handle.len(), 1);
    }
}
