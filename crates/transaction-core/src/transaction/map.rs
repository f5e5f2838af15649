use std::collections::HashMap;

use super::TransactionState;

/// Transactions keyed by transaction id. Client and server transactions
/// live in separate maps so a request and the response to it never collide.
#[derive(Debug, Default)]
pub struct TransactionMap {
    map: HashMap<String, TransactionState>,
}

impl TransactionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, state: TransactionState) {
        self.map.insert(state.id().to_string(), state);
    }

    pub fn find(&self, tid: &str) -> Option<&TransactionState> {
        self.map.get(tid)
    }

    pub fn find_mut(&mut self, tid: &str) -> Option<&mut TransactionState> {
        self.map.get_mut(tid)
    }

    pub fn contains(&self, tid: &str) -> bool {
        self.map.contains_key(tid)
    }

    pub fn remove(&mut self, tid: &str) -> Option<TransactionState> {
        self.map.remove(tid)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
