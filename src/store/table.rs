//! KeyValueStore implementation

use std::collections::BTreeMap;

use crate::log::Mutation;

use super::Value;

/// Keys, values and the log position they reflect
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyValueStore {
    data: BTreeMap<String, Value>,

    /// Index of the last entry reflected in `data`
    applied_index: u64,

    /// Epoch of the writer that produced the current data
    generation: u64,
}

impl KeyValueStore {
    /// Create an empty store at index 0, generation 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn applied_index(&self) -> u64 {
        self.applied_index
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Iterate entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }

    /// Full copy of the contents in key order
    pub fn dump(&self) -> Vec<(String, Value)> {
        self.data
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Apply a batch and move to `index` / `generation`
    ///
    /// In-memory mutations cannot fail, so the data change and the position
    /// bump land together under the caller's exclusive borrow.
    pub fn apply_batch(&mut self, index: u64, generation: u64, batch: &[Mutation]) {
        for mutation in batch {
            match mutation {
                Mutation::Put { key, value } => {
                    self.data.insert(key.clone(), value.clone());
                }
                Mutation::Delete { key } => {
                    self.data.remove(key);
                }
            }
        }
        self.advance(index, generation);
    }

    /// Move the position without touching data
    pub fn advance(&mut self, index: u64, generation: u64) {
        self.applied_index = index;
        self.generation = self.generation.max(generation);
    }

    /// Replace the whole contents
    pub fn replace(&mut self, index: u64, generation: u64, entries: Vec<(String, Value)>) {
        self.data = entries.into_iter().collect();
        self.applied_index = index;
        self.generation = generation;
    }

    /// Discard everything, back to index 0 / generation 0
    pub fn clear(&mut self) {
        self.data.clear();
        self.applied_index = 0;
        self.generation = 0;
    }
}
