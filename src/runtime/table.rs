use std::collections::{HashMap, hash_map};

use crate::runtime::{hash_key::HashKey, value::Value};

/// Associative container with raw (metamethod-free) access only.
///
/// Iteration follows hash order. Storing `nil` removes the key, so every
/// stored value is non-nil.
#[derive(Debug, Clone, Default)]
pub struct Table {
    entries: HashMap<HashKey, Value>,
}

impl Table {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
        }
    }

    pub fn raw_get(&self, key: &HashKey) -> Value {
        self.entries.get(key).cloned().unwrap_or(Value::Nil)
    }

    pub fn raw_set(&mut self, key: HashKey, value: Value) {
        if value.is_nil() {
            self.entries.remove(&key);
        } else {
            self.entries.insert(key, value);
        }
    }

    pub fn contains(&self, key: &HashKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Border of the array part: the largest `n` such that keys `1..=n` are
    /// all present.
    pub fn len(&self) -> usize {
        let mut n = 0i64;
        while self.entries.contains_key(&HashKey::Integer(n + 1)) {
            n += 1;
        }
        n as usize
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, HashKey, Value> {
        self.entries.iter()
    }
}
