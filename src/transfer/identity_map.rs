use std::collections::HashMap;

use crate::runtime::{Context, RegistryRef};

const INITIAL_CAPACITY: usize = 32;

/// Source identity to destination registry pin, for one top-level copy.
///
/// Keys are [`Value::identity`](crate::runtime::Value::identity) tokens from
/// the source context; they are compared, never dereferenced.
#[derive(Debug)]
pub struct IdentityMap {
    entries: HashMap<u64, RegistryRef>,
}

impl Default for IdentityMap {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityMap {
    pub fn new() -> Self {
        Self {
            entries: HashMap::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Records `reference` for `identity`, returning the reference it
    /// replaced.
    pub fn put(&mut self, identity: u64, reference: RegistryRef) -> Option<RegistryRef> {
        self.entries.insert(identity, reference)
    }

    pub fn get(&self, identity: u64) -> Option<RegistryRef> {
        self.entries.get(&identity).copied()
    }

    pub fn contains(&self, identity: u64) -> bool {
        self.entries.contains_key(&identity)
    }

    pub fn for_each(&self, mut f: impl FnMut(u64, RegistryRef)) {
        for (identity, reference) in &self.entries {
            f(*identity, *reference);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Unpins every recorded reference in `dest` and drops the map.
    pub fn release(self, dest: &mut Context) -> usize {
        let released = self.entries.len();
        for reference in self.entries.into_values() {
            dest.unpin(reference);
        }
        released
    }
}
