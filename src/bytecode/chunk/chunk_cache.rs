use std::{collections::HashMap, sync::Arc};

use sha2::{Digest, Sha256};

use crate::bytecode::prototype::Prototype;

/// Decoded prototypes keyed by the digest of their chunk bytes and chunk name.
///
/// Transferring the same closure repeatedly produces identical chunks, so the
/// destination decodes and verifies each body once.
#[derive(Debug, Default)]
pub struct ChunkCache {
    entries: HashMap<[u8; 32], Arc<Prototype>>,
    capacity: usize,
    hits: usize,
    misses: usize,
}

impl ChunkCache {
    /// A capacity of zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity,
            hits: 0,
            misses: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    pub fn key(bytes: &[u8], chunk_name: &str) -> [u8; 32] {
        hash_cache_key(&hash_bytes(bytes), &hash_bytes(chunk_name.as_bytes()))
    }

    pub fn get(&mut self, key: &[u8; 32]) -> Option<Arc<Prototype>> {
        match self.entries.get(key) {
            Some(proto) => {
                self.hits += 1;
                Some(proto.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Stores a decoded prototype, dropping every entry once capacity is reached.
    pub fn insert(&mut self, key: [u8; 32], proto: Arc<Prototype>) {
        if !self.is_enabled() {
            return;
        }
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            log::debug!("chunk cache full ({} entries), clearing", self.entries.len());
            self.entries.clear();
        }
        self.entries.insert(key, proto);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

pub fn hash_bytes(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let result = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    out
}

pub fn hash_cache_key(chunk_hash: &[u8; 32], name_hash: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(chunk_hash);
    hasher.update(name_hash);
    let result = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    out
}
