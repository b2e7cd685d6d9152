use serde::{Deserialize, Serialize};

/// Limits and tuning for one execution context.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ContextConfig {
    /// Maximum number of value stack slots.
    pub max_stack: usize,
    /// Maximum number of nested script calls.
    pub max_call_depth: usize,
    /// Allocations between collections. Adapted by the collector afterwards.
    pub gc_threshold: usize,
    pub gc_enabled: bool,
    /// Decoded prototypes kept per context. `0` disables the chunk cache.
    pub chunk_cache_capacity: usize,
    /// Largest binary chunk `dump` will produce, in bytes.
    pub max_chunk_size: usize,
    /// Logs every executed instruction at trace level.
    pub trace: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_stack: 1 << 16,
            max_call_depth: 200,
            gc_threshold: 10_000,
            gc_enabled: true,
            chunk_cache_capacity: 64,
            max_chunk_size: 16 << 20,
            trace: false,
        }
    }
}

/// `ContextConfigBuilder` is a convenience builder to create a `ContextConfig` from code.
pub struct ContextConfigBuilder {
    config: ContextConfig,
}

impl Default for ContextConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Default::default(),
        }
    }

    pub fn with_max_stack(mut self, max_stack: usize) -> Self {
        self.config.max_stack = max_stack;
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.config.max_call_depth = depth;
        self
    }

    pub fn with_gc_threshold(mut self, threshold: usize) -> Self {
        self.config.gc_threshold = threshold;
        self
    }

    pub fn with_gc_enabled(mut self, enabled: bool) -> Self {
        self.config.gc_enabled = enabled;
        self
    }

    pub fn with_chunk_cache_capacity(mut self, capacity: usize) -> Self {
        self.config.chunk_cache_capacity = capacity;
        self
    }

    pub fn with_max_chunk_size(mut self, bytes: usize) -> Self {
        self.config.max_chunk_size = bytes;
        self
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.config.trace = trace;
        self
    }

    pub fn get(self) -> ContextConfig {
        self.config
    }
}
