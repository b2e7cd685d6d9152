use serde::{Deserialize, Serialize};

/// Tuning for cross-context copies.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TransferConfig {
    /// Strip debug information from function bodies before moving them.
    pub strip_debug: bool,
    /// Chunk name given to every function body loaded in the destination.
    pub chunk_name: String,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            strip_debug: true,
            chunk_name: "=transfer".to_string(),
        }
    }
}
