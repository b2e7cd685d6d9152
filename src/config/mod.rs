//! Crate configuration, loadable from JSON.
//!
//! ```json
//! {
//!   "context": { "max_call_depth": 100, "chunk_cache_capacity": 0 },
//!   "transfer": { "strip_debug": false },
//!   "log_level": "DEBUG"
//! }
//! ```
//!
//! Every field is optional and falls back to its default.

use std::{fmt, fs, io, path::Path};

use log::LevelFilter;
use serde::{Deserialize, Serialize};

mod context_config;
mod transfer_config;

pub use context_config::{ContextConfig, ContextConfigBuilder};
pub use transfer_config::TransferConfig;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct FerryConfig {
    pub context: ContextConfig,
    pub transfer: TransferConfig,
    /// Ceiling applied to the `log` facade by [`FerryConfig::apply_log_level`].
    pub log_level: LevelFilter,
}

impl Default for FerryConfig {
    fn default() -> Self {
        Self {
            context: ContextConfig::default(),
            transfer: TransferConfig::default(),
            log_level: LevelFilter::Info,
        }
    }
}

impl FerryConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let bytes = fs::read(path.as_ref())?;
        Ok(serde_json::from_slice(bytes.as_slice())?)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Sets the global `log` ceiling. The library installs no logger itself.
    pub fn apply_log_level(&self) {
        log::set_max_level(self.log_level);
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Parse(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "cannot read config: {}", err),
            ConfigError::Parse(err) => write!(f, "invalid config: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(err) => Some(err),
            ConfigError::Parse(err) => Some(err),
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err)
    }
}
