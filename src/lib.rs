//! Identity-preserving value transfer between isolated script runtime
//! contexts.
//!
//! Each [`runtime::Context`] is a self-contained interpreter instance with
//! its own heap. [`transfer::transfer_value`] copies a value graph from one
//! context to another, keeping shared and cyclic structure intact and moving
//! functions through their binary chunk form. [`session::Session`] wraps a
//! context for use from several threads.

pub mod bytecode;
pub mod config;
pub mod runtime;
pub mod session;
pub mod transfer;

pub use config::{FerryConfig, TransferConfig};
pub use runtime::{Context, RuntimeError, Value};
pub use session::{Session, SessionError};
pub use transfer::{
    TransferError, merge_environment, merge_environment_with, transfer_value, transfer_value_with,
};
