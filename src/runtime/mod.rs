//! Script runtime: contexts, values, the collector and the interpreter.
//!
//! # Context isolation
//! Each [`Context`] owns its heap. Tables, script functions and userdata are
//! [`GcHandle`]s into that heap and mean nothing to any other context; moving
//! them across requires the `transfer` module. Strings, numbers, builtins and
//! proxies carry no heap handle and are valid everywhere.
//!
//! # Safe points
//! The collector only runs at the start of an allocating entry point
//! (`new_table`, `new_userdata`, `load_binary`, `load_prototype`, `call`) and
//! when the interpreter creates a table or closure. Anything kept on the
//! context stack or pinned in the registry survives; a handle held only in a
//! Rust local across one of those calls may dangle.

pub mod builtin_function;
pub mod builtins;
pub mod closure;
pub mod context;
pub mod error;
pub mod frame;
pub mod gc;
pub mod hash_key;
pub mod host;
pub mod registry;
pub mod table;
pub mod value;
pub mod vm;

pub use context::Context;
pub use error::RuntimeError;
pub use gc::GcHandle;
pub use host::{HostBindings, HostBindingsBuilder, HostObject, HostRef, Proxy, ProxyKind};
pub use registry::RegistryRef;
pub use value::{Value, ValueType};

/// Lua-style stack index: positive from the bottom (1-based), negative from
/// the top.
pub type StackIndex = i32;

pub type BuiltinFn = fn(&mut Context, Vec<Value>) -> Result<Value, String>;
