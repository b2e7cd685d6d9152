//! Cross-context value transfer.
//!
//! A transfer copies one value graph out of a source [`Context`] onto the
//! stack of a destination context. Tables and script functions keep their
//! identity within one copy: a table reachable along two paths, or from
//! itself, becomes one destination table. Functions travel as binary chunks
//! and have their captured values copied after loading. The source context is
//! only read.
//!
//! Every reference created in the destination is pinned in its registry for
//! the duration of the copy and released on every exit path.
//!
//! The walk does not recurse: a new table or function is created and pinned
//! right away, and filling it in is queued on a work-list. Nesting depth is
//! bounded only by memory.

use std::fmt;

use crate::{
    bytecode::chunk::{DumpError, LoadError},
    config::TransferConfig,
    runtime::{Context, GcHandle, RegistryRef, RuntimeError, StackIndex, Value},
};

mod closure_copier;
mod identity_map;
mod merge_copier;
mod table_copier;
mod value_copier;

pub(crate) use closure_copier::is_environment;
pub use identity_map::IdentityMap;

#[derive(Debug, Clone, PartialEq)]
pub enum TransferError {
    /// Value kind that cannot cross contexts, e.g. raw userdata.
    Unsupported(&'static str),
    Dump(DumpError),
    Load(LoadError),
    Runtime(RuntimeError),
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::Unsupported(kind) => write!(f, "cannot transfer a {} value", kind),
            TransferError::Dump(err) => write!(f, "function dump failed: {}", err),
            TransferError::Load(err) => write!(f, "function load failed: {}", err),
            TransferError::Runtime(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for TransferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransferError::Dump(err) => Some(err),
            TransferError::Load(err) => Some(err),
            TransferError::Runtime(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DumpError> for TransferError {
    fn from(err: DumpError) -> Self {
        TransferError::Dump(err)
    }
}

impl From<LoadError> for TransferError {
    fn from(err: LoadError) -> Self {
        TransferError::Load(err)
    }
}

impl From<RuntimeError> for TransferError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::Dump(err) => TransferError::Dump(err),
            RuntimeError::Load(err) => TransferError::Load(err),
            other => TransferError::Runtime(other),
        }
    }
}

/// Destination object that exists and is pinned but not yet filled in.
#[derive(Debug)]
enum Pending {
    /// Entries of the source table still to be copied.
    Table { source: GcHandle, dest: RegistryRef },
    /// Captured values of the source function still to be copied.
    Upvalues { source: Value, dest: RegistryRef },
}

/// State of one top-level copy: both contexts, the identity map and the
/// objects still waiting for their contents.
pub struct Transfer<'a> {
    source: &'a Context,
    dest: &'a mut Context,
    config: &'a TransferConfig,
    identities: IdentityMap,
    pending: Vec<Pending>,
    copied: usize,
}

impl<'a> Transfer<'a> {
    pub fn new(source: &'a Context, dest: &'a mut Context, config: &'a TransferConfig) -> Self {
        Self {
            source,
            dest,
            config,
            identities: IdentityMap::new(),
            pending: Vec::new(),
            copied: 0,
        }
    }

    /// Tables and functions created so far.
    pub fn copied(&self) -> usize {
        self.copied
    }

    /// Ends the copy, unpinning everything it pinned. Returns the number of
    /// pins released.
    pub fn finish(self) -> usize {
        self.identities.release(self.dest)
    }

    /// Pins the destination value on top of the stack as the copy of
    /// `identity`.
    fn register(&mut self, identity: u64) -> Result<RegistryRef, TransferError> {
        let reference = self.dest.pin(-1)?;
        if let Some(previous) = self.identities.put(identity, reference) {
            self.dest.unpin(previous);
        }
        self.copied += 1;
        Ok(reference)
    }

    /// Fills queued objects until none is left. Each step leaves the stack at
    /// the height it found it.
    fn drain(&mut self) -> Result<(), TransferError> {
        while let Some(pending) = self.pending.pop() {
            match pending {
                Pending::Table { source, dest } => self.fill_table(source, dest)?,
                Pending::Upvalues { source, dest } => self.fill_upvalues(&source, dest)?,
            }
        }
        Ok(())
    }
}

/// Copies the value at `index` of `source` onto the top of `dest`.
///
/// On failure `dest`'s stack is left as it was.
pub fn transfer_value(
    source: &Context,
    index: StackIndex,
    dest: &mut Context,
) -> Result<(), TransferError> {
    transfer_value_with(source, index, dest, &TransferConfig::default())
}

pub fn transfer_value_with(
    source: &Context,
    index: StackIndex,
    dest: &mut Context,
    config: &TransferConfig,
) -> Result<(), TransferError> {
    let value = source.value_at(index)?;
    log::debug!("transfer: start ({})", value.type_name());

    let top = dest.stack.len();
    let mut transfer = Transfer::new(source, dest, config);
    let result = transfer.copy(&value);
    let copied = transfer.copied();
    let released = transfer.finish();

    match result {
        Ok(()) => {
            log::debug!(
                "transfer: done, {} references copied, {} pins released",
                copied,
                released
            );
            Ok(())
        }
        Err(err) => {
            dest.stack.truncate(top);
            log::debug!("transfer: failed: {} ({} pins released)", err, released);
            Err(err)
        }
    }
}

/// Copies every entry of the table at `index` of `source` whose key is not
/// yet bound in the table on top of `dest`. Existing bindings are kept.
///
/// Nothing is pushed; the destination table stays on top. Returns the number
/// of entries added. On failure the destination table is left as it was.
pub fn merge_environment(
    source: &Context,
    index: StackIndex,
    dest: &mut Context,
) -> Result<usize, TransferError> {
    merge_environment_with(source, index, dest, &TransferConfig::default())
}

pub fn merge_environment_with(
    source: &Context,
    index: StackIndex,
    dest: &mut Context,
    config: &TransferConfig,
) -> Result<usize, TransferError> {
    let table = match source.value_at(index)? {
        Value::Table(handle) => handle,
        other => {
            return Err(RuntimeError::TypeMismatch {
                expected: "table",
                found: other.type_name(),
            }
            .into());
        }
    };
    let target = dest.get_top();
    log::debug!("merge: start into destination slot {}", target);

    let top = dest.stack.len();
    let mut transfer = Transfer::new(source, dest, config);
    let result = transfer.merge_into(table, target);
    let released = transfer.finish();

    match result {
        Ok(merged) => {
            log::debug!("merge: done, {} entries added, {} pins released", merged, released);
            Ok(merged)
        }
        Err(err) => {
            dest.stack.truncate(top);
            log::debug!("merge: failed: {} ({} pins released)", err, released);
            Err(err)
        }
    }
}

#[cfg(test)]
mod transfer_test;
