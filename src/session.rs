//! Shared, lockable contexts and calls that run a function in another one.
//!
//! A [`Session`] owns one [`Context`] behind a mutex. Operations that touch
//! two sessions lock both, always in ascending id order, so two threads
//! working on the same pair cannot deadlock.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use rayon::prelude::*;

use crate::{
    config::{FerryConfig, TransferConfig},
    runtime::{Context, HostBindings, RegistryRef, RuntimeError, StackIndex, Value},
    transfer::{Transfer, TransferError, is_environment, transfer_value_with},
};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Both sides of a two-session operation are the same session.
    SameSession,
    Transfer(TransferError),
    Runtime(RuntimeError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::SameSession => write!(f, "source and destination are the same session"),
            SessionError::Transfer(err) => write!(f, "transfer failed: {}", err),
            SessionError::Runtime(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::SameSession => None,
            SessionError::Transfer(err) => Some(err),
            SessionError::Runtime(err) => Some(err),
        }
    }
}

impl From<TransferError> for SessionError {
    fn from(err: TransferError) -> Self {
        SessionError::Transfer(err)
    }
}

impl From<RuntimeError> for SessionError {
    fn from(err: RuntimeError) -> Self {
        SessionError::Runtime(err)
    }
}

#[derive(Clone)]
pub struct Session {
    id: u64,
    context: Arc<Mutex<Context>>,
    transfer: Arc<TransferConfig>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("id", &self.id).finish()
    }
}

impl Session {
    pub fn new(context: Context) -> Self {
        Self::with_transfer_config(context, TransferConfig::default())
    }

    pub fn with_transfer_config(context: Context, transfer: TransferConfig) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            context: Arc::new(Mutex::new(context)),
            transfer: Arc::new(transfer),
        }
    }

    /// Fresh context built from `config`.
    pub fn from_config(config: &FerryConfig, bindings: Arc<HostBindings>) -> Self {
        Self::with_transfer_config(
            Context::with_config(&config.context, bindings),
            config.transfer.clone(),
        )
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Locks the context. A panic in an earlier holder does not make the
    /// context unusable.
    pub fn lock(&self) -> MutexGuard<'_, Context> {
        self.context.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copies the value at `index` into `dest` and pins it there.
    pub fn transfer_to(&self, index: StackIndex, dest: &Session) -> Result<RegistryRef, SessionError> {
        let (source, mut target) = lock_pair(self, dest)?;
        transfer_value_with(&source, index, &mut target, &self.transfer)?;
        let reference = target.pin(-1)?;
        target.pop(1)?;
        Ok(reference)
    }

    /// Runs the function below the top `nargs` values of this session's
    /// stack inside `dest`, and replaces function and arguments with the
    /// result copied back.
    ///
    /// Function and arguments are popped on every path; the result is only
    /// pushed on success. `dest`'s stack is left as it was.
    pub fn call_remote(&self, nargs: usize, dest: &Session) -> Result<(), SessionError> {
        let (mut source, mut target) = lock_pair(self, dest)?;
        let func_slot = callee_slot(&source, nargs)?;

        let top = target.stack.len();
        let outcome = run_remote(&source, &mut target, func_slot, nargs, &self.transfer);
        source.stack.truncate(func_slot);

        let result = outcome.and_then(|()| {
            transfer_value_with(&target, -1, &mut source, &self.transfer).map_err(SessionError::from)
        });
        target.stack.truncate(top);
        if let Err(err) = &result {
            log::debug!("session {}: remote call in {} failed: {}", self.id, dest.id, err);
        }
        result
    }

    /// Like [`Session::call_remote`] on every worker at once.
    ///
    /// Pushes one result per worker in `workers` order, nil where that
    /// worker failed, and returns the per-worker outcomes.
    pub fn call_fan_out(
        &self,
        nargs: usize,
        workers: &[Session],
    ) -> Result<Vec<Result<(), SessionError>>, SessionError> {
        let mut guards = lock_all(self, workers)?;
        let mut source = guards.remove(&self.id).ok_or(SessionError::SameSession)?;
        let mut targets = workers
            .iter()
            .map(|worker| guards.remove(&worker.id).ok_or(SessionError::SameSession))
            .collect::<Result<Vec<_>, _>>()?;

        let func_slot = callee_slot(&source, nargs)?;
        let config = &*self.transfer;
        let source_ref: &Context = &source;
        let contexts: Vec<&mut Context> = targets.iter_mut().map(|guard| &mut **guard).collect();
        let runs: Vec<(usize, Result<(), SessionError>)> = contexts
            .into_par_iter()
            .map(|target| {
                let top = target.stack.len();
                (top, run_remote(source_ref, target, func_slot, nargs, config))
            })
            .collect();
        source.stack.truncate(func_slot);

        let mut outcomes = Vec::with_capacity(runs.len());
        for (target, (top, outcome)) in targets.iter_mut().zip(runs) {
            let outcome = outcome.and_then(|()| {
                transfer_value_with(&**target, -1, &mut source, config).map_err(SessionError::from)
            });
            if outcome.is_err() {
                source.push_nil();
            }
            target.stack.truncate(top);
            outcomes.push(outcome);
        }
        log::debug!(
            "session {}: fan-out over {} workers, {} failed",
            self.id,
            outcomes.len(),
            outcomes.iter().filter(|outcome| outcome.is_err()).count()
        );
        Ok(outcomes)
    }
}

/// Locks two distinct sessions in id order and returns the guards in
/// argument order.
pub fn lock_pair<'a>(
    a: &'a Session,
    b: &'a Session,
) -> Result<(MutexGuard<'a, Context>, MutexGuard<'a, Context>), SessionError> {
    if a.id == b.id {
        return Err(SessionError::SameSession);
    }
    if a.id < b.id {
        let first = a.lock();
        let second = b.lock();
        Ok((first, second))
    } else {
        let second = b.lock();
        let first = a.lock();
        Ok((first, second))
    }
}

fn lock_all<'a>(
    source: &'a Session,
    workers: &'a [Session],
) -> Result<HashMap<u64, MutexGuard<'a, Context>>, SessionError> {
    let mut sessions: Vec<&Session> = std::iter::once(source).chain(workers).collect();
    sessions.sort_by_key(|session| session.id);
    if sessions.windows(2).any(|pair| pair[0].id == pair[1].id) {
        return Err(SessionError::SameSession);
    }
    Ok(sessions
        .into_iter()
        .map(|session| (session.id, session.lock()))
        .collect())
}

fn callee_slot(source: &Context, nargs: usize) -> Result<usize, SessionError> {
    source
        .stack
        .len()
        .checked_sub(nargs + 1)
        .ok_or(SessionError::Runtime(RuntimeError::StackUnderflow))
}

/// Copies the function at `func_slot` and its arguments into `target`,
/// merges the source globals it depends on, and calls it. Leaves the result
/// on top of `target`.
fn run_remote(
    source: &Context,
    target: &mut Context,
    func_slot: usize,
    nargs: usize,
    config: &TransferConfig,
) -> Result<(), SessionError> {
    let func_index = func_slot as StackIndex + 1;
    transfer_value_with(source, func_index, target, config)?;

    let function = source.value_at(func_index)?;
    if let Some((name, env)) = source.upvalue(&function, 1)
        && is_environment(source, name, &env)
        && let Value::Table(globals) = source.globals()
    {
        let top = target.stack.len();
        target.push_globals();
        let mut transfer = Transfer::new(source, target, config);
        let merged = transfer.merge_into(globals, -1);
        transfer.finish();
        match merged {
            Ok(count) => log::trace!("remote call: merged {} globals", count),
            Err(err) => log::warn!("remote call: globals not merged: {}", err),
        }
        target.stack.truncate(top);
    }

    for i in 0..nargs {
        let index = func_index + 1 + i as StackIndex;
        if let Err(err) = transfer_value_with(source, index, target, config) {
            log::warn!("remote call: argument {} not transferable ({}), passing nil", i + 1, err);
            target.push_nil();
        }
    }
    target.call(nargs)?;
    Ok(())
}
