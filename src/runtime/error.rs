use std::fmt;

use crate::bytecode::chunk::{DumpError, LoadError};

use super::StackIndex;

/// Errors raised by context operations and script execution.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// Stack index outside the current stack.
    InvalidIndex(StackIndex),
    StackUnderflow,
    StackOverflow { limit: usize },
    CallDepthExceeded { limit: usize },
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    /// Table key was nil or NaN.
    InvalidKey(&'static str),
    NotCallable(&'static str),
    Arithmetic {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },
    /// Upvalue index (1-based) the function does not have.
    NoSuchUpvalue(usize),
    /// Heap handle that no longer names a live object.
    DanglingHandle(u32),
    Builtin { name: &'static str, message: String },
    Dump(DumpError),
    Load(LoadError),
    /// `<` between values with no ordering.
    Compare {
        left: &'static str,
        right: &'static str,
    },
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::InvalidIndex(index) => write!(f, "invalid stack index {}", index),
            RuntimeError::StackUnderflow => write!(f, "stack underflow"),
            RuntimeError::StackOverflow { limit } => {
                write!(f, "stack overflow (limit {} slots)", limit)
            }
            RuntimeError::CallDepthExceeded { limit } => {
                write!(f, "call depth exceeded (limit {})", limit)
            }
            RuntimeError::TypeMismatch { expected, found } => {
                write!(f, "{} expected, got {}", expected, found)
            }
            RuntimeError::InvalidKey(kind) => write!(f, "table index is {}", kind),
            RuntimeError::NotCallable(kind) => write!(f, "attempt to call a {} value", kind),
            RuntimeError::Arithmetic { op, left, right } => write!(
                f,
                "attempt to perform arithmetic ({}) on {} and {}",
                op, left, right
            ),
            RuntimeError::NoSuchUpvalue(n) => write!(f, "no upvalue at index {}", n),
            RuntimeError::DanglingHandle(slot) => write!(f, "dangling heap handle 0x{:08x}", slot),
            RuntimeError::Builtin { name, message } => write!(f, "{}: {}", name, message),
            RuntimeError::Dump(err) => write!(f, "dump failed: {}", err),
            RuntimeError::Load(err) => write!(f, "load failed: {}", err),
            RuntimeError::Compare { left, right } => {
                write!(f, "attempt to compare {} with {}", left, right)
            }
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuntimeError::Dump(err) => Some(err),
            RuntimeError::Load(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DumpError> for RuntimeError {
    fn from(err: DumpError) -> Self {
        RuntimeError::Dump(err)
    }
}

impl From<LoadError> for RuntimeError {
    fn from(err: LoadError) -> Self {
        RuntimeError::Load(err)
    }
}
