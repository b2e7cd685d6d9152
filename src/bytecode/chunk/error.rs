use std::fmt;

/// Why a function could not be written as a binary chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpError {
    /// Native functions have no bytecode to write.
    NativeFunction(&'static str),
    /// The value is not a function at all.
    NotAFunction(&'static str),
    /// Growing the output buffer failed.
    OutOfMemory { requested: usize },
    /// The chunk would exceed the configured size limit.
    TooLarge { limit: usize },
}

impl fmt::Display for DumpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DumpError::NativeFunction(name) => {
                write!(f, "unable to dump native function '{}'", name)
            }
            DumpError::NotAFunction(type_name) => {
                write!(f, "unable to dump a {} value", type_name)
            }
            DumpError::OutOfMemory { requested } => {
                write!(f, "out of memory growing chunk buffer to {} bytes", requested)
            }
            DumpError::TooLarge { limit } => {
                write!(f, "chunk exceeds the {} byte limit", limit)
            }
        }
    }
}

impl std::error::Error for DumpError {}

/// Why a binary chunk was rejected by the loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// Input does not start with the binary chunk signature.
    NotBinary,
    UnsupportedVersion(u16),
    Truncated,
    InvalidUtf8,
    InvalidOpcode { offset: usize, byte: u8 },
    InvalidConstantTag(u8),
    InvalidUpvalueKind(u8),
    /// An operand refers to a slot, constant, prototype, or jump target that does not exist.
    OperandOutOfRange { offset: usize },
    /// Prototypes nest deeper than the loader accepts.
    TooDeep,
    /// Bytes remain after the main function.
    TrailingBytes(usize),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::NotBinary => write!(f, "not a binary chunk"),
            LoadError::UnsupportedVersion(version) => {
                write!(f, "unsupported chunk format version {}", version)
            }
            LoadError::Truncated => write!(f, "truncated chunk"),
            LoadError::InvalidUtf8 => write!(f, "chunk string is not valid UTF-8"),
            LoadError::InvalidOpcode { offset, byte } => {
                write!(f, "invalid opcode {} at offset {}", byte, offset)
            }
            LoadError::InvalidConstantTag(tag) => write!(f, "invalid constant tag {}", tag),
            LoadError::InvalidUpvalueKind(kind) => write!(f, "invalid upvalue kind {}", kind),
            LoadError::OperandOutOfRange { offset } => {
                write!(f, "operand out of range at offset {}", offset)
            }
            LoadError::TooDeep => write!(f, "function prototypes nested too deeply"),
            LoadError::TrailingBytes(count) => {
                write!(f, "{} unexpected bytes after chunk", count)
            }
        }
    }
}

impl std::error::Error for LoadError {}
