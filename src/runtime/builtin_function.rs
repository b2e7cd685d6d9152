use std::{
    fmt,
    hash::{Hash, Hasher},
};

use crate::runtime::BuiltinFn;

/// Native function value. Callable from scripts but has no bytecode, so it
/// can never be dumped or moved to another context.
#[derive(Clone)]
pub struct BuiltinFunction {
    pub name: &'static str,
    pub func: BuiltinFn,
}

impl fmt::Debug for BuiltinFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BuiltinFunction({})", self.name)
    }
}

impl PartialEq for BuiltinFunction {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for BuiltinFunction {}

impl Hash for BuiltinFunction {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}
