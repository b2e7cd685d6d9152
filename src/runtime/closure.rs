use std::sync::Arc;

use crate::{bytecode::prototype::Prototype, runtime::gc::GcHandle};

/// Script function instance: shared prototype plus one heap cell per
/// captured variable.
#[derive(Debug, Clone)]
pub struct Closure {
    pub proto: Arc<Prototype>,
    pub upvalues: Vec<GcHandle>,
}

impl Closure {
    pub fn new(proto: Arc<Prototype>, upvalues: Vec<GcHandle>) -> Self {
        Self { proto, upvalues }
    }
}
