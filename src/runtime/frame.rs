use std::sync::Arc;

use crate::{bytecode::prototype::Prototype, runtime::gc::GcHandle};

/// Activation record of a running script function.
#[derive(Debug, Clone)]
pub struct Frame {
    pub closure: GcHandle,
    pub proto: Arc<Prototype>,
    /// Captured cells, copied from the closure when the frame is entered.
    pub upvalues: Vec<GcHandle>,
    pub ip: usize,
    /// Stack slot of local 0.
    pub base: usize,
}

impl Frame {
    pub fn new(closure: GcHandle, proto: Arc<Prototype>, upvalues: Vec<GcHandle>, base: usize) -> Self {
        Self {
            closure,
            proto,
            upvalues,
            ip: 0,
            base,
        }
    }

    /// First stack slot above the locals.
    pub fn locals_end(&self) -> usize {
        self.base + self.proto.num_locals as usize
    }
}
