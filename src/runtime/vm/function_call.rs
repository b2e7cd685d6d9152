use crate::{
    bytecode::{
        chunk::LoadError,
        prototype::{Prototype, UpvalueSource},
    },
    runtime::{
        closure::Closure, context::Context, error::RuntimeError, frame::Frame, gc::GcHandle,
        gc::HeapObject, value::Value,
    },
};

impl Context {
    /// Starts a call of the value at `callee_slot` with the `nargs` values
    /// above it as arguments.
    ///
    /// Builtins run to completion here and leave their result in
    /// `callee_slot`. Script functions get a new frame that the run loop
    /// executes.
    pub(crate) fn call_value(&mut self, callee_slot: usize, nargs: usize) -> Result<(), RuntimeError> {
        match self.stack[callee_slot].clone() {
            Value::Function(handle) => self.call_closure(handle, callee_slot, nargs),
            Value::Builtin(builtin) => {
                // Arguments stay on the stack while the builtin runs so the
                // collector still sees them.
                let args = self.stack[callee_slot + 1..].to_vec();
                let result = (builtin.func)(self, args).map_err(|message| RuntimeError::Builtin {
                    name: builtin.name,
                    message,
                })?;
                self.stack.truncate(callee_slot);
                self.push_operand(result)
            }
            other => Err(RuntimeError::NotCallable(other.type_name())),
        }
    }

    fn call_closure(&mut self, handle: GcHandle, callee_slot: usize, nargs: usize) -> Result<(), RuntimeError> {
        if self.frames.len() >= self.config.max_call_depth {
            return Err(RuntimeError::CallDepthExceeded {
                limit: self.config.max_call_depth,
            });
        }
        let closure = self.closure(handle)?;
        let proto = closure.proto.clone();
        let upvalues = closure.upvalues.clone();

        let base = callee_slot + 1;
        let locals_end = base + proto.num_locals as usize;
        if locals_end > self.config.max_stack {
            return Err(RuntimeError::StackOverflow {
                limit: self.config.max_stack,
            });
        }
        // Extra arguments are dropped; missing ones and plain locals start nil.
        self.stack.truncate(base + nargs.min(proto.num_params as usize));
        self.stack.resize(locals_end, Value::Nil);

        self.frames.push(Frame::new(handle, proto, upvalues, base));
        Ok(())
    }

    /// Pops the current frame and leaves `result` where its callee was.
    pub(super) fn return_from_frame(&mut self, result: Value) -> Result<(), RuntimeError> {
        let frame = self.frames.pop().ok_or(RuntimeError::StackUnderflow)?;
        self.stack.truncate(frame.base - 1);
        self.stack.push(result);
        Ok(())
    }

    /// Instantiates nested prototype `index` of `proto` as a closure.
    ///
    /// A local capture copies the local's current value into a fresh cell;
    /// an enclosing capture shares the enclosing closure's cell.
    pub(super) fn push_closure(&mut self, proto: &Prototype, index: usize) -> Result<(), RuntimeError> {
        let child = proto
            .protos
            .get(index)
            .cloned()
            .ok_or(RuntimeError::Load(LoadError::OperandOutOfRange { offset: index }))?;

        self.safe_point();
        let (base, enclosing) = {
            let frame = self.current_frame()?;
            (frame.base, frame.upvalues.clone())
        };

        let mut cells = Vec::with_capacity(child.upvalues.len());
        for desc in &child.upvalues {
            let cell = match desc.source {
                UpvalueSource::Local(slot) => {
                    let value = self
                        .stack
                        .get(base + slot as usize)
                        .cloned()
                        .unwrap_or(Value::Nil);
                    self.heap.alloc(HeapObject::Upvalue(value))
                }
                UpvalueSource::Enclosing(slot) => *enclosing
                    .get(slot as usize)
                    .ok_or(RuntimeError::NoSuchUpvalue(slot as usize + 1))?,
            };
            cells.push(cell);
        }

        let handle = self
            .heap
            .alloc(HeapObject::Closure(Closure::new(child, cells)));
        self.push_operand(Value::Function(handle))
    }

    pub(super) fn upvalue_cell(&self, index: usize) -> Result<GcHandle, RuntimeError> {
        self.current_frame()?
            .upvalues
            .get(index)
            .copied()
            .ok_or(RuntimeError::NoSuchUpvalue(index + 1))
    }
}
