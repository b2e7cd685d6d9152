//! Bytecode interpreter.
//!
//! The interpreter is a set of `impl Context` blocks: frames and operands
//! live on the context's own stack so the collector sees them as roots.
//! Each frame owns the slots `base..base + num_locals` for its locals;
//! operands are pushed above them.

use crate::{
    bytecode::{
        chunk::LoadError,
        op_code::{OpCode, instruction_len},
    },
    runtime::{context::Context, error::RuntimeError, frame::Frame, value::Value},
};

mod binary_ops;
mod comparison_ops;
mod dispatch;
mod function_call;
mod index_ops;
mod trace;

impl Context {
    /// Executes frames until the frame stack is back to `entry_depth`.
    pub(crate) fn run(&mut self, entry_depth: usize) -> Result<(), RuntimeError> {
        let mut depth = self.frames.len();
        let mut proto = match self.frames.last() {
            Some(frame) => frame.proto.clone(),
            None => return Ok(()),
        };

        while self.frames.len() > entry_depth {
            if self.frames.len() != depth {
                depth = self.frames.len();
                proto = self.current_frame()?.proto.clone();
            }

            let ip = self.current_frame()?.ip;
            if ip >= proto.instructions.len() {
                // Falling off the end returns nil.
                self.return_from_frame(Value::Nil)?;
                continue;
            }

            let op = OpCode::try_from(proto.instructions[ip])
                .map_err(|byte| RuntimeError::Load(LoadError::InvalidOpcode { offset: ip, byte }))?;
            if self.trace {
                self.trace_instruction(&proto, ip, op);
            }

            self.current_frame_mut()?.ip = ip + instruction_len(op);
            self.dispatch_instruction(&proto, ip, op)?;
        }
        Ok(())
    }

    fn current_frame(&self) -> Result<&Frame, RuntimeError> {
        self.frames.last().ok_or(RuntimeError::StackUnderflow)
    }

    fn current_frame_mut(&mut self) -> Result<&mut Frame, RuntimeError> {
        self.frames.last_mut().ok_or(RuntimeError::StackUnderflow)
    }

    fn push_operand(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.stack.len() >= self.config.max_stack {
            return Err(RuntimeError::StackOverflow {
                limit: self.config.max_stack,
            });
        }
        self.stack.push(value);
        Ok(())
    }

    /// Pops an operand, never reaching into the current frame's locals.
    fn pop_operand(&mut self) -> Result<Value, RuntimeError> {
        let floor = self.current_frame()?.locals_end();
        if self.stack.len() <= floor {
            return Err(RuntimeError::StackUnderflow);
        }
        self.pop_value()
    }

    fn local_slot(&self, index: usize) -> Result<usize, RuntimeError> {
        let frame = self.current_frame()?;
        let slot = frame.base + index;
        if slot >= frame.locals_end() || slot >= self.stack.len() {
            return Err(RuntimeError::StackUnderflow);
        }
        Ok(slot)
    }
}

#[cfg(test)]
mod trace_test;
