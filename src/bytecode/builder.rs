use std::sync::Arc;

use crate::bytecode::{
    op_code::{Instructions, OpCode, make},
    prototype::{Constant, DebugInfo, ENV_UPVALUE, Prototype, UpvalueDesc, UpvalueSource},
};

/// Assembles a [`Prototype`] instruction by instruction.
///
/// This is the runtime's only front end: hosts and tests describe functions
/// directly in bytecode.
#[derive(Debug, Clone)]
pub struct FunctionBuilder {
    name: Option<String>,
    instructions: Instructions,
    constants: Vec<Constant>,
    upvalues: Vec<UpvalueDesc>,
    protos: Vec<Arc<Prototype>>,
    num_params: u8,
    num_locals: u8,
    lines: Vec<(u32, u32)>,
    current_line: Option<u32>,
}

impl FunctionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            instructions: Vec::new(),
            constants: Vec::new(),
            upvalues: Vec::new(),
            protos: Vec::new(),
            num_params: 0,
            num_locals: 0,
            lines: Vec::new(),
            current_line: None,
        }
    }

    /// Builder for a main chunk: its first upvalue is the global environment.
    pub fn main_chunk() -> Self {
        let mut builder = Self::new("main");
        builder.upvalue(ENV_UPVALUE, UpvalueSource::Enclosing(0));
        builder
    }

    /// Declares `count` parameters. Parameters occupy the first local slots.
    pub fn params(mut self, count: u8) -> Self {
        self.num_params = count;
        self.num_locals = self.num_locals.max(count);
        self
    }

    /// Reserves local slots, parameters included.
    pub fn locals(mut self, count: u8) -> Self {
        self.num_locals = count.max(self.num_params);
        self
    }

    /// Declares the next upvalue and returns its slot.
    pub fn upvalue(&mut self, name: &str, source: UpvalueSource) -> u8 {
        self.upvalues.push(UpvalueDesc {
            name: Some(name.to_string()),
            source,
        });
        (self.upvalues.len() - 1) as u8
    }

    /// Interns a constant and returns its pool index.
    pub fn constant(&mut self, constant: Constant) -> usize {
        if let Some(index) = self.constants.iter().position(|c| same_constant(c, &constant)) {
            return index;
        }
        self.constants.push(constant);
        self.constants.len() - 1
    }

    pub fn string(&mut self, value: &str) -> usize {
        self.constant(Constant::String(value.into()))
    }

    /// Adds a nested prototype for `OpClosure` and returns its index.
    pub fn child(&mut self, proto: Prototype) -> usize {
        self.protos.push(Arc::new(proto));
        self.protos.len() - 1
    }

    /// Line recorded for instructions emitted from now on.
    pub fn line(&mut self, line: u32) -> &mut Self {
        self.current_line = Some(line);
        self
    }

    /// Appends an instruction and returns its offset.
    pub fn emit(&mut self, op: OpCode, operands: &[usize]) -> usize {
        let pos = self.instructions.len();
        if let Some(line) = self.current_line
            && self.lines.last().map(|(_, last)| *last) != Some(line)
        {
            self.lines.push((pos as u32, line));
        }
        self.instructions.extend_from_slice(&make(op, operands));
        pos
    }

    /// Offset the next emitted instruction will get.
    pub fn offset(&self) -> usize {
        self.instructions.len()
    }

    /// Points the jump emitted at `pos` to `target`.
    pub fn patch_jump(&mut self, pos: usize, target: usize) {
        self.instructions[pos + 1] = (target >> 8) as u8;
        self.instructions[pos + 2] = target as u8;
    }

    pub fn build(self) -> Prototype {
        Prototype {
            instructions: self.instructions,
            constants: self.constants,
            upvalues: self.upvalues,
            protos: self.protos,
            num_params: self.num_params,
            num_locals: self.num_locals,
            debug_info: Some(DebugInfo {
                name: self.name,
                source: None,
                lines: self.lines,
            }),
        }
    }
}

// `Float(0.0)` and `Float(-0.0)` must stay distinct pool entries, and NaN
// must still intern.
fn same_constant(left: &Constant, right: &Constant) -> bool {
    match (left, right) {
        (Constant::Float(a), Constant::Float(b)) => a.to_bits() == b.to_bits(),
        _ => left == right,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_interned() {
        let mut builder = FunctionBuilder::new("f");
        let a = builder.string("x");
        let b = builder.constant(Constant::Integer(1));
        let c = builder.string("x");
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(builder.build().constants.len(), 2);
    }

    #[test]
    fn main_chunk_declares_env_first() {
        let proto = FunctionBuilder::main_chunk().build();
        assert_eq!(proto.upvalue_name(0), Some(ENV_UPVALUE));
    }

    #[test]
    fn patch_jump_rewrites_target() {
        let mut builder = FunctionBuilder::new("f");
        let jump = builder.emit(OpCode::OpJump, &[0]);
        builder.emit(OpCode::OpNil, &[]);
        let target = builder.offset();
        builder.patch_jump(jump, target);
        let proto = builder.build();
        assert_eq!(proto.instructions[..3], [OpCode::OpJump as u8, 0, 4]);
    }

    #[test]
    fn lines_record_changes_only() {
        let mut builder = FunctionBuilder::new("f");
        builder.line(1);
        builder.emit(OpCode::OpNil, &[]);
        builder.emit(OpCode::OpPop, &[]);
        builder.line(2);
        builder.emit(OpCode::OpReturn, &[]);
        let proto = builder.build();
        assert_eq!(proto.debug_info.unwrap().lines, vec![(0, 1), (2, 2)]);
    }

    #[test]
    fn params_reserve_locals() {
        let proto = FunctionBuilder::new("f").params(2).build();
        assert_eq!(proto.num_params, 2);
        assert_eq!(proto.num_locals, 2);
        let proto = FunctionBuilder::new("f").params(2).locals(1).build();
        assert_eq!(proto.num_locals, 2);
    }
}
