use crate::{
    bytecode::{
        chunk::LoadError,
        op_code::{OpCode, read_u8, read_u16},
        prototype::Prototype,
    },
    runtime::{context::Context, error::RuntimeError, value::Value},
};

impl Context {
    pub(super) fn dispatch_instruction(
        &mut self,
        proto: &Prototype,
        ip: usize,
        op: OpCode,
    ) -> Result<(), RuntimeError> {
        let code = &proto.instructions;
        match op {
            OpCode::OpConstant => {
                let index = read_u16(code, ip + 1) as usize;
                let constant = proto
                    .constants
                    .get(index)
                    .ok_or(RuntimeError::Load(LoadError::OperandOutOfRange { offset: ip }))?;
                self.push_operand(Value::from(constant))
            }
            OpCode::OpNil => self.push_operand(Value::Nil),
            OpCode::OpTrue => self.push_operand(Value::Boolean(true)),
            OpCode::OpFalse => self.push_operand(Value::Boolean(false)),
            OpCode::OpPop => self.pop_operand().map(drop),
            OpCode::OpGetLocal => {
                let slot = self.local_slot(read_u8(code, ip + 1) as usize)?;
                let value = self.stack[slot].clone();
                self.push_operand(value)
            }
            OpCode::OpSetLocal => {
                let slot = self.local_slot(read_u8(code, ip + 1) as usize)?;
                let value = self.pop_operand()?;
                self.stack[slot] = value;
                Ok(())
            }
            OpCode::OpGetUpvalue => {
                let cell = self.upvalue_cell(read_u8(code, ip + 1) as usize)?;
                let value = self.cell(cell)?.clone();
                self.push_operand(value)
            }
            OpCode::OpSetUpvalue => {
                let cell = self.upvalue_cell(read_u8(code, ip + 1) as usize)?;
                let value = self.pop_operand()?;
                *self.cell_mut(cell)? = value;
                Ok(())
            }
            OpCode::OpGetTabUp => {
                let upvalue = read_u8(code, ip + 1) as usize;
                let key = read_u16(code, ip + 2) as usize;
                self.execute_get_tab_up(proto, upvalue, key)
            }
            OpCode::OpSetTabUp => {
                let upvalue = read_u8(code, ip + 1) as usize;
                let key = read_u16(code, ip + 2) as usize;
                self.execute_set_tab_up(proto, upvalue, key)
            }
            OpCode::OpNewTable => {
                self.new_table();
                if self.stack.len() > self.config.max_stack {
                    self.stack.pop();
                    return Err(RuntimeError::StackOverflow {
                        limit: self.config.max_stack,
                    });
                }
                Ok(())
            }
            OpCode::OpGetIndex => self.execute_get_index(),
            OpCode::OpSetIndex => self.execute_set_index(),
            OpCode::OpAdd
            | OpCode::OpSub
            | OpCode::OpMul
            | OpCode::OpDiv
            | OpCode::OpConcat => self.execute_binary_operation(op),
            OpCode::OpMinus => self.execute_minus_operator(),
            OpCode::OpNot => {
                let operand = self.pop_operand()?;
                self.push_operand(Value::Boolean(!operand.is_truthy()))
            }
            OpCode::OpLen => self.execute_len_operator(),
            OpCode::OpEqual | OpCode::OpLessThan => self.execute_comparison(op),
            OpCode::OpJump => {
                self.current_frame_mut()?.ip = read_u16(code, ip + 1) as usize;
                Ok(())
            }
            OpCode::OpJumpIfFalse => {
                let condition = self.pop_operand()?;
                if !condition.is_truthy() {
                    self.current_frame_mut()?.ip = read_u16(code, ip + 1) as usize;
                }
                Ok(())
            }
            OpCode::OpCall => {
                let nargs = read_u8(code, ip + 1) as usize;
                let floor = self.current_frame()?.locals_end();
                let callee_slot = self
                    .stack
                    .len()
                    .checked_sub(nargs + 1)
                    .filter(|slot| *slot >= floor)
                    .ok_or(RuntimeError::StackUnderflow)?;
                self.call_value(callee_slot, nargs)
            }
            OpCode::OpReturn => {
                let floor = self.current_frame()?.locals_end();
                let result = if self.stack.len() > floor {
                    self.pop_value()?
                } else {
                    Value::Nil
                };
                self.return_from_frame(result)
            }
            OpCode::OpClosure => {
                let index = read_u16(code, ip + 1) as usize;
                self.push_closure(proto, index)
            }
        }
    }
}
