use crate::{
    bytecode::op_code::OpCode,
    runtime::{context::Context, error::RuntimeError, value::Value},
};

impl Context {
    pub(super) fn execute_binary_operation(&mut self, op: OpCode) -> Result<(), RuntimeError> {
        let right = self.pop_operand()?;
        let left = self.pop_operand()?;
        let result = binary_operation(op, &left, &right)?;
        self.push_operand(result)
    }

    pub(super) fn execute_minus_operator(&mut self) -> Result<(), RuntimeError> {
        let operand = self.pop_operand()?;
        let result = match operand {
            Value::Integer(v) => Value::Integer(v.wrapping_neg()),
            Value::Float(v) => Value::Float(-v),
            other => {
                return Err(RuntimeError::Arithmetic {
                    op: "unm",
                    left: other.type_name(),
                    right: other.type_name(),
                });
            }
        };
        self.push_operand(result)
    }

    pub(super) fn execute_len_operator(&mut self) -> Result<(), RuntimeError> {
        let operand = self.pop_operand()?;
        let len = match &operand {
            Value::String(s) => s.len(),
            Value::Table(handle) => self.table(*handle)?.len(),
            other => {
                return Err(RuntimeError::TypeMismatch {
                    expected: "table or string",
                    found: other.type_name(),
                });
            }
        };
        self.push_operand(Value::Integer(len as i64))
    }
}

fn symbol(op: OpCode) -> &'static str {
    match op {
        OpCode::OpAdd => "+",
        OpCode::OpSub => "-",
        OpCode::OpMul => "*",
        OpCode::OpDiv => "/",
        OpCode::OpConcat => "..",
        _ => "?",
    }
}

/// Integer arithmetic wraps; mixing in a float, or dividing, gives a float.
pub(super) fn binary_operation(op: OpCode, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    let mismatch = || RuntimeError::Arithmetic {
        op: symbol(op),
        left: left.type_name(),
        right: right.type_name(),
    };

    if op == OpCode::OpConcat {
        return match (concat_piece(left), concat_piece(right)) {
            (Some(l), Some(r)) => Ok(Value::String(format!("{}{}", l, r).into())),
            _ => Err(mismatch()),
        };
    }

    if let (Value::Integer(a), Value::Integer(b)) = (left, right) {
        match op {
            OpCode::OpAdd => return Ok(Value::Integer(a.wrapping_add(*b))),
            OpCode::OpSub => return Ok(Value::Integer(a.wrapping_sub(*b))),
            OpCode::OpMul => return Ok(Value::Integer(a.wrapping_mul(*b))),
            _ => {}
        }
    }

    let (Some(a), Some(b)) = (left.as_number(), right.as_number()) else {
        return Err(mismatch());
    };
    let result = match op {
        OpCode::OpAdd => a + b,
        OpCode::OpSub => a - b,
        OpCode::OpMul => a * b,
        OpCode::OpDiv => a / b,
        _ => return Err(mismatch()),
    };
    Ok(Value::Float(result))
}

fn concat_piece(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.to_string()),
        Value::Integer(_) | Value::Float(_) => Some(value.to_string()),
        _ => None,
    }
}
