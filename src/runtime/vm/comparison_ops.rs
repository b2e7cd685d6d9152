use std::cmp::Ordering;

use crate::{
    bytecode::op_code::OpCode,
    runtime::{context::Context, error::RuntimeError, value::Value},
};

impl Context {
    pub(super) fn execute_comparison(&mut self, op: OpCode) -> Result<(), RuntimeError> {
        let right = self.pop_operand()?;
        let left = self.pop_operand()?;
        let result = compare(op, &left, &right)?;
        self.push_operand(Value::Boolean(result))
    }
}

pub(super) fn compare(op: OpCode, left: &Value, right: &Value) -> Result<bool, RuntimeError> {
    match op {
        OpCode::OpEqual => Ok(left.raw_equal(right)),
        _ => less_than(left, right),
    }
}

fn less_than(left: &Value, right: &Value) -> Result<bool, RuntimeError> {
    let ordering = match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => match (left.as_number(), right.as_number()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => {
                return Err(RuntimeError::Compare {
                    left: left.type_name(),
                    right: right.type_name(),
                });
            }
        },
    };
    // NaN compares false.
    Ok(ordering == Some(Ordering::Less))
}
