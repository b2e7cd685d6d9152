use crate::{
    bytecode::{chunk::LoadError, prototype::Prototype},
    runtime::{context::Context, error::RuntimeError, value::Value},
};

impl Context {
    pub(super) fn execute_get_tab_up(
        &mut self,
        proto: &Prototype,
        upvalue: usize,
        key: usize,
    ) -> Result<(), RuntimeError> {
        let key = constant_key(proto, key)?;
        let cell = self.upvalue_cell(upvalue)?;
        let target = self.cell(cell)?.clone();
        let value = self.index_value(&target, &key)?;
        self.push_operand(value)
    }

    pub(super) fn execute_set_tab_up(
        &mut self,
        proto: &Prototype,
        upvalue: usize,
        key: usize,
    ) -> Result<(), RuntimeError> {
        let key = constant_key(proto, key)?;
        let cell = self.upvalue_cell(upvalue)?;
        let value = self.pop_operand()?;
        let target = self.cell(cell)?.clone();
        self.store_value(&target, &key, value)
    }

    /// `table key -- value`
    pub(super) fn execute_get_index(&mut self) -> Result<(), RuntimeError> {
        let key = self.pop_operand()?;
        let target = self.pop_operand()?;
        let value = self.index_value(&target, &key)?;
        self.push_operand(value)
    }

    /// `table key value --`
    pub(super) fn execute_set_index(&mut self) -> Result<(), RuntimeError> {
        let value = self.pop_operand()?;
        let key = self.pop_operand()?;
        let target = self.pop_operand()?;
        self.store_value(&target, &key, value)
    }

    fn index_value(&self, target: &Value, key: &Value) -> Result<Value, RuntimeError> {
        match target {
            Value::Table(handle) => self.raw_lookup(*handle, key),
            other => Err(RuntimeError::TypeMismatch {
                expected: "table",
                found: other.type_name(),
            }),
        }
    }

    fn store_value(&mut self, target: &Value, key: &Value, value: Value) -> Result<(), RuntimeError> {
        match target {
            Value::Table(handle) => self.raw_store(*handle, key, value),
            other => Err(RuntimeError::TypeMismatch {
                expected: "table",
                found: other.type_name(),
            }),
        }
    }
}

fn constant_key(proto: &Prototype, index: usize) -> Result<Value, RuntimeError> {
    proto
        .constants
        .get(index)
        .map(Value::from)
        .ok_or(RuntimeError::Load(LoadError::OperandOutOfRange { offset: index }))
}
