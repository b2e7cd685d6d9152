use crate::{
    bytecode::chunk::DumpError,
    runtime::{StackIndex, Value},
    transfer::{Transfer, TransferError},
};

impl Transfer<'_> {
    /// Copies the source value at `index` onto the destination stack.
    pub fn copy_value(&mut self, index: StackIndex) -> Result<(), TransferError> {
        let value = self.source.value_at(index)?;
        self.copy(&value)
    }

    /// Pushes the complete destination copy of `value`. Leaves the
    /// destination stack unchanged on failure.
    pub fn copy(&mut self, value: &Value) -> Result<(), TransferError> {
        let top = self.dest.stack.len();
        let result = self.copy_shallow(value).and_then(|()| self.drain());
        if result.is_err() {
            self.pending.clear();
            self.dest.stack.truncate(top);
        }
        result
    }

    /// Pushes the copy of `value`. New tables and functions are pushed empty
    /// and queued for filling.
    pub(super) fn copy_shallow(&mut self, value: &Value) -> Result<(), TransferError> {
        match value {
            Value::Nil
            | Value::Boolean(_)
            | Value::Integer(_)
            | Value::Float(_)
            | Value::String(_)
            | Value::LightRef(_) => {
                self.dest.push(value.clone());
                Ok(())
            }
            Value::Proxy(proxy) => {
                self.dest.push_proxy(proxy.kind, proxy.host.clone());
                Ok(())
            }
            Value::Table(_) | Value::Function(_) => self.copy_reference(value),
            Value::Builtin(builtin) => Err(DumpError::NativeFunction(builtin.name).into()),
            Value::Userdata(_) => Err(TransferError::Unsupported("userdata")),
        }
    }

    fn copy_reference(&mut self, value: &Value) -> Result<(), TransferError> {
        let identity = value
            .identity()
            .ok_or(TransferError::Unsupported(value.type_name()))?;
        if let Some(reference) = self.identities.get(identity) {
            log::trace!("transfer: reuse {} for source 0x{:08x}", reference, identity);
            self.dest.push_pinned(reference)?;
            return Ok(());
        }
        match value {
            Value::Table(handle) => self.copy_table(identity, *handle),
            _ => self.copy_function(identity, value),
        }
    }
}
