use crate::{
    bytecode::prototype::ENV_UPVALUE,
    runtime::{Context, RegistryRef, Value},
    transfer::{Pending, Transfer, TransferError},
};

impl Transfer<'_> {
    /// Copies a script function through a binary chunk. Its captured values
    /// are queued and copied once the loaded function is registered.
    pub(super) fn copy_function(&mut self, identity: u64, function: &Value) -> Result<(), TransferError> {
        let bytes = self.source.dump_value(function, self.config.strip_debug)?;
        self.dest.load_binary(&bytes, &self.config.chunk_name)?;
        let dest = self.register(identity)?;
        log::trace!(
            "transfer: function 0x{:08x} ({} byte chunk)",
            identity,
            bytes.len()
        );
        self.pending.push(Pending::Upvalues {
            source: function.clone(),
            dest,
        });
        Ok(())
    }

    /// A first upvalue holding the source environment is rebound to the
    /// destination's own globals instead of being copied.
    pub(super) fn fill_upvalues(&mut self, function: &Value, dest: RegistryRef) -> Result<(), TransferError> {
        let source = self.source;
        self.dest.push_pinned(dest)?;
        let slot = self.dest.get_top();

        let mut n = 1;
        while let Some((name, value)) = source.upvalue(function, n) {
            if n == 1 && is_environment(source, name, &value) {
                self.dest.push_globals();
            } else {
                self.copy_shallow(&value)?;
            }
            self.dest.set_upvalue(slot, n)?;
            n += 1;
        }
        self.dest.pop(1)?;
        Ok(())
    }
}

/// Stripped functions have no upvalue names; their environment is recognised
/// by holding the source globals table.
pub(crate) fn is_environment(source: &Context, name: &str, value: &Value) -> bool {
    name == ENV_UPVALUE || (name.is_empty() && *value == source.globals())
}
