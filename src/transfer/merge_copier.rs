use crate::{
    runtime::{GcHandle, RuntimeError, StackIndex, Value},
    transfer::{Transfer, TransferError},
};

impl Transfer<'_> {
    /// Copies the entries of source table `handle` whose keys are unbound in
    /// the destination table at `target`. Returns the number added.
    ///
    /// The destination table itself is not registered, so a source table that
    /// reaches it again is copied as a new table. On failure every entry this
    /// call added is removed again.
    pub fn merge_into(&mut self, handle: GcHandle, target: StackIndex) -> Result<usize, TransferError> {
        let target_table = match self.dest.value_at(target)? {
            Value::Table(table) => table,
            other => {
                return Err(RuntimeError::TypeMismatch {
                    expected: "table",
                    found: other.type_name(),
                }
                .into());
            }
        };
        let target = self.dest.abs_index(target)?;
        let source = self.source;
        let table = source.table(handle)?;

        let mut added = Vec::new();
        for (key, value) in table.iter() {
            if let Err(err) = self.merge_entry(target_table, target, &key.to_value(), value, &mut added) {
                for key in &added {
                    self.dest.raw_store(target_table, key, Value::Nil)?;
                }
                log::trace!("merge: rolled back {} entries", added.len());
                return Err(err);
            }
        }
        Ok(added.len())
    }

    fn merge_entry(
        &mut self,
        target_table: GcHandle,
        target: StackIndex,
        key: &Value,
        value: &Value,
        added: &mut Vec<Value>,
    ) -> Result<(), TransferError> {
        self.copy(key)?;
        let key = self.dest.value_at(-1)?;
        if !self.dest.raw_lookup(target_table, &key)?.is_nil() {
            log::trace!("merge: keeping existing {}", key);
            self.dest.pop(1)?;
            return Ok(());
        }
        if let Err(err) = self.copy(value) {
            self.dest.pop(1)?;
            return Err(err);
        }
        self.dest.raw_set(target)?;
        added.push(key);
        Ok(())
    }
}
