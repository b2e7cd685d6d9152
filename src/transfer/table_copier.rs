use crate::{
    runtime::{GcHandle, RegistryRef},
    transfer::{Pending, Transfer, TransferError},
};

impl Transfer<'_> {
    /// Pushes a new, empty destination table for the source table `handle`.
    ///
    /// The table is registered before any entry is visited, so entries that
    /// lead back to it resolve to the table being filled.
    pub(super) fn copy_table(&mut self, identity: u64, handle: GcHandle) -> Result<(), TransferError> {
        self.dest.new_table();
        let dest = self.register(identity)?;
        self.pending.push(Pending::Table {
            source: handle,
            dest,
        });
        Ok(())
    }

    pub(super) fn fill_table(&mut self, handle: GcHandle, dest: RegistryRef) -> Result<(), TransferError> {
        let source = self.source;
        let table = source.table(handle)?;
        log::trace!("transfer: filling {} ({} entries)", dest, table.entry_count());

        self.dest.push_pinned(dest)?;
        let slot = self.dest.get_top();
        for (key, value) in table.iter() {
            self.copy_shallow(&key.to_value())?;
            self.copy_shallow(value)?;
            self.dest.raw_set(slot)?;
        }
        self.dest.pop(1)?;
        Ok(())
    }
}
