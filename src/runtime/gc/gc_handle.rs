use std::fmt;

/// Handle into a context's GC heap.
///
/// A `GcHandle` is a copyable slot index. It is only meaningful inside the
/// context that allocated it; the same index in another context names an
/// unrelated object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GcHandle(pub(crate) u32);

impl GcHandle {
    /// Returns the raw heap slot index backing this handle.
    pub fn index(self) -> u32 {
        self.0
    }

    #[cfg(test)]
    pub fn new_for_test(index: u32) -> Self {
        Self(index)
    }
}

impl fmt::Display for GcHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}
