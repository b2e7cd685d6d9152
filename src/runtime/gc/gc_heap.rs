use crate::runtime::{
    gc::{gc_handle::GcHandle, heap_entry::HeapEntry, heap_object::HeapObject},
    value::Value,
};

const DEFAULT_GC_THRESHOLD: usize = 10_000;
pub(crate) const MIN_GC_THRESHOLD: usize = 64;
const MAX_GC_THRESHOLD: usize = 1_000_000;

/// Stop-the-world mark-and-sweep garbage collector heap.
///
/// Tables, closures, upvalue cells and userdata blocks live here. The owning
/// context decides when to collect; the heap never collects on its own.
pub struct GcHeap {
    entries: Vec<Option<HeapEntry>>,
    free_list: Vec<u32>,
    allocation_count: usize,
    gc_threshold: usize,
    gc_enabled: bool,
    total_collections: usize,
    total_allocations: usize,
}

impl Default for GcHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GcHeap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcHeap")
            .field("live", &self.live_count())
            .field("threshold", &self.gc_threshold)
            .field("collections", &self.total_collections)
            .finish()
    }
}

impl GcHeap {
    /// Creates a new GC heap with default collection settings.
    ///
    /// Defaults:
    /// - threshold: `10_000` allocations
    /// - GC enabled: `true`
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            free_list: Vec::new(),
            allocation_count: 0,
            gc_threshold: DEFAULT_GC_THRESHOLD,
            gc_enabled: true,
            total_collections: 0,
            total_allocations: 0,
        }
    }

    /// Creates a new heap with a custom GC allocation threshold.
    ///
    /// Unlike [`Self::set_threshold`], this does not clamp to `MIN_GC_THRESHOLD`.
    pub fn with_threshold(threshold: usize) -> Self {
        let mut heap = Self::new();
        heap.gc_threshold = threshold;
        heap
    }

    /// Enables or disables automatic collection checks.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.gc_enabled = enabled
    }

    /// Sets the allocation threshold that triggers collection.
    ///
    /// Values below `MIN_GC_THRESHOLD` are clamped upward.
    pub fn set_threshold(&mut self, threshold: usize) {
        self.gc_threshold = threshold.max(MIN_GC_THRESHOLD)
    }

    pub fn threshold(&self) -> usize {
        self.gc_threshold
    }

    /// Returns `true` when GC is enabled and the threshold was reached.
    pub fn should_collect(&self) -> bool {
        self.gc_enabled && self.allocation_count >= self.gc_threshold
    }

    /// Allocates a new heap object and returns a stable handle to it.
    ///
    /// Freed slots are reused through the internal free-list before growing
    /// the storage vector.
    pub fn alloc(&mut self, object: HeapObject) -> GcHandle {
        self.allocation_count += 1;
        self.total_allocations += 1;

        let entry = HeapEntry {
            object,
            marked: false,
        };

        if let Some(idx) = self.free_list.pop() {
            self.entries[idx as usize] = Some(entry);
            GcHandle(idx)
        } else {
            let idx = self.entries.len() as u32;
            self.entries.push(Some(entry));
            GcHandle(idx)
        }
    }

    /// Returns the live object behind `handle`, or `None` for a free or
    /// out-of-bounds slot.
    pub fn get(&self, handle: GcHandle) -> Option<&HeapObject> {
        self.entries
            .get(handle.0 as usize)
            .and_then(Option::as_ref)
            .map(|entry| &entry.object)
    }

    pub fn get_mut(&mut self, handle: GcHandle) -> Option<&mut HeapObject> {
        self.entries
            .get_mut(handle.0 as usize)
            .and_then(Option::as_mut)
            .map(|entry| &mut entry.object)
    }

    /// Returns the number of currently live heap entries.
    pub fn live_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_some()).count()
    }

    /// Returns the total number of allocations performed by this heap.
    pub fn total_allocations(&self) -> usize {
        self.total_allocations
    }

    /// Returns the total number of completed GC cycles.
    pub fn total_collections(&self) -> usize {
        self.total_collections
    }

    /// Runs a full stop-the-world mark-and-sweep collection.
    ///
    /// `roots` are values held outside the heap (stack slots, registry pins);
    /// `root_handles` are objects the owner keeps alive directly (the globals
    /// table, closures of active frames). Returns the number of freed objects.
    pub fn collect<'a>(
        &mut self,
        roots: impl IntoIterator<Item = &'a Value>,
        root_handles: &[GcHandle],
    ) -> usize {
        let mut worklist: Vec<GcHandle> = Vec::with_capacity(64);
        worklist.extend(roots.into_iter().filter_map(Value::gc_handle));
        worklist.extend_from_slice(root_handles);
        self.mark(worklist);

        let live_before = self.live_count();
        self.sweep();
        let live_after = self.live_count();
        let collected = live_before.saturating_sub(live_after);

        self.total_collections += 1;
        self.allocation_count = 0;

        self.adapt_threshold(collected, live_before);
        collected
    }

    fn mark(&mut self, mut worklist: Vec<GcHandle>) {
        while let Some(handle) = worklist.pop() {
            let idx = handle.index() as usize;

            // Mark first so cycles/shared objects are visited once.
            match self.entries.get_mut(idx).and_then(Option::as_mut) {
                Some(entry) if !entry.marked => entry.marked = true,
                _ => continue,
            }

            let object = match self.entries[idx].as_ref() {
                Some(entry) => &entry.object,
                None => continue,
            };

            match object {
                HeapObject::Table(table) => {
                    for (key, value) in table.iter() {
                        worklist.extend(key.gc_handle());
                        worklist.extend(value.gc_handle());
                    }
                }
                HeapObject::Closure(closure) => {
                    worklist.extend_from_slice(&closure.upvalues);
                }
                HeapObject::Upvalue(value) => worklist.extend(value.gc_handle()),
                HeapObject::Userdata(_) => {}
            }
        }
    }

    fn sweep(&mut self) {
        for (i, slot) in self.entries.iter_mut().enumerate() {
            if let Some(entry) = slot {
                if entry.marked {
                    entry.marked = false;
                } else {
                    *slot = None;
                    self.free_list.push(i as u32);
                }
            }
        }
    }

    fn adapt_threshold(&mut self, collected: usize, total_before: usize) {
        if total_before == 0 {
            return;
        }

        let ratio = collected as f64 / total_before as f64;
        if ratio < 0.25 {
            self.gc_threshold = (self.gc_threshold * 2).min(MAX_GC_THRESHOLD);
        } else if ratio > 0.75 {
            self.gc_threshold = (self.gc_threshold / 2).max(MIN_GC_THRESHOLD)
        }
    }
}
