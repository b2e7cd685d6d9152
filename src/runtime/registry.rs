use std::fmt;

use crate::runtime::value::Value;

/// Handle to a pinned value in a context's registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistryRef(pub(crate) u32);

impl RegistryRef {
    pub fn slot(self) -> u32 {
        self.0
    }
}

impl fmt::Display for RegistryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ref#{}", self.0)
    }
}

/// Pins values against collection. Every occupied slot is a GC root.
#[derive(Debug, Default)]
pub struct Registry {
    slots: Vec<Option<Value>>,
    free: Vec<u32>,
}

impl Registry {
    pub fn pin(&mut self, value: Value) -> RegistryRef {
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot as usize] = Some(value);
                RegistryRef(slot)
            }
            None => {
                let slot = self.slots.len() as u32;
                self.slots.push(Some(value));
                RegistryRef(slot)
            }
        }
    }

    pub fn get(&self, reference: RegistryRef) -> Option<&Value> {
        self.slots.get(reference.0 as usize).and_then(Option::as_ref)
    }

    /// Releases a pin. Releasing a free or unknown slot is a no-op.
    pub fn unpin(&mut self, reference: RegistryRef) {
        if let Some(slot) = self.slots.get_mut(reference.0 as usize)
            && slot.take().is_some()
        {
            self.free.push(reference.0);
        }
    }

    pub fn pinned_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.slots.iter().flatten()
    }
}
