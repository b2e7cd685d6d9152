//! Host objects exposed to scripts as proxies.
//!
//! A proxy carries a shared reference to a host object plus a discriminant
//! saying how scripts see it. Copying a proxy between contexts rewraps the
//! same `Arc`; the host object itself is never cloned.

use std::{
    any::Any,
    collections::HashMap,
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

/// Anything the host can hand to scripts.
pub trait HostObject: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + Send + Sync + fmt::Debug> HostObject for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Shared reference to a host object. Equality and hashing are by pointer.
#[derive(Clone)]
pub struct HostRef(Arc<dyn HostObject>);

impl HostRef {
    pub fn new<T: HostObject>(object: T) -> Self {
        Self(Arc::new(object))
    }

    pub fn from_arc(object: Arc<dyn HostObject>) -> Self {
        Self(object)
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        (*self.0).as_any().downcast_ref::<T>()
    }

    pub fn ptr_eq(&self, other: &HostRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn address(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl fmt::Debug for HostRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostRef({:?} @ 0x{:x})", self.0, self.address())
    }
}

impl PartialEq for HostRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for HostRef {}

impl Hash for HostRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address().hash(state);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyKind {
    Class,
    Instance,
    Array,
}

impl ProxyKind {
    pub fn name(self) -> &'static str {
        match self {
            ProxyKind::Class => "class",
            ProxyKind::Instance => "instance",
            ProxyKind::Array => "array",
        }
    }
}

impl fmt::Display for ProxyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Proxy {
    pub kind: ProxyKind,
    pub host: HostRef,
}

impl Proxy {
    pub fn new(kind: ProxyKind, host: HostRef) -> Self {
        Self { kind, host }
    }
}

/// Class bindings visible to scripts through `bind_class`.
///
/// Built once at startup and shared read-only by every context.
#[derive(Debug, Default)]
pub struct HostBindings {
    classes: HashMap<String, HostRef>,
}

impl HostBindings {
    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn class(&self, name: &str) -> Option<&HostRef> {
        self.classes.get(name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Class names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.classes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[derive(Debug, Default)]
pub struct HostBindingsBuilder {
    classes: HashMap<String, HostRef>,
}

impl HostBindingsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `host` under `name`, replacing an earlier binding.
    pub fn class(mut self, name: impl Into<String>, host: HostRef) -> Self {
        self.classes.insert(name.into(), host);
        self
    }

    pub fn build(self) -> Arc<HostBindings> {
        Arc::new(HostBindings {
            classes: self.classes,
        })
    }
}
