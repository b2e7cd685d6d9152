use crate::runtime::{closure::Closure, table::Table, value::Value};

/// Objects that live on the GC-managed heap.
#[derive(Debug, Clone)]
pub enum HeapObject {
    Table(Table),
    /// Script function: a prototype plus its captured cells.
    Closure(Closure),
    /// Captured variable cell. Closures created from the same enclosing cell
    /// share it.
    Upvalue(Value),
    /// Raw host memory with no proxy binding. Not transferable.
    Userdata(Userdata),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Userdata {
    pub type_name: String,
    pub bytes: Vec<u8>,
}

impl HeapObject {
    pub fn kind_name(&self) -> &'static str {
        match self {
            HeapObject::Table(_) => "table",
            HeapObject::Closure(_) => "function",
            HeapObject::Upvalue(_) => "upvalue",
            HeapObject::Userdata(_) => "userdata",
        }
    }
}
