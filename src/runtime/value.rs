use std::{fmt, sync::Arc};

use crate::{
    bytecode::prototype::Constant,
    runtime::{
        builtin_function::BuiltinFunction,
        gc::GcHandle,
        hash_key::{HashKey, float_to_integer},
        host::{Proxy, ProxyKind},
    },
};

/// Runtime value used by the VM stack, tables, upvalue cells and the registry.
///
/// Strings and numbers are plain data. Tables, script functions and userdata
/// are handles into the owning context's GC heap, so a `Value` holding one of
/// them is only meaningful inside that context. Proxies share their host
/// object through an `Arc` and are valid in any context.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(Arc<str>),
    /// Untyped host pointer, copied by value.
    LightRef(usize),
    Table(GcHandle),
    /// Script closure.
    Function(GcHandle),
    /// Native function.
    Builtin(BuiltinFunction),
    Proxy(Proxy),
    Userdata(GcHandle),
}

/// Type tag of a value, as seen by scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Nil,
    Boolean,
    Number,
    String,
    LightRef,
    Table,
    Function,
    Userdata,
}

impl ValueType {
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Nil => "nil",
            ValueType::Boolean => "boolean",
            ValueType::Number => "number",
            ValueType::String => "string",
            ValueType::LightRef => "lightuserdata",
            ValueType::Table => "table",
            ValueType::Function => "function",
            ValueType::Userdata => "userdata",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{:.1}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::LightRef(v) => write!(f, "lightuserdata: 0x{:x}", v),
            Value::Table(h) => write!(f, "table: {}", h),
            Value::Function(h) => write!(f, "function: {}", h),
            Value::Builtin(b) => write!(f, "function: builtin: {}", b.name),
            Value::Proxy(p) => write!(f, "{}: 0x{:x}", p.kind, p.host.address()),
            Value::Userdata(h) => write!(f, "userdata: {}", h),
        }
    }
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Nil => ValueType::Nil,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Integer(_) | Value::Float(_) => ValueType::Number,
            Value::String(_) => ValueType::String,
            Value::LightRef(_) => ValueType::LightRef,
            Value::Table(_) => ValueType::Table,
            Value::Function(_) | Value::Builtin(_) => ValueType::Function,
            Value::Proxy(_) | Value::Userdata(_) => ValueType::Userdata,
        }
    }

    /// Returns the type name used in diagnostics and by the `type` builtin.
    pub fn type_name(&self) -> &'static str {
        self.value_type().name()
    }

    /// Identity of a heap-allocated reference value inside its own context.
    ///
    /// Two values with the same identity are the same object. Builtins,
    /// proxies and plain data have no identity.
    pub fn identity(&self) -> Option<u64> {
        self.gc_handle().map(|h| u64::from(h.index()))
    }

    pub(crate) fn gc_handle(&self) -> Option<GcHandle> {
        match self {
            Value::Table(h) | Value::Function(h) | Value::Userdata(h) => Some(*h),
            _ => None,
        }
    }

    pub fn proxy_kind(&self) -> Option<ProxyKind> {
        match self {
            Value::Proxy(p) => Some(p.kind),
            _ => None,
        }
    }

    /// Only `nil` and `false` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Boolean(false))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Equality without metamethods: numbers compare by value across
    /// integer and float, references by identity.
    pub fn raw_equal(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
                float_to_integer(*b) == Some(*a)
            }
            _ => self == other,
        }
    }

    /// Numeric view of a value. Strings are not coerced.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::Float(v) => float_to_integer(*v),
            _ => None,
        }
    }

    /// Table key for this value; `None` for nil and NaN.
    pub fn to_hash_key(&self) -> Option<HashKey> {
        match self {
            Value::Nil => None,
            Value::Boolean(v) => Some(HashKey::Boolean(*v)),
            Value::Integer(v) => Some(HashKey::Integer(*v)),
            Value::Float(v) if v.is_nan() => None,
            Value::Float(v) => Some(match float_to_integer(*v) {
                Some(i) => HashKey::Integer(i),
                None => HashKey::Float(v.to_bits()),
            }),
            Value::String(v) => Some(HashKey::String(v.clone())),
            Value::LightRef(v) => Some(HashKey::LightRef(*v)),
            Value::Table(h) => Some(HashKey::Table(*h)),
            Value::Function(h) => Some(HashKey::Function(*h)),
            Value::Userdata(h) => Some(HashKey::Userdata(*h)),
            Value::Builtin(b) => Some(HashKey::Builtin(b.clone())),
            Value::Proxy(p) => Some(HashKey::Proxy(p.clone())),
        }
    }

    pub fn string(value: &str) -> Self {
        Value::String(value.into())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.into())
    }
}

impl From<&Constant> for Value {
    fn from(constant: &Constant) -> Self {
        match constant {
            Constant::Nil => Value::Nil,
            Constant::Boolean(v) => Value::Boolean(*v),
            Constant::Integer(v) => Value::Integer(*v),
            Constant::Float(v) => Value::Float(*v),
            Constant::String(v) => Value::String(v.clone()),
        }
    }
}

impl HashKey {
    pub(crate) fn gc_handle(&self) -> Option<GcHandle> {
        match self {
            HashKey::Table(h) | HashKey::Function(h) | HashKey::Userdata(h) => Some(*h),
            _ => None,
        }
    }
}
