use std::{fmt, sync::Arc};

use crate::runtime::{builtin_function::BuiltinFunction, gc::GcHandle, host::Proxy, value::Value};

/// Table key: the hashable projection of every value except nil and NaN.
///
/// Floats holding an exact integer are stored as `Integer`, so `t[1]` and
/// `t[1.0]` address the same slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashKey {
    Boolean(bool),
    Integer(i64),
    /// Bit pattern of a non-integral, non-NaN float.
    Float(u64),
    String(Arc<str>),
    LightRef(usize),
    Table(GcHandle),
    Function(GcHandle),
    Userdata(GcHandle),
    Builtin(BuiltinFunction),
    Proxy(Proxy),
}

impl HashKey {
    /// Recovers the key as a value, e.g. while iterating a table.
    pub fn to_value(&self) -> Value {
        match self {
            HashKey::Boolean(v) => Value::Boolean(*v),
            HashKey::Integer(v) => Value::Integer(*v),
            HashKey::Float(bits) => Value::Float(f64::from_bits(*bits)),
            HashKey::String(v) => Value::String(v.clone()),
            HashKey::LightRef(v) => Value::LightRef(*v),
            HashKey::Table(h) => Value::Table(*h),
            HashKey::Function(h) => Value::Function(*h),
            HashKey::Userdata(h) => Value::Userdata(*h),
            HashKey::Builtin(b) => Value::Builtin(b.clone()),
            HashKey::Proxy(p) => Value::Proxy(p.clone()),
        }
    }

    pub fn from_str(key: &str) -> Self {
        HashKey::String(key.into())
    }
}

/// Converts a float to an `i64` when it holds an exact integer in range.
pub(crate) fn float_to_integer(value: f64) -> Option<i64> {
    const LOWER: f64 = -9_223_372_036_854_775_808.0;
    const UPPER: f64 = 9_223_372_036_854_775_808.0;
    if value.fract() == 0.0 && (LOWER..UPPER).contains(&value) {
        Some(value as i64)
    } else {
        None
    }
}

impl fmt::Display for HashKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}
