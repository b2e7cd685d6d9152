use std::ops::RangeInclusive;

use crate::runtime::value::Value;

/// Fails unless `args.len()` lies within `arity`.
pub(super) fn check_arity(args: &[Value], arity: RangeInclusive<usize>, name: &str) -> Result<(), String> {
    if arity.contains(&args.len()) {
        return Ok(());
    }
    let expected = if arity.start() == arity.end() {
        arity.start().to_string()
    } else {
        format!("{} to {}", arity.start(), arity.end())
    };
    Err(format!(
        "wrong number of arguments to '{}' (expected {}, got {})",
        name,
        expected,
        args.len()
    ))
}

/// Complaint about the argument at zero-based `index`, numbered from one in
/// the message.
pub(super) fn bad_argument(name: &str, index: usize, expected: &str, got: &Value) -> String {
    format!(
        "bad argument #{} to '{}' ({} expected, got {})",
        index + 1,
        name,
        expected,
        got.type_name()
    )
}

pub(super) fn arg_string<'a>(args: &'a [Value], index: usize, name: &str) -> Result<&'a str, String> {
    match args.get(index) {
        Some(Value::String(s)) => Ok(&**s),
        Some(other) => Err(bad_argument(name, index, "string", other)),
        None => Err(bad_argument(name, index, "string", &Value::Nil)),
    }
}
