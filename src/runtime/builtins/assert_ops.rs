use crate::runtime::{context::Context, value::Value};

use super::helpers::check_arity;

/// `assert(v [, message])`: returns `v` when truthy, fails otherwise.
pub(super) fn builtin_assert(_ctx: &mut Context, mut args: Vec<Value>) -> Result<Value, String> {
    check_arity(&args, 1..=2, "assert")?;
    if args[0].is_truthy() {
        return Ok(args.swap_remove(0));
    }
    match args.get(1) {
        Some(Value::String(message)) => Err(message.to_string()),
        Some(other) => Err(other.to_string()),
        None => Err("assertion failed!".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_truthy_value_through() {
        let mut ctx = Context::new();
        assert_eq!(
            builtin_assert(&mut ctx, vec![Value::Integer(0)]).unwrap(),
            Value::Integer(0)
        );
    }

    #[test]
    fn fails_with_message() {
        let mut ctx = Context::new();
        let err = builtin_assert(&mut ctx, vec![Value::Nil, Value::string("boom")]).unwrap_err();
        assert_eq!(err, "boom");
        let err = builtin_assert(&mut ctx, vec![Value::Boolean(false)]).unwrap_err();
        assert_eq!(err, "assertion failed!");
    }
}
