use crate::runtime::{context::Context, value::Value};

use super::helpers::{bad_argument, check_arity};

pub(super) fn builtin_type(_ctx: &mut Context, args: Vec<Value>) -> Result<Value, String> {
    check_arity(&args, 1..=1, "type")?;
    Ok(Value::string(args[0].type_name()))
}

pub(super) fn builtin_rawequal(_ctx: &mut Context, args: Vec<Value>) -> Result<Value, String> {
    check_arity(&args, 2..=2, "rawequal")?;
    Ok(Value::Boolean(args[0].raw_equal(&args[1])))
}

pub(super) fn builtin_rawlen(ctx: &mut Context, args: Vec<Value>) -> Result<Value, String> {
    check_arity(&args, 1..=1, "rawlen")?;
    match &args[0] {
        Value::String(s) => Ok(Value::Integer(s.len() as i64)),
        Value::Table(handle) => {
            let table = ctx.table(*handle).map_err(|err| err.to_string())?;
            Ok(Value::Integer(table.len() as i64))
        }
        other => Err(bad_argument("rawlen", 0, "table or string", other)),
    }
}

pub(super) fn builtin_tostring(_ctx: &mut Context, args: Vec<Value>) -> Result<Value, String> {
    check_arity(&args, 1..=1, "tostring")?;
    Ok(Value::String(args[0].to_string().into()))
}
