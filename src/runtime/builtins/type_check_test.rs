use crate::runtime::{context::Context, value::Value};

use super::type_check::{builtin_rawequal, builtin_rawlen, builtin_tostring, builtin_type};

#[test]
fn type_returns_type_name() {
    let mut ctx = Context::new();
    let result = builtin_type(&mut ctx, vec![Value::Integer(1)]).unwrap();
    assert_eq!(result, Value::string("number"));
    let result = builtin_type(&mut ctx, vec![Value::Nil]).unwrap();
    assert_eq!(result, Value::string("nil"));
}

#[test]
fn rawequal_compares_numbers_across_kinds() {
    let mut ctx = Context::new();
    assert_eq!(
        builtin_rawequal(&mut ctx, vec![Value::Integer(2), Value::Float(2.0)]).unwrap(),
        Value::Boolean(true)
    );
    assert_eq!(
        builtin_rawequal(&mut ctx, vec![Value::string("a"), Value::string("b")]).unwrap(),
        Value::Boolean(false)
    );
}

#[test]
fn rawlen_counts_table_border_and_string_bytes() {
    let mut ctx = Context::new();
    ctx.new_table();
    for i in 1..=3 {
        ctx.push_integer(i * 10);
        ctx.raw_set_index(-2, i).unwrap();
    }
    let table = ctx.value_at(-1).unwrap();
    assert_eq!(
        builtin_rawlen(&mut ctx, vec![table]).unwrap(),
        Value::Integer(3)
    );
    assert_eq!(
        builtin_rawlen(&mut ctx, vec![Value::string("héllo")]).unwrap(),
        Value::Integer(6)
    );
    assert_eq!(
        builtin_rawlen(&mut ctx, vec![Value::Boolean(true)]),
        Err("bad argument #1 to 'rawlen' (table or string expected, got boolean)".to_string())
    );
}

#[test]
fn tostring_formats_values() {
    let mut ctx = Context::new();
    assert_eq!(
        builtin_tostring(&mut ctx, vec![Value::Float(1.0)]).unwrap(),
        Value::string("1.0")
    );
    assert_eq!(
        builtin_tostring(&mut ctx, vec![Value::Boolean(false)]).unwrap(),
        Value::string("false")
    );
}
