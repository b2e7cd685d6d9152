use crate::{
    bytecode::{builder::FunctionBuilder, op_code::OpCode},
    runtime::context::Context,
};

use super::trace::{format_location, format_trace_line};

#[test]
fn trace_line_shows_location_and_operands() {
    let mut builder = FunctionBuilder::main_chunk();
    let key = builder.string("x");
    builder.line(3);
    builder.emit(OpCode::OpGetTabUp, &[0, key]);
    let proto = builder.build();

    assert_eq!(
        format_trace_line(&proto, 0, OpCode::OpGetTabUp, 1, 4),
        "[main:3] 0000 OpGetTabUp 0 0 depth=1 top=4"
    );
}

#[test]
fn location_without_debug_info() {
    let proto = FunctionBuilder::new("f").build().stripped();
    assert_eq!(format_location(&proto, 0), "?");
}

#[test]
fn traceback_is_empty_when_idle() {
    assert!(Context::new().traceback().is_empty());
}

#[test]
fn tracing_does_not_change_results() {
    let mut ctx = Context::new();
    ctx.set_trace(true);
    let mut builder = FunctionBuilder::main_chunk();
    builder.emit(OpCode::OpTrue, &[]);
    builder.emit(OpCode::OpReturn, &[]);
    ctx.load_prototype(builder.build(), "=trace").unwrap();
    ctx.call(0).unwrap();
    assert!(ctx.to_boolean(-1));
}
