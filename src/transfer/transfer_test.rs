use crate::{
    bytecode::{builder::FunctionBuilder, chunk::LoadError, op_code::OpCode},
    config::TransferConfig,
    runtime::{Context, RuntimeError, Value, ValueType},
    transfer::{Transfer, TransferError, merge_environment, transfer_value},
};

/// Pushes `depth` tables, each stored under `"next"` of the previous one,
/// leaving the outermost on top.
fn push_chain(ctx: &mut Context, depth: usize) {
    ctx.new_table();
    for _ in 1..depth {
        ctx.new_table();
        ctx.push_string("next");
        ctx.push_value_at(-3).unwrap();
        ctx.raw_set(-3).unwrap();
        ctx.remove(-2).unwrap();
    }
}

#[test]
fn long_chains_copy_with_the_defaults() {
    let mut source = Context::new();
    push_chain(&mut source, 1000);

    let mut dest = Context::new();
    dest.push_integer(1);
    assert_eq!(transfer_value(&source, -1, &mut dest), Ok(()));
    assert_eq!(dest.get_top(), 2);
    assert_eq!(dest.pinned_count(), 0);

    let mut length = 1;
    while dest.raw_get_field(-1, "next") == Ok(ValueType::Table) {
        dest.remove(-2).unwrap();
        length += 1;
    }
    assert_eq!(length, 1000);
    assert_eq!(dest.type_of(-1), Ok(ValueType::Nil));
}

#[test]
fn repeated_reference_reuses_its_copy() {
    let mut source = Context::new();
    push_chain(&mut source, 2);
    let value = source.value_at(-1).unwrap();

    let mut dest = Context::new();
    let config = TransferConfig::default();
    let mut transfer = Transfer::new(&source, &mut dest, &config);
    transfer.copy(&value).unwrap();
    transfer.copy(&value).unwrap();
    assert_eq!(transfer.copied(), 2);
    assert_eq!(transfer.finish(), 2);

    assert_eq!(dest.get_top(), 2);
    assert_eq!(dest.value_at(-1), dest.value_at(-2));
}

#[test]
fn stripped_function_environment_is_rebound() {
    let mut builder = FunctionBuilder::main_chunk();
    let name = builder.string("marker");
    builder.emit(OpCode::OpGetTabUp, &[0, name]);
    builder.emit(OpCode::OpReturn, &[]);

    let mut source = Context::new();
    source.load_prototype(builder.build(), "=src").unwrap();
    let bytes = source.dump(-1, true).unwrap();
    source.pop(1).unwrap();
    source.load_binary(&bytes, "=stripped").unwrap();
    assert_eq!(source.get_upvalue(-1, 1), Ok(Some(String::new())));
    source.pop(1).unwrap();

    let mut dest = Context::new();
    dest.push_string("dest");
    dest.set_global("marker").unwrap();
    transfer_value(&source, -1, &mut dest).unwrap();

    dest.get_upvalue(-1, 1).unwrap();
    assert_eq!(dest.value_at(-1), Ok(dest.globals()));
    dest.pop(1).unwrap();
    dest.call(0).unwrap();
    assert_eq!(dest.value_at(-1), Ok(Value::string("dest")));
}

#[test]
fn userdata_is_unsupported() {
    let mut source = Context::new();
    source.new_userdata("blob", vec![1, 2, 3]);
    let mut dest = Context::new();
    assert_eq!(
        transfer_value(&source, -1, &mut dest),
        Err(TransferError::Unsupported("userdata"))
    );
    assert_eq!(dest.get_top(), 0);
}

#[test]
fn runtime_load_errors_keep_their_kind() {
    let err = TransferError::from(RuntimeError::Load(LoadError::Truncated));
    assert_eq!(err, TransferError::Load(LoadError::Truncated));
    let err = TransferError::from(RuntimeError::StackUnderflow);
    assert_eq!(err, TransferError::Runtime(RuntimeError::StackUnderflow));
}

#[test]
fn failed_merge_entry_leaves_only_the_target() {
    let mut source = Context::new();
    source.new_table();
    source.new_userdata("blob", Vec::new());
    source.raw_set_field(-2, "bad").unwrap();
    let Value::Table(table) = source.value_at(-1).unwrap() else {
        panic!("expected a table");
    };

    let mut dest = Context::new();
    dest.new_table();
    let config = TransferConfig::default();
    let mut transfer = Transfer::new(&source, &mut dest, &config);
    assert_eq!(
        transfer.merge_into(table, -1),
        Err(TransferError::Unsupported("userdata"))
    );
    assert_eq!(transfer.finish(), 0);
    assert_eq!(dest.get_top(), 1);
}

#[test]
fn failed_merge_removes_the_entries_it_added() {
    let mut source = Context::new();
    source.new_table();
    for name in ["a", "b", "c"] {
        source.new_table();
        source.raw_set_field(-2, name).unwrap();
    }
    source.new_userdata("blob", Vec::new());
    source.raw_set_field(-2, "bad").unwrap();

    let mut dest = Context::new();
    dest.new_table();
    dest.push_integer(7);
    dest.raw_set_field(-2, "kept").unwrap();

    assert_eq!(
        merge_environment(&source, -1, &mut dest),
        Err(TransferError::Unsupported("userdata"))
    );
    assert_eq!(dest.get_top(), 1);
    assert_eq!(dest.pinned_count(), 0);
    let pairs = dest.table_pairs(-1).unwrap();
    assert_eq!(pairs, vec![(Value::string("kept"), Value::Integer(7))]);
}

#[test]
fn merge_requires_a_destination_table() {
    let mut source = Context::new();
    source.new_table();
    let mut dest = Context::new();
    dest.push_integer(3);
    assert_eq!(
        merge_environment(&source, -1, &mut dest),
        Err(TransferError::Runtime(RuntimeError::TypeMismatch {
            expected: "table",
            found: "number",
        }))
    );
    assert_eq!(dest.type_of(-1), Ok(ValueType::Number));
}

#[test]
fn identities_are_released_after_copy() {
    let mut source = Context::new();
    push_chain(&mut source, 4);
    let mut dest = Context::new();
    let config = TransferConfig::default();
    let mut transfer = Transfer::new(&source, &mut dest, &config);
    transfer.copy_value(-1).unwrap();
    assert_eq!(transfer.copied(), 4);
    assert_eq!(transfer.finish(), 4);
    assert_eq!(dest.pinned_count(), 0);
}
