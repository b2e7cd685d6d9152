use ferry::{
    Context, TransferError, Value,
    bytecode::{
        builder::FunctionBuilder,
        chunk::DumpError,
        op_code::OpCode,
        prototype::UpvalueSource,
    },
    config::ContextConfigBuilder,
    merge_environment,
    runtime::{HostBindings, HostRef, ProxyKind, ValueType},
    transfer_value,
};

/// `function() return n + t.k end` with `n` and `t` as upvalues 2 and 3.
fn push_adder(ctx: &mut Context, n: i64, k: i64) {
    let mut builder = FunctionBuilder::main_chunk();
    builder.upvalue("n", UpvalueSource::Enclosing(0));
    builder.upvalue("t", UpvalueSource::Enclosing(0));
    let key = builder.string("k");
    builder.emit(OpCode::OpGetUpvalue, &[1]);
    builder.emit(OpCode::OpGetUpvalue, &[2]);
    builder.emit(OpCode::OpConstant, &[key]);
    builder.emit(OpCode::OpGetIndex, &[]);
    builder.emit(OpCode::OpAdd, &[]);
    builder.emit(OpCode::OpReturn, &[]);
    ctx.load_prototype(builder.build(), "=adder").unwrap();

    ctx.push_integer(n);
    ctx.set_upvalue(-2, 2).unwrap();
    ctx.new_table();
    ctx.push_integer(k);
    ctx.raw_set_field(-2, "k").unwrap();
    ctx.set_upvalue(-2, 3).unwrap();
}

/// `function() return other end`, `other` being upvalue 2.
fn push_pointer(ctx: &mut Context) {
    let mut builder = FunctionBuilder::main_chunk();
    builder.upvalue("other", UpvalueSource::Enclosing(0));
    builder.emit(OpCode::OpGetUpvalue, &[1]);
    builder.emit(OpCode::OpReturn, &[]);
    ctx.load_prototype(builder.build(), "=pointer").unwrap();
}

fn field(ctx: &mut Context, index: i32, name: &str) -> Value {
    ctx.raw_get_field(index, name).unwrap();
    let value = ctx.value_at(-1).unwrap();
    ctx.pop(1).unwrap();
    value
}

#[test]
fn primitives_copy_by_content() {
    let mut source = Context::new();
    source.push_nil();
    source.push_boolean(true);
    source.push_boolean(false);
    source.push_integer(-7);
    source.push_number(2.5);
    source.push_string("hello");
    source.push_light_ref(0xdead);

    let mut dest = Context::new();
    for index in 1..=source.get_top() {
        transfer_value(&source, index, &mut dest).unwrap();
        assert_eq!(dest.value_at(-1), source.value_at(index));
    }
    assert_eq!(dest.get_top(), 7);
    assert_eq!(dest.pinned_count(), 0);
}

#[test]
fn shared_table_stays_shared() {
    let mut source = Context::new();
    source.new_table();
    source.new_table();
    source.push_value_at(-1).unwrap();
    source.raw_set_field(1, "a").unwrap();
    source.raw_set_field(1, "b").unwrap();
    assert_eq!(source.get_top(), 1);

    let mut dest = Context::new();
    transfer_value(&source, 1, &mut dest).unwrap();
    let a = field(&mut dest, -1, "a");
    let b = field(&mut dest, -1, "b");
    assert_eq!(a.value_type(), ValueType::Table);
    assert_eq!(a, b);
    assert_eq!(dest.pinned_count(), 0);
}

#[test]
fn self_referential_table() {
    // T = {1, 2, nested = T}
    let mut source = Context::new();
    source.new_table();
    source.push_integer(1);
    source.raw_set_index(1, 1).unwrap();
    source.push_integer(2);
    source.raw_set_index(1, 2).unwrap();
    source.push_value_at(1).unwrap();
    source.raw_set_field(1, "nested").unwrap();

    let mut dest = Context::new();
    transfer_value(&source, -1, &mut dest).unwrap();
    let copy = dest.value_at(-1).unwrap();

    dest.raw_get_index(-1, 1).unwrap();
    assert_eq!(dest.to_integer(-1), Some(1));
    dest.pop(1).unwrap();
    dest.raw_get_index(-1, 2).unwrap();
    assert_eq!(dest.to_integer(-1), Some(2));
    dest.pop(1).unwrap();
    assert_eq!(field(&mut dest, -1, "nested"), copy);
    assert_eq!(dest.raw_len(-1), Ok(2));
}

#[test]
fn closure_sees_the_same_captured_values() {
    let mut source = Context::new();
    push_adder(&mut source, 40, 2);

    let mut dest = Context::new();
    transfer_value(&source, -1, &mut dest).unwrap();

    source.call(0).unwrap();
    dest.call(0).unwrap();
    assert_eq!(source.value_at(-1), Ok(Value::Integer(42)));
    assert_eq!(dest.value_at(-1), source.value_at(-1));
}

#[test]
fn closure_environment_is_the_destination_globals() {
    let mut source = Context::new();
    push_adder(&mut source, 1, 1);

    let mut dest = Context::new();
    let before = dest.live_objects();
    transfer_value(&source, -1, &mut dest).unwrap();

    assert_eq!(dest.get_upvalue(-1, 1), Ok(Some(String::new())));
    assert_eq!(dest.value_at(-1), Ok(dest.globals()));
    // The function, its three cells and the captured table.
    assert_eq!(dest.live_objects(), before + 5);
}

#[test]
fn merge_keeps_existing_bindings() {
    let mut source = Context::new();
    source.new_table();
    source.push_string("source");
    source.raw_set_field(-2, "x").unwrap();
    source.push_integer(1);
    source.raw_set_field(-2, "y").unwrap();

    let mut dest = Context::new();
    dest.new_table();
    dest.push_string("dest");
    dest.raw_set_field(-2, "x").unwrap();

    assert_eq!(merge_environment(&source, -1, &mut dest), Ok(1));
    assert_eq!(dest.get_top(), 1);
    assert_eq!(field(&mut dest, -1, "x"), Value::string("dest"));
    assert_eq!(field(&mut dest, -1, "y"), Value::Integer(1));
    assert_eq!(dest.pinned_count(), 0);
}

#[test]
fn merging_globals_skips_builtins_already_bound() {
    let mut source = Context::new();
    source.push_integer(5);
    source.set_global("answer").unwrap();
    source.push_globals();

    let mut dest = Context::new();
    dest.push_globals();
    assert_eq!(merge_environment(&source, -1, &mut dest), Ok(1));
    dest.pop(1).unwrap();
    dest.get_global("answer");
    assert_eq!(dest.to_integer(-1), Some(5));
}

#[test]
fn builtin_inside_a_table_fails_cleanly() {
    let mut source = Context::new();
    source.new_table();
    source.new_table();
    source.raw_set_field(-2, "fine").unwrap();
    source.get_global("tostring");
    source.raw_set_field(-2, "native").unwrap();

    let mut dest = Context::new();
    dest.push_integer(1);
    assert_eq!(
        transfer_value(&source, -1, &mut dest),
        Err(TransferError::Dump(DumpError::NativeFunction("tostring")))
    );
    assert_eq!(dest.get_top(), 1);
    assert_eq!(dest.pinned_count(), 0);
}

#[test]
fn raw_userdata_is_unsupported() {
    let mut source = Context::new();
    source.new_userdata("buffer", vec![0; 16]);
    let mut dest = Context::new();
    assert_eq!(
        transfer_value(&source, -1, &mut dest),
        Err(TransferError::Unsupported("userdata"))
    );
}

#[test]
fn proxies_share_the_host_object() {
    #[derive(Debug)]
    struct Account {
        balance: i64,
    }

    let host = HostRef::new(Account { balance: 12 });
    let mut source = Context::new();
    source.push_proxy(ProxyKind::Instance, host.clone());
    source.push_proxy(ProxyKind::Class, host.clone());

    let mut dest = Context::new();
    transfer_value(&source, 1, &mut dest).unwrap();
    transfer_value(&source, 2, &mut dest).unwrap();

    assert_eq!(dest.proxy_kind(1), Some(ProxyKind::Instance));
    assert_eq!(dest.proxy_kind(2), Some(ProxyKind::Class));
    let Value::Proxy(proxy) = dest.value_at(1).unwrap() else {
        panic!("expected a proxy");
    };
    assert!(proxy.host.ptr_eq(&host));
    assert_eq!(proxy.host.downcast_ref::<Account>().map(|a| a.balance), Some(12));
    // host, two source proxies, two destination proxies and `proxy`.
    assert_eq!(host.strong_count(), 6);
}

#[test]
fn mutually_recursive_closures() {
    let mut source = Context::new();
    push_pointer(&mut source);
    push_pointer(&mut source);
    source.push_value_at(2).unwrap();
    source.set_upvalue(1, 2).unwrap();
    source.push_value_at(1).unwrap();
    source.set_upvalue(2, 2).unwrap();

    let mut dest = Context::new();
    transfer_value(&source, 1, &mut dest).unwrap();
    dest.get_upvalue(-1, 2).unwrap();
    dest.get_upvalue(-1, 2).unwrap();

    let first = dest.value_at(1).unwrap();
    let second = dest.value_at(2).unwrap();
    assert_eq!(dest.value_at(3), Ok(first.clone()));
    assert_ne!(first, second);
    assert_eq!(second.value_type(), ValueType::Function);
    assert_eq!(dest.pinned_count(), 0);
}

#[test]
fn same_function_twice_is_one_copy() {
    let mut source = Context::new();
    source.new_table();
    push_pointer(&mut source);
    source.push_value_at(-1).unwrap();
    source.raw_set_field(1, "a").unwrap();
    source.raw_set_field(1, "b").unwrap();

    let mut dest = Context::new();
    transfer_value(&source, 1, &mut dest).unwrap();
    assert_eq!(field(&mut dest, -1, "a"), field(&mut dest, -1, "b"));
    assert_eq!(dest.chunk_cache().misses(), 1);
}

#[test]
fn closures_sharing_a_body_decode_it_once() {
    let mut source = Context::new();
    source.new_table();
    push_pointer(&mut source);
    let bytes = source.dump(-1, false).unwrap();
    source.pop(1).unwrap();
    source.load_binary(&bytes, "=one").unwrap();
    source.raw_set_field(1, "a").unwrap();
    source.load_binary(&bytes, "=two").unwrap();
    source.raw_set_field(1, "b").unwrap();

    let mut dest = Context::new();
    transfer_value(&source, 1, &mut dest).unwrap();
    assert_ne!(field(&mut dest, -1, "a"), field(&mut dest, -1, "b"));
    assert_eq!(dest.chunk_cache().misses(), 1);
    assert_eq!(dest.chunk_cache().hits(), 1);
}

#[test]
fn copies_survive_collection_in_the_destination() {
    let mut source = Context::new();
    source.new_table();
    for i in 1..=50 {
        source.new_table();
        source.push_integer(i);
        source.raw_set_field(-2, "i").unwrap();
        source.raw_set_index(1, i).unwrap();
    }

    let config = ferry::config::ContextConfig {
        gc_threshold: 1,
        ..Default::default()
    };
    let mut dest = Context::with_config(&config, ferry::runtime::HostBindings::empty());
    transfer_value(&source, 1, &mut dest).unwrap();
    dest.collect_garbage();

    assert_eq!(dest.raw_len(-1), Ok(50));
    dest.raw_get_index(-1, 50).unwrap();
    assert_eq!(field(&mut dest, -1, "i"), Value::Integer(50));
}

#[test]
fn oversized_function_chunk_fails_only_that_copy() {
    let config = ContextConfigBuilder::new().with_max_chunk_size(16).get();
    let mut source = Context::with_config(&config, HostBindings::empty());
    source.new_table();
    push_adder(&mut source, 1, 2);
    source.raw_set_field(-2, "add").unwrap();

    let mut dest = Context::new();
    dest.push_integer(1);
    assert_eq!(
        transfer_value(&source, -1, &mut dest),
        Err(TransferError::Dump(DumpError::TooLarge { limit: 16 }))
    );
    assert_eq!(dest.get_top(), 1);
    assert_eq!(dest.pinned_count(), 0);

    source.push_string("plain");
    source.raw_set_field(-2, "add").unwrap();
    assert_eq!(transfer_value(&source, -1, &mut dest), Ok(()));
    assert_eq!(field(&mut dest, -1, "add"), Value::string("plain"));
}
