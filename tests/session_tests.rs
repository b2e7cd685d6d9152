use std::thread;

use ferry::{
    Context, FerryConfig, Session, SessionError, Value,
    bytecode::{builder::FunctionBuilder, op_code::OpCode},
    runtime::{HostBindings, RuntimeError},
};

/// `function(x) return base + x end`
fn push_add_base(ctx: &mut Context) {
    let mut builder = FunctionBuilder::main_chunk().params(1);
    let base = builder.string("base");
    builder.emit(OpCode::OpGetTabUp, &[0, base]);
    builder.emit(OpCode::OpGetLocal, &[0]);
    builder.emit(OpCode::OpAdd, &[]);
    builder.emit(OpCode::OpReturn, &[]);
    ctx.load_prototype(builder.build(), "=add_base").unwrap();
}

/// `function(x) return type(x) end`
fn push_type_of(ctx: &mut Context) {
    let mut builder = FunctionBuilder::main_chunk().params(1);
    let type_name = builder.string("type");
    builder.emit(OpCode::OpGetTabUp, &[0, type_name]);
    builder.emit(OpCode::OpGetLocal, &[0]);
    builder.emit(OpCode::OpCall, &[1]);
    builder.emit(OpCode::OpReturn, &[]);
    ctx.load_prototype(builder.build(), "=type_of").unwrap();
}

fn set_base(session: &Session, base: Value) {
    let mut ctx = session.lock();
    ctx.push(base);
    ctx.set_global("base").unwrap();
}

fn assert_idle(session: &Session) {
    let ctx = session.lock();
    assert_eq!(ctx.pinned_count(), 0);
}

#[test]
fn transfer_to_pins_the_copy() {
    let source = Session::new(Context::new());
    let dest = Session::new(Context::new());
    {
        let mut ctx = source.lock();
        ctx.new_table();
        ctx.push_integer(1);
        ctx.raw_set_field(-2, "x").unwrap();
    }

    let reference = source.transfer_to(-1, &dest).unwrap();

    let mut ctx = dest.lock();
    assert_eq!(ctx.get_top(), 0);
    assert_eq!(ctx.pinned_count(), 1);
    ctx.push_pinned(reference).unwrap();
    ctx.raw_get_field(-1, "x").unwrap();
    assert_eq!(ctx.to_integer(-1), Some(1));
    ctx.unpin(reference);
    assert_eq!(ctx.pinned_count(), 0);
}

#[test]
fn same_session_is_rejected() {
    let session = Session::new(Context::new());
    session.lock().push_integer(1);
    assert_eq!(
        session.transfer_to(-1, &session.clone()),
        Err(SessionError::SameSession)
    );
    assert_eq!(
        session.call_remote(0, &session),
        Err(SessionError::SameSession)
    );
}

#[test]
fn remote_call_merges_missing_globals() {
    let source = Session::new(Context::new());
    let dest = Session::new(Context::new());
    set_base(&source, Value::Integer(10));
    {
        let mut ctx = source.lock();
        push_add_base(&mut ctx);
        ctx.push_integer(5);
    }

    source.call_remote(1, &dest).unwrap();

    {
        let ctx = source.lock();
        assert_eq!(ctx.get_top(), 1);
        assert_eq!(ctx.value_at(-1), Ok(Value::Integer(15)));
    }
    let mut ctx = dest.lock();
    assert_eq!(ctx.get_top(), 0);
    ctx.get_global("base");
    assert_eq!(ctx.to_integer(-1), Some(10));
    drop(ctx);
    assert_idle(&source);
    assert_idle(&dest);
}

#[test]
fn remote_call_keeps_destination_globals() {
    let source = Session::new(Context::new());
    let dest = Session::new(Context::new());
    set_base(&source, Value::Integer(10));
    set_base(&dest, Value::Integer(100));
    {
        let mut ctx = source.lock();
        push_add_base(&mut ctx);
        ctx.push_integer(5);
    }

    source.call_remote(1, &dest).unwrap();
    assert_eq!(source.lock().value_at(-1), Ok(Value::Integer(105)));
}

#[test]
fn untransferable_argument_arrives_as_nil() {
    let source = Session::new(Context::new());
    let dest = Session::new(Context::new());
    {
        let mut ctx = source.lock();
        push_type_of(&mut ctx);
        ctx.new_userdata("raw", vec![1]);
    }

    source.call_remote(1, &dest).unwrap();
    assert_eq!(source.lock().value_at(-1), Ok(Value::string("nil")));
}

#[test]
fn failed_remote_call_cleans_both_stacks() {
    let source = Session::new(Context::new());
    let dest = Session::new(Context::new());
    dest.lock().push_string("keep");
    {
        let mut ctx = source.lock();
        push_add_base(&mut ctx);
        ctx.push_integer(5);
    }

    let err = source.call_remote(1, &dest).unwrap_err();
    assert!(matches!(
        err,
        SessionError::Runtime(RuntimeError::Arithmetic { op: "+", .. })
    ));
    assert_eq!(source.lock().get_top(), 0);
    let ctx = dest.lock();
    assert_eq!(ctx.get_top(), 1);
    assert_eq!(ctx.value_at(-1), Ok(Value::string("keep")));
}

#[test]
fn remote_call_from_another_thread() {
    let source = Session::new(Context::new());
    let dest = Session::new(Context::new());
    set_base(&dest, Value::Integer(1));

    let handle = {
        let source = source.clone();
        let dest = dest.clone();
        thread::spawn(move || {
            {
                let mut ctx = source.lock();
                push_add_base(&mut ctx);
                ctx.push_integer(41);
            }
            source.call_remote(1, &dest)
        })
    };
    assert_eq!(handle.join().unwrap(), Ok(()));
    assert_eq!(source.lock().value_at(-1), Ok(Value::Integer(42)));
    assert_idle(&source);
    assert_idle(&dest);
}

#[test]
fn opposite_calls_do_not_deadlock() {
    let a = Session::new(Context::new());
    let b = Session::new(Context::new());
    set_base(&a, Value::Integer(1));
    set_base(&b, Value::Integer(2));

    let spawn = |from: Session, to: Session| {
        thread::spawn(move || {
            for i in 0..50 {
                {
                    let mut ctx = from.lock();
                    ctx.set_top(0).unwrap();
                    push_add_base(&mut ctx);
                    ctx.push_integer(i);
                }
                from.call_remote(1, &to).unwrap();
            }
        })
    };
    let first = spawn(a.clone(), b.clone());
    let second = spawn(b.clone(), a.clone());
    first.join().unwrap();
    second.join().unwrap();

    assert_eq!(a.lock().value_at(-1), Ok(Value::Integer(51)));
    assert_eq!(b.lock().value_at(-1), Ok(Value::Integer(50)));
}

#[test]
fn fan_out_pushes_one_result_per_worker() {
    let source = Session::new(Context::new());
    let workers: Vec<Session> = (0..4)
        .map(|i| {
            let worker = Session::new(Context::new());
            set_base(&worker, Value::Integer(i * 100));
            worker
        })
        .collect();
    {
        let mut ctx = source.lock();
        push_add_base(&mut ctx);
        ctx.push_integer(5);
    }

    let outcomes = source.call_fan_out(1, &workers).unwrap();
    assert!(outcomes.iter().all(Result::is_ok));

    let ctx = source.lock();
    assert_eq!(ctx.get_top(), 4);
    let results: Vec<_> = (1..=4).map(|i| ctx.to_integer(i)).collect();
    assert_eq!(results, vec![Some(5), Some(105), Some(205), Some(305)]);
    drop(ctx);
    for worker in &workers {
        assert_eq!(worker.lock().get_top(), 0);
        assert_idle(worker);
    }
}

#[test]
fn fan_out_reports_failing_workers() {
    let source = Session::new(Context::new());
    let good = Session::new(Context::new());
    let bad = Session::new(Context::new());
    set_base(&good, Value::Integer(1));
    set_base(&bad, Value::string("not a number"));
    {
        let mut ctx = source.lock();
        push_add_base(&mut ctx);
        ctx.push_integer(1);
    }

    let outcomes = source
        .call_fan_out(1, &[good.clone(), bad.clone()])
        .unwrap();
    assert_eq!(outcomes[0], Ok(()));
    assert!(matches!(outcomes[1], Err(SessionError::Runtime(_))));

    let ctx = source.lock();
    assert_eq!(ctx.value_at(1), Ok(Value::Integer(2)));
    assert_eq!(ctx.value_at(2), Ok(Value::Nil));
}

#[test]
fn fan_out_rejects_repeated_sessions() {
    let source = Session::new(Context::new());
    let worker = Session::new(Context::new());
    assert_eq!(
        source.call_fan_out(0, &[worker.clone(), worker.clone()]),
        Err(SessionError::SameSession)
    );
    assert_eq!(
        source.call_fan_out(0, &[source.clone()]),
        Err(SessionError::SameSession)
    );
}

#[test]
fn sessions_from_config() {
    let config = FerryConfig::from_json_str(r#"{ "context": { "max_call_depth": 8 } }"#).unwrap();
    let session = Session::from_config(&config, HostBindings::empty());
    assert_eq!(session.lock().config().max_call_depth, 8);
    assert_ne!(session.id(), Session::new(Context::new()).id());
}
