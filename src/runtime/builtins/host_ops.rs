use crate::runtime::{
    context::Context,
    host::{Proxy, ProxyKind},
    value::Value,
};

use super::helpers::{arg_string, check_arity};

/// `bind_class(name)`: class proxy for a host class registered in the
/// context's bindings.
pub(super) fn builtin_bind_class(ctx: &mut Context, args: Vec<Value>) -> Result<Value, String> {
    check_arity(&args, 1..=1, "bind_class")?;
    let name = arg_string(&args, 0, "bind_class")?;
    match ctx.bindings().class(name) {
        Some(host) => Ok(Value::Proxy(Proxy::new(ProxyKind::Class, host.clone()))),
        None => Err(format!("no host class named '{}'", name)),
    }
}
