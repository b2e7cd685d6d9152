use crate::runtime::builtin_function::BuiltinFunction;

mod assert_ops;
mod helpers;
mod host_ops;
mod type_check;

use assert_ops::builtin_assert;
use host_ops::builtin_bind_class;
use type_check::{builtin_rawequal, builtin_rawlen, builtin_tostring, builtin_type};

/// Native functions installed into every context's globals.
pub static BUILTINS: &[BuiltinFunction] = &[
    BuiltinFunction {
        name: "type",
        func: builtin_type,
    },
    BuiltinFunction {
        name: "rawlen",
        func: builtin_rawlen,
    },
    BuiltinFunction {
        name: "rawequal",
        func: builtin_rawequal,
    },
    BuiltinFunction {
        name: "tostring",
        func: builtin_tostring,
    },
    BuiltinFunction {
        name: "assert",
        func: builtin_assert,
    },
    BuiltinFunction {
        name: "bind_class",
        func: builtin_bind_class,
    },
];

pub fn get_builtin(name: &str) -> Option<&'static BuiltinFunction> {
    BUILTINS.iter().find(|builtin| builtin.name == name)
}

#[cfg(test)]
mod type_check_test;
