pub mod builder;
pub mod chunk;
pub mod op_code;
pub mod prototype;
