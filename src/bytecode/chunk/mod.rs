//! Binary chunk writer and loader.
//!
//! A chunk is the runtime's own serialized form of a function prototype. The
//! layout is little-endian:
//!
//! ```text
//! magic      4 bytes  ESC 'F' 'r' 'y'
//! version    u16
//! flags      u8       bit 0: stripped
//! function   num_params u8, num_locals u8,
//!            instructions (u32 len + bytes),
//!            constants (u32 count + tagged values),
//!            upvalues (u32 count + kind u8, index u8, optional name),
//!            nested prototypes (u32 count + function...),
//!            debug info (u8 flag + name, source, line table)
//! ```
//!
//! Chunks never leave the process; the layout may change with
//! [`FORMAT_VERSION`].

use std::sync::Arc;

use serde::Serialize;

use crate::bytecode::{
    op_code::{OpCode, instruction_len, read_u8, read_u16},
    prototype::{Constant, DebugInfo, Prototype, UpvalueDesc, UpvalueSource},
};

mod chunk_cache;
mod error;
mod serialization;

pub use chunk_cache::{ChunkCache, hash_bytes, hash_cache_key};
pub use error::{DumpError, LoadError};

use serialization::{ChunkReader, ChunkWriter};

pub const MAGIC: &[u8; 4] = b"\x1bFry";
pub const FORMAT_VERSION: u16 = 1;

const FLAG_STRIPPED: u8 = 0x01;
const MAX_NESTING: usize = 200;

const CONST_NIL: u8 = 0;
const CONST_FALSE: u8 = 1;
const CONST_TRUE: u8 = 2;
const CONST_INTEGER: u8 = 3;
const CONST_FLOAT: u8 = 4;
const CONST_STRING: u8 = 5;

const UPVALUE_LOCAL: u8 = 0;
const UPVALUE_ENCLOSING: u8 = 1;

/// Writes `proto` as a binary chunk.
///
/// With `strip` set, function names, sources, line tables, and upvalue names
/// are left out. `limit` caps the chunk size in bytes.
pub fn dump(proto: &Prototype, strip: bool, limit: usize) -> Result<Vec<u8>, DumpError> {
    let mut writer = ChunkWriter::new(limit);
    writer.write_bytes(MAGIC)?;
    writer.write_u16(FORMAT_VERSION)?;
    writer.write_u8(if strip { FLAG_STRIPPED } else { 0 })?;
    write_function(&mut writer, proto, strip)?;
    Ok(writer.into_bytes())
}

fn write_function(writer: &mut ChunkWriter, proto: &Prototype, strip: bool) -> Result<(), DumpError> {
    writer.write_u8(proto.num_params)?;
    writer.write_u8(proto.num_locals)?;

    writer.write_len(proto.instructions.len())?;
    writer.write_bytes(&proto.instructions)?;

    writer.write_len(proto.constants.len())?;
    for constant in &proto.constants {
        write_constant(writer, constant)?;
    }

    writer.write_len(proto.upvalues.len())?;
    for desc in &proto.upvalues {
        let (kind, index) = match desc.source {
            UpvalueSource::Local(index) => (UPVALUE_LOCAL, index),
            UpvalueSource::Enclosing(index) => (UPVALUE_ENCLOSING, index),
        };
        writer.write_u8(kind)?;
        writer.write_u8(index)?;
        let name = if strip { None } else { desc.name.as_deref() };
        writer.write_opt_string(name)?;
    }

    writer.write_len(proto.protos.len())?;
    for child in &proto.protos {
        write_function(writer, child, strip)?;
    }

    match proto.debug_info.as_ref().filter(|_| !strip) {
        None => writer.write_u8(0),
        Some(info) => {
            writer.write_u8(1)?;
            writer.write_opt_string(info.name.as_deref())?;
            writer.write_opt_string(info.source.as_deref())?;
            writer.write_len(info.lines.len())?;
            for (offset, line) in &info.lines {
                writer.write_u32(*offset)?;
                writer.write_u32(*line)?;
            }
            Ok(())
        }
    }
}

fn write_constant(writer: &mut ChunkWriter, constant: &Constant) -> Result<(), DumpError> {
    match constant {
        Constant::Nil => writer.write_u8(CONST_NIL),
        Constant::Boolean(false) => writer.write_u8(CONST_FALSE),
        Constant::Boolean(true) => writer.write_u8(CONST_TRUE),
        Constant::Integer(value) => {
            writer.write_u8(CONST_INTEGER)?;
            writer.write_i64(*value)
        }
        Constant::Float(value) => {
            writer.write_u8(CONST_FLOAT)?;
            writer.write_f64(*value)
        }
        Constant::String(value) => {
            writer.write_u8(CONST_STRING)?;
            writer.write_string(value)
        }
    }
}

/// Loads a binary chunk. Stripped chunks take `chunk_name` as their source.
pub fn undump(bytes: &[u8], chunk_name: &str) -> Result<Prototype, LoadError> {
    let mut reader = ChunkReader::new(bytes);
    let header = read_header(&mut reader)?;
    let proto = read_function(&mut reader, 0)?;
    if reader.remaining() > 0 {
        return Err(LoadError::TrailingBytes(reader.remaining()));
    }
    verify(&proto)?;
    log::trace!(
        "loaded chunk {} ({} bytes, stripped: {})",
        chunk_name,
        bytes.len(),
        header.stripped
    );
    Ok(proto.with_source(chunk_name))
}

struct Header {
    version: u16,
    stripped: bool,
}

fn read_header(reader: &mut ChunkReader<'_>) -> Result<Header, LoadError> {
    let magic = reader.read_exact(MAGIC.len()).map_err(|_| LoadError::NotBinary)?;
    if magic != MAGIC {
        return Err(LoadError::NotBinary);
    }
    let version = reader.read_u16()?;
    if version != FORMAT_VERSION {
        return Err(LoadError::UnsupportedVersion(version));
    }
    let flags = reader.read_u8()?;
    Ok(Header {
        version,
        stripped: flags & FLAG_STRIPPED != 0,
    })
}

fn read_function(reader: &mut ChunkReader<'_>, depth: usize) -> Result<Prototype, LoadError> {
    if depth > MAX_NESTING {
        return Err(LoadError::TooDeep);
    }

    let num_params = reader.read_u8()?;
    let num_locals = reader.read_u8()?;

    let instructions_len = reader.read_count(1)?;
    let instructions = reader.read_exact(instructions_len)?.to_vec();

    let constants_len = reader.read_count(1)?;
    let mut constants = Vec::with_capacity(constants_len);
    for _ in 0..constants_len {
        constants.push(read_constant(reader)?);
    }

    let upvalues_len = reader.read_count(3)?;
    let mut upvalues = Vec::with_capacity(upvalues_len);
    for _ in 0..upvalues_len {
        let kind = reader.read_u8()?;
        let index = reader.read_u8()?;
        let source = match kind {
            UPVALUE_LOCAL => UpvalueSource::Local(index),
            UPVALUE_ENCLOSING => UpvalueSource::Enclosing(index),
            other => return Err(LoadError::InvalidUpvalueKind(other)),
        };
        let name = reader.read_opt_string()?;
        upvalues.push(UpvalueDesc { name, source });
    }

    let protos_len = reader.read_count(1)?;
    let mut protos = Vec::with_capacity(protos_len);
    for _ in 0..protos_len {
        protos.push(Arc::new(read_function(reader, depth + 1)?));
    }

    let debug_info = match reader.read_u8()? {
        0 => None,
        _ => {
            let name = reader.read_opt_string()?;
            let source = reader.read_opt_string()?;
            let lines_len = reader.read_count(8)?;
            let mut lines = Vec::with_capacity(lines_len);
            for _ in 0..lines_len {
                lines.push((reader.read_u32()?, reader.read_u32()?));
            }
            Some(DebugInfo {
                name,
                source,
                lines,
            })
        }
    };

    Ok(Prototype {
        instructions,
        constants,
        upvalues,
        protos,
        num_params,
        num_locals,
        debug_info,
    })
}

fn read_constant(reader: &mut ChunkReader<'_>) -> Result<Constant, LoadError> {
    match reader.read_u8()? {
        CONST_NIL => Ok(Constant::Nil),
        CONST_FALSE => Ok(Constant::Boolean(false)),
        CONST_TRUE => Ok(Constant::Boolean(true)),
        CONST_INTEGER => Ok(Constant::Integer(reader.read_i64()?)),
        CONST_FLOAT => Ok(Constant::Float(reader.read_f64()?)),
        CONST_STRING => Ok(Constant::String(reader.read_string()?.into())),
        other => Err(LoadError::InvalidConstantTag(other)),
    }
}

/// Checks that every instruction decodes and every operand names something
/// that exists, so the VM never reads past a prototype's tables.
pub fn verify(proto: &Prototype) -> Result<(), LoadError> {
    verify_function(proto, 0)
}

fn verify_function(proto: &Prototype, depth: usize) -> Result<(), LoadError> {
    if depth > MAX_NESTING {
        return Err(LoadError::TooDeep);
    }
    let code = &proto.instructions;
    let mut ip = 0;
    while ip < code.len() {
        let op = OpCode::try_from(code[ip])
            .map_err(|byte| LoadError::InvalidOpcode { offset: ip, byte })?;
        if ip + instruction_len(op) > code.len() {
            return Err(LoadError::Truncated);
        }
        let out_of_range = LoadError::OperandOutOfRange { offset: ip };
        let in_range = match op {
            OpCode::OpConstant => (read_u16(code, ip + 1) as usize) < proto.constants.len(),
            OpCode::OpGetLocal | OpCode::OpSetLocal => read_u8(code, ip + 1) < proto.num_locals,
            OpCode::OpGetUpvalue | OpCode::OpSetUpvalue => {
                (read_u8(code, ip + 1) as usize) < proto.upvalues.len()
            }
            OpCode::OpGetTabUp | OpCode::OpSetTabUp => {
                (read_u8(code, ip + 1) as usize) < proto.upvalues.len()
                    && (read_u16(code, ip + 2) as usize) < proto.constants.len()
            }
            OpCode::OpJump | OpCode::OpJumpIfFalse => (read_u16(code, ip + 1) as usize) <= code.len(),
            OpCode::OpClosure => (read_u16(code, ip + 1) as usize) < proto.protos.len(),
            _ => true,
        };
        if !in_range {
            return Err(out_of_range);
        }
        ip += instruction_len(op);
    }

    for child in &proto.protos {
        for desc in &child.upvalues {
            let valid = match desc.source {
                UpvalueSource::Local(index) => index < proto.num_locals,
                UpvalueSource::Enclosing(index) => (index as usize) < proto.upvalues.len(),
            };
            if !valid {
                return Err(LoadError::OperandOutOfRange { offset: 0 });
            }
        }
        verify_function(child, depth + 1)?;
    }
    Ok(())
}

/// Header-level summary of a chunk, for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkInfo {
    pub format_version: u16,
    pub stripped: bool,
    pub size: usize,
    pub name: Option<String>,
    pub num_params: u8,
    pub num_locals: u8,
    pub instructions_len: usize,
    pub constants: usize,
    pub upvalues: Vec<Option<String>>,
    pub nested_protos: usize,
}

pub fn inspect(bytes: &[u8]) -> Result<ChunkInfo, LoadError> {
    let mut reader = ChunkReader::new(bytes);
    let header = read_header(&mut reader)?;
    let proto = read_function(&mut reader, 0)?;
    Ok(ChunkInfo {
        format_version: header.version,
        stripped: header.stripped,
        size: bytes.len(),
        name: proto.name().map(str::to_string),
        num_params: proto.num_params,
        num_locals: proto.num_locals,
        instructions_len: proto.instructions.len(),
        constants: proto.constants.len(),
        upvalues: proto.upvalues.iter().map(|desc| desc.name.clone()).collect(),
        nested_protos: proto.protos.len(),
    })
}
