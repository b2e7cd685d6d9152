use std::sync::Arc;

use crate::bytecode::op_code::Instructions;

/// Name of the upvalue through which a function reaches its global environment.
pub const ENV_UPVALUE: &str = "_ENV";

/// Literal stored in a prototype's constant pool.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(Arc<str>),
}

/// Where a closure finds the cell for one of its upvalues when it is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpvalueSource {
    /// Captures the current value of a local of the enclosing function.
    Local(u8),
    /// Shares a cell of the enclosing closure.
    Enclosing(u8),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpvalueDesc {
    /// `None` once the prototype has been stripped.
    pub name: Option<String>,
    pub source: UpvalueSource,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DebugInfo {
    pub name: Option<String>,
    pub source: Option<String>,
    /// `(instruction offset, line)` pairs sorted by offset.
    pub lines: Vec<(u32, u32)>,
}

impl DebugInfo {
    pub fn line_at(&self, ip: usize) -> Option<u32> {
        let ip = ip as u32;
        match self.lines.binary_search_by_key(&ip, |(offset, _)| *offset) {
            Ok(index) => Some(self.lines[index].1),
            Err(index) => index.checked_sub(1).map(|prev| self.lines[prev].1),
        }
    }
}

/// Immutable compiled function body shared by every closure created from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Prototype {
    pub instructions: Instructions,
    pub constants: Vec<Constant>,
    pub upvalues: Vec<UpvalueDesc>,
    pub protos: Vec<Arc<Prototype>>,
    pub num_params: u8,
    pub num_locals: u8,
    pub debug_info: Option<DebugInfo>,
}

impl Prototype {
    pub fn name(&self) -> Option<&str> {
        self.debug_info.as_ref().and_then(|info| info.name.as_deref())
    }

    pub fn source(&self) -> Option<&str> {
        self.debug_info
            .as_ref()
            .and_then(|info| info.source.as_deref())
    }

    pub fn upvalue_name(&self, index: usize) -> Option<&str> {
        self.upvalues
            .get(index)
            .and_then(|desc| desc.name.as_deref())
    }

    /// Returns a copy without names, sources, or line information.
    pub fn stripped(&self) -> Prototype {
        Prototype {
            instructions: self.instructions.clone(),
            constants: self.constants.clone(),
            upvalues: self
                .upvalues
                .iter()
                .map(|desc| UpvalueDesc {
                    name: None,
                    source: desc.source,
                })
                .collect(),
            protos: self
                .protos
                .iter()
                .map(|proto| Arc::new(proto.stripped()))
                .collect(),
            num_params: self.num_params,
            num_locals: self.num_locals,
            debug_info: None,
        }
    }

    /// Sets the source of this prototype and every nested one that lacks one.
    pub(crate) fn with_source(mut self, source: &str) -> Prototype {
        let info = self.debug_info.get_or_insert_with(DebugInfo::default);
        if info.source.is_none() {
            info.source = Some(source.to_string());
        }
        self.protos = self
            .protos
            .into_iter()
            .map(|proto| Arc::new(Arc::unwrap_or_clone(proto).with_source(source)))
            .collect();
        self
    }
}
