use crate::{
    bytecode::{
        op_code::{OpCode, operand_widths, read_u8, read_u16},
        prototype::Prototype,
    },
    runtime::context::Context,
};

impl Context {
    pub(super) fn trace_instruction(&self, proto: &Prototype, ip: usize, op: OpCode) {
        log::trace!(
            "{}",
            format_trace_line(proto, ip, op, self.frames.len(), self.stack.len())
        );
    }

    /// One `name:line` entry per active frame, innermost first.
    pub fn traceback(&self) -> Vec<String> {
        self.frames
            .iter()
            .rev()
            .map(|frame| {
                let ip = frame.ip.saturating_sub(1);
                format_location(&frame.proto, ip)
            })
            .collect()
    }
}

pub(super) fn format_location(proto: &Prototype, ip: usize) -> String {
    let name = proto.name().unwrap_or("?");
    let line = proto.debug_info.as_ref().and_then(|info| info.line_at(ip));
    match line {
        Some(line) => format!("{}:{}", name, line),
        None => name.to_string(),
    }
}

pub(super) fn format_trace_line(
    proto: &Prototype,
    ip: usize,
    op: OpCode,
    depth: usize,
    top: usize,
) -> String {
    let mut operands = String::new();
    let mut offset = ip + 1;
    for &width in operand_widths(op) {
        let operand = match width {
            1 => read_u8(&proto.instructions, offset) as usize,
            _ => read_u16(&proto.instructions, offset) as usize,
        };
        operands.push(' ');
        operands.push_str(&operand.to_string());
        offset += width;
    }
    format!(
        "[{}] {:04} {}{} depth={} top={}",
        format_location(proto, ip),
        ip,
        op,
        operands,
        depth,
        top
    )
}
