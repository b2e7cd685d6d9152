use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    OpConstant = 0,
    OpNil = 1,
    OpTrue = 2,
    OpFalse = 3,
    OpPop = 4,
    OpGetLocal = 5,
    OpSetLocal = 6,
    OpGetUpvalue = 7,
    OpSetUpvalue = 8,
    OpGetTabUp = 9,
    OpSetTabUp = 10,
    OpNewTable = 11,
    OpGetIndex = 12,
    OpSetIndex = 13,
    OpAdd = 14,
    OpSub = 15,
    OpMul = 16,
    OpDiv = 17,
    OpMinus = 18,
    OpNot = 19,
    OpEqual = 20,
    OpLessThan = 21,
    OpConcat = 22,
    OpLen = 23,
    OpJump = 24,
    OpJumpIfFalse = 25,
    OpCall = 26,
    OpReturn = 27,
    OpClosure = 28,
}

impl TryFrom<u8> for OpCode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        let op = match byte {
            0 => OpCode::OpConstant,
            1 => OpCode::OpNil,
            2 => OpCode::OpTrue,
            3 => OpCode::OpFalse,
            4 => OpCode::OpPop,
            5 => OpCode::OpGetLocal,
            6 => OpCode::OpSetLocal,
            7 => OpCode::OpGetUpvalue,
            8 => OpCode::OpSetUpvalue,
            9 => OpCode::OpGetTabUp,
            10 => OpCode::OpSetTabUp,
            11 => OpCode::OpNewTable,
            12 => OpCode::OpGetIndex,
            13 => OpCode::OpSetIndex,
            14 => OpCode::OpAdd,
            15 => OpCode::OpSub,
            16 => OpCode::OpMul,
            17 => OpCode::OpDiv,
            18 => OpCode::OpMinus,
            19 => OpCode::OpNot,
            20 => OpCode::OpEqual,
            21 => OpCode::OpLessThan,
            22 => OpCode::OpConcat,
            23 => OpCode::OpLen,
            24 => OpCode::OpJump,
            25 => OpCode::OpJumpIfFalse,
            26 => OpCode::OpCall,
            27 => OpCode::OpReturn,
            28 => OpCode::OpClosure,
            other => return Err(other),
        };
        Ok(op)
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Operand byte widths for `op`, in encoding order.
///
/// `OpGetTabUp`/`OpSetTabUp` take an upvalue slot followed by a constant index
/// naming the field.
pub fn operand_widths(op: OpCode) -> &'static [usize] {
    match op {
        OpCode::OpConstant | OpCode::OpJump | OpCode::OpJumpIfFalse | OpCode::OpClosure => &[2],
        OpCode::OpGetLocal
        | OpCode::OpSetLocal
        | OpCode::OpGetUpvalue
        | OpCode::OpSetUpvalue
        | OpCode::OpCall => &[1],
        OpCode::OpGetTabUp | OpCode::OpSetTabUp => &[1, 2],
        _ => &[],
    }
}

/// Total encoded length of `op` including its operands.
pub fn instruction_len(op: OpCode) -> usize {
    1 + operand_widths(op).iter().sum::<usize>()
}

pub type Instructions = Vec<u8>;

pub fn make(op: OpCode, operands: &[usize]) -> Instructions {
    let widths = operand_widths(op);
    let mut instruction = vec![op as u8];

    for (i, operand) in operands.iter().enumerate() {
        let width = widths.get(i).copied().unwrap_or(0);
        match width {
            1 => instruction.push(*operand as u8),
            2 => {
                instruction.push((*operand >> 8) as u8);
                instruction.push(*operand as u8);
            }
            _ => {}
        }
    }

    instruction
}

pub fn read_u16(instructions: &[u8], offset: usize) -> u16 {
    ((instructions[offset] as u16) << 8) | (instructions[offset + 1] as u16)
}

pub fn read_u8(instructions: &[u8], offset: usize) -> u8 {
    instructions[offset]
}

/// Renders one instruction per line as `offset opcode operands...`.
///
/// Stops at the first byte that is not a valid opcode or whose operands run
/// past the end of the stream.
pub fn disassemble(instructions: &[u8]) -> String {
    let mut result = String::new();
    let mut i = 0;

    while i < instructions.len() {
        let Ok(op) = OpCode::try_from(instructions[i]) else {
            result.push_str(&format!("{:04} <invalid {}>\n", i, instructions[i]));
            break;
        };
        if i + instruction_len(op) > instructions.len() {
            result.push_str(&format!("{:04} {} <truncated>\n", i, op));
            break;
        }

        let mut line = format!("{:04} {}", i, op);
        let mut offset = i + 1;
        for &width in operand_widths(op) {
            let operand = match width {
                1 => read_u8(instructions, offset) as usize,
                _ => read_u16(instructions, offset) as usize,
            };
            line.push_str(&format!(" {}", operand));
            offset += width;
        }

        result.push_str(&line);
        result.push('\n');
        i = offset;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_encodes_big_endian_operands() {
        assert_eq!(make(OpCode::OpConstant, &[65534]), vec![0, 255, 254]);
        assert_eq!(make(OpCode::OpGetTabUp, &[1, 2]), vec![9, 1, 0, 2]);
        assert_eq!(make(OpCode::OpReturn, &[]), vec![27]);
    }

    #[test]
    fn opcode_byte_roundtrip() {
        for byte in 0u8..=28 {
            let op = OpCode::try_from(byte).unwrap();
            assert_eq!(op as u8, byte);
        }
        assert_eq!(OpCode::try_from(29), Err(29));
    }

    #[test]
    fn disassemble_lists_operands() {
        let mut code = make(OpCode::OpGetTabUp, &[0, 3]);
        code.extend(make(OpCode::OpCall, &[2]));
        code.extend(make(OpCode::OpReturn, &[]));
        assert_eq!(
            disassemble(&code),
            "0000 OpGetTabUp 0 3\n0004 OpCall 2\n0006 OpReturn\n"
        );
    }

    #[test]
    fn disassemble_reports_truncation() {
        let code = vec![OpCode::OpConstant as u8, 0];
        assert_eq!(disassemble(&code), "0000 OpConstant <truncated>\n");
    }
}
