//! JVM bytecode decoding.
//!
//! Turns a method body into a linear sequence of [`Instruction`]s with resolved branch targets.
//! The rewrite engine decodes bodies for two reasons: to verify that the code it generated is
//! well formed, and to check that a method it is about to relocate uses only instructions whose
//! offsets it knows how to shift.
//!
//! # Key Components
//!
//! - [`decode_instruction`] - Decode the instruction at the parser's position
//! - [`decode_stream`] - Decode a complete method body
//!
//! # Examples
//!
//! ```rust
//! use bundleweave::{assembly::{decode_stream, FlowType}, Parser};
//!
//! // aload_1; ifnull +5; aload_1; areturn; aconst_null; areturn
//! let code = [0x2B, 0xC6, 0x00, 0x05, 0x2B, 0xB0, 0x01, 0xB0];
//! let mut parser = Parser::new(&code);
//! let instructions = decode_stream(&mut parser)?;
//!
//! assert_eq!(instructions.len(), 6);
//! assert_eq!(instructions[1].flow_type, FlowType::ConditionalBranch);
//! assert_eq!(instructions[1].branch_targets, vec![6]);
//! # Ok::<(), bundleweave::Error>(())
//! ```

use crate::{
    assembly::{opcodes, Instruction, Operand, OperandType, INSTRUCTIONS},
    file::parser::Parser,
    Error, Result,
};

/// Decodes every instruction of a method body.
///
/// The parser must cover exactly the method body, starting at offset `0`: switch padding is
/// computed from the parser position.
///
/// # Errors
///
/// Returns [`crate::Error::InvalidOpcode`] for undefined opcodes, [`crate::Error::Malformed`]
/// for illegal `wide` forms, inverted switch ranges or branch targets outside the body, and
/// [`crate::Error::OutOfBounds`] for truncated instructions.
pub fn decode_stream(parser: &mut Parser) -> Result<Vec<Instruction>> {
    let mut instructions = Vec::new();

    while parser.has_more_data() {
        instructions.push(decode_instruction(parser)?);
    }

    let length = parser.len();
    for instruction in &instructions {
        if let Some(target) = instruction
            .branch_targets
            .iter()
            .find(|target| **target as usize >= length)
        {
            return Err(malformed_error!(
                "Branch at {} targets {} beyond the method body of {} bytes",
                instruction.offset,
                target,
                length
            ));
        }
    }

    Ok(instructions)
}

/// Decodes a single instruction from the current parser position.
///
/// # Errors
///
/// See [`decode_stream`].
pub fn decode_instruction(parser: &mut Parser) -> Result<Instruction> {
    let start = parser.pos();
    let offset = u32::try_from(start).map_err(|_| malformed_error!("Offset exceeds u32"))?;

    let mut opcode = parser.read_be::<u8>()?;
    let wide = opcode == opcodes::WIDE;
    if wide {
        opcode = parser.read_be::<u8>()?;
        if !is_widenable(opcode) {
            return Err(malformed_error!(
                "Opcode {:#04x} cannot follow wide at {}",
                opcode,
                start
            ));
        }
    }

    let metadata = &INSTRUCTIONS[usize::from(opcode)];
    if metadata.is_undefined() {
        return Err(Error::InvalidOpcode {
            opcode,
            offset: start,
        });
    }

    let operand = match metadata.op_type {
        OperandType::None => Operand::None,
        OperandType::UInt8 => Operand::Immediate(i32::from(parser.read_be::<u8>()?)),
        OperandType::Int8 => Operand::Immediate(i32::from(parser.read_be::<i8>()?)),
        OperandType::Int16 => Operand::Immediate(i32::from(parser.read_be::<i16>()?)),
        OperandType::ConstantU8 => Operand::Constant(u16::from(parser.read_be::<u8>()?)),
        OperandType::Constant => Operand::Constant(parser.read_be::<u16>()?),
        OperandType::Local => {
            if wide {
                Operand::Local(parser.read_be::<u16>()?)
            } else {
                Operand::Local(u16::from(parser.read_be::<u8>()?))
            }
        }
        OperandType::Iinc => {
            if wide {
                Operand::Iinc {
                    index: parser.read_be::<u16>()?,
                    delta: parser.read_be::<i16>()?,
                }
            } else {
                Operand::Iinc {
                    index: u16::from(parser.read_be::<u8>()?),
                    delta: i16::from(parser.read_be::<i8>()?),
                }
            }
        }
        OperandType::Branch16 => Operand::Branch(i32::from(parser.read_be::<i16>()?)),
        OperandType::Branch32 => Operand::Branch(parser.read_be::<i32>()?),
        OperandType::Interface => {
            let index = parser.read_be::<u16>()?;
            let count = parser.read_be::<u8>()?;
            parser.advance_by(1)?;
            Operand::Interface { index, count }
        }
        OperandType::Dynamic => {
            let index = parser.read_be::<u16>()?;
            parser.advance_by(2)?;
            Operand::Constant(index)
        }
        OperandType::MultiArray => Operand::MultiArray {
            index: parser.read_be::<u16>()?,
            dimensions: parser.read_be::<u8>()?,
        },
        OperandType::TableSwitch => {
            parser.align(4)?;
            let default = parser.read_be::<i32>()?;
            let low = parser.read_be::<i32>()?;
            let high = parser.read_be::<i32>()?;
            if high < low {
                return Err(malformed_error!(
                    "tableswitch at {} has high {} below low {}",
                    start,
                    high,
                    low
                ));
            }
            let count = (i64::from(high) - i64::from(low) + 1) as usize;
            if count > parser.remaining() / 4 {
                return Err(out_of_bounds_error!());
            }
            let offsets = (0..count)
                .map(|_| parser.read_be::<i32>())
                .collect::<Result<Vec<_>>>()?;
            Operand::TableSwitch {
                default,
                low,
                high,
                offsets,
            }
        }
        OperandType::LookupSwitch => {
            parser.align(4)?;
            let default = parser.read_be::<i32>()?;
            let count = parser.read_be::<i32>()?;
            let count = usize::try_from(count)
                .map_err(|_| malformed_error!("lookupswitch at {} has negative count", start))?;
            if count > parser.remaining() / 8 {
                return Err(out_of_bounds_error!());
            }
            let pairs = (0..count)
                .map(|_| Ok((parser.read_be::<i32>()?, parser.read_be::<i32>()?)))
                .collect::<Result<Vec<_>>>()?;
            Operand::LookupSwitch { default, pairs }
        }
        OperandType::Wide => return Err(malformed_error!("Nested wide at {}", start)),
    };

    let size = u32::try_from(parser.pos() - start)
        .map_err(|_| malformed_error!("Instruction size exceeds u32"))?;

    let relative_targets: Vec<i32> = match &operand {
        Operand::Branch(relative) => vec![*relative],
        Operand::TableSwitch {
            default, offsets, ..
        } => std::iter::once(*default).chain(offsets.iter().copied()).collect(),
        Operand::LookupSwitch { default, pairs } => std::iter::once(*default)
            .chain(pairs.iter().map(|(_, target)| *target))
            .collect(),
        _ => Vec::new(),
    };
    let branch_targets = relative_targets
        .into_iter()
        .map(|relative| {
            u32::try_from(i64::from(offset) + i64::from(relative))
                .map_err(|_| malformed_error!("Branch at {} targets a negative offset", start))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Instruction {
        offset,
        size,
        opcode,
        mnemonic: metadata.mnemonic,
        flow_type: metadata.flow,
        stack: metadata.stack,
        wide,
        operand,
        branch_targets,
    })
}

fn is_widenable(opcode: u8) -> bool {
    matches!(
        opcode,
        opcodes::ILOAD..=opcodes::ALOAD
            | opcodes::ISTORE..=opcodes::ASTORE
            | opcodes::RET
            | opcodes::IINC
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::StackEffect;

    #[test]
    fn decode_simple_sequence() -> Result<()> {
        // aload_0, getfield #7, ifeq +4, return, return
        let code = [0x2A, 0xB4, 0x00, 0x07, 0x99, 0x00, 0x04, 0xB1, 0xB1];
        let mut parser = Parser::new(&code);
        let instructions = decode_stream(&mut parser)?;

        assert_eq!(instructions.len(), 5);
        assert_eq!(instructions[1].mnemonic, "getfield");
        assert_eq!(instructions[1].operand, Operand::Constant(7));
        assert_eq!(instructions[1].stack, StackEffect::Variable);
        assert_eq!(instructions[2].branch_targets, vec![8]);
        assert!(instructions[3].is_terminal());
        Ok(())
    }

    #[test]
    fn decode_tableswitch_with_padding() -> Result<()> {
        // nop, iload_0, tableswitch (1 pad byte) default=+22 low=0 high=1 [+22, +22], return
        let mut code = vec![0x00, 0x1A, 0xAA, 0x00];
        for value in [22_i32, 0, 1, 22, 22] {
            code.extend_from_slice(&value.to_be_bytes());
        }
        code.push(0xB1);

        let mut parser = Parser::new(&code);
        let instructions = decode_stream(&mut parser)?;

        let switch = &instructions[2];
        assert_eq!(switch.mnemonic, "tableswitch");
        assert_eq!(switch.size, 22);
        assert_eq!(switch.branch_targets, vec![24, 24, 24]);
        assert_eq!(instructions[3].offset, 24);
        Ok(())
    }

    #[test]
    fn decode_lookupswitch() -> Result<()> {
        // iload_0, lookupswitch (2 pad bytes) default=+19 npairs=1 (5 -> +19), return
        let mut code = vec![0x1A, 0xAB, 0x00, 0x00];
        for value in [19_i32, 1, 5, 19] {
            code.extend_from_slice(&value.to_be_bytes());
        }
        code.push(0xB1);

        let mut parser = Parser::new(&code);
        let instructions = decode_stream(&mut parser)?;

        assert_eq!(instructions.len(), 3);
        assert_eq!(
            instructions[1].operand,
            Operand::LookupSwitch {
                default: 19,
                pairs: vec![(5, 19)]
            }
        );
        assert_eq!(instructions[1].branch_targets, vec![20, 20]);
        Ok(())
    }

    #[test]
    fn decode_wide_forms() -> Result<()> {
        // wide aload 300, wide iinc 300 -2, return
        let code = [0xC4, 0x19, 0x01, 0x2C, 0xC4, 0x84, 0x01, 0x2C, 0xFF, 0xFE, 0xB1];
        let mut parser = Parser::new(&code);
        let instructions = decode_stream(&mut parser)?;

        assert!(instructions[0].wide);
        assert_eq!(instructions[0].operand, Operand::Local(300));
        assert_eq!(instructions[0].size, 4);
        assert_eq!(
            instructions[1].operand,
            Operand::Iinc {
                index: 300,
                delta: -2
            }
        );
        Ok(())
    }

    #[test]
    fn decode_rejects_invalid_code() {
        let mut parser = Parser::new(&[0xCA]);
        assert!(matches!(
            decode_stream(&mut parser),
            Err(Error::InvalidOpcode { opcode: 0xCA, .. })
        ));

        let mut parser = Parser::new(&[0xC4, 0xB1]);
        assert!(decode_stream(&mut parser).is_err());

        let mut parser = Parser::new(&[0xA7, 0x00, 0x10]);
        assert!(decode_stream(&mut parser).is_err());

        let mut parser = Parser::new(&[0xA7, 0xFF, 0xF0]);
        assert!(decode_stream(&mut parser).is_err());

        let mut parser = Parser::new(&[0x11, 0x00]);
        assert!(decode_stream(&mut parser).is_err());
    }
}
