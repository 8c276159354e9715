//! Stack map frame construction.
//!
//! The encoder records one explicit [`FrameState`] per branch target. This module derives the
//! implicit initial frame of a method from its descriptor and turns the explicit frames into the
//! most compact `StackMapTable` encoding: each frame is described relative to the one before
//! it, starting from the initial frame.

use crate::{
    assembly::encoder::FrameState,
    classfile::{
        constpool::ConstantPool,
        descriptor::{FieldType, MethodDescriptor},
        stackmap::{StackMapFrame, StackMapTable, VerificationType},
    },
    Result,
};

/// Verification type of a value of the given field type.
///
/// # Errors
/// Returns [`crate::Error::ConstantPoolOverflow`] if a class entry cannot be added.
pub fn verification_type(pool: &mut ConstantPool, field: &FieldType) -> Result<VerificationType> {
    Ok(match field {
        FieldType::Boolean
        | FieldType::Byte
        | FieldType::Char
        | FieldType::Short
        | FieldType::Int => VerificationType::Integer,
        FieldType::Float => VerificationType::Float,
        FieldType::Long => VerificationType::Long,
        FieldType::Double => VerificationType::Double,
        FieldType::Object(name) | FieldType::Array(name) => {
            VerificationType::Object(pool.class(name)?)
        }
    })
}

/// Locals of the implicit frame at offset 0: `this` for instance methods, then the parameters.
///
/// # Errors
/// Returns [`crate::Error::ConstantPoolOverflow`] if a class entry cannot be added.
pub fn initial_locals(
    pool: &mut ConstantPool,
    owner: &str,
    is_static: bool,
    descriptor: &MethodDescriptor,
) -> Result<Vec<VerificationType>> {
    let mut locals = Vec::with_capacity(descriptor.params.len() + 1);
    if !is_static {
        locals.push(VerificationType::Object(pool.class(owner)?));
    }
    for param in &descriptor.params {
        locals.push(verification_type(pool, param)?);
    }
    Ok(locals)
}

/// Compress explicit frames into a `StackMapTable`.
///
/// `frames` must be sorted by offset without duplicates, as returned by
/// [`crate::assembly::CodeEncoder::finalize`].
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if the offsets are not strictly increasing or do not
/// fit 16 bits.
pub fn compress(
    initial_locals: &[VerificationType],
    frames: &[(u32, FrameState)],
) -> Result<StackMapTable> {
    let mut table = StackMapTable::default();
    let mut previous_locals = trim_tops(initial_locals);
    let mut previous_offset: Option<u32> = None;

    for (offset, frame) in frames {
        let delta = match previous_offset {
            None => *offset,
            Some(previous) if *offset > previous => offset - previous - 1,
            Some(previous) => {
                return Err(malformed_error!(
                    "Frame offsets not increasing: {} after {}",
                    offset,
                    previous
                ))
            }
        };
        let offset_delta = u16::try_from(delta)
            .map_err(|_| malformed_error!("Frame offset delta {} exceeds u16", delta))?;

        let locals = trim_tops(&frame.locals);
        table
            .frames
            .push(encode_frame(offset_delta, &previous_locals, &locals, &frame.stack));

        previous_locals = locals;
        previous_offset = Some(*offset);
    }

    Ok(table)
}

fn encode_frame(
    offset_delta: u16,
    previous: &[VerificationType],
    locals: &[VerificationType],
    stack: &[VerificationType],
) -> StackMapFrame {
    if locals == previous {
        match stack {
            [] => return StackMapFrame::Same { offset_delta },
            [item] => {
                return StackMapFrame::SameLocals1StackItem {
                    offset_delta,
                    stack: *item,
                }
            }
            _ => {}
        }
    }

    if stack.is_empty() {
        if locals.len() < previous.len()
            && previous.len() - locals.len() <= 3
            && previous.starts_with(locals)
        {
            return StackMapFrame::Chop {
                offset_delta,
                count: (previous.len() - locals.len()) as u8,
            };
        }
        if locals.len() > previous.len()
            && locals.len() - previous.len() <= 3
            && locals.starts_with(previous)
        {
            return StackMapFrame::Append {
                offset_delta,
                locals: locals[previous.len()..].to_vec(),
            };
        }
    }

    StackMapFrame::Full {
        offset_delta,
        locals: locals.to_vec(),
        stack: stack.to_vec(),
    }
}

/// Trailing `Top` entries carry no information in a frame and are dropped.
fn trim_tops(locals: &[VerificationType]) -> Vec<VerificationType> {
    let end = locals
        .iter()
        .rposition(|ty| *ty != VerificationType::Top)
        .map_or(0, |index| index + 1);
    locals[..end].to_vec()
}
