//! The `StackMapTable` attribute (JVMS §4.7.4).
//!
//! Frames are decoded into [`StackMapFrame`] values so their offsets can be shifted when code is
//! prepended to a method, and encoded again using the most compact frame kind that represents
//! them. Offset deltas follow the class file convention: the first frame's delta is its
//! absolute offset, every following delta is `offset - previous_offset - 1`.

use crate::{
    file::{io::push_be, parser::Parser},
    Result,
};

/// A verification type as stored in stack map frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerificationType {
    /// Unusable local, or the second half of a wide value
    Top,
    /// `int` and every sub-int type
    Integer,
    /// `float`
    Float,
    /// `double`, occupies two local slots but one list entry
    Double,
    /// `long`, occupies two local slots but one list entry
    Long,
    /// The `null` reference
    Null,
    /// `this` inside a constructor before the super constructor ran
    UninitializedThis,
    /// An initialized reference; index of the `CONSTANT_Class`
    Object(u16),
    /// Result of a `new` instruction at the given code offset, not yet initialized
    Uninitialized(u16),
}

impl VerificationType {
    fn read(parser: &mut Parser<'_>) -> Result<Self> {
        let tag = parser.read_be::<u8>()?;
        Ok(match tag {
            0 => VerificationType::Top,
            1 => VerificationType::Integer,
            2 => VerificationType::Float,
            3 => VerificationType::Double,
            4 => VerificationType::Long,
            5 => VerificationType::Null,
            6 => VerificationType::UninitializedThis,
            7 => VerificationType::Object(parser.read_be::<u16>()?),
            8 => VerificationType::Uninitialized(parser.read_be::<u16>()?),
            _ => return Err(malformed_error!("Unknown verification type tag {}", tag)),
        })
    }

    fn write(self, out: &mut Vec<u8>) {
        match self {
            VerificationType::Top => out.push(0),
            VerificationType::Integer => out.push(1),
            VerificationType::Float => out.push(2),
            VerificationType::Double => out.push(3),
            VerificationType::Long => out.push(4),
            VerificationType::Null => out.push(5),
            VerificationType::UninitializedThis => out.push(6),
            VerificationType::Object(class) => {
                out.push(7);
                push_be(out, class);
            }
            VerificationType::Uninitialized(offset) => {
                out.push(8);
                push_be(out, offset);
            }
        }
    }

    /// Number of local variable slots covered by this entry.
    #[must_use]
    pub fn slots(self) -> u16 {
        match self {
            VerificationType::Long | VerificationType::Double => 2,
            _ => 1,
        }
    }
}

/// One decoded stack map frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackMapFrame {
    /// Same locals as the previous frame, empty stack (`same_frame` / `same_frame_extended`)
    Same {
        /// Offset delta
        offset_delta: u16,
    },
    /// Same locals, exactly one stack item
    /// (`same_locals_1_stack_item_frame` / `..._extended`)
    SameLocals1StackItem {
        /// Offset delta
        offset_delta: u16,
        /// The single stack item
        stack: VerificationType,
    },
    /// The last `count` (1..=3) locals are removed, empty stack
    Chop {
        /// Offset delta
        offset_delta: u16,
        /// Number of removed locals
        count: u8,
    },
    /// 1..=3 locals are appended, empty stack
    Append {
        /// Offset delta
        offset_delta: u16,
        /// Appended locals
        locals: Vec<VerificationType>,
    },
    /// Locals and stack given explicitly
    Full {
        /// Offset delta
        offset_delta: u16,
        /// All locals
        locals: Vec<VerificationType>,
        /// All stack items, bottom first
        stack: Vec<VerificationType>,
    },
}

impl StackMapFrame {
    /// The frame's offset delta.
    #[must_use]
    pub fn offset_delta(&self) -> u16 {
        match self {
            StackMapFrame::Same { offset_delta }
            | StackMapFrame::SameLocals1StackItem { offset_delta, .. }
            | StackMapFrame::Chop { offset_delta, .. }
            | StackMapFrame::Append { offset_delta, .. }
            | StackMapFrame::Full { offset_delta, .. } => *offset_delta,
        }
    }

    /// Replace the frame's offset delta.
    pub fn set_offset_delta(&mut self, delta: u16) {
        match self {
            StackMapFrame::Same { offset_delta }
            | StackMapFrame::SameLocals1StackItem { offset_delta, .. }
            | StackMapFrame::Chop { offset_delta, .. }
            | StackMapFrame::Append { offset_delta, .. }
            | StackMapFrame::Full { offset_delta, .. } => *offset_delta = delta,
        }
    }

    /// Mutable access to every verification type the frame carries.
    pub fn types_mut(&mut self) -> Vec<&mut VerificationType> {
        match self {
            StackMapFrame::Same { .. } | StackMapFrame::Chop { .. } => Vec::new(),
            StackMapFrame::SameLocals1StackItem { stack, .. } => vec![stack],
            StackMapFrame::Append { locals, .. } => locals.iter_mut().collect(),
            StackMapFrame::Full { locals, stack, .. } => {
                locals.iter_mut().chain(stack.iter_mut()).collect()
            }
        }
    }

    fn read(parser: &mut Parser<'_>) -> Result<Self> {
        let frame_type = parser.read_be::<u8>()?;
        Ok(match frame_type {
            0..=63 => StackMapFrame::Same {
                offset_delta: u16::from(frame_type),
            },
            64..=127 => StackMapFrame::SameLocals1StackItem {
                offset_delta: u16::from(frame_type - 64),
                stack: VerificationType::read(parser)?,
            },
            247 => StackMapFrame::SameLocals1StackItem {
                offset_delta: parser.read_be::<u16>()?,
                stack: VerificationType::read(parser)?,
            },
            248..=250 => StackMapFrame::Chop {
                offset_delta: parser.read_be::<u16>()?,
                count: 251 - frame_type,
            },
            251 => StackMapFrame::Same {
                offset_delta: parser.read_be::<u16>()?,
            },
            252..=254 => {
                let offset_delta = parser.read_be::<u16>()?;
                let locals = (0..frame_type - 251)
                    .map(|_| VerificationType::read(parser))
                    .collect::<Result<Vec<_>>>()?;
                StackMapFrame::Append {
                    offset_delta,
                    locals,
                }
            }
            255 => {
                let offset_delta = parser.read_be::<u16>()?;
                let local_count = parser.read_be::<u16>()?;
                let locals = (0..local_count)
                    .map(|_| VerificationType::read(parser))
                    .collect::<Result<Vec<_>>>()?;
                let stack_count = parser.read_be::<u16>()?;
                let stack = (0..stack_count)
                    .map(|_| VerificationType::read(parser))
                    .collect::<Result<Vec<_>>>()?;
                StackMapFrame::Full {
                    offset_delta,
                    locals,
                    stack,
                }
            }
            _ => return Err(malformed_error!("Reserved stack map frame type {}", frame_type)),
        })
    }

    fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            StackMapFrame::Same { offset_delta } => {
                if *offset_delta < 64 {
                    out.push(*offset_delta as u8);
                } else {
                    out.push(251);
                    push_be(out, *offset_delta);
                }
            }
            StackMapFrame::SameLocals1StackItem {
                offset_delta,
                stack,
            } => {
                if *offset_delta < 64 {
                    out.push(64 + *offset_delta as u8);
                } else {
                    out.push(247);
                    push_be(out, *offset_delta);
                }
                stack.write(out);
            }
            StackMapFrame::Chop {
                offset_delta,
                count,
            } => {
                if !(1..=3).contains(count) {
                    return Err(malformed_error!("Chop frame removing {} locals", count));
                }
                out.push(251 - count);
                push_be(out, *offset_delta);
            }
            StackMapFrame::Append {
                offset_delta,
                locals,
            } => {
                if !(1..=3).contains(&locals.len()) {
                    return Err(malformed_error!("Append frame adding {} locals", locals.len()));
                }
                out.push(251 + locals.len() as u8);
                push_be(out, *offset_delta);
                for local in locals {
                    local.write(out);
                }
            }
            StackMapFrame::Full {
                offset_delta,
                locals,
                stack,
            } => {
                out.push(255);
                push_be(out, *offset_delta);
                push_be(out, list_len(locals)?);
                for local in locals {
                    local.write(out);
                }
                push_be(out, list_len(stack)?);
                for item in stack {
                    item.write(out);
                }
            }
        }
        Ok(())
    }
}

fn list_len(types: &[VerificationType]) -> Result<u16> {
    u16::try_from(types.len()).map_err(|_| malformed_error!("Too many verification types"))
}

/// A decoded `StackMapTable` attribute body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackMapTable {
    /// Frames in ascending offset order
    pub frames: Vec<StackMapFrame>,
}

impl StackMapTable {
    /// Decode the attribute body (everything after `attribute_length`).
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for reserved frame types, unknown verification tags
    /// or trailing bytes.
    pub fn parse(info: &[u8]) -> Result<Self> {
        let mut parser = Parser::new(info);
        let count = parser.read_be::<u16>()?;
        let frames = (0..count)
            .map(|_| StackMapFrame::read(&mut parser))
            .collect::<Result<Vec<_>>>()?;
        if parser.has_more_data() {
            return Err(malformed_error!(
                "{} trailing bytes after StackMapTable",
                parser.remaining()
            ));
        }
        Ok(StackMapTable { frames })
    }

    /// Encode the attribute body.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for frames that cannot be represented.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let count = u16::try_from(self.frames.len())
            .map_err(|_| malformed_error!("Too many stack map frames"))?;
        push_be(&mut out, count);
        for frame in &self.frames {
            frame.write(&mut out)?;
        }
        Ok(out)
    }

    /// Absolute code offsets of all frames.
    #[must_use]
    pub fn offsets(&self) -> Vec<u32> {
        let mut offsets = Vec::with_capacity(self.frames.len());
        let mut previous: Option<u32> = None;
        for frame in &self.frames {
            let delta = u32::from(frame.offset_delta());
            let offset = previous.map_or(delta, |prev| prev + delta + 1);
            offsets.push(offset);
            previous = Some(offset);
        }
        offsets
    }

    /// Move every frame `amount` bytes further into the method body.
    ///
    /// Only the first delta is absolute, so only it changes. `Uninitialized` types refer to
    /// absolute offsets of `new` instructions and are shifted too.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if a shifted offset no longer fits in 16 bits.
    pub fn shift(&mut self, amount: u16) -> Result<()> {
        if let Some(first) = self.frames.first_mut() {
            let delta = first
                .offset_delta()
                .checked_add(amount)
                .ok_or_else(|| malformed_error!("Shifted stack map offset overflows"))?;
            first.set_offset_delta(delta);
        }

        for frame in &mut self.frames {
            for ty in frame.types_mut() {
                if let VerificationType::Uninitialized(offset) = ty {
                    *offset = offset
                        .checked_add(amount)
                        .ok_or_else(|| malformed_error!("Shifted `new` offset overflows"))?;
                }
            }
        }
        Ok(())
    }
}
