//! JVM bytecode encoding with label resolution and stack tracking.
//!
//! [`CodeEncoder`] is the reverse of the decoder and shares the same
//! [`crate::assembly::INSTRUCTIONS`] table. On top of raw emission it keeps the bookkeeping a
//! method body needs to be loadable:
//!
//! - named labels with forward and backward branch fixups
//! - operand stack depth in slots, and the resulting `max_stack`
//! - the highest local variable slot touched, and the resulting `max_locals`
//! - a consistent stack depth at every label reached from more than one path
//! - an explicit [`FrameState`] per branch target, later compressed into a `StackMapTable`
//!
//! # Examples
//!
//! ```rust
//! use bundleweave::assembly::{CodeEncoder, Operand};
//!
//! let mut encoder = CodeEncoder::new();
//! encoder.emit_instruction("aload", Some(Operand::Local(1)))?;
//! encoder.emit_branch("ifnonnull", "present")?;
//! encoder.emit_instruction("iconst_0", None)?;
//! encoder.emit_instruction("ireturn", None)?;
//! encoder.define_label("present")?;
//! encoder.emit_instruction("iconst_1", None)?;
//! encoder.emit_instruction("ireturn", None)?;
//!
//! let encoded = encoder.finalize()?;
//! assert_eq!(encoded.code, vec![0x19, 0x01, 0xC7, 0x00, 0x05, 0x03, 0xAC, 0x04, 0xAC]);
//! assert_eq!(encoded.max_stack, 1);
//! assert_eq!(encoded.max_locals, 2);
//! # Ok::<(), bundleweave::Error>(())
//! ```

use std::{collections::HashMap, sync::OnceLock};

use crate::{
    assembly::{
        instruction::{FlowType, Operand, OperandType, StackEffect},
        opcodes, INSTRUCTIONS,
    },
    classfile::{code::MAX_CODE_LENGTH, stackmap::VerificationType},
    Error, Result,
};

static MNEMONIC_TO_OPCODE: OnceLock<HashMap<&'static str, u8>> = OnceLock::new();

fn get_mnemonic_lookup() -> &'static HashMap<&'static str, u8> {
    MNEMONIC_TO_OPCODE.get_or_init(|| {
        INSTRUCTIONS
            .iter()
            .zip(0_u8..=u8::MAX)
            .filter(|(instruction, _)| !instruction.is_undefined())
            .map(|(instruction, opcode)| (instruction.mnemonic, opcode))
            .collect()
    })
}

/// Label fixup information for branch instruction resolution.
#[derive(Debug, Clone)]
pub struct LabelFixup {
    /// The target label name to resolve
    pub label: String,
    /// Position in bytecode where the branch offset should be written
    pub fixup_position: usize,
    /// Position of the branch opcode; JVM offsets are relative to it
    pub instruction_position: usize,
    /// Size of the branch offset field (2 or 4 bytes)
    pub offset_size: u8,
}

/// Locals and operand stack at a branch target, as verification types.
///
/// `long` and `double` appear once, as in `StackMapTable` frames.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameState {
    /// Local variables from slot 0
    pub locals: Vec<VerificationType>,
    /// Operand stack, bottom first
    pub stack: Vec<VerificationType>,
}

impl FrameState {
    /// Frame with the given locals and an empty stack.
    #[must_use]
    pub fn locals(locals: Vec<VerificationType>) -> Self {
        FrameState {
            locals,
            stack: Vec::new(),
        }
    }

    fn stack_slots(&self) -> u16 {
        self.stack.iter().map(|ty| ty.slots()).sum()
    }
}

/// Result of [`CodeEncoder::finalize`].
#[derive(Debug, Clone)]
pub struct EncodedCode {
    /// Bytecode with all branch offsets resolved
    pub code: Vec<u8>,
    /// Maximum operand stack depth in slots
    pub max_stack: u16,
    /// Number of local variable slots touched
    pub max_locals: u16,
    /// Final label positions
    pub labels: HashMap<String, u32>,
    /// Frames of all branch targets, ordered by offset
    pub frames: Vec<(u32, FrameState)>,
}

/// Core JVM bytecode encoder.
///
/// Not thread safe; create one encoder per method body.
pub struct CodeEncoder {
    /// Generated bytecode buffer
    bytecode: Vec<u8>,
    /// Defined label positions (label_name -> byte_position)
    labels: HashMap<String, u32>,
    /// Pending branch fixups awaiting label resolution
    fixups: Vec<LabelFixup>,
    /// Current operand stack depth in slots
    current_stack_depth: u16,
    /// Maximum stack depth reached during encoding
    max_stack_depth: u16,
    /// One past the highest local variable slot touched
    max_locals: u16,
    /// Expected stack depth at branch targets for validation
    label_stack_depths: HashMap<String, u16>,
    /// Declared frames at labels
    label_frames: HashMap<String, FrameState>,
    /// Whether we're after an unconditional transfer of control
    unreachable: bool,
}

impl CodeEncoder {
    /// Create an empty encoder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bytecode: Vec::new(),
            labels: HashMap::new(),
            fixups: Vec::new(),
            current_stack_depth: 0,
            max_stack_depth: 0,
            max_locals: 0,
            label_stack_depths: HashMap::new(),
            label_frames: HashMap::new(),
            unreachable: false,
        }
    }

    /// Mark the first `slots` local variable slots as used, e.g. by `this` and the parameters.
    pub fn reserve_locals(&mut self, slots: u16) {
        self.max_locals = self.max_locals.max(slots);
    }

    /// Emit an instruction with a fixed stack effect, by mnemonic.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::Malformed`] if the mnemonic is unknown or the operand does not match
    /// - [`crate::Error::NotSupported`] for branches, switches and descriptor-dependent
    ///   instructions, which have dedicated methods
    /// - [`crate::Error::StackUnderflow`] if the instruction pops more than is on the stack
    pub fn emit_instruction(&mut self, mnemonic: &str, operand: Option<Operand>) -> Result<()> {
        let opcode = lookup(mnemonic)?;
        self.emit_opcode(opcode, operand)
    }

    /// Emit an instruction with a fixed stack effect, by opcode.
    ///
    /// # Errors
    ///
    /// See [`CodeEncoder::emit_instruction`].
    pub fn emit_opcode(&mut self, opcode: u8, operand: Option<Operand>) -> Result<()> {
        match INSTRUCTIONS[usize::from(opcode)].stack {
            StackEffect::Fixed { pops, pushes } => {
                self.emit_with_effect(opcode, operand, u16::from(pops), u16::from(pushes))
            }
            StackEffect::Variable => Err(Error::NotSupported(format!(
                "'{}' has a descriptor dependent stack effect",
                INSTRUCTIONS[usize::from(opcode)].mnemonic
            ))),
        }
    }

    /// Emit an instruction whose stack effect the caller computed from a descriptor.
    ///
    /// # Errors
    ///
    /// See [`CodeEncoder::emit_instruction`].
    pub fn emit_with_effect(
        &mut self,
        opcode: u8,
        operand: Option<Operand>,
        pops: u16,
        pushes: u16,
    ) -> Result<()> {
        let metadata = &INSTRUCTIONS[usize::from(opcode)];
        if metadata.is_undefined() {
            return Err(Error::InvalidOpcode {
                opcode,
                offset: self.bytecode.len(),
            });
        }
        if matches!(
            metadata.flow,
            FlowType::ConditionalBranch
                | FlowType::UnconditionalBranch
                | FlowType::Switch
                | FlowType::Subroutine
        ) {
            return Err(Error::NotSupported(format!(
                "'{}' must be emitted through emit_branch",
                metadata.mnemonic
            )));
        }

        let offset = self.bytecode.len();
        let operand = operand.unwrap_or(Operand::None);
        self.emit_operand(opcode, metadata.op_type, &operand)
            .map_err(|e| malformed_error!("Operand error at '{}': {}", metadata.mnemonic, e))?;
        self.track_locals(opcode, &operand);
        self.update_stack_depth(offset, pops, pushes)?;

        if matches!(
            metadata.flow,
            FlowType::Return | FlowType::Throw | FlowType::SubroutineReturn
        ) {
            self.unreachable = true;
        }
        Ok(())
    }

    /// Emit a branch instruction targeting `label`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidBranch`] if the mnemonic is not a conditional or
    /// unconditional branch, and [`crate::Error::Malformed`] if the stack depth at `label`
    /// disagrees with an earlier branch.
    pub fn emit_branch(&mut self, mnemonic: &str, label: &str) -> Result<()> {
        let opcode = lookup(mnemonic)?;
        let metadata = &INSTRUCTIONS[usize::from(opcode)];

        if !matches!(
            metadata.flow,
            FlowType::ConditionalBranch | FlowType::UnconditionalBranch
        ) {
            return Err(Error::InvalidBranch(format!(
                "instruction '{mnemonic}' is not a branch instruction"
            )));
        }
        let offset_size = match metadata.op_type {
            OperandType::Branch16 => 2,
            OperandType::Branch32 => 4,
            _ => {
                return Err(Error::InvalidBranch(
                    "operand type must be Branch16 or Branch32".to_string(),
                ))
            }
        };

        let instruction_position = self.bytecode.len();
        self.bytecode.push(opcode);
        self.fixups.push(LabelFixup {
            label: label.to_string(),
            fixup_position: self.bytecode.len(),
            instruction_position,
            offset_size,
        });
        self.bytecode
            .extend(std::iter::repeat(0).take(usize::from(offset_size)));

        if let StackEffect::Fixed { pops, pushes } = metadata.stack {
            self.update_stack_depth(instruction_position, u16::from(pops), u16::from(pushes))?;
        }
        self.record_label_stack_depth(label)?;

        if metadata.flow == FlowType::UnconditionalBranch {
            self.unreachable = true;
        }
        Ok(())
    }

    /// Define a label at the current position.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DuplicateLabel`] if the label exists, and
    /// [`crate::Error::Malformed`] if the fall-through stack depth disagrees with the depth
    /// recorded by branches to this label.
    pub fn define_label(&mut self, name: &str) -> Result<()> {
        if self.labels.contains_key(name) {
            return Err(Error::DuplicateLabel(name.to_string()));
        }

        if let Some(&expected) = self.label_stack_depths.get(name) {
            if self.unreachable {
                self.current_stack_depth = expected;
            } else if self.current_stack_depth != expected {
                return Err(malformed_error!(
                    "Stack depth mismatch at label '{}': expected {} (from branch), got {} (current)",
                    name,
                    expected,
                    self.current_stack_depth
                ));
            }
        } else if !self.unreachable {
            self.label_stack_depths
                .insert(name.to_string(), self.current_stack_depth);
        } else if let Some(frame) = self.label_frames.get(name) {
            // Only reachable through branches emitted later; the declared frame knows the depth.
            self.current_stack_depth = frame.stack_slots();
        } else {
            self.current_stack_depth = 0;
        }

        self.unreachable = false;

        let position = u32::try_from(self.bytecode.len())
            .map_err(|_| malformed_error!("Bytecode length exceeds u32 range"))?;
        self.labels.insert(name.to_string(), position);
        Ok(())
    }

    /// Declare the frame (locals and stack types) at a branch target.
    ///
    /// May be called before or after the label is defined.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DuplicateLabel`] if a different frame was already declared.
    pub fn set_label_frame(&mut self, label: &str, frame: FrameState) -> Result<()> {
        match self.label_frames.get(label) {
            Some(existing) if *existing != frame => Err(Error::DuplicateLabel(format!(
                "conflicting frames declared for '{label}'"
            ))),
            _ => {
                self.label_frames.insert(label.to_string(), frame);
                Ok(())
            }
        }
    }

    /// Returns the current bytecode position.
    #[must_use]
    pub fn current_position(&self) -> u32 {
        self.bytecode.len() as u32
    }

    /// Get the maximum stack depth reached so far.
    #[must_use]
    pub fn max_stack_depth(&self) -> u16 {
        self.max_stack_depth
    }

    /// Get the current stack depth in slots.
    #[must_use]
    pub fn current_stack_depth(&self) -> u16 {
        self.current_stack_depth
    }

    /// Get the position of a defined label.
    #[must_use]
    pub fn get_label_position(&self, label_name: &str) -> Option<u32> {
        self.labels.get(label_name).copied()
    }

    /// Finalize encoding and resolve all label references.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::UndefinedLabel`] for branches or frames naming undefined labels
    /// - [`crate::Error::InvalidBranch`] if an offset does not fit its encoding
    /// - [`crate::Error::CodeTooLarge`] if the body exceeds 65535 bytes
    /// - [`crate::Error::Malformed`] if control falls off the end of the body, or two labels
    ///   at the same offset declare different frames
    pub fn finalize(mut self) -> Result<EncodedCode> {
        if self.bytecode.is_empty() {
            return Err(malformed_error!("Empty method body"));
        }
        if !self.unreachable {
            return Err(malformed_error!(
                "Control falls off the end of the method body at {}",
                self.bytecode.len()
            ));
        }
        if self.bytecode.len() > MAX_CODE_LENGTH {
            return Err(Error::CodeTooLarge(self.bytecode.len()));
        }

        let fixups = std::mem::take(&mut self.fixups);
        for fixup in &fixups {
            let label_position = self
                .labels
                .get(&fixup.label)
                .ok_or_else(|| Error::UndefinedLabel(fixup.label.clone()))?;

            let offset = i64::from(*label_position) - fixup.instruction_position as i64;
            self.write_branch_offset(offset, fixup)?;
        }

        let mut frames: Vec<(u32, FrameState)> = Vec::with_capacity(self.label_frames.len());
        for (label, frame) in std::mem::take(&mut self.label_frames) {
            let position = *self
                .labels
                .get(&label)
                .ok_or_else(|| Error::UndefinedLabel(label.clone()))?;
            if position as usize >= self.bytecode.len() {
                return Err(malformed_error!("Frame for '{}' points past the body", label));
            }
            match frames.iter().find(|(offset, _)| *offset == position) {
                Some((_, existing)) if *existing != frame => {
                    return Err(malformed_error!(
                        "Conflicting frames at offset {} (label '{}')",
                        position,
                        label
                    ))
                }
                Some(_) => {}
                None => frames.push((position, frame)),
            }
        }
        frames.sort_by_key(|(offset, _)| *offset);

        Ok(EncodedCode {
            code: self.bytecode,
            max_stack: self.max_stack_depth,
            max_locals: self.max_locals,
            labels: self.labels,
            frames,
        })
    }

    fn emit_operand(&mut self, opcode: u8, op_type: OperandType, operand: &Operand) -> Result<()> {
        let needs_wide = match (op_type, operand) {
            (OperandType::Local, Operand::Local(index)) => *index > 0xFF,
            (OperandType::Iinc, Operand::Iinc { index, delta }) => {
                *index > 0xFF || i8::try_from(*delta).is_err()
            }
            _ => false,
        };
        if needs_wide {
            self.bytecode.push(opcodes::WIDE);
        }
        self.bytecode.push(opcode);

        match (op_type, operand) {
            (OperandType::None, Operand::None) => {}
            (OperandType::UInt8, Operand::Immediate(value)) => {
                let value = u8::try_from(*value)
                    .map_err(|_| malformed_error!("{} exceeds u8 range", value))?;
                self.bytecode.push(value);
            }
            (OperandType::Int8, Operand::Immediate(value)) => {
                let value = i8::try_from(*value)
                    .map_err(|_| malformed_error!("{} exceeds i8 range", value))?;
                self.bytecode.extend_from_slice(&value.to_be_bytes());
            }
            (OperandType::Int16, Operand::Immediate(value)) => {
                let value = i16::try_from(*value)
                    .map_err(|_| malformed_error!("{} exceeds i16 range", value))?;
                self.bytecode.extend_from_slice(&value.to_be_bytes());
            }
            (OperandType::ConstantU8, Operand::Constant(index)) => {
                let index = u8::try_from(*index)
                    .map_err(|_| malformed_error!("Constant #{} needs a wide load", index))?;
                self.bytecode.push(index);
            }
            (OperandType::Constant | OperandType::Dynamic, Operand::Constant(index)) => {
                self.bytecode.extend_from_slice(&index.to_be_bytes());
                if op_type == OperandType::Dynamic {
                    self.bytecode.extend_from_slice(&[0, 0]);
                }
            }
            (OperandType::Local, Operand::Local(index)) => {
                if needs_wide {
                    self.bytecode.extend_from_slice(&index.to_be_bytes());
                } else {
                    self.bytecode.push(*index as u8);
                }
            }
            (OperandType::Iinc, Operand::Iinc { index, delta }) => {
                if needs_wide {
                    self.bytecode.extend_from_slice(&index.to_be_bytes());
                    self.bytecode.extend_from_slice(&delta.to_be_bytes());
                } else {
                    self.bytecode.push(*index as u8);
                    self.bytecode.extend_from_slice(&(*delta as i8).to_be_bytes());
                }
            }
            (OperandType::Interface, Operand::Interface { index, count }) => {
                self.bytecode.extend_from_slice(&index.to_be_bytes());
                self.bytecode.extend_from_slice(&[*count, 0]);
            }
            (OperandType::MultiArray, Operand::MultiArray { index, dimensions }) => {
                self.bytecode.extend_from_slice(&index.to_be_bytes());
                self.bytecode.push(*dimensions);
            }
            (expected, actual) => {
                return Err(malformed_error!(
                    "expected {:?} operand, got {:?}",
                    expected,
                    actual
                ))
            }
        }
        Ok(())
    }

    fn track_locals(&mut self, opcode: u8, operand: &Operand) {
        let access = match (opcode, operand) {
            (opcodes::ILOAD..=opcodes::ALOAD, Operand::Local(index)) => {
                Some((*index, local_width(opcode - opcodes::ILOAD)))
            }
            (opcodes::ISTORE..=opcodes::ASTORE, Operand::Local(index)) => {
                Some((*index, local_width(opcode - opcodes::ISTORE)))
            }
            (opcodes::ILOAD_0..=opcodes::ALOAD_3, _) => {
                let relative = opcode - opcodes::ILOAD_0;
                Some((u16::from(relative % 4), local_width(relative / 4)))
            }
            (opcodes::ISTORE_0..=opcodes::ASTORE_3, _) => {
                let relative = opcode - opcodes::ISTORE_0;
                Some((u16::from(relative % 4), local_width(relative / 4)))
            }
            (_, Operand::Iinc { index, .. }) | (opcodes::RET, Operand::Local(index)) => {
                Some((*index, 1))
            }
            _ => None,
        };

        if let Some((index, width)) = access {
            self.max_locals = self.max_locals.max(index.saturating_add(width));
        }
    }

    fn write_branch_offset(&mut self, offset: i64, fixup: &LabelFixup) -> Result<()> {
        let position = fixup.fixup_position;
        match fixup.offset_size {
            2 => {
                let offset = i16::try_from(offset).map_err(|_| {
                    Error::InvalidBranch(format!(
                        "offset {offset} out of range for 2-byte instruction"
                    ))
                })?;
                self.bytecode[position..position + 2].copy_from_slice(&offset.to_be_bytes());
            }
            4 => {
                let offset = i32::try_from(offset).map_err(|_| {
                    Error::InvalidBranch(format!(
                        "offset {offset} out of range for 4-byte instruction"
                    ))
                })?;
                self.bytecode[position..position + 4].copy_from_slice(&offset.to_be_bytes());
            }
            _ => {
                return Err(Error::InvalidBranch(format!(
                    "invalid offset size: {} bytes",
                    fixup.offset_size
                )))
            }
        }
        Ok(())
    }

    fn update_stack_depth(&mut self, offset: usize, pops: u16, pushes: u16) -> Result<()> {
        if self.unreachable {
            return Err(malformed_error!(
                "Unreachable instruction at {} without a preceding label",
                offset
            ));
        }

        self.current_stack_depth = self
            .current_stack_depth
            .checked_sub(pops)
            .ok_or(Error::StackUnderflow {
                offset,
                depth: self.current_stack_depth,
                pops,
            })?
            + pushes;
        self.max_stack_depth = self.max_stack_depth.max(self.current_stack_depth);
        Ok(())
    }

    fn record_label_stack_depth(&mut self, label: &str) -> Result<()> {
        if let Some(&expected) = self.label_stack_depths.get(label) {
            if self.current_stack_depth != expected {
                return Err(malformed_error!(
                    "Stack depth mismatch for branch to '{}': expected {}, but branch has {}",
                    label,
                    expected,
                    self.current_stack_depth
                ));
            }
        } else {
            self.label_stack_depths
                .insert(label.to_string(), self.current_stack_depth);
        }
        Ok(())
    }
}

impl Default for CodeEncoder {
    fn default() -> Self {
        Self::new()
    }
}

fn lookup(mnemonic: &str) -> Result<u8> {
    get_mnemonic_lookup()
        .get(mnemonic)
        .copied()
        .ok_or_else(|| malformed_error!("Unknown mnemonic '{}'", mnemonic))
}

/// Slots taken by the value kind at position `kind` of the `i, l, f, d, a` opcode groups.
fn local_width(kind: u8) -> u16 {
    match kind {
        1 | 3 => 2,
        _ => 1,
    }
}
