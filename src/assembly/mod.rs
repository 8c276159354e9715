//! JVM bytecode assembly and disassembly.
//!
//! This module provides the instruction-level tooling the rewrite engine is built on: a
//! shared opcode table, a decoder for existing method bodies, an encoder with label and stack
//! tracking for generated bodies, stack map frame compression, and a constant-pool aware
//! [`MethodBuilder`] on top of it all.
//!
//! # Architecture
//!
//! - [`opcodes`] - Named opcode constants
//! - [`instruction`] - Per-opcode metadata ([`INSTRUCTIONS`]) and the decoded [`Instruction`]
//! - [`decoder`] - [`decode_stream`] / [`decode_instruction`]
//! - [`encoder`] - [`CodeEncoder`] with labels, fixups and `max_stack`/`max_locals` tracking
//! - [`frames`] - `StackMapTable` construction from per-label frames
//! - [`builder`] - [`MethodBuilder`], the encoder bound to a constant pool
//!
//! # Examples
//!
//! ```rust
//! use bundleweave::{
//!     assembly::{decode_stream, CodeEncoder, Operand},
//!     Parser,
//! };
//!
//! let mut encoder = CodeEncoder::new();
//! encoder.emit_instruction("iload", Some(Operand::Local(0)))?;
//! encoder.emit_instruction("ireturn", None)?;
//! let encoded = encoder.finalize()?;
//!
//! let mut parser = Parser::new(&encoded.code);
//! let decoded = decode_stream(&mut parser)?;
//! assert_eq!(decoded[0].mnemonic, "iload");
//! # Ok::<(), bundleweave::Error>(())
//! ```

pub mod builder;
pub mod decoder;
pub mod encoder;
pub mod frames;
pub mod instruction;
pub mod opcodes;

pub use builder::MethodBuilder;
pub use decoder::{decode_instruction, decode_stream};
pub use encoder::{CodeEncoder, EncodedCode, FrameState};
pub use instruction::{
    FlowType, Instruction, JvmInstruction, Operand, OperandType, StackEffect, INSTRUCTIONS,
};
