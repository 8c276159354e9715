//! Constant-pool aware method body builder.
//!
//! [`MethodBuilder`] binds a [`CodeEncoder`] to the class's [`ConstantPool`] so generated code
//! can name classes, fields, methods and string literals directly. Stack effects of field
//! accesses and invocations are derived from their descriptors, loads and stores pick the
//! shortest encoding, and [`MethodBuilder::finish`] produces a complete [`CodeAttribute`]
//! including a `StackMapTable` when the class version requires one.
//!
//! # Examples
//!
//! ```rust
//! use bundleweave::{
//!     assembly::MethodBuilder,
//!     classfile::{access::MethodAccess, constpool::ConstantPool, descriptor::MethodDescriptor},
//! };
//!
//! let mut pool = ConstantPool::new();
//! let descriptor = MethodDescriptor::parse("(Ljava/lang/String;)Ljava/lang/String;")?;
//! let mut builder = MethodBuilder::new(&mut pool, "demo/Owner", MethodAccess::STATIC, &descriptor, true)?;
//!
//! builder.aload(0)?;
//! builder.invoke_virtual("java/lang/String", "trim", "()Ljava/lang/String;")?;
//! builder.return_value(descriptor.ret.as_ref())?;
//!
//! let code = builder.finish()?;
//! assert_eq!(code.max_stack, 1);
//! assert_eq!(code.max_locals, 1);
//! # Ok::<(), bundleweave::Error>(())
//! ```

use crate::{
    assembly::{
        encoder::{CodeEncoder, FrameState},
        frames, opcodes, Operand,
    },
    classfile::{
        access::MethodAccess,
        code::CodeAttribute,
        constpool::ConstantPool,
        descriptor::{FieldType, MethodDescriptor, ValueKind},
        stackmap::VerificationType,
        Attribute,
    },
    Result,
};

/// Builds one method body against a class's constant pool.
pub struct MethodBuilder<'a> {
    pool: &'a mut ConstantPool,
    encoder: CodeEncoder,
    initial_locals: Vec<VerificationType>,
    emit_frames: bool,
}

impl<'a> MethodBuilder<'a> {
    /// Start a body for a method of `owner` with the given access and descriptor.
    ///
    /// `emit_frames` selects whether [`MethodBuilder::finish`] attaches a `StackMapTable`.
    ///
    /// # Errors
    /// Returns [`crate::Error::ConstantPoolOverflow`] if the initial frame's class entries
    /// cannot be added.
    pub fn new(
        pool: &'a mut ConstantPool,
        owner: &str,
        access: MethodAccess,
        descriptor: &MethodDescriptor,
        emit_frames: bool,
    ) -> Result<Self> {
        let is_static = access.contains(MethodAccess::STATIC);
        let initial_locals = frames::initial_locals(pool, owner, is_static, descriptor)?;

        let mut encoder = CodeEncoder::new();
        encoder.reserve_locals(descriptor.arg_slots() + u16::from(!is_static));

        Ok(MethodBuilder {
            pool,
            encoder,
            initial_locals,
            emit_frames,
        })
    }

    /// The constant pool the body is built against.
    pub fn pool(&mut self) -> &mut ConstantPool {
        self.pool
    }

    /// Locals of the implicit frame at offset 0.
    #[must_use]
    pub fn initial_locals(&self) -> &[VerificationType] {
        &self.initial_locals
    }

    /// `Object` verification type for a class or array descriptor.
    ///
    /// # Errors
    /// Returns [`crate::Error::ConstantPoolOverflow`] when the pool is full.
    pub fn object_type(&mut self, class: &str) -> Result<VerificationType> {
        Ok(VerificationType::Object(self.pool.class(class)?))
    }

    /// Emit an instruction without operand.
    ///
    /// # Errors
    /// Propagates encoder errors.
    pub fn op(&mut self, opcode: u8) -> Result<()> {
        self.encoder.emit_opcode(opcode, None)
    }

    /// Load a local of the given kind, using the `_0`..`_3` forms when possible.
    ///
    /// # Errors
    /// Propagates encoder errors.
    pub fn load(&mut self, kind: ValueKind, slot: u16) -> Result<()> {
        let (short_base, long_form) = match kind {
            ValueKind::Int => (opcodes::ILOAD_0, opcodes::ILOAD),
            ValueKind::Long => (opcodes::LLOAD_0, opcodes::LLOAD),
            ValueKind::Float => (opcodes::FLOAD_0, opcodes::FLOAD),
            ValueKind::Double => (opcodes::DLOAD_0, opcodes::DLOAD),
            ValueKind::Reference => (opcodes::ALOAD_0, opcodes::ALOAD),
        };
        self.local_access(short_base, long_form, slot)
    }

    /// Store into a local of the given kind, using the `_0`..`_3` forms when possible.
    ///
    /// # Errors
    /// Propagates encoder errors.
    pub fn store(&mut self, kind: ValueKind, slot: u16) -> Result<()> {
        let (short_base, long_form) = match kind {
            ValueKind::Int => (opcodes::ISTORE_0, opcodes::ISTORE),
            ValueKind::Long => (opcodes::LSTORE_0, opcodes::LSTORE),
            ValueKind::Float => (opcodes::FSTORE_0, opcodes::FSTORE),
            ValueKind::Double => (opcodes::DSTORE_0, opcodes::DSTORE),
            ValueKind::Reference => (opcodes::ASTORE_0, opcodes::ASTORE),
        };
        self.local_access(short_base, long_form, slot)
    }

    fn local_access(&mut self, short_base: u8, long_form: u8, slot: u16) -> Result<()> {
        if slot < 4 {
            self.encoder.emit_opcode(short_base + slot as u8, None)
        } else {
            self.encoder.emit_opcode(long_form, Some(Operand::Local(slot)))
        }
    }

    /// `aload`
    ///
    /// # Errors
    /// Propagates encoder errors.
    pub fn aload(&mut self, slot: u16) -> Result<()> {
        self.load(ValueKind::Reference, slot)
    }

    /// `astore`
    ///
    /// # Errors
    /// Propagates encoder errors.
    pub fn astore(&mut self, slot: u16) -> Result<()> {
        self.store(ValueKind::Reference, slot)
    }

    /// `iload`
    ///
    /// # Errors
    /// Propagates encoder errors.
    pub fn iload(&mut self, slot: u16) -> Result<()> {
        self.load(ValueKind::Int, slot)
    }

    /// `istore`
    ///
    /// # Errors
    /// Propagates encoder errors.
    pub fn istore(&mut self, slot: u16) -> Result<()> {
        self.store(ValueKind::Int, slot)
    }

    /// `iinc slot, delta`
    ///
    /// # Errors
    /// Propagates encoder errors.
    pub fn iinc(&mut self, slot: u16, delta: i16) -> Result<()> {
        self.encoder.emit_opcode(
            opcodes::IINC,
            Some(Operand::Iinc {
                index: slot,
                delta,
            }),
        )
    }

    /// Push an `int` constant with the shortest encoding.
    ///
    /// # Errors
    /// Propagates encoder and constant pool errors.
    pub fn iconst(&mut self, value: i32) -> Result<()> {
        match value {
            -1..=5 => self
                .encoder
                .emit_opcode((i32::from(opcodes::ICONST_0) + value) as u8, None),
            -128..=127 => self
                .encoder
                .emit_opcode(opcodes::BIPUSH, Some(Operand::Immediate(value))),
            -32768..=32767 => self
                .encoder
                .emit_opcode(opcodes::SIPUSH, Some(Operand::Immediate(value))),
            _ => {
                let index = self.pool.integer(value)?;
                self.ldc(index)
            }
        }
    }

    /// Push a string literal.
    ///
    /// # Errors
    /// Propagates encoder and constant pool errors.
    pub fn ldc_string(&mut self, value: &str) -> Result<()> {
        let index = self.pool.string(value)?;
        self.ldc(index)
    }

    fn ldc(&mut self, index: u16) -> Result<()> {
        if index <= 0xFF {
            self.encoder
                .emit_opcode(opcodes::LDC, Some(Operand::Constant(index)))
        } else {
            self.encoder
                .emit_opcode(opcodes::LDC_W, Some(Operand::Constant(index)))
        }
    }

    /// `getstatic owner.name:descriptor`
    ///
    /// # Errors
    /// Propagates encoder, descriptor and constant pool errors.
    pub fn get_static(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<()> {
        let slots = FieldType::parse(descriptor)?.slots();
        let index = self.pool.field_ref(owner, name, descriptor)?;
        self.encoder
            .emit_with_effect(opcodes::GETSTATIC, Some(Operand::Constant(index)), 0, slots)
    }

    /// `putstatic owner.name:descriptor`
    ///
    /// # Errors
    /// Propagates encoder, descriptor and constant pool errors.
    pub fn put_static(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<()> {
        let slots = FieldType::parse(descriptor)?.slots();
        let index = self.pool.field_ref(owner, name, descriptor)?;
        self.encoder
            .emit_with_effect(opcodes::PUTSTATIC, Some(Operand::Constant(index)), slots, 0)
    }

    /// `getfield owner.name:descriptor`
    ///
    /// # Errors
    /// Propagates encoder, descriptor and constant pool errors.
    pub fn get_field(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<()> {
        let slots = FieldType::parse(descriptor)?.slots();
        let index = self.pool.field_ref(owner, name, descriptor)?;
        self.encoder
            .emit_with_effect(opcodes::GETFIELD, Some(Operand::Constant(index)), 1, slots)
    }

    /// `putfield owner.name:descriptor`
    ///
    /// # Errors
    /// Propagates encoder, descriptor and constant pool errors.
    pub fn put_field(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<()> {
        let slots = FieldType::parse(descriptor)?.slots();
        let index = self.pool.field_ref(owner, name, descriptor)?;
        self.encoder
            .emit_with_effect(opcodes::PUTFIELD, Some(Operand::Constant(index)), 1 + slots, 0)
    }

    /// `invokestatic owner.name descriptor`
    ///
    /// # Errors
    /// Propagates encoder, descriptor and constant pool errors.
    pub fn invoke_static(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<()> {
        self.invoke(opcodes::INVOKESTATIC, owner, name, descriptor)
    }

    /// `invokevirtual owner.name descriptor`
    ///
    /// # Errors
    /// Propagates encoder, descriptor and constant pool errors.
    pub fn invoke_virtual(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<()> {
        self.invoke(opcodes::INVOKEVIRTUAL, owner, name, descriptor)
    }

    /// `invokespecial owner.name descriptor`, used for private methods of the class itself.
    ///
    /// # Errors
    /// Propagates encoder, descriptor and constant pool errors.
    pub fn invoke_special(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<()> {
        self.invoke(opcodes::INVOKESPECIAL, owner, name, descriptor)
    }

    /// `invokeinterface owner.name descriptor`
    ///
    /// # Errors
    /// Propagates encoder, descriptor and constant pool errors.
    pub fn invoke_interface(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<()> {
        let parsed = MethodDescriptor::parse(descriptor)?;
        let pops = parsed.arg_slots() + 1;
        let count = u8::try_from(pops)
            .map_err(|_| malformed_error!("Too many interface arguments in {}", descriptor))?;
        let index = self.pool.interface_method_ref(owner, name, descriptor)?;
        self.encoder.emit_with_effect(
            opcodes::INVOKEINTERFACE,
            Some(Operand::Interface { index, count }),
            pops,
            parsed.ret_slots(),
        )
    }

    fn invoke(&mut self, opcode: u8, owner: &str, name: &str, descriptor: &str) -> Result<()> {
        let parsed = MethodDescriptor::parse(descriptor)?;
        let receiver = u16::from(opcode != opcodes::INVOKESTATIC);
        let index = self.pool.method_ref(owner, name, descriptor)?;
        self.encoder.emit_with_effect(
            opcode,
            Some(Operand::Constant(index)),
            parsed.arg_slots() + receiver,
            parsed.ret_slots(),
        )
    }

    /// `anewarray component`
    ///
    /// # Errors
    /// Propagates encoder and constant pool errors.
    pub fn new_reference_array(&mut self, component: &str) -> Result<()> {
        let index = self.pool.class(component)?;
        self.encoder
            .emit_opcode(opcodes::ANEWARRAY, Some(Operand::Constant(index)))
    }

    /// `checkcast class`
    ///
    /// # Errors
    /// Propagates encoder and constant pool errors.
    pub fn checkcast(&mut self, class: &str) -> Result<()> {
        let index = self.pool.class(class)?;
        self.encoder
            .emit_opcode(opcodes::CHECKCAST, Some(Operand::Constant(index)))
    }

    /// `instanceof class`
    ///
    /// # Errors
    /// Propagates encoder and constant pool errors.
    pub fn instance_of(&mut self, class: &str) -> Result<()> {
        let index = self.pool.class(class)?;
        self.encoder
            .emit_opcode(opcodes::INSTANCEOF, Some(Operand::Constant(index)))
    }

    /// Emit a branch to `label`.
    ///
    /// # Errors
    /// Propagates encoder errors.
    pub fn branch(&mut self, opcode: u8, label: &str) -> Result<()> {
        let mnemonic = crate::assembly::INSTRUCTIONS[usize::from(opcode)].mnemonic;
        self.encoder.emit_branch(mnemonic, label)
    }

    /// Define `label` at the current position.
    ///
    /// # Errors
    /// Propagates encoder errors.
    pub fn label(&mut self, label: &str) -> Result<()> {
        self.encoder.define_label(label)
    }

    /// Declare the frame at `label`.
    ///
    /// # Errors
    /// Propagates encoder errors.
    pub fn frame(
        &mut self,
        label: &str,
        locals: Vec<VerificationType>,
        stack: Vec<VerificationType>,
    ) -> Result<()> {
        self.encoder
            .set_label_frame(label, FrameState { locals, stack })
    }

    /// Push every parameter of `descriptor`, the first one read from `first_slot`.
    ///
    /// # Errors
    /// Propagates encoder errors.
    pub fn load_arguments(&mut self, descriptor: &MethodDescriptor, first_slot: u16) -> Result<()> {
        for (param, slot) in descriptor
            .params
            .iter()
            .zip(descriptor.param_slots(first_slot))
        {
            self.load(param.kind(), slot)?;
        }
        Ok(())
    }

    /// Return the value on top of the stack, or `return` for `void`.
    ///
    /// # Errors
    /// Propagates encoder errors.
    pub fn return_value(&mut self, ret: Option<&FieldType>) -> Result<()> {
        let opcode = match ret.map(FieldType::kind) {
            None => opcodes::RETURN,
            Some(ValueKind::Int) => opcodes::IRETURN,
            Some(ValueKind::Long) => opcodes::LRETURN,
            Some(ValueKind::Float) => opcodes::FRETURN,
            Some(ValueKind::Double) => opcodes::DRETURN,
            Some(ValueKind::Reference) => opcodes::ARETURN,
        };
        self.encoder.emit_opcode(opcode, None)
    }

    /// Resolve labels and produce the `Code` attribute.
    ///
    /// # Errors
    /// Propagates encoder and frame compression errors.
    pub fn finish(self) -> Result<CodeAttribute> {
        let encoded = self.encoder.finalize()?;

        let mut attributes = Vec::new();
        if self.emit_frames && !encoded.frames.is_empty() {
            let table = frames::compress(&self.initial_locals, &encoded.frames)?;
            attributes.push(Attribute {
                name_index: self.pool.utf8("StackMapTable")?,
                info: table.to_bytes()?,
            });
        }

        Ok(CodeAttribute {
            max_stack: encoded.max_stack,
            max_locals: encoded.max_locals,
            code: encoded.code,
            exception_table: Vec::new(),
            attributes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::stackmap::{StackMapFrame, StackMapTable};

    #[test]
    fn null_check_with_frames() -> Result<()> {
        let mut pool = ConstantPool::new();
        let descriptor = MethodDescriptor::parse("(Ljava/lang/String;)Ljava/lang/String;")?;
        let mut builder =
            MethodBuilder::new(&mut pool, "demo/Owner", MethodAccess::STATIC, &descriptor, true)?;
        let string = builder.object_type("java/lang/String")?;

        builder.aload(0)?;
        builder.branch(opcodes::IFNULL, "null")?;
        builder.aload(0)?;
        builder.op(opcodes::ARETURN)?;
        builder.label("null")?;
        builder.frame("null", vec![string], vec![])?;
        builder.ldc_string("default")?;
        builder.op(opcodes::ARETURN)?;

        let code = builder.finish()?;
        assert_eq!(code.code[..5], [0x2A, 0xC6, 0x00, 0x05, 0x2A]);
        assert_eq!(code.code[6], opcodes::LDC);
        assert_eq!(code.attributes.len(), 1);

        let table = StackMapTable::parse(&code.attributes[0].info)?;
        assert_eq!(table.frames, vec![StackMapFrame::Same { offset_delta: 6 }]);
        Ok(())
    }

    #[test]
    fn frames_are_skipped_for_old_versions() -> Result<()> {
        let mut pool = ConstantPool::new();
        let descriptor = MethodDescriptor::parse("(Z)I")?;
        let mut builder =
            MethodBuilder::new(&mut pool, "demo/Owner", MethodAccess::STATIC, &descriptor, false)?;

        builder.iload(0)?;
        builder.branch(opcodes::IFEQ, "zero")?;
        builder.iconst(1000)?;
        builder.op(opcodes::IRETURN)?;
        builder.label("zero")?;
        builder.frame("zero", vec![VerificationType::Integer], vec![])?;
        builder.iconst(-1)?;
        builder.op(opcodes::IRETURN)?;

        let code = builder.finish()?;
        assert!(code.attributes.is_empty());
        assert_eq!(code.code[4..7], [opcodes::SIPUSH, 0x03, 0xE8]);
        assert_eq!(code.code[8], opcodes::ICONST_M1);
        Ok(())
    }

    #[test]
    fn invocation_stack_effects() -> Result<()> {
        let mut pool = ConstantPool::new();
        let descriptor = MethodDescriptor::parse("(Ljava/util/Collection;JI)Z")?;
        let mut builder =
            MethodBuilder::new(&mut pool, "demo/Owner", MethodAccess::empty(), &descriptor, true)?;

        builder.aload(0)?;
        builder.load_arguments(&descriptor, 1)?;
        builder.invoke_special("demo/Owner", "check", "(Ljava/util/Collection;JI)Z")?;
        builder.aload(1)?;
        builder.invoke_interface("java/util/Collection", "isEmpty", "()Z")?;
        builder.op(opcodes::IAND)?;
        builder.return_value(descriptor.ret.as_ref())?;

        let code = builder.finish()?;
        assert_eq!(code.max_stack, 5);
        assert_eq!(code.max_locals, 5);
        // aload_0, aload_1, lload_2, iload 4, invokespecial
        assert_eq!(code.code[..6], [0x2A, 0x2B, 0x20, 0x15, 0x04, 0xB7]);
        Ok(())
    }
}
