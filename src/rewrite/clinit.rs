//! Static initializer injection.
//!
//! The filter fields are assigned by a prologue that runs before anything else in the static
//! initializer. An existing initializer keeps its body byte for byte behind the prologue:
//!
//! - the prologue is padded with `nop` to a multiple of 4 bytes, so `tableswitch` and
//!   `lookupswitch` padding stays valid
//! - exception handlers, line numbers, local variable ranges, the first stack map frame and
//!   `Uninitialized` offsets move by the prologue size
//! - code-level type annotations are dropped, their offsets are not relocated
//!
//! Without an initializer, the prologue followed by `return` becomes the initializer.

use crate::{
    assembly::{opcodes, MethodBuilder},
    classfile::{
        access::MethodAccess,
        code::{CodeAttribute, MAX_CODE_LENGTH},
        constpool::ConstantPool,
        descriptor::MethodDescriptor,
        stackmap::StackMapTable,
        ClassFile,
    },
    config::TransformConfig,
    file::io::{read_be_at, write_be_at},
    rewrite::{
        add_method,
        fields::{COLLECTION_DESCRIPTOR, EXCLUDES_FIELD, INCLUDES_FIELD},
        find_unique_method, StaticInit, TargetProfile,
    },
    Error, Result,
};

/// Name of the static initializer.
pub const CLINIT: &str = "<clinit>";

const CLINIT_DESCRIPTOR: &str = "()V";

/// Assign the filter fields in the static initializer, creating it if needed.
///
/// # Errors
/// Returns [`crate::Error::StructuralMismatch`] for an initializer without code,
/// [`crate::Error::CodeTooLarge`] if the prefixed body no longer fits, and
/// [`crate::Error::Malformed`] for corrupted offset tables.
pub fn inject(
    class: &mut ClassFile,
    profile: &TargetProfile,
    config: &TransformConfig,
) -> Result<StaticInit> {
    let initializer = build_initializer(&mut class.constant_pool, profile, config)?;

    match find_unique_method(class, CLINIT)? {
        Some(index) => {
            let mut code = class.methods[index]
                .code(&class.constant_pool)?
                .ok_or_else(|| Error::StructuralMismatch(format!("{CLINIT} has no code")))?;
            let shift = prepend(&mut code, &initializer, &class.constant_pool)?;
            class.methods[index].set_code(&mut class.constant_pool, &code)?;

            log::debug!(
                "Prefixed {} with {} bytes of filter initialization",
                CLINIT,
                shift
            );
            Ok(StaticInit::Augmented)
        }
        None => {
            add_method(
                class,
                MethodAccess::STATIC,
                CLINIT,
                CLINIT_DESCRIPTOR,
                &initializer,
                Vec::new(),
            )?;
            log::debug!("Created {} for filter initialization", CLINIT);
            Ok(StaticInit::Created)
        }
    }
}

/// The complete initializer: both field assignments, then `return`.
fn build_initializer(
    pool: &mut ConstantPool,
    profile: &TargetProfile,
    config: &TransformConfig,
) -> Result<CodeAttribute> {
    let descriptor = MethodDescriptor::parse(CLINIT_DESCRIPTOR)?;
    let mut builder = MethodBuilder::new(
        pool,
        &profile.class_name,
        MethodAccess::STATIC,
        &descriptor,
        false,
    )?;

    for (field, values) in [
        (INCLUDES_FIELD, config.includes.as_deref()),
        (EXCLUDES_FIELD, config.excludes.as_deref()),
    ] {
        push_collection(&mut builder, values)?;
        builder.put_static(
            &profile.class_name,
            &profile.internal(field),
            COLLECTION_DESCRIPTOR,
        )?;
    }
    builder.op(opcodes::RETURN)?;

    builder.finish()
}

/// `Arrays.asList(new String[] { ... })`, or `null` for a missing or empty list.
fn push_collection(builder: &mut MethodBuilder<'_>, values: Option<&[String]>) -> Result<()> {
    let Some(values) = values.filter(|values| !values.is_empty()) else {
        return builder.op(opcodes::ACONST_NULL);
    };

    let length = i32::try_from(values.len())
        .map_err(|_| malformed_error!("Too many prefixes: {}", values.len()))?;
    builder.iconst(length)?;
    builder.new_reference_array("java/lang/String")?;
    for (index, value) in (0..).zip(values) {
        builder.op(opcodes::DUP)?;
        builder.iconst(index)?;
        builder.ldc_string(value)?;
        builder.op(opcodes::AASTORE)?;
    }
    builder.invoke_static(
        "java/util/Arrays",
        "asList",
        "([Ljava/lang/Object;)Ljava/util/List;",
    )
}

/// Put the initializer, minus its `return`, in front of `code`. Returns the prologue size.
fn prepend(
    code: &mut CodeAttribute,
    initializer: &CodeAttribute,
    pool: &ConstantPool,
) -> Result<u16> {
    let Some((&opcodes::RETURN, body)) = initializer.code.split_last() else {
        return Err(malformed_error!("Initializer does not end with return"));
    };

    let mut prologue = body.to_vec();
    while prologue.len() % 4 != 0 {
        prologue.push(opcodes::NOP);
    }

    let total = prologue.len() + code.code.len();
    if total > MAX_CODE_LENGTH {
        return Err(Error::CodeTooLarge(total));
    }
    let shift = u16::try_from(prologue.len())
        .map_err(|_| malformed_error!("Prologue of {} bytes", prologue.len()))?;

    prologue.extend_from_slice(&code.code);
    code.code = prologue;
    code.max_stack = code.max_stack.max(initializer.max_stack);
    code.max_locals = code.max_locals.max(initializer.max_locals);

    for entry in &mut code.exception_table {
        entry.start_pc = shift_pc(entry.start_pc, shift)?;
        entry.end_pc = shift_pc(entry.end_pc, shift)?;
        entry.handler_pc = shift_pc(entry.handler_pc, shift)?;
    }

    let mut attributes = std::mem::take(&mut code.attributes);
    attributes.retain(|attribute| {
        let annotations = pool.utf8_eq(attribute.name_index, "RuntimeVisibleTypeAnnotations")
            || pool.utf8_eq(attribute.name_index, "RuntimeInvisibleTypeAnnotations");
        if annotations {
            log::trace!("Dropped code type annotations of {}", CLINIT);
        }
        !annotations
    });

    for attribute in &mut attributes {
        let name = pool.utf8_str(attribute.name_index)?;
        match name.as_str() {
            "LineNumberTable" => shift_pc_table(&mut attribute.info, 4, shift)?,
            "LocalVariableTable" | "LocalVariableTypeTable" => {
                shift_pc_table(&mut attribute.info, 10, shift)?;
            }
            "StackMapTable" => {
                let mut table = StackMapTable::parse(&attribute.info)?;
                table.shift(shift)?;
                attribute.info = table.to_bytes()?;
            }
            _ => {}
        }
    }
    code.attributes = attributes;

    Ok(shift)
}

fn shift_pc(pc: u16, shift: u16) -> Result<u16> {
    pc.checked_add(shift)
        .ok_or_else(|| malformed_error!("Offset {} overflows when shifted by {}", pc, shift))
}

/// Shift the leading `start_pc` of every entry of a `u2`-counted table.
fn shift_pc_table(info: &mut [u8], entry_size: usize, shift: u16) -> Result<()> {
    let mut cursor = 0;
    let count = usize::from(read_be_at::<u16>(info, &mut cursor)?);
    if info.len() != 2 + count * entry_size {
        return Err(malformed_error!(
            "Table of {} entries has {} bytes",
            count,
            info.len()
        ));
    }

    for entry in 0..count {
        let position = 2 + entry * entry_size;
        let mut cursor = position;
        let start_pc = read_be_at::<u16>(info, &mut cursor)?;
        let mut cursor = position;
        write_be_at(info, &mut cursor, shift_pc(start_pc, shift)?)?;
    }
    Ok(())
}
