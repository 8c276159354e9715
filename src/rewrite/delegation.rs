//! Delegating methods.
//!
//! Each relocated method gets a replacement under its original name with the original access
//! flags, descriptor, generic signature and declared exceptions. The replacement forwards all
//! arguments to the relocated body and post-processes the result:
//!
//! - resolution: a non-null bundle resolved for a non-null base name gets its instance flag
//!   set to `isIncluded(baseName)`
//! - access: the value of a flagged bundle is passed through `formatValue`

use crate::{
    assembly::{opcodes, MethodBuilder},
    classfile::{access::MethodAccess, descriptor::MethodDescriptor, ClassFile},
    rewrite::{
        add_method,
        fields::{FLAG_DESCRIPTOR, FLAG_FIELD},
        helpers::{FORMAT_VALUE, FORMAT_VALUE_DESCRIPTOR, IS_INCLUDED, IS_INCLUDED_DESCRIPTOR},
        relocation::{base_name_slot, Relocated},
        MethodSignatureRecord, TargetProfile,
    },
    Error, Result,
};

/// Add both delegates and return their names, resolution first.
///
/// # Errors
/// Returns [`crate::Error::StructuralMismatch`] if a record no longer fits the delegate shape,
/// and propagates encoder and constant pool errors.
pub fn generate(
    class: &mut ClassFile,
    profile: &TargetProfile,
    relocated: &Relocated,
) -> Result<Vec<String>> {
    let emit_frames = class.requires_stack_maps();
    let mut names = Vec::with_capacity(2);

    for (record, emit) in [
        (&relocated.resolution, emit_resolution as Emitter),
        (&relocated.access, emit_access as Emitter),
    ] {
        let descriptor = MethodDescriptor::parse(&record.descriptor)?;
        let mut builder = MethodBuilder::new(
            &mut class.constant_pool,
            &profile.class_name,
            record.access,
            &descriptor,
            emit_frames,
        )?;
        emit(&mut builder, profile, record, &descriptor)?;
        let code = builder.finish()?;

        let attributes = record.declaration_attributes(&mut class.constant_pool)?;
        add_method(
            class,
            record.access,
            &record.name,
            &record.descriptor,
            &code,
            attributes,
        )?;
        log::debug!(
            "Generated delegate {}{} -> {}",
            record.name,
            record.descriptor,
            profile.internal(&record.name)
        );
        names.push(record.name.clone());
    }

    Ok(names)
}

type Emitter = fn(
    &mut MethodBuilder<'_>,
    &TargetProfile,
    &MethodSignatureRecord,
    &MethodDescriptor,
) -> Result<()>;

fn emit_resolution(
    builder: &mut MethodBuilder<'_>,
    profile: &TargetProfile,
    record: &MethodSignatureRecord,
    descriptor: &MethodDescriptor,
) -> Result<()> {
    let owner = &profile.class_name;
    let base_slot = base_name_slot(descriptor, 0).ok_or_else(|| {
        Error::StructuralMismatch(format!("{}{} takes no base name", record.name, record.descriptor))
    })?;
    let result_slot = descriptor.arg_slots();

    builder.load_arguments(descriptor, 0)?;
    builder.invoke_static(owner, &profile.internal(&record.name), &record.descriptor)?;
    builder.astore(result_slot)?;

    builder.aload(result_slot)?;
    builder.branch(opcodes::IFNULL, "done")?;
    builder.aload(base_slot)?;
    builder.branch(opcodes::IFNULL, "done")?;
    builder.aload(result_slot)?;
    builder.aload(base_slot)?;
    builder.invoke_static(owner, &profile.internal(IS_INCLUDED), IS_INCLUDED_DESCRIPTOR)?;
    builder.put_field(owner, &profile.internal(FLAG_FIELD), FLAG_DESCRIPTOR)?;

    let mut locals = builder.initial_locals().to_vec();
    locals.push(builder.object_type(owner)?);
    builder.label("done")?;
    builder.frame("done", locals, vec![])?;
    builder.aload(result_slot)?;
    builder.return_value(descriptor.ret.as_ref())
}

fn emit_access(
    builder: &mut MethodBuilder<'_>,
    profile: &TargetProfile,
    record: &MethodSignatureRecord,
    descriptor: &MethodDescriptor,
) -> Result<()> {
    let owner = &profile.class_name;
    let result_class = descriptor
        .ret
        .as_ref()
        .and_then(|ret| ret.class_name())
        .ok_or_else(|| {
            Error::StructuralMismatch(format!(
                "{}{} must return a reference",
                record.name, record.descriptor
            ))
        })?
        .to_string();
    let result_slot = 1 + descriptor.arg_slots();

    builder.aload(0)?;
    builder.load_arguments(descriptor, 1)?;
    let internal = profile.internal(&record.name);
    if record.access.contains(MethodAccess::PRIVATE) {
        builder.invoke_special(owner, &internal, &record.descriptor)?;
    } else {
        builder.invoke_virtual(owner, &internal, &record.descriptor)?;
    }
    builder.astore(result_slot)?;

    builder.aload(0)?;
    builder.get_field(owner, &profile.internal(FLAG_FIELD), FLAG_DESCRIPTOR)?;
    builder.branch(opcodes::IFEQ, "raw")?;
    builder.aload(0)?;
    builder.aload(result_slot)?;
    builder.invoke_special(owner, &profile.internal(FORMAT_VALUE), FORMAT_VALUE_DESCRIPTOR)?;
    if result_class != "java/lang/Object" {
        builder.checkcast(&result_class)?;
    }
    builder.return_value(descriptor.ret.as_ref())?;

    let mut locals = builder.initial_locals().to_vec();
    locals.push(builder.object_type(&result_class)?);
    builder.label("raw")?;
    builder.frame("raw", locals, vec![])?;
    builder.aload(result_slot)?;
    builder.return_value(descriptor.ret.as_ref())
}
