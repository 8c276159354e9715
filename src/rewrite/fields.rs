//! Field injection.
//!
//! Adds the two static filter fields and the per-instance flag. All three start at their
//! default value; the static initializer assigns the filter fields and the resolution
//! delegate sets the flag.

use crate::{
    classfile::{access::FieldAccess, Attribute, ClassFile, FieldInfo},
    file::io::push_be,
    rewrite::TargetProfile,
    Error, Result,
};

/// Suffix of the static include list field.
pub const INCLUDES_FIELD: &str = "INCLUDES";

/// Suffix of the static exclude list field.
pub const EXCLUDES_FIELD: &str = "EXCLUDES";

/// Suffix of the instance flag field.
pub const FLAG_FIELD: &str = "instrumented";

/// Descriptor of the filter fields.
pub const COLLECTION_DESCRIPTOR: &str = "Ljava/util/Collection;";

/// Generic signature of the filter fields.
pub const COLLECTION_SIGNATURE: &str = "Ljava/util/Collection<Ljava/lang/String;>;";

/// Descriptor of the instance flag.
pub const FLAG_DESCRIPTOR: &str = "Z";

/// Add the fields and return their names.
///
/// # Errors
/// Returns [`crate::Error::StructuralMismatch`] if one of the names is already declared, and
/// [`crate::Error::ConstantPoolOverflow`] if the pool is full.
pub fn inject(class: &mut ClassFile, profile: &TargetProfile) -> Result<Vec<String>> {
    let filter_access = FieldAccess::PRIVATE | FieldAccess::STATIC | FieldAccess::FINAL;
    let declarations = [
        (
            profile.internal(INCLUDES_FIELD),
            filter_access,
            COLLECTION_DESCRIPTOR,
            Some(COLLECTION_SIGNATURE),
        ),
        (
            profile.internal(EXCLUDES_FIELD),
            filter_access,
            COLLECTION_DESCRIPTOR,
            Some(COLLECTION_SIGNATURE),
        ),
        (
            profile.internal(FLAG_FIELD),
            FieldAccess::PRIVATE,
            FLAG_DESCRIPTOR,
            None,
        ),
    ];

    let mut names = Vec::with_capacity(declarations.len());
    for (name, access, descriptor, signature) in declarations {
        if class
            .fields
            .iter()
            .any(|field| class.constant_pool.utf8_eq(field.name_index, &name))
        {
            return Err(Error::StructuralMismatch(format!(
                "Field {name} already exists"
            )));
        }

        let pool = &mut class.constant_pool;
        let mut attributes = Vec::new();
        if let Some(signature) = signature {
            let mut info = Vec::with_capacity(2);
            push_be(&mut info, pool.utf8(signature)?);
            attributes.push(Attribute {
                name_index: pool.utf8("Signature")?,
                info,
            });
        }

        class.fields.push(FieldInfo {
            access,
            name_index: pool.utf8(&name)?,
            descriptor_index: pool.utf8(descriptor)?,
            attributes,
        });
        log::debug!("Injected field {} {}", name, descriptor);
        names.push(name);
    }

    Ok(names)
}
