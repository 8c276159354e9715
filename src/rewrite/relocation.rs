//! Method relocation.
//!
//! The resolution and access methods keep their bodies, descriptors, attributes and access
//! flags; only their name changes to the internal one. Their declarations are recorded first
//! so [`crate::rewrite::delegation`] can regenerate the public surface unchanged.

use crate::{
    classfile::{
        descriptor::{FieldType, MethodDescriptor},
        ClassFile,
    },
    rewrite::{find_unique_method, MethodSignatureRecord, TargetProfile},
    Error, Result,
};

/// The two relocated methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocated {
    /// The bundle resolution method
    pub resolution: MethodSignatureRecord,
    /// The value access method
    pub access: MethodSignatureRecord,
}

/// Rename both target methods and record their declarations.
///
/// # Errors
/// Returns [`crate::Error::StructuralMismatch`] if a target method is missing, declared more
/// than once, has no body, has an unexpected shape, or if its internal name is already taken.
pub fn relocate(class: &mut ClassFile, profile: &TargetProfile) -> Result<Relocated> {
    let mut resolution_index = None;
    let mut access_index = None;

    for (index, method) in class.methods.iter().enumerate() {
        let pool = &class.constant_pool;
        let slot = if pool.utf8_eq(method.name_index, &profile.resolution_method) {
            &mut resolution_index
        } else if pool.utf8_eq(method.name_index, &profile.access_method) {
            &mut access_index
        } else {
            continue;
        };

        if slot.is_some() {
            return Err(Error::StructuralMismatch(format!(
                "Ambiguous method {}",
                pool.utf8_str(method.name_index)?
            )));
        }
        *slot = Some(index);
    }

    let (Some(resolution_index), Some(access_index)) = (resolution_index, access_index) else {
        return Err(Error::StructuralMismatch(format!(
            "No {} or {} found",
            profile.access_method, profile.resolution_method
        )));
    };

    let resolution = relocate_method(class, profile, resolution_index)?;
    check_resolution_shape(&resolution, profile)?;

    let access = relocate_method(class, profile, access_index)?;
    check_access_shape(&access)?;

    Ok(Relocated { resolution, access })
}

fn relocate_method(
    class: &mut ClassFile,
    profile: &TargetProfile,
    index: usize,
) -> Result<MethodSignatureRecord> {
    let method = &class.methods[index];
    let pool = &class.constant_pool;

    let name = pool.utf8_str(method.name_index)?;
    if method.access.is_bodiless() || method.code(pool)?.is_none() {
        return Err(Error::StructuralMismatch(format!(
            "{name} has no code to relocate"
        )));
    }

    let record = MethodSignatureRecord {
        access: method.access,
        descriptor: pool.utf8_str(method.descriptor_index)?,
        signature: method
            .signature_index(pool)?
            .map(|index| pool.utf8_str(index))
            .transpose()?,
        exceptions: method
            .exception_indices(pool)?
            .into_iter()
            .map(|index| pool.class_name(index))
            .collect::<Result<Vec<_>>>()?,
        name,
    };

    let internal = profile.internal(&record.name);
    if find_unique_method(class, &internal)?.is_some() {
        return Err(Error::StructuralMismatch(format!(
            "{internal} already exists, class was rewritten before"
        )));
    }

    let name_index = class.constant_pool.utf8(&internal)?;
    class.methods[index].name_index = name_index;
    log::debug!(
        "Relocated {}{} to {}",
        record.name,
        record.descriptor,
        internal
    );

    Ok(record)
}

fn check_resolution_shape(record: &MethodSignatureRecord, profile: &TargetProfile) -> Result<()> {
    let descriptor = MethodDescriptor::parse(&record.descriptor)?;

    if !record.is_static() {
        return Err(Error::StructuralMismatch(format!(
            "{} must be static",
            record.name
        )));
    }
    if descriptor.ret != Some(FieldType::Object(profile.class_name.clone())) {
        return Err(Error::StructuralMismatch(format!(
            "{}{} must return {}",
            record.name, record.descriptor, profile.class_name
        )));
    }
    if base_name_slot(&descriptor, 0).is_none() {
        return Err(Error::StructuralMismatch(format!(
            "{}{} takes no base name",
            record.name, record.descriptor
        )));
    }
    Ok(())
}

fn check_access_shape(record: &MethodSignatureRecord) -> Result<()> {
    let descriptor = MethodDescriptor::parse(&record.descriptor)?;

    if record.is_static() {
        return Err(Error::StructuralMismatch(format!(
            "{} must be an instance method",
            record.name
        )));
    }
    if !descriptor.ret.as_ref().is_some_and(FieldType::is_reference) {
        return Err(Error::StructuralMismatch(format!(
            "{}{} must return a reference",
            record.name, record.descriptor
        )));
    }
    Ok(())
}

/// Local slot of the first `String` parameter.
pub(crate) fn base_name_slot(descriptor: &MethodDescriptor, first_slot: u16) -> Option<u16> {
    descriptor
        .params
        .iter()
        .zip(descriptor.param_slots(first_slot))
        .find(|(param, _)| param.class_name() == Some("java/lang/String"))
        .map(|(_, slot)| slot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{classfile::access::MethodAccess, test::ClassImageBuilder};

    fn class(builder: ClassImageBuilder) -> Result<ClassFile> {
        ClassFile::parse(&builder.build()?)
    }

    #[test]
    fn renames_and_records() -> Result<()> {
        let mut class = class(ClassImageBuilder::bundle())?;
        let relocated = relocate(&mut class, &TargetProfile::default())?;

        assert_eq!(relocated.resolution.name, "getBundleImpl");
        assert!(relocated.resolution.is_static());
        assert_eq!(
            relocated.resolution.exceptions,
            vec!["java/util/MissingResourceException".to_string()]
        );
        assert_eq!(relocated.access.name, "getObject");
        assert_eq!(
            relocated.access.access,
            MethodAccess::PUBLIC | MethodAccess::FINAL
        );
        assert_eq!(relocated.access.signature, None);

        let names: Vec<String> = class
            .methods
            .iter()
            .map(|method| class.method_name(method))
            .collect::<Result<_>>()?;
        assert!(names.contains(&"__agent__getObject".to_string()));
        assert!(names.contains(&"__agent__getBundleImpl".to_string()));
        assert!(!names.contains(&"getObject".to_string()));
        Ok(())
    }

    #[test]
    fn missing_target_is_a_mismatch() -> Result<()> {
        let mut class = class(ClassImageBuilder::bundle().without_resolution_method())?;
        assert!(matches!(
            relocate(&mut class, &TargetProfile::default()),
            Err(Error::StructuralMismatch(_))
        ));
        Ok(())
    }

    #[test]
    fn duplicate_target_is_a_mismatch() -> Result<()> {
        let mut class = class(ClassImageBuilder::bundle().with_duplicate_access_method())?;
        let error = relocate(&mut class, &TargetProfile::default());
        assert!(
            matches!(error, Err(Error::StructuralMismatch(ref message)) if message.contains("getObject"))
        );
        Ok(())
    }

    #[test]
    fn abstract_target_is_a_mismatch() -> Result<()> {
        let mut class = class(ClassImageBuilder::bundle().with_abstract_access_method())?;
        assert!(matches!(
            relocate(&mut class, &TargetProfile::default()),
            Err(Error::StructuralMismatch(_))
        ));
        Ok(())
    }

    #[test]
    fn base_name_slot_skips_wide_parameters() -> Result<()> {
        let descriptor = MethodDescriptor::parse("(JLjava/util/Locale;Ljava/lang/String;)V")?;
        assert_eq!(base_name_slot(&descriptor, 0), Some(3));
        assert_eq!(base_name_slot(&descriptor, 1), Some(4));
        assert_eq!(
            base_name_slot(&MethodDescriptor::parse("(I)V")?, 0),
            None
        );
        Ok(())
    }
}
