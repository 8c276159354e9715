//! The class rewrite engine.
//!
//! [`RewriteEngine`] turns the class file image of the target type into an instrumented image.
//! The steps run in a fixed order over an owned copy of the parsed class; the input image is
//! never modified:
//!
//! 1. [`relocation`] - rename the resolution and access methods under [`INTERNAL_PREFIX`] and
//!    record their signatures
//! 2. [`fields`] - add the two static filter fields and the instance flag
//! 3. [`clinit`] - assign the filter fields at the start of the static initializer, creating
//!    one if the class has none
//! 4. [`helpers`] - synthesize the matching, inclusion and formatting methods
//! 5. [`delegation`] - regenerate both methods under their original names as delegates
//! 6. [`validation`] - decode every generated body and check branch targets and frames
//!
//! Any failure aborts the whole rewrite; callers keep the original image.
//!
//! # Examples
//!
//! ```rust,no_run
//! use bundleweave::{config::TransformConfig, rewrite::RewriteEngine};
//!
//! let image = std::fs::read("ResourceBundle.class")?;
//! let engine = RewriteEngine::new(TransformConfig::default().with_includes(["com.acme."]));
//!
//! let (rewritten, report) = engine.rewrite(&image)?;
//! println!("{report}");
//! assert!(rewritten.len() > image.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod clinit;
pub mod delegation;
pub mod fields;
pub mod helpers;
pub mod relocation;
pub mod validation;

use std::fmt;

use strum::Display;

use crate::{
    classfile::{
        access::MethodAccess, code::CodeAttribute, constpool::ConstantPool, Attribute, ClassFile,
        MethodInfo,
    },
    config::TransformConfig,
    file::io::push_be,
    Error, Result,
};

/// Name prefix of every member the engine adds or renames.
pub const INTERNAL_PREFIX: &str = "__agent__";

/// The type the engine rewrites and the members it relies on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetProfile {
    /// Internal name of the target class
    pub class_name: String,
    /// Static method resolving a bundle instance, its first `String` parameter is the base name
    pub resolution_method: String,
    /// Instance method returning a resource value
    pub access_method: String,
    /// Accessor of the bundle locale, `()Ljava/util/Locale;`
    pub locale_accessor: String,
    /// Accessor of the bundle base name, `()Ljava/lang/String;`
    pub base_name_accessor: String,
    /// Prefix of renamed and synthesized members
    pub prefix: String,
}

impl TargetProfile {
    /// `java/util/ResourceBundle`: `getBundleImpl` and `getObject`.
    #[must_use]
    pub fn resource_bundle() -> Self {
        TargetProfile {
            class_name: "java/util/ResourceBundle".to_string(),
            resolution_method: "getBundleImpl".to_string(),
            access_method: "getObject".to_string(),
            locale_accessor: "getLocale".to_string(),
            base_name_accessor: "getBaseBundleName".to_string(),
            prefix: INTERNAL_PREFIX.to_string(),
        }
    }

    /// Name of an engine-owned member.
    #[must_use]
    pub fn internal(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    /// Class name with dots, as reported to users.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.class_name.replace('/', ".")
    }

    /// Unqualified class name.
    #[must_use]
    pub fn simple_name(&self) -> &str {
        self.class_name
            .rsplit('/')
            .next()
            .unwrap_or(&self.class_name)
    }
}

impl Default for TargetProfile {
    fn default() -> Self {
        Self::resource_bundle()
    }
}

/// Declaration of a relocated method, captured before it was renamed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignatureRecord {
    /// Access flags
    pub access: MethodAccess,
    /// Original name
    pub name: String,
    /// Method descriptor
    pub descriptor: String,
    /// Generic signature (`Signature` attribute)
    pub signature: Option<String>,
    /// Internal names of the declared exceptions (`Exceptions` attribute)
    pub exceptions: Vec<String>,
}

impl MethodSignatureRecord {
    /// Returns `true` for static methods.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.access.contains(MethodAccess::STATIC)
    }

    /// `Signature` and `Exceptions` attributes re-declaring this record on a new method.
    pub(crate) fn declaration_attributes(&self, pool: &mut ConstantPool) -> Result<Vec<Attribute>> {
        let mut attributes = Vec::new();

        if let Some(signature) = &self.signature {
            let mut info = Vec::with_capacity(2);
            push_be(&mut info, pool.utf8(signature)?);
            attributes.push(Attribute {
                name_index: pool.utf8("Signature")?,
                info,
            });
        }

        if !self.exceptions.is_empty() {
            let count = u16::try_from(self.exceptions.len())
                .map_err(|_| malformed_error!("Too many declared exceptions"))?;
            let mut info = Vec::with_capacity(2 + 2 * self.exceptions.len());
            push_be(&mut info, count);
            for exception in &self.exceptions {
                push_be(&mut info, pool.class(exception)?);
            }
            attributes.push(Attribute {
                name_index: pool.utf8("Exceptions")?,
                info,
            });
        }

        Ok(attributes)
    }
}

/// How the static filter fields get assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum StaticInit {
    /// The existing static initializer was prefixed
    #[strum(serialize = "augmented")]
    Augmented,
    /// A static initializer was added
    #[strum(serialize = "created")]
    Created,
}

/// What a rewrite changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteReport {
    /// Internal name of the rewritten class
    pub class_name: String,
    /// Signatures of the relocated methods, resolution method first
    pub relocated: Vec<MethodSignatureRecord>,
    /// Names of the added fields
    pub injected_fields: Vec<String>,
    /// Names of the added methods, delegates included
    pub synthesized_methods: Vec<String>,
    /// Static initializer handling
    pub static_init: StaticInit,
    /// Size of the input image
    pub original_size: usize,
    /// Size of the output image
    pub rewritten_size: usize,
}

impl fmt::Display for RewriteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: relocated [{}], {} fields, {} methods, static initializer {}, {} -> {} bytes",
            self.class_name,
            self.relocated
                .iter()
                .map(|record| record.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            self.injected_fields.len(),
            self.synthesized_methods.len(),
            self.static_init,
            self.original_size,
            self.rewritten_size
        )
    }
}

/// Rewrites the target class according to a [`TransformConfig`].
///
/// The engine holds no mutable state: one instance can rewrite any number of images, from
/// any number of threads.
#[derive(Debug, Clone)]
pub struct RewriteEngine {
    config: TransformConfig,
    profile: TargetProfile,
}

impl RewriteEngine {
    /// Engine for `java/util/ResourceBundle`.
    #[must_use]
    pub fn new(config: TransformConfig) -> Self {
        Self::with_profile(config, TargetProfile::default())
    }

    /// Engine for a custom target profile.
    #[must_use]
    pub fn with_profile(config: TransformConfig, profile: TargetProfile) -> Self {
        RewriteEngine { config, profile }
    }

    /// The configuration baked into rewritten images.
    #[must_use]
    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    /// The target profile.
    #[must_use]
    pub fn profile(&self) -> &TargetProfile {
        &self.profile
    }

    /// Rewrite `image`, returning the new image only.
    ///
    /// # Errors
    /// See [`RewriteEngine::rewrite`].
    pub fn transform(&self, image: &[u8]) -> Result<Vec<u8>> {
        self.rewrite(image).map(|(rewritten, _)| rewritten)
    }

    /// Rewrite `image`.
    ///
    /// # Errors
    /// - [`crate::Error::StructuralMismatch`] if the image is not the target class, a target
    ///   method is missing, duplicated or has an unexpected shape, or the class was already
    ///   rewritten
    /// - [`crate::Error::Verification`] if generated code fails the final checks
    /// - any parse or encoding error of the class file
    pub fn rewrite(&self, image: &[u8]) -> Result<(Vec<u8>, RewriteReport)> {
        let mut class = ClassFile::parse(image)?;

        let class_name = class.this_class_name()?;
        if class_name != self.profile.class_name {
            return Err(Error::StructuralMismatch(format!(
                "expected {}, got {}",
                self.profile.class_name, class_name
            )));
        }
        log::debug!(
            "Rewriting {} (class file version {}.{})",
            class_name,
            class.major_version,
            class.minor_version
        );

        let relocated = relocation::relocate(&mut class, &self.profile)?;
        let injected_fields = fields::inject(&mut class, &self.profile)?;
        let static_init = clinit::inject(&mut class, &self.profile, &self.config)?;

        let mut synthesized_methods = helpers::synthesize(&mut class, &self.profile, &self.config)?;
        synthesized_methods.extend(delegation::generate(&mut class, &self.profile, &relocated)?);

        let mut checked: Vec<&str> = synthesized_methods.iter().map(String::as_str).collect();
        checked.push(clinit::CLINIT);
        validation::verify(&class, &checked)?;

        let rewritten = class.to_bytes()?;
        let report = RewriteReport {
            class_name,
            relocated: vec![relocated.resolution, relocated.access],
            injected_fields,
            synthesized_methods,
            static_init,
            original_size: image.len(),
            rewritten_size: rewritten.len(),
        };
        log::debug!("Rewrote {}", report);

        Ok((rewritten, report))
    }
}

/// Append a method to `class`.
pub(crate) fn add_method(
    class: &mut ClassFile,
    access: MethodAccess,
    name: &str,
    descriptor: &str,
    code: &CodeAttribute,
    extra_attributes: Vec<Attribute>,
) -> Result<()> {
    let pool = &mut class.constant_pool;
    let mut method = MethodInfo {
        access,
        name_index: pool.utf8(name)?,
        descriptor_index: pool.utf8(descriptor)?,
        attributes: Vec::new(),
    };
    method.set_code(pool, code)?;
    method.attributes.extend(extra_attributes);

    log::trace!(
        "Added method {}{} ({} bytes of code)",
        name,
        descriptor,
        code.code.len()
    );
    class.methods.push(method);
    Ok(())
}

/// Position of the method named `name`, failing if there is more than one.
pub(crate) fn find_unique_method(class: &ClassFile, name: &str) -> Result<Option<usize>> {
    let mut found = None;
    for (index, method) in class.methods.iter().enumerate() {
        if class.constant_pool.utf8_eq(method.name_index, name) {
            if found.is_some() {
                return Err(Error::StructuralMismatch(format!("Ambiguous method {name}")));
            }
            found = Some(index);
        }
    }
    Ok(found)
}
