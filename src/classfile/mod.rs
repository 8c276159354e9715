//! JVM class file model, parser and writer (JVMS chapter 4).
//!
//! [`ClassFile::parse`] turns an image into an owned, editable structure and
//! [`ClassFile::to_bytes`] turns it back into an image. Attributes the engine does not need to
//! understand stay opaque byte blobs keyed by their name index, so parsing and re-emitting an
//! unmodified image reproduces it byte for byte.
//!
//! # Key Components
//!
//! - [`constpool`] - Append-only, interning constant pool
//! - [`access`] - Access flag sets
//! - [`descriptor`] - Field and method descriptors
//! - [`code`] - The `Code` attribute and its exception table
//! - [`stackmap`] - The `StackMapTable` attribute
//! - [`mutf8`] - Modified UTF-8
//!
//! # Examples
//!
//! ```rust,no_run
//! use bundleweave::classfile::ClassFile;
//!
//! let image = std::fs::read("ResourceBundle.class")?;
//! let class = ClassFile::parse(&image)?;
//! println!("{} has {} methods", class.this_class_name()?, class.methods.len());
//! assert_eq!(class.to_bytes()?, image);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod access;
pub mod code;
pub mod constpool;
pub mod descriptor;
pub mod mutf8;
pub mod stackmap;

use crate::{
    classfile::{
        access::{ClassAccess, FieldAccess, MethodAccess},
        code::CodeAttribute,
        constpool::ConstantPool,
    },
    file::{io::push_be, parser::Parser},
    Error, Result,
};

/// The class file magic number.
pub const MAGIC: u32 = 0xCAFE_BABE;

/// Oldest supported major version (JDK 1.1).
pub const MIN_MAJOR_VERSION: u16 = 45;

/// Newest supported major version (Java SE 25).
pub const MAX_MAJOR_VERSION: u16 = 69;

/// First major version whose type checker requires a `StackMapTable` for branch targets.
pub const STACK_MAP_MAJOR_VERSION: u16 = 50;

/// An attribute kept as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Index of the `Utf8` attribute name
    pub name_index: u16,
    /// Attribute body, without the name and length header
    pub info: Vec<u8>,
}

pub(crate) fn read_attributes(parser: &mut Parser<'_>) -> Result<Vec<Attribute>> {
    let count = parser.read_be::<u16>()?;
    let mut attributes = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let name_index = parser.read_be::<u16>()?;
        let length = parser.read_be::<u32>()? as usize;
        let info = parser.read_bytes(length)?.to_vec();
        attributes.push(Attribute { name_index, info });
    }
    Ok(attributes)
}

pub(crate) fn write_attributes(out: &mut Vec<u8>, attributes: &[Attribute]) -> Result<()> {
    let count =
        u16::try_from(attributes.len()).map_err(|_| malformed_error!("Too many attributes"))?;
    push_be(out, count);
    for attribute in attributes {
        let length = u32::try_from(attribute.info.len())
            .map_err(|_| malformed_error!("Attribute body exceeds u32 range"))?;
        push_be(out, attribute.name_index);
        push_be(out, length);
        out.extend_from_slice(&attribute.info);
    }
    Ok(())
}

fn find_attribute<'a>(
    attributes: &'a [Attribute],
    pool: &ConstantPool,
    name: &str,
) -> Option<&'a Attribute> {
    attributes
        .iter()
        .find(|attribute| pool.utf8_eq(attribute.name_index, name))
}

/// A field declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    /// Access flags
    pub access: FieldAccess,
    /// Index of the `Utf8` name
    pub name_index: u16,
    /// Index of the `Utf8` descriptor
    pub descriptor_index: u16,
    /// Field attributes
    pub attributes: Vec<Attribute>,
}

impl FieldInfo {
    fn read(parser: &mut Parser<'_>) -> Result<Self> {
        Ok(FieldInfo {
            access: FieldAccess::from_bits_retain(parser.read_be::<u16>()?),
            name_index: parser.read_be::<u16>()?,
            descriptor_index: parser.read_be::<u16>()?,
            attributes: read_attributes(parser)?,
        })
    }

    fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        push_be(out, self.access.bits());
        push_be(out, self.name_index);
        push_be(out, self.descriptor_index);
        write_attributes(out, &self.attributes)
    }
}

/// A method declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    /// Access flags
    pub access: MethodAccess,
    /// Index of the `Utf8` name
    pub name_index: u16,
    /// Index of the `Utf8` descriptor
    pub descriptor_index: u16,
    /// Method attributes
    pub attributes: Vec<Attribute>,
}

impl MethodInfo {
    fn read(parser: &mut Parser<'_>) -> Result<Self> {
        Ok(MethodInfo {
            access: MethodAccess::from_bits_retain(parser.read_be::<u16>()?),
            name_index: parser.read_be::<u16>()?,
            descriptor_index: parser.read_be::<u16>()?,
            attributes: read_attributes(parser)?,
        })
    }

    fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        push_be(out, self.access.bits());
        push_be(out, self.name_index);
        push_be(out, self.descriptor_index);
        write_attributes(out, &self.attributes)
    }

    /// First attribute named `name`.
    #[must_use]
    pub fn attribute(&self, pool: &ConstantPool, name: &str) -> Option<&Attribute> {
        find_attribute(&self.attributes, pool, name)
    }

    /// Decoded `Code` attribute, `None` for abstract and native methods.
    ///
    /// # Errors
    /// Returns an error if the attribute is present but malformed.
    pub fn code(&self, pool: &ConstantPool) -> Result<Option<CodeAttribute>> {
        self.attribute(pool, "Code")
            .map(|attribute| CodeAttribute::parse(&attribute.info))
            .transpose()
    }

    /// Replace the `Code` attribute, or add one if the method has none.
    ///
    /// # Errors
    /// Returns an error if the body cannot be encoded or the pool overflows.
    pub fn set_code(&mut self, pool: &mut ConstantPool, code: &CodeAttribute) -> Result<()> {
        let info = code.to_bytes()?;
        let name_index = pool.utf8("Code")?;
        match self
            .attributes
            .iter_mut()
            .find(|attribute| attribute.name_index == name_index)
        {
            Some(existing) => existing.info = info,
            None => self.attributes.push(Attribute { name_index, info }),
        }
        Ok(())
    }

    /// Index of the `Utf8` generic signature, if the method carries a `Signature` attribute.
    ///
    /// # Errors
    /// Returns an error if the attribute body is malformed.
    pub fn signature_index(&self, pool: &ConstantPool) -> Result<Option<u16>> {
        self.attribute(pool, "Signature")
            .map(|attribute| {
                let mut parser = Parser::new(&attribute.info);
                parser.read_be::<u16>()
            })
            .transpose()
    }

    /// `Class` indices of the declared exceptions (`Exceptions` attribute).
    ///
    /// # Errors
    /// Returns an error if the attribute body is malformed.
    pub fn exception_indices(&self, pool: &ConstantPool) -> Result<Vec<u16>> {
        match self.attribute(pool, "Exceptions") {
            Some(attribute) => Parser::new(&attribute.info).read_u16_table(),
            None => Ok(Vec::new()),
        }
    }
}

/// A complete, editable class file.
#[derive(Debug, Clone)]
pub struct ClassFile {
    /// Minor version
    pub minor_version: u16,
    /// Major version
    pub major_version: u16,
    /// The constant pool
    pub constant_pool: ConstantPool,
    /// Class access flags
    pub access: ClassAccess,
    /// `Class` index of this class
    pub this_class: u16,
    /// `Class` index of the superclass, `0` only for `java/lang/Object`
    pub super_class: u16,
    /// `Class` indices of directly implemented interfaces
    pub interfaces: Vec<u16>,
    /// Declared fields
    pub fields: Vec<FieldInfo>,
    /// Declared methods
    pub methods: Vec<MethodInfo>,
    /// Class attributes
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    /// Parse a class file image.
    ///
    /// # Errors
    /// - [`crate::Error::Empty`] for an empty image
    /// - [`crate::Error::InvalidMagic`] if the image does not start with `0xCAFEBABE`
    /// - [`crate::Error::UnsupportedVersion`] for versions outside
    ///   [`MIN_MAJOR_VERSION`]..=[`MAX_MAJOR_VERSION`]
    /// - [`crate::Error::Malformed`] / [`crate::Error::OutOfBounds`] for corrupted structure
    ///   or trailing bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::Empty);
        }

        let mut parser = Parser::new(data);
        let magic = parser.read_be::<u32>()?;
        if magic != MAGIC {
            return Err(Error::InvalidMagic(magic));
        }

        let minor_version = parser.read_be::<u16>()?;
        let major_version = parser.read_be::<u16>()?;
        if !(MIN_MAJOR_VERSION..=MAX_MAJOR_VERSION).contains(&major_version) {
            return Err(Error::UnsupportedVersion {
                major: major_version,
                minor: minor_version,
            });
        }

        let constant_pool = ConstantPool::parse(&mut parser)?;
        let access = ClassAccess::from_bits_retain(parser.read_be::<u16>()?);
        let this_class = parser.read_be::<u16>()?;
        let super_class = parser.read_be::<u16>()?;
        let interfaces = parser.read_u16_table()?;

        let field_count = parser.read_be::<u16>()?;
        let fields = (0..field_count)
            .map(|_| FieldInfo::read(&mut parser))
            .collect::<Result<Vec<_>>>()?;

        let method_count = parser.read_be::<u16>()?;
        let methods = (0..method_count)
            .map(|_| MethodInfo::read(&mut parser))
            .collect::<Result<Vec<_>>>()?;

        let attributes = read_attributes(&mut parser)?;
        if parser.has_more_data() {
            return Err(malformed_error!(
                "{} trailing bytes after class file",
                parser.remaining()
            ));
        }

        let class = ClassFile {
            minor_version,
            major_version,
            constant_pool,
            access,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        };
        class.this_class_name()?;
        Ok(class)
    }

    /// Emit the class file image.
    ///
    /// # Errors
    /// Returns an error if a table no longer fits its `u2` count or the pool overflowed.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(4096);
        push_be(&mut out, MAGIC);
        push_be(&mut out, self.minor_version);
        push_be(&mut out, self.major_version);
        self.constant_pool.write(&mut out)?;
        push_be(&mut out, self.access.bits());
        push_be(&mut out, self.this_class);
        push_be(&mut out, self.super_class);

        push_be(&mut out, table_len(self.interfaces.len(), "interfaces")?);
        for interface in &self.interfaces {
            push_be(&mut out, *interface);
        }

        push_be(&mut out, table_len(self.fields.len(), "fields")?);
        for field in &self.fields {
            field.write(&mut out)?;
        }

        push_be(&mut out, table_len(self.methods.len(), "methods")?);
        for method in &self.methods {
            method.write(&mut out)?;
        }

        write_attributes(&mut out, &self.attributes)?;
        Ok(out)
    }

    /// Internal name of this class, e.g. `java/util/ResourceBundle`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidConstant`] if `this_class` is not a `Class` entry.
    pub fn this_class_name(&self) -> Result<String> {
        self.constant_pool.class_name(self.this_class)
    }

    /// Decoded name of a method.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidConstant`] if the name index is not a `Utf8` entry.
    pub fn method_name(&self, method: &MethodInfo) -> Result<String> {
        self.constant_pool.utf8_str(method.name_index)
    }

    /// Decoded descriptor of a method.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidConstant`] if the descriptor index is not a `Utf8` entry.
    pub fn method_descriptor(&self, method: &MethodInfo) -> Result<String> {
        self.constant_pool.utf8_str(method.descriptor_index)
    }

    /// Returns `true` if branch targets of new code need `StackMapTable` frames.
    #[must_use]
    pub fn requires_stack_maps(&self) -> bool {
        self.major_version >= STACK_MAP_MAJOR_VERSION
    }
}

fn table_len(len: usize, what: &str) -> Result<u16> {
    u16::try_from(len).map_err(|_| malformed_error!("Too many {}: {}", what, len))
}
