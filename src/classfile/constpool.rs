//! The class file constant pool (JVMS §4.4).
//!
//! The pool is read once from the original image and then only ever appended to: every index
//! referenced by untouched methods, fields and attributes must stay valid in the rewritten
//! image. New constants are interned, so asking twice for the same `Methodref` yields the same
//! index, and entries that already exist in the original image are reused.
//!
//! # Examples
//!
//! ```rust
//! use bundleweave::classfile::constpool::ConstantPool;
//!
//! let mut pool = ConstantPool::new();
//! let first = pool.method_ref("java/util/Arrays", "asList", "([Ljava/lang/Object;)Ljava/util/List;")?;
//! let again = pool.method_ref("java/util/Arrays", "asList", "([Ljava/lang/Object;)Ljava/util/List;")?;
//! assert_eq!(first, again);
//! let class = pool.class("java/util/Arrays")?;
//! assert_eq!(pool.class_name(class)?, "java/util/Arrays");
//! # Ok::<(), bundleweave::Error>(())
//! ```

use std::collections::HashMap;

use crate::{
    classfile::mutf8,
    file::{io::push_be, parser::Parser},
    Error, Result,
};

/// A single constant pool entry.
///
/// Numeric values keep their raw bit patterns (`Float`/`Double`) so the type can be hashed and
/// compared, which the interning table relies on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    /// `CONSTANT_Utf8`, raw modified UTF-8 bytes
    Utf8(Vec<u8>),
    /// `CONSTANT_Integer`
    Integer(i32),
    /// `CONSTANT_Float`, raw IEEE 754 bits
    Float(u32),
    /// `CONSTANT_Long`, occupies two slots
    Long(i64),
    /// `CONSTANT_Double`, raw IEEE 754 bits, occupies two slots
    Double(u64),
    /// `CONSTANT_Class`, index of the internal name
    Class(u16),
    /// `CONSTANT_String`, index of the UTF-8 contents
    String(u16),
    /// `CONSTANT_Fieldref`
    FieldRef {
        /// Index of the owning `Class`
        class: u16,
        /// Index of the `NameAndType`
        name_and_type: u16,
    },
    /// `CONSTANT_Methodref`
    MethodRef {
        /// Index of the owning `Class`
        class: u16,
        /// Index of the `NameAndType`
        name_and_type: u16,
    },
    /// `CONSTANT_InterfaceMethodref`
    InterfaceMethodRef {
        /// Index of the owning `Class`
        class: u16,
        /// Index of the `NameAndType`
        name_and_type: u16,
    },
    /// `CONSTANT_NameAndType`
    NameAndType {
        /// Index of the member name
        name: u16,
        /// Index of the descriptor
        descriptor: u16,
    },
    /// `CONSTANT_MethodHandle`
    MethodHandle {
        /// Reference kind (1..=9)
        kind: u8,
        /// Index of the referenced member
        reference: u16,
    },
    /// `CONSTANT_MethodType`, index of the descriptor
    MethodType(u16),
    /// `CONSTANT_Dynamic`
    Dynamic {
        /// Index into the `BootstrapMethods` attribute
        bootstrap: u16,
        /// Index of the `NameAndType`
        name_and_type: u16,
    },
    /// `CONSTANT_InvokeDynamic`
    InvokeDynamic {
        /// Index into the `BootstrapMethods` attribute
        bootstrap: u16,
        /// Index of the `NameAndType`
        name_and_type: u16,
    },
    /// `CONSTANT_Module`, index of the module name
    Module(u16),
    /// `CONSTANT_Package`, index of the package name
    Package(u16),
}

impl Constant {
    /// The tag byte written before the entry.
    #[must_use]
    pub fn tag(&self) -> u8 {
        match self {
            Constant::Utf8(_) => 1,
            Constant::Integer(_) => 3,
            Constant::Float(_) => 4,
            Constant::Long(_) => 5,
            Constant::Double(_) => 6,
            Constant::Class(_) => 7,
            Constant::String(_) => 8,
            Constant::FieldRef { .. } => 9,
            Constant::MethodRef { .. } => 10,
            Constant::InterfaceMethodRef { .. } => 11,
            Constant::NameAndType { .. } => 12,
            Constant::MethodHandle { .. } => 15,
            Constant::MethodType(_) => 16,
            Constant::Dynamic { .. } => 17,
            Constant::InvokeDynamic { .. } => 18,
            Constant::Module(_) => 19,
            Constant::Package(_) => 20,
        }
    }

    /// Number of pool slots the entry occupies.
    #[must_use]
    pub fn width(&self) -> u16 {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }

    fn read(parser: &mut Parser<'_>) -> Result<Self> {
        let tag = parser.read_be::<u8>()?;
        let constant = match tag {
            1 => {
                let length = parser.read_be::<u16>()?;
                Constant::Utf8(parser.read_bytes(usize::from(length))?.to_vec())
            }
            3 => Constant::Integer(parser.read_be()?),
            4 => Constant::Float(parser.read_be()?),
            5 => Constant::Long(parser.read_be()?),
            6 => Constant::Double(parser.read_be()?),
            7 => Constant::Class(parser.read_be()?),
            8 => Constant::String(parser.read_be()?),
            9 => Constant::FieldRef {
                class: parser.read_be()?,
                name_and_type: parser.read_be()?,
            },
            10 => Constant::MethodRef {
                class: parser.read_be()?,
                name_and_type: parser.read_be()?,
            },
            11 => Constant::InterfaceMethodRef {
                class: parser.read_be()?,
                name_and_type: parser.read_be()?,
            },
            12 => Constant::NameAndType {
                name: parser.read_be()?,
                descriptor: parser.read_be()?,
            },
            15 => Constant::MethodHandle {
                kind: parser.read_be()?,
                reference: parser.read_be()?,
            },
            16 => Constant::MethodType(parser.read_be()?),
            17 => Constant::Dynamic {
                bootstrap: parser.read_be()?,
                name_and_type: parser.read_be()?,
            },
            18 => Constant::InvokeDynamic {
                bootstrap: parser.read_be()?,
                name_and_type: parser.read_be()?,
            },
            19 => Constant::Module(parser.read_be()?),
            20 => Constant::Package(parser.read_be()?),
            _ => {
                return Err(malformed_error!(
                    "Unknown constant pool tag {} at offset {}",
                    tag,
                    parser.pos() - 1
                ))
            }
        };
        Ok(constant)
    }

    fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        out.push(self.tag());
        match self {
            Constant::Utf8(bytes) => {
                let length = u16::try_from(bytes.len())
                    .map_err(|_| malformed_error!("UTF-8 constant of {} bytes", bytes.len()))?;
                push_be(out, length);
                out.extend_from_slice(bytes);
            }
            Constant::Integer(value) => push_be(out, *value),
            Constant::Float(bits) => push_be(out, *bits),
            Constant::Long(value) => push_be(out, *value),
            Constant::Double(bits) => push_be(out, *bits),
            Constant::Class(index)
            | Constant::String(index)
            | Constant::MethodType(index)
            | Constant::Module(index)
            | Constant::Package(index) => push_be(out, *index),
            Constant::FieldRef {
                class,
                name_and_type,
            }
            | Constant::MethodRef {
                class,
                name_and_type,
            }
            | Constant::InterfaceMethodRef {
                class,
                name_and_type,
            } => {
                push_be(out, *class);
                push_be(out, *name_and_type);
            }
            Constant::NameAndType { name, descriptor } => {
                push_be(out, *name);
                push_be(out, *descriptor);
            }
            Constant::MethodHandle { kind, reference } => {
                push_be(out, *kind);
                push_be(out, *reference);
            }
            Constant::Dynamic {
                bootstrap,
                name_and_type,
            }
            | Constant::InvokeDynamic {
                bootstrap,
                name_and_type,
            } => {
                push_be(out, *bootstrap);
                push_be(out, *name_and_type);
            }
        }
        Ok(())
    }
}

/// Append-only, interning constant pool.
///
/// Slot `0` is never used, and the slot following a `Long` or `Double` is unusable; both are
/// stored as `None`.
#[derive(Debug, Clone)]
pub struct ConstantPool {
    entries: Vec<Option<Constant>>,
    lookup: HashMap<Constant, u16>,
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantPool {
    /// Create an empty pool (count `1`, containing only the reserved slot `0`).
    #[must_use]
    pub fn new() -> Self {
        ConstantPool {
            entries: vec![None],
            lookup: HashMap::new(),
        }
    }

    /// Parse `constant_pool_count` and the entries that follow it.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for unknown tags or a `Long`/`Double` in the last
    /// slot, and [`crate::Error::OutOfBounds`] for truncated data.
    pub fn parse(parser: &mut Parser<'_>) -> Result<Self> {
        let count = parser.read_be::<u16>()?;
        if count == 0 {
            return Err(malformed_error!("Constant pool count of 0"));
        }

        let mut pool = ConstantPool {
            entries: Vec::with_capacity(usize::from(count)),
            lookup: HashMap::new(),
        };
        pool.entries.push(None);

        let mut index = 1_u16;
        while index < count {
            let constant = Constant::read(parser)?;
            let width = constant.width();
            if index + width > count {
                return Err(malformed_error!(
                    "Two-slot constant at #{} overflows pool count {}",
                    index,
                    count
                ));
            }

            pool.lookup.entry(constant.clone()).or_insert(index);
            pool.entries.push(Some(constant));
            if width == 2 {
                pool.entries.push(None);
            }
            index += width;
        }

        Ok(pool)
    }

    /// Emit `constant_pool_count` followed by every entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::ConstantPoolOverflow`] if the pool no longer fits a `u2` count.
    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        push_be(out, self.count()?);
        for constant in self.entries.iter().flatten() {
            constant.write(out)?;
        }
        Ok(())
    }

    /// The `constant_pool_count` value: one more than the highest valid index.
    ///
    /// # Errors
    /// Returns [`crate::Error::ConstantPoolOverflow`] if it exceeds `u16::MAX`.
    pub fn count(&self) -> Result<u16> {
        u16::try_from(self.entries.len()).map_err(|_| Error::ConstantPoolOverflow)
    }

    /// Returns the entry at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidConstant`] for slot `0`, unusable slots and indices past the end.
    pub fn get(&self, index: u16) -> Result<&Constant> {
        self.entries
            .get(usize::from(index))
            .and_then(Option::as_ref)
            .ok_or(Error::InvalidConstant {
                index,
                expected: "any constant",
            })
    }

    /// Iterate over `(index, constant)` pairs of all usable slots.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Constant)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                entry
                    .as_ref()
                    .and_then(|constant| u16::try_from(index).ok().map(|index| (index, constant)))
            })
    }

    /// Raw bytes of the `Utf8` entry at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidConstant`] if the entry is not a `Utf8`.
    pub fn utf8_bytes(&self, index: u16) -> Result<&[u8]> {
        match self.get(index) {
            Ok(Constant::Utf8(bytes)) => Ok(bytes),
            _ => Err(Error::InvalidConstant {
                index,
                expected: "Utf8",
            }),
        }
    }

    /// Decoded contents of the `Utf8` entry at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidConstant`] if the entry is not a `Utf8`, or
    /// [`crate::Error::Malformed`] if it does not decode.
    pub fn utf8_str(&self, index: u16) -> Result<String> {
        mutf8::decode(self.utf8_bytes(index)?)
    }

    /// Returns `true` if the `Utf8` entry at `index` equals `value`.
    ///
    /// Comparison happens on encoded bytes, so no decoding is needed.
    #[must_use]
    pub fn utf8_eq(&self, index: u16, value: &str) -> bool {
        self.utf8_bytes(index)
            .is_ok_and(|bytes| bytes == mutf8::encode(value).as_slice())
    }

    /// Internal name of the `Class` entry at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidConstant`] if the entry is not a `Class`.
    pub fn class_name(&self, index: u16) -> Result<String> {
        match self.get(index) {
            Ok(Constant::Class(name)) => self.utf8_str(*name),
            _ => Err(Error::InvalidConstant {
                index,
                expected: "Class",
            }),
        }
    }

    /// Append `constant`, or return the index of an equal entry already in the pool.
    ///
    /// # Errors
    /// Returns [`crate::Error::ConstantPoolOverflow`] when the pool is full.
    pub fn add(&mut self, constant: Constant) -> Result<u16> {
        if let Some(index) = self.lookup.get(&constant) {
            return Ok(*index);
        }

        let index = u16::try_from(self.entries.len()).map_err(|_| Error::ConstantPoolOverflow)?;
        let width = constant.width();
        if usize::from(index) + usize::from(width) > usize::from(u16::MAX) {
            return Err(Error::ConstantPoolOverflow);
        }

        self.lookup.insert(constant.clone(), index);
        self.entries.push(Some(constant));
        if width == 2 {
            self.entries.push(None);
        }
        Ok(index)
    }

    /// Intern a `Utf8` entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::ConstantPoolOverflow`] when the pool is full.
    pub fn utf8(&mut self, value: &str) -> Result<u16> {
        self.add(Constant::Utf8(mutf8::encode(value)))
    }

    /// Intern a `Class` entry for an internal name or array descriptor.
    ///
    /// # Errors
    /// Returns [`crate::Error::ConstantPoolOverflow`] when the pool is full.
    pub fn class(&mut self, internal_name: &str) -> Result<u16> {
        let name = self.utf8(internal_name)?;
        self.add(Constant::Class(name))
    }

    /// Intern a `String` entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::ConstantPoolOverflow`] when the pool is full.
    pub fn string(&mut self, value: &str) -> Result<u16> {
        let contents = self.utf8(value)?;
        self.add(Constant::String(contents))
    }

    /// Intern an `Integer` entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::ConstantPoolOverflow`] when the pool is full.
    pub fn integer(&mut self, value: i32) -> Result<u16> {
        self.add(Constant::Integer(value))
    }

    /// Intern a `NameAndType` entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::ConstantPoolOverflow`] when the pool is full.
    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16> {
        let name = self.utf8(name)?;
        let descriptor = self.utf8(descriptor)?;
        self.add(Constant::NameAndType { name, descriptor })
    }

    /// Intern a `Fieldref` entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::ConstantPoolOverflow`] when the pool is full.
    pub fn field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16> {
        let class = self.class(owner)?;
        let name_and_type = self.name_and_type(name, descriptor)?;
        self.add(Constant::FieldRef {
            class,
            name_and_type,
        })
    }

    /// Intern a `Methodref` entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::ConstantPoolOverflow`] when the pool is full.
    pub fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16> {
        let class = self.class(owner)?;
        let name_and_type = self.name_and_type(name, descriptor)?;
        self.add(Constant::MethodRef {
            class,
            name_and_type,
        })
    }

    /// Intern an `InterfaceMethodref` entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::ConstantPoolOverflow`] when the pool is full.
    pub fn interface_method_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<u16> {
        let class = self.class(owner)?;
        let name_and_type = self.name_and_type(name, descriptor)?;
        self.add(Constant::InterfaceMethodRef {
            class,
            name_and_type,
        })
    }
}
