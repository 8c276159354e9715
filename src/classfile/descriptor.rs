//! Field and method descriptors (JVMS §4.3).
//!
//! Descriptors drive almost every bookkeeping decision the rewrite makes: how many local
//! variable slots the arguments of a relocated method occupy, which load instruction moves each
//! argument onto the operand stack, the stack effect of an invocation, and the verification
//! types of the implicit initial stack map frame.
//!
//! # Examples
//!
//! ```rust
//! use bundleweave::classfile::descriptor::{FieldType, MethodDescriptor};
//!
//! let descriptor = MethodDescriptor::parse("(Ljava/lang/String;JI[Ljava/lang/Object;)Ljava/lang/Object;")?;
//! assert_eq!(descriptor.params.len(), 4);
//! assert_eq!(descriptor.arg_slots(), 5);
//! assert_eq!(descriptor.ret, Some(FieldType::Object("java/lang/Object".into())));
//! # Ok::<(), bundleweave::Error>(())
//! ```

use std::fmt;

use crate::{Error, Result};

/// The computational category a value is loaded, stored and returned as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// `int` and every sub-int type (`boolean`, `byte`, `char`, `short`)
    Int,
    /// `long`
    Long,
    /// `float`
    Float,
    /// `double`
    Double,
    /// Any object or array reference
    Reference,
}

/// A parsed field type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// `B`
    Byte,
    /// `C`
    Char,
    /// `D`
    Double,
    /// `F`
    Float,
    /// `I`
    Int,
    /// `J`
    Long,
    /// `S`
    Short,
    /// `Z`
    Boolean,
    /// `L<internal name>;`
    Object(String),
    /// `[<component>`, stored as the full array descriptor
    Array(String),
}

impl FieldType {
    /// Parse a complete field descriptor.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidDescriptor`] if the descriptor is empty, malformed, or
    /// has trailing characters.
    pub fn parse(descriptor: &str) -> Result<Self> {
        let (field, rest) = Self::parse_prefix(descriptor)?;
        if !rest.is_empty() {
            return Err(Error::InvalidDescriptor(descriptor.to_string()));
        }
        Ok(field)
    }

    fn parse_prefix(input: &str) -> Result<(Self, &str)> {
        let invalid = || Error::InvalidDescriptor(input.to_string());
        let mut chars = input.chars();
        let first = chars.next().ok_or_else(invalid)?;
        let rest = chars.as_str();

        let field = match first {
            'B' => FieldType::Byte,
            'C' => FieldType::Char,
            'D' => FieldType::Double,
            'F' => FieldType::Float,
            'I' => FieldType::Int,
            'J' => FieldType::Long,
            'S' => FieldType::Short,
            'Z' => FieldType::Boolean,
            'L' => {
                let end = rest.find(';').ok_or_else(invalid)?;
                let name = &rest[..end];
                if name.is_empty() {
                    return Err(invalid());
                }
                return Ok((FieldType::Object(name.to_string()), &rest[end + 1..]));
            }
            '[' => {
                let (_, remaining) = Self::parse_prefix(rest)?;
                let consumed = input.len() - remaining.len();
                return Ok((FieldType::Array(input[..consumed].to_string()), remaining));
            }
            _ => return Err(invalid()),
        };
        Ok((field, rest))
    }

    /// Number of local variable / operand stack slots a value of this type occupies.
    #[must_use]
    pub fn slots(&self) -> u16 {
        match self {
            FieldType::Long | FieldType::Double => 2,
            _ => 1,
        }
    }

    /// The computational category of this type.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            FieldType::Long => ValueKind::Long,
            FieldType::Float => ValueKind::Float,
            FieldType::Double => ValueKind::Double,
            FieldType::Object(_) | FieldType::Array(_) => ValueKind::Reference,
            _ => ValueKind::Int,
        }
    }

    /// Returns `true` for object and array types.
    #[must_use]
    pub fn is_reference(&self) -> bool {
        self.kind() == ValueKind::Reference
    }

    /// The name a `CONSTANT_Class` entry uses for this type: the internal name for objects,
    /// the full descriptor for arrays, `None` for primitives.
    #[must_use]
    pub fn class_name(&self) -> Option<&str> {
        match self {
            FieldType::Object(name) | FieldType::Array(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Byte => write!(f, "B"),
            FieldType::Char => write!(f, "C"),
            FieldType::Double => write!(f, "D"),
            FieldType::Float => write!(f, "F"),
            FieldType::Int => write!(f, "I"),
            FieldType::Long => write!(f, "J"),
            FieldType::Short => write!(f, "S"),
            FieldType::Boolean => write!(f, "Z"),
            FieldType::Object(name) => write!(f, "L{name};"),
            FieldType::Array(descriptor) => write!(f, "{descriptor}"),
        }
    }
}

/// A parsed method descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    /// Parameter types in declaration order
    pub params: Vec<FieldType>,
    /// Return type, `None` for `void`
    pub ret: Option<FieldType>,
}

impl MethodDescriptor {
    /// Parse a method descriptor such as `(Ljava/lang/String;)Ljava/lang/Object;`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidDescriptor`] if the descriptor is malformed.
    pub fn parse(descriptor: &str) -> Result<Self> {
        let invalid = || Error::InvalidDescriptor(descriptor.to_string());

        let mut rest = descriptor.strip_prefix('(').ok_or_else(invalid)?;
        let mut params = Vec::new();
        while !rest.starts_with(')') {
            if rest.is_empty() {
                return Err(invalid());
            }
            let (param, remaining) = FieldType::parse_prefix(rest).map_err(|_| invalid())?;
            params.push(param);
            rest = remaining;
        }

        let ret = match &rest[1..] {
            "V" => None,
            other => Some(FieldType::parse(other).map_err(|_| invalid())?),
        };
        Ok(MethodDescriptor { params, ret })
    }

    /// Total number of local variable slots taken by the parameters (excluding `this`).
    #[must_use]
    pub fn arg_slots(&self) -> u16 {
        self.params.iter().map(FieldType::slots).sum()
    }

    /// Number of operand stack slots the return value occupies.
    #[must_use]
    pub fn ret_slots(&self) -> u16 {
        self.ret.as_ref().map_or(0, FieldType::slots)
    }

    /// Local variable slot of every parameter, given the slot of the first one.
    #[must_use]
    pub fn param_slots(&self, first_slot: u16) -> Vec<u16> {
        let mut slot = first_slot;
        self.params
            .iter()
            .map(|param| {
                let current = slot;
                slot += param.slots();
                current
            })
            .collect()
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for param in &self.params {
            write!(f, "{param}")?;
        }
        write!(f, ")")?;
        match &self.ret {
            Some(ret) => write!(f, "{ret}"),
            None => write!(f, "V"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bundle_resolution_descriptor() -> Result<()> {
        let raw = "(Ljava/lang/String;Ljava/util/Locale;Ljava/lang/ClassLoader;Ljava/util/ResourceBundle$Control;)Ljava/util/ResourceBundle;";
        let descriptor = MethodDescriptor::parse(raw)?;

        assert_eq!(descriptor.params.len(), 4);
        assert_eq!(
            descriptor.params[0],
            FieldType::Object("java/lang/String".to_string())
        );
        assert_eq!(descriptor.arg_slots(), 4);
        assert_eq!(descriptor.to_string(), raw);
        Ok(())
    }

    #[test]
    fn wide_types_take_two_slots() -> Result<()> {
        let descriptor = MethodDescriptor::parse("(JIDZ)V")?;
        assert_eq!(descriptor.arg_slots(), 6);
        assert_eq!(descriptor.param_slots(1), vec![1, 3, 4, 6]);
        assert_eq!(descriptor.ret, None);
        assert_eq!(descriptor.ret_slots(), 0);
        Ok(())
    }

    #[test]
    fn arrays_keep_full_descriptor() -> Result<()> {
        let field = FieldType::parse("[[Ljava/lang/String;")?;
        assert_eq!(field, FieldType::Array("[[Ljava/lang/String;".to_string()));
        assert_eq!(field.class_name(), Some("[[Ljava/lang/String;"));
        assert!(field.is_reference());
        assert_eq!(FieldType::parse("[I")?.kind(), ValueKind::Reference);
        Ok(())
    }

    #[test]
    fn rejects_malformed_descriptors() {
        for bad in ["", "X", "L;", "Ljava/lang/String", "II", "[", "(I", "I)V", "(I)", "(I)VV"] {
            assert!(
                MethodDescriptor::parse(bad).is_err() || FieldType::parse(bad).is_err(),
                "{bad} should be rejected"
            );
        }
        assert!(MethodDescriptor::parse("(I)").is_err());
        assert!(FieldType::parse("II").is_err());
    }
}
