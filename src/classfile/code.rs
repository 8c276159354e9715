//! The `Code` attribute (JVMS §4.7.3).

use crate::{
    classfile::{constpool::ConstantPool, read_attributes, write_attributes, Attribute},
    file::{io::push_be, parser::Parser},
    Error, Result,
};

/// Largest method body the `Code` attribute can describe.
pub const MAX_CODE_LENGTH: usize = 65535;

/// One entry of a method's exception table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionEntry {
    /// Start of the protected range (inclusive)
    pub start_pc: u16,
    /// End of the protected range (exclusive)
    pub end_pc: u16,
    /// Start of the handler
    pub handler_pc: u16,
    /// Caught class, `0` for `finally`-style catch-all handlers
    pub catch_type: u16,
}

/// A decoded `Code` attribute body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeAttribute {
    /// Maximum operand stack depth in slots
    pub max_stack: u16,
    /// Number of local variable slots, including parameters
    pub max_locals: u16,
    /// Raw bytecode
    pub code: Vec<u8>,
    /// Exception handlers in priority order
    pub exception_table: Vec<ExceptionEntry>,
    /// Nested attributes (`LineNumberTable`, `StackMapTable`, ...)
    pub attributes: Vec<Attribute>,
}

impl CodeAttribute {
    /// Decode a `Code` attribute body.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for an empty or oversized body or trailing bytes,
    /// and [`crate::Error::OutOfBounds`] for truncated data.
    pub fn parse(info: &[u8]) -> Result<Self> {
        let mut parser = Parser::new(info);
        let max_stack = parser.read_be::<u16>()?;
        let max_locals = parser.read_be::<u16>()?;

        let code_length = parser.read_be::<u32>()? as usize;
        if code_length == 0 || code_length > MAX_CODE_LENGTH {
            return Err(malformed_error!("Invalid code length {}", code_length));
        }
        let code = parser.read_bytes(code_length)?.to_vec();

        let handler_count = parser.read_be::<u16>()?;
        let mut exception_table = Vec::with_capacity(usize::from(handler_count));
        for _ in 0..handler_count {
            exception_table.push(ExceptionEntry {
                start_pc: parser.read_be::<u16>()?,
                end_pc: parser.read_be::<u16>()?,
                handler_pc: parser.read_be::<u16>()?,
                catch_type: parser.read_be::<u16>()?,
            });
        }

        let attributes = read_attributes(&mut parser)?;
        if parser.has_more_data() {
            return Err(malformed_error!(
                "{} trailing bytes after Code attribute",
                parser.remaining()
            ));
        }

        Ok(CodeAttribute {
            max_stack,
            max_locals,
            code,
            exception_table,
            attributes,
        })
    }

    /// Encode the attribute body.
    ///
    /// # Errors
    /// Returns [`crate::Error::CodeTooLarge`] if the bytecode exceeds [`MAX_CODE_LENGTH`].
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.code.is_empty() {
            return Err(malformed_error!("Empty method body"));
        }
        if self.code.len() > MAX_CODE_LENGTH {
            return Err(Error::CodeTooLarge(self.code.len()));
        }

        let mut out = Vec::with_capacity(self.code.len() + 32);
        push_be(&mut out, self.max_stack);
        push_be(&mut out, self.max_locals);
        push_be(&mut out, self.code.len() as u32);
        out.extend_from_slice(&self.code);

        let handler_count = u16::try_from(self.exception_table.len())
            .map_err(|_| malformed_error!("Too many exception handlers"))?;
        push_be(&mut out, handler_count);
        for entry in &self.exception_table {
            push_be(&mut out, entry.start_pc);
            push_be(&mut out, entry.end_pc);
            push_be(&mut out, entry.handler_pc);
            push_be(&mut out, entry.catch_type);
        }

        write_attributes(&mut out, &self.attributes)?;
        Ok(out)
    }

    /// First nested attribute named `name`.
    #[must_use]
    pub fn attribute(&self, pool: &ConstantPool, name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|attribute| pool.utf8_eq(attribute.name_index, name))
    }

    /// Mutable access to the first nested attribute named `name`.
    pub fn attribute_mut(&mut self, pool: &ConstantPool, name: &str) -> Option<&mut Attribute> {
        self.attributes
            .iter_mut()
            .find(|attribute| pool.utf8_eq(attribute.name_index, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CodeAttribute {
        CodeAttribute {
            max_stack: 2,
            max_locals: 1,
            code: vec![0x2A, 0xB0],
            exception_table: vec![ExceptionEntry {
                start_pc: 0,
                end_pc: 1,
                handler_pc: 1,
                catch_type: 0,
            }],
            attributes: vec![Attribute {
                name_index: 9,
                info: vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x07],
            }],
        }
    }

    #[test]
    fn body_roundtrip() -> Result<()> {
        let code = sample();
        let bytes = code.to_bytes()?;
        assert_eq!(&bytes[..8], &[0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x00, 0x02]);
        assert_eq!(CodeAttribute::parse(&bytes)?, code);
        Ok(())
    }

    #[test]
    fn rejects_empty_and_truncated_bodies() -> Result<()> {
        let mut code = sample();
        code.code.clear();
        assert!(code.to_bytes().is_err());

        let bytes = sample().to_bytes()?;
        assert!(CodeAttribute::parse(&bytes[..bytes.len() - 1]).is_err());
        assert!(CodeAttribute::parse(&[0, 1, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0]).is_err());
        Ok(())
    }

    #[test]
    fn oversized_body_is_rejected() {
        let mut code = sample();
        code.code = vec![0x00; MAX_CODE_LENGTH + 1];
        assert!(matches!(code.to_bytes(), Err(Error::CodeTooLarge(_))));
    }
}
