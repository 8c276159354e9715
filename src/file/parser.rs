//! Low-level byte stream parser for class file images and bytecode.
//!
//! This module provides the [`crate::file::parser::Parser`] type, a cursor-based binary data
//! parser used by every reader in the crate: the constant pool, member tables, attributes,
//! stack map frames and the bytecode decoder. All reads are bounds-checked and big-endian.
//!
//! # Key Components
//!
//! ## Navigation Methods
//! - [`crate::file::parser::Parser::seek`] - Move to specific position
//! - [`crate::file::parser::Parser::advance_by`] - Move forward by specified bytes
//! - [`crate::file::parser::Parser::pos`] - Get current position
//! - [`crate::file::parser::Parser::align`] - Align to byte boundaries (switch padding)
//!
//! ## Data Access Methods
//! - [`crate::file::parser::Parser::read_be`] - Read primitive types
//! - [`crate::file::parser::Parser::read_bytes`] - Borrow a slice of the underlying data
//! - [`crate::file::parser::Parser::peek_byte`] - Peek at current byte without advancing
//!
//! # Usage Examples
//!
//! ```rust
//! use bundleweave::Parser;
//!
//! let data = [0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x00, 0x00, 0x34];
//! let mut parser = Parser::new(&data);
//!
//! let magic = parser.read_be::<u32>()?;
//! assert_eq!(magic, 0xCAFE_BABE);
//!
//! parser.seek(6)?;
//! assert_eq!(parser.read_be::<u16>()?, 52);
//! assert!(!parser.has_more_data());
//! # Ok::<(), bundleweave::Error>(())
//! ```

use crate::{
    file::io::{read_be_at, ClassIO},
    Result,
};

/// A generic binary data parser for reading class file structures.
///
/// `Parser` provides a cursor-based interface over a borrowed byte slice. It maintains an
/// internal position and checks bounds on every access so truncated or malformed images
/// surface as [`crate::Error::OutOfBounds`] instead of panics.
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`crate::file::parser::Parser`] from a byte slice.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bundleweave::Parser;
    /// let data = [0x01, 0x02, 0x03, 0x04];
    /// let parser = Parser::new(&data);
    /// assert_eq!(parser.len(), 4);
    /// ```
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if there is more data available to parse.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Number of bytes left between the current position and the end of the buffer.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Move the current position to the specified index.
    ///
    /// Seeking to exactly the end of the buffer is allowed; any read from there fails.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if position is beyond the data length.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        self.position = pos;
        Ok(())
    }

    /// Move the position forward by the specified number of bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if advancing by step would exceed the data length.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        match self.position.checked_add(step) {
            Some(end) if end <= self.data.len() => {
                self.position = end;
                Ok(())
            }
            _ => Err(out_of_bounds_error!()),
        }
    }

    /// Get the current position of the parser within the data buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Peek at the next byte without advancing the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if position is at or beyond the data length.
    pub fn peek_byte(&self) -> Result<u8> {
        self.data
            .get(self.position)
            .copied()
            .ok_or_else(|| out_of_bounds_error!())
    }

    /// Align the position to a specific boundary, relative to the start of the buffer.
    ///
    /// `tableswitch` and `lookupswitch` pad their operands to a 4-byte boundary measured from
    /// the first byte of the method body, which is why decoders create one parser per body.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if aligning would exceed the data length.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bundleweave::Parser;
    /// let data = [0u8; 8];
    /// let mut parser = Parser::new(&data);
    ///
    /// parser.advance_by(1)?;
    /// parser.align(4)?;
    /// assert_eq!(parser.pos(), 4);
    /// # Ok::<(), bundleweave::Error>(())
    /// ```
    pub fn align(&mut self, alignment: usize) -> Result<()> {
        let padding = (alignment - (self.position % alignment)) % alignment;
        self.advance_by(padding)
    }

    /// Read a type `T` from the current position in big-endian format and advance the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length.
    pub fn read_be<T: ClassIO>(&mut self) -> Result<T> {
        read_be_at::<T>(self.data, &mut self.position)
    }

    /// Read `length` bytes and return them as a borrowed slice.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `length` bytes remain.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bundleweave::Parser;
    /// let data = [0x01, 0x02, 0x03, 0x04, 0x05];
    /// let mut parser = Parser::new(&data);
    ///
    /// let chunk = parser.read_bytes(3)?;
    /// assert_eq!(chunk, &[0x01, 0x02, 0x03]);
    /// assert_eq!(parser.pos(), 3);
    /// # Ok::<(), bundleweave::Error>(())
    /// ```
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        let start = self.position;
        self.advance_by(length)?;
        Ok(&self.data[start..self.position])
    }

    /// Read a `u2` length followed by that many `u2` values, the layout shared by the
    /// interface table and the `Exceptions` attribute.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the table is truncated.
    pub fn read_u16_table(&mut self) -> Result<Vec<u16>> {
        let count = self.read_be::<u16>()?;
        let mut values = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            values.push(self.read_be::<u16>()?);
        }
        Ok(values)
    }
}
