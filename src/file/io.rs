//! Big-endian byte order reading/writing utilities for class file images.
//!
//! Every multi-byte quantity in a class file (JVMS §4.1) is stored in big-endian order. This
//! module provides bounds-checked reads and writes of primitive values, built around the
//! [`crate::file::io::ClassIO`] trait.
//!
//! # Key Components
//!
//! - [`crate::file::io::ClassIO`] - Trait defining endian-aware conversion for primitive types
//! - [`crate::file::io::read_be`] / [`crate::file::io::read_be_at`] - Bounds-checked reads
//! - [`crate::file::io::write_be`] / [`crate::file::io::write_be_at`] - Bounds-checked in-place writes
//!
//! # Examples
//!
//! ```rust
//! use bundleweave::file::io::{read_be_at, write_be_at};
//!
//! let mut data = [0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x00];
//! let mut offset = 0;
//! let magic: u32 = read_be_at(&data, &mut offset)?;
//! assert_eq!(magic, 0xCAFE_BABE);
//!
//! write_be_at(&mut data, &mut offset, 0x0034_u16)?;
//! assert_eq!(&data[4..], &[0x00, 0x34]);
//! # Ok::<(), bundleweave::Error>(())
//! ```

use crate::{Error::OutOfBounds, Result};

/// Trait for primitive types that can be read from and written to a big-endian byte buffer.
///
/// All implementations are pure conversions and carry no state.
pub trait ClassIO: Sized {
    /// Associated type representing the byte array type for this numeric type.
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in big-endian
    fn from_be_bytes(bytes: Self::Bytes) -> Self;

    /// Write T to a byte buffer in big-endian
    fn to_be_bytes(self) -> Self::Bytes;
}

macro_rules! impl_class_io {
    ($($ty:ty => $n:expr),* $(,)?) => {
        $(
            impl ClassIO for $ty {
                type Bytes = [u8; $n];

                fn from_be_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_be_bytes(bytes)
                }

                fn to_be_bytes(self) -> Self::Bytes {
                    <$ty>::to_be_bytes(self)
                }
            }
        )*
    };
}

impl_class_io!(
    u8 => 1,
    i8 => 1,
    u16 => 2,
    i16 => 2,
    u32 => 4,
    i32 => 4,
    u64 => 8,
    i64 => 8,
    f32 => 4,
    f64 => 8,
);

/// Safely reads a value of type `T` in big-endian byte order from the start of a buffer.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_be<T: ClassIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_be_at(data, &mut offset)
}

/// Safely reads a value of type `T` in big-endian byte order at `offset`, advancing the
/// offset by the number of bytes read.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
///
/// # Examples
///
/// ```rust
/// use bundleweave::file::io::read_be_at;
///
/// let data = [0x00, 0x01, 0x00, 0x02];
/// let mut offset = 0;
///
/// let first: u16 = read_be_at(&data, &mut offset)?;
/// assert_eq!(first, 1);
/// let second: u16 = read_be_at(&data, &mut offset)?;
/// assert_eq!(second, 2);
/// assert_eq!(offset, 4);
/// # Ok::<(), bundleweave::Error>(())
/// ```
pub fn read_be_at<T: ClassIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(OutOfBounds);
    };
    if end > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(OutOfBounds);
    };

    *offset = end;

    Ok(T::from_be_bytes(read))
}

/// Writes a value of type `T` in big-endian byte order to the start of a buffer.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the buffer is too small.
pub fn write_be<T: ClassIO>(data: &mut [u8], value: T) -> Result<()> {
    let mut offset = 0_usize;
    write_be_at(data, &mut offset, value)
}

/// Writes a value of type `T` in big-endian byte order at `offset`, advancing the offset by
/// the number of bytes written.
///
/// Used to patch placeholders (branch offsets, attribute lengths) in already emitted buffers.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the buffer is too small.
pub fn write_be_at<T: ClassIO>(data: &mut [u8], offset: &mut usize, value: T) -> Result<()> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(OutOfBounds);
    };
    if end > data.len() {
        return Err(OutOfBounds);
    }

    data[*offset..end].copy_from_slice(value.to_be_bytes().as_ref());
    *offset = end;

    Ok(())
}

/// Appends a value of type `T` in big-endian byte order to a growable buffer.
pub fn push_be<T: ClassIO>(out: &mut Vec<u8>, value: T) {
    out.extend_from_slice(value.to_be_bytes().as_ref());
}
