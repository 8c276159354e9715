//! Byte-level access to class file images.
//!
//! Class file images reach the engine as in-memory buffers handed over by the load hook, so
//! this module only deals with borrowed byte slices:
//!
//! - [`crate::file::parser::Parser`] - Bounds-checked, big-endian cursor used by every reader
//! - [`crate::file::io`] - Free functions for reading and patching big-endian values

pub mod io;
pub mod parser;
