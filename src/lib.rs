#![doc(html_no_source)]
#![deny(missing_docs)]

//! # bundleweave
//!
//! Load-time instrumentation of `java.util.ResourceBundle` class files, in pure Rust.
//!
//! `bundleweave` rewrites the compiled image of the bundle type so every string value it hands
//! out is passed through a configurable template such as `"[$locale] $value"`. Developers see
//! at a glance which texts are localized, for which locale, and which are hard-coded.
//!
//! ## Features
//!
//! - **Class file codec** - Parse and emit JVM class files; untouched parts round-trip byte for byte
//! - **Bytecode assembly** - Decode, encode and label JVM bytecode, with stack map frames
//! - **Rewrite engine** - Relocate the resolution and access methods behind generated delegates
//! - **Agent wiring** - Argument parsing, transform gate and a load hook seam
//! - **Interception** - The same inclusion and formatting policy for Rust-side bundles
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bundleweave::prelude::*;
//!
//! let image = std::fs::read("ResourceBundle.class")?;
//! let config = TransformConfig::default().with_pattern("<$lang> $value");
//!
//! let (rewritten, report) = RewriteEngine::new(config).rewrite(&image)?;
//! println!("{report}");
//! std::fs::write("ResourceBundle.instrumented.class", rewritten)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Agent
//!
//! A host runtime registers the agent through [`agent::premain`] with the raw argument string,
//! e.g. `active=true|pattern=[$base] $value|includes=com.acme.`. Without `active=true` nothing
//! is registered. The [`agent::TransformGate`] never fails a class load: when a rewrite fails
//! the error goes to the diagnostic sink and the original image is kept.
//!
//! ## Logging
//!
//! The engine traces its steps through the [`log`] facade at `debug` and `trace` level. The
//! library never installs a logger.

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;
pub(crate) mod file;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust,no_run
/// use bundleweave::prelude::*;
///
/// let image = std::fs::read("ResourceBundle.class")?;
/// let class = ClassFile::parse(&image)?;
/// println!("{} methods", class.methods.len());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub mod prelude;

/// JVM class file model (JVMS chapter 4).
///
/// # Key Types
///
/// - [`classfile::ClassFile`] - A parsed, editable class file
/// - [`classfile::constpool::ConstantPool`] - Append-only, interning constant pool
/// - [`classfile::code::CodeAttribute`] - A method body with its exception table
/// - [`classfile::stackmap::StackMapTable`] - Verification frames
pub mod classfile;

/// JVM bytecode decoding and encoding.
///
/// - [`assembly::decode_stream`] - Decode a method body
/// - [`assembly::CodeEncoder`] - Emit instructions with labels and stack tracking
/// - [`assembly::MethodBuilder`] - Emit against a constant pool, with stack map frames
///
/// # Examples
///
/// ```rust
/// use bundleweave::{assembly::decode_stream, Parser};
///
/// let bytecode = [0x2A, 0xB0]; // aload_0, areturn
/// let instructions = decode_stream(&mut Parser::new(&bytecode))?;
///
/// assert_eq!(instructions[0].mnemonic, "aload_0");
/// assert_eq!(instructions[1].offset, 1);
/// # Ok::<(), bundleweave::Error>(())
/// ```
pub mod assembly;

/// Agent arguments and the resolved transform configuration.
pub mod config;

/// The class rewrite engine.
pub mod rewrite;

/// Agent entry point, transform gate and load hook seam.
pub mod agent;

/// Inclusion and formatting policy, and trait-level interception for Rust bundles.
pub mod intercept;

/// `bundleweave` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `bundleweave` Error type
///
/// # Examples
///
/// ```rust
/// use bundleweave::{config::TransformConfig, rewrite::RewriteEngine, Error};
///
/// match RewriteEngine::new(TransformConfig::default()).rewrite(&[0xCA, 0xFE]) {
///     Ok(_) => println!("rewritten"),
///     Err(Error::StructuralMismatch(reason)) => println!("unexpected shape: {reason}"),
///     Err(e) => println!("error: {e}"),
/// }
/// ```
pub use error::Error;

/// Bounds-checked big-endian cursor over a byte slice.
pub use file::parser::Parser;
