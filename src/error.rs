use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Errors fall into three groups. Codec errors are raised while reading or writing a class file
/// image, assembly errors while generating bytecode, and rewrite errors when the target type does
/// not have the shape the engine expects. The [`crate::agent::TransformGate`] treats every one of
/// them the same way: the rewrite attempt is discarded and the original image is kept.
///
/// # Error Categories
///
/// ## Class File Parsing Errors
/// - [`Error::Malformed`] - Corrupted or invalid file structure
/// - [`Error::OutOfBounds`] - Attempted to read beyond the end of the image
/// - [`Error::InvalidMagic`] - The image does not start with `0xCAFEBABE`
/// - [`Error::UnsupportedVersion`] - Class file version outside the supported range
/// - [`Error::InvalidConstant`] - A constant pool index points to the wrong kind of entry
/// - [`Error::InvalidDescriptor`] - A field or method descriptor could not be parsed
/// - [`Error::Empty`] - Empty input provided
/// - [`Error::NotSupported`] - Construct the engine does not handle
///
/// ## Bytecode Errors
/// - [`Error::InvalidOpcode`] - Unknown opcode while decoding
/// - [`Error::UndefinedLabel`] / [`Error::DuplicateLabel`] - Label bookkeeping failures
/// - [`Error::InvalidBranch`] - Branch offset or branch instruction misuse
/// - [`Error::StackUnderflow`] - Generated code pops more than it pushed
/// - [`Error::CodeTooLarge`] - Method body exceeds the 65535 byte limit
/// - [`Error::ConstantPoolOverflow`] - More than 65535 constant pool slots required
///
/// ## Rewrite Errors
/// - [`Error::StructuralMismatch`] - Targeted methods missing, duplicated or of unexpected shape
/// - [`Error::Verification`] - Synthesized code failed the post-emit consistency check
///
/// # Examples
///
/// ```rust
/// use bundleweave::{Error, classfile::ClassFile};
///
/// match ClassFile::parse(&[0xDE, 0xAD, 0xBE, 0xEF, 0, 0, 0, 52]) {
///     Ok(_) => println!("parsed"),
///     Err(Error::InvalidMagic(magic)) => println!("not a class file: {magic:#x}"),
///     Err(e) => println!("other error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The image is damaged and could not be parsed.
    ///
    /// The error includes the source location where the malformation was detected for
    /// debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the image.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// The image uses a construct the engine does not handle.
    #[error("This feature is not supported - {0}")]
    NotSupported(String),

    /// The image does not carry the class file magic number.
    #[error("Invalid class file magic - {0:#010x}")]
    InvalidMagic(u32),

    /// The class file version is outside of what the engine knows how to rewrite.
    #[error("Unsupported class file version {major}.{minor}")]
    UnsupportedVersion {
        /// Major version of the rejected image
        major: u16,
        /// Minor version of the rejected image
        minor: u16,
    },

    /// A constant pool index referenced an entry of the wrong kind, or no entry at all.
    #[error("Invalid constant pool entry #{index}, expected {expected}")]
    InvalidConstant {
        /// The offending constant pool index
        index: u16,
        /// Human readable description of the expected entry kind
        expected: &'static str,
    },

    /// More constants were required than a class file can address.
    #[error("Constant pool exceeds 65535 entries")]
    ConstantPoolOverflow,

    /// A field or method descriptor could not be parsed.
    #[error("Invalid descriptor - {0}")]
    InvalidDescriptor(String),

    /// An unknown opcode was encountered while decoding a method body.
    #[error("Invalid opcode {opcode:#04x} at offset {offset}")]
    InvalidOpcode {
        /// The opcode byte
        opcode: u8,
        /// Offset of the opcode within the method body
        offset: usize,
    },

    /// A branch referenced a label which was never defined.
    #[error("Undefined label - {0}")]
    UndefinedLabel(String),

    /// A label was defined twice in the same method body.
    #[error("Duplicate label - {0}")]
    DuplicateLabel(String),

    /// A branch instruction was misused or its offset does not fit the encoding.
    #[error("Invalid branch - {0}")]
    InvalidBranch(String),

    /// Generated code popped more operand stack slots than it had pushed.
    #[error("Stack underflow at offset {offset}: depth {depth}, {pops} slots popped")]
    StackUnderflow {
        /// Offset of the offending instruction
        offset: usize,
        /// Stack depth before the instruction
        depth: u16,
        /// Slots the instruction pops
        pops: u16,
    },

    /// A method body grew beyond the 65535 byte limit of the `Code` attribute.
    #[error("Method body of {0} bytes exceeds the 65535 byte limit")]
    CodeTooLarge(usize),

    /// The target type does not have the shape the rewrite relies on.
    ///
    /// Raised when one of the targeted methods is missing, appears more than once, or has
    /// a shape (static/instance, return type, parameters) the delegates cannot be generated for.
    #[error("Structural mismatch - {0}")]
    StructuralMismatch(String),

    /// Synthesized code failed the post-emit verification metadata check.
    #[error("Verification failed - {0}")]
    Verification(String),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}
