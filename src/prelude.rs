//! # bundleweave Prelude
//!
//! The types needed to rewrite a class image or to run the agent, importable with one glob.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all bundleweave operations
pub use crate::Error;

/// The result type used throughout bundleweave
pub use crate::Result;

/// Low-level parsing cursor
pub use crate::Parser;

// ================================================================================================
// Configuration
// ================================================================================================

pub use crate::config::{AgentArgs, TransformConfig, DEFAULT_EXCLUDES, DEFAULT_PATTERN};

// ================================================================================================
// Class Files and Bytecode
// ================================================================================================

pub use crate::classfile::{
    access::{ClassAccess, FieldAccess, MethodAccess},
    code::CodeAttribute,
    constpool::ConstantPool,
    ClassFile,
};

pub use crate::assembly::{decode_stream, Instruction, MethodBuilder};

// ================================================================================================
// Rewriting
// ================================================================================================

pub use crate::rewrite::{
    MethodSignatureRecord, RewriteEngine, RewriteReport, StaticInit, TargetProfile,
};

// ================================================================================================
// Agent
// ================================================================================================

pub use crate::agent::{
    premain, ClassFileTransformer, DiagnosticSink, Instrumentation, StdoutSink, TransformGate,
    TransformerRegistry,
};

// ================================================================================================
// Interception
// ================================================================================================

pub use crate::intercept::{FilterSet, Instrumented, Interceptable, Value};
