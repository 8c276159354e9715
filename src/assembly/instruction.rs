//! JVM instruction metadata and the decoded [`Instruction`] type.
//!
//! [`INSTRUCTIONS`] is indexed by opcode and describes, for every defined instruction, its
//! mnemonic, operand layout, control flow behavior and operand stack effect. The decoder and the
//! encoder share this table so both directions agree on every instruction's shape.
//!
//! Stack effects are counted in slots: `long` and `double` values take two. Instructions whose
//! effect depends on a descriptor (field access, invocations, `multianewarray`) are marked
//! [`StackEffect::Variable`] and have their effect supplied by the caller when emitted.
//!
//! # Examples
//!
//! ```rust
//! use bundleweave::assembly::{opcodes, FlowType, StackEffect, INSTRUCTIONS};
//!
//! let ladd = &INSTRUCTIONS[usize::from(opcodes::LADD)];
//! assert_eq!(ladd.mnemonic, "ladd");
//! assert_eq!(ladd.stack, StackEffect::Fixed { pops: 4, pushes: 2 });
//! assert_eq!(INSTRUCTIONS[usize::from(opcodes::IFNULL)].flow, FlowType::ConditionalBranch);
//! ```

use crate::assembly::opcodes;

/// Operand layout of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
    /// No operand
    None,
    /// Unsigned byte (`newarray` element type)
    UInt8,
    /// Signed byte (`bipush`)
    Int8,
    /// Signed short (`sipush`)
    Int16,
    /// One byte constant pool index (`ldc`)
    ConstantU8,
    /// Two byte constant pool index
    Constant,
    /// Local variable index, one byte or two under `wide`
    Local,
    /// `iinc` local index and signed increment
    Iinc,
    /// Signed 16-bit branch offset
    Branch16,
    /// Signed 32-bit branch offset
    Branch32,
    /// `invokeinterface`: constant index, argument count, zero byte
    Interface,
    /// `invokedynamic`: constant index, two zero bytes
    Dynamic,
    /// `multianewarray`: constant index, dimensions
    MultiArray,
    /// Padded `tableswitch` body
    TableSwitch,
    /// Padded `lookupswitch` body
    LookupSwitch,
    /// `wide` prefix followed by the modified instruction
    Wide,
}

/// How an instruction affects control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Execution continues with the next instruction
    Sequential,
    /// Branches or falls through
    ConditionalBranch,
    /// Always branches
    UnconditionalBranch,
    /// Multi-way branch (`tableswitch`, `lookupswitch`)
    Switch,
    /// Method invocation
    Call,
    /// Returns from the method
    Return,
    /// Throws an exception
    Throw,
    /// Jumps to a subroutine (`jsr`, `jsr_w`)
    Subroutine,
    /// Returns from a subroutine (`ret`)
    SubroutineReturn,
}

/// Operand stack effect of an instruction, in slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackEffect {
    /// Known from the opcode alone
    Fixed {
        /// Slots popped
        pops: u8,
        /// Slots pushed
        pushes: u8,
    },
    /// Depends on a descriptor referenced by the operand
    Variable,
}

/// Static description of one opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JvmInstruction {
    /// Mnemonic, empty for undefined opcodes
    pub mnemonic: &'static str,
    /// Operand layout
    pub op_type: OperandType,
    /// Control flow behavior
    pub flow: FlowType,
    /// Operand stack effect
    pub stack: StackEffect,
}

impl JvmInstruction {
    /// Returns `true` for opcodes the class file format does not define.
    #[must_use]
    pub fn is_undefined(&self) -> bool {
        self.mnemonic.is_empty()
    }
}

const UNDEFINED: JvmInstruction = JvmInstruction {
    mnemonic: "",
    op_type: OperandType::None,
    flow: FlowType::Sequential,
    stack: StackEffect::Fixed { pops: 0, pushes: 0 },
};

const fn op(
    mnemonic: &'static str,
    op_type: OperandType,
    flow: FlowType,
    pops: u8,
    pushes: u8,
) -> JvmInstruction {
    JvmInstruction {
        mnemonic,
        op_type,
        flow,
        stack: StackEffect::Fixed { pops, pushes },
    }
}

const fn simple(mnemonic: &'static str, pops: u8, pushes: u8) -> JvmInstruction {
    op(mnemonic, OperandType::None, FlowType::Sequential, pops, pushes)
}

const fn variable(mnemonic: &'static str, op_type: OperandType, flow: FlowType) -> JvmInstruction {
    JvmInstruction {
        mnemonic,
        op_type,
        flow,
        stack: StackEffect::Variable,
    }
}

const fn branch(mnemonic: &'static str, pops: u8) -> JvmInstruction {
    op(mnemonic, OperandType::Branch16, FlowType::ConditionalBranch, pops, 0)
}

/// Instruction metadata indexed by opcode.
pub static INSTRUCTIONS: [JvmInstruction; 256] = build_table();

#[allow(clippy::too_many_lines)]
const fn build_table() -> [JvmInstruction; 256] {
    use FlowType::{Call, Return, Sequential, Subroutine, SubroutineReturn, Switch, Throw};
    use OperandType as O;

    let mut t = [UNDEFINED; 256];

    t[opcodes::NOP as usize] = simple("nop", 0, 0);
    t[opcodes::ACONST_NULL as usize] = simple("aconst_null", 0, 1);
    t[opcodes::ICONST_M1 as usize] = simple("iconst_m1", 0, 1);
    t[opcodes::ICONST_0 as usize] = simple("iconst_0", 0, 1);
    t[opcodes::ICONST_1 as usize] = simple("iconst_1", 0, 1);
    t[opcodes::ICONST_2 as usize] = simple("iconst_2", 0, 1);
    t[opcodes::ICONST_3 as usize] = simple("iconst_3", 0, 1);
    t[opcodes::ICONST_4 as usize] = simple("iconst_4", 0, 1);
    t[opcodes::ICONST_5 as usize] = simple("iconst_5", 0, 1);
    t[opcodes::LCONST_0 as usize] = simple("lconst_0", 0, 2);
    t[opcodes::LCONST_1 as usize] = simple("lconst_1", 0, 2);
    t[opcodes::FCONST_0 as usize] = simple("fconst_0", 0, 1);
    t[opcodes::FCONST_1 as usize] = simple("fconst_1", 0, 1);
    t[opcodes::FCONST_2 as usize] = simple("fconst_2", 0, 1);
    t[opcodes::DCONST_0 as usize] = simple("dconst_0", 0, 2);
    t[opcodes::DCONST_1 as usize] = simple("dconst_1", 0, 2);
    t[opcodes::BIPUSH as usize] = op("bipush", O::Int8, Sequential, 0, 1);
    t[opcodes::SIPUSH as usize] = op("sipush", O::Int16, Sequential, 0, 1);
    t[opcodes::LDC as usize] = op("ldc", O::ConstantU8, Sequential, 0, 1);
    t[opcodes::LDC_W as usize] = op("ldc_w", O::Constant, Sequential, 0, 1);
    t[opcodes::LDC2_W as usize] = op("ldc2_w", O::Constant, Sequential, 0, 2);

    t[opcodes::ILOAD as usize] = op("iload", O::Local, Sequential, 0, 1);
    t[opcodes::LLOAD as usize] = op("lload", O::Local, Sequential, 0, 2);
    t[opcodes::FLOAD as usize] = op("fload", O::Local, Sequential, 0, 1);
    t[opcodes::DLOAD as usize] = op("dload", O::Local, Sequential, 0, 2);
    t[opcodes::ALOAD as usize] = op("aload", O::Local, Sequential, 0, 1);
    t[opcodes::ILOAD_0 as usize] = simple("iload_0", 0, 1);
    t[opcodes::ILOAD_1 as usize] = simple("iload_1", 0, 1);
    t[opcodes::ILOAD_2 as usize] = simple("iload_2", 0, 1);
    t[opcodes::ILOAD_3 as usize] = simple("iload_3", 0, 1);
    t[opcodes::LLOAD_0 as usize] = simple("lload_0", 0, 2);
    t[opcodes::LLOAD_1 as usize] = simple("lload_1", 0, 2);
    t[opcodes::LLOAD_2 as usize] = simple("lload_2", 0, 2);
    t[opcodes::LLOAD_3 as usize] = simple("lload_3", 0, 2);
    t[opcodes::FLOAD_0 as usize] = simple("fload_0", 0, 1);
    t[opcodes::FLOAD_1 as usize] = simple("fload_1", 0, 1);
    t[opcodes::FLOAD_2 as usize] = simple("fload_2", 0, 1);
    t[opcodes::FLOAD_3 as usize] = simple("fload_3", 0, 1);
    t[opcodes::DLOAD_0 as usize] = simple("dload_0", 0, 2);
    t[opcodes::DLOAD_1 as usize] = simple("dload_1", 0, 2);
    t[opcodes::DLOAD_2 as usize] = simple("dload_2", 0, 2);
    t[opcodes::DLOAD_3 as usize] = simple("dload_3", 0, 2);
    t[opcodes::ALOAD_0 as usize] = simple("aload_0", 0, 1);
    t[opcodes::ALOAD_1 as usize] = simple("aload_1", 0, 1);
    t[opcodes::ALOAD_2 as usize] = simple("aload_2", 0, 1);
    t[opcodes::ALOAD_3 as usize] = simple("aload_3", 0, 1);
    t[opcodes::IALOAD as usize] = simple("iaload", 2, 1);
    t[opcodes::LALOAD as usize] = simple("laload", 2, 2);
    t[opcodes::FALOAD as usize] = simple("faload", 2, 1);
    t[opcodes::DALOAD as usize] = simple("daload", 2, 2);
    t[opcodes::AALOAD as usize] = simple("aaload", 2, 1);
    t[opcodes::BALOAD as usize] = simple("baload", 2, 1);
    t[opcodes::CALOAD as usize] = simple("caload", 2, 1);
    t[opcodes::SALOAD as usize] = simple("saload", 2, 1);

    t[opcodes::ISTORE as usize] = op("istore", O::Local, Sequential, 1, 0);
    t[opcodes::LSTORE as usize] = op("lstore", O::Local, Sequential, 2, 0);
    t[opcodes::FSTORE as usize] = op("fstore", O::Local, Sequential, 1, 0);
    t[opcodes::DSTORE as usize] = op("dstore", O::Local, Sequential, 2, 0);
    t[opcodes::ASTORE as usize] = op("astore", O::Local, Sequential, 1, 0);
    t[opcodes::ISTORE_0 as usize] = simple("istore_0", 1, 0);
    t[opcodes::ISTORE_1 as usize] = simple("istore_1", 1, 0);
    t[opcodes::ISTORE_2 as usize] = simple("istore_2", 1, 0);
    t[opcodes::ISTORE_3 as usize] = simple("istore_3", 1, 0);
    t[opcodes::LSTORE_0 as usize] = simple("lstore_0", 2, 0);
    t[opcodes::LSTORE_1 as usize] = simple("lstore_1", 2, 0);
    t[opcodes::LSTORE_2 as usize] = simple("lstore_2", 2, 0);
    t[opcodes::LSTORE_3 as usize] = simple("lstore_3", 2, 0);
    t[opcodes::FSTORE_0 as usize] = simple("fstore_0", 1, 0);
    t[opcodes::FSTORE_1 as usize] = simple("fstore_1", 1, 0);
    t[opcodes::FSTORE_2 as usize] = simple("fstore_2", 1, 0);
    t[opcodes::FSTORE_3 as usize] = simple("fstore_3", 1, 0);
    t[opcodes::DSTORE_0 as usize] = simple("dstore_0", 2, 0);
    t[opcodes::DSTORE_1 as usize] = simple("dstore_1", 2, 0);
    t[opcodes::DSTORE_2 as usize] = simple("dstore_2", 2, 0);
    t[opcodes::DSTORE_3 as usize] = simple("dstore_3", 2, 0);
    t[opcodes::ASTORE_0 as usize] = simple("astore_0", 1, 0);
    t[opcodes::ASTORE_1 as usize] = simple("astore_1", 1, 0);
    t[opcodes::ASTORE_2 as usize] = simple("astore_2", 1, 0);
    t[opcodes::ASTORE_3 as usize] = simple("astore_3", 1, 0);
    t[opcodes::IASTORE as usize] = simple("iastore", 3, 0);
    t[opcodes::LASTORE as usize] = simple("lastore", 4, 0);
    t[opcodes::FASTORE as usize] = simple("fastore", 3, 0);
    t[opcodes::DASTORE as usize] = simple("dastore", 4, 0);
    t[opcodes::AASTORE as usize] = simple("aastore", 3, 0);
    t[opcodes::BASTORE as usize] = simple("bastore", 3, 0);
    t[opcodes::CASTORE as usize] = simple("castore", 3, 0);
    t[opcodes::SASTORE as usize] = simple("sastore", 3, 0);

    t[opcodes::POP as usize] = simple("pop", 1, 0);
    t[opcodes::POP2 as usize] = simple("pop2", 2, 0);
    t[opcodes::DUP as usize] = simple("dup", 1, 2);
    t[opcodes::DUP_X1 as usize] = simple("dup_x1", 2, 3);
    t[opcodes::DUP_X2 as usize] = simple("dup_x2", 3, 4);
    t[opcodes::DUP2 as usize] = simple("dup2", 2, 4);
    t[opcodes::DUP2_X1 as usize] = simple("dup2_x1", 3, 5);
    t[opcodes::DUP2_X2 as usize] = simple("dup2_x2", 4, 6);
    t[opcodes::SWAP as usize] = simple("swap", 2, 2);

    t[opcodes::IADD as usize] = simple("iadd", 2, 1);
    t[opcodes::LADD as usize] = simple("ladd", 4, 2);
    t[opcodes::FADD as usize] = simple("fadd", 2, 1);
    t[opcodes::DADD as usize] = simple("dadd", 4, 2);
    t[opcodes::ISUB as usize] = simple("isub", 2, 1);
    t[opcodes::LSUB as usize] = simple("lsub", 4, 2);
    t[opcodes::FSUB as usize] = simple("fsub", 2, 1);
    t[opcodes::DSUB as usize] = simple("dsub", 4, 2);
    t[opcodes::IMUL as usize] = simple("imul", 2, 1);
    t[opcodes::LMUL as usize] = simple("lmul", 4, 2);
    t[opcodes::FMUL as usize] = simple("fmul", 2, 1);
    t[opcodes::DMUL as usize] = simple("dmul", 4, 2);
    t[opcodes::IDIV as usize] = simple("idiv", 2, 1);
    t[opcodes::LDIV as usize] = simple("ldiv", 4, 2);
    t[opcodes::FDIV as usize] = simple("fdiv", 2, 1);
    t[opcodes::DDIV as usize] = simple("ddiv", 4, 2);
    t[opcodes::IREM as usize] = simple("irem", 2, 1);
    t[opcodes::LREM as usize] = simple("lrem", 4, 2);
    t[opcodes::FREM as usize] = simple("frem", 2, 1);
    t[opcodes::DREM as usize] = simple("drem", 4, 2);
    t[opcodes::INEG as usize] = simple("ineg", 1, 1);
    t[opcodes::LNEG as usize] = simple("lneg", 2, 2);
    t[opcodes::FNEG as usize] = simple("fneg", 1, 1);
    t[opcodes::DNEG as usize] = simple("dneg", 2, 2);
    t[opcodes::ISHL as usize] = simple("ishl", 2, 1);
    t[opcodes::LSHL as usize] = simple("lshl", 3, 2);
    t[opcodes::ISHR as usize] = simple("ishr", 2, 1);
    t[opcodes::LSHR as usize] = simple("lshr", 3, 2);
    t[opcodes::IUSHR as usize] = simple("iushr", 2, 1);
    t[opcodes::LUSHR as usize] = simple("lushr", 3, 2);
    t[opcodes::IAND as usize] = simple("iand", 2, 1);
    t[opcodes::LAND as usize] = simple("land", 4, 2);
    t[opcodes::IOR as usize] = simple("ior", 2, 1);
    t[opcodes::LOR as usize] = simple("lor", 4, 2);
    t[opcodes::IXOR as usize] = simple("ixor", 2, 1);
    t[opcodes::LXOR as usize] = simple("lxor", 4, 2);
    t[opcodes::IINC as usize] = op("iinc", O::Iinc, Sequential, 0, 0);

    t[opcodes::I2L as usize] = simple("i2l", 1, 2);
    t[opcodes::I2F as usize] = simple("i2f", 1, 1);
    t[opcodes::I2D as usize] = simple("i2d", 1, 2);
    t[opcodes::L2I as usize] = simple("l2i", 2, 1);
    t[opcodes::L2F as usize] = simple("l2f", 2, 1);
    t[opcodes::L2D as usize] = simple("l2d", 2, 2);
    t[opcodes::F2I as usize] = simple("f2i", 1, 1);
    t[opcodes::F2L as usize] = simple("f2l", 1, 2);
    t[opcodes::F2D as usize] = simple("f2d", 1, 2);
    t[opcodes::D2I as usize] = simple("d2i", 2, 1);
    t[opcodes::D2L as usize] = simple("d2l", 2, 2);
    t[opcodes::D2F as usize] = simple("d2f", 2, 1);
    t[opcodes::I2B as usize] = simple("i2b", 1, 1);
    t[opcodes::I2C as usize] = simple("i2c", 1, 1);
    t[opcodes::I2S as usize] = simple("i2s", 1, 1);

    t[opcodes::LCMP as usize] = simple("lcmp", 4, 1);
    t[opcodes::FCMPL as usize] = simple("fcmpl", 2, 1);
    t[opcodes::FCMPG as usize] = simple("fcmpg", 2, 1);
    t[opcodes::DCMPL as usize] = simple("dcmpl", 4, 1);
    t[opcodes::DCMPG as usize] = simple("dcmpg", 4, 1);
    t[opcodes::IFEQ as usize] = branch("ifeq", 1);
    t[opcodes::IFNE as usize] = branch("ifne", 1);
    t[opcodes::IFLT as usize] = branch("iflt", 1);
    t[opcodes::IFGE as usize] = branch("ifge", 1);
    t[opcodes::IFGT as usize] = branch("ifgt", 1);
    t[opcodes::IFLE as usize] = branch("ifle", 1);
    t[opcodes::IF_ICMPEQ as usize] = branch("if_icmpeq", 2);
    t[opcodes::IF_ICMPNE as usize] = branch("if_icmpne", 2);
    t[opcodes::IF_ICMPLT as usize] = branch("if_icmplt", 2);
    t[opcodes::IF_ICMPGE as usize] = branch("if_icmpge", 2);
    t[opcodes::IF_ICMPGT as usize] = branch("if_icmpgt", 2);
    t[opcodes::IF_ICMPLE as usize] = branch("if_icmple", 2);
    t[opcodes::IF_ACMPEQ as usize] = branch("if_acmpeq", 2);
    t[opcodes::IF_ACMPNE as usize] = branch("if_acmpne", 2);

    t[opcodes::GOTO as usize] = op("goto", O::Branch16, FlowType::UnconditionalBranch, 0, 0);
    t[opcodes::JSR as usize] = op("jsr", O::Branch16, Subroutine, 0, 1);
    t[opcodes::RET as usize] = op("ret", O::Local, SubroutineReturn, 0, 0);
    t[opcodes::TABLESWITCH as usize] = op("tableswitch", O::TableSwitch, Switch, 1, 0);
    t[opcodes::LOOKUPSWITCH as usize] = op("lookupswitch", O::LookupSwitch, Switch, 1, 0);
    t[opcodes::IRETURN as usize] = op("ireturn", O::None, Return, 1, 0);
    t[opcodes::LRETURN as usize] = op("lreturn", O::None, Return, 2, 0);
    t[opcodes::FRETURN as usize] = op("freturn", O::None, Return, 1, 0);
    t[opcodes::DRETURN as usize] = op("dreturn", O::None, Return, 2, 0);
    t[opcodes::ARETURN as usize] = op("areturn", O::None, Return, 1, 0);
    t[opcodes::RETURN as usize] = op("return", O::None, Return, 0, 0);

    t[opcodes::GETSTATIC as usize] = variable("getstatic", O::Constant, Sequential);
    t[opcodes::PUTSTATIC as usize] = variable("putstatic", O::Constant, Sequential);
    t[opcodes::GETFIELD as usize] = variable("getfield", O::Constant, Sequential);
    t[opcodes::PUTFIELD as usize] = variable("putfield", O::Constant, Sequential);
    t[opcodes::INVOKEVIRTUAL as usize] = variable("invokevirtual", O::Constant, Call);
    t[opcodes::INVOKESPECIAL as usize] = variable("invokespecial", O::Constant, Call);
    t[opcodes::INVOKESTATIC as usize] = variable("invokestatic", O::Constant, Call);
    t[opcodes::INVOKEINTERFACE as usize] = variable("invokeinterface", O::Interface, Call);
    t[opcodes::INVOKEDYNAMIC as usize] = variable("invokedynamic", O::Dynamic, Call);
    t[opcodes::NEW as usize] = op("new", O::Constant, Sequential, 0, 1);
    t[opcodes::NEWARRAY as usize] = op("newarray", O::UInt8, Sequential, 1, 1);
    t[opcodes::ANEWARRAY as usize] = op("anewarray", O::Constant, Sequential, 1, 1);
    t[opcodes::ARRAYLENGTH as usize] = simple("arraylength", 1, 1);
    t[opcodes::ATHROW as usize] = op("athrow", O::None, Throw, 1, 0);
    t[opcodes::CHECKCAST as usize] = op("checkcast", O::Constant, Sequential, 1, 1);
    t[opcodes::INSTANCEOF as usize] = op("instanceof", O::Constant, Sequential, 1, 1);
    t[opcodes::MONITORENTER as usize] = simple("monitorenter", 1, 0);
    t[opcodes::MONITOREXIT as usize] = simple("monitorexit", 1, 0);

    t[opcodes::WIDE as usize] = variable("wide", O::Wide, Sequential);
    t[opcodes::MULTIANEWARRAY as usize] = variable("multianewarray", O::MultiArray, Sequential);
    t[opcodes::IFNULL as usize] = branch("ifnull", 1);
    t[opcodes::IFNONNULL as usize] = branch("ifnonnull", 1);
    t[opcodes::GOTO_W as usize] = op("goto_w", O::Branch32, FlowType::UnconditionalBranch, 0, 0);
    t[opcodes::JSR_W as usize] = op("jsr_w", O::Branch32, Subroutine, 0, 1);

    t
}

/// A decoded operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// No operand
    None,
    /// Immediate value of `bipush`, `sipush` or `newarray`
    Immediate(i32),
    /// Constant pool index
    Constant(u16),
    /// Local variable index
    Local(u16),
    /// `iinc` operands
    Iinc {
        /// Local variable index
        index: u16,
        /// Signed increment
        delta: i16,
    },
    /// Branch offset relative to the start of the instruction
    Branch(i32),
    /// `invokeinterface` operands
    Interface {
        /// `InterfaceMethodref` index
        index: u16,
        /// Argument slot count including the receiver
        count: u8,
    },
    /// `multianewarray` operands
    MultiArray {
        /// Array class index
        index: u16,
        /// Number of dimensions to create
        dimensions: u8,
    },
    /// `tableswitch` operands; offsets are relative to the start of the instruction
    TableSwitch {
        /// Default offset
        default: i32,
        /// Lowest key
        low: i32,
        /// Highest key
        high: i32,
        /// One offset per key in `low..=high`
        offsets: Vec<i32>,
    },
    /// `lookupswitch` operands; offsets are relative to the start of the instruction
    LookupSwitch {
        /// Default offset
        default: i32,
        /// `(key, offset)` pairs sorted by key
        pairs: Vec<(i32, i32)>,
    },
}

/// A decoded JVM instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Offset of the opcode within the method body
    pub offset: u32,
    /// Encoded size in bytes, including any `wide` prefix and switch padding
    pub size: u32,
    /// The opcode; for `wide` forms this is the modified instruction's opcode
    pub opcode: u8,
    /// Mnemonic of the opcode
    pub mnemonic: &'static str,
    /// Control flow behavior
    pub flow_type: FlowType,
    /// Operand stack effect
    pub stack: StackEffect,
    /// Whether the instruction was prefixed by `wide`
    pub wide: bool,
    /// Decoded operand
    pub operand: Operand,
    /// Absolute branch targets (branches and switches only)
    pub branch_targets: Vec<u32>,
}

impl Instruction {
    /// Returns `true` if the instruction can transfer control to a branch target.
    #[must_use]
    pub fn is_branch(&self) -> bool {
        matches!(
            self.flow_type,
            FlowType::ConditionalBranch
                | FlowType::UnconditionalBranch
                | FlowType::Switch
                | FlowType::Subroutine
        )
    }

    /// Returns `true` if execution never falls through to the next instruction.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.flow_type,
            FlowType::UnconditionalBranch
                | FlowType::Switch
                | FlowType::Return
                | FlowType::Throw
                | FlowType::SubroutineReturn
        )
    }

    /// Offset of the following instruction.
    #[must_use]
    pub fn next_offset(&self) -> u32 {
        self.offset + self.size
    }

    /// Constant pool index carried by the operand, if any.
    #[must_use]
    pub fn constant_index(&self) -> Option<u16> {
        match self.operand {
            Operand::Constant(index)
            | Operand::Interface { index, .. }
            | Operand::MultiArray { index, .. } => Some(index),
            _ => None,
        }
    }
}
