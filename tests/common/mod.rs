//! Shared helpers for the integration tests.
//!
//! Images are assembled with the public codec and builder API only.

#![allow(dead_code)]

use bundleweave::{
    assembly::{decode_stream, opcodes, Instruction, MethodBuilder},
    classfile::{
        access::{ClassAccess, FieldAccess, MethodAccess},
        constpool::{Constant, ConstantPool},
        descriptor::MethodDescriptor,
        Attribute, ClassFile, FieldInfo, MethodInfo,
    },
    Error, Parser, Result,
};

pub const BUNDLE: &str = "java/util/ResourceBundle";

const RESOLUTION: &str = "(Ljava/lang/String;Ljava/util/Locale;Ljava/lang/ClassLoader;Ljava/util/ResourceBundle$Control;)Ljava/util/ResourceBundle;";
const ACCESS: &str = "(Ljava/lang/String;)Ljava/lang/Object;";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A `ResourceBundle` look-alike, optionally with a static initializer that branches.
pub fn bundle_image(major_version: u16, static_init: bool) -> Result<Vec<u8>> {
    let mut pool = ConstantPool::new();
    let this_class = pool.class(BUNDLE)?;
    let super_class = pool.class("java/lang/Object")?;
    let frames = major_version >= 50;

    let mut fields = Vec::new();
    for (name, descriptor, access) in [
        ("locale", "Ljava/util/Locale;", FieldAccess::PROTECTED),
        ("name", "Ljava/lang/String;", FieldAccess::PRIVATE),
        ("LOADED", "Z", FieldAccess::PRIVATE | FieldAccess::STATIC),
    ] {
        fields.push(FieldInfo {
            access,
            name_index: pool.utf8(name)?,
            descriptor_index: pool.utf8(descriptor)?,
            attributes: Vec::new(),
        });
    }

    let mut methods = Vec::new();

    let access = MethodAccess::PRIVATE | MethodAccess::STATIC;
    let descriptor = MethodDescriptor::parse(RESOLUTION)?;
    let mut body = MethodBuilder::new(&mut pool, BUNDLE, access, &descriptor, frames)?;
    body.op(opcodes::ACONST_NULL)?;
    body.op(opcodes::ARETURN)?;
    let code = body.finish()?;
    methods.push(method(&mut pool, access, "getBundleImpl", RESOLUTION, &code)?);

    let access = MethodAccess::PUBLIC | MethodAccess::FINAL;
    let descriptor = MethodDescriptor::parse(ACCESS)?;
    let mut body = MethodBuilder::new(&mut pool, BUNDLE, access, &descriptor, frames)?;
    body.aload(0)?;
    body.aload(1)?;
    body.invoke_virtual(BUNDLE, "handleGetObject", ACCESS)?;
    body.op(opcodes::ARETURN)?;
    let code = body.finish()?;
    methods.push(method(&mut pool, access, "getObject", ACCESS, &code)?);

    for (name, descriptor, field) in [
        ("getLocale", "()Ljava/util/Locale;", "locale"),
        ("getBaseBundleName", "()Ljava/lang/String;", "name"),
    ] {
        let parsed = MethodDescriptor::parse(descriptor)?;
        let mut body = MethodBuilder::new(&mut pool, BUNDLE, MethodAccess::PUBLIC, &parsed, frames)?;
        body.aload(0)?;
        body.get_field(BUNDLE, field, &descriptor[2..])?;
        body.op(opcodes::ARETURN)?;
        let code = body.finish()?;
        methods.push(method(&mut pool, MethodAccess::PUBLIC, name, descriptor, &code)?);
    }

    if static_init {
        let descriptor = MethodDescriptor::parse("()V")?;
        let mut body = MethodBuilder::new(&mut pool, BUNDLE, MethodAccess::STATIC, &descriptor, frames)?;
        body.ldc_string("boot")?;
        body.invoke_virtual("java/lang/String", "length", "()I")?;
        body.branch(opcodes::IFEQ, "skip")?;
        body.iconst(1)?;
        body.put_static(BUNDLE, "LOADED", "Z")?;
        body.label("skip")?;
        body.frame("skip", Vec::new(), Vec::new())?;
        body.op(opcodes::RETURN)?;
        let code = body.finish()?;
        methods.push(method(&mut pool, MethodAccess::STATIC, "<clinit>", "()V", &code)?);
    }

    let mut signature = Vec::new();
    signature.extend_from_slice(&pool.utf8("ResourceBundle.java")?.to_be_bytes());
    let attributes = vec![Attribute {
        name_index: pool.utf8("SourceFile")?,
        info: signature,
    }];

    ClassFile {
        minor_version: 0,
        major_version,
        constant_pool: pool,
        access: ClassAccess::PUBLIC | ClassAccess::SUPER | ClassAccess::ABSTRACT,
        this_class,
        super_class,
        interfaces: Vec::new(),
        fields,
        methods,
        attributes,
    }
    .to_bytes()
}

fn method(
    pool: &mut ConstantPool,
    access: MethodAccess,
    name: &str,
    descriptor: &str,
    code: &bundleweave::classfile::code::CodeAttribute,
) -> Result<MethodInfo> {
    let mut method = MethodInfo {
        access,
        name_index: pool.utf8(name)?,
        descriptor_index: pool.utf8(descriptor)?,
        attributes: Vec::new(),
    };
    method.set_code(pool, code)?;
    Ok(method)
}

/// Names of all methods of a parsed class, in declaration order.
pub fn method_names(class: &ClassFile) -> Result<Vec<String>> {
    class
        .methods
        .iter()
        .map(|method| class.method_name(method))
        .collect()
}

/// Decoded body of the first method called `name`.
pub fn body(class: &ClassFile, name: &str) -> Result<Vec<Instruction>> {
    for method in &class.methods {
        if class.method_name(method)? != name {
            continue;
        }
        let code = method
            .code(&class.constant_pool)?
            .ok_or_else(|| Error::Error(format!("{name} has no code")))?;
        return decode_stream(&mut Parser::new(&code.code));
    }
    Err(Error::Error(format!("{name} not found")))
}

pub fn mnemonics(instructions: &[Instruction]) -> Vec<&'static str> {
    instructions.iter().map(|instruction| instruction.mnemonic).collect()
}

/// Position of the instruction the branch at `index` jumps to.
pub fn branch_target(instructions: &[Instruction], index: usize) -> Option<usize> {
    let target = *instructions.get(index)?.branch_targets.first()?;
    instructions
        .iter()
        .position(|instruction| instruction.offset == target)
}

/// Name of the field or method an instruction refers to.
pub fn member_name(class: &ClassFile, instruction: &Instruction) -> Result<String> {
    let pool = &class.constant_pool;
    let index = instruction
        .constant_index()
        .ok_or_else(|| Error::Error(format!("{} has no constant", instruction.mnemonic)))?;
    let name_and_type = match pool.get(index)? {
        Constant::FieldRef { name_and_type, .. }
        | Constant::MethodRef { name_and_type, .. }
        | Constant::InterfaceMethodRef { name_and_type, .. } => *name_and_type,
        other => return Err(Error::Error(format!("{other:?} is not a member reference"))),
    };
    let Constant::NameAndType { name, .. } = pool.get(name_and_type)? else {
        return Err(Error::Error(format!("{name_and_type} is not a name and type")));
    };
    pool.utf8_str(*name)
}

/// Member names referenced by every instruction with the given opcode, in code order.
pub fn members(class: &ClassFile, instructions: &[Instruction], opcode: u8) -> Result<Vec<String>> {
    instructions
        .iter()
        .filter(|instruction| instruction.opcode == opcode)
        .map(|instruction| member_name(class, instruction))
        .collect()
}

/// Class operands of every instruction with the given opcode, in code order.
pub fn class_operands(
    class: &ClassFile,
    instructions: &[Instruction],
    opcode: u8,
) -> Result<Vec<String>> {
    instructions
        .iter()
        .filter(|instruction| instruction.opcode == opcode)
        .map(|instruction| {
            let index = instruction
                .constant_index()
                .ok_or_else(|| Error::Error(format!("{} has no constant", instruction.mnemonic)))?;
            class.constant_pool.class_name(index)
        })
        .collect()
}

/// String literals pushed by `ldc` and `ldc_w`, in code order.
pub fn string_literals(class: &ClassFile, instructions: &[Instruction]) -> Result<Vec<String>> {
    let mut literals = Vec::new();
    for instruction in instructions {
        if instruction.opcode != opcodes::LDC && instruction.opcode != opcodes::LDC_W {
            continue;
        }
        let Some(index) = instruction.constant_index() else {
            continue;
        };
        if let Constant::String(contents) = class.constant_pool.get(index)? {
            literals.push(class.constant_pool.utf8_str(*contents)?);
        }
    }
    Ok(literals)
}
