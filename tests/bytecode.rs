//! Control flow of the generated members, decoded from rewritten images.
//!
//! Each generated body is compared instruction by instruction, with branch targets and the
//! members it references resolved through the rewritten constant pool.

mod common;

use bundleweave::{
    assembly::{opcodes, Operand},
    classfile::ClassFile,
    config::TransformConfig,
    rewrite::RewriteEngine,
    Result,
};
use common::{
    body, branch_target, bundle_image, class_operands, init_logging, member_name, members,
    mnemonics, string_literals,
};

fn rewritten(config: TransformConfig) -> Result<ClassFile> {
    init_logging();
    let (image, _) = RewriteEngine::new(config).rewrite(&bundle_image(61, false)?)?;
    ClassFile::parse(&image)
}

fn acme() -> TransformConfig {
    TransformConfig::default()
        .with_pattern("<$lang> $value")
        .with_includes(["com.acme.", "org.acme."])
}

/// A missing base name is included, excludes are consulted before includes, and a missing
/// include list accepts every name.
#[test]
fn test_is_included_decision_order() -> Result<()> {
    let class = rewritten(acme())?;
    let code = body(&class, "__agent__isIncluded")?;

    assert_eq!(
        mnemonics(&code),
        vec![
            "aload_0",
            "ifnonnull",
            "iconst_1",
            "ireturn",
            "getstatic",
            "ifnull",
            "aload_0",
            "getstatic",
            "invokestatic",
            "ifeq",
            "iconst_0",
            "ireturn",
            "getstatic",
            "ifnonnull",
            "iconst_1",
            "ireturn",
            "aload_0",
            "getstatic",
            "invokestatic",
            "ireturn",
        ]
    );
    assert_eq!(branch_target(&code, 1), Some(4));
    assert_eq!(branch_target(&code, 5), Some(12));
    assert_eq!(branch_target(&code, 9), Some(12));
    assert_eq!(branch_target(&code, 13), Some(16));

    assert_eq!(
        members(&class, &code, opcodes::GETSTATIC)?,
        vec![
            "__agent__EXCLUDES",
            "__agent__EXCLUDES",
            "__agent__INCLUDES",
            "__agent__INCLUDES"
        ]
    );
    assert_eq!(
        members(&class, &code, opcodes::INVOKESTATIC)?,
        vec!["__agent__matches", "__agent__matches"]
    );
    Ok(())
}

/// The pattern is loaded once and every placeholder is replaced in turn.
#[test]
fn test_format_string_replacement_chain() -> Result<()> {
    let class = rewritten(acme())?;
    let code = body(&class, "__agent__formatString")?;

    assert_eq!(
        string_literals(&class, &code)?,
        vec!["<$lang> $value", "$value", "$locale", "$lang", "$base"]
    );

    let invoked: Vec<String> = code
        .iter()
        .filter(|instruction| instruction.mnemonic.starts_with("invoke"))
        .map(|instruction| member_name(&class, instruction))
        .collect::<Result<_>>()?;
    assert_eq!(
        invoked,
        vec![
            "valueOf",
            "replace",
            "getLocale",
            "__agent__localePart",
            "replace",
            "getLocale",
            "__agent__localePart",
            "replace",
            "getBaseBundleName",
            "valueOf",
            "replace",
        ]
    );

    // the full locale first, then the language
    let selectors: Vec<&str> = code
        .windows(2)
        .filter(|pair| {
            pair[1].opcode == opcodes::INVOKESTATIC
                && member_name(&class, &pair[1]).is_ok_and(|name| name == "__agent__localePart")
        })
        .map(|pair| pair[0].mnemonic)
        .collect();
    assert_eq!(selectors, vec!["iconst_0", "iconst_1"]);
    assert_eq!(mnemonics(&code).last(), Some(&"areturn"));
    Ok(())
}

/// Strings are formatted, string arrays are copied element by element, anything else is
/// returned as is.
#[test]
fn test_format_value_branches() -> Result<()> {
    let class = rewritten(acme())?;
    let code = body(&class, "__agent__formatValue")?;

    assert_eq!(
        mnemonics(&code),
        vec![
            "aload_1",
            "instanceof",
            "ifeq",
            "aload_0",
            "aload_1",
            "checkcast",
            "invokespecial",
            "areturn",
            "aload_1",
            "instanceof",
            "ifne",
            "aload_1",
            "areturn",
            "aload_1",
            "checkcast",
            "astore_2",
            "aload_2",
            "arraylength",
            "anewarray",
            "astore_3",
            "iconst_0",
            "istore",
            "iload",
            "aload_2",
            "arraylength",
            "if_icmpge",
            "aload_3",
            "iload",
            "aload_0",
            "aload_2",
            "iload",
            "aaload",
            "invokestatic",
            "invokespecial",
            "aastore",
            "iinc",
            "goto",
            "aload_3",
            "areturn",
        ]
    );
    assert_eq!(branch_target(&code, 2), Some(8));
    assert_eq!(branch_target(&code, 10), Some(13));
    assert_eq!(branch_target(&code, 25), Some(37));
    assert_eq!(branch_target(&code, 36), Some(22), "loop back edge");

    assert_eq!(
        class_operands(&class, &code, opcodes::INSTANCEOF)?,
        vec!["java/lang/String", "[Ljava/lang/String;"]
    );
    assert_eq!(
        class_operands(&class, &code, opcodes::CHECKCAST)?,
        vec!["java/lang/String", "[Ljava/lang/String;"]
    );
    assert_eq!(
        class_operands(&class, &code, opcodes::ANEWARRAY)?,
        vec!["java/lang/String"]
    );
    // null elements become the text "null" before formatting
    assert_eq!(member_name(&class, &code[32])?, "valueOf");
    assert_eq!(
        members(&class, &code, opcodes::INVOKESPECIAL)?,
        vec!["__agent__formatString", "__agent__formatString"]
    );
    assert!(code[21..=35]
        .iter()
        .filter(|instruction| instruction.mnemonic == "iload" || instruction.mnemonic == "istore")
        .all(|instruction| instruction.operand == Operand::Local(4)));
    Ok(())
}

/// The resolution delegate flags a resolved bundle only when both the bundle and the base
/// name are present.
#[test]
fn test_resolution_delegate_control_flow() -> Result<()> {
    let class = rewritten(acme())?;
    let code = body(&class, "getBundleImpl")?;

    assert_eq!(
        mnemonics(&code),
        vec![
            "aload_0",
            "aload_1",
            "aload_2",
            "aload_3",
            "invokestatic",
            "astore",
            "aload",
            "ifnull",
            "aload_0",
            "ifnull",
            "aload",
            "aload_0",
            "invokestatic",
            "putfield",
            "aload",
            "areturn",
        ]
    );
    assert_eq!(branch_target(&code, 7), Some(14));
    assert_eq!(branch_target(&code, 9), Some(14));
    for index in [5, 6, 10, 14] {
        assert_eq!(code[index].operand, Operand::Local(4), "{index}");
    }

    assert_eq!(member_name(&class, &code[4])?, "__agent__getBundleImpl");
    assert_eq!(member_name(&class, &code[12])?, "__agent__isIncluded");
    assert_eq!(member_name(&class, &code[13])?, "__agent__instrumented");
    Ok(())
}

/// The access delegate formats the relocated result of flagged bundles and returns it
/// untouched otherwise.
#[test]
fn test_access_delegate_control_flow() -> Result<()> {
    let class = rewritten(acme())?;
    let code = body(&class, "getObject")?;

    assert_eq!(
        mnemonics(&code),
        vec![
            "aload_0",
            "aload_1",
            "invokevirtual",
            "astore_2",
            "aload_0",
            "getfield",
            "ifeq",
            "aload_0",
            "aload_2",
            "invokespecial",
            "areturn",
            "aload_2",
            "areturn",
        ]
    );
    assert_eq!(branch_target(&code, 6), Some(11));
    assert_eq!(member_name(&class, &code[2])?, "__agent__getObject");
    assert_eq!(member_name(&class, &code[5])?, "__agent__instrumented");
    assert_eq!(member_name(&class, &code[9])?, "__agent__formatValue");
    Ok(())
}

/// The static initializer stores both prefix lists, in configuration order.
#[test]
fn test_static_initializer_assigns_lists() -> Result<()> {
    let class = rewritten(acme())?;
    let code = body(&class, "<clinit>")?;

    assert_eq!(
        string_literals(&class, &code)?,
        vec!["com.acme.", "org.acme.", "java.", "sun.", "jdk.", "oracle."]
    );
    assert_eq!(&mnemonics(&code)[..2], &["iconst_2", "anewarray"]);
    assert_eq!(
        members(&class, &code, opcodes::INVOKESTATIC)?,
        vec!["asList", "asList"]
    );
    assert_eq!(
        members(&class, &code, opcodes::PUTSTATIC)?,
        vec!["__agent__INCLUDES", "__agent__EXCLUDES"]
    );
    assert_eq!(mnemonics(&code).last(), Some(&"return"));
    Ok(())
}

/// Missing and empty lists are stored as `null`, which disables filtering on that axis.
#[test]
fn test_static_initializer_stores_null_lists() -> Result<()> {
    let config = TransformConfig {
        pattern: "$value".to_string(),
        includes: None,
        excludes: Some(Vec::new()),
    };
    let class = rewritten(config)?;
    let code = body(&class, "<clinit>")?;

    assert_eq!(
        mnemonics(&code),
        vec!["aconst_null", "putstatic", "aconst_null", "putstatic", "return"]
    );
    assert!(string_literals(&class, &code)?.is_empty());
    Ok(())
}
