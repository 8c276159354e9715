//! Synthesized helper methods.
//!
//! The delegates only call into these helpers, they never inline the policy. Every helper
//! mirrors one function of [`crate::intercept::policy`]:
//!
//! | Helper         | Kind              | Policy function                                   |
//! |----------------|-------------------|---------------------------------------------------|
//! | `matches`      | static            | [`prefix_matches`](crate::intercept::policy::prefix_matches) |
//! | `isIncluded`   | static            | [`is_included`](crate::intercept::policy::is_included) |
//! | `orDefault`    | static, synthetic | `"default"` for missing or empty text             |
//! | `localePart`   | static, synthetic | locale or language text of a `Locale`             |
//! | `formatString` | instance          | [`format_string`](crate::intercept::policy::format_string) |
//! | `formatValue`  | instance          | [`format_value`](crate::intercept::policy::format_value) |

use strum::IntoEnumIterator;

use crate::{
    assembly::{opcodes, MethodBuilder},
    classfile::{
        access::MethodAccess, descriptor::MethodDescriptor, stackmap::VerificationType, Attribute,
        ClassFile,
    },
    config::TransformConfig,
    file::io::push_be,
    intercept::{policy::DEFAULT_LOCALE_TEXT, Placeholder},
    rewrite::{
        add_method,
        fields::{COLLECTION_DESCRIPTOR, EXCLUDES_FIELD, INCLUDES_FIELD},
        TargetProfile,
    },
    Result,
};

/// Suffix of the prefix matching helper.
pub const MATCHES: &str = "matches";
/// Suffix of the inclusion helper.
pub const IS_INCLUDED: &str = "isIncluded";
/// Suffix of the empty text replacement helper.
pub const OR_DEFAULT: &str = "orDefault";
/// Suffix of the locale text helper.
pub const LOCALE_PART: &str = "localePart";
/// Suffix of the string formatting helper.
pub const FORMAT_STRING: &str = "formatString";
/// Suffix of the value formatting helper.
pub const FORMAT_VALUE: &str = "formatValue";

pub(crate) const MATCHES_DESCRIPTOR: &str = "(Ljava/lang/String;Ljava/util/Collection;)Z";
const MATCHES_SIGNATURE: &str = "(Ljava/lang/String;Ljava/util/Collection<Ljava/lang/String;>;)Z";
pub(crate) const IS_INCLUDED_DESCRIPTOR: &str = "(Ljava/lang/String;)Z";
const OR_DEFAULT_DESCRIPTOR: &str = "(Ljava/lang/String;)Ljava/lang/String;";
const LOCALE_PART_DESCRIPTOR: &str = "(Ljava/util/Locale;Z)Ljava/lang/String;";
const FORMAT_STRING_DESCRIPTOR: &str = "(Ljava/lang/String;)Ljava/lang/String;";
pub(crate) const FORMAT_VALUE_DESCRIPTOR: &str = "(Ljava/lang/Object;)Ljava/lang/Object;";

pub(crate) const LOCALE_DESCRIPTOR: &str = "()Ljava/util/Locale;";
pub(crate) const BASE_NAME_DESCRIPTOR: &str = "()Ljava/lang/String;";

const STRING: &str = "java/lang/String";
const STRING_ARRAY: &str = "[Ljava/lang/String;";
const VALUE_OF: &str = "(Ljava/lang/Object;)Ljava/lang/String;";

/// Add all helpers to `class` and return their names.
///
/// The pattern of `config` is baked into `formatString`.
///
/// # Errors
/// Propagates encoder and constant pool errors.
pub fn synthesize(
    class: &mut ClassFile,
    profile: &TargetProfile,
    config: &TransformConfig,
) -> Result<Vec<String>> {
    let emit_frames = class.requires_stack_maps();
    let private_static = MethodAccess::PRIVATE | MethodAccess::STATIC;
    let synthetic = private_static | MethodAccess::SYNTHETIC;

    let helpers: [(&str, MethodAccess, &str, Option<&str>); 6] = [
        (MATCHES, private_static, MATCHES_DESCRIPTOR, Some(MATCHES_SIGNATURE)),
        (IS_INCLUDED, private_static, IS_INCLUDED_DESCRIPTOR, None),
        (OR_DEFAULT, synthetic, OR_DEFAULT_DESCRIPTOR, None),
        (LOCALE_PART, synthetic, LOCALE_PART_DESCRIPTOR, None),
        (FORMAT_STRING, MethodAccess::PRIVATE, FORMAT_STRING_DESCRIPTOR, None),
        (FORMAT_VALUE, MethodAccess::PRIVATE, FORMAT_VALUE_DESCRIPTOR, None),
    ];

    let mut names = Vec::with_capacity(helpers.len());
    for (helper, access, descriptor, signature) in helpers {
        let name = profile.internal(helper);
        let parsed = MethodDescriptor::parse(descriptor)?;
        let mut builder = MethodBuilder::new(
            &mut class.constant_pool,
            &profile.class_name,
            access,
            &parsed,
            emit_frames,
        )?;

        match helper {
            MATCHES => emit_matches(&mut builder)?,
            IS_INCLUDED => emit_is_included(&mut builder, profile)?,
            OR_DEFAULT => emit_or_default(&mut builder)?,
            LOCALE_PART => emit_locale_part(&mut builder, profile)?,
            FORMAT_STRING => emit_format_string(&mut builder, profile, &config.pattern)?,
            _ => emit_format_value(&mut builder, profile)?,
        }
        let code = builder.finish()?;

        let mut attributes = Vec::new();
        if let Some(signature) = signature {
            let pool = &mut class.constant_pool;
            let mut info = Vec::with_capacity(2);
            push_be(&mut info, pool.utf8(signature)?);
            attributes.push(Attribute {
                name_index: pool.utf8("Signature")?,
                info,
            });
        }

        add_method(class, access, &name, descriptor, &code, attributes)?;
        log::debug!("Synthesized {}{}", name, descriptor);
        names.push(name);
    }

    Ok(names)
}

/// `true` if the name starts with any element of the collection; `false` if either is null.
fn emit_matches(builder: &mut MethodBuilder<'_>) -> Result<()> {
    let string = builder.object_type(STRING)?;
    let collection = builder.object_type("java/util/Collection")?;
    let iterator = builder.object_type("java/util/Iterator")?;

    builder.aload(0)?;
    builder.branch(opcodes::IFNULL, "no_match")?;
    builder.aload(1)?;
    builder.branch(opcodes::IFNULL, "no_match")?;
    builder.aload(1)?;
    builder.invoke_interface("java/util/Collection", "iterator", "()Ljava/util/Iterator;")?;
    builder.astore(2)?;

    builder.label("next")?;
    builder.frame("next", vec![string, collection, iterator], vec![])?;
    builder.aload(2)?;
    builder.invoke_interface("java/util/Iterator", "hasNext", "()Z")?;
    builder.branch(opcodes::IFEQ, "no_match")?;
    builder.aload(0)?;
    builder.aload(2)?;
    builder.invoke_interface("java/util/Iterator", "next", "()Ljava/lang/Object;")?;
    builder.checkcast(STRING)?;
    builder.invoke_virtual(STRING, "startsWith", "(Ljava/lang/String;)Z")?;
    builder.branch(opcodes::IFEQ, "next")?;
    builder.iconst(1)?;
    builder.op(opcodes::IRETURN)?;

    builder.label("no_match")?;
    builder.frame("no_match", vec![string, collection], vec![])?;
    builder.iconst(0)?;
    builder.op(opcodes::IRETURN)
}

/// Null names are included, excludes win over includes, no includes means everything.
fn emit_is_included(builder: &mut MethodBuilder<'_>, profile: &TargetProfile) -> Result<()> {
    let owner = &profile.class_name;
    let includes = profile.internal(INCLUDES_FIELD);
    let excludes = profile.internal(EXCLUDES_FIELD);
    let matches = profile.internal(MATCHES);
    let locals = builder.initial_locals().to_vec();

    builder.aload(0)?;
    builder.branch(opcodes::IFNONNULL, "named")?;
    builder.iconst(1)?;
    builder.op(opcodes::IRETURN)?;

    builder.label("named")?;
    builder.frame("named", locals.clone(), vec![])?;
    builder.get_static(owner, &excludes, COLLECTION_DESCRIPTOR)?;
    builder.branch(opcodes::IFNULL, "includes")?;
    builder.aload(0)?;
    builder.get_static(owner, &excludes, COLLECTION_DESCRIPTOR)?;
    builder.invoke_static(owner, &matches, MATCHES_DESCRIPTOR)?;
    builder.branch(opcodes::IFEQ, "includes")?;
    builder.iconst(0)?;
    builder.op(opcodes::IRETURN)?;

    builder.label("includes")?;
    builder.frame("includes", locals.clone(), vec![])?;
    builder.get_static(owner, &includes, COLLECTION_DESCRIPTOR)?;
    builder.branch(opcodes::IFNONNULL, "filtered")?;
    builder.iconst(1)?;
    builder.op(opcodes::IRETURN)?;

    builder.label("filtered")?;
    builder.frame("filtered", locals, vec![])?;
    builder.aload(0)?;
    builder.get_static(owner, &includes, COLLECTION_DESCRIPTOR)?;
    builder.invoke_static(owner, &matches, MATCHES_DESCRIPTOR)?;
    builder.op(opcodes::IRETURN)
}

fn emit_or_default(builder: &mut MethodBuilder<'_>) -> Result<()> {
    let locals = builder.initial_locals().to_vec();

    builder.aload(0)?;
    builder.branch(opcodes::IFNULL, "default")?;
    builder.aload(0)?;
    builder.invoke_virtual(STRING, "isEmpty", "()Z")?;
    builder.branch(opcodes::IFNE, "default")?;
    builder.aload(0)?;
    builder.op(opcodes::ARETURN)?;

    builder.label("default")?;
    builder.frame("default", locals, vec![])?;
    builder.ldc_string(DEFAULT_LOCALE_TEXT)?;
    builder.op(opcodes::ARETURN)
}

/// `localePart(locale, language)`: the language subtag or the full locale text.
fn emit_locale_part(builder: &mut MethodBuilder<'_>, profile: &TargetProfile) -> Result<()> {
    let locals = builder.initial_locals().to_vec();
    let string = builder.object_type(STRING)?;

    builder.aload(0)?;
    builder.branch(opcodes::IFNONNULL, "present")?;
    builder.ldc_string(DEFAULT_LOCALE_TEXT)?;
    builder.op(opcodes::ARETURN)?;

    builder.label("present")?;
    builder.frame("present", locals.clone(), vec![])?;
    builder.iload(1)?;
    builder.branch(opcodes::IFEQ, "full")?;
    builder.aload(0)?;
    builder.invoke_virtual("java/util/Locale", "getLanguage", "()Ljava/lang/String;")?;
    builder.branch(opcodes::GOTO, "text")?;

    builder.label("full")?;
    builder.frame("full", locals.clone(), vec![])?;
    builder.aload(0)?;
    builder.invoke_virtual("java/util/Locale", "toString", "()Ljava/lang/String;")?;

    builder.label("text")?;
    builder.frame("text", locals, vec![string])?;
    builder.invoke_static(
        &profile.class_name,
        &profile.internal(OR_DEFAULT),
        OR_DEFAULT_DESCRIPTOR,
    )?;
    builder.op(opcodes::ARETURN)
}

/// Replace every placeholder of `pattern` in turn, `$value` first.
fn emit_format_string(
    builder: &mut MethodBuilder<'_>,
    profile: &TargetProfile,
    pattern: &str,
) -> Result<()> {
    let owner = &profile.class_name;
    let locale_part = profile.internal(LOCALE_PART);

    builder.ldc_string(pattern)?;
    for placeholder in Placeholder::iter() {
        builder.ldc_string(placeholder.as_ref())?;
        match placeholder {
            Placeholder::Value => {
                builder.aload(1)?;
                builder.invoke_static(STRING, "valueOf", VALUE_OF)?;
            }
            Placeholder::Locale | Placeholder::Lang => {
                builder.aload(0)?;
                builder.invoke_special(owner, &profile.locale_accessor, LOCALE_DESCRIPTOR)?;
                builder.iconst(i32::from(placeholder == Placeholder::Lang))?;
                builder.invoke_static(owner, &locale_part, LOCALE_PART_DESCRIPTOR)?;
            }
            Placeholder::Base => {
                builder.aload(0)?;
                builder.invoke_special(owner, &profile.base_name_accessor, BASE_NAME_DESCRIPTOR)?;
                builder.invoke_static(STRING, "valueOf", VALUE_OF)?;
            }
        }
        builder.invoke_virtual(
            STRING,
            "replace",
            "(Ljava/lang/CharSequence;Ljava/lang/CharSequence;)Ljava/lang/String;",
        )?;
    }
    builder.op(opcodes::ARETURN)
}

/// Strings and string arrays are formatted, anything else is returned as is.
fn emit_format_value(builder: &mut MethodBuilder<'_>, profile: &TargetProfile) -> Result<()> {
    let owner = &profile.class_name;
    let format_string = profile.internal(FORMAT_STRING);
    let locals = builder.initial_locals().to_vec();
    let string_array = builder.object_type(STRING_ARRAY)?;

    builder.aload(1)?;
    builder.instance_of(STRING)?;
    builder.branch(opcodes::IFEQ, "not_string")?;
    builder.aload(0)?;
    builder.aload(1)?;
    builder.checkcast(STRING)?;
    builder.invoke_special(owner, &format_string, FORMAT_STRING_DESCRIPTOR)?;
    builder.op(opcodes::ARETURN)?;

    builder.label("not_string")?;
    builder.frame("not_string", locals.clone(), vec![])?;
    builder.aload(1)?;
    builder.instance_of(STRING_ARRAY)?;
    builder.branch(opcodes::IFNE, "array")?;
    builder.aload(1)?;
    builder.op(opcodes::ARETURN)?;

    builder.label("array")?;
    builder.frame("array", locals.clone(), vec![])?;
    builder.aload(1)?;
    builder.checkcast(STRING_ARRAY)?;
    builder.astore(2)?;
    builder.aload(2)?;
    builder.op(opcodes::ARRAYLENGTH)?;
    builder.new_reference_array(STRING)?;
    builder.astore(3)?;
    builder.iconst(0)?;
    builder.istore(4)?;

    let mut loop_locals = locals.clone();
    loop_locals.extend([string_array, string_array, VerificationType::Integer]);

    builder.label("element")?;
    builder.frame("element", loop_locals.clone(), vec![])?;
    builder.iload(4)?;
    builder.aload(2)?;
    builder.op(opcodes::ARRAYLENGTH)?;
    builder.branch(opcodes::IF_ICMPGE, "done")?;
    builder.aload(3)?;
    builder.iload(4)?;
    builder.aload(0)?;
    builder.aload(2)?;
    builder.iload(4)?;
    builder.op(opcodes::AALOAD)?;
    builder.invoke_static(STRING, "valueOf", VALUE_OF)?;
    builder.invoke_special(owner, &format_string, FORMAT_STRING_DESCRIPTOR)?;
    builder.op(opcodes::AASTORE)?;
    builder.iinc(4, 1)?;
    builder.branch(opcodes::GOTO, "element")?;

    builder.label("done")?;
    builder.frame("done", loop_locals, vec![])?;
    builder.aload(3)?;
    builder.op(opcodes::ARETURN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::{decode_stream, Instruction},
        classfile::{code::CodeAttribute, constpool::Constant, stackmap::StackMapTable},
        file::parser::Parser,
        rewrite::find_unique_method,
        test::ClassImageBuilder,
        Error,
    };

    fn synthesized(config: &TransformConfig) -> Result<ClassFile> {
        let mut class = ClassFile::parse(&ClassImageBuilder::bundle().build()?)?;
        synthesize(&mut class, &TargetProfile::default(), config)?;
        Ok(class)
    }

    fn body(class: &ClassFile, name: &str) -> Result<(CodeAttribute, Vec<Instruction>)> {
        let index = find_unique_method(class, name)?
            .ok_or_else(|| Error::Error(format!("{name} missing")))?;
        let code = class.methods[index]
            .code(&class.constant_pool)?
            .ok_or_else(|| Error::Error(format!("{name} has no code")))?;
        let instructions = decode_stream(&mut Parser::new(&code.code))?;
        Ok((code, instructions))
    }

    fn string_literals(class: &ClassFile, instructions: &[Instruction]) -> Result<Vec<String>> {
        let mut literals = Vec::new();
        for instruction in instructions {
            if instruction.opcode != opcodes::LDC && instruction.opcode != opcodes::LDC_W {
                continue;
            }
            let Some(index) = instruction.constant_index() else {
                continue;
            };
            if let Constant::String(string_index) = class.constant_pool.get(index)? {
                literals.push(class.constant_pool.utf8_str(*string_index)?);
            }
        }
        Ok(literals)
    }

    #[test]
    fn all_helpers_are_added() -> Result<()> {
        let mut class = ClassFile::parse(&ClassImageBuilder::bundle().build()?)?;
        let before = class.methods.len();
        let names = synthesize(&mut class, &TargetProfile::default(), &TransformConfig::default())?;

        assert_eq!(
            names,
            vec![
                "__agent__matches",
                "__agent__isIncluded",
                "__agent__orDefault",
                "__agent__localePart",
                "__agent__formatString",
                "__agent__formatValue",
            ]
        );
        assert_eq!(class.methods.len(), before + 6);

        let access: Vec<MethodAccess> = class.methods[before..]
            .iter()
            .map(|method| method.access)
            .collect();
        assert!(access[..4]
            .iter()
            .all(|flags| flags.contains(MethodAccess::PRIVATE | MethodAccess::STATIC)));
        assert!(access[2].contains(MethodAccess::SYNTHETIC));
        assert!(access[3].contains(MethodAccess::SYNTHETIC));
        assert_eq!(access[4], MethodAccess::PRIVATE);
        assert_eq!(access[5], MethodAccess::PRIVATE);

        let matches = &class.methods[before];
        assert!(matches.signature_index(&class.constant_pool)?.is_some());
        Ok(())
    }

    #[test]
    fn matches_loops_over_the_collection() -> Result<()> {
        let class = synthesized(&TransformConfig::default())?;
        let (code, instructions) = body(&class, "__agent__matches")?;

        assert_eq!(code.max_locals, 3);
        assert_eq!(code.max_stack, 2);
        let mnemonics: Vec<&str> = instructions.iter().map(|i| i.mnemonic).collect();
        assert_eq!(&mnemonics[..2], &["aload_0", "ifnull"]);
        assert_eq!(
            mnemonics.iter().filter(|m| **m == "invokeinterface").count(),
            3
        );

        let back_edge = instructions
            .iter()
            .filter(|i| i.opcode == opcodes::IFEQ)
            .last()
            .ok_or_else(|| Error::Error("no back edge".to_string()))?;
        assert!(back_edge.branch_targets[0] < back_edge.offset);

        let frames = code
            .attribute(&class.constant_pool, "StackMapTable")
            .ok_or_else(|| Error::Error("no frames".to_string()))?;
        assert_eq!(StackMapTable::parse(&frames.info)?.frames.len(), 2);
        Ok(())
    }

    #[test]
    fn format_string_applies_placeholders_in_order() -> Result<()> {
        let class = synthesized(&TransformConfig::default().with_pattern("$base/$lang: $value"))?;
        let (_, instructions) = body(&class, "__agent__formatString")?;

        assert_eq!(
            string_literals(&class, &instructions)?,
            vec!["$base/$lang: $value", "$value", "$locale", "$lang", "$base"]
        );
        assert_eq!(
            instructions
                .iter()
                .filter(|i| i.opcode == opcodes::INVOKEVIRTUAL)
                .count(),
            4
        );
        assert_eq!(
            instructions
                .iter()
                .filter(|i| i.opcode == opcodes::INVOKESPECIAL)
                .count(),
            3
        );
        Ok(())
    }

    #[test]
    fn format_value_handles_arrays() -> Result<()> {
        let class = synthesized(&TransformConfig::default())?;
        let (code, instructions) = body(&class, "__agent__formatValue")?;

        assert_eq!(code.max_locals, 5);
        assert!(instructions.iter().any(|i| i.opcode == opcodes::AASTORE));
        assert!(instructions.iter().any(|i| i.opcode == opcodes::IINC));
        assert_eq!(
            instructions
                .iter()
                .filter(|i| i.opcode == opcodes::INSTANCEOF)
                .count(),
            2
        );
        Ok(())
    }

    #[test]
    fn old_class_versions_get_no_frames() -> Result<()> {
        let mut class = ClassFile::parse(&ClassImageBuilder::bundle().with_version(49).build()?)?;
        synthesize(&mut class, &TargetProfile::default(), &TransformConfig::default())?;

        let (code, _) = body(&class, "__agent__localePart")?;
        assert!(code
            .attribute(&class.constant_pool, "StackMapTable")
            .is_none());
        Ok(())
    }
}
