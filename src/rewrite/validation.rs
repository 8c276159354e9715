//! Post-emit consistency check.
//!
//! Not a verifier: it only checks that every method the engine touched decodes cleanly, that
//! every branch target and exception handler starts an instruction, and, for class versions
//! that require them, that every branch target carries a stack map frame.

use std::collections::BTreeSet;

use crate::{
    assembly::decode_stream,
    classfile::{stackmap::StackMapTable, ClassFile},
    file::parser::Parser,
    Error, Result,
};

/// Check the methods named in `names`.
///
/// # Errors
/// Returns [`crate::Error::Verification`] on the first inconsistency, naming the method.
pub fn verify(class: &ClassFile, names: &[&str]) -> Result<()> {
    let pool = &class.constant_pool;

    for method in &class.methods {
        let name = pool.utf8_str(method.name_index)?;
        if !names.contains(&name.as_str()) {
            continue;
        }

        let code = method
            .code(pool)?
            .ok_or_else(|| Error::Verification(format!("{name} has no code")))?;
        let instructions = decode_stream(&mut Parser::new(&code.code))
            .map_err(|error| Error::Verification(format!("{name} does not decode: {error}")))?;
        let starts: BTreeSet<u32> = instructions.iter().map(|i| i.offset).collect();

        let mut targets = BTreeSet::new();
        for instruction in &instructions {
            targets.extend(instruction.branch_targets.iter().copied());
        }
        for entry in &code.exception_table {
            for pc in [entry.start_pc, entry.handler_pc] {
                if !starts.contains(&u32::from(pc)) {
                    return Err(Error::Verification(format!(
                        "{name}: exception range boundary {pc} is not an instruction"
                    )));
                }
            }
            targets.insert(u32::from(entry.handler_pc));
        }

        if let Some(target) = targets.iter().find(|target| !starts.contains(target)) {
            return Err(Error::Verification(format!(
                "{name}: branch target {target} is not an instruction"
            )));
        }

        if !class.requires_stack_maps() {
            continue;
        }

        let frames = match code.attribute(pool, "StackMapTable") {
            Some(attribute) => StackMapTable::parse(&attribute.info)?.offsets(),
            None => Vec::new(),
        };
        if let Some(frame) = frames.iter().find(|offset| !starts.contains(offset)) {
            return Err(Error::Verification(format!(
                "{name}: stack map frame at {frame} is not an instruction"
            )));
        }
        if let Some(target) = targets.iter().find(|target| !frames.contains(target)) {
            return Err(Error::Verification(format!(
                "{name}: no stack map frame at branch target {target}"
            )));
        }

        log::trace!(
            "Verified {} ({} instructions, {} frames)",
            name,
            instructions.len(),
            frames.len()
        );
    }

    Ok(())
}
