//! The script compiler.
//!
//! Source text is tokenized, parsed into a small syntax tree and lowered to
//! the bytecode described in [`crate::vm::opcode`]. The output is a tree of
//! [`ScriptData`]: the compiled program plus one entry per function literal,
//! which the context turns into [`Script`](crate::script::Script)s.
//!
//! Every statement start is recorded in the line table, so each statement is
//! a valid breakpoint location.

mod ast;
mod bytecompiler;
mod lexer;
mod parser;

use std::rc::Rc;

use crate::{JsResult, script::ScriptKind};

use bytecompiler::ByteCompiler;
use parser::Parser;

/// The compiled form of one script before it is registered with a context.
#[derive(Debug, Clone)]
pub(crate) struct ScriptData {
    pub(crate) kind: ScriptKind,
    pub(crate) name: Option<Rc<str>>,
    pub(crate) params: Vec<Rc<str>>,
    pub(crate) start_line: u32,
    pub(crate) end_line: u32,
    pub(crate) code: Vec<u8>,
    pub(crate) numbers: Vec<f64>,
    pub(crate) atoms: Vec<Rc<str>>,
    pub(crate) children: Vec<ScriptData>,
    pub(crate) lines: Vec<(u32, u32)>,
    pub(crate) boundaries: Vec<u32>,
}

/// Compiles program text starting at `start_line`.
pub(crate) fn compile(text: &str, start_line: u32) -> JsResult<ScriptData> {
    let (body, end_line) = Parser::new(text, start_line)?.parse_program()?;
    log::trace!("parsed {} top-level statements", body.len());
    ByteCompiler::compile_program(&body, start_line, end_line)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::vm::Opcode;

    fn opcodes(data: &ScriptData) -> Vec<Opcode> {
        data.boundaries
            .iter()
            .filter_map(|&offset| Opcode::from_byte(data.code[offset as usize]))
            .collect()
    }

    #[test]
    fn expression_statements_set_the_completion_value() {
        let data = compile("1 + 2;", 1).expect("compile failed");
        assert_eq!(
            opcodes(&data),
            vec![
                Opcode::PushNumber,
                Opcode::PushNumber,
                Opcode::Add,
                Opcode::SetRval,
                Opcode::RetRval,
            ]
        );
    }

    #[test]
    fn function_declarations_are_hoisted_into_children() {
        let data = compile(
            indoc! {"
                f();
                function f() {
                    return 1;
                }
            "},
            1,
        )
        .expect("compile failed");
        assert_eq!(data.children.len(), 1);
        let child = &data.children[0];
        assert_eq!(child.kind, ScriptKind::Function);
        assert_eq!((child.start_line, child.end_line), (2, 4));
        assert_eq!(
            &opcodes(&data)[..4],
            &[Opcode::DefVar, Opcode::Lambda, Opcode::SetName, Opcode::Pop]
        );
    }

    #[test]
    fn each_statement_gets_a_line_entry() {
        let data = compile(
            indoc! {"
                var a = 1;
                var b;
                a = a + 1;
                debugger;
            "},
            1,
        )
        .expect("compile failed");
        let lines: Vec<u32> = data.lines.iter().map(|&(_, line)| line).collect();
        assert_eq!(lines, vec![1, 3, 4]);
        for (offset, _) in &data.lines {
            assert!(data.boundaries.contains(offset));
        }
    }

    #[test]
    fn jumps_land_on_instruction_boundaries() {
        let data = compile("if (a) { b(); } else { c(); } while (d) { e(); }", 1)
            .expect("compile failed");
        for &offset in &data.boundaries {
            let Some(op) = Opcode::from_byte(data.code[offset as usize]) else {
                panic!("bad opcode at {offset}");
            };
            if matches!(op, Opcode::Jump | Opcode::JumpIfFalse | Opcode::JumpIfTrue) {
                let at = offset as usize + 1;
                let target = u32::from(u16::from_le_bytes([data.code[at], data.code[at + 1]]));
                assert!(
                    data.boundaries.contains(&target) || target as usize == data.code.len(),
                    "jump at {offset} targets {target}"
                );
            }
        }
    }

    #[test]
    fn syntax_errors_carry_the_line() {
        let err = compile("var a = 1;\nvar = 2;", 1).expect_err("compile succeeded");
        assert!(err.to_string().contains("line 2"), "{err}");
    }
}
