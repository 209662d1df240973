use std::ops::ControlFlow;

use crate::{
    Context, JsError,
    vm::{CompletionRecord, opcode::Operation},
};

/// `Nop` implements the Opcode Operation for `Opcode::Nop`
///
/// Operation:
///  - No-operation instruction, does nothing.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Nop;

impl Operation for Nop {
    const NAME: &'static str = "Nop";
    const INSTRUCTION: &'static str = "INST - Nop";
    const COST: u8 = 1;

    fn execute(_: &mut Context) -> ControlFlow<CompletionRecord> {
        ControlFlow::Continue(())
    }
}

/// `Pop` implements the Opcode Operation for `Opcode::Pop`
///
/// Operation:
///  - Pop the top value from the stack.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Pop;

impl Operation for Pop {
    const NAME: &'static str = "Pop";
    const INSTRUCTION: &'static str = "INST - Pop";
    const COST: u8 = 1;

    fn execute(context: &mut Context) -> ControlFlow<CompletionRecord> {
        context.vm.pop();
        ControlFlow::Continue(())
    }
}

/// `Dup` implements the Opcode Operation for `Opcode::Dup`
///
/// Operation:
///  - Push a copy of the top value.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Dup;

impl Operation for Dup {
    const NAME: &'static str = "Dup";
    const INSTRUCTION: &'static str = "INST - Dup";
    const COST: u8 = 1;

    fn execute(context: &mut Context) -> ControlFlow<CompletionRecord> {
        let value = context.vm.stack.last().cloned().unwrap_or_default();
        context.vm.push(value);
        ControlFlow::Continue(())
    }
}

/// `SetRval` implements the Opcode Operation for `Opcode::SetRval`
///
/// Operation:
///  - Store the popped value as the frame's completion value.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SetRval;

impl Operation for SetRval {
    const NAME: &'static str = "SetRval";
    const INSTRUCTION: &'static str = "INST - SetRval";
    const COST: u8 = 1;

    fn execute(context: &mut Context) -> ControlFlow<CompletionRecord> {
        let value = context.vm.pop();
        if let Some(frame) = context.vm.frame_mut() {
            frame.rval = value;
        }
        ControlFlow::Continue(())
    }
}

fn jump_to(context: &mut Context) {
    let target = u32::from(context.operand_u16(0));
    if let Some(frame) = context.vm.frame_mut() {
        frame.next_pc = target;
    }
}

/// `Jump` implements the Opcode Operation for `Opcode::Jump`
///
/// Operation:
///  - Unconditional jump to an absolute offset.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Jump;

impl Operation for Jump {
    const NAME: &'static str = "Jump";
    const INSTRUCTION: &'static str = "INST - Jump";
    const COST: u8 = 1;

    fn execute(context: &mut Context) -> ControlFlow<CompletionRecord> {
        jump_to(context);
        ControlFlow::Continue(())
    }
}

/// `JumpIfFalse` implements the Opcode Operation for `Opcode::JumpIfFalse`
///
/// Operation:
///  - Jump if the popped condition is falsy.
#[derive(Debug, Clone, Copy)]
pub(crate) struct JumpIfFalse;

impl Operation for JumpIfFalse {
    const NAME: &'static str = "JumpIfFalse";
    const INSTRUCTION: &'static str = "INST - JumpIfFalse";
    const COST: u8 = 1;

    fn execute(context: &mut Context) -> ControlFlow<CompletionRecord> {
        if !context.vm.pop().to_boolean() {
            jump_to(context);
        }
        ControlFlow::Continue(())
    }
}

/// `JumpIfTrue` implements the Opcode Operation for `Opcode::JumpIfTrue`
///
/// Operation:
///  - Jump if the popped condition is truthy.
#[derive(Debug, Clone, Copy)]
pub(crate) struct JumpIfTrue;

impl Operation for JumpIfTrue {
    const NAME: &'static str = "JumpIfTrue";
    const INSTRUCTION: &'static str = "INST - JumpIfTrue";
    const COST: u8 = 1;

    fn execute(context: &mut Context) -> ControlFlow<CompletionRecord> {
        if context.vm.pop().to_boolean() {
            jump_to(context);
        }
        ControlFlow::Continue(())
    }
}

/// `Return` implements the Opcode Operation for `Opcode::Return`
///
/// Operation:
///  - Return the popped value from the current frame.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Return;

impl Operation for Return {
    const NAME: &'static str = "Return";
    const INSTRUCTION: &'static str = "INST - Return";
    const COST: u8 = 1;

    fn execute(context: &mut Context) -> ControlFlow<CompletionRecord> {
        let value = context.vm.pop();
        ControlFlow::Break(CompletionRecord::Return(value))
    }
}

/// `RetRval` implements the Opcode Operation for `Opcode::RetRval`
///
/// Operation:
///  - Return the frame's completion value.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RetRval;

impl Operation for RetRval {
    const NAME: &'static str = "RetRval";
    const INSTRUCTION: &'static str = "INST - RetRval";
    const COST: u8 = 1;

    fn execute(context: &mut Context) -> ControlFlow<CompletionRecord> {
        let value = context.vm.frame().map(|f| f.rval.clone()).unwrap_or_default();
        ControlFlow::Break(CompletionRecord::Return(value))
    }
}

/// `Throw` implements the Opcode Operation for `Opcode::Throw`
///
/// Operation:
///  - Throw the popped value.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Throw;

impl Operation for Throw {
    const NAME: &'static str = "Throw";
    const INSTRUCTION: &'static str = "INST - Throw";
    const COST: u8 = 1;

    fn execute(context: &mut Context) -> ControlFlow<CompletionRecord> {
        let value = context.vm.pop();
        context.handle_error(JsError::Thrown(value))
    }
}
