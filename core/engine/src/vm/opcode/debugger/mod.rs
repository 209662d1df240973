use std::ops::ControlFlow;

use crate::{
    Context, JsError, JsNativeErrorKind,
    debugger::DebugApi,
    vm::{CompletionRecord, opcode::Operation},
};

/// `Debugger` implements the Opcode Operation for `Opcode::Debugger`
///
/// Operation:
///  - Reports a `debugger` statement to every interested debugger.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Debugger;

impl Operation for Debugger {
    const NAME: &'static str = "Debugger";
    const INSTRUCTION: &'static str = "INST - Debugger";
    const COST: u8 = 1;

    fn execute(context: &mut Context) -> ControlFlow<CompletionRecord> {
        DebugApi::on_debugger_statement(context).into_control_flow()
    }
}

/// `Trap` implements the Opcode Operation for `Opcode::Trap`
///
/// Operation:
///  - Placeholder for a patched opcode byte. The interpreter loop resolves
///    traps before dispatch, so reaching this is a bytecode error.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Trap;

impl Operation for Trap {
    const NAME: &'static str = "Trap";
    const INSTRUCTION: &'static str = "INST - Trap";
    const COST: u8 = 1;

    fn execute(context: &mut Context) -> ControlFlow<CompletionRecord> {
        context.handle_error(JsError::native(
            JsNativeErrorKind::Error,
            "unresolved breakpoint trap",
        ))
    }
}
