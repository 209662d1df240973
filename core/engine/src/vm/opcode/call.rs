use std::ops::ControlFlow;

use crate::{
    Context, JsValue,
    debugger::reflection,
    vm::{CompletionRecord, opcode::Operation},
};

/// `Call` implements the Opcode Operation for `Opcode::Call`
///
/// Operation:
///  - Call a function with `this` set to `undefined`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Call;

impl Operation for Call {
    const NAME: &'static str = "Call";
    const INSTRUCTION: &'static str = "INST - Call";
    const COST: u8 = 3;

    fn execute(context: &mut Context) -> ControlFlow<CompletionRecord> {
        let argc = usize::from(context.operand_u8(0));
        let args = context.vm.pop_n(argc);
        let function = context.vm.pop();
        match context.call(&function, &JsValue::Undefined, &args) {
            Ok(value) => {
                context.vm.push(value);
                ControlFlow::Continue(())
            }
            Err(err) => context.handle_error(err),
        }
    }
}

/// `CallMethod` implements the Opcode Operation for `Opcode::CallMethod`
///
/// Operation:
///  - Look up a method on the receiver and call it with the receiver as `this`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CallMethod;

impl Operation for CallMethod {
    const NAME: &'static str = "CallMethod";
    const INSTRUCTION: &'static str = "INST - CallMethod";
    const COST: u8 = 3;

    fn execute(context: &mut Context) -> ControlFlow<CompletionRecord> {
        let name = context.atom(context.operand_u16(0));
        let argc = usize::from(context.operand_u8(2));
        let args = context.vm.pop_n(argc);
        let receiver = context.vm.pop();

        let result = if let JsValue::Mirror(mirror) = &receiver {
            reflection::call_method(context, mirror, &name, &args)
        } else {
            context
                .get_value_property(&receiver, &name)
                .and_then(|method| context.call(&method, &receiver, &args))
        };

        match result {
            Ok(value) => {
                context.vm.push(value);
                ControlFlow::Continue(())
            }
            Err(err) => context.handle_error(err),
        }
    }
}
