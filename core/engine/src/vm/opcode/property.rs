use std::ops::ControlFlow;

use crate::{
    Context, JsError, JsResult, JsValue, debugger::reflection,
    vm::{CompletionRecord, opcode::Operation},
};

impl Context {
    /// Reads `key` from any value, the way a property access expression does.
    pub(crate) fn get_value_property(&mut self, receiver: &JsValue, key: &str) -> JsResult<JsValue> {
        match receiver {
            JsValue::Object(id) => self.get(*id, key),
            JsValue::Mirror(mirror) => reflection::get_property(self, mirror, key),
            JsValue::String(s) if key == "length" => {
                #[allow(clippy::cast_precision_loss)]
                Ok(JsValue::Number(s.chars().count() as f64))
            }
            JsValue::Undefined | JsValue::Null => Err(JsError::type_error(format!(
                "cannot read property '{key}' of {receiver}"
            ))),
            _ => Ok(JsValue::Undefined),
        }
    }
}

/// `GetProp` implements the Opcode Operation for `Opcode::GetProp`
///
/// Operation:
///  - Read a named property of the popped value.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GetProp;

impl Operation for GetProp {
    const NAME: &'static str = "GetProp";
    const INSTRUCTION: &'static str = "INST - GetProp";
    const COST: u8 = 2;

    fn execute(context: &mut Context) -> ControlFlow<CompletionRecord> {
        let key = context.atom(context.operand_u16(0));
        let receiver = context.vm.pop();
        match context.get_value_property(&receiver, &key) {
            Ok(value) => {
                context.vm.push(value);
                ControlFlow::Continue(())
            }
            Err(err) => context.handle_error(err),
        }
    }
}

/// `SetProp` implements the Opcode Operation for `Opcode::SetProp`
///
/// Operation:
///  - Write a named property, leaving the assigned value on the stack.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SetProp;

impl Operation for SetProp {
    const NAME: &'static str = "SetProp";
    const INSTRUCTION: &'static str = "INST - SetProp";
    const COST: u8 = 2;

    fn execute(context: &mut Context) -> ControlFlow<CompletionRecord> {
        let key = context.atom(context.operand_u16(0));
        let value = context.vm.pop();
        let receiver = context.vm.pop();
        let result = match &receiver {
            JsValue::Object(id) => context.set(*id, &key, value.clone()),
            JsValue::Mirror(mirror) => Err(JsError::type_error(format!(
                "{} properties are read-only",
                mirror.class_name()
            ))),
            JsValue::Undefined | JsValue::Null => Err(JsError::type_error(format!(
                "cannot set property '{key}' of {receiver}"
            ))),
            _ => Ok(()),
        };
        match result {
            Ok(()) => {
                context.vm.push(value);
                ControlFlow::Continue(())
            }
            Err(err) => context.handle_error(err),
        }
    }
}

/// `InitProp` implements the Opcode Operation for `Opcode::InitProp`
///
/// Operation:
///  - Define a property of an object literal.
#[derive(Debug, Clone, Copy)]
pub(crate) struct InitProp;

impl Operation for InitProp {
    const NAME: &'static str = "InitProp";
    const INSTRUCTION: &'static str = "INST - InitProp";
    const COST: u8 = 1;

    fn execute(context: &mut Context) -> ControlFlow<CompletionRecord> {
        let key = context.atom(context.operand_u16(0));
        let value = context.vm.pop();
        let object = context.vm.stack.last().and_then(JsValue::as_object);
        if let Some(object) = object
            && let Err(err) = context.define_property(object, &key, value)
        {
            return context.handle_error(err);
        }
        ControlFlow::Continue(())
    }
}
