use std::ops::ControlFlow;

use crate::{
    Context, JsError, JsValue,
    object::{FunctionKind, ObjectKind},
    vm::{CompletionRecord, opcode::Operation},
};

macro_rules! implement_push_literal {
    ($name:ident, $value:expr, $doc:literal) => {
        #[doc = concat!("`", stringify!($name), "` implements the Opcode Operation for `Opcode::", stringify!($name), "`\n\n")]
        #[doc = "Operation:\n"]
        #[doc = concat!(" - ", $doc)]
        #[derive(Debug, Clone, Copy)]
        pub(crate) struct $name;

        impl Operation for $name {
            const NAME: &'static str = stringify!($name);
            const INSTRUCTION: &'static str = concat!("INST - ", stringify!($name));
            const COST: u8 = 1;

            fn execute(context: &mut Context) -> ControlFlow<CompletionRecord> {
                context.vm.push($value);
                ControlFlow::Continue(())
            }
        }
    };
}

implement_push_literal!(PushUndefined, JsValue::Undefined, "Push `undefined` on the stack.");
implement_push_literal!(PushNull, JsValue::Null, "Push `null` on the stack.");
implement_push_literal!(PushTrue, JsValue::Boolean(true), "Push `true` on the stack.");
implement_push_literal!(PushFalse, JsValue::Boolean(false), "Push `false` on the stack.");

/// `PushThis` implements the Opcode Operation for `Opcode::PushThis`
///
/// Operation:
///  - Push the frame's `this` value.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PushThis;

impl Operation for PushThis {
    const NAME: &'static str = "PushThis";
    const INSTRUCTION: &'static str = "INST - PushThis";
    const COST: u8 = 1;

    fn execute(context: &mut Context) -> ControlFlow<CompletionRecord> {
        let this = context.vm.frame().map(|f| f.this.clone()).unwrap_or_default();
        context.vm.push(this);
        ControlFlow::Continue(())
    }
}

/// `PushNumber` implements the Opcode Operation for `Opcode::PushNumber`
///
/// Operation:
///  - Push a number from the script's constant table.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PushNumber;

impl Operation for PushNumber {
    const NAME: &'static str = "PushNumber";
    const INSTRUCTION: &'static str = "INST - PushNumber";
    const COST: u8 = 1;

    fn execute(context: &mut Context) -> ControlFlow<CompletionRecord> {
        let index = usize::from(context.operand_u16(0));
        let number = context
            .vm
            .frame()
            .and_then(|frame| context.scripts.get(frame.script)?.numbers.get(index).copied())
            .unwrap_or(f64::NAN);
        context.vm.push(JsValue::Number(number));
        ControlFlow::Continue(())
    }
}

/// `PushString` implements the Opcode Operation for `Opcode::PushString`
///
/// Operation:
///  - Push a string from the script's atom table.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PushString;

impl Operation for PushString {
    const NAME: &'static str = "PushString";
    const INSTRUCTION: &'static str = "INST - PushString";
    const COST: u8 = 1;

    fn execute(context: &mut Context) -> ControlFlow<CompletionRecord> {
        let atom = context.atom(context.operand_u16(0));
        context.vm.push(JsValue::String(atom));
        ControlFlow::Continue(())
    }
}

/// `NewObject` implements the Opcode Operation for `Opcode::NewObject`
///
/// Operation:
///  - Create an empty object in the frame's realm.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NewObject;

impl Operation for NewObject {
    const NAME: &'static str = "NewObject";
    const INSTRUCTION: &'static str = "INST - NewObject";
    const COST: u8 = 2;

    fn execute(context: &mut Context) -> ControlFlow<CompletionRecord> {
        let realm = context.realm();
        let object = context.alloc_object(realm, ObjectKind::Ordinary);
        context.vm.push(JsValue::Object(object));
        ControlFlow::Continue(())
    }
}

/// `Lambda` implements the Opcode Operation for `Opcode::Lambda`
///
/// Operation:
///  - Create a closure for a child script over the current scope.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Lambda;

impl Operation for Lambda {
    const NAME: &'static str = "Lambda";
    const INSTRUCTION: &'static str = "INST - Lambda";
    const COST: u8 = 2;

    fn execute(context: &mut Context) -> ControlFlow<CompletionRecord> {
        let index = usize::from(context.operand_u16(0));
        let Some(frame) = context.vm.frame() else {
            return ControlFlow::Continue(());
        };
        let (realm, scope) = (frame.realm, frame.scope);
        let child = context
            .scripts
            .get(frame.script)
            .and_then(|script| script.children.get(index).copied());
        let Some(script) = child else {
            return context.handle_error(JsError::type_error("invalid function index"));
        };
        let function = context.alloc_object(
            realm,
            ObjectKind::Function(FunctionKind::Interpreted { script, scope }),
        );
        context.vm.push(JsValue::Object(function));
        ControlFlow::Continue(())
    }
}
