use std::ops::ControlFlow;

use crate::{
    Context, JsError, JsValue,
    object::{ObjectId, ObjectKind},
    vm::{CompletionRecord, opcode::Operation},
};

impl Context {
    /// Finds the innermost scope object of the current frame that binds `name`.
    pub(crate) fn find_binding(&self, name: &str) -> Option<ObjectId> {
        let mut scope = self.vm.frame().map(|frame| frame.scope);
        while let Some(id) = scope {
            let object = self.heap.get(id)?;
            if object.properties.contains_key(name) {
                return Some(id);
            }
            scope = match object.kind {
                ObjectKind::Scope { parent } => Some(parent),
                _ => None,
            };
        }
        None
    }
}

/// `GetName` implements the Opcode Operation for `Opcode::GetName`
///
/// Operation:
///  - Resolve a binding along the scope chain and push its value.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GetName;

impl Operation for GetName {
    const NAME: &'static str = "GetName";
    const INSTRUCTION: &'static str = "INST - GetName";
    const COST: u8 = 2;

    fn execute(context: &mut Context) -> ControlFlow<CompletionRecord> {
        let name = context.atom(context.operand_u16(0));
        let value = context
            .find_binding(&name)
            .and_then(|scope| context.heap.get(scope)?.properties.get(&*name).cloned());
        match value {
            Some(value) => {
                context.vm.push(value);
                ControlFlow::Continue(())
            }
            None => context.handle_error(JsError::reference_error(format!("{name} is not defined"))),
        }
    }
}

/// `SetName` implements the Opcode Operation for `Opcode::SetName`
///
/// Operation:
///  - Assign to the innermost binding of a name, or create a global one.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SetName;

impl Operation for SetName {
    const NAME: &'static str = "SetName";
    const INSTRUCTION: &'static str = "INST - SetName";
    const COST: u8 = 2;

    fn execute(context: &mut Context) -> ControlFlow<CompletionRecord> {
        let name = context.atom(context.operand_u16(0));
        let value = context.vm.stack.last().cloned().unwrap_or_default();
        let scope = match context.find_binding(&name) {
            Some(scope) => scope,
            None => {
                let realm = context.realm();
                match context.global_object_of(realm) {
                    Ok(global) => global,
                    Err(err) => return context.handle_error(err),
                }
            }
        };
        match context.define_property(scope, &name, value) {
            Ok(()) => ControlFlow::Continue(()),
            Err(err) => context.handle_error(err),
        }
    }
}

/// `DefVar` implements the Opcode Operation for `Opcode::DefVar`
///
/// Operation:
///  - Declare a variable in the frame's own scope, keeping any existing value.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DefVar;

impl Operation for DefVar {
    const NAME: &'static str = "DefVar";
    const INSTRUCTION: &'static str = "INST - DefVar";
    const COST: u8 = 1;

    fn execute(context: &mut Context) -> ControlFlow<CompletionRecord> {
        let name = context.atom(context.operand_u16(0));
        let Some(scope) = context.vm.frame().map(|frame| frame.scope) else {
            return ControlFlow::Continue(());
        };
        if let Some(object) = context.heap.get_mut(scope) {
            object
                .properties
                .entry(name)
                .or_insert(JsValue::Undefined);
        }
        ControlFlow::Continue(())
    }
}
