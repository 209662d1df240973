use std::{cell::Cell, rc::Rc};

use crate::{
    Context, DebugError, JsResult, JsValue,
    debugger::{
        Debugger, DebuggerId,
        reflection::{Completion, ScriptMirror},
    },
    vm::{CallFrame, FrameId, FrameKind},
};

#[derive(Debug)]
struct Inner {
    owner: DebuggerId,
    frame: Cell<Option<FrameId>>,
}

/// A debugger's view of a call frame.
///
/// The mirror dies when the frame is popped, or when its debugger stops
/// debugging the frame's realm.
#[derive(Debug, Clone)]
pub struct FrameMirror {
    inner: Rc<Inner>,
}

impl PartialEq for FrameMirror {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl FrameMirror {
    pub(crate) fn new(owner: DebuggerId, frame: FrameId) -> Self {
        Self {
            inner: Rc::new(Inner {
                owner,
                frame: Cell::new(Some(frame)),
            }),
        }
    }

    pub(crate) fn owner_id(&self) -> DebuggerId {
        self.inner.owner
    }

    /// The debugger that created this mirror.
    #[must_use]
    pub fn owner(&self) -> Debugger {
        Debugger::from_id(self.inner.owner)
    }

    /// Returns `true` while the frame is on the stack.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.inner.frame.get().is_some()
    }

    pub(crate) fn invalidate(&self) {
        self.inner.frame.set(None);
    }

    /// The position of the frame on the stack, oldest first.
    pub fn index(&self, context: &Context) -> JsResult<usize> {
        let id = self.inner.frame.get().ok_or(DebugError::Dead)?;
        context
            .vm
            .frames
            .iter()
            .rposition(|frame| frame.id == id)
            .ok_or_else(|| DebugError::Dead.into())
    }

    fn frame<'a>(&self, context: &'a Context) -> JsResult<&'a CallFrame> {
        let index = self.index(context)?;
        Ok(&context.vm.frames[index])
    }

    /// How the frame came to be.
    pub fn kind(&self, context: &Context) -> JsResult<FrameKind> {
        Ok(self.frame(context)?.kind)
    }

    /// The called function, or `null` outside function calls.
    pub fn callee(&self, context: &mut Context) -> JsResult<JsValue> {
        match self.frame(context)?.callee {
            Some(callee) => self.owner().wrap(context, JsValue::Object(callee)),
            None => Ok(JsValue::Null),
        }
    }

    /// The frame's `this`.
    pub fn this(&self, context: &mut Context) -> JsResult<JsValue> {
        let this = self.frame(context)?.this.clone();
        self.owner().wrap(context, this)
    }

    /// The next older frame running in one of the debugger's debuggees.
    pub fn older(&self, context: &mut Context) -> JsResult<Option<Self>> {
        let index = self.index(context)?;
        let owner = self.owner();
        let state = owner.state(context)?;
        let older = context.vm.frames[..index]
            .iter()
            .rposition(|frame| state.debuggees.contains(&frame.realm));
        older
            .map(|index| owner.frame_mirror(context, index))
            .transpose()
    }

    /// The arguments of a call frame; `None` for other frames.
    pub fn arguments(&self, context: &mut Context) -> JsResult<Option<Vec<JsValue>>> {
        let frame = self.frame(context)?;
        if frame.kind != FrameKind::Call {
            return Ok(None);
        }
        let args = frame.arguments.clone();
        let owner = self.owner();
        args.into_iter()
            .map(|value| owner.wrap(context, value))
            .collect::<JsResult<Vec<_>>>()
            .map(Some)
    }

    /// The script the frame executes.
    pub fn script(&self, context: &mut Context) -> JsResult<ScriptMirror> {
        let script = self.frame(context)?.script;
        self.owner().script_mirror(context, script)
    }

    /// Offset of the instruction the frame is executing.
    pub fn offset(&self, context: &Context) -> JsResult<u32> {
        Ok(self.frame(context)?.pc)
    }

    /// Evaluates `text` in the frame's scope with the frame's `this`.
    pub fn eval(&self, context: &mut Context, text: &str) -> JsResult<Completion> {
        self.eval_with_bindings(context, text, &[])
    }

    /// Evaluates `text` in the frame's scope extended by `bindings`.
    ///
    /// Binding values are debugger-side values: primitives or object mirrors
    /// of this debugger.
    pub fn eval_with_bindings(
        &self,
        context: &mut Context,
        text: &str,
        bindings: &[(Rc<str>, JsValue)],
    ) -> JsResult<Completion> {
        let index = self.index(context)?;
        let realm = context.vm.frames[index].realm;
        let owner = self.owner();
        owner.state(context)?;

        let bindings = bindings
            .iter()
            .map(|(name, value)| {
                let value = owner.unwrap(context, value)?;
                Ok((name.clone(), context.wrap_into(realm, value)?))
            })
            .collect::<JsResult<Vec<_>>>()?;

        log::trace!("evaluating in frame {index}: {text}");
        let result = context.eval_in_frame(index, text, &bindings);
        Completion::from_result(context, owner, realm, result)
    }
}
