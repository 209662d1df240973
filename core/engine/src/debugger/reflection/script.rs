use std::{cell::Cell, rc::Rc};

use crate::{
    Context, DebugError, JsResult, JsValue,
    debugger::{Debugger, DebuggerId},
    object::ObjectId,
    script::{Script, ScriptId},
};

#[derive(Debug)]
struct Inner {
    owner: DebuggerId,
    script: Cell<Option<ScriptId>>,
    holder: Option<ObjectId>,
}

/// A debugger's view of a compiled script.
///
/// A mirror of a held script keeps the script's holder, and thereby the
/// script, alive. A mirror of a non-held script dies when the evaluation
/// that owns the script ends.
#[derive(Debug, Clone)]
pub struct ScriptMirror {
    inner: Rc<Inner>,
}

impl PartialEq for ScriptMirror {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl ScriptMirror {
    pub(crate) fn new(owner: DebuggerId, script: ScriptId, holder: Option<ObjectId>) -> Self {
        Self {
            inner: Rc::new(Inner {
                owner,
                script: Cell::new(Some(script)),
                holder,
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

    /// Returns `true` until the script is destroyed.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.inner.script.get().is_some()
    }

    pub(crate) fn invalidate(&self) {
        self.inner.script.set(None);
    }

    /// The reflected script, while it is live.
    #[must_use]
    pub fn script_id(&self) -> Option<ScriptId> {
        self.inner.script.get()
    }

    pub(crate) fn holder(&self) -> Option<ObjectId> {
        self.inner.holder
    }

    fn referent(&self) -> JsResult<ScriptId> {
        self.inner.script.get().ok_or_else(|| DebugError::Dead.into())
    }

    fn with<R>(&self, context: &Context, f: impl FnOnce(&Script) -> R) -> JsResult<R> {
        let script = context.scripts.get(self.referent()?).ok_or(DebugError::Dead)?;
        Ok(f(script))
    }

    /// The url of the script's source.
    pub fn url(&self, context: &Context) -> JsResult<Rc<str>> {
        self.with(context, |s| s.url.clone())
    }

    /// The first line of the script.
    pub fn start_line(&self, context: &Context) -> JsResult<u32> {
        self.with(context, Script::start_line)
    }

    /// Number of lines the script spans.
    pub fn line_count(&self, context: &Context) -> JsResult<u32> {
        self.with(context, Script::line_count)
    }

    /// Mirrors of the scripts of functions defined directly in this script.
    pub fn child_scripts(&self, context: &mut Context) -> JsResult<Vec<Self>> {
        let children = self.with(context, |s| s.children.clone())?;
        let owner = self.owner();
        children
            .into_iter()
            .map(|child| owner.script_mirror(context, child))
            .collect()
    }

    /// The line of the instruction at `offset`.
    pub fn offset_line(&self, context: &Context, offset: u32) -> JsResult<u32> {
        self.with(context, |s| {
            s.is_instruction_boundary(offset)
                .then(|| s.offset_line(offset))
                .flatten()
        })?
        .ok_or_else(|| DebugError::InvalidOffset(offset).into())
    }

    /// Every line with code and the offsets where its statements begin.
    pub fn all_offsets(&self, context: &Context) -> JsResult<Vec<(u32, Vec<u32>)>> {
        self.with(context, Script::all_offsets)
    }

    /// Offsets where statements on `line` begin.
    pub fn line_offsets(&self, context: &Context, line: u32) -> JsResult<Vec<u32>> {
        self.with(context, |s| s.line_offsets(line))
    }

    /// Sets a breakpoint at `offset`; see [`Debugger::set_breakpoint`].
    pub fn set_breakpoint(&self, context: &mut Context, offset: u32, handler: &JsValue) -> JsResult<()> {
        self.owner().set_breakpoint(context, self.referent()?, offset, handler)
    }

    /// Handlers of the owner's breakpoints in this script, optionally only at `offset`.
    pub fn breakpoints(&self, context: &Context, offset: Option<u32>) -> JsResult<Vec<JsValue>> {
        self.owner().breakpoints(context, self.referent()?, offset)
    }

    /// Removes the owner's breakpoints in this script that use `handler`.
    pub fn clear_breakpoint(&self, context: &mut Context, handler: &JsValue) -> JsResult<()> {
        self.owner().clear_breakpoint(context, self.referent()?, handler)
    }

    /// Removes all of the owner's breakpoints in this script.
    pub fn clear_all_breakpoints(&self, context: &mut Context) -> JsResult<()> {
        self.owner().clear_all_breakpoints_in(context, self.referent()?)
    }
}
