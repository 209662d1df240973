//! The notifications the VM, the compiler and the collector send to the
//! debuggers, plus native traps for embedders.

use crate::{
    Context, DebugError, JsError, JsNativeErrorKind, JsResult, JsValue,
    debugger::{
        Debugger, Hook, Resumption,
        breakpoint::{NativeTrap, SiteKey},
        gc::destroy_debugger,
        hooks::{call_hook, dispatch, handle_uncaught_exception, invoke, recipients},
        reflection::Mirror,
    },
    realm::RealmId,
    script::ScriptId,
    vm::{FrameKind, Opcode},
};

/// What the interpreter does after a breakpoint trap.
#[derive(Debug)]
pub(crate) enum TrapOutcome {
    /// Execute the original instruction.
    Execute(Opcode),
    /// A handler decided how the frame goes on.
    Complete(Resumption),
    /// The trap itself failed.
    Error(JsError),
}

/// Entry points into the debugger core.
///
/// Most of these are called by the runtime at fixed points and are not
/// public; embedders use [`DebugApi::set_trap`] and [`DebugApi::clear_trap`].
#[derive(Debug, Clone, Copy)]
pub struct DebugApi;

impl DebugApi {
    /// The realm of the innermost frame and the frame's stack index.
    fn current_frame(context: &Context) -> Option<(RealmId, usize)> {
        let index = context.vm.frames.len().checked_sub(1)?;
        Some((context.vm.frames[index].realm, index))
    }

    /// A frame was just pushed.
    pub(crate) fn on_enter_frame(context: &mut Context) {
        let Some((realm, index)) = Self::current_frame(context) else {
            return;
        };
        dispatch(context, realm, Hook::EnterFrame, |context, debugger| {
            match debugger.frame_mirror(context, index) {
                Ok(frame) => {
                    call_hook(context, debugger, Hook::EnterFrame, &[Mirror::Frame(frame).into()], realm);
                }
                Err(err) => log::warn!("enterFrame hook skipped: {err}"),
            }
            Resumption::Continue
        });
    }

    /// The innermost frame is about to be popped.
    ///
    /// Every frame mirror of the frame dies. Leaving an eval frame also
    /// removes all breakpoints in the eval script.
    pub(crate) fn on_leave_frame(context: &mut Context) {
        if context.debug.debuggers.is_empty() {
            return;
        }
        let Some(frame) = context.vm.frame() else {
            return;
        };
        let (id, kind, script) = (frame.id, frame.kind, frame.script);
        for (_, debugger) in context.debug.debuggers.iter_mut() {
            if let Some(mirror) = debugger.caches.frames.remove(&id) {
                mirror.invalidate();
            }
        }
        if kind == FrameKind::Eval {
            let breakpoints: Vec<_> = context
                .debug
                .breakpoints
                .iter()
                .filter(|(_, bp)| bp.site.script == script)
                .map(|(id, _)| id)
                .collect();
            for breakpoint in breakpoints {
                context.destroy_breakpoint(breakpoint);
            }
        }
    }

    /// The interpreter fetched a patched opcode at `pc` of `script`.
    ///
    /// Breakpoint handlers run first, in the order they were set, then the
    /// native trap. The site is looked up again after each handler, since a
    /// handler may clear breakpoints.
    pub(crate) fn on_trap(context: &mut Context, script: ScriptId, pc: u32) -> TrapOutcome {
        let key = SiteKey::new(script, pc);
        let Some(site) = context.breakpoint_site(key) else {
            return TrapOutcome::Error(JsError::native(
                JsNativeErrorKind::Error,
                format!("no breakpoint site at offset {pc}"),
            ));
        };
        let Some((realm, index)) = Self::current_frame(context) else {
            return TrapOutcome::Error(JsError::native(JsNativeErrorKind::Error, "trap outside of a frame"));
        };

        let breakpoints = site.breakpoints.clone();
        log::trace!("breakpoint trap at {script:?}@{pc}: {} breakpoint(s)", breakpoints.len());
        for id in breakpoints {
            let still_set = context
                .breakpoint_site(key)
                .is_some_and(|site| site.breakpoints.contains(&id));
            let Some(breakpoint) = context.debug.breakpoints.get(id).filter(|_| still_set) else {
                continue;
            };
            let (debugger, handler) = (Debugger::from_id(breakpoint.debugger), breakpoint.handler);
            let active = debugger
                .state(context)
                .is_ok_and(|state| state.enabled && state.debuggees.contains(&realm));
            if !active {
                continue;
            }
            let target = debugger
                .frame_mirror(context, index)
                .and_then(|frame| Ok((frame, context.get(handler, "hit")?)));
            let resumption = match target {
                Ok((frame, hit)) if context.is_callable(&hit) => invoke(
                    context,
                    debugger,
                    &hit,
                    &JsValue::Object(handler),
                    &[Mirror::Frame(frame).into()],
                    realm,
                    true,
                ),
                // A handler without a callable `hit` ignores the trap.
                Ok(_) => Resumption::Continue,
                Err(err) => handle_uncaught_exception(context, debugger, err, realm, true, true),
            };
            if !resumption.is_continue() {
                return TrapOutcome::Complete(resumption);
            }
        }

        let trap = context.breakpoint_site(key).and_then(|site| site.trap.clone());
        if let Some((trap, closure)) = trap {
            match trap.call(context, key, &closure) {
                Ok(Resumption::Continue) => {}
                Ok(resumption) => return TrapOutcome::Complete(resumption),
                Err(err) => return TrapOutcome::Error(err),
            }
        }

        let byte = match context.breakpoint_site(key) {
            Some(site) => Some(site.real_opcode),
            None => context
                .scripts
                .get(script)
                .and_then(|s| s.code.get(pc as usize).copied()),
        };
        match byte.and_then(Opcode::from_byte) {
            Some(opcode) if opcode != Opcode::Trap => TrapOutcome::Execute(opcode),
            _ => TrapOutcome::Error(JsError::native(
                JsNativeErrorKind::Error,
                format!("invalid bytecode under breakpoint at offset {pc}"),
            )),
        }
    }

    /// A `debugger` statement is executing.
    pub(crate) fn on_debugger_statement(context: &mut Context) -> Resumption {
        let Some((realm, index)) = Self::current_frame(context) else {
            return Resumption::Continue;
        };
        if !context.realms.get(realm).is_some_and(|r| r.is_under_debug()) {
            return Resumption::Continue;
        }
        dispatch(context, realm, Hook::DebuggerStatement, |context, debugger| {
            match debugger.frame_mirror(context, index) {
                Ok(frame) => call_hook(
                    context,
                    debugger,
                    Hook::DebuggerStatement,
                    &[Mirror::Frame(frame).into()],
                    realm,
                ),
                Err(err) => handle_uncaught_exception(context, debugger, err, realm, true, true),
            }
        })
    }

    /// An exception is about to leave the innermost frame.
    ///
    /// Returns the value the frame returns instead, or the error to keep
    /// unwinding with. When `throw` hooks ran and let the exception pass,
    /// engine errors come back as the thrown value the hooks saw.
    pub(crate) fn on_exception_unwind(context: &mut Context, err: JsError) -> JsResult<JsValue> {
        if !err.is_catchable() {
            return Err(err);
        }
        let Some((realm, index)) = Self::current_frame(context) else {
            return Err(err);
        };
        if recipients(context, realm, Hook::Throw).is_empty() {
            return Err(err);
        }
        let Some(exception) = err.to_opaque(context, realm) else {
            return Err(err);
        };

        let resumption = dispatch(context, realm, Hook::Throw, |context, debugger| {
            let args = debugger.frame_mirror(context, index).and_then(|frame| {
                Ok([
                    Mirror::Frame(frame).into(),
                    debugger.wrap(context, exception.clone())?,
                ])
            });
            match args {
                Ok(args) => call_hook(context, debugger, Hook::Throw, &args, realm),
                Err(err) => handle_uncaught_exception(context, debugger, err, realm, true, true),
            }
        });

        match resumption {
            Resumption::Continue => Err(JsError::Thrown(exception)),
            Resumption::Return(value) => Ok(value),
            Resumption::Throw(value) => Err(JsError::Thrown(value)),
            Resumption::Abort => Err(JsError::Terminated),
        }
    }

    /// A script was compiled.
    pub(crate) fn on_new_script(context: &mut Context, script: ScriptId) {
        let Some(realm) = context.scripts.get(script).map(|s| s.realm) else {
            return;
        };
        if !context.realms.get(realm).is_some_and(|r| r.is_under_debug()) {
            return;
        }
        dispatch(context, realm, Hook::NewScript, |context, debugger| {
            match debugger.script_mirror(context, script) {
                Ok(mirror) => {
                    call_hook(context, debugger, Hook::NewScript, &[Mirror::Script(mirror).into()], realm);
                }
                Err(err) => log::warn!("newScript hook skipped: {err}"),
            }
            Resumption::Continue
        });
    }

    /// A script is about to be destroyed.
    ///
    /// Mirrors of the script die, and its breakpoints and breakpoint sites go
    /// away with it. The bytecode is not restored.
    pub(crate) fn on_destroy_script(context: &mut Context, script: ScriptId) {
        let doomed: Vec<_> = context
            .debug
            .breakpoints
            .iter()
            .filter(|(_, bp)| bp.site.script == script)
            .map(|(id, bp)| (id, bp.debugger))
            .collect();
        for (id, debugger) in doomed {
            context.debug.breakpoints.remove(id);
            if let Some(debugger) = context.debug.debuggers.get_mut(debugger) {
                debugger.breakpoints.retain(|&bp| bp != id);
            }
        }

        for (_, debugger) in context.debug.debuggers.iter_mut() {
            if let Some(mirror) = debugger.caches.non_held_scripts.remove(&script) {
                mirror.invalidate();
            }
            for mirror in debugger.caches.held_scripts.values() {
                if mirror.script_id() == Some(script) {
                    mirror.invalidate();
                }
            }
        }

        if let Some(realm) = context
            .scripts
            .get(script)
            .and_then(|s| context.realms.get_mut(s.realm))
        {
            let before = realm.breakpoint_sites.len();
            realm.breakpoint_sites.retain(|key, _| key.script != script);
            let removed = before - realm.breakpoint_sites.len();
            if removed > 0 {
                log::debug!("dropped {removed} breakpoint site(s) of destroyed script {script:?}");
            }
        }
    }

    /// A realm is being destroyed.
    ///
    /// Debuggers observing it stop observing it. Debuggers living in it are
    /// destroyed.
    pub(crate) fn on_realm_destroyed(context: &mut Context, realm: RealmId) {
        let observers = context
            .realms
            .get(realm)
            .map(|r| r.observers.clone())
            .unwrap_or_default();
        for id in observers {
            if let Err(err) = Debugger::from_id(id).remove_debuggee(context, realm) {
                log::warn!("detaching a debugger from a destroyed realm failed: {err}");
            }
        }
        let homed: Vec<_> = context
            .debug
            .debuggers
            .iter()
            .filter(|(_, d)| d.home == realm)
            .map(|(id, _)| id)
            .collect();
        for id in homed {
            destroy_debugger(context, id);
        }
    }

    /// Installs a native trap at `offset` of `script`.
    ///
    /// The trap runs whenever execution reaches the instruction, after any
    /// breakpoint handlers there. Installing a trap where one exists
    /// replaces it.
    pub fn set_trap(
        context: &mut Context,
        script: ScriptId,
        offset: u32,
        trap: NativeTrap,
        closure: JsValue,
    ) -> JsResult<()> {
        if !context.scripts.contains(script) {
            return Err(DebugError::Dead.into());
        }
        context.set_site_trap(SiteKey::new(script, offset), trap, closure)
    }

    /// Removes the native trap at `offset` of `script`, if there is one.
    pub fn clear_trap(context: &mut Context, script: ScriptId, offset: u32) {
        context.clear_site_trap(SiteKey::new(script, offset));
    }
}
