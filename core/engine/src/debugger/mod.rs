//! The debugger core.
//!
//! A [`Debugger`] lives in its own realm, its *home*, and observes a set of
//! other realms, its *debuggees*. It never handles debuggee values directly:
//! frames, objects and scripts reach it as [`Mirror`]s, and values it hands
//! back are checked and unwrapped before the debuggee sees them.
//!
//! # Overview
//!
//! - [`Debugger`]: registration of debuggees, hooks, breakpoints and mirrors.
//! - [`DebugApi`]: the notifications the runtime sends to the debuggers, and
//!   native traps for embedders.
//! - [`breakpoint`]: breakpoint sites, the only place bytecode is patched.
//! - [`reflection`]: frame, object and script mirrors.
//!
//! Hooks are the properties `debuggerStatement`, `throw`, `newScript` and
//! `enterFrame` of the debugger's hooks object. The resumable ones decide how
//! the debuggee goes on by returning a resumption value; see [`Resumption`].
//!
//! # Example
//!
//! ```
//! use argus_engine::{Context, Debugger, Source};
//!
//! let mut context = Context::default();
//! let debuggee = context.create_realm("debuggee");
//! let debugger = Debugger::new(&mut context, &[debuggee]).unwrap();
//! assert!(debugger.has_debuggee(&context, debuggee));
//! assert!(context.get_realm(debuggee).unwrap().is_under_debug());
//!
//! debugger.remove_debuggee(&mut context, debuggee).unwrap();
//! assert!(!context.get_realm(debuggee).unwrap().is_under_debug());
//! ```

pub mod api;
pub mod breakpoint;
mod cache;
pub(crate) mod gc;
mod hooks;
pub mod reflection;
mod state;

pub use api::DebugApi;
pub use breakpoint::{Breakpoint, BreakpointId, BreakpointSite, NativeTrap, SiteKey};
pub use hooks::Resumption;
pub use reflection::{Completion, FrameMirror, Mirror, ObjectMirror, ScriptMirror};
pub use state::{DebuggerId, DebuggerState, Hook, HookFlags};

pub(crate) use api::TrapOutcome;
pub(crate) use state::DebugState;

use crate::{
    Context, DebugError, JsResult, JsValue,
    object::{JsObject, ObjectId, ObjectKind},
    realm::RealmId,
    script::ScriptId,
};

/// A handle to a debugger of a [`Context`].
///
/// Handles are plain identifiers. Every operation takes the context and fails
/// with [`DebugError::NoSuchDebugger`] once the debugger was destroyed, either
/// with its home realm or by the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Debugger {
    id: DebuggerId,
}

impl Debugger {
    pub(crate) const fn from_id(id: DebuggerId) -> Self {
        Self { id }
    }

    /// The identifier of this debugger.
    #[must_use]
    pub const fn id(self) -> DebuggerId {
        self.id
    }

    /// The state behind this handle.
    pub fn state(self, context: &Context) -> JsResult<&DebuggerState> {
        Ok(context
            .debug
            .debuggers
            .get(self.id)
            .ok_or(DebugError::NoSuchDebugger)?)
    }

    pub(crate) fn state_mut(self, context: &mut Context) -> JsResult<&mut DebuggerState> {
        Ok(context
            .debug
            .debuggers
            .get_mut(self.id)
            .ok_or(DebugError::NoSuchDebugger)?)
    }

    /// Returns `true` until the debugger is destroyed.
    #[must_use]
    pub fn is_alive(self, context: &Context) -> bool {
        context.debug.debuggers.contains(self.id)
    }

    /// The script object representing this debugger in its home realm.
    pub fn object(self, context: &Context) -> JsResult<ObjectId> {
        Ok(self.state(context)?.object)
    }

    /// The realm the debugger lives in.
    pub fn home(self, context: &Context) -> JsResult<RealmId> {
        Ok(self.state(context)?.home)
    }

    /// The debugger represented by `value`, if it is a live debugger object.
    #[must_use]
    pub fn from_object(context: &Context, value: &JsValue) -> Option<Self> {
        let object = context.object(value.as_object()?)?;
        match object.kind {
            ObjectKind::Debugger(id) if context.debug.debuggers.contains(id) => Some(Self::from_id(id)),
            _ => None,
        }
    }

    /// Creates a debugger in the current realm and adds `debuggees` to it.
    ///
    /// Nothing is left behind if any of the debuggees is rejected.
    pub fn new(context: &mut Context, debuggees: &[RealmId]) -> JsResult<Self> {
        let home = context.realm();
        let heap = &mut context.heap;
        let id = context.debug.debuggers.insert_with(|id| {
            let object = heap.insert(JsObject::new(home, ObjectKind::Debugger(id)));
            let hooks = heap.insert(JsObject::new(home, ObjectKind::Ordinary));
            DebuggerState::new(object, home, hooks)
        });
        let debugger = Self::from_id(id);
        log::debug!("created debugger {id} in realm {home}");

        for &realm in debuggees {
            if let Err(err) = debugger.add_debuggee(context, realm) {
                let objects = debugger
                    .state(context)
                    .map(|state| [state.object, state.hooks])
                    .ok();
                gc::destroy_debugger(context, id);
                for object in objects.into_iter().flatten() {
                    context.heap.remove(object);
                }
                return Err(err);
            }
        }
        Ok(debugger)
    }

    /// Starts observing `realm` and returns a mirror of its global object.
    ///
    /// Adding a realm twice is a no-op. Fails with
    /// [`DebugError::CycleDetected`] if the realm is the debugger's home or
    /// (transitively) hosts a debugger of it, and with
    /// [`DebugError::DebuggeeBusy`] if debug mode would have to be switched on
    /// while the realm has frames on the stack.
    pub fn add_debuggee(self, context: &mut Context, realm: RealmId) -> JsResult<JsValue> {
        let home = self.state(context)?.home;
        let target = context.realms.get(realm).ok_or(DebugError::NoSuchRealm)?;
        let global = target.global;
        if self.state(context)?.debuggees.contains(&realm) {
            return self.wrap(context, JsValue::Object(global));
        }

        let mut visited = vec![home];
        let mut pending = vec![home];
        while let Some(current) = pending.pop() {
            if current == realm {
                return Err(DebugError::CycleDetected.into());
            }
            let Some(current) = context.realms.get(current) else {
                continue;
            };
            for &observer in &current.observers {
                if let Some(observer) = context.debug.debuggers.get(observer)
                    && !visited.contains(&observer.home)
                {
                    visited.push(observer.home);
                    pending.push(observer.home);
                }
            }
        }

        let target = &context.realms[realm];
        let enters_debug_mode = !target.debug_mode;
        if enters_debug_mode && context.vm.frames.iter().any(|frame| frame.realm == realm) {
            return Err(DebugError::DebuggeeBusy.into());
        }

        context.realms[realm].observers.push(self.id);
        self.state_mut(context)?.debuggees.insert(realm);
        if enters_debug_mode {
            context.realms[realm].debug_mode = true;
            let hooks = context.host_hooks();
            if let Err(err) = hooks.on_debug_mode_change(realm, true, context) {
                let target = &mut context.realms[realm];
                target.debug_mode = false;
                target.observers.retain(|&id| id != self.id);
                self.state_mut(context)?.debuggees.shift_remove(&realm);
                return Err(DebugError::DebugModeFailed(context.display_error(&err)).into());
            }
        }
        log::debug!("debugger {} now observes realm {realm}", self.id);
        self.wrap(context, JsValue::Object(global))
    }

    /// Stops observing `realm`.
    ///
    /// Frame mirrors of the realm's frames die and the debugger's breakpoints
    /// in the realm's scripts are removed. The realm leaves debug mode when
    /// its last debugger goes. Removing a realm that is not a debuggee is a
    /// no-op.
    pub fn remove_debuggee(self, context: &mut Context, realm: RealmId) -> JsResult<()> {
        if !self.state(context)?.debuggees.contains(&realm) {
            return Ok(());
        }

        let frames: Vec<_> = context
            .vm
            .frames
            .iter()
            .filter(|frame| frame.realm == realm)
            .map(|frame| frame.id)
            .collect();
        let state = self.state_mut(context)?;
        for frame in frames {
            if let Some(mirror) = state.caches.frames.remove(&frame) {
                mirror.invalidate();
            }
        }

        let doomed: Vec<_> = self
            .state(context)?
            .breakpoints
            .iter()
            .copied()
            .filter(|&bp| {
                context
                    .debug
                    .breakpoints
                    .get(bp)
                    .and_then(|bp| context.scripts.get(bp.site.script))
                    .is_some_and(|script| script.realm == realm)
            })
            .collect();
        for bp in doomed {
            context.destroy_breakpoint(bp);
        }

        self.state_mut(context)?.debuggees.shift_remove(&realm);
        let Some(target) = context.realms.get_mut(realm) else {
            return Ok(());
        };
        target.observers.retain(|&id| id != self.id);
        if target.observers.is_empty() && target.debug_mode {
            target.debug_mode = false;
            let hooks = context.host_hooks();
            if let Err(err) = hooks.on_debug_mode_change(realm, false, context) {
                log::warn!("leaving debug mode for realm {realm} failed: {err}");
            }
        }
        log::debug!("debugger {} stopped observing realm {realm}", self.id);
        Ok(())
    }

    /// Returns `true` if `realm` is a debuggee.
    #[must_use]
    pub fn has_debuggee(self, context: &Context, realm: RealmId) -> bool {
        self.state(context)
            .is_ok_and(|state| state.debuggees.contains(&realm))
    }

    /// The debuggee realms, in the order they were added.
    pub fn debuggee_realms(self, context: &Context) -> JsResult<Vec<RealmId>> {
        Ok(self.state(context)?.debuggees.iter().copied().collect())
    }

    /// Mirrors of the debuggees' global objects, in the order they were added.
    pub fn debuggees(self, context: &mut Context) -> JsResult<Vec<JsValue>> {
        let mut globals = Vec::new();
        for realm in self.debuggee_realms(context)? {
            let global = context.global_object_of(realm)?;
            globals.push(self.wrap(context, JsValue::Object(global))?);
        }
        Ok(globals)
    }

    /// The hooks object.
    pub fn hooks(self, context: &Context) -> JsResult<JsValue> {
        Ok(JsValue::Object(self.state(context)?.hooks))
    }

    /// Replaces the hooks object.
    ///
    /// Which hooks are present is recorded now; the hook functions themselves
    /// are looked up each time an event fires.
    pub fn set_hooks(self, context: &mut Context, hooks: &JsValue) -> JsResult<()> {
        let Some(hooks) = hooks.as_object() else {
            return Err(DebugError::NotAnObject("hooks").into());
        };
        let mut flags = HookFlags::empty();
        for hook in Hook::ALL {
            if context.has_property(hooks, hook.name())? {
                flags |= hook.flag();
            }
        }
        let state = self.state_mut(context)?;
        state.hooks = hooks;
        state.hook_flags = flags;
        log::debug!("debugger {} hooks: {flags:?}", self.id);
        Ok(())
    }

    /// Returns `true` if hooks and breakpoints of this debugger fire.
    pub fn enabled(self, context: &Context) -> JsResult<bool> {
        Ok(self.state(context)?.enabled)
    }

    /// Enables or disables the debugger.
    ///
    /// Disabling keeps the breakpoints but releases their share of the
    /// patched instructions. If re-enabling fails on some site, the sites
    /// enabled so far are released again and the debugger stays disabled.
    pub fn set_enabled(self, context: &mut Context, enabled: bool) -> JsResult<()> {
        let state = self.state(context)?;
        if state.enabled == enabled {
            return Ok(());
        }
        let sites: Vec<_> = state
            .breakpoints
            .iter()
            .filter_map(|&bp| context.debug.breakpoints.get(bp).map(Breakpoint::site))
            .collect();

        if enabled {
            for (done, &site) in sites.iter().enumerate() {
                if let Err(err) = context.enable_site(site) {
                    for &site in &sites[..done] {
                        if let Err(err) = context.disable_site(site) {
                            log::warn!("rolling back breakpoint site failed: {err}");
                        }
                    }
                    return Err(err);
                }
            }
        } else {
            for site in sites {
                if let Err(err) = context.disable_site(site) {
                    log::warn!("disabling breakpoint site failed: {err}");
                }
            }
        }
        self.state_mut(context)?.enabled = enabled;
        Ok(())
    }

    /// The `uncaughtExceptionHook`, or `null`.
    pub fn uncaught_exception_hook(self, context: &Context) -> JsResult<JsValue> {
        Ok(self
            .state(context)?
            .uncaught_exception_hook
            .map_or(JsValue::Null, JsValue::Object))
    }

    /// Sets the function that receives exceptions escaping hooks.
    ///
    /// `null` or `undefined` removes it.
    pub fn set_uncaught_exception_hook(self, context: &mut Context, hook: &JsValue) -> JsResult<()> {
        let hook = match hook {
            JsValue::Null | JsValue::Undefined => None,
            JsValue::Object(id) if context.is_callable(hook) => Some(*id),
            _ => return Err(DebugError::NotCallable("uncaughtExceptionHook").into()),
        };
        self.state_mut(context)?.uncaught_exception_hook = hook;
        Ok(())
    }

    /// The innermost frame running in a debuggee.
    pub fn newest_frame(self, context: &mut Context) -> JsResult<Option<FrameMirror>> {
        let state = self.state(context)?;
        let index = context
            .vm
            .frames
            .iter()
            .rposition(|frame| state.debuggees.contains(&frame.realm));
        index
            .map(|index| self.frame_mirror(context, index))
            .transpose()
    }

    /// Sets a breakpoint at `offset` of `script`.
    ///
    /// `handler` is an object of the debugger's world; its `hit` method is
    /// called with the frame mirror whenever execution reaches the
    /// instruction, and its return value is a resumption value.
    pub fn set_breakpoint(
        self,
        context: &mut Context,
        script: ScriptId,
        offset: u32,
        handler: &JsValue,
    ) -> JsResult<()> {
        let realm = context.scripts.get(script).ok_or(DebugError::Dead)?.realm;
        let state = self.state(context)?;
        if !state.debuggees.contains(&realm) {
            return Err(DebugError::NotDebugging.into());
        }
        let enabled = state.enabled;
        let handler = handler
            .as_object()
            .ok_or(DebugError::NotAnObject("handler"))?;

        let site = SiteKey::new(script, offset);
        context.get_or_create_site(site)?;
        if enabled && let Err(err) = context.enable_site(site) {
            context.destroy_site_if_empty(site);
            return Err(err);
        }

        let id = context.debug.breakpoints.insert(Breakpoint {
            debugger: self.id,
            site,
            handler,
        });
        if let Some(site) = context
            .realms
            .get_mut(realm)
            .and_then(|realm| realm.breakpoint_sites.get_mut(&site))
        {
            site.breakpoints.push(id);
        }
        self.state_mut(context)?.breakpoints.push(id);
        log::debug!("debugger {} set breakpoint at {script:?}@{offset}", self.id);
        Ok(())
    }

    /// Handlers of this debugger's breakpoints in `script`, optionally only
    /// at `offset`, in site order.
    pub fn breakpoints(self, context: &Context, script: ScriptId, offset: Option<u32>) -> JsResult<Vec<JsValue>> {
        self.state(context)?;
        let realm = context.scripts.get(script).ok_or(DebugError::Dead)?.realm;
        let Some(realm) = context.realms.get(realm) else {
            return Ok(Vec::new());
        };
        let handlers = realm
            .breakpoint_sites
            .iter()
            .filter(|(key, _)| key.script == script && offset.is_none_or(|offset| key.offset == offset))
            .flat_map(|(_, site)| site.breakpoints.iter())
            .filter_map(|&bp| context.debug.breakpoints.get(bp))
            .filter(|bp| bp.debugger == self.id)
            .map(|bp| JsValue::Object(bp.handler))
            .collect();
        Ok(handlers)
    }

    fn breakpoints_where(self, context: &Context, keep: impl Fn(&Breakpoint) -> bool) -> JsResult<Vec<BreakpointId>> {
        Ok(self
            .state(context)?
            .breakpoints
            .iter()
            .copied()
            .filter(|&bp| context.debug.breakpoints.get(bp).is_some_and(&keep))
            .collect())
    }

    /// Removes this debugger's breakpoints in `script` that use `handler`.
    pub fn clear_breakpoint(self, context: &mut Context, script: ScriptId, handler: &JsValue) -> JsResult<()> {
        let Some(handler) = handler.as_object() else {
            return Ok(());
        };
        for bp in self.breakpoints_where(context, |bp| bp.site.script == script && bp.handler == handler)? {
            context.destroy_breakpoint(bp);
        }
        Ok(())
    }

    /// Removes this debugger's breakpoints in `script`.
    pub fn clear_all_breakpoints_in(self, context: &mut Context, script: ScriptId) -> JsResult<()> {
        for bp in self.breakpoints_where(context, |bp| bp.site.script == script)? {
            context.destroy_breakpoint(bp);
        }
        Ok(())
    }

    /// Removes every breakpoint of this debugger.
    pub fn clear_all_breakpoints(self, context: &mut Context) -> JsResult<()> {
        for bp in self.breakpoints_where(context, |_| true)? {
            context.destroy_breakpoint(bp);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{HostHooks, JsError, JsNativeErrorKind, Source};

    #[derive(Default)]
    struct ModeLog {
        changes: RefCell<Vec<(RealmId, bool)>>,
        refuse: bool,
    }

    impl HostHooks for ModeLog {
        fn on_debug_mode_change(&self, realm: RealmId, enabled: bool, _: &mut Context) -> JsResult<()> {
            if self.refuse && enabled {
                return Err(JsError::native(JsNativeErrorKind::Error, "no debug mode here"));
            }
            self.changes.borrow_mut().push((realm, enabled));
            Ok(())
        }
    }

    #[test]
    fn debug_mode_follows_the_observer_count() {
        let log = Rc::new(ModeLog::default());
        let mut context = Context::builder().host_hooks(log.clone()).build();
        let debuggee = context.create_realm("debuggee");

        let first = Debugger::new(&mut context, &[debuggee]).unwrap();
        let second = Debugger::new(&mut context, &[debuggee]).unwrap();
        assert_eq!(context.realms[debuggee].observers, vec![first.id(), second.id()]);

        first.remove_debuggee(&mut context, debuggee).unwrap();
        assert!(context.realms[debuggee].is_under_debug());
        second.remove_debuggee(&mut context, debuggee).unwrap();
        assert!(!context.realms[debuggee].is_under_debug());

        assert_eq!(*log.changes.borrow(), vec![(debuggee, true), (debuggee, false)]);
    }

    #[test]
    fn adding_a_debuggee_twice_is_a_no_op() {
        let mut context = Context::default();
        let debuggee = context.create_realm("debuggee");
        let debugger = Debugger::new(&mut context, &[debuggee]).unwrap();

        let first = debugger.add_debuggee(&mut context, debuggee).unwrap();
        let second = debugger.add_debuggee(&mut context, debuggee).unwrap();
        assert_eq!(first, second);
        assert_eq!(context.realms[debuggee].observers.len(), 1);
    }

    #[test]
    fn debuggees_must_not_reach_the_debugger() {
        let mut context = Context::default();
        let main = context.realm();
        let debuggee = context.create_realm("debuggee");
        let debugger = Debugger::new(&mut context, &[debuggee]).unwrap();

        let err = debugger.add_debuggee(&mut context, main).unwrap_err();
        assert_eq!(err.as_debug_error(), Some(&DebugError::CycleDetected));

        // A debugger homed in the debuggee cannot observe the main realm either.
        context.enter_realm(debuggee).unwrap();
        let nested = Debugger::new(&mut context, &[]).unwrap();
        let err = nested.add_debuggee(&mut context, main).unwrap_err();
        assert_eq!(err.as_debug_error(), Some(&DebugError::CycleDetected));
    }

    #[test]
    fn failed_registration_leaves_nothing_behind() {
        let log = Rc::new(ModeLog {
            refuse: true,
            ..ModeLog::default()
        });
        let mut context = Context::builder().host_hooks(log).build();
        let debuggee = context.create_realm("debuggee");
        let objects = context.heap.len();

        let err = Debugger::new(&mut context, &[debuggee]).unwrap_err();
        assert!(matches!(err.as_debug_error(), Some(DebugError::DebugModeFailed(_))));
        assert!(context.debug.debuggers.is_empty());
        assert!(context.realms[debuggee].observers.is_empty());
        assert!(!context.realms[debuggee].is_under_debug());
        assert_eq!(context.heap.len(), objects);
    }

    #[test]
    fn disabling_releases_the_patch_and_keeps_the_breakpoint() {
        let mut context = Context::default();
        let debuggee = context.create_realm("debuggee");
        let debugger = Debugger::new(&mut context, &[debuggee]).unwrap();
        context.enter_realm(debuggee).unwrap();
        let holder = context.compile(Source::from_bytes("var a = 1;")).unwrap();
        let script = context.script_of_holder(holder).unwrap();
        let handler = context.create_object(&[]);

        debugger.set_breakpoint(&mut context, script, 0, &handler.into()).unwrap();
        let key = SiteKey::new(script, 0);
        assert_eq!(context.breakpoint_site(key).unwrap().enabled_count(), 1);

        debugger.set_enabled(&mut context, false).unwrap();
        assert_eq!(context.breakpoint_site(key).unwrap().enabled_count(), 0);
        assert_eq!(debugger.breakpoints(&context, script, None).unwrap(), vec![handler.into()]);

        debugger.set_enabled(&mut context, true).unwrap();
        assert_eq!(context.breakpoint_site(key).unwrap().enabled_count(), 1);

        debugger.clear_breakpoint(&mut context, script, &handler.into()).unwrap();
        assert!(context.breakpoint_site(key).is_none());
    }

    #[test]
    fn uncaught_exception_hook_must_be_callable() {
        let mut context = Context::default();
        let debugger = Debugger::new(&mut context, &[]).unwrap();
        let err = debugger
            .set_uncaught_exception_hook(&mut context, &JsValue::from(1))
            .unwrap_err();
        assert_eq!(
            err.as_debug_error(),
            Some(&DebugError::NotCallable("uncaughtExceptionHook"))
        );
        assert_eq!(debugger.uncaught_exception_hook(&context).unwrap(), JsValue::Null);
    }
}
