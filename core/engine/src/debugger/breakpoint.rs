//! Breakpoint sites and the breakpoints that share them.
//!
//! A [`BreakpointSite`] owns the patch of one instruction: while at least
//! one enabled breakpoint or a native trap uses the site, the opcode byte in
//! the script reads [`Opcode::Trap`] and the site keeps the original byte.
//! Bytecode is never written anywhere else.

use std::{fmt, rc::Rc};

use crate::{
    Context, DebugError, JsError, JsResult, JsValue,
    debugger::{DebuggerId, Resumption},
    gc::Id,
    object::ObjectId,
    realm::RealmId,
    script::ScriptId,
    vm::Opcode,
};

/// Identifier of a breakpoint.
pub type BreakpointId = Id<Breakpoint>;

/// The location of a breakpoint site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SiteKey {
    pub(crate) script: ScriptId,
    pub(crate) offset: u32,
}

impl SiteKey {
    /// Creates a key for `offset` in `script`.
    #[must_use]
    pub const fn new(script: ScriptId, offset: u32) -> Self {
        Self { script, offset }
    }

    /// The patched script.
    #[must_use]
    pub const fn script(self) -> ScriptId {
        self.script
    }

    /// The patched instruction offset.
    #[must_use]
    pub const fn offset(self) -> u32 {
        self.offset
    }
}

type TrapFn = dyn Fn(&mut Context, ScriptId, u32, &JsValue) -> JsResult<Resumption>;

/// A trap handler installed by the embedder rather than by a debugger.
///
/// It runs after the site's breakpoints and receives the script, the offset
/// and the closure value given at installation.
#[derive(Clone)]
pub struct NativeTrap {
    inner: Rc<TrapFn>,
}

impl NativeTrap {
    /// Creates a trap from a function pointer.
    #[must_use]
    pub fn from_fn_ptr(function: fn(&mut Context, ScriptId, u32, &JsValue) -> JsResult<Resumption>) -> Self {
        Self {
            inner: Rc::new(function),
        }
    }

    /// Creates a trap from a closure.
    pub fn from_closure<F>(closure: F) -> Self
    where
        F: Fn(&mut Context, ScriptId, u32, &JsValue) -> JsResult<Resumption> + 'static,
    {
        Self {
            inner: Rc::new(closure),
        }
    }

    pub(crate) fn call(&self, context: &mut Context, key: SiteKey, closure: &JsValue) -> JsResult<Resumption> {
        (self.inner)(context, key.script, key.offset, closure)
    }
}

impl fmt::Debug for NativeTrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NativeTrap")
    }
}

/// The patch point of one instruction.
#[derive(Debug)]
pub struct BreakpointSite {
    pub(crate) real_opcode: u8,
    pub(crate) enabled_count: u32,
    pub(crate) trap: Option<(NativeTrap, JsValue)>,
    pub(crate) breakpoints: Vec<BreakpointId>,
}

impl BreakpointSite {
    fn new(real_opcode: u8) -> Self {
        Self {
            real_opcode,
            enabled_count: 0,
            trap: None,
            breakpoints: Vec::new(),
        }
    }

    /// The opcode the patch replaced.
    #[must_use]
    pub fn real_opcode(&self) -> Option<Opcode> {
        Opcode::from_byte(self.real_opcode)
    }

    /// Number of enabled breakpoints using the site.
    #[must_use]
    pub const fn enabled_count(&self) -> u32 {
        self.enabled_count
    }

    /// Returns `true` if a native trap is installed.
    #[must_use]
    pub const fn has_trap(&self) -> bool {
        self.trap.is_some()
    }

    /// The breakpoints at this site, oldest first.
    #[must_use]
    pub fn breakpoints(&self) -> &[BreakpointId] {
        &self.breakpoints
    }

    fn is_patched(&self) -> bool {
        self.enabled_count > 0 || self.trap.is_some()
    }

    fn is_empty(&self) -> bool {
        self.breakpoints.is_empty() && self.trap.is_none()
    }
}

/// One debugger's request to stop at a site.
#[derive(Debug)]
pub struct Breakpoint {
    pub(crate) debugger: DebuggerId,
    pub(crate) site: SiteKey,
    pub(crate) handler: ObjectId,
}

impl Breakpoint {
    /// The owning debugger.
    #[must_use]
    pub const fn debugger(&self) -> DebuggerId {
        self.debugger
    }

    /// Where the breakpoint is.
    #[must_use]
    pub const fn site(&self) -> SiteKey {
        self.site
    }

    /// The handler object whose `hit` method runs.
    #[must_use]
    pub const fn handler(&self) -> ObjectId {
        self.handler
    }
}

impl Context {
    fn site_realm(&self, key: SiteKey) -> JsResult<RealmId> {
        Ok(self.scripts.get(key.script).ok_or(DebugError::Dead)?.realm)
    }

    /// Returns the site at `key`, if there is one.
    #[must_use]
    pub fn breakpoint_site(&self, key: SiteKey) -> Option<&BreakpointSite> {
        let realm = self.scripts.get(key.script)?.realm;
        self.realms.get(realm)?.breakpoint_sites.get(&key)
    }

    fn breakpoint_site_mut(&mut self, key: SiteKey) -> JsResult<&mut BreakpointSite> {
        let realm = self.site_realm(key)?;
        self.realms
            .get_mut(realm)
            .and_then(|realm| realm.breakpoint_sites.get_mut(&key))
            .ok_or_else(|| JsError::type_error(format!("no breakpoint site at offset {}", key.offset)))
    }

    /// Looks up the site at `key`, creating an unpatched one if needed.
    pub(crate) fn get_or_create_site(&mut self, key: SiteKey) -> JsResult<()> {
        let script = self.scripts.get(key.script).ok_or(DebugError::Dead)?;
        if !script.is_instruction_boundary(key.offset) {
            return Err(DebugError::InvalidOffset(key.offset).into());
        }
        let (realm, byte) = (script.realm, script.read_u8(key.offset));
        let realm = self.realms.get_mut(realm).ok_or(DebugError::NoSuchRealm)?;
        realm
            .breakpoint_sites
            .entry(key)
            .or_insert_with(|| BreakpointSite::new(byte));
        Ok(())
    }

    /// Counts one more enabled breakpoint, patching the instruction on the first.
    pub(crate) fn enable_site(&mut self, key: SiteKey) -> JsResult<()> {
        let site = self.breakpoint_site_mut(key)?;
        site.enabled_count += 1;
        if site.enabled_count == 1
            && site.trap.is_none()
            && let Err(err) = self.patch_site(key)
        {
            self.breakpoint_site_mut(key)?.enabled_count -= 1;
            return Err(err);
        }
        Ok(())
    }

    /// Counts one enabled breakpoint less, restoring the instruction on the last.
    pub(crate) fn disable_site(&mut self, key: SiteKey) -> JsResult<()> {
        let site = self.breakpoint_site_mut(key)?;
        debug_assert!(site.enabled_count > 0, "unbalanced breakpoint site disable");
        site.enabled_count = site.enabled_count.saturating_sub(1);
        if !site.is_patched() {
            self.unpatch_site(key);
        }
        Ok(())
    }

    /// Installs or replaces the native trap at `key`.
    pub(crate) fn set_site_trap(&mut self, key: SiteKey, trap: NativeTrap, closure: JsValue) -> JsResult<()> {
        self.get_or_create_site(key)?;
        let site = self.breakpoint_site_mut(key)?;
        let was_patched = site.is_patched();
        site.trap = Some((trap, closure));
        if !was_patched && let Err(err) = self.patch_site(key) {
            self.breakpoint_site_mut(key)?.trap = None;
            self.destroy_site_if_empty(key);
            return Err(err);
        }
        Ok(())
    }

    /// Removes the native trap at `key`, if any.
    pub(crate) fn clear_site_trap(&mut self, key: SiteKey) {
        let Ok(site) = self.breakpoint_site_mut(key) else {
            return;
        };
        if site.trap.take().is_none() {
            return;
        }
        if !site.is_patched() {
            self.unpatch_site(key);
        }
        self.destroy_site_if_empty(key);
    }

    /// Removes the site once no breakpoint and no trap uses it.
    pub(crate) fn destroy_site_if_empty(&mut self, key: SiteKey) {
        let Ok(realm) = self.site_realm(key) else {
            return;
        };
        let Some(realm) = self.realms.get_mut(realm) else {
            return;
        };
        if realm.breakpoint_sites.get(&key).is_some_and(BreakpointSite::is_empty) {
            if let Some(site) = realm.breakpoint_sites.shift_remove(&key) {
                debug_assert!(!site.is_patched(), "destroying a patched breakpoint site");
            }
            log::debug!("destroyed breakpoint site {:?}@{}", key.script, key.offset);
        }
    }

    /// Unlinks and drops a breakpoint, releasing its share of the site.
    pub(crate) fn destroy_breakpoint(&mut self, id: BreakpointId) {
        let Some(breakpoint) = self.debug.breakpoints.remove(id) else {
            return;
        };
        let enabled = match self.debug.debuggers.get_mut(breakpoint.debugger) {
            Some(debugger) => {
                debugger.breakpoints.retain(|&bp| bp != id);
                debugger.enabled
            }
            None => false,
        };
        if let Ok(site) = self.breakpoint_site_mut(breakpoint.site) {
            site.breakpoints.retain(|&bp| bp != id);
            if enabled && let Err(err) = self.disable_site(breakpoint.site) {
                log::warn!("failed to disable breakpoint site: {err}");
            }
        }
        self.destroy_site_if_empty(breakpoint.site);
    }

    fn patch_site(&mut self, key: SiteKey) -> JsResult<()> {
        self.write_opcode(key, Opcode::Trap as u8);
        let hooks = self.host_hooks();
        if let Err(err) = hooks.recompile_script(key.script, self) {
            let real = self.breakpoint_site_mut(key)?.real_opcode;
            self.write_opcode(key, real);
            return Err(DebugError::RecompileFailed(self.display_error(&err)).into());
        }
        log::debug!("patched breakpoint site {:?}@{}", key.script, key.offset);
        Ok(())
    }

    fn unpatch_site(&mut self, key: SiteKey) {
        let Ok(site) = self.breakpoint_site_mut(key) else {
            return;
        };
        let real = site.real_opcode;
        self.write_opcode(key, real);
        let hooks = self.host_hooks();
        if let Err(err) = hooks.recompile_script(key.script, self) {
            log::warn!(
                "recompiling script {:?} after removing a breakpoint failed: {}",
                key.script,
                self.display_error(&err)
            );
        }
        log::debug!("restored breakpoint site {:?}@{}", key.script, key.offset);
    }

    fn write_opcode(&mut self, key: SiteKey, byte: u8) {
        if let Some(slot) = self
            .scripts
            .get_mut(key.script)
            .and_then(|script| script.code.get_mut(key.offset as usize))
        {
            *slot = byte;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::{HostHooks, Source};

    #[derive(Default)]
    struct FlakyRecompile {
        calls: Cell<usize>,
        fail: Cell<bool>,
    }

    impl HostHooks for FlakyRecompile {
        fn recompile_script(&self, _: ScriptId, _: &mut Context) -> JsResult<()> {
            self.calls.set(self.calls.get() + 1);
            if self.fail.get() {
                return Err(JsError::type_error("no recompiler"));
            }
            Ok(())
        }
    }

    fn setup(hooks: Rc<FlakyRecompile>) -> (Context, SiteKey, u8) {
        let mut context = Context::builder().host_hooks(hooks).build();
        let holder = context
            .compile(Source::from_bytes("var a = 1;\na = a + 1;"))
            .expect("compile failed");
        let script = context.script_of_holder(holder).expect("holder without script");
        context.add_root(holder);
        let offset = context.scripts[script].lines[1].0;
        let byte = context.scripts[script].code[offset as usize];
        (context, SiteKey::new(script, offset), byte)
    }

    fn byte_at(context: &Context, key: SiteKey) -> u8 {
        context.scripts[key.script].code[key.offset as usize]
    }

    #[test]
    fn enabled_count_drives_the_patch() {
        let hooks = Rc::new(FlakyRecompile::default());
        let (mut context, key, original) = setup(hooks.clone());

        context.get_or_create_site(key).expect("site creation failed");
        context.enable_site(key).expect("enable failed");
        context.enable_site(key).expect("enable failed");
        assert_eq!(byte_at(&context, key), Opcode::Trap as u8);
        assert_eq!(hooks.calls.get(), 1);

        context.disable_site(key).expect("disable failed");
        assert_eq!(byte_at(&context, key), Opcode::Trap as u8);
        context.disable_site(key).expect("disable failed");
        assert_eq!(byte_at(&context, key), original);
        assert_eq!(hooks.calls.get(), 2);

        context.destroy_site_if_empty(key);
        assert!(context.breakpoint_site(key).is_none());
    }

    #[test]
    fn failed_recompile_rolls_the_patch_back() {
        let hooks = Rc::new(FlakyRecompile::default());
        let (mut context, key, original) = setup(hooks.clone());
        hooks.fail.set(true);

        context.get_or_create_site(key).expect("site creation failed");
        let err = context.enable_site(key).expect_err("enable succeeded");
        assert!(matches!(
            err.as_debug_error(),
            Some(DebugError::RecompileFailed(_))
        ));
        assert_eq!(byte_at(&context, key), original);
        assert_eq!(context.breakpoint_site(key).map(BreakpointSite::enabled_count), Some(0));

        context.destroy_site_if_empty(key);
        assert!(context.breakpoint_site(key).is_none());
    }

    #[test]
    fn native_trap_keeps_the_patch_independent_of_breakpoints() {
        let hooks = Rc::new(FlakyRecompile::default());
        let (mut context, key, original) = setup(hooks);
        let trap = NativeTrap::from_fn_ptr(|_, _, _, _| Ok(Resumption::Continue));

        context.set_site_trap(key, trap, JsValue::Undefined).expect("trap failed");
        context.enable_site(key).expect("enable failed");
        context.disable_site(key).expect("disable failed");
        assert_eq!(byte_at(&context, key), Opcode::Trap as u8);

        context.clear_site_trap(key);
        assert_eq!(byte_at(&context, key), original);
        assert!(context.breakpoint_site(key).is_none());
    }

    #[test]
    fn offsets_inside_an_instruction_are_rejected() {
        let (mut context, key, _) = setup(Rc::new(FlakyRecompile::default()));
        let inside = SiteKey::new(key.script, key.offset + 1);
        let err = context.get_or_create_site(inside).expect_err("site created");
        assert_eq!(err.as_debug_error(), Some(&DebugError::InvalidOffset(key.offset + 1)));
    }
}
