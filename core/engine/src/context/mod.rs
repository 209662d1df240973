//! The execution context: realms, the heap, compiled scripts and the VM.

mod hooks;

use std::rc::Rc;

use rustc_hash::FxHashMap;

pub use hooks::{DefaultHooks, HostHooks};

use crate::{
    DebugError, JsError, JsResult, JsValue,
    compiler::{self, ScriptData},
    debugger::{DebugApi, DebugState},
    gc::Arena,
    object::{JsObject, ObjectId, ObjectKind},
    realm::{Realm, RealmId},
    script::{Script, ScriptId, Source},
    vm::{CallFrame, FrameKind, Vm},
};

/// Builder for a [`Context`].
#[derive(Default)]
pub struct ContextBuilder {
    host_hooks: Option<Rc<dyn HostHooks>>,
    realm_name: Option<Rc<str>>,
}

impl std::fmt::Debug for ContextBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextBuilder")
            .field("host_hooks", &self.host_hooks.as_ref().map(|_| "HostHooks"))
            .field("realm_name", &self.realm_name)
            .finish()
    }
}

impl ContextBuilder {
    /// Creates a builder with the default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the host hooks of the context.
    #[must_use]
    pub fn host_hooks(mut self, host_hooks: Rc<dyn HostHooks>) -> Self {
        self.host_hooks = Some(host_hooks);
        self
    }

    /// Sets the name of the initial realm.
    #[must_use]
    pub fn realm_name(mut self, name: &str) -> Self {
        self.realm_name = Some(name.into());
        self
    }

    /// Builds the context with one initial realm.
    #[must_use]
    pub fn build(self) -> Context {
        let mut context = Context {
            realms: Arena::new(),
            heap: Arena::new(),
            scripts: Arena::new(),
            vm: Vm::default(),
            debug: DebugState::default(),
            roots: FxHashMap::default(),
            host_hooks: self.host_hooks.unwrap_or_else(|| Rc::new(DefaultHooks)),
            entered_realm: None,
        };
        let name = self.realm_name.unwrap_or_else(|| "main".into());
        let realm = context.create_realm(&name);
        context.entered_realm = Some(realm);
        context
    }
}

/// A runtime instance.
///
/// A context owns every realm, object and script. It is single threaded and
/// re-entrant: native functions and debugger hooks receive `&mut Context`
/// and may evaluate code, create realms or drive debuggers from inside a
/// running script.
pub struct Context {
    pub(crate) realms: Arena<Realm>,
    pub(crate) heap: Arena<JsObject>,
    pub(crate) scripts: Arena<Script>,
    pub(crate) vm: Vm,
    pub(crate) debug: DebugState,
    pub(crate) roots: FxHashMap<ObjectId, usize>,
    host_hooks: Rc<dyn HostHooks>,
    entered_realm: Option<RealmId>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("realms", &self.realms.len())
            .field("objects", &self.heap.len())
            .field("scripts", &self.scripts.len())
            .field("frames", &self.vm.frames.len())
            .field("debuggers", &self.debug.debuggers.len())
            .finish_non_exhaustive()
    }
}

impl Default for Context {
    fn default() -> Self {
        ContextBuilder::default().build()
    }
}

impl Context {
    /// Creates a [`ContextBuilder`].
    #[must_use]
    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    /// The host hooks of this context.
    #[must_use]
    pub fn host_hooks(&self) -> Rc<dyn HostHooks> {
        self.host_hooks.clone()
    }

    /// The realm code currently runs in: the realm of the innermost frame,
    /// or the entered realm when no code is running.
    ///
    /// # Panics
    ///
    /// Panics if the entered realm was never initialized, which
    /// [`ContextBuilder::build`] rules out.
    #[must_use]
    pub fn realm(&self) -> RealmId {
        match (self.vm.frame(), self.entered_realm) {
            (Some(frame), _) => frame.realm,
            (None, Some(realm)) => realm,
            (None, None) => unreachable!("a context always has an entered realm"),
        }
    }

    /// The global object of the current realm.
    ///
    /// # Panics
    ///
    /// Panics if the current realm was destroyed, which
    /// [`Context::destroy_realm`] rules out.
    #[must_use]
    pub fn global_object(&self) -> ObjectId {
        self.realms[self.realm()].global
    }

    /// The global object of `realm`.
    pub fn global_object_of(&self, realm: RealmId) -> JsResult<ObjectId> {
        Ok(self.realms.get(realm).ok_or(DebugError::NoSuchRealm)?.global)
    }

    /// Returns the realm behind `id`, if it still exists.
    #[must_use]
    pub fn get_realm(&self, id: RealmId) -> Option<&Realm> {
        self.realms.get(id)
    }

    /// Creates a new realm with its own global object.
    pub fn create_realm(&mut self, name: &str) -> RealmId {
        let heap = &mut self.heap;
        let realm = self.realms.insert_with(|id| {
            let global = heap.insert(JsObject::new(id, ObjectKind::Global));
            Realm::new(name.into(), global)
        });
        log::debug!("created realm {realm} ({name})");
        realm
    }

    /// Makes `realm` the realm top-level code runs in. Returns the previous one.
    pub fn enter_realm(&mut self, realm: RealmId) -> JsResult<RealmId> {
        if !self.realms.contains(realm) {
            return Err(DebugError::NoSuchRealm.into());
        }
        let previous = self.realm();
        self.entered_realm = Some(realm);
        Ok(previous)
    }

    /// Destroys a realm together with its objects and scripts.
    ///
    /// Debuggers observing the realm stop observing it; debuggers living in
    /// it are destroyed. Fails with [`DebugError::RealmBusy`] while the realm
    /// has frames on the stack or is the entered realm.
    pub fn destroy_realm(&mut self, realm: RealmId) -> JsResult<()> {
        if !self.realms.contains(realm) {
            return Err(DebugError::NoSuchRealm.into());
        }
        if self.entered_realm == Some(realm) || self.vm.frames.iter().any(|f| f.realm == realm) {
            return Err(DebugError::RealmBusy.into());
        }

        DebugApi::on_realm_destroyed(self, realm);

        let scripts: Vec<ScriptId> = self
            .scripts
            .iter()
            .filter(|(_, script)| script.realm == realm)
            .map(|(id, _)| id)
            .collect();
        for script in scripts {
            self.destroy_script(script);
        }

        let objects: Vec<ObjectId> = self
            .heap
            .iter()
            .filter(|(_, object)| object.realm == realm)
            .map(|(id, _)| id)
            .collect();
        for object in &objects {
            self.heap.remove(*object);
            self.roots.remove(object);
        }
        self.realms.remove(realm);
        self.prune_wrapper_caches();

        log::debug!("destroyed realm {realm} ({} objects)", objects.len());
        Ok(())
    }

    /// Drops cache entries whose wrapper or target is gone.
    pub(crate) fn prune_wrapper_caches(&mut self) {
        let heap = &self.heap;
        for (_, realm) in self.realms.iter_mut() {
            realm
                .wrappers
                .retain(|target, wrapper| heap.contains(*target) && heap.contains(*wrapper));
        }
    }

    /// The live call frames, oldest first.
    #[must_use]
    pub fn frames(&self) -> &[CallFrame] {
        self.vm.frames()
    }

    /// Returns the script behind `id`, if it still exists.
    #[must_use]
    pub fn script(&self, id: ScriptId) -> Option<&Script> {
        self.scripts.get(id)
    }

    /// The script kept alive by a holder object.
    #[must_use]
    pub fn script_of_holder(&self, holder: ObjectId) -> Option<ScriptId> {
        match self.heap.get(holder)?.kind {
            ObjectKind::ScriptHolder(script) => Some(script),
            _ => None,
        }
    }

    /// Keeps `object` alive across collections until a matching
    /// [`Context::remove_root`].
    pub fn add_root(&mut self, object: ObjectId) {
        *self.roots.entry(object).or_default() += 1;
    }

    /// Releases one [`Context::add_root`] of `object`.
    pub fn remove_root(&mut self, object: ObjectId) {
        if let Some(count) = self.roots.get_mut(&object) {
            *count -= 1;
            if *count == 0 {
                self.roots.remove(&object);
            }
        }
    }

    /// Compiles and runs `source` in the current realm.
    ///
    /// The program is a *non-held* script: it exists only while it runs and
    /// is destroyed before this returns.
    pub fn eval(&mut self, source: Source<'_>) -> JsResult<JsValue> {
        let realm = self.realm();
        let data = compiler::compile(source.text, source.start_line)?;
        let url: Rc<str> = source.url.into();
        let script = self.register_scripts(realm, &url, data, false);
        let global = self.global_object_of(realm)?;
        let frame = CallFrame::new(FrameKind::Global, realm, script, global, JsValue::Object(global));
        let result = self.run_frame(frame);
        self.destroy_script(script);
        result
    }

    /// Compiles `source` for the current realm without running it.
    ///
    /// Returns the holder object that keeps the script alive; the script is
    /// destroyed by the collector once the holder is unreachable.
    pub fn compile(&mut self, source: Source<'_>) -> JsResult<ObjectId> {
        let realm = self.realm();
        let data = compiler::compile(source.text, source.start_line)?;
        let url: Rc<str> = source.url.into();
        let script = self.register_scripts(realm, &url, data, true);
        self.scripts
            .get(script)
            .and_then(Script::holder)
            .ok_or_else(|| JsError::type_error("script has no holder"))
    }

    /// Runs a script compiled with [`Context::compile`].
    pub fn execute(&mut self, holder: ObjectId) -> JsResult<JsValue> {
        let script = self
            .script_of_holder(holder)
            .ok_or_else(|| JsError::type_error("not a compiled script"))?;
        let realm = self
            .scripts
            .get(script)
            .map(Script::realm)
            .ok_or_else(|| JsError::type_error("script has been destroyed"))?;
        let global = self.global_object_of(realm)?;
        let frame = CallFrame::new(FrameKind::Global, realm, script, global, JsValue::Object(global));
        self.run_frame(frame)
    }

    /// Evaluates `text` inside the frame at `frame_index` of the stack.
    ///
    /// The code sees the frame's scope chain, extended by `bindings` when
    /// given, and the frame's `this`. The eval script is non-held and is
    /// destroyed afterwards.
    pub(crate) fn eval_in_frame(
        &mut self,
        frame_index: usize,
        text: &str,
        bindings: &[(Rc<str>, JsValue)],
    ) -> JsResult<JsValue> {
        let frame = self
            .vm
            .frames
            .get(frame_index)
            .ok_or(DebugError::Dead)?;
        let (realm, scope, this, script) = (frame.realm, frame.scope, frame.this.clone(), frame.script);
        let url: Rc<str> = self
            .scripts
            .get(script)
            .map_or_else(|| "<eval>".into(), |s| s.url.clone());

        let data = compiler::compile(text, 1)?;
        let scope = if bindings.is_empty() {
            scope
        } else {
            let scope = self.alloc_object(realm, ObjectKind::Scope { parent: scope });
            for (name, value) in bindings {
                self.define_property(scope, name, value.clone())?;
            }
            scope
        };
        let script = self.register_scripts(realm, &url, data, false);
        let frame = CallFrame::new(FrameKind::Eval, realm, script, scope, this);
        let result = self.run_frame(frame);
        self.destroy_script(script);
        result
    }

    /// Turns a compiled tree into scripts, children first, then reports each
    /// new script to the debuggers of `realm`.
    fn register_scripts(&mut self, realm: RealmId, url: &Rc<str>, data: ScriptData, held: bool) -> ScriptId {
        let mut created = Vec::new();
        let script = self.register_script_tree(realm, url, data, held, &mut created);

        let holder = self.scripts.get(script).and_then(Script::holder);
        if let Some(holder) = holder {
            self.add_root(holder);
        }
        for &id in &created {
            DebugApi::on_new_script(self, id);
        }
        if let Some(holder) = holder {
            self.remove_root(holder);
        }
        script
    }

    fn register_script_tree(
        &mut self,
        realm: RealmId,
        url: &Rc<str>,
        data: ScriptData,
        held: bool,
        created: &mut Vec<ScriptId>,
    ) -> ScriptId {
        let children = data
            .children
            .into_iter()
            .map(|child| self.register_script_tree(realm, url, child, true, created))
            .collect();
        let id = self.scripts.insert(Script {
            realm,
            kind: data.kind,
            url: url.clone(),
            name: data.name,
            params: data.params,
            start_line: data.start_line,
            end_line: data.end_line,
            code: data.code,
            numbers: data.numbers,
            atoms: data.atoms,
            children,
            lines: data.lines,
            boundaries: data.boundaries,
            holder: None,
        });
        if held {
            let holder = self.alloc_object(realm, ObjectKind::ScriptHolder(id));
            if let Some(script) = self.scripts.get_mut(id) {
                script.holder = Some(holder);
            }
        }
        created.push(id);
        id
    }

    /// Destroys a script: debuggers are told, its breakpoint sites go away and
    /// the script leaves the arena.
    pub(crate) fn destroy_script(&mut self, script: ScriptId) {
        if !self.scripts.contains(script) {
            return;
        }
        DebugApi::on_destroy_script(self, script);
        self.scripts.remove(script);
    }
}
