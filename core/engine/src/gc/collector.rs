use crate::{
    Context, JsValue,
    debugger::{self, reflection::Mirror},
    gc::Arena,
    object::{FunctionKind, JsObject, ObjectId, ObjectKind},
    realm::RealmId,
    script::ScriptId,
};

/// What a collection may free.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcScope {
    /// Every realm.
    Full,
    /// Only objects of one realm. Everything outside it is treated as live.
    Realm(RealmId),
}

/// What a collection freed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Heap objects removed.
    pub objects_freed: usize,
    /// Scripts destroyed because their holder died.
    pub scripts_freed: usize,
    /// Debuggers destroyed because nothing could reach or wake them.
    pub debuggers_freed: usize,
}

/// Mark state of one collection.
#[derive(Debug)]
pub(crate) struct Marker {
    scope: GcScope,
    worklist: Vec<ObjectId>,
}

impl Marker {
    fn new(scope: GcScope) -> Self {
        Self {
            scope,
            worklist: Vec::new(),
        }
    }

    pub(crate) const fn scope(&self) -> GcScope {
        self.scope
    }

    /// Returns `true` if `object` can be freed by this collection.
    pub(crate) fn in_scope(&self, heap: &Arena<JsObject>, object: ObjectId) -> bool {
        match self.scope {
            GcScope::Full => true,
            GcScope::Realm(realm) => heap.get(object).is_some_and(|o| o.realm == realm),
        }
    }

    /// Marks `object`, returning `true` if it was not marked before.
    pub(crate) fn mark(&mut self, heap: &mut Arena<JsObject>, object: ObjectId) -> bool {
        match heap.get_mut(object) {
            Some(o) if !o.marked => {
                o.marked = true;
                self.worklist.push(object);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn is_marked(heap: &Arena<JsObject>, object: ObjectId) -> bool {
        heap.get(object).is_some_and(|o| o.marked)
    }
}

impl Context {
    /// Runs a mark-sweep collection.
    ///
    /// Debuggers take part in marking: a debugger that could still fire a
    /// hook is kept alive even if nothing references its object, and weakly
    /// cached mirrors of dead referents are invalidated.
    pub fn collect_garbage(&mut self, scope: GcScope) -> GcStats {
        for (_, object) in self.heap.iter_mut() {
            object.marked = false;
        }
        let mut marker = Marker::new(scope);

        if let GcScope::Realm(realm) = scope {
            let outside: Vec<_> = self
                .heap
                .iter()
                .filter(|(_, o)| o.realm != realm)
                .map(|(id, _)| id)
                .collect();
            for id in outside {
                marker.mark(&mut self.heap, id);
            }
            debugger::gc::mark_cross_realm_weak_keys(self, &mut marker);
        }
        for root in self.roots() {
            marker.mark(&mut self.heap, root);
        }

        loop {
            while let Some(object) = marker.worklist.pop() {
                for edge in self.object_edges(object) {
                    marker.mark(&mut self.heap, edge);
                }
            }
            if !debugger::gc::mark_iteratively(self, &mut marker) {
                break;
            }
        }

        let debuggers_freed = debugger::gc::sweep(self);

        let heap = &self.heap;
        let dead_scripts: Vec<ScriptId> = self
            .scripts
            .iter()
            .filter(|(_, s)| s.holder.is_some_and(|h| !Marker::is_marked(heap, h)))
            .map(|(id, _)| id)
            .collect();
        for &script in &dead_scripts {
            self.destroy_script(script);
        }

        let dead: Vec<ObjectId> = self
            .heap
            .iter()
            .filter(|(_, o)| !o.marked)
            .map(|(id, _)| id)
            .collect();
        for object in &dead {
            self.heap.remove(*object);
            self.roots.remove(object);
        }
        self.prune_wrapper_caches();
        self.debug.epoch += 1;

        let stats = GcStats {
            objects_freed: dead.len(),
            scripts_freed: dead_scripts.len(),
            debuggers_freed,
        };
        log::debug!(
            "gc {:?}: freed {} objects, {} scripts, {} debuggers; {} objects live",
            scope,
            stats.objects_freed,
            stats.scripts_freed,
            stats.debuggers_freed,
            self.heap.len()
        );
        stats
    }

    fn roots(&self) -> Vec<ObjectId> {
        let mut roots: Vec<ObjectId> = self.realms.iter().map(|(_, r)| r.global).collect();
        roots.extend(self.roots.keys().copied());
        for frame in &self.vm.frames {
            self.value_edges(&frame.this, &mut roots);
            self.value_edges(&frame.rval, &mut roots);
            for arg in &frame.arguments {
                self.value_edges(arg, &mut roots);
            }
            roots.extend(frame.callee);
            roots.push(frame.scope);
            self.script_edges(frame.script, &mut roots);
        }
        for value in &self.vm.stack {
            self.value_edges(value, &mut roots);
        }
        for (id, script) in self.scripts.iter() {
            if script.holder.is_none() {
                self.script_edges(id, &mut roots);
            }
        }
        roots
    }

    /// A held script is kept by its holder; a non-held one keeps its children.
    fn script_edges(&self, script: ScriptId, edges: &mut Vec<ObjectId>) {
        let Some(script) = self.scripts.get(script) else {
            return;
        };
        match script.holder {
            Some(holder) => edges.push(holder),
            None => edges.extend(
                script
                    .children
                    .iter()
                    .filter_map(|&child| self.scripts.get(child)?.holder),
            ),
        }
    }

    fn value_edges(&self, value: &JsValue, edges: &mut Vec<ObjectId>) {
        match value {
            JsValue::Object(id) => edges.push(*id),
            JsValue::Mirror(mirror) => {
                if let Some(owner) = self.debug.debuggers.get(mirror.owner_id()) {
                    edges.push(owner.object);
                }
                match mirror {
                    Mirror::Object(m) => edges.extend(m.referent().ok()),
                    Mirror::Script(m) => edges.extend(m.holder()),
                    Mirror::Frame(_) => {}
                }
            }
            _ => {}
        }
    }

    fn object_edges(&self, id: ObjectId) -> Vec<ObjectId> {
        let mut edges = Vec::new();
        let Some(object) = self.heap.get(id) else {
            return edges;
        };
        edges.extend(object.proto);
        for value in object.properties.values() {
            self.value_edges(value, &mut edges);
        }
        match &object.kind {
            ObjectKind::Function(FunctionKind::Interpreted { script, scope }) => {
                edges.push(*scope);
                self.script_edges(*script, &mut edges);
            }
            ObjectKind::Scope { parent } => edges.push(*parent),
            ObjectKind::ScriptHolder(script) => {
                if let Some(script) = self.scripts.get(*script) {
                    edges.extend(
                        script
                            .children
                            .iter()
                            .filter_map(|&child| self.scripts.get(child)?.holder),
                    );
                }
            }
            ObjectKind::Wrapper(target) => edges.push(*target),
            ObjectKind::Debugger(debugger) => {
                if let Some(state) = self.debug.debuggers.get(*debugger) {
                    debugger::gc::trace_debugger(state, &mut edges);
                }
            }
            ObjectKind::Function(FunctionKind::Native { .. })
            | ObjectKind::Ordinary
            | ObjectKind::Global
            | ObjectKind::Error => {}
        }
        edges
    }
}
