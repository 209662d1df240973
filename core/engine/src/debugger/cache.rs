//! Mirror caches: one mirror per referent per debugger.
//!
//! Object mirrors and held-script mirrors are cached weakly, keyed by the
//! referent object and the script holder. Non-held scripts die with their
//! single evaluation, so their mirrors are keyed by script and invalidated
//! from [`DebugApi::on_destroy_script`](super::DebugApi). Frame mirrors are
//! invalidated when their frame is popped.

use rustc_hash::FxHashMap;

use crate::{
    Context, DebugError, JsResult, JsValue,
    debugger::{
        Debugger, DebuggerId,
        reflection::{FrameMirror, Mirror, ObjectMirror, ScriptMirror},
    },
    gc::WeakMap,
    object::ObjectId,
    script::ScriptId,
    vm::FrameId,
};

#[derive(Debug, Default)]
pub(crate) struct MirrorCaches {
    pub(crate) frames: FxHashMap<FrameId, FrameMirror>,
    pub(crate) objects: WeakMap<ObjectId, ObjectMirror>,
    pub(crate) held_scripts: WeakMap<ObjectId, ScriptMirror>,
    pub(crate) non_held_scripts: FxHashMap<ScriptId, ScriptMirror>,
}

impl MirrorCaches {
    /// Invalidates and forgets every cached mirror.
    pub(crate) fn clear(&mut self) {
        for (_, mirror) in self.frames.drain() {
            mirror.invalidate();
        }
        self.objects.drain(|_, mirror| mirror.invalidate());
        self.held_scripts.drain(|_, mirror| mirror.invalidate());
        for (_, mirror) in self.non_held_scripts.drain() {
            mirror.invalidate();
        }
    }
}

/// Fails with [`DebugError::NotMine`] unless `owner` is `debugger`.
pub(crate) fn check_owner(owner: DebuggerId, debugger: DebuggerId) -> JsResult<()> {
    if owner == debugger {
        Ok(())
    } else {
        Err(DebugError::NotMine.into())
    }
}

impl Debugger {
    /// Turns a debuggee value into a value the debugger can hold.
    ///
    /// Objects become [`ObjectMirror`]s, the same mirror every time for the
    /// same object. Primitives pass through.
    pub fn wrap(&self, context: &mut Context, value: JsValue) -> JsResult<JsValue> {
        match value {
            JsValue::Object(id) => Ok(JsValue::Mirror(Mirror::Object(self.object_mirror(context, id)?))),
            value => {
                let home = self.state(context)?.home;
                context.wrap_into(home, value)
            }
        }
    }

    /// Turns a debugger-side value back into a debuggee value.
    ///
    /// Object mirrors yield their referent and primitives pass through.
    /// Frame and script mirrors and plain objects of the debugger's world
    /// have no debuggee counterpart and are rejected.
    pub fn unwrap(&self, context: &Context, value: &JsValue) -> JsResult<JsValue> {
        match value {
            JsValue::Mirror(Mirror::Object(mirror)) => {
                check_owner(mirror.owner_id(), self.id)?;
                let referent = mirror.referent()?;
                if !context.heap.contains(referent) {
                    return Err(DebugError::Dead.into());
                }
                Ok(JsValue::Object(referent))
            }
            JsValue::Mirror(_) | JsValue::Object(_) => Err(DebugError::NotADebuggeeValue.into()),
            primitive => Ok(primitive.clone()),
        }
    }

    /// The cached object mirror of `object`.
    pub(crate) fn object_mirror(&self, context: &mut Context, object: ObjectId) -> JsResult<ObjectMirror> {
        let epoch = context.debug.epoch;
        let state = self.state_mut(context)?;
        if let Some(mirror) = state.caches.objects.get(&object) {
            return Ok(mirror.clone());
        }
        let mirror = ObjectMirror::new(self.id, object);
        state.caches.objects.insert(object, mirror.clone(), epoch);
        Ok(mirror)
    }

    /// The cached mirror of the frame at `index` of the stack.
    pub(crate) fn frame_mirror(&self, context: &mut Context, index: usize) -> JsResult<FrameMirror> {
        let frame = context.vm.frames.get(index).ok_or(DebugError::Dead)?.id;
        let state = self.state_mut(context)?;
        Ok(state
            .caches
            .frames
            .entry(frame)
            .or_insert_with(|| FrameMirror::new(self.id, frame))
            .clone())
    }

    /// The cached mirror of `script`.
    pub(crate) fn script_mirror(&self, context: &mut Context, script: ScriptId) -> JsResult<ScriptMirror> {
        let holder = context.scripts.get(script).ok_or(DebugError::Dead)?.holder;
        let epoch = context.debug.epoch;
        let state = self.state_mut(context)?;
        let Some(holder) = holder else {
            return Ok(state
                .caches
                .non_held_scripts
                .entry(script)
                .or_insert_with(|| ScriptMirror::new(self.id, script, None))
                .clone());
        };
        if let Some(mirror) = state.caches.held_scripts.get(&holder) {
            return Ok(mirror.clone());
        }
        let mirror = ScriptMirror::new(self.id, script, Some(holder));
        state.caches.held_scripts.insert(holder, mirror.clone(), epoch);
        Ok(mirror)
    }
}
