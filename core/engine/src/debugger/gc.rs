//! How debuggers take part in garbage collection.
//!
//! A debugger's object is an ordinary heap object, but a debugger stays alive
//! without any reference to it for as long as it could still run code: it
//! has a debuggee and is enabled with hooks set or with breakpoints in live
//! scripts. Breakpoint handlers live while both their debugger and their
//! script do. Mirror caches hold their keys weakly.

use crate::{
    Context,
    debugger::{Debugger, DebuggerId, DebuggerState},
    gc::{GcScope, Marker},
    object::ObjectId,
    script::ScriptId,
};

/// Strong edges out of a debugger's object.
pub(crate) fn trace_debugger(state: &DebuggerState, edges: &mut Vec<ObjectId>) {
    edges.push(state.hooks);
    edges.extend(state.uncaught_exception_hook);
}

fn script_is_live(context: &Context, script: ScriptId) -> bool {
    context
        .scripts
        .get(script)
        .is_some_and(|s| s.holder.is_none_or(|holder| Marker::is_marked(&context.heap, holder)))
}

fn has_any_live_hooks(context: &Context, state: &DebuggerState) -> bool {
    state.enabled
        && (!state.hook_flags.is_empty()
            || state.breakpoints.iter().any(|&bp| {
                context
                    .debug
                    .breakpoints
                    .get(bp)
                    .is_some_and(|bp| script_is_live(context, bp.site.script))
            }))
}

/// Keeps the weak keys of debuggers outside a single-realm collection.
///
/// Such a debugger's mirrors may be referenced from places this collection
/// does not look at, so their referents must survive it.
pub(crate) fn mark_cross_realm_weak_keys(context: &mut Context, marker: &mut Marker) {
    let GcScope::Realm(collected) = marker.scope() else {
        return;
    };
    let mut keys = Vec::new();
    for (_, state) in context.debug.debuggers.iter() {
        if state.home == collected {
            continue;
        }
        keys.extend(state.caches.objects.keys());
        keys.extend(state.caches.held_scripts.keys());
    }
    for key in keys {
        marker.mark(&mut context.heap, key);
    }
}

/// Marks what debugger liveness rules keep alive given the current marks.
///
/// Returns `true` if anything was newly marked, in which case the collector
/// has to drain its worklist and ask again.
pub(crate) fn mark_iteratively(context: &mut Context, marker: &mut Marker) -> bool {
    let mut found = Vec::new();
    for (_, state) in context.debug.debuggers.iter() {
        if Marker::is_marked(&context.heap, state.object) {
            for &bp in &state.breakpoints {
                if let Some(bp) = context.debug.breakpoints.get(bp)
                    && script_is_live(context, bp.site.script)
                {
                    found.push(bp.handler);
                }
            }
        } else if marker.in_scope(&context.heap, state.object)
            && !state.debuggees.is_empty()
            && has_any_live_hooks(context, state)
        {
            found.push(state.object);
        }
    }
    for (_, realm) in context.realms.iter() {
        for (key, site) in &realm.breakpoint_sites {
            if let Some((_, closure)) = &site.trap
                && let Some(closure) = closure.as_object()
                && script_is_live(context, key.script)
            {
                found.push(closure);
            }
        }
    }

    let mut marked_any = false;
    for object in found {
        marked_any |= marker.mark(&mut context.heap, object);
    }
    marked_any
}

/// Destroys unreachable debuggers and sweeps the caches of the others.
///
/// Returns the number of destroyed debuggers.
pub(crate) fn sweep(context: &mut Context) -> usize {
    let dead: Vec<DebuggerId> = context
        .debug
        .debuggers
        .iter()
        .filter(|(_, state)| !Marker::is_marked(&context.heap, state.object))
        .map(|(id, _)| id)
        .collect();
    for &id in &dead {
        destroy_debugger(context, id);
    }

    let heap = &context.heap;
    let mut invalidated = 0;
    for (_, state) in context.debug.debuggers.iter_mut() {
        state.caches.objects.sweep(
            |key| Marker::is_marked(heap, key),
            |_, mirror| {
                mirror.invalidate();
                invalidated += 1;
            },
        );
        state.caches.held_scripts.sweep(
            |key| Marker::is_marked(heap, key),
            |_, mirror| {
                mirror.invalidate();
                invalidated += 1;
            },
        );
    }
    if invalidated > 0 {
        log::debug!("invalidated {invalidated} mirror(s) of collected referents");
    }
    dead.len()
}

/// Detaches a debugger from everything and frees it.
pub(crate) fn destroy_debugger(context: &mut Context, id: DebuggerId) {
    let Some(state) = context.debug.debuggers.get(id) else {
        return;
    };
    let debuggees: Vec<_> = state.debuggees.iter().copied().collect();
    let debugger = Debugger::from_id(id);
    for realm in debuggees {
        if let Err(err) = debugger.remove_debuggee(context, realm) {
            log::warn!("detaching debugger {id} from realm {realm} failed: {err}");
        }
    }
    let breakpoints = context
        .debug
        .debuggers
        .get(id)
        .map(|state| state.breakpoints.clone())
        .unwrap_or_default();
    for bp in breakpoints {
        context.destroy_breakpoint(bp);
    }
    if let Some(mut state) = context.debug.debuggers.remove(id) {
        state.caches.clear();
    }
    log::debug!("destroyed debugger {id}");
}
