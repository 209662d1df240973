//! How debuggers, mirrors and breakpoints interact with the collector.

mod common;

use std::{cell::Cell, rc::Rc};

use argus_engine::{Context, DebugError, Debugger, GcScope, JsValue, Mirror};
use common::{Log, compile_in, eval_in, install_hooks, line_offset, native, setup};

fn counting_hook(context: &mut Context, calls: Rc<Cell<u32>>) -> JsValue {
    native(context, "hook", move |_, _, _| {
        calls.set(calls.get() + 1);
        Ok(JsValue::Undefined)
    })
}

#[test]
fn debuggers_with_live_hooks_survive_collection() {
    let (mut context, debuggee, debugger, _) = setup();
    let calls = Rc::new(Cell::new(0));
    let hook = counting_hook(&mut context, calls.clone());
    install_hooks(&mut context, debugger, &[("debuggerStatement", hook)]);

    let stats = context.collect_garbage(GcScope::Full);
    assert_eq!(stats.debuggers_freed, 0);
    assert!(debugger.is_alive(&context));

    eval_in(&mut context, debuggee, "debugger;").unwrap();
    assert_eq!(calls.get(), 1);
}

#[test]
fn disabled_or_idle_debuggers_are_collected_and_detached() {
    let (mut context, debuggee, idle, _) = setup();
    let disabled = Debugger::new(&mut context, &[debuggee]).unwrap();
    let hook = counting_hook(&mut context, Rc::default());
    install_hooks(&mut context, disabled, &[("debuggerStatement", hook)]);
    disabled.set_enabled(&mut context, false).unwrap();

    let stats = context.collect_garbage(GcScope::Full);
    assert_eq!(stats.debuggers_freed, 2);
    assert!(!idle.is_alive(&context));
    assert!(!disabled.is_alive(&context));
    let realm = context.get_realm(debuggee).unwrap();
    assert!(!realm.is_under_debug());
    assert!(realm.observers().is_empty());
}

#[test]
fn debuggers_without_debuggees_are_collected() {
    let mut context = Context::default();
    let debugger = Debugger::new(&mut context, &[]).unwrap();
    let hook = counting_hook(&mut context, Rc::default());
    install_hooks(&mut context, debugger, &[("debuggerStatement", hook)]);

    let stats = context.collect_garbage(GcScope::Full);
    assert_eq!(stats.debuggers_freed, 1);
    assert_eq!(
        debugger.hooks(&context).unwrap_err().as_debug_error(),
        Some(&DebugError::NoSuchDebugger)
    );
}

#[test]
fn rooted_debugger_objects_keep_idle_debuggers() {
    let (mut context, _, debugger, _) = setup();
    let object = debugger.object(&context).unwrap();
    context.add_root(object);
    assert_eq!(context.collect_garbage(GcScope::Full).debuggers_freed, 0);

    context.remove_root(object);
    assert_eq!(context.collect_garbage(GcScope::Full).debuggers_freed, 1);
}

#[test]
fn breakpoints_keep_their_debugger_and_handler_alive() {
    let (mut context, debuggee, debugger, _) = setup();
    let (holder, script) = compile_in(&mut context, debuggee, "var hits = 0;\nhits = hits + 1;");
    context.add_root(holder);
    let calls = Rc::new(Cell::new(0));
    let hit = counting_hook(&mut context, calls.clone());
    let handler: JsValue = context.create_object(&[("hit", hit)]).into();
    let offset = line_offset(&context, script, 2);
    debugger.set_breakpoint(&mut context, script, offset, &handler).unwrap();

    let stats = context.collect_garbage(GcScope::Full);
    assert_eq!(stats.debuggers_freed, 0);
    context.execute(holder).unwrap();
    assert_eq!(calls.get(), 1);

    // Once the script is unreachable, nothing keeps the debugger.
    context.remove_root(holder);
    let stats = context.collect_garbage(GcScope::Full);
    assert_eq!(stats.scripts_freed, 1);
    assert_eq!(stats.debuggers_freed, 1);
    assert_eq!(context.get_realm(debuggee).unwrap().breakpoint_site_count(), 0);
}

#[test]
fn held_script_mirrors_die_with_their_holder() {
    let (mut context, debuggee, debugger, _) = setup();
    let scripts: Log<Mirror> = Log::default();
    let log = scripts.clone();
    let hook = native(&mut context, "newScript", move |_, args, _| {
        log.borrow_mut().extend(args.first().and_then(JsValue::as_mirror).cloned());
        Ok(JsValue::Undefined)
    });
    install_hooks(&mut context, debugger, &[("newScript", hook)]);

    let (kept, _) = compile_in(&mut context, debuggee, "1;");
    context.add_root(kept);
    compile_in(&mut context, debuggee, "2;");
    let stats = context.collect_garbage(GcScope::Full);
    assert_eq!(stats.scripts_freed, 1);

    let scripts = scripts.borrow();
    let [Mirror::Script(kept), Mirror::Script(dropped)] = scripts.as_slice() else {
        panic!("expected two scripts, got {scripts:?}");
    };
    assert!(kept.is_live());
    assert!(!dropped.is_live());
    let err = dropped.url(&context).unwrap_err();
    assert_eq!(err.as_debug_error(), Some(&DebugError::Dead));
}

#[test]
fn non_held_script_mirrors_die_when_the_script_is_destroyed() {
    let (mut context, debuggee, debugger, _) = setup();
    let scripts: Log<Mirror> = Log::default();
    let log = scripts.clone();
    let hook = native(&mut context, "newScript", move |_, args, context| {
        let script = args.first().and_then(JsValue::as_mirror).cloned().expect("script mirror");
        if let Mirror::Script(mirror) = &script {
            assert_eq!(mirror.line_count(context)?, 1);
        }
        log.borrow_mut().push(script);
        Ok(JsValue::Undefined)
    });
    install_hooks(&mut context, debugger, &[("newScript", hook)]);

    eval_in(&mut context, debuggee, "1 + 1;").unwrap();
    let scripts = scripts.borrow();
    assert_eq!(scripts.len(), 1);
    assert!(!scripts[0].is_live());
}

#[test]
fn object_mirrors_do_not_keep_their_referent() {
    let (mut context, debuggee, debugger, _) = setup();
    let hook = counting_hook(&mut context, Rc::default());
    install_hooks(&mut context, debugger, &[("debuggerStatement", hook)]);
    let kept = context.create_object_in(debuggee, &[]);
    let dropped = context.create_object_in(debuggee, &[]);
    let global = context.global_object_of(debuggee).unwrap();
    context.set(global, "kept", kept.into()).unwrap();

    let kept = debugger.wrap(&mut context, kept.into()).unwrap();
    let dropped = debugger.wrap(&mut context, dropped.into()).unwrap();
    context.collect_garbage(GcScope::Full);

    assert!(kept.as_mirror().unwrap().is_live());
    assert!(!dropped.as_mirror().unwrap().is_live());
    let err = debugger.unwrap(&context, &dropped).unwrap_err();
    assert_eq!(err.as_debug_error(), Some(&DebugError::Dead));
}

#[test]
fn single_realm_collection_spares_other_realms() {
    let (mut context, debuggee, debugger, _) = setup();
    let hook = counting_hook(&mut context, Rc::default());
    install_hooks(&mut context, debugger, &[("debuggerStatement", hook)]);
    let other = context.create_realm("other");
    let in_other = context.create_object_in(other, &[]);
    let in_debuggee = context.create_object_in(debuggee, &[]);
    let mirror = debugger.wrap(&mut context, in_debuggee.into()).unwrap();

    let stats = context.collect_garbage(GcScope::Realm(other));
    assert_eq!(stats.objects_freed, 1);
    assert!(context.object(in_other).is_none());
    assert!(context.object(in_debuggee).is_some());
    assert!(mirror.as_mirror().unwrap().is_live());

    // The mirror's cache lives outside the collected realm, so its key survives too.
    let stats = context.collect_garbage(GcScope::Realm(debuggee));
    assert_eq!(stats.objects_freed, 0);
    assert!(mirror.as_mirror().unwrap().is_live());

    context.collect_garbage(GcScope::Full);
    assert!(!mirror.as_mirror().unwrap().is_live());
}
