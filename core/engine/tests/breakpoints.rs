//! Breakpoint sites, patching and breakpoint handlers.

mod common;

use std::{cell::Cell, rc::Rc};

use argus_engine::{
    Context, DebugApi, DebugError, Debugger, HostHooks, JsError, JsResult, JsValue, NativeTrap, Resumption,
    ScriptId,
    debugger::SiteKey,
    vm::Opcode,
};
use common::{compile_in, eval_in, line_offset, native, setup};
use indoc::indoc;

const PROGRAM: &str = indoc! {"
    var g = 0;
    function f(a, b) {
        g = 1;
        return a + b;
    }
"};

fn code(context: &Context, script: ScriptId) -> Vec<u8> {
    context.script(script).expect("script destroyed").code().to_vec()
}

/// Compiles and runs [`PROGRAM`] and returns the script of `f`.
fn load(context: &mut Context, realm: argus_engine::RealmId) -> ScriptId {
    let (holder, script) = compile_in(context, realm, PROGRAM);
    context.add_root(holder);
    context.execute(holder).unwrap();
    context.script(script).unwrap().children()[0]
}

fn handler_returning(context: &mut Context, value: JsValue, hits: Rc<Cell<u32>>) -> JsValue {
    let hit = native(context, "hit", move |_, _, context| {
        hits.set(hits.get() + 1);
        Ok(context.create_object(&[("return", value.clone())]).into())
    });
    context.create_object(&[("hit", hit)]).into()
}

#[test]
fn patched_bytes_are_restored_exactly() {
    let (mut context, debuggee, debugger, _) = setup();
    let f = load(&mut context, debuggee);
    let original = code(&context, f);
    let handler: JsValue = context.create_object(&[]).into();

    let offsets: Vec<u32> = context
        .script(f)
        .unwrap()
        .all_offsets()
        .into_iter()
        .flat_map(|(_, offsets)| offsets)
        .collect();
    assert!(!offsets.is_empty());
    for &offset in &offsets {
        debugger.set_breakpoint(&mut context, f, offset, &handler).unwrap();
        assert_eq!(context.script(f).unwrap().opcode_at(offset), Some(Opcode::Trap));
    }

    debugger.clear_all_breakpoints(&mut context).unwrap();
    assert_eq!(code(&context, f), original);
    for &offset in &offsets {
        assert!(context.breakpoint_site(SiteKey::new(f, offset)).is_none());
    }
}

#[test]
fn returning_from_a_breakpoint_skips_the_rest_of_the_call() {
    let (mut context, debuggee, debugger, _) = setup();
    let f = load(&mut context, debuggee);
    let hits = Rc::new(Cell::new(0));
    let handler = handler_returning(&mut context, 42.into(), hits.clone());

    let offset = line_offset(&context, f, 3);
    debugger.set_breakpoint(&mut context, f, offset, &handler).unwrap();

    let result = eval_in(&mut context, debuggee, "f(1, 2) + 100").unwrap();
    assert_eq!(result, JsValue::from(142));
    assert_eq!(hits.get(), 1);
    assert_eq!(eval_in(&mut context, debuggee, "g").unwrap(), JsValue::from(0));
}

#[test]
fn two_debuggers_share_one_site() {
    let (mut context, debuggee, first, _) = setup();
    let second = Debugger::new(&mut context, &[debuggee]).unwrap();
    let f = load(&mut context, debuggee);
    let original = code(&context, f);
    let offset = line_offset(&context, f, 4);
    let key = SiteKey::new(f, offset);
    let (h1, h2): (JsValue, JsValue) = (context.create_object(&[]).into(), context.create_object(&[]).into());

    first.set_breakpoint(&mut context, f, offset, &h1).unwrap();
    second.set_breakpoint(&mut context, f, offset, &h2).unwrap();
    assert_eq!(context.breakpoint_site(key).unwrap().enabled_count(), 2);

    first.set_enabled(&mut context, false).unwrap();
    assert_eq!(context.breakpoint_site(key).unwrap().enabled_count(), 1);
    assert_eq!(context.script(f).unwrap().opcode_at(offset), Some(Opcode::Trap));

    second.set_enabled(&mut context, false).unwrap();
    assert_eq!(context.breakpoint_site(key).unwrap().enabled_count(), 0);
    assert_eq!(code(&context, f), original);

    first.clear_breakpoint(&mut context, f, &h1).unwrap();
    assert!(context.breakpoint_site(key).is_some());
    second.clear_breakpoint(&mut context, f, &h2).unwrap();
    assert!(context.breakpoint_site(key).is_none());
    assert_eq!(code(&context, f), original);
}

#[test]
fn breakpoints_are_listed_per_debugger_in_site_order() {
    let (mut context, debuggee, first, _) = setup();
    let second = Debugger::new(&mut context, &[debuggee]).unwrap();
    let f = load(&mut context, debuggee);
    let (line3, line4) = (line_offset(&context, f, 3), line_offset(&context, f, 4));
    let handlers: Vec<JsValue> = (0..3).map(|_| context.create_object(&[]).into()).collect();

    first.set_breakpoint(&mut context, f, line4, &handlers[0]).unwrap();
    first.set_breakpoint(&mut context, f, line3, &handlers[1]).unwrap();
    second.set_breakpoint(&mut context, f, line3, &handlers[2]).unwrap();

    assert_eq!(
        first.breakpoints(&context, f, None).unwrap(),
        vec![handlers[0].clone(), handlers[1].clone()]
    );
    assert_eq!(first.breakpoints(&context, f, Some(line3)).unwrap(), vec![handlers[1].clone()]);
    assert_eq!(second.breakpoints(&context, f, None).unwrap(), vec![handlers[2].clone()]);
}

#[test]
fn breakpoints_need_a_debuggee_script_and_a_valid_offset() {
    let (mut context, debuggee, debugger, _) = setup();
    let f = load(&mut context, debuggee);
    let handler: JsValue = context.create_object(&[]).into();

    let other = context.create_realm("other");
    let g = load(&mut context, other);
    let err = debugger.set_breakpoint(&mut context, g, 0, &handler).unwrap_err();
    assert_eq!(err.as_debug_error(), Some(&DebugError::NotDebugging));

    let past_end = u32::try_from(code(&context, f).len()).unwrap();
    let err = debugger.set_breakpoint(&mut context, f, past_end, &handler).unwrap_err();
    assert_eq!(err.as_debug_error(), Some(&DebugError::InvalidOffset(past_end)));

    let err = debugger.set_breakpoint(&mut context, f, 0, &JsValue::from(1)).unwrap_err();
    assert_eq!(err.as_debug_error(), Some(&DebugError::NotAnObject("handler")));
    assert!(context.breakpoint_site(SiteKey::new(f, 0)).is_none());
}

struct FailingRecompile;

impl HostHooks for FailingRecompile {
    fn recompile_script(&self, _: ScriptId, _: &mut Context) -> JsResult<()> {
        Err(JsError::type_error("code cache is read-only"))
    }
}

#[test]
fn failed_recompile_leaves_no_breakpoint() {
    let mut context = Context::builder().host_hooks(Rc::new(FailingRecompile)).build();
    let debuggee = context.create_realm("debuggee");
    let debugger = Debugger::new(&mut context, &[debuggee]).unwrap();
    let f = load(&mut context, debuggee);
    let original = code(&context, f);
    let handler: JsValue = context.create_object(&[]).into();

    let err = debugger.set_breakpoint(&mut context, f, 0, &handler).unwrap_err();
    assert!(matches!(err.as_debug_error(), Some(DebugError::RecompileFailed(_))));
    assert_eq!(code(&context, f), original);
    assert!(context.breakpoint_site(SiteKey::new(f, 0)).is_none());
    assert!(debugger.breakpoints(&context, f, None).unwrap().is_empty());
}

#[test]
fn handlers_without_a_callable_hit_are_skipped() {
    let (mut context, debuggee, debugger, reports) = setup();
    let f = load(&mut context, debuggee);
    let offset = line_offset(&context, f, 3);
    let hits = Rc::new(Cell::new(0));

    let empty: JsValue = context.create_object(&[]).into();
    let number: JsValue = context.create_object(&[("hit", 5.into())]).into();
    let counting = handler_returning(&mut context, 7.into(), hits.clone());
    for handler in [&empty, &number, &counting] {
        debugger.set_breakpoint(&mut context, f, offset, handler).unwrap();
    }

    let result = eval_in(&mut context, debuggee, "f(1, 2)").unwrap();
    assert_eq!(result, JsValue::from(7));
    assert_eq!(hits.get(), 1);
    assert!(reports.0.borrow().is_empty());
}

#[test]
fn handlers_may_clear_breakpoints_of_the_same_site() {
    let (mut context, debuggee, debugger, _) = setup();
    let f = load(&mut context, debuggee);
    let offset = line_offset(&context, f, 3);
    let second_hits = Rc::new(Cell::new(0));

    let hits = second_hits.clone();
    let hit = native(&mut context, "hit", move |_, _, _| {
        hits.set(hits.get() + 1);
        Ok(JsValue::Undefined)
    });
    let second: JsValue = context.create_object(&[("hit", hit)]).into();

    let victim = second.clone();
    let clear = native(&mut context, "hit", move |_, _, context| {
        debugger.clear_breakpoint(context, f, &victim)?;
        Ok(JsValue::Undefined)
    });
    let first: JsValue = context.create_object(&[("hit", clear)]).into();

    debugger.set_breakpoint(&mut context, f, offset, &first).unwrap();
    debugger.set_breakpoint(&mut context, f, offset, &second).unwrap();

    let result = eval_in(&mut context, debuggee, "f(1, 2)").unwrap();
    assert_eq!(result, JsValue::from(3));
    assert_eq!(second_hits.get(), 0);
    assert_eq!(eval_in(&mut context, debuggee, "g").unwrap(), JsValue::from(1));
}

#[test]
fn native_traps_run_after_breakpoints_and_keep_their_own_patch() {
    let (mut context, debuggee, debugger, _) = setup();
    let f = load(&mut context, debuggee);
    let original = code(&context, f);
    let offset = line_offset(&context, f, 4);
    let trap_hits = Rc::new(Cell::new(0));

    let hits = trap_hits.clone();
    let trap = NativeTrap::from_closure(move |_, script, at, closure| {
        assert_eq!((script, at), (f, offset));
        assert_eq!(closure, &JsValue::from("closure"));
        hits.set(hits.get() + 1);
        Ok(Resumption::Continue)
    });
    DebugApi::set_trap(&mut context, f, offset, trap, "closure".into()).unwrap();
    let handler: JsValue = context.create_object(&[]).into();
    debugger.set_breakpoint(&mut context, f, offset, &handler).unwrap();
    debugger.clear_breakpoint(&mut context, f, &handler).unwrap();
    assert_eq!(context.script(f).unwrap().opcode_at(offset), Some(Opcode::Trap));

    assert_eq!(eval_in(&mut context, debuggee, "f(2, 3)").unwrap(), JsValue::from(5));
    assert_eq!(trap_hits.get(), 1);

    DebugApi::clear_trap(&mut context, f, offset);
    assert_eq!(code(&context, f), original);
    assert!(context.breakpoint_site(SiteKey::new(f, offset)).is_none());
}

#[test]
fn native_trap_resumptions_complete_the_frame() {
    let (mut context, debuggee, _, _) = setup();
    let f = load(&mut context, debuggee);
    let offset = line_offset(&context, f, 3);
    DebugApi::set_trap(
        &mut context,
        f,
        offset,
        NativeTrap::from_fn_ptr(|_, _, _, _| Ok(Resumption::Throw("trapped".into()))),
        JsValue::Undefined,
    )
    .unwrap();

    let err = eval_in(&mut context, debuggee, "f(1, 2)").unwrap_err();
    assert!(matches!(err, JsError::Thrown(value) if value == JsValue::from("trapped")));
}

#[test]
fn breakpoints_in_eval_code_go_away_with_it() {
    let (mut context, debuggee, debugger, _) = setup();
    let hits = Rc::new(Cell::new(0));
    let counter = hits.clone();
    let hit = native(&mut context, "hit", move |_, _, _| {
        counter.set(counter.get() + 1);
        Ok(JsValue::Undefined)
    });
    let handler: JsValue = context.create_object(&[("hit", hit)]).into();

    let sites = Rc::new(std::cell::RefCell::new(Vec::new()));
    let seen = sites.clone();
    let hook = native(&mut context, "newScript", move |_, args, context| {
        if let Some(argus_engine::Mirror::Script(script)) = args.first().and_then(JsValue::as_mirror) {
            let offset = script.line_offsets(context, 1)?[0];
            script.set_breakpoint(context, offset, &handler)?;
            seen.borrow_mut().push(SiteKey::new(script.script_id().unwrap(), offset));
        }
        Ok(JsValue::Undefined)
    });
    common::install_hooks(&mut context, debugger, &[("newScript", hook)]);

    assert_eq!(eval_in(&mut context, debuggee, "1 + 2").unwrap(), JsValue::from(3));
    assert_eq!(hits.get(), 1);
    let sites = sites.borrow();
    assert_eq!(sites.len(), 1);
    assert!(context.script(sites[0].script()).is_none());
    assert!(context.breakpoint_site(sites[0]).is_none());
    assert!(debugger.breakpoints(&context, sites[0].script(), None).is_err());
}

#[test]
fn removing_the_debuggee_removes_its_breakpoints() {
    let (mut context, debuggee, debugger, _) = setup();
    let f = load(&mut context, debuggee);
    let original = code(&context, f);
    let hits = Rc::new(Cell::new(0));
    let handler = handler_returning(&mut context, 7.into(), hits.clone());
    let offset = line_offset(&context, f, 3);
    debugger.set_breakpoint(&mut context, f, offset, &handler).unwrap();
    assert_ne!(code(&context, f), original);

    debugger.remove_debuggee(&mut context, debuggee).unwrap();
    assert_eq!(code(&context, f), original);
    assert!(context.breakpoint_site(SiteKey::new(f, offset)).is_none());
    assert_eq!(eval_in(&mut context, debuggee, "f(1, 2)").unwrap(), JsValue::from(3));
    assert_eq!(hits.get(), 0);
}
