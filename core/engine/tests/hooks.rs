//! Hook dispatch: throw, enterFrame, newScript and uncaught exceptions in hooks.

mod common;

use std::{cell::Cell, rc::Rc};

use argus_engine::{JsError, JsValue, Mirror, vm::FrameKind};
use common::{Log, eval_in, install_hooks, native, setup};
use indoc::indoc;
use test_case::test_case;

const THROWING: &str = indoc! {"
    function f() {
        throw 7;
    }
    function g() {
        return f() + 1;
    }
    g();
"};

#[test]
fn throw_hook_sees_each_exception_once() {
    let (mut context, debuggee, debugger, _) = setup();
    let seen: Log<(FrameKind, JsValue)> = Log::default();
    let log = seen.clone();
    let hook = native(&mut context, "throw", move |_, args, context| {
        let Some(Mirror::Frame(frame)) = args.first().and_then(JsValue::as_mirror) else {
            panic!("throw hook without a frame");
        };
        log.borrow_mut().push((frame.kind(context)?, args[1].clone()));
        Ok(JsValue::Undefined)
    });
    install_hooks(&mut context, debugger, &[("throw", hook)]);

    let err = eval_in(&mut context, debuggee, THROWING).unwrap_err();
    assert!(matches!(err, JsError::Thrown(value) if value == JsValue::from(7)));
    assert_eq!(*seen.borrow(), vec![(FrameKind::Call, JsValue::from(7))]);
}

/// Installs `call(f)` in `realm`: calls `f`, then either passes its error on
/// or drops it and raises a fresh `TypeError`.
fn install_call(context: &mut argus_engine::Context, realm: argus_engine::RealmId, fresh: bool) {
    let call = context.create_function_in(
        realm,
        "call",
        argus_engine::NativeFunction::from_closure(move |_, args, context| {
            let result = context.call(&args[0], &JsValue::Undefined, &[]);
            match result {
                Err(_) if fresh => Err(JsError::type_error("wrapped")),
                other => other,
            }
        }),
    );
    let global = context.global_object_of(realm).unwrap();
    context.set(global, "call", call.into()).unwrap();
}

#[test_case(false, 1 ; "an error passed through a native is the same exception")]
#[test_case(true, 2 ; "a native raising a new error is a new exception")]
fn throw_hook_and_natives(fresh: bool, expected: usize) {
    let (mut context, debuggee, debugger, _) = setup();
    install_call(&mut context, debuggee, fresh);
    let seen: Log<JsValue> = Log::default();
    let log = seen.clone();
    let hook = native(&mut context, "throw", move |_, args, _| {
        log.borrow_mut().push(args[1].clone());
        Ok(JsValue::Undefined)
    });
    install_hooks(&mut context, debugger, &[("throw", hook)]);

    let err = eval_in(&mut context, debuggee, "function boom() { throw 1; }\ncall(boom);").unwrap_err();
    assert!(matches!(err, JsError::Thrown(_)), "{err:?}");
    let seen = seen.borrow();
    assert_eq!(seen.len(), expected);
    assert_eq!(seen[0], JsValue::from(1));
    if fresh {
        assert!(matches!(seen[1], JsValue::Mirror(Mirror::Object(_))), "{seen:?}");
    }
}

#[test_case("({ return: 35 })", Ok(36) ; "return replaces the exception")]
#[test_case("({ throw: 'other' })", Err("other") ; "throw replaces the exception")]
#[test_case("undefined", Err("7") ; "continue keeps the exception")]
fn throw_hook_resumptions(resumption: &str, expected: Result<i32, &str>) {
    let (mut context, debuggee, debugger, _) = setup();
    let hooks = context
        .eval(argus_engine::Source::from_bytes(&format!(
            "({{ throw: function (frame, exception) {{ return {resumption}; }} }})"
        )))
        .unwrap();
    debugger.set_hooks(&mut context, &hooks).unwrap();

    let result = eval_in(&mut context, debuggee, THROWING);
    match (result, expected) {
        (Ok(value), Ok(expected)) => assert_eq!(value, JsValue::from(expected)),
        (Err(JsError::Thrown(value)), Err(expected)) => assert_eq!(value.to_string(), expected),
        (result, expected) => panic!("got {result:?}, expected {expected:?}"),
    }
}

#[test]
fn engine_errors_reach_the_throw_hook_as_values() {
    let (mut context, debuggee, debugger, _) = setup();
    let seen: Log<String> = Log::default();
    let log = seen.clone();
    let hook = native(&mut context, "throw", move |_, args, context| {
        let text = match &args[1] {
            JsValue::Mirror(Mirror::Object(error)) => {
                let argus_engine::Completion::Return(message) = error.get_property(context, "message")? else {
                    panic!("reading the message failed");
                };
                message.to_string()
            }
            other => panic!("not an error object: {other:?}"),
        };
        log.borrow_mut().push(text);
        Ok(JsValue::Undefined)
    });
    install_hooks(&mut context, debugger, &[("throw", hook)]);

    let err = eval_in(&mut context, debuggee, "missing;").unwrap_err();
    assert!(matches!(err, JsError::Thrown(_)));
    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].contains("missing"), "{seen:?}");
}

#[test]
fn enter_frame_fires_for_every_frame() {
    let (mut context, debuggee, debugger, _) = setup();
    let kinds: Log<FrameKind> = Log::default();
    let log = kinds.clone();
    let hook = native(&mut context, "enterFrame", move |_, args, context| {
        if let Some(Mirror::Frame(frame)) = args.first().and_then(JsValue::as_mirror) {
            log.borrow_mut().push(frame.kind(context)?);
        }
        Ok(JsValue::Undefined)
    });
    install_hooks(&mut context, debugger, &[("enterFrame", hook)]);

    eval_in(&mut context, debuggee, "function f() { return 1; } f() + f();").unwrap();
    assert_eq!(
        *kinds.borrow(),
        vec![FrameKind::Global, FrameKind::Call, FrameKind::Call]
    );
}

#[test]
fn bad_resumptions_go_to_the_uncaught_exception_hook() {
    let (mut context, debuggee, debugger, reports) = setup();
    let caught: Log<String> = Log::default();
    let log = caught.clone();
    let uncaught = native(&mut context, "uncaughtExceptionHook", move |_, args, context| {
        log.borrow_mut().push(context.display_value(&args[0]));
        Ok(JsValue::Undefined)
    });
    debugger.set_uncaught_exception_hook(&mut context, &uncaught).unwrap();
    let bad = native(&mut context, "debuggerStatement", |_, _, _| Ok(JsValue::from(5)));
    install_hooks(&mut context, debugger, &[("debuggerStatement", bad)]);

    let result = eval_in(&mut context, debuggee, "debugger; 'finished';").unwrap();
    assert_eq!(result, JsValue::from("finished"));
    let caught = caught.borrow();
    assert_eq!(caught.len(), 1);
    assert!(caught[0].contains("invalid resumption value"), "{caught:?}");
    assert!(reports.0.borrow().is_empty());
}

#[test]
fn exceptions_in_hooks_without_an_uncaught_hook_abort() {
    let (mut context, debuggee, debugger, reports) = setup();
    let hook = native(&mut context, "debuggerStatement", |_, _, _| {
        Err(JsError::Thrown("hook failed".into()))
    });
    install_hooks(&mut context, debugger, &[("debuggerStatement", hook)]);

    let err = eval_in(&mut context, debuggee, "debugger; 'finished';").unwrap_err();
    assert!(matches!(err, JsError::Terminated));
    assert_eq!(reports.0.borrow().len(), 1);
}

#[test]
fn failing_uncaught_exception_hooks_are_reported() {
    let (mut context, debuggee, debugger, reports) = setup();
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    let uncaught = native(&mut context, "uncaughtExceptionHook", move |_, _, _| {
        counter.set(counter.get() + 1);
        Err(JsError::Thrown("again".into()))
    });
    debugger.set_uncaught_exception_hook(&mut context, &uncaught).unwrap();
    let hook = native(&mut context, "debuggerStatement", |_, _, _| {
        Err(JsError::Thrown("hook failed".into()))
    });
    install_hooks(&mut context, debugger, &[("debuggerStatement", hook)]);

    let err = eval_in(&mut context, debuggee, "debugger;").unwrap_err();
    assert!(matches!(err, JsError::Terminated));
    assert_eq!(calls.get(), 1);
    assert_eq!(reports.0.borrow().len(), 1);
}

#[test]
fn void_hooks_ignore_their_return_value() {
    let (mut context, debuggee, debugger, reports) = setup();
    let hook = native(&mut context, "enterFrame", |_, _, _| Ok(JsValue::from("ignored")));
    install_hooks(&mut context, debugger, &[("enterFrame", hook)]);

    assert_eq!(eval_in(&mut context, debuggee, "1 + 2").unwrap(), JsValue::from(3));
    assert!(reports.0.borrow().is_empty());
}
