//! Hook dispatch and the resumption protocol.
//!
//! A hook's return value tells the runtime how to go on:
//!
//! | returned value                         | resumption             |
//! |----------------------------------------|------------------------|
//! | `undefined`                            | [`Resumption::Continue`] |
//! | `null`                                 | [`Resumption::Abort`]    |
//! | `{ return: value }`                    | [`Resumption::Return`]   |
//! | `{ throw: value }`                     | [`Resumption::Throw`]    |
//!
//! Anything else is a protocol violation and is handled like an exception
//! thrown by the hook: it goes to the debugger's `uncaughtExceptionHook`, or
//! is reported to the host and terminates the debuggee.

use crate::{
    Context, DebugError, JsError, JsValue,
    debugger::{Debugger, DebuggerId, Hook},
    object::ObjectKind,
    realm::RealmId,
};

/// How execution resumes after a debugger event.
///
/// `Return` and `Throw` carry debuggee values.
#[derive(Debug, Clone, PartialEq)]
pub enum Resumption {
    /// Go on as if nothing happened.
    Continue,
    /// Terminate the debuggee with an uncatchable error.
    Abort,
    /// Make the current frame return this value.
    Return(JsValue),
    /// Throw this value from the current frame.
    Throw(JsValue),
}

impl Resumption {
    /// Returns `true` for [`Resumption::Continue`].
    #[must_use]
    pub const fn is_continue(&self) -> bool {
        matches!(self, Self::Continue)
    }
}

/// Debuggers that take `hook` for an event in `realm`, in observer order.
pub(crate) fn recipients(context: &Context, realm: RealmId, hook: Hook) -> Vec<DebuggerId> {
    let Some(realm) = context.realms.get(realm) else {
        return Vec::new();
    };
    realm
        .observers
        .iter()
        .copied()
        .filter(|&id| context.debug.debuggers.get(id).is_some_and(|d| d.wants(hook)))
        .collect()
}

/// Re-checks a recipient right before its hook runs.
fn still_wants(context: &Context, debugger: DebuggerId, realm: RealmId, hook: Hook) -> bool {
    context
        .debug
        .debuggers
        .get(debugger)
        .is_some_and(|d| d.wants(hook) && d.debuggees.contains(&realm))
}

/// Runs `fire` for every recipient of `hook` until one does not continue.
pub(crate) fn dispatch(
    context: &mut Context,
    realm: RealmId,
    hook: Hook,
    mut fire: impl FnMut(&mut Context, Debugger) -> Resumption,
) -> Resumption {
    let recipients = recipients(context, realm, hook);
    if recipients.is_empty() {
        return Resumption::Continue;
    }
    log::trace!("dispatching {} to {} debugger(s)", hook.name(), recipients.len());
    for id in recipients {
        if !still_wants(context, id, realm, hook) {
            continue;
        }
        let resumption = fire(context, Debugger::from_id(id));
        if !resumption.is_continue() {
            return resumption;
        }
    }
    Resumption::Continue
}

/// Calls `debugger`'s `hook` with `args`.
///
/// The hook is looked up on the hooks object at call time; a missing or
/// non-callable hook continues.
pub(crate) fn call_hook(
    context: &mut Context,
    debugger: Debugger,
    hook: Hook,
    args: &[JsValue],
    debuggee: RealmId,
) -> Resumption {
    let Ok(state) = debugger.state(context) else {
        return Resumption::Continue;
    };
    let (hooks, this) = (state.hooks, JsValue::Object(state.object));
    let function = match context.get(hooks, hook.name()) {
        Ok(function) => function,
        Err(err) => return handle_uncaught_exception(context, debugger, err, debuggee, true, hook.is_resumable()),
    };
    if !context.is_callable(&function) {
        return Resumption::Continue;
    }
    invoke(context, debugger, &function, &this, args, debuggee, hook.is_resumable())
}

/// Calls a debugger-side function and interprets the outcome.
pub(crate) fn invoke(
    context: &mut Context,
    debugger: Debugger,
    function: &JsValue,
    this: &JsValue,
    args: &[JsValue],
    debuggee: RealmId,
    resumable: bool,
) -> Resumption {
    let result = context.call(function, this, args);
    // Whatever the hook raised or evaluated has finished unwinding.
    context.vm.reported = None;
    match result {
        Ok(value) if resumable => parse_resumption(context, debugger, &value, debuggee, true),
        Ok(_) => Resumption::Continue,
        Err(err) => handle_uncaught_exception(context, debugger, err, debuggee, true, resumable),
    }
}

/// Interprets a hook's return value.
///
/// `call_hook` says whether a violation may still be offered to the
/// `uncaughtExceptionHook`.
pub(crate) fn parse_resumption(
    context: &mut Context,
    debugger: Debugger,
    value: &JsValue,
    debuggee: RealmId,
    call_hook: bool,
) -> Resumption {
    match value {
        JsValue::Undefined => return Resumption::Continue,
        JsValue::Null => return Resumption::Abort,
        _ => {}
    }
    match completion_property(context, value) {
        Some((key, raw)) => {
            let value = debugger
                .unwrap(context, &raw)
                .and_then(|value| context.wrap_into(debuggee, value));
            match value {
                Ok(value) if key == "return" => Resumption::Return(value),
                Ok(value) => Resumption::Throw(value),
                Err(err) => handle_uncaught_exception(context, debugger, err, debuggee, call_hook, true),
            }
        }
        None => {
            let err = DebugError::BadResumption(context.display_value(value)).into();
            handle_uncaught_exception(context, debugger, err, debuggee, call_hook, true)
        }
    }
}

/// The single `return` or `throw` property of a plain object.
fn completion_property(context: &Context, value: &JsValue) -> Option<(&'static str, JsValue)> {
    let object = context.object(value.as_object()?)?;
    if !matches!(object.kind, ObjectKind::Ordinary) || object.properties.len() != 1 {
        return None;
    }
    let (key, value) = object.properties.first()?;
    let key = match &**key {
        "return" => "return",
        "throw" => "throw",
        _ => return None,
    };
    Some((key, value.clone()))
}

/// Handles an exception that escaped a hook.
///
/// With `call_hook` set, a configured `uncaughtExceptionHook` receives the
/// exception; for resumable events its return value is parsed as a
/// resumption. Otherwise, and whenever that hook fails too, the exception is
/// reported to the host and the debuggee is aborted.
pub(crate) fn handle_uncaught_exception(
    context: &mut Context,
    debugger: Debugger,
    err: JsError,
    debuggee: RealmId,
    call_hook: bool,
    resumable: bool,
) -> Resumption {
    if !err.is_catchable() {
        return Resumption::Abort;
    }
    let hook = debugger
        .state(context)
        .ok()
        .and_then(|state| Some((state.uncaught_exception_hook?, state.object, state.home)));
    if call_hook && let Some((hook, object, home)) = hook {
        let Some(value) = err.to_opaque(context, home) else {
            return Resumption::Abort;
        };
        let result = context.call(&JsValue::Object(hook), &JsValue::Object(object), &[value]);
        return match result {
            Ok(value) if resumable => parse_resumption(context, debugger, &value, debuggee, false),
            Ok(_) => Resumption::Continue,
            Err(err) => handle_uncaught_exception(context, debugger, err, debuggee, false, resumable),
        };
    }

    let host = context.host_hooks();
    host.report_debugger_exception(&err, context);
    Resumption::Abort
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{HostHooks, NativeFunction};

    #[derive(Default)]
    struct Reports(RefCell<Vec<String>>);

    impl HostHooks for Reports {
        fn report_debugger_exception(&self, error: &JsError, _: &mut Context) {
            self.0.borrow_mut().push(error.to_string());
        }
    }

    fn setup() -> (Context, Debugger, RealmId, Rc<Reports>) {
        let reports = Rc::new(Reports::default());
        let mut context = Context::builder().host_hooks(reports.clone()).build();
        let debuggee = context.create_realm("debuggee");
        let debugger = Debugger::new(&mut context, &[debuggee]).expect("debugger creation failed");
        (context, debugger, debuggee, reports)
    }

    #[test]
    fn undefined_and_null_continue_and_abort() {
        let (mut context, debugger, debuggee, _) = setup();
        assert_eq!(
            parse_resumption(&mut context, debugger, &JsValue::Undefined, debuggee, true),
            Resumption::Continue
        );
        assert_eq!(
            parse_resumption(&mut context, debugger, &JsValue::Null, debuggee, true),
            Resumption::Abort
        );
    }

    #[test]
    fn completion_objects_resume_with_their_value() {
        let (mut context, debugger, debuggee, _) = setup();
        let ret = context.create_object(&[("return", 42.into())]);
        let thrown = context.create_object(&[("throw", "oops".into())]);
        assert_eq!(
            parse_resumption(&mut context, debugger, &ret.into(), debuggee, true),
            Resumption::Return(42.into())
        );
        assert_eq!(
            parse_resumption(&mut context, debugger, &thrown.into(), debuggee, true),
            Resumption::Throw("oops".into())
        );
    }

    #[test]
    fn bad_resumption_values_are_reported_and_abort() {
        let (mut context, debugger, debuggee, reports) = setup();
        let both = context.create_object(&[("return", 1.into()), ("throw", 2.into())]);
        for value in [JsValue::from(3), JsValue::from(both)] {
            assert_eq!(
                parse_resumption(&mut context, debugger, &value, debuggee, true),
                Resumption::Abort
            );
        }
        let reports = reports.0.borrow();
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.contains("invalid resumption value")), "{reports:?}");
    }

    #[test]
    fn raw_debugger_objects_cannot_be_returned() {
        let (mut context, debugger, debuggee, reports) = setup();
        let raw = context.create_object(&[]);
        let ret = context.create_object(&[("return", raw.into())]);
        assert_eq!(
            parse_resumption(&mut context, debugger, &ret.into(), debuggee, true),
            Resumption::Abort
        );
        assert!(reports.0.borrow()[0].contains("not a debuggee value"));
    }

    #[test]
    fn uncaught_exception_hook_can_resume() {
        let (mut context, debugger, debuggee, reports) = setup();
        let hook = context.create_function(
            "uncaught",
            NativeFunction::from_fn_ptr(|_, _, context| {
                Ok(context.create_object(&[("return", "recovered".into())]).into())
            }),
        );
        debugger
            .set_uncaught_exception_hook(&mut context, &hook.into())
            .expect("setting the hook failed");

        let resumption = parse_resumption(&mut context, debugger, &JsValue::from(true), debuggee, true);
        assert_eq!(resumption, Resumption::Return("recovered".into()));
        assert!(reports.0.borrow().is_empty());
    }
}
