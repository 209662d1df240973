#![allow(dead_code, unreachable_pub)]

use std::{cell::RefCell, rc::Rc};

use argus_engine::{
    Context, Debugger, HostHooks, JsError, JsResult, JsValue, NativeFunction, ObjectId, RealmId, ScriptId, Source,
};

/// Collects the exceptions reported by debugger hooks.
#[derive(Default)]
pub struct Reports(pub RefCell<Vec<String>>);

impl HostHooks for Reports {
    fn report_debugger_exception(&self, error: &JsError, context: &mut Context) {
        let message = context.display_error(error);
        self.0.borrow_mut().push(message);
    }
}

/// A context with a debuggee realm observed by one debugger living in the main realm.
pub fn setup() -> (Context, RealmId, Debugger, Rc<Reports>) {
    let reports = Rc::new(Reports::default());
    let mut context = Context::builder().host_hooks(reports.clone()).build();
    let debuggee = context.create_realm("debuggee");
    let debugger = Debugger::new(&mut context, &[debuggee]).expect("debugger creation failed");
    (context, debuggee, debugger, reports)
}

/// A native function object in the current realm.
pub fn native<F>(context: &mut Context, name: &str, function: F) -> JsValue
where
    F: Fn(&JsValue, &[JsValue], &mut Context) -> JsResult<JsValue> + 'static,
{
    context
        .create_function(name, NativeFunction::from_closure(function))
        .into()
}

/// A hooks object with the given hook functions, installed on `debugger`.
pub fn install_hooks(context: &mut Context, debugger: Debugger, hooks: &[(&str, JsValue)]) {
    let hooks = context.create_object(hooks);
    debugger
        .set_hooks(context, &hooks.into())
        .expect("setting hooks failed");
}

/// Evaluates `text` in `realm`.
pub fn eval_in(context: &mut Context, realm: RealmId, text: &str) -> JsResult<JsValue> {
    let previous = context.enter_realm(realm)?;
    let result = context.eval(Source::from_bytes(text).with_url("debuggee.js"));
    context.enter_realm(previous)?;
    result
}

/// Compiles `text` in `realm` and returns the holder and the top-level script.
pub fn compile_in(context: &mut Context, realm: RealmId, text: &str) -> (ObjectId, ScriptId) {
    let previous = context.enter_realm(realm).expect("no such realm");
    let holder = context
        .compile(Source::from_bytes(text).with_url("debuggee.js"))
        .expect("compilation failed");
    context.enter_realm(previous).expect("no such realm");
    let script = context.script_of_holder(holder).expect("holder without script");
    (holder, script)
}

/// The first statement offset on `line` of `script`.
pub fn line_offset(context: &Context, script: ScriptId, line: u32) -> u32 {
    context
        .script(script)
        .and_then(|s| s.line_offsets(line).first().copied())
        .unwrap_or_else(|| panic!("no code on line {line}"))
}

/// A shared log tests push into from native hooks.
pub type Log<T> = Rc<RefCell<Vec<T>>>;
