//! Runs a script under a debugger.
//!
//! The script runs in its own realm. A [`Debugger`] living in the main realm
//! observes it through native hook functions: new scripts get the requested
//! line breakpoints, and every stop reports its location together with the
//! values of the watch expressions.

mod report;

use std::{cell::RefCell, collections::BTreeSet, rc::Rc};

use argus_engine::{
    Completion, Context, Debugger, FrameMirror, JsResult, JsValue, Mirror, NativeFunction, RealmId, ScriptMirror,
    Source,
};

use crate::session::Session;

use report::{Event, FrameInfo, Outcome, Watch};

pub(crate) use report::{Format, Reporter};

/// A context with a debuggee realm and a debugger observing it.
#[derive(Debug)]
pub(crate) struct Inspector {
    context: Context,
    debuggee: RealmId,
    reporter: Reporter,
    unresolved: Rc<RefCell<BTreeSet<u32>>>,
}

impl Inspector {
    /// Sets up the debuggee realm and installs the debugger hooks for `session`.
    pub(crate) fn new(session: Session, reporter: Reporter) -> JsResult<Self> {
        let mut context = Context::default();
        let debuggee = context.create_realm("debuggee");
        install_globals(&mut context, debuggee, reporter)?;

        let debugger = Debugger::new(&mut context, &[debuggee])?;
        context.add_root(debugger.object(&context)?);

        let unresolved: Rc<RefCell<BTreeSet<u32>>> =
            Rc::new(RefCell::new(session.breakpoints.iter().copied().collect()));
        let session = Rc::new(session);
        let mut hooks = vec![
            (
                "newScript",
                native(&mut context, "newScript", {
                    let session = session.clone();
                    let unresolved = unresolved.clone();
                    move |_, args, context| {
                        if let Some(JsValue::Mirror(Mirror::Script(script))) = args.first() {
                            set_breakpoints(context, script, &session, reporter, &unresolved)?;
                        }
                        Ok(JsValue::Undefined)
                    }
                }),
            ),
            (
                "debuggerStatement",
                native(&mut context, "debuggerStatement", {
                    let session = session.clone();
                    move |_, args, context| {
                        if let Some(JsValue::Mirror(Mirror::Frame(frame))) = args.first() {
                            let frames = stack(context, frame)?;
                            let watches = watches(context, frame, &session.watches)?;
                            reporter.emit(&Event::DebuggerStatement { frames, watches });
                        }
                        Ok(JsValue::Undefined)
                    }
                }),
            ),
        ];
        if session.report_exceptions {
            hooks.push((
                "throw",
                native(&mut context, "throw", move |_, args, context| {
                    if let [JsValue::Mirror(Mirror::Frame(frame)), exception, ..] = args {
                        let value = display(context, frame.owner(), exception)?;
                        let location = frame_info(context, frame)?;
                        reporter.emit(&Event::Exception { value, location });
                    }
                    Ok(JsValue::Undefined)
                }),
            ));
        }
        let hooks = context.create_object(&hooks);
        debugger.set_hooks(&mut context, &hooks.into())?;

        Ok(Self {
            context,
            debuggee,
            reporter,
            unresolved,
        })
    }

    /// Compiles and runs `text` in the debuggee realm.
    pub(crate) fn run(&mut self, text: &str, url: &str) -> JsResult<JsValue> {
        let previous = self.context.enter_realm(self.debuggee)?;
        let result = self.execute(text, url);
        self.context.enter_realm(previous)?;

        let unresolved = self.unresolved.borrow();
        if !unresolved.is_empty() {
            log::warn!("no code found on line(s) {unresolved:?}; those breakpoints were never set");
        }
        result
    }

    fn execute(&mut self, text: &str, url: &str) -> JsResult<JsValue> {
        let holder = self.context.compile(Source::from_bytes(text).with_url(url))?;
        self.context.add_root(holder);
        let result = self.context.execute(holder);
        self.context.remove_root(holder);
        result
    }

    /// Reports how the script completed.
    pub(crate) fn report_completion(&self, result: &JsResult<JsValue>) {
        let outcome = match result {
            Ok(JsValue::Undefined) => return,
            Ok(value) => Outcome::Returned(self.context.display_value(value)),
            Err(err) => Outcome::Threw(self.context.display_error(err)),
        };
        self.reporter.emit(&Event::Completion { outcome });
    }
}

fn native<F>(context: &mut Context, name: &str, function: F) -> JsValue
where
    F: Fn(&JsValue, &[JsValue], &mut Context) -> JsResult<JsValue> + 'static,
{
    context
        .create_function(name, NativeFunction::from_closure(function))
        .into()
}

/// Defines `print` in the debuggee realm.
fn install_globals(context: &mut Context, debuggee: RealmId, reporter: Reporter) -> JsResult<()> {
    let print = context.create_function_in(
        debuggee,
        "print",
        NativeFunction::from_closure(move |_, args, context| {
            let text = args
                .iter()
                .map(|arg| context.display_value(arg))
                .collect::<Vec<_>>()
                .join(" ");
            reporter.emit(&Event::Output { text });
            Ok(JsValue::Undefined)
        }),
    );
    let global = context.global_object_of(debuggee)?;
    context.set(global, "print", print.into())
}

/// Sets a breakpoint on the first instruction of every requested line `script` covers.
fn set_breakpoints(
    context: &mut Context,
    script: &ScriptMirror,
    session: &Session,
    reporter: Reporter,
    unresolved: &RefCell<BTreeSet<u32>>,
) -> JsResult<()> {
    // Eval code, watches included, is destroyed right after it runs.
    let held = script
        .script_id()
        .and_then(|id| context.script(id))
        .is_some_and(|script| script.holder().is_some());
    if !held {
        return Ok(());
    }
    for &line in &session.breakpoints {
        let Some(&offset) = script.line_offsets(context, line)?.first() else {
            continue;
        };
        let handler = breakpoint_handler(context, session.watches.clone(), reporter);
        script.set_breakpoint(context, offset, &handler)?;
        unresolved.borrow_mut().remove(&line);
        log::debug!("breakpoint set at {}:{line} (offset {offset})", script.url(context)?);
    }
    Ok(())
}

fn breakpoint_handler(context: &mut Context, expressions: Vec<String>, reporter: Reporter) -> JsValue {
    let hit = native(context, "hit", move |_, args, context| {
        if let Some(JsValue::Mirror(Mirror::Frame(frame))) = args.first() {
            let location = frame_info(context, frame)?;
            let watches = watches(context, frame, &expressions)?;
            reporter.emit(&Event::Breakpoint { location, watches });
        }
        Ok(JsValue::Undefined)
    });
    context.create_object(&[("hit", hit)]).into()
}

/// Renders a debugger-side value.
fn display(context: &Context, debugger: Debugger, value: &JsValue) -> JsResult<String> {
    let value = debugger.unwrap(context, value)?;
    Ok(context.display_value(&value))
}

fn frame_info(context: &mut Context, frame: &FrameMirror) -> JsResult<FrameInfo> {
    let function = match frame.callee(context)? {
        JsValue::Mirror(Mirror::Object(callee)) => Some(
            callee
                .name(context)?
                .map_or_else(|| "<anonymous>".to_owned(), |name| name.to_string()),
        ),
        _ => None,
    };
    let script = frame.script(context)?;
    let offset = frame.offset(context)?;
    Ok(FrameInfo {
        kind: frame.kind(context)?.as_str(),
        function,
        url: script.url(context)?.to_string(),
        line: script.offset_line(context, offset)?,
    })
}

/// The stack from `frame` outwards.
fn stack(context: &mut Context, frame: &FrameMirror) -> JsResult<Vec<FrameInfo>> {
    let mut frames = Vec::new();
    let mut current = Some(frame.clone());
    while let Some(frame) = current {
        frames.push(frame_info(context, &frame)?);
        current = frame.older(context)?;
    }
    Ok(frames)
}

fn watches(context: &mut Context, frame: &FrameMirror, expressions: &[String]) -> JsResult<Vec<Watch>> {
    let debugger = frame.owner();
    expressions
        .iter()
        .map(|expression| {
            let outcome = match frame.eval(context, expression)? {
                Completion::Return(value) => Outcome::Returned(display(context, debugger, &value)?),
                Completion::Throw(value) => Outcome::Threw(display(context, debugger, &value)?),
                Completion::Abort => Outcome::Terminated,
            };
            Ok(Watch {
                expression: expression.clone(),
                outcome,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use argus_engine::{GcScope, JsValue};
    use indoc::indoc;

    use super::{Format, Inspector, Reporter};
    use crate::session::Session;

    const PROGRAM: &str = indoc! {"
        function add(a, b) {
            var sum = a + b;
            return sum;
        }
        add(1, 2)
    "};

    #[test]
    fn breakpoints_do_not_change_the_result() {
        let session = Session {
            breakpoints: vec![3],
            watches: vec!["sum".to_owned()],
            report_exceptions: true,
        };
        let mut inspector = Inspector::new(session, Reporter::new(Format::Json)).unwrap();
        let result = inspector.run(PROGRAM, "add.js").unwrap();
        assert_eq!(result, JsValue::from(3));
        assert!(inspector.unresolved.borrow().is_empty());
    }

    #[test]
    fn lines_without_code_stay_unresolved() {
        let session = Session {
            breakpoints: vec![3, 40],
            ..Session::default()
        };
        let mut inspector = Inspector::new(session, Reporter::new(Format::Json)).unwrap();
        inspector.run(PROGRAM, "add.js").unwrap();
        assert_eq!(inspector.unresolved.borrow().iter().copied().collect::<Vec<_>>(), [40]);
    }

    #[test]
    fn the_debugger_survives_collection() {
        let mut inspector = Inspector::new(Session::default(), Reporter::new(Format::Json)).unwrap();
        let stats = inspector.context.collect_garbage(GcScope::Full);
        assert_eq!(stats.debuggers_freed, 0);
        let realm = inspector.context.get_realm(inspector.debuggee).unwrap();
        assert!(realm.is_under_debug());
    }
}
