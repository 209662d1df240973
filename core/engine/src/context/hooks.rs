//! Hooks the embedder provides to the runtime.

use crate::{Context, JsError, JsResult, realm::RealmId, script::ScriptId};

/// Operations the runtime cannot decide by itself.
///
/// Every method has a default, so embedders only override what they care
/// about. Hooks receive the [`Context`] and may re-enter it.
///
/// # Example
///
/// ```
/// use std::{cell::Cell, rc::Rc};
///
/// use argus_engine::{Context, HostHooks, JsResult, ScriptId};
///
/// #[derive(Default)]
/// struct CountRecompiles(Cell<usize>);
///
/// impl HostHooks for CountRecompiles {
///     fn recompile_script(&self, _: ScriptId, _: &mut Context) -> JsResult<()> {
///         self.0.set(self.0.get() + 1);
///         Ok(())
///     }
/// }
///
/// let context = Context::builder()
///     .host_hooks(Rc::new(CountRecompiles::default()))
///     .build();
/// # drop(context);
/// ```
pub trait HostHooks {
    /// Called after the bytecode of `script` was patched or restored, so that
    /// any derived compiled code can be discarded.
    ///
    /// An error on the first patch of a breakpoint site makes the patch roll
    /// back and the breakpoint request fail.
    fn recompile_script(&self, _script: ScriptId, _context: &mut Context) -> JsResult<()> {
        Ok(())
    }

    /// Called when a realm enters or leaves debug mode.
    ///
    /// An error while entering debug mode makes the debuggee registration
    /// fail.
    fn on_debug_mode_change(&self, _realm: RealmId, _enabled: bool, _context: &mut Context) -> JsResult<()> {
        Ok(())
    }

    /// Reports an exception raised by a debugger hook that no
    /// `uncaughtExceptionHook` handled. The debuggee is terminated afterwards.
    fn report_debugger_exception(&self, error: &JsError, context: &mut Context) {
        log::error!("uncaught exception in debugger hook: {}", context.display_error(error));
    }
}

/// The hooks used when the embedder supplies none.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl HostHooks for DefaultHooks {}
