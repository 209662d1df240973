//! Function objects.

use std::{fmt, rc::Rc};

use crate::{Context, JsResult, JsValue, object::ObjectId, script::ScriptId};

type NativeFn = dyn Fn(&JsValue, &[JsValue], &mut Context) -> JsResult<JsValue>;

/// A function implemented in Rust.
///
/// The closure receives `this`, the arguments and the context. Values
/// captured by a closure are not traced by the collector; capture ids only
/// of objects that are rooted some other way.
#[derive(Clone)]
pub struct NativeFunction {
    inner: Rc<NativeFn>,
}

impl NativeFunction {
    /// Creates a native function from a function pointer.
    #[must_use]
    pub fn from_fn_ptr(function: fn(&JsValue, &[JsValue], &mut Context) -> JsResult<JsValue>) -> Self {
        Self {
            inner: Rc::new(function),
        }
    }

    /// Creates a native function from a closure.
    pub fn from_closure<F>(closure: F) -> Self
    where
        F: Fn(&JsValue, &[JsValue], &mut Context) -> JsResult<JsValue> + 'static,
    {
        Self {
            inner: Rc::new(closure),
        }
    }

    /// Calls the function.
    pub fn call(&self, this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
        (self.inner)(this, args, context)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NativeFunction")
    }
}

/// The two shapes a callable object can take.
#[derive(Debug, Clone)]
pub enum FunctionKind {
    /// A closure over compiled bytecode.
    Interpreted {
        /// The function's script.
        script: ScriptId,
        /// The scope the function was created in.
        scope: ObjectId,
    },
    /// A Rust function.
    Native {
        /// The function name, reported through reflection.
        name: Rc<str>,
        /// The implementation.
        function: NativeFunction,
    },
}

/// Returns `args[index]` or `undefined`.
#[must_use]
pub fn arg(args: &[JsValue], index: usize) -> JsValue {
    args.get(index).cloned().unwrap_or_default()
}
