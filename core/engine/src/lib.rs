//! Argus is an in-process debugger core for a small script runtime.
//!
//! The runtime compiles a JavaScript-like language to bytecode and runs it on
//! a stack VM, with any number of isolated realms in one [`Context`]. A
//! [`Debugger`] living in one realm observes other realms: it receives
//! events through hooks, sets breakpoints by patching bytecode, and reflects
//! frames, objects and scripts through mirrors.
//!
//! # Example
//!
//! ```
//! use argus_engine::{Context, Debugger, JsValue, Source};
//!
//! let mut context = Context::default();
//! let debuggee = context.create_realm("debuggee");
//! let debugger = Debugger::new(&mut context, &[debuggee]).unwrap();
//!
//! // Resume every `debugger` statement with a return value.
//! let hooks = context
//!     .eval(Source::from_bytes(
//!         "({ debuggerStatement: function (frame) { return { return: 42 }; } })",
//!     ))
//!     .unwrap();
//! debugger.set_hooks(&mut context, &hooks).unwrap();
//!
//! context.enter_realm(debuggee).unwrap();
//! let result = context
//!     .eval(Source::from_bytes("function f() { debugger; return 1; } f()"))
//!     .unwrap();
//! assert_eq!(result, JsValue::from(42));
//! ```
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::needless_raw_string_hashes))]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

mod compiler;

pub mod context;
pub mod debugger;
pub mod error;
pub mod gc;
pub mod object;
pub mod realm;
pub mod script;
pub mod value;
pub mod vm;

pub use crate::{
    context::{Context, ContextBuilder, DefaultHooks, HostHooks},
    debugger::{
        Completion, DebugApi, Debugger, FrameMirror, Mirror, NativeTrap, ObjectMirror, Resumption, ScriptMirror,
    },
    error::{DebugError, JsError, JsNativeErrorKind, JsResult},
    gc::{GcScope, GcStats},
    object::{NativeFunction, ObjectId},
    realm::{Realm, RealmId},
    script::{Script, ScriptId, ScriptKind, Source},
    value::JsValue,
};
