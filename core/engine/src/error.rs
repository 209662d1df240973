//! Error types of the runtime and of the debugger core.
//!
//! Script-level failures travel as [`JsError`]; debugger usage errors and
//! recoverable failures are [`DebugError`]s, which convert into `JsError` so
//! that `?` works across both layers.

use std::{fmt, rc::Rc};

use thiserror::Error;

use crate::{Context, JsValue, realm::RealmId};

/// The result type used throughout the engine.
pub type JsResult<T> = Result<T, JsError>;

/// The kind of a native (engine-created) error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsNativeErrorKind {
    /// A generic `Error`.
    Error,
    /// A `SyntaxError` raised by the compiler.
    Syntax,
    /// A `TypeError`.
    Type,
    /// A `ReferenceError`, raised when reading an unbound name.
    Reference,
    /// A `RangeError`, raised when the call stack overflows.
    Range,
}

impl JsNativeErrorKind {
    /// The `name` property of errors of this kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::Syntax => "SyntaxError",
            Self::Type => "TypeError",
            Self::Reference => "ReferenceError",
            Self::Range => "RangeError",
        }
    }
}

impl fmt::Display for JsNativeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Usage errors and recoverable failures of the debugger core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DebugError {
    /// The debuggee is reachable from the debugger's own realm through
    /// debuggee-to-debugger edges.
    #[error("debugger and debuggee must be in different realms, and must not form a cycle")]
    CycleDetected,
    /// Debug mode cannot be switched on while the realm has frames on the stack.
    #[error("can't start debugging: a debuggee script is on the stack")]
    DebuggeeBusy,
    /// The script's realm is not a debuggee of this debugger.
    #[error("the debugger is not debugging the realm of this script")]
    NotDebugging,
    /// The offset does not start an instruction of the script.
    #[error("invalid script offset {0}")]
    InvalidOffset(u32),
    /// The host failed to recompile a script after a trap was toggled.
    #[error("recompiling the script failed: {0}")]
    RecompileFailed(String),
    /// The host failed to switch the realm's debug mode.
    #[error("switching debug mode failed: {0}")]
    DebugModeFailed(String),
    /// A mirror was handed to a debugger that does not own it.
    #[error("mirror belongs to a different Debugger")]
    NotMine,
    /// The mirror's referent is gone.
    #[error("mirror refers to a frame, object or script that is no longer live")]
    Dead,
    /// A hook returned a value that is not a resumption value.
    #[error("debugger hook returned an invalid resumption value: {0}")]
    BadResumption(String),
    /// A raw value from the debugger's world was passed where a debuggee
    /// value was expected.
    #[error("value is not a debuggee value; expected a Debugger.Object or a primitive")]
    NotADebuggeeValue,
    /// The argument must be an object.
    #[error("{0} must be an object")]
    NotAnObject(&'static str),
    /// The argument must be callable.
    #[error("{0} must be a function or null")]
    NotCallable(&'static str),
    /// The debugger was collected or destroyed.
    #[error("no such debugger")]
    NoSuchDebugger,
    /// The realm was destroyed.
    #[error("no such realm")]
    NoSuchRealm,
    /// The realm still has frames on the stack.
    #[error("realm has frames on the stack")]
    RealmBusy,
}

/// An error raised while running script code.
#[derive(Debug, Clone, Error)]
pub enum JsError {
    /// A script value thrown with `throw`, or rethrown by a debugger hook.
    #[error("uncaught exception: {0}")]
    Thrown(JsValue),
    /// An error created by the engine itself.
    #[error("{kind}: {message}")]
    Native {
        /// The error kind.
        kind: JsNativeErrorKind,
        /// The error message.
        message: Rc<str>,
    },
    /// A debugger usage error.
    #[error(transparent)]
    Debug(#[from] DebugError),
    /// Execution was terminated by a debugger and cannot be caught.
    #[error("execution terminated by the debugger")]
    Terminated,
}

impl JsError {
    /// Creates a native error of the given kind.
    pub fn native(kind: JsNativeErrorKind, message: impl Into<Rc<str>>) -> Self {
        Self::Native {
            kind,
            message: message.into(),
        }
    }

    /// Whether `self` and `other` are the same propagating exception.
    ///
    /// Engine errors are compared by identity, so an equal error raised
    /// afresh is a different exception.
    pub(crate) fn is_same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Thrown(a), Self::Thrown(b)) => a == b,
            (Self::Native { message: a, .. }, Self::Native { message: b, .. }) => Rc::ptr_eq(a, b),
            (Self::Debug(a), Self::Debug(b)) => a == b,
            (Self::Terminated, Self::Terminated) => true,
            _ => false,
        }
    }

    /// Creates a `TypeError`.
    pub fn type_error(message: impl Into<Rc<str>>) -> Self {
        Self::native(JsNativeErrorKind::Type, message)
    }

    /// Creates a `ReferenceError`.
    pub fn reference_error(message: impl Into<Rc<str>>) -> Self {
        Self::native(JsNativeErrorKind::Reference, message)
    }

    /// Creates a `SyntaxError`.
    pub fn syntax_error(message: impl Into<Rc<str>>) -> Self {
        Self::native(JsNativeErrorKind::Syntax, message)
    }

    /// Creates a `RangeError`.
    pub fn range_error(message: impl Into<Rc<str>>) -> Self {
        Self::native(JsNativeErrorKind::Range, message)
    }

    /// Returns `false` for errors that unwind the whole stack unconditionally.
    #[must_use]
    pub const fn is_catchable(&self) -> bool {
        !matches!(self, Self::Terminated)
    }

    /// Returns the debugger error, if this is one.
    #[must_use]
    pub const fn as_debug_error(&self) -> Option<&DebugError> {
        match self {
            Self::Debug(err) => Some(err),
            _ => None,
        }
    }

    /// Converts this error into a script value created in `realm`.
    ///
    /// Engine errors become plain objects carrying `name` and `message`.
    /// Returns `None` for [`JsError::Terminated`], which has no value.
    pub fn to_opaque(&self, context: &mut Context, realm: RealmId) -> Option<JsValue> {
        let (name, message): (&str, Rc<str>) = match self {
            Self::Thrown(value) => return Some(value.clone()),
            Self::Terminated => return None,
            Self::Native { kind, message } => (kind.name(), message.clone()),
            Self::Debug(err) => ("Error", err.to_string().into()),
        };
        let error = context.create_error_object(realm, name, &message);
        Some(JsValue::Object(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_errors_convert_with_question_mark() {
        fn fails() -> JsResult<()> {
            Err(DebugError::NotMine)?;
            Ok(())
        }
        let err = fails().unwrap_err();
        assert_eq!(err.as_debug_error(), Some(&DebugError::NotMine));
        assert!(err.is_catchable());
        assert!(!JsError::Terminated.is_catchable());
    }

    #[test]
    fn native_errors_display_their_kind() {
        let err = JsError::reference_error("x is not defined");
        assert_eq!(err.to_string(), "ReferenceError: x is not defined");
    }
}
