//! Script values.

use std::{fmt, rc::Rc};

use crate::{debugger::reflection::Mirror, object::ObjectId};

/// A value of the script language.
///
/// Objects are referenced by [`ObjectId`] and live in the context's heap;
/// debugger mirrors are reference counted and compare by identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum JsValue {
    /// `undefined`
    #[default]
    Undefined,
    /// `null`
    Null,
    /// `true` or `false`
    Boolean(bool),
    /// A double precision number.
    Number(f64),
    /// An immutable string.
    String(Rc<str>),
    /// A heap object.
    Object(ObjectId),
    /// A debugger-side reflection of a frame, object or script.
    Mirror(Mirror),
}

impl JsValue {
    /// Creates a string value.
    pub fn string(s: impl Into<Rc<str>>) -> Self {
        Self::String(s.into())
    }

    /// Returns `true` if the value is `undefined`.
    #[must_use]
    pub const fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Returns `true` if the value is `null`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` if the value is `null` or `undefined`.
    #[must_use]
    pub const fn is_null_or_undefined(&self) -> bool {
        matches!(self, Self::Null | Self::Undefined)
    }

    /// Returns the object id if this is an object.
    #[must_use]
    pub const fn as_object(&self) -> Option<ObjectId> {
        match self {
            Self::Object(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns the mirror if this is one.
    #[must_use]
    pub const fn as_mirror(&self) -> Option<&Mirror> {
        match self {
            Self::Mirror(mirror) => Some(mirror),
            _ => None,
        }
    }

    /// Returns the number if this is one.
    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string if this is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns `true` for values that live in the heap or reflect heap state.
    #[must_use]
    pub const fn is_object_like(&self) -> bool {
        matches!(self, Self::Object(_) | Self::Mirror(_))
    }

    /// `ToBoolean`.
    #[must_use]
    pub fn to_boolean(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Boolean(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Object(_) | Self::Mirror(_) => true,
        }
    }

    /// `ToNumber` for primitives. Objects convert to `NaN`.
    #[must_use]
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Undefined | Self::Object(_) | Self::Mirror(_) => f64::NAN,
            Self::Null => 0.0,
            Self::Boolean(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    0.0
                } else {
                    s.parse().unwrap_or(f64::NAN)
                }
            }
        }
    }

    /// The result of the `typeof` operator, given whether an object is callable.
    #[must_use]
    pub const fn type_of(&self, callable: bool) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null | Self::Mirror(_) => "object",
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Object(_) if callable => "function",
            Self::Object(_) => "object",
        }
    }

    /// Strict equality (`===`).
    #[must_use]
    pub fn strict_equals(&self, other: &Self) -> bool {
        self == other
    }

    /// Loose equality (`==`) restricted to the conversions primitives need.
    #[must_use]
    pub fn loose_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined | Self::Null, Self::Undefined | Self::Null) => true,
            (Self::Undefined | Self::Null, _) | (_, Self::Undefined | Self::Null) => false,
            (Self::Object(_) | Self::Mirror(_), _) | (_, Self::Object(_) | Self::Mirror(_)) => {
                self == other
            }
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            _ => self.to_number() == other.to_number(),
        }
    }
}

impl From<bool> for JsValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<f64> for JsValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for JsValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<u32> for JsValue {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for JsValue {
    fn from(value: &str) -> Self {
        Self::String(value.into())
    }
}

impl From<String> for JsValue {
    fn from(value: String) -> Self {
        Self::String(value.into())
    }
}

impl From<ObjectId> for JsValue {
    fn from(value: ObjectId) -> Self {
        Self::Object(value)
    }
}

impl From<Mirror> for JsValue {
    fn from(value: Mirror) -> Self {
        Self::Mirror(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for JsValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Formats a number the way the script language prints it.
pub(crate) fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_owned()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_owned()
    } else if n == 0.0 {
        "0".to_owned()
    } else {
        n.to_string()
    }
}

impl fmt::Display for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Number(n) => f.write_str(&number_to_string(*n)),
            Self::String(s) => f.write_str(s),
            Self::Object(id) => write!(f, "[object {id}]"),
            Self::Mirror(mirror) => write!(f, "[{}]", mirror.class_name()),
        }
    }
}
