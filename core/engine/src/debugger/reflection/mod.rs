//! Reflection: the debugger's view of frames, objects and scripts.
//!
//! A debugger never touches debuggee entities directly. It sees them
//! through [`Mirror`]s, which remember their owning debugger and lose their
//! referent once it dies. Any operation on a dead mirror fails with
//! [`DebugError::Dead`](crate::DebugError::Dead); handing a mirror to a
//! debugger that does not own it fails with
//! [`DebugError::NotMine`](crate::DebugError::NotMine).
//!
//! Mirrors are also script values. Hook code reads their properties and
//! calls their methods with the usual syntax, `frame.eval("x")` or
//! `script.setBreakpoint(offset, handler)`; `get_property` and
//! `call_method` implement that surface on top of the Rust API.

mod frame;
mod object;
mod script;

use std::rc::Rc;

pub use frame::FrameMirror;
pub use object::ObjectMirror;
pub use script::ScriptMirror;

use crate::{
    Context, JsError, JsResult, JsValue,
    debugger::{Debugger, DebuggerId},
    object::{ObjectId, ObjectKind, function::arg},
    realm::RealmId,
};

/// A debugger-side reflection of a debuggee entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Mirror {
    /// A call frame.
    Frame(FrameMirror),
    /// A debuggee object.
    Object(ObjectMirror),
    /// A compiled script.
    Script(ScriptMirror),
}

impl Mirror {
    /// The class name reported to scripts.
    #[must_use]
    pub const fn class_name(&self) -> &'static str {
        match self {
            Self::Frame(_) => "Debugger.Frame",
            Self::Object(_) => "Debugger.Object",
            Self::Script(_) => "Debugger.Script",
        }
    }

    /// The debugger that created this mirror.
    #[must_use]
    pub fn owner(&self) -> Debugger {
        Debugger::from_id(self.owner_id())
    }

    pub(crate) fn owner_id(&self) -> DebuggerId {
        match self {
            Self::Frame(m) => m.owner_id(),
            Self::Object(m) => m.owner_id(),
            Self::Script(m) => m.owner_id(),
        }
    }

    /// Returns `false` once the referent is gone.
    #[must_use]
    pub fn is_live(&self) -> bool {
        match self {
            Self::Frame(m) => m.is_live(),
            Self::Object(m) => m.is_live(),
            Self::Script(m) => m.is_live(),
        }
    }
}

/// The outcome of running debuggee code on behalf of a debugger.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// The code returned this value.
    Return(JsValue),
    /// The code threw this value.
    Throw(JsValue),
    /// The code was terminated.
    Abort,
}

impl Completion {
    /// Classifies a result and wraps its value for `debugger`.
    ///
    /// Errors without a script value are turned into error objects of
    /// `realm` first. Termination becomes [`Completion::Abort`].
    pub(crate) fn from_result(
        context: &mut Context,
        debugger: Debugger,
        realm: RealmId,
        result: JsResult<JsValue>,
    ) -> JsResult<Self> {
        match result {
            Ok(value) => Ok(Self::Return(debugger.wrap(context, value)?)),
            Err(err) => match err.to_opaque(context, realm) {
                Some(value) => Ok(Self::Throw(debugger.wrap(context, value)?)),
                None => Ok(Self::Abort),
            },
        }
    }

    /// The completion as a script value created in `realm`:
    /// `{ return: value }`, `{ throw: value }` or `null`.
    pub fn into_value(self, context: &mut Context, realm: RealmId) -> JsValue {
        match self {
            Self::Return(value) => JsValue::Object(context.create_object_in(realm, &[("return", value)])),
            Self::Throw(value) => JsValue::Object(context.create_object_in(realm, &[("throw", value)])),
            Self::Abort => JsValue::Null,
        }
    }
}

fn home_realm(context: &Context, mirror: &Mirror) -> JsResult<RealmId> {
    Ok(mirror.owner().state(context)?.home)
}

fn array_like(context: &mut Context, realm: RealmId, values: Vec<JsValue>) -> JsValue {
    JsValue::Object(context.create_array_like(realm, values))
}

fn offset_arg(args: &[JsValue], index: usize) -> JsResult<u32> {
    let n = arg(args, index).to_number();
    if n.is_finite() && n >= 0.0 && n.fract() == 0.0 && n <= f64::from(u32::MAX) {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(n as u32)
    } else {
        Err(JsError::type_error(format!("{} is not a valid offset", arg(args, index))))
    }
}

fn object_arg(args: &[JsValue], index: usize) -> JsResult<ObjectId> {
    arg(args, index)
        .as_object()
        .ok_or_else(|| JsError::type_error("argument must be an object"))
}

/// Reads a property of a mirror from script code.
pub(crate) fn get_property(context: &mut Context, mirror: &Mirror, key: &str) -> JsResult<JsValue> {
    let home = home_realm(context, mirror)?;
    match mirror {
        Mirror::Frame(frame) => match key {
            "type" => Ok(frame.kind(context)?.as_str().into()),
            "callee" => frame.callee(context),
            "this" => frame.this(context),
            "older" => Ok(frame.older(context)?.map(Mirror::Frame).into()),
            "arguments" => {
                let args = frame.arguments(context)?;
                Ok(args.map_or(JsValue::Null, |args| array_like(context, home, args)))
            }
            "script" => Ok(JsValue::Mirror(Mirror::Script(frame.script(context)?))),
            "offset" => Ok(frame.offset(context)?.into()),
            "live" => Ok(frame.is_live().into()),
            _ => Ok(JsValue::Undefined),
        },
        Mirror::Object(object) => match key {
            "proto" => object.proto(context),
            "class" => Ok(object.class_name(context)?.into()),
            "callable" => Ok(object.is_callable(context)?.into()),
            "name" => Ok(object
                .name(context)?
                .map_or(JsValue::Undefined, JsValue::String)),
            "parameterNames" => {
                let names = object
                    .parameter_names(context)?
                    .into_iter()
                    .map(JsValue::String)
                    .collect();
                Ok(array_like(context, home, names))
            }
            "script" => Ok(object
                .script(context)?
                .map_or(JsValue::Undefined, |s| JsValue::Mirror(Mirror::Script(s)))),
            _ => Ok(JsValue::Undefined),
        },
        Mirror::Script(script) => match key {
            "url" => Ok(JsValue::String(script.url(context)?)),
            "startLine" => Ok(script.start_line(context)?.into()),
            "lineCount" => Ok(script.line_count(context)?.into()),
            "live" => Ok(script.is_live().into()),
            _ => Ok(JsValue::Undefined),
        },
    }
}

/// Calls a method of a mirror from script code.
pub(crate) fn call_method(context: &mut Context, mirror: &Mirror, name: &str, args: &[JsValue]) -> JsResult<JsValue> {
    let home = home_realm(context, mirror)?;
    match (mirror, name) {
        (Mirror::Frame(frame), "eval") => {
            let text = arg(args, 0).to_string();
            let completion = frame.eval(context, &text)?;
            Ok(completion.into_value(context, home))
        }
        (Mirror::Frame(frame), "evalWithBindings") => {
            let text = arg(args, 0).to_string();
            let bindings = object_arg(args, 1)?;
            let bindings: Vec<(Rc<str>, JsValue)> = context
                .object_or_throw(bindings)?
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let completion = frame.eval_with_bindings(context, &text, &bindings)?;
            Ok(completion.into_value(context, home))
        }
        (Mirror::Object(object), "call") => {
            let completion = object.call(context, &arg(args, 0), args.get(1..).unwrap_or_default())?;
            Ok(completion.into_value(context, home))
        }
        (Mirror::Object(object), "apply") => {
            let completion = object.apply(context, &arg(args, 0), &arg(args, 1))?;
            Ok(completion.into_value(context, home))
        }
        (Mirror::Object(object), "getProperty") => {
            let key = arg(args, 0).to_string();
            let completion = object.get_property(context, &key)?;
            Ok(completion.into_value(context, home))
        }
        (Mirror::Script(script), "getChildScripts") => {
            let children = script
                .child_scripts(context)?
                .into_iter()
                .map(|s| JsValue::Mirror(Mirror::Script(s)))
                .collect();
            Ok(array_like(context, home, children))
        }
        (Mirror::Script(script), "getOffsetLine") => {
            let offset = offset_arg(args, 0)?;
            Ok(script.offset_line(context, offset)?.into())
        }
        (Mirror::Script(script), "getAllOffsets") => {
            let lines = script.all_offsets(context)?;
            let result = context.alloc_object(home, ObjectKind::Ordinary);
            let mut length = 0;
            for (line, offsets) in lines {
                let offsets = offsets.into_iter().map(JsValue::from).collect();
                let offsets = array_like(context, home, offsets);
                context.define_property(result, &line.to_string(), offsets)?;
                length = length.max(line + 1);
            }
            context.define_property(result, "length", length.into())?;
            Ok(JsValue::Object(result))
        }
        (Mirror::Script(script), "getLineOffsets") => {
            let line = offset_arg(args, 0)?;
            let offsets = script
                .line_offsets(context, line)?
                .into_iter()
                .map(JsValue::from)
                .collect();
            Ok(array_like(context, home, offsets))
        }
        (Mirror::Script(script), "setBreakpoint") => {
            let offset = offset_arg(args, 0)?;
            script.set_breakpoint(context, offset, &arg(args, 1))?;
            Ok(JsValue::Undefined)
        }
        (Mirror::Script(script), "getBreakpoints") => {
            let offset = match arg(args, 0) {
                JsValue::Undefined => None,
                _ => Some(offset_arg(args, 0)?),
            };
            let handlers = script.breakpoints(context, offset)?;
            Ok(array_like(context, home, handlers))
        }
        (Mirror::Script(script), "clearBreakpoint") => {
            script.clear_breakpoint(context, &arg(args, 0))?;
            Ok(JsValue::Undefined)
        }
        (Mirror::Script(script), "clearAllBreakpoints") => {
            script.clear_all_breakpoints(context)?;
            Ok(JsValue::Undefined)
        }
        _ => Err(JsError::type_error(format!(
            "{}.{name} is not a function",
            mirror.class_name()
        ))),
    }
}
