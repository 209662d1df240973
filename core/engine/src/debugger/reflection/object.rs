use std::{cell::Cell, rc::Rc};

use crate::{
    Context, DebugError, JsError, JsResult, JsValue,
    debugger::{Debugger, DebuggerId, reflection::{Completion, ScriptMirror}},
    object::{FunctionKind, JsObject, ObjectId, ObjectKind},
    realm::RealmId,
};

#[derive(Debug)]
struct Inner {
    owner: DebuggerId,
    referent: Cell<Option<ObjectId>>,
}

/// A debugger's view of a debuggee object.
#[derive(Debug, Clone)]
pub struct ObjectMirror {
    inner: Rc<Inner>,
}

impl PartialEq for ObjectMirror {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl ObjectMirror {
    pub(crate) fn new(owner: DebuggerId, referent: ObjectId) -> Self {
        Self {
            inner: Rc::new(Inner {
                owner,
                referent: Cell::new(Some(referent)),
            }),
        }
    }

    pub(crate) fn owner_id(&self) -> DebuggerId {
        self.inner.owner
    }

    /// The debugger that created this mirror.
    #[must_use]
    pub fn owner(&self) -> Debugger {
        Debugger::from_id(self.inner.owner)
    }

    /// Returns `true` until the referent is collected.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.inner.referent.get().is_some()
    }

    pub(crate) fn invalidate(&self) {
        self.inner.referent.set(None);
    }

    pub(crate) fn referent(&self) -> JsResult<ObjectId> {
        self.inner.referent.get().ok_or_else(|| DebugError::Dead.into())
    }

    fn object<'a>(&self, context: &'a Context) -> JsResult<&'a JsObject> {
        context
            .heap
            .get(self.referent()?)
            .ok_or_else(|| DebugError::Dead.into())
    }

    fn function_kind<'a>(&self, context: &'a Context) -> JsResult<Option<&'a FunctionKind>> {
        let target = context.unwrap_cross_realm(self.referent()?);
        Ok(match context.heap.get(target).map(|o| &o.kind) {
            Some(ObjectKind::Function(kind)) => Some(kind),
            _ => None,
        })
    }

    /// The referent's prototype, or `null`.
    pub fn proto(&self, context: &mut Context) -> JsResult<JsValue> {
        match self.object(context)?.proto {
            Some(proto) => self.owner().wrap(context, JsValue::Object(proto)),
            None => Ok(JsValue::Null),
        }
    }

    /// The referent's class name.
    pub fn class_name(&self, context: &Context) -> JsResult<&'static str> {
        Ok(self.object(context)?.kind.class_name())
    }

    /// Returns `true` if the referent can be called.
    pub fn is_callable(&self, context: &Context) -> JsResult<bool> {
        Ok(context.is_callable(&JsValue::Object(self.referent()?)))
    }

    /// The function name, for named functions.
    pub fn name(&self, context: &Context) -> JsResult<Option<Rc<str>>> {
        Ok(context.function_name(self.referent()?))
    }

    /// Parameter names of an interpreted function; empty for anything else.
    pub fn parameter_names(&self, context: &Context) -> JsResult<Vec<Rc<str>>> {
        Ok(match self.function_kind(context)? {
            Some(FunctionKind::Interpreted { script, .. }) => context
                .scripts
                .get(*script)
                .map(|s| s.params.clone())
                .unwrap_or_default(),
            _ => Vec::new(),
        })
    }

    /// The script of an interpreted function.
    pub fn script(&self, context: &mut Context) -> JsResult<Option<ScriptMirror>> {
        let script = match self.function_kind(context)? {
            Some(FunctionKind::Interpreted { script, .. }) => *script,
            _ => return Ok(None),
        };
        self.owner().script_mirror(context, script).map(Some)
    }

    fn prepare_call(&self, context: &mut Context, this: &JsValue, args: &[JsValue]) -> JsResult<(RealmId, JsValue, Vec<JsValue>)> {
        let realm = self.object(context)?.realm;
        if !self.is_callable(context)? {
            return Err(JsError::type_error("Debugger.Object referent is not callable"));
        }
        let owner = self.owner();
        let this = owner.unwrap(context, this)?;
        let this = context.wrap_into(realm, this)?;
        let args = args
            .iter()
            .map(|value| {
                let value = owner.unwrap(context, value)?;
                context.wrap_into(realm, value)
            })
            .collect::<JsResult<Vec<_>>>()?;
        Ok((realm, this, args))
    }

    /// Calls the referent with debugger-side `this` and arguments.
    pub fn call(&self, context: &mut Context, this: &JsValue, args: &[JsValue]) -> JsResult<Completion> {
        let (realm, this, args) = self.prepare_call(context, this, args)?;
        let result = context.call(&JsValue::Object(self.referent()?), &this, &args);
        Completion::from_result(context, self.owner(), realm, result)
    }

    /// Like [`ObjectMirror::call`], with the arguments taken from an
    /// array-like object of the debugger's world.
    pub fn apply(&self, context: &mut Context, this: &JsValue, args: &JsValue) -> JsResult<Completion> {
        let args = match args {
            JsValue::Undefined | JsValue::Null => Vec::new(),
            JsValue::Object(list) => {
                let length = context.get(*list, "length")?.to_number();
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let length = if length.is_finite() && length > 0.0 { length as usize } else { 0 };
                (0..length)
                    .map(|index| context.get(*list, &index.to_string()))
                    .collect::<JsResult<Vec<_>>>()?
            }
            _ => return Err(JsError::type_error("apply arguments must be an array-like object")),
        };
        self.call(context, this, &args)
    }

    /// Reads an own or inherited property of the referent.
    pub fn get_property(&self, context: &mut Context, key: &str) -> JsResult<Completion> {
        let referent = self.referent()?;
        let realm = self.object(context)?.realm;
        let result = context.get(referent, key);
        Completion::from_result(context, self.owner(), realm, result)
    }
}
