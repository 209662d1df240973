//! The object model.
//!
//! Objects are stored in the context heap (a generation-counted arena) and
//! addressed by [`ObjectId`]. Every object belongs to exactly one realm.
//! Reading or writing a property of a cross-realm [`ObjectKind::Wrapper`]
//! forwards to its target and translates values across the boundary.

pub mod function;

use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;

pub use function::{FunctionKind, NativeFunction};

use crate::{
    Context, JsError, JsResult, JsValue, debugger::DebuggerId, gc::Id, realm::RealmId,
    script::ScriptId,
};

/// Identifier of a heap object.
pub type ObjectId = Id<JsObject>;

/// Ordered own data properties of an object.
pub type PropertyMap = IndexMap<Rc<str>, JsValue, FxBuildHasher>;

/// What an object is, beyond its properties.
#[derive(Debug, Clone)]
pub enum ObjectKind {
    /// A plain object.
    Ordinary,
    /// The global object of a realm. It is also the outermost scope.
    Global,
    /// An error object created by the engine.
    Error,
    /// A callable object.
    Function(FunctionKind),
    /// A declarative scope; properties are the bindings.
    Scope {
        /// The enclosing scope.
        parent: ObjectId,
    },
    /// The object that keeps a compiled script alive.
    ScriptHolder(ScriptId),
    /// A cross-realm wrapper around an object of another realm.
    Wrapper(ObjectId),
    /// The heap object of a debugger instance.
    Debugger(DebuggerId),
}

impl ObjectKind {
    /// The class name reported by reflection.
    #[must_use]
    pub const fn class_name(&self) -> &'static str {
        match self {
            Self::Ordinary => "Object",
            Self::Global => "global",
            Self::Error => "Error",
            Self::Function(_) => "Function",
            Self::Scope { .. } => "Call",
            Self::ScriptHolder(_) => "Script",
            Self::Wrapper(_) => "Proxy",
            Self::Debugger(_) => "Debugger",
        }
    }
}

/// A heap object.
#[derive(Debug)]
pub struct JsObject {
    pub(crate) realm: RealmId,
    pub(crate) kind: ObjectKind,
    pub(crate) proto: Option<ObjectId>,
    pub(crate) properties: PropertyMap,
    pub(crate) marked: bool,
}

impl JsObject {
    pub(crate) fn new(realm: RealmId, kind: ObjectKind) -> Self {
        Self {
            realm,
            kind,
            proto: None,
            properties: PropertyMap::default(),
            marked: false,
        }
    }

    /// The realm this object was created in.
    #[must_use]
    pub const fn realm(&self) -> RealmId {
        self.realm
    }

    /// The object's kind.
    #[must_use]
    pub const fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    /// The object's prototype.
    #[must_use]
    pub const fn proto(&self) -> Option<ObjectId> {
        self.proto
    }

    /// Own properties in definition order.
    #[must_use]
    pub const fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    /// Returns `true` if the object can be called.
    #[must_use]
    pub const fn is_callable(&self) -> bool {
        matches!(self.kind, ObjectKind::Function(_))
    }
}

impl Context {
    /// Returns the object behind `id`, if it is still live.
    #[must_use]
    pub fn object(&self, id: ObjectId) -> Option<&JsObject> {
        self.heap.get(id)
    }

    pub(crate) fn object_or_throw(&self, id: ObjectId) -> JsResult<&JsObject> {
        self.heap
            .get(id)
            .ok_or_else(|| JsError::type_error("object has been collected"))
    }

    /// Allocates an object in `realm`.
    pub fn alloc_object(&mut self, realm: RealmId, kind: ObjectKind) -> ObjectId {
        self.heap.insert(JsObject::new(realm, kind))
    }

    /// Creates a plain object in the current realm with the given properties.
    pub fn create_object(&mut self, properties: &[(&str, JsValue)]) -> ObjectId {
        let realm = self.realm();
        self.create_object_in(realm, properties)
    }

    /// Creates a plain object in `realm` with the given properties.
    pub fn create_object_in(&mut self, realm: RealmId, properties: &[(&str, JsValue)]) -> ObjectId {
        let id = self.alloc_object(realm, ObjectKind::Ordinary);
        if let Some(object) = self.heap.get_mut(id) {
            for (key, value) in properties {
                object.properties.insert((*key).into(), value.clone());
            }
        }
        id
    }

    /// Creates an array-like object (`0..n` keys and `length`) in `realm`.
    pub fn create_array_like(&mut self, realm: RealmId, values: Vec<JsValue>) -> ObjectId {
        let id = self.alloc_object(realm, ObjectKind::Ordinary);
        if let Some(object) = self.heap.get_mut(id) {
            let length = values.len();
            for (index, value) in values.into_iter().enumerate() {
                object.properties.insert(index.to_string().into(), value);
            }
            #[allow(clippy::cast_precision_loss)]
            object
                .properties
                .insert("length".into(), JsValue::Number(length as f64));
        }
        id
    }

    pub(crate) fn create_error_object(&mut self, realm: RealmId, name: &str, message: &str) -> ObjectId {
        let id = self.alloc_object(realm, ObjectKind::Error);
        if let Some(object) = self.heap.get_mut(id) {
            object.properties.insert("name".into(), JsValue::from(name));
            object
                .properties
                .insert("message".into(), JsValue::from(message));
        }
        id
    }

    /// Creates a native function object in the current realm.
    pub fn create_function(&mut self, name: &str, function: NativeFunction) -> ObjectId {
        let realm = self.realm();
        self.create_function_in(realm, name, function)
    }

    /// Creates a native function object in `realm`.
    pub fn create_function_in(&mut self, realm: RealmId, name: &str, function: NativeFunction) -> ObjectId {
        self.alloc_object(
            realm,
            ObjectKind::Function(FunctionKind::Native {
                name: name.into(),
                function,
            }),
        )
    }

    /// Defines a native function as a property of the current realm's global object.
    pub fn register_global_callable(&mut self, name: &str, function: NativeFunction) -> JsResult<()> {
        let global = self.global_object();
        let f = self.create_function(name, function);
        self.define_property(global, name, JsValue::Object(f))
    }

    /// Defines (or overwrites) an own property without forwarding through wrappers.
    pub fn define_property(&mut self, object: ObjectId, key: &str, value: JsValue) -> JsResult<()> {
        let object = self
            .heap
            .get_mut(object)
            .ok_or_else(|| JsError::type_error("object has been collected"))?;
        object.properties.insert(key.into(), value);
        Ok(())
    }

    /// Returns `true` if `key` is an own or inherited property of `object`.
    pub fn has_property(&self, object: ObjectId, key: &str) -> JsResult<bool> {
        let mut current = Some(object);
        while let Some(id) = current {
            let obj = self.object_or_throw(id)?;
            if let ObjectKind::Wrapper(target) = obj.kind {
                return self.has_property(target, key);
            }
            if obj.properties.contains_key(key) {
                return Ok(true);
            }
            current = obj.proto;
        }
        Ok(false)
    }

    /// Reads a property, walking the prototype chain.
    pub fn get(&mut self, object: ObjectId, key: &str) -> JsResult<JsValue> {
        let mut current = Some(object);
        while let Some(id) = current {
            let obj = self.object_or_throw(id)?;
            if let ObjectKind::Wrapper(target) = obj.kind {
                let realm = obj.realm;
                let value = self.get(target, key)?;
                return self.wrap_into(realm, value);
            }
            if let Some(value) = obj.properties.get(key) {
                return Ok(value.clone());
            }
            current = obj.proto;
        }
        Ok(JsValue::Undefined)
    }

    /// Writes an own property.
    pub fn set(&mut self, object: ObjectId, key: &str, value: JsValue) -> JsResult<()> {
        let obj = self.object_or_throw(object)?;
        if let ObjectKind::Wrapper(target) = obj.kind {
            let target_realm = self.object_or_throw(target)?.realm;
            let value = self.wrap_into(target_realm, value)?;
            return self.set(target, key, value);
        }
        self.define_property(object, key, value)
    }

    /// Returns `true` if `value` can be called.
    #[must_use]
    pub fn is_callable(&self, value: &JsValue) -> bool {
        let Some(mut id) = value.as_object() else {
            return false;
        };
        loop {
            match self.heap.get(id).map(|o| &o.kind) {
                Some(ObjectKind::Function(_)) => return true,
                Some(ObjectKind::Wrapper(target)) => id = *target,
                _ => return false,
            }
        }
    }

    /// Translates `value` for use in `realm`.
    ///
    /// Objects of other realms are replaced by a cached cross-realm wrapper;
    /// a wrapper whose target lives in `realm` is replaced by its target.
    /// Primitives and mirrors pass through unchanged.
    pub fn wrap_into(&mut self, realm: RealmId, value: JsValue) -> JsResult<JsValue> {
        let JsValue::Object(id) = value else {
            return Ok(value);
        };
        let obj = self.object_or_throw(id)?;
        if obj.realm == realm {
            return Ok(value);
        }
        if let ObjectKind::Wrapper(target) = obj.kind
            && self.heap.get(target).is_some_and(|t| t.realm == realm)
        {
            return Ok(JsValue::Object(target));
        }
        let target = match obj.kind {
            ObjectKind::Wrapper(target) => target,
            _ => id,
        };
        let cache = &self
            .realms
            .get(realm)
            .ok_or(crate::DebugError::NoSuchRealm)?
            .wrappers;
        if let Some(&wrapper) = cache.get(&target)
            && self.heap.contains(wrapper)
        {
            return Ok(JsValue::Object(wrapper));
        }
        let wrapper = self.alloc_object(realm, ObjectKind::Wrapper(target));
        if let Some(realm) = self.realms.get_mut(realm) {
            realm.wrappers.insert(target, wrapper);
        }
        Ok(JsValue::Object(wrapper))
    }

    /// Strips cross-realm wrappers off an object.
    #[must_use]
    pub fn unwrap_cross_realm(&self, mut id: ObjectId) -> ObjectId {
        while let Some(ObjectKind::Wrapper(target)) = self.heap.get(id).map(|o| &o.kind) {
            id = *target;
        }
        id
    }

    /// The name of a function object, if it has one.
    #[must_use]
    pub fn function_name(&self, id: ObjectId) -> Option<Rc<str>> {
        match &self.heap.get(id)?.kind {
            ObjectKind::Function(FunctionKind::Native { name, .. }) => Some(name.clone()),
            ObjectKind::Function(FunctionKind::Interpreted { script, .. }) => {
                self.scripts.get(*script)?.name.clone()
            }
            ObjectKind::Wrapper(target) => self.function_name(*target),
            _ => None,
        }
    }

    /// Renders a value for humans, showing one level of object properties.
    #[must_use]
    pub fn display_value(&self, value: &JsValue) -> String {
        self.display_value_depth(value, 1)
    }

    fn display_value_depth(&self, value: &JsValue, depth: usize) -> String {
        let JsValue::Object(id) = value else {
            return match value {
                JsValue::String(s) if depth == 0 => format!("{s:?}"),
                _ => value.to_string(),
            };
        };
        let Some(object) = self.heap.get(*id) else {
            return "[dead object]".to_owned();
        };
        match &object.kind {
            ObjectKind::Function(_) => {
                let name = self.function_name(*id).unwrap_or_else(|| "anonymous".into());
                format!("[Function {name}]")
            }
            ObjectKind::Error => {
                let field = |key: &str| object.properties.get(key).map(ToString::to_string);
                format!(
                    "{}: {}",
                    field("name").unwrap_or_else(|| "Error".to_owned()),
                    field("message").unwrap_or_default()
                )
            }
            ObjectKind::Wrapper(target) => self.display_value_depth(&JsValue::Object(*target), depth),
            kind if depth == 0 => format!("[object {}]", kind.class_name()),
            _ => {
                let fields: Vec<String> = object
                    .properties
                    .iter()
                    .map(|(k, v)| format!("{k}: {}", self.display_value_depth(v, depth - 1)))
                    .collect();
                if fields.is_empty() {
                    "{}".to_owned()
                } else {
                    format!("{{ {} }}", fields.join(", "))
                }
            }
        }
    }

    /// Renders an error for humans.
    #[must_use]
    pub fn display_error(&self, error: &JsError) -> String {
        match error {
            JsError::Thrown(value) => format!("Uncaught {}", self.display_value(value)),
            other => other.to_string(),
        }
    }
}
