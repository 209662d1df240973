//! Call frames.

use crate::{JsValue, object::ObjectId, realm::RealmId, script::ScriptId};

/// Unique identifier of a call frame for the lifetime of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub(crate) u64);

/// How a frame came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Top-level program code.
    Global,
    /// A function call.
    Call,
    /// Code evaluated by a debugger inside another frame.
    Eval,
}

impl FrameKind {
    /// The name reported by reflection.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Call => "call",
            Self::Eval => "eval",
        }
    }
}

/// An activation of a script.
#[derive(Debug, Clone)]
pub struct CallFrame {
    pub(crate) id: FrameId,
    pub(crate) kind: FrameKind,
    pub(crate) realm: RealmId,
    pub(crate) script: ScriptId,
    pub(crate) pc: u32,
    pub(crate) next_pc: u32,
    pub(crate) this: JsValue,
    pub(crate) arguments: Vec<JsValue>,
    pub(crate) callee: Option<ObjectId>,
    pub(crate) scope: ObjectId,
    pub(crate) rval: JsValue,
    pub(crate) stack_base: usize,
}

impl CallFrame {
    pub(crate) fn new(kind: FrameKind, realm: RealmId, script: ScriptId, scope: ObjectId, this: JsValue) -> Self {
        Self {
            id: FrameId(0),
            kind,
            realm,
            script,
            pc: 0,
            next_pc: 0,
            this,
            arguments: Vec::new(),
            callee: None,
            scope,
            rval: JsValue::Undefined,
            stack_base: 0,
        }
    }

    pub(crate) fn with_call(mut self, callee: ObjectId, arguments: Vec<JsValue>) -> Self {
        self.callee = Some(callee);
        self.arguments = arguments;
        self
    }

    /// The frame's identifier.
    #[must_use]
    pub const fn id(&self) -> FrameId {
        self.id
    }

    /// The frame's kind.
    #[must_use]
    pub const fn kind(&self) -> FrameKind {
        self.kind
    }

    /// The realm the frame runs in.
    #[must_use]
    pub const fn realm(&self) -> RealmId {
        self.realm
    }

    /// The script being executed.
    #[must_use]
    pub const fn script(&self) -> ScriptId {
        self.script
    }

    /// Offset of the instruction being executed.
    #[must_use]
    pub const fn pc(&self) -> u32 {
        self.pc
    }

    /// The innermost scope object.
    #[must_use]
    pub const fn scope(&self) -> ObjectId {
        self.scope
    }
}
