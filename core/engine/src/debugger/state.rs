//! Per-debugger state and the debug state of a context.

use bitflags::bitflags;
use indexmap::IndexSet;
use rustc_hash::FxBuildHasher;

use crate::{
    debugger::{breakpoint::Breakpoint, cache::MirrorCaches},
    gc::{Arena, Id},
    object::ObjectId,
    realm::RealmId,
};

use super::breakpoint::BreakpointId;

/// Identifier of a debugger.
pub type DebuggerId = Id<DebuggerState>;

bitflags! {
    /// The hooks present on a debugger's hooks object.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HookFlags: u8 {
        /// `debuggerStatement`
        const DEBUGGER_STATEMENT = 1 << 0;
        /// `throw`
        const THROW = 1 << 1;
        /// `newScript`
        const NEW_SCRIPT = 1 << 2;
        /// `enterFrame`
        const ENTER_FRAME = 1 << 3;
    }
}

/// A debugger event with a user hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    /// A `debugger` statement ran. Receives the frame; resumable.
    DebuggerStatement,
    /// An exception is leaving a frame. Receives the frame and the exception; resumable.
    Throw,
    /// A script was compiled. Receives the script mirror.
    NewScript,
    /// A frame was pushed. Receives the frame.
    EnterFrame,
}

impl Hook {
    /// Every hook, in flag order.
    pub const ALL: [Self; 4] = [
        Self::DebuggerStatement,
        Self::Throw,
        Self::NewScript,
        Self::EnterFrame,
    ];

    /// The property name the hook is looked up under.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::DebuggerStatement => "debuggerStatement",
            Self::Throw => "throw",
            Self::NewScript => "newScript",
            Self::EnterFrame => "enterFrame",
        }
    }

    /// The flag recorded for this hook.
    #[must_use]
    pub const fn flag(self) -> HookFlags {
        match self {
            Self::DebuggerStatement => HookFlags::DEBUGGER_STATEMENT,
            Self::Throw => HookFlags::THROW,
            Self::NewScript => HookFlags::NEW_SCRIPT,
            Self::EnterFrame => HookFlags::ENTER_FRAME,
        }
    }

    /// Whether the hook's return value is a resumption value.
    #[must_use]
    pub const fn is_resumable(self) -> bool {
        matches!(self, Self::DebuggerStatement | Self::Throw)
    }
}

/// Everything a debugger owns.
#[derive(Debug)]
pub struct DebuggerState {
    pub(crate) object: ObjectId,
    pub(crate) home: RealmId,
    pub(crate) hooks: ObjectId,
    pub(crate) hook_flags: HookFlags,
    pub(crate) enabled: bool,
    pub(crate) uncaught_exception_hook: Option<ObjectId>,
    pub(crate) debuggees: IndexSet<RealmId, FxBuildHasher>,
    pub(crate) breakpoints: Vec<BreakpointId>,
    pub(crate) caches: MirrorCaches,
}

impl DebuggerState {
    pub(crate) fn new(object: ObjectId, home: RealmId, hooks: ObjectId) -> Self {
        Self {
            object,
            home,
            hooks,
            hook_flags: HookFlags::empty(),
            enabled: true,
            uncaught_exception_hook: None,
            debuggees: IndexSet::default(),
            breakpoints: Vec::new(),
            caches: MirrorCaches::default(),
        }
    }

    /// Returns `true` if the debugger would run `hook` right now.
    pub(crate) fn wants(&self, hook: Hook) -> bool {
        self.enabled && self.hook_flags.contains(hook.flag())
    }
}

/// The debuggers and breakpoints of a context.
#[derive(Debug, Default)]
pub(crate) struct DebugState {
    pub(crate) debuggers: Arena<DebuggerState>,
    pub(crate) breakpoints: Arena<Breakpoint>,
    /// Number of completed collections; stamps weak map entries.
    pub(crate) epoch: u64,
}
