//! Realms: the isolation boundary of the runtime.
//!
//! A realm owns one global object. Objects never reference objects of
//! another realm directly; values crossing over are translated by
//! [`Context::wrap_into`](crate::Context::wrap_into). A realm observed by at
//! least one debugger runs in debug mode and carries the table of breakpoint
//! sites for its scripts.

use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::{FxBuildHasher, FxHashMap};

use crate::{
    debugger::{DebuggerId, breakpoint::{BreakpointSite, SiteKey}},
    gc::Id,
    object::ObjectId,
};

/// Identifier of a realm.
pub type RealmId = Id<Realm>;

/// An isolated execution context.
#[derive(Debug)]
pub struct Realm {
    pub(crate) name: Rc<str>,
    pub(crate) global: ObjectId,
    pub(crate) debug_mode: bool,
    pub(crate) observers: Vec<DebuggerId>,
    pub(crate) breakpoint_sites: IndexMap<SiteKey, BreakpointSite, FxBuildHasher>,
    pub(crate) wrappers: FxHashMap<ObjectId, ObjectId>,
}

impl Realm {
    pub(crate) fn new(name: Rc<str>, global: ObjectId) -> Self {
        Self {
            name,
            global,
            debug_mode: false,
            observers: Vec::new(),
            breakpoint_sites: IndexMap::default(),
            wrappers: FxHashMap::default(),
        }
    }

    /// The realm's name, used in diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The realm's global object.
    #[must_use]
    pub const fn global(&self) -> ObjectId {
        self.global
    }

    /// Returns `true` while at least one debugger observes this realm.
    #[must_use]
    pub fn is_under_debug(&self) -> bool {
        self.debug_mode
    }

    /// Debuggers observing this realm, in registration order.
    #[must_use]
    pub fn observers(&self) -> &[DebuggerId] {
        &self.observers
    }

    /// Number of breakpoint sites currently patched into this realm's scripts.
    #[must_use]
    pub fn breakpoint_site_count(&self) -> usize {
        self.breakpoint_sites.len()
    }
}
