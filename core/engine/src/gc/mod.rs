//! Memory management: arenas, weak maps and the mark-sweep collector.
//!
//! Heap entities are stored in generation-counted [`Arena`]s. The collector
//! marks from the roots of the context (realm globals, persistent roots and
//! the VM's frames and stack), lets the debugger core mark what its rules keep
//! alive, then sweeps unmarked objects and the scripts whose holders died.

mod arena;
mod collector;
mod weak_map;

pub use arena::{Arena, Id};
pub use collector::{GcScope, GcStats};
pub use weak_map::WeakMap;

pub(crate) use collector::Marker;
