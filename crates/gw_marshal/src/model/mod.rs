//! The in-memory object graph that sessions read and write.
//!
//! Graphs live in a [`Heap`], an arena of [`Object`]s addressed by [`ObjRef`].
//! Reference identity is index identity: two [`Value::Ref`]s denote the same
//! object exactly when they carry the same [`ObjRef`]. This is what the handle
//! tables track, and it is what lets cycles and shared sub-graphs survive a
//! round trip.

// -----------------------------------------------------------------------------
// Modules

mod heap;
mod object;
mod value;

// -----------------------------------------------------------------------------
// Exports

pub use heap::Heap;
pub use object::{ArrayData, ObjRef, Object, ObjectBody};
pub use value::Value;
