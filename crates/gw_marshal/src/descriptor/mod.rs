//! Per-class serialization metadata and its caches.
//!
//! A [`ClassDescriptor`] is the write-side view of one class level: which
//! fields are written, in what order, and which hooks apply. The read side
//! binds the descriptors announced by the stream to local classes.

// -----------------------------------------------------------------------------
// Modules

mod cache;
mod class_descriptor;
mod stream_class;

// -----------------------------------------------------------------------------
// Exports

pub use cache::DescriptorCache;
pub use class_descriptor::{ClassDescriptor, DescriptorKind, SerializableField};

pub(crate) use cache::{serializable_levels, serializable_super};
pub(crate) use stream_class::{StreamClass, StreamField};
