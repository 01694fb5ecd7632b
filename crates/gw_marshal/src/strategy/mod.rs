//! Pluggable behaviours of a marshalling configuration.
//!
//! Every strategy is a trait object shared through `Arc`, so one
//! configuration can back many concurrent sessions.

// -----------------------------------------------------------------------------
// Modules

mod class_resolver;
mod class_table;
mod creator;
mod externalizer;
mod filter;
mod object_resolver;
mod object_table;
mod stream_header;

// -----------------------------------------------------------------------------
// Exports

pub use class_resolver::{ClassResolver, RegistryClassResolver};
pub use class_table::{ClassTable, ClassTableWriter, IndexedClassTable};
pub use creator::{Creator, DefaultCreator};
pub use externalizer::{Externalizer, ExternalizerFactory, ExternalizerRegistry};
pub use filter::{FilterInfo, FilterPatternError, FilterStatus, PatternFilter, UnmarshallingFilter};
pub use object_resolver::ObjectResolver;
pub use object_table::{ObjectTable, ObjectTableWriter};
pub use stream_header::{MagicHeader, StreamHeader};
