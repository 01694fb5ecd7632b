//! Class metadata: shapes, fields, hooks and the lookup registry.

// -----------------------------------------------------------------------------
// Modules

mod builtin;
mod class_info;
mod field_info;
mod hooks;
mod registry;

// -----------------------------------------------------------------------------
// Exports

pub use builtin::array_class_name;
pub use class_info::{ClassBuilder, ClassInfo, ClassKind, ClassRef};
pub use field_info::{FieldInfo, FieldType};
pub use hooks::{
    ClassHooks, ExternalReadHook, ExternalWriteHook, ReadObjectHook, ReadResolveHook,
    WriteObjectHook, WriteReplaceHook,
};
pub use registry::ClassRegistry;
