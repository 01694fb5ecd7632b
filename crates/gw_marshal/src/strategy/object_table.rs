use alloc::sync::Arc;

use crate::Result;
use crate::io::{ObjectInput, ObjectOutput};
use crate::model::{Heap, Value};

// -----------------------------------------------------------------------------
// ObjectTable

/// Writes the payload identifying one predefined object.
pub trait ObjectTableWriter: Send + Sync {
    fn write_object(&self, output: &mut dyn ObjectOutput, value: &Value) -> Result<()>;
}

/// Objects both sides know in advance.
///
/// Predefined objects never receive an instance handle, so writing the
/// same one twice consults the table twice.
pub trait ObjectTable: Send + Sync {
    /// Returns the writer for `value`, or `None` if it is not predefined.
    fn object_writer(&self, heap: &Heap, value: &Value) -> Option<Arc<dyn ObjectTableWriter>>;

    /// Reads the payload written by an [`ObjectTableWriter`].
    fn read_object(&self, input: &mut dyn ObjectInput) -> Result<Value>;
}
