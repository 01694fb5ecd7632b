use crate::model::{Heap, Value};

/// Session-wide substitution of values.
///
/// Runs after the class's own `write_replace` hook on the write side and
/// after `read_resolve` on the read side.
pub trait ObjectResolver: Send + Sync {
    fn write_replace(&self, _heap: &mut Heap, value: Value) -> Value {
        value
    }

    fn read_resolve(&self, _heap: &mut Heap, value: Value) -> Value {
        value
    }
}
