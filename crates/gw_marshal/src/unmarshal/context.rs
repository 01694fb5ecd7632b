use alloc::sync::Arc;

use crate::Result;
use crate::class::ClassRef;
use crate::descriptor::StreamClass;
use crate::io::{DataInput, ObjectInput};
use crate::model::{Heap, ObjRef, Value};

/// The read pipeline as seen from inside a custom hook.
pub(crate) trait HookReader: ObjectInput {
    /// Reads the default fields of one stream class level.
    fn read_default_fields(&mut self, this: ObjRef, level: &StreamClass) -> Result<()>;
}

// -----------------------------------------------------------------------------
// ObjectReadContext

/// Passed to a class's `read_object` hook.
///
/// The hook must consume custom data in the order it was written. Data it
/// leaves unread is skipped once the hook returns. Reading past the end
/// fails with [`MarshalError::EndOfCustomData`](crate::MarshalError::EndOfCustomData).
///
/// # Examples
///
/// ```
/// use gw_marshal::class::{ClassInfo, FieldType};
/// use gw_marshal::io::DataInput;
/// use gw_marshal::model::Value;
///
/// let class = ClassInfo::builder("app.Session")
///     .serializable()
///     .field("user", FieldType::Object)
///     .transient_field("started", FieldType::Long)
///     .read_object(|ctx| {
///         ctx.default_read_object()?;
///         let started = ctx.read_i64()?;
///         ctx.set_field("started", Value::Long(started));
///         Ok(())
///     })
///     .build();
/// assert!(class.hooks().read_object().is_some());
/// ```
pub struct ObjectReadContext<'x> {
    input: &'x mut dyn HookReader,
    this: ObjRef,
    level: Arc<StreamClass>,
}

impl<'x> ObjectReadContext<'x> {
    pub(crate) fn new(input: &'x mut dyn HookReader, this: ObjRef, level: Arc<StreamClass>) -> Self {
        Self { input, this, level }
    }

    /// The object being populated.
    #[inline]
    pub fn this(&self) -> ObjRef {
        self.this
    }

    /// The local class level whose hook is running.
    #[inline]
    pub fn class(&self) -> &ClassRef {
        &self.level.class
    }

    /// Reads the fields the writer sent for this level.
    ///
    /// Fields unknown to the local class are discarded. Local fields missing
    /// from the stream keep their current values.
    pub fn default_read_object(&mut self) -> Result<()> {
        self.input.read_default_fields(self.this, &self.level)
    }

    /// Returns a field declared by this class level.
    pub fn field(&self, name: &str) -> Option<&Value> {
        let (slot, _) = self.level.class.own_slot_of(name)?;
        self.input.heap().slot(self.this, slot)
    }

    /// Sets a field declared by this class level. Returns `false` if the
    /// level has no such field.
    pub fn set_field(&mut self, name: &str, value: Value) -> bool {
        let Some((slot, _)) = self.level.class.own_slot_of(name) else {
            return false;
        };
        self.input.heap_mut().set_slot(self.this, slot, value)
    }
}

impl DataInput for ObjectReadContext<'_> {
    #[inline]
    fn read_u8(&mut self) -> Result<u8> {
        self.input.read_u8()
    }

    #[inline]
    fn read_into(&mut self, buf: &mut [u8]) -> Result<()> {
        self.input.read_into(buf)
    }
}

impl ObjectInput for ObjectReadContext<'_> {
    #[inline]
    fn heap(&self) -> &Heap {
        self.input.heap()
    }

    #[inline]
    fn heap_mut(&mut self) -> &mut Heap {
        self.input.heap_mut()
    }

    #[inline]
    fn read_object(&mut self) -> Result<Value> {
        self.input.read_object()
    }

    #[inline]
    fn read_object_unshared(&mut self) -> Result<Value> {
        self.input.read_object_unshared()
    }
}
