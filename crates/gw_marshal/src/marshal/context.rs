use alloc::sync::Arc;

use crate::Result;
use crate::class::ClassRef;
use crate::descriptor::ClassDescriptor;
use crate::io::{DataOutput, ObjectOutput};
use crate::model::{Heap, ObjRef, Value};

/// The write pipeline as seen from inside a custom hook.
pub(crate) trait HookWriter: ObjectOutput {
    /// Writes the default fields of one class level, outside custom data.
    fn write_default_fields(&mut self, this: ObjRef, level: &ClassDescriptor) -> Result<()>;
}

// -----------------------------------------------------------------------------
// ObjectWriteContext

/// Passed to a class's `write_object` hook.
///
/// Primitives written through the context become custom data of the class
/// level being written. Objects are written inline and share handles with
/// the rest of the graph.
///
/// # Examples
///
/// ```
/// use gw_marshal::class::{ClassInfo, FieldType};
/// use gw_marshal::io::DataOutput;
///
/// let class = ClassInfo::builder("app.Session")
///     .serializable()
///     .field("user", FieldType::Object)
///     .write_object(|ctx| {
///         ctx.default_write_object()?;
///         ctx.write_i64(1_700_000_000)
///     })
///     .build();
/// assert!(class.hooks().write_object().is_some());
/// ```
pub struct ObjectWriteContext<'x> {
    output: &'x mut dyn HookWriter,
    this: ObjRef,
    class: ClassRef,
    descriptor: Arc<ClassDescriptor>,
}

impl<'x> ObjectWriteContext<'x> {
    pub(crate) fn new(
        output: &'x mut dyn HookWriter,
        this: ObjRef,
        class: ClassRef,
        descriptor: Arc<ClassDescriptor>,
    ) -> Self {
        Self {
            output,
            this,
            class,
            descriptor,
        }
    }

    /// The object being written.
    #[inline]
    pub fn this(&self) -> ObjRef {
        self.this
    }

    /// The class level whose hook is running.
    #[inline]
    pub fn class(&self) -> &ClassRef {
        &self.class
    }

    #[inline]
    pub fn descriptor(&self) -> &ClassDescriptor {
        &self.descriptor
    }

    /// Writes the serializable fields of this class level.
    pub fn default_write_object(&mut self) -> Result<()> {
        self.output.write_default_fields(self.this, &self.descriptor)
    }

    /// Returns a field declared by this class level.
    pub fn field(&self, name: &str) -> Option<&Value> {
        let (slot, _) = self.class.own_slot_of(name)?;
        self.output.heap().slot(self.this, slot)
    }
}

impl DataOutput for ObjectWriteContext<'_> {
    #[inline]
    fn write_u8(&mut self, v: u8) -> Result<()> {
        self.output.write_u8(v)
    }

    #[inline]
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.output.write_bytes(bytes)
    }
}

impl ObjectOutput for ObjectWriteContext<'_> {
    #[inline]
    fn heap(&self) -> &Heap {
        self.output.heap()
    }

    #[inline]
    fn write_object(&mut self, value: &Value) -> Result<()> {
        self.output.write_object(value)
    }

    #[inline]
    fn write_object_unshared(&mut self, value: &Value) -> Result<()> {
        self.output.write_object_unshared(value)
    }
}
