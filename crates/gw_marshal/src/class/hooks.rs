use alloc::sync::Arc;
use core::fmt;

use crate::Result;
use crate::io::{ObjectInput, ObjectOutput};
use crate::marshal::ObjectWriteContext;
use crate::model::{Heap, ObjRef, Value};
use crate::unmarshal::ObjectReadContext;

/// Custom write logic for one class level.
///
/// Runs in custom-data mode: primitives are framed into blocks, and
/// [`ObjectWriteContext::default_write_object`] writes the declared fields.
pub type WriteObjectHook = Arc<dyn Fn(&mut ObjectWriteContext<'_>) -> Result<()> + Send + Sync>;

/// Custom read logic for one class level, mirroring a [`WriteObjectHook`].
pub type ReadObjectHook = Arc<dyn Fn(&mut ObjectReadContext<'_>) -> Result<()> + Send + Sync>;

/// Substitutes an object before it is written.
pub type WriteReplaceHook = Arc<dyn Fn(&mut Heap, ObjRef) -> Value + Send + Sync>;

/// Substitutes an object after it has been read.
pub type ReadResolveHook = Arc<dyn Fn(&mut Heap, ObjRef) -> Value + Send + Sync>;

/// Writes the complete state of an externalizable instance.
pub type ExternalWriteHook = Arc<dyn Fn(ObjRef, &mut dyn ObjectOutput) -> Result<()> + Send + Sync>;

/// Restores the complete state of an externalizable instance.
pub type ExternalReadHook = Arc<dyn Fn(ObjRef, &mut dyn ObjectInput) -> Result<()> + Send + Sync>;

// -----------------------------------------------------------------------------
// ClassHooks

/// The optional per-class behaviours consulted by the pipelines.
#[derive(Clone, Default)]
pub struct ClassHooks {
    pub(crate) write_object: Option<WriteObjectHook>,
    pub(crate) read_object: Option<ReadObjectHook>,
    pub(crate) write_replace: Option<WriteReplaceHook>,
    pub(crate) read_resolve: Option<ReadResolveHook>,
    pub(crate) external: Option<(ExternalWriteHook, ExternalReadHook)>,
}

impl ClassHooks {
    #[inline]
    pub fn write_object(&self) -> Option<&WriteObjectHook> {
        self.write_object.as_ref()
    }

    #[inline]
    pub fn read_object(&self) -> Option<&ReadObjectHook> {
        self.read_object.as_ref()
    }

    #[inline]
    pub fn write_replace(&self) -> Option<&WriteReplaceHook> {
        self.write_replace.as_ref()
    }

    #[inline]
    pub fn read_resolve(&self) -> Option<&ReadResolveHook> {
        self.read_resolve.as_ref()
    }

    #[inline]
    pub fn external_write(&self) -> Option<&ExternalWriteHook> {
        self.external.as_ref().map(|(w, _)| w)
    }

    #[inline]
    pub fn external_read(&self) -> Option<&ExternalReadHook> {
        self.external.as_ref().map(|(_, r)| r)
    }
}

impl fmt::Debug for ClassHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassHooks")
            .field("write_object", &self.write_object.is_some())
            .field("read_object", &self.read_object.is_some())
            .field("write_replace", &self.write_replace.is_some())
            .field("read_resolve", &self.read_resolve.is_some())
            .field("external", &self.external.is_some())
            .finish()
    }
}
