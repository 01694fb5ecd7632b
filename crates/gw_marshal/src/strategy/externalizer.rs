use alloc::string::String;
use alloc::sync::Arc;

use gw_utils::hash::HashMap;

use crate::class::ClassRef;
use crate::io::{DataInput, DataOutput, ObjectInput, ObjectOutput};
use crate::model::{Heap, ObjRef};
use crate::{MarshalError, Result};

// -----------------------------------------------------------------------------
// Externalizer

/// Out-of-class serialization logic for instances of some class.
///
/// The externalizer is announced once per class in the stream, together
/// with its id and optional configuration state. Instance data is written
/// in custom-data mode.
pub trait Externalizer: Send + Sync {
    /// A stable identifier used to find the externalizer on the read side.
    fn id(&self) -> &str;

    /// Writes configuration the read side needs to rebuild this externalizer.
    fn write_state(&self, _output: &mut dyn DataOutput) -> Result<()> {
        Ok(())
    }

    /// Writes the state of `this`.
    fn write_external(&self, this: ObjRef, output: &mut dyn ObjectOutput) -> Result<()>;

    /// Allocates the instance. The handle is already reserved, so data read
    /// here may not refer back to the instance.
    fn create_external(&self, class: &ClassRef, input: &mut dyn ObjectInput) -> Result<ObjRef> {
        Ok(input.heap_mut().instantiate(class))
    }

    /// Restores the state of `this`. Back references to it resolve.
    fn read_external(&self, this: ObjRef, input: &mut dyn ObjectInput) -> Result<()>;
}

/// Chooses externalizers on the write side and rebuilds them on the read side.
pub trait ExternalizerFactory: Send + Sync {
    /// Returns the externalizer for `obj`, or `None` to use the default pipeline.
    ///
    /// Only asked for the first instance of each class in a session. Later
    /// instances of that class reuse the externalizer returned here.
    fn externalizer(&self, heap: &Heap, obj: ObjRef) -> Option<Arc<dyn Externalizer>>;

    /// Rebuilds the externalizer announced with `id`, reading its state.
    fn read_externalizer(&self, id: &str, input: &mut dyn DataInput) -> Result<Arc<dyn Externalizer>>;
}

// -----------------------------------------------------------------------------
// ExternalizerRegistry

/// An [`ExternalizerFactory`] for stateless externalizers, keyed by class name.
#[derive(Clone, Default)]
pub struct ExternalizerRegistry {
    by_class: HashMap<String, Arc<dyn Externalizer>>,
    by_id: HashMap<String, Arc<dyn Externalizer>>,
}

impl ExternalizerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `externalizer` for every instance of the class named `class_name`.
    pub fn register(&mut self, class_name: impl Into<String>, externalizer: Arc<dyn Externalizer>) {
        self.by_id
            .insert(externalizer.id().into(), externalizer.clone());
        self.by_class.insert(class_name.into(), externalizer);
    }
}

impl ExternalizerFactory for ExternalizerRegistry {
    fn externalizer(&self, heap: &Heap, obj: ObjRef) -> Option<Arc<dyn Externalizer>> {
        let class = heap.class_of(obj)?;
        self.by_class.get(class.name()).cloned()
    }

    fn read_externalizer(&self, id: &str, _input: &mut dyn DataInput) -> Result<Arc<dyn Externalizer>> {
        self.by_id.get(id).cloned().ok_or_else(|| {
            MarshalError::custom(format_args!("no externalizer registered with id `{id}`"))
        })
    }
}
