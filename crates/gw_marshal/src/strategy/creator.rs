use crate::Result;
use crate::class::ClassRef;
use crate::model::{Heap, ObjRef};

/// Allocates blank instances for the read side to populate.
pub trait Creator: Send + Sync {
    fn create(&self, heap: &mut Heap, class: &ClassRef) -> Result<ObjRef>;
}

/// Allocates [`Heap::instantiate`] defaults.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultCreator;

impl Creator for DefaultCreator {
    #[inline]
    fn create(&self, heap: &mut Heap, class: &ClassRef) -> Result<ObjRef> {
        Ok(heap.instantiate(class))
    }
}
