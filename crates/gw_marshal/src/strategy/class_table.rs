use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::class::ClassRef;
use crate::io::{DataInput, DataOutput};
use crate::{MarshalError, Result};

// -----------------------------------------------------------------------------
// ClassTable

/// Writes the payload identifying one predefined class.
pub trait ClassTableWriter: Send + Sync {
    fn write_class(&self, output: &mut dyn DataOutput, class: &ClassRef) -> Result<()>;
}

/// Classes both sides know in advance, written as a short token instead
/// of a full descriptor.
pub trait ClassTable: Send + Sync {
    /// Returns the writer for `class`, or `None` if it is not predefined.
    fn class_writer(&self, class: &ClassRef) -> Option<Arc<dyn ClassTableWriter>>;

    /// Reads the payload written by a [`ClassTableWriter`].
    fn read_class(&self, input: &mut dyn DataInput) -> Result<ClassRef>;
}

// -----------------------------------------------------------------------------
// IndexedClassTable

/// A [`ClassTable`] over a fixed list of classes, written as a varint index.
///
/// Both sides must build the table from the same list in the same order.
#[derive(Clone, Debug, Default)]
pub struct IndexedClassTable {
    classes: Vec<ClassRef>,
}

impl IndexedClassTable {
    pub fn new(classes: impl IntoIterator<Item = ClassRef>) -> Self {
        Self {
            classes: classes.into_iter().collect(),
        }
    }
}

struct IndexWriter(u64);

impl ClassTableWriter for IndexWriter {
    fn write_class(&self, output: &mut dyn DataOutput, _class: &ClassRef) -> Result<()> {
        output.write_varint(self.0)
    }
}

impl ClassTable for IndexedClassTable {
    fn class_writer(&self, class: &ClassRef) -> Option<Arc<dyn ClassTableWriter>> {
        let index = self.classes.iter().position(|c| c == class)?;
        Some(Arc::new(IndexWriter(index as u64)))
    }

    fn read_class(&self, input: &mut dyn DataInput) -> Result<ClassRef> {
        let index = input.read_varint()?;
        usize::try_from(index)
            .ok()
            .and_then(|i| self.classes.get(i))
            .cloned()
            .ok_or_else(|| MarshalError::ClassNotFound {
                name: alloc::format!("class table entry {index}"),
            })
    }
}
