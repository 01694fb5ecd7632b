use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use crate::class::{ClassRef, FieldType};
use crate::descriptor::{ClassDescriptor, DescriptorCache, DescriptorKind, serializable_super};
use crate::strategy::Externalizer;

// -----------------------------------------------------------------------------
// StreamField

/// A field as announced by the stream, matched against the local class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct StreamField {
    pub name: String,
    pub ty: FieldType,
    /// Local layout slot, or `None` when the value is read and discarded.
    pub slot: Option<usize>,
}

// -----------------------------------------------------------------------------
// StreamClass

/// A class descriptor as read from the stream and bound to a local class.
pub(crate) struct StreamClass {
    pub class: ClassRef,
    pub kind: DescriptorKind,
    pub fields: Box<[StreamField]>,
    pub has_hook_data: bool,
    pub super_class: Option<Arc<StreamClass>>,
    pub externalizer: Option<Arc<dyn Externalizer>>,
}

impl StreamClass {
    /// A descriptor without fields, for every kind except the field-based ones.
    pub fn bare(class: ClassRef, kind: DescriptorKind) -> Self {
        Self {
            class,
            kind,
            fields: Box::default(),
            has_hook_data: false,
            super_class: None,
            externalizer: None,
        }
    }

    /// Binds the announced fields of one level to the local slots of `class`.
    ///
    /// A stream field only lands in a local slot when both name and type
    /// match. Everything else is read and discarded.
    pub fn with_fields(
        class: ClassRef,
        kind: DescriptorKind,
        announced: Vec<(String, FieldType)>,
        has_hook_data: bool,
        super_class: Option<Arc<StreamClass>>,
    ) -> Self {
        let fields = announced
            .into_iter()
            .map(|(name, ty)| {
                let slot = class
                    .own_slot_of(&name)
                    .filter(|(_, local)| *local == ty)
                    .map(|(slot, _)| slot);
                StreamField { name, ty, slot }
            })
            .collect();
        Self {
            class,
            kind,
            fields,
            has_hook_data,
            super_class,
            externalizer: None,
        }
    }

    /// Builds the stream view of a local class, used for predefined classes
    /// whose metadata never crosses the wire.
    pub fn from_local(class: &ClassRef, cache: &mut DescriptorCache) -> Self {
        let descriptor = cache.describe(class);
        let super_class = match descriptor.kind() {
            DescriptorKind::Serializable => {
                serializable_super(class).map(|s| Arc::new(Self::from_local(s, cache)))
            }
            _ => None,
        };
        Self::from_descriptor(class.clone(), &descriptor, super_class)
    }

    fn from_descriptor(
        class: ClassRef,
        descriptor: &ClassDescriptor,
        super_class: Option<Arc<StreamClass>>,
    ) -> Self {
        let fields = descriptor
            .fields()
            .iter()
            .map(|f| StreamField {
                name: f.name().into(),
                ty: f.ty(),
                slot: Some(f.slot()),
            })
            .collect();
        Self {
            class,
            kind: descriptor.kind(),
            fields,
            has_hook_data: descriptor.has_write_hook(),
            super_class,
            externalizer: None,
        }
    }

    /// The levels of the announced hierarchy, topmost first.
    pub fn levels(this: &Arc<Self>) -> Vec<Arc<StreamClass>> {
        let mut levels: Vec<Arc<StreamClass>> =
            core::iter::successors(Some(this.clone()), |c| c.super_class.clone()).collect();
        levels.reverse();
        levels
    }
}

impl fmt::Debug for StreamClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamClass")
            .field("class", &self.class)
            .field("kind", &self.kind)
            .field("fields", &self.fields)
            .field("has_hook_data", &self.has_hook_data)
            .field("super_class", &self.super_class)
            .field("externalizer", &self.externalizer.as_ref().map(|e| e.id().to_owned()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use super::StreamClass;
    use crate::DescriptorCachePolicy;
    use crate::class::{ClassInfo, FieldType};
    use crate::descriptor::{DescriptorCache, DescriptorKind};

    #[test]
    fn unmatched_fields_are_discarded() {
        let class = ClassInfo::builder("a.V2")
            .serializable()
            .field("kept", FieldType::Int)
            .field("retyped", FieldType::Long)
            .build();

        let stream = StreamClass::with_fields(
            class,
            DescriptorKind::Serializable,
            vec![
                ("kept".into(), FieldType::Int),
                ("retyped".into(), FieldType::Int),
                ("removed".into(), FieldType::Object),
            ],
            false,
            None,
        );
        let slots: Vec<_> = stream.fields.iter().map(|f| f.slot).collect();
        assert_eq!(slots, [Some(0), None, None]);
    }

    #[test]
    fn local_levels() {
        let base = ClassInfo::builder("a.Base")
            .serializable()
            .field("id", FieldType::Int)
            .build();
        let leaf = ClassInfo::builder("a.Leaf")
            .serializable()
            .extends(&base)
            .field("tag", FieldType::Object)
            .build();

        let mut cache = DescriptorCache::new(DescriptorCachePolicy::Session);
        let stream = Arc::new(StreamClass::from_local(&leaf, &mut cache));
        let levels = StreamClass::levels(&stream);
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].class, base);
        assert_eq!(levels[1].fields[0].slot, Some(1));
    }
}
