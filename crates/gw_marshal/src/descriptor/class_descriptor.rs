use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::class::{ClassInfo, ClassKind, FieldType};

// -----------------------------------------------------------------------------
// DescriptorKind

/// How instances of a class are encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DescriptorKind {
    /// Field-by-field encoding, one level per serializable class.
    Serializable,
    /// Component encoding with deferred construction.
    Record,
    /// The class writes its own state through external hooks.
    Externalizable,
    Enum,
    Array(FieldType),
    Proxy,
    /// A class without an instance encoding. Only usable as a class value
    /// or underneath an externalizer.
    Plain,
    String,
    List,
    Map,
}

// -----------------------------------------------------------------------------
// SerializableField

/// A field that takes part in the default encoding of one class level.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SerializableField {
    name: String,
    ty: FieldType,
    ordinal: u32,
    slot: usize,
}

impl SerializableField {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn ty(&self) -> FieldType {
        self.ty
    }

    /// Position of the field in the wire order of its level.
    #[inline]
    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    /// Layout slot of the field in the owning class.
    #[inline]
    pub fn slot(&self) -> usize {
        self.slot
    }
}

// -----------------------------------------------------------------------------
// ClassDescriptor

/// The serialization view of one class level.
///
/// Computed once per class and cached, see [`DescriptorCache`](crate::descriptor::DescriptorCache).
#[derive(Clone, Debug)]
pub struct ClassDescriptor {
    name: String,
    kind: DescriptorKind,
    fields: Box<[SerializableField]>,
    super_descriptor: Option<Arc<ClassDescriptor>>,
    serial_version_uid: i64,
    has_write_hook: bool,
    has_read_hook: bool,
    has_write_replace: bool,
    has_read_resolve: bool,
}

impl ClassDescriptor {
    /// Computes the descriptor of `class`.
    ///
    /// `super_descriptor` must be the descriptor of the nearest serializable
    /// superclass. It is ignored for every kind except
    /// [`DescriptorKind::Serializable`].
    pub fn compute(class: &ClassInfo, super_descriptor: Option<Arc<ClassDescriptor>>) -> Self {
        let hooks = class.hooks();
        let kind = descriptor_kind(class);

        let fields = match kind {
            DescriptorKind::Serializable => serializable_fields(class, true),
            DescriptorKind::Record => serializable_fields(class, false),
            _ => Box::default(),
        };
        let super_descriptor = match kind {
            DescriptorKind::Serializable => super_descriptor,
            _ => None,
        };

        Self {
            name: class.name().into(),
            kind,
            fields,
            super_descriptor,
            serial_version_uid: class.serial_version_uid(),
            has_write_hook: hooks.write_object().is_some(),
            has_read_hook: hooks.read_object().is_some(),
            has_write_replace: hooks.write_replace().is_some(),
            has_read_resolve: hooks.read_resolve().is_some(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> DescriptorKind {
        self.kind
    }

    /// The fields of this level in wire order.
    #[inline]
    pub fn fields(&self) -> &[SerializableField] {
        &self.fields
    }

    #[inline]
    pub fn super_descriptor(&self) -> Option<&Arc<ClassDescriptor>> {
        self.super_descriptor.as_ref()
    }

    #[inline]
    pub fn serial_version_uid(&self) -> i64 {
        self.serial_version_uid
    }

    #[inline]
    pub fn has_write_hook(&self) -> bool {
        self.has_write_hook
    }

    #[inline]
    pub fn has_read_hook(&self) -> bool {
        self.has_read_hook
    }

    #[inline]
    pub fn has_write_replace(&self) -> bool {
        self.has_write_replace
    }

    #[inline]
    pub fn has_read_resolve(&self) -> bool {
        self.has_read_resolve
    }

    /// Returns the levels of the hierarchy, topmost serializable class first.
    pub fn hierarchy(&self) -> Vec<&ClassDescriptor> {
        let mut levels: Vec<&ClassDescriptor> =
            core::iter::successors(Some(self), |d| d.super_descriptor().map(|s| &**s)).collect();
        levels.reverse();
        levels
    }
}

fn descriptor_kind(class: &ClassInfo) -> DescriptorKind {
    match class.kind() {
        ClassKind::Ordinary if class.is_externalizable() => DescriptorKind::Externalizable,
        ClassKind::Ordinary if class.is_serializable() => DescriptorKind::Serializable,
        ClassKind::Ordinary | ClassKind::Interface => DescriptorKind::Plain,
        ClassKind::Record => DescriptorKind::Record,
        ClassKind::Enum(_) => DescriptorKind::Enum,
        ClassKind::Proxy(_) => DescriptorKind::Proxy,
        ClassKind::Array(element) => DescriptorKind::Array(*element),
        ClassKind::String => DescriptorKind::String,
        ClassKind::List => DescriptorKind::List,
        ClassKind::Map => DescriptorKind::Map,
    }
}

/// Collects the non-transient fields of one level.
///
/// With `canonical`, primitives come first and each group is sorted by name,
/// so the wire order does not depend on declaration order. Records keep
/// their declaration order.
fn serializable_fields(class: &ClassInfo, canonical: bool) -> Box<[SerializableField]> {
    let mut fields: Vec<SerializableField> = class
        .own_slots()
        .filter(|(_, f)| !f.is_transient())
        .map(|(slot, f)| SerializableField {
            name: f.name().into(),
            ty: f.ty(),
            ordinal: 0,
            slot,
        })
        .collect();

    if canonical {
        fields.sort_by(|a, b| {
            (!a.ty.is_primitive(), &a.name).cmp(&(!b.ty.is_primitive(), &b.name))
        });
    }
    for (ordinal, field) in fields.iter_mut().enumerate() {
        field.ordinal = ordinal as u32;
    }
    fields.into_boxed_slice()
}

#[cfg(test)]
mod tests {
    use super::{ClassDescriptor, DescriptorKind};
    use crate::class::{ClassInfo, FieldType};

    #[test]
    fn primitives_first_then_by_name() {
        let class = ClassInfo::builder("a.Mixed")
            .serializable()
            .field("zeta", FieldType::Object)
            .field("beta", FieldType::Int)
            .field("alpha", FieldType::Object)
            .field("gamma", FieldType::Bool)
            .transient_field("cache", FieldType::Object)
            .build();

        let descriptor = ClassDescriptor::compute(&class, None);
        let order: Vec<_> = descriptor.fields().iter().map(|f| f.name()).collect();
        assert_eq!(order, ["beta", "gamma", "alpha", "zeta"]);
        assert_eq!(descriptor.fields()[2].slot(), 2);
        assert_eq!(descriptor.fields()[3].ordinal(), 3);
    }

    #[test]
    fn records_keep_declaration_order() {
        let class = ClassInfo::builder("a.Pair")
            .record()
            .field("second", FieldType::Object)
            .field("first", FieldType::Int)
            .build();

        let descriptor = ClassDescriptor::compute(&class, None);
        assert_eq!(descriptor.kind(), DescriptorKind::Record);
        assert_eq!(descriptor.fields()[0].name(), "second");
    }

    #[test]
    fn kinds() {
        let plain = ClassInfo::builder("a.Plain").build();
        assert_eq!(ClassDescriptor::compute(&plain, None).kind(), DescriptorKind::Plain);

        let external = ClassInfo::builder("a.Ext")
            .externalizable(|_, _| Ok(()), |_, _| Ok(()))
            .field("ignored", FieldType::Int)
            .build();
        let descriptor = ClassDescriptor::compute(&external, None);
        assert_eq!(descriptor.kind(), DescriptorKind::Externalizable);
        assert!(descriptor.fields().is_empty());
    }
}
