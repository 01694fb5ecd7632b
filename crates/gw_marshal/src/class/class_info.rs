use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::ops::Deref;
use std::sync::OnceLock;

use gw_utils::hash::fixed_hash_one;

use crate::Result;
use crate::class::{ClassHooks, FieldInfo, FieldType};
use crate::descriptor::ClassDescriptor;
use crate::io::{ObjectInput, ObjectOutput};
use crate::marshal::ObjectWriteContext;
use crate::model::{Heap, ObjRef, Value};
use crate::unmarshal::ObjectReadContext;

// -----------------------------------------------------------------------------
// ClassKind

/// The shape of a class, which selects its wire encoding.
#[derive(Clone, Debug, PartialEq)]
pub enum ClassKind {
    /// A class with named fields and an optional superclass.
    Ordinary,
    /// A class whose state is its declared component list.
    ///
    /// Records are rebuilt from their components after all of them are read.
    Record,
    /// An enum with its constant names in declaration order.
    Enum(Box<[String]>),
    /// A pure interface. Instances never exist.
    Interface,
    /// A proxy class implementing the listed interfaces.
    Proxy(Box<[String]>),
    /// An array class with the given element type.
    Array(FieldType),
    String,
    List,
    Map,
}

// -----------------------------------------------------------------------------
// ClassInfo

/// Metadata for one class of the object model.
///
/// Built with [`ClassInfo::builder`] and shared through [`ClassRef`].
pub struct ClassInfo {
    name: String,
    kind: ClassKind,
    super_class: Option<ClassRef>,
    fields: Box<[FieldInfo]>,
    layout_offset: usize,
    serializable: bool,
    serial_version_uid: i64,
    hooks: ClassHooks,
    descriptor: OnceLock<Arc<ClassDescriptor>>,
}

impl ClassInfo {
    /// Starts building a class named `name`.
    ///
    /// # Examples
    ///
    /// ```
    /// use gw_marshal::class::{ClassInfo, FieldType};
    ///
    /// let base = ClassInfo::builder("zoo.Animal")
    ///     .serializable()
    ///     .field("name", FieldType::Object)
    ///     .build();
    /// let cat = ClassInfo::builder("zoo.Cat")
    ///     .serializable()
    ///     .extends(&base)
    ///     .field("lives", FieldType::Int)
    ///     .build();
    ///
    /// assert_eq!(cat.simple_name(), "Cat");
    /// assert_eq!(cat.slot_of("name"), Some(0));
    /// assert_eq!(cat.slot_of("lives"), Some(1));
    /// ```
    #[inline]
    pub fn builder(name: impl Into<String>) -> ClassBuilder {
        ClassBuilder::new(name.into())
    }

    /// The fully qualified class name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The last `.`-separated segment of the name.
    #[inline]
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    #[inline]
    pub fn kind(&self) -> &ClassKind {
        &self.kind
    }

    #[inline]
    pub fn super_class(&self) -> Option<&ClassRef> {
        self.super_class.as_ref()
    }

    /// The fields declared by this class, excluding inherited ones.
    #[inline]
    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    /// Returns `true` if instances may be written by the default pipeline.
    #[inline]
    pub fn is_serializable(&self) -> bool {
        self.serializable
    }

    /// Returns `true` if the class writes its complete state through
    /// external hooks.
    #[inline]
    pub fn is_externalizable(&self) -> bool {
        self.hooks.external.is_some()
    }

    #[inline]
    pub fn serial_version_uid(&self) -> i64 {
        self.serial_version_uid
    }

    #[inline]
    pub fn hooks(&self) -> &ClassHooks {
        &self.hooks
    }

    /// Interfaces of a proxy class. Empty for every other kind.
    pub fn interfaces(&self) -> &[String] {
        match &self.kind {
            ClassKind::Proxy(interfaces) => interfaces,
            _ => &[],
        }
    }

    /// Constants of an enum class.
    pub fn enum_constants(&self) -> Option<&[String]> {
        match &self.kind {
            ClassKind::Enum(constants) => Some(constants),
            _ => None,
        }
    }

    /// Iterates from this class up through its superclasses.
    pub fn ancestry(&self) -> impl Iterator<Item = &ClassInfo> {
        core::iter::successors(Some(self), |c| c.super_class().map(|s| &**s))
    }

    // -------------------------------------------------------------------------
    // Layout

    /// Number of slots in the flattened field layout, inherited ones included.
    #[inline]
    pub fn layout_len(&self) -> usize {
        self.layout_offset + self.fields.len()
    }

    /// Returns the layout slot of the field `name`.
    ///
    /// Fields of the most derived class shadow inherited ones.
    pub fn slot_of(&self, name: &str) -> Option<usize> {
        self.ancestry().find_map(|class| {
            let index = class.fields.iter().position(|f| f.name() == name)?;
            Some(class.layout_offset + index)
        })
    }

    /// Returns the layout slot and type of a field declared by this class.
    pub fn own_slot_of(&self, name: &str) -> Option<(usize, FieldType)> {
        let index = self.fields.iter().position(|f| f.name() == name)?;
        Some((self.layout_offset + index, self.fields[index].ty()))
    }

    /// Iterates the fields declared by this class with their layout slots.
    pub fn own_slots(&self) -> impl Iterator<Item = (usize, &FieldInfo)> {
        self.fields
            .iter()
            .enumerate()
            .map(|(i, f)| (self.layout_offset + i, f))
    }

    /// Returns the default value of every layout slot.
    pub fn default_layout(&self) -> Vec<Value> {
        let mut layout = alloc::vec![Value::Null; self.layout_len()];
        for class in self.ancestry() {
            for (slot, field) in class.own_slots() {
                layout[slot] = field.ty().default_value();
            }
        }
        layout
    }

    #[inline]
    pub(crate) fn descriptor_cell(&self) -> &OnceLock<Arc<ClassDescriptor>> {
        &self.descriptor
    }
}

impl fmt::Debug for ClassInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassInfo")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("super_class", &self.super_class.as_ref().map(|c| c.name()))
            .field("fields", &self.fields)
            .field("serializable", &self.serializable)
            .field("serial_version_uid", &self.serial_version_uid)
            .field("hooks", &self.hooks)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// ClassRef

/// A shared handle to a [`ClassInfo`].
///
/// Equality and hashing use the address of the shared allocation, so two
/// separately built classes with the same name are different classes.
#[derive(Clone)]
pub struct ClassRef(Arc<ClassInfo>);

impl ClassRef {
    #[inline]
    pub(crate) fn new(info: ClassInfo) -> Self {
        Self(Arc::new(info))
    }

    /// A stable identity for this class, valid while any handle is alive.
    #[inline]
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for ClassRef {
    type Target = ClassInfo;

    #[inline]
    fn deref(&self) -> &ClassInfo {
        &self.0
    }
}

impl PartialEq for ClassRef {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ClassRef {}

impl Hash for ClassRef {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Debug for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassRef({})", self.0.name)
    }
}

// -----------------------------------------------------------------------------
// ClassBuilder

/// Builder returned by [`ClassInfo::builder`].
#[must_use]
pub struct ClassBuilder {
    name: String,
    kind: ClassKind,
    super_class: Option<ClassRef>,
    fields: Vec<FieldInfo>,
    serializable: bool,
    serial_version_uid: Option<i64>,
    hooks: ClassHooks,
}

impl ClassBuilder {
    fn new(name: String) -> Self {
        Self {
            name,
            kind: ClassKind::Ordinary,
            super_class: None,
            fields: Vec::new(),
            serializable: false,
            serial_version_uid: None,
            hooks: ClassHooks::default(),
        }
    }

    /// Opts the class into the default serialization pipeline.
    pub fn serializable(mut self) -> Self {
        self.serializable = true;
        self
    }

    /// Turns the class into a record. Records are always serializable.
    pub fn record(mut self) -> Self {
        self.kind = ClassKind::Record;
        self.serializable = true;
        self
    }

    /// Turns the class into an enum with the given constants.
    pub fn enumeration<I, S>(mut self, constants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.kind = ClassKind::Enum(constants.into_iter().map(Into::into).collect());
        self.serializable = true;
        self
    }

    pub fn interface(mut self) -> Self {
        self.kind = ClassKind::Interface;
        self.serializable = false;
        self
    }

    /// Turns the class into a proxy class implementing `interfaces`.
    pub fn proxy<I, S>(mut self, interfaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.kind = ClassKind::Proxy(interfaces.into_iter().map(Into::into).collect());
        self.serializable = true;
        self
    }

    pub(crate) fn builtin(mut self, kind: ClassKind) -> Self {
        self.kind = kind;
        self.serializable = true;
        self
    }

    pub fn extends(mut self, super_class: &ClassRef) -> Self {
        self.super_class = Some(super_class.clone());
        self
    }

    pub fn field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.fields.push(FieldInfo::new(name, ty));
        self
    }

    /// Declares a field that is part of the layout but never written.
    pub fn transient_field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.fields.push(FieldInfo::new(name, ty).with_transient(true));
        self
    }

    /// Pins the serial version UID instead of deriving it from the field shape.
    pub fn serial_version_uid(mut self, uid: i64) -> Self {
        self.serial_version_uid = Some(uid);
        self
    }

    pub fn write_object(
        mut self,
        hook: impl Fn(&mut ObjectWriteContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.write_object = Some(Arc::new(hook));
        self
    }

    pub fn read_object(
        mut self,
        hook: impl Fn(&mut ObjectReadContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.read_object = Some(Arc::new(hook));
        self
    }

    pub fn write_replace(
        mut self,
        hook: impl Fn(&mut Heap, ObjRef) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.hooks.write_replace = Some(Arc::new(hook));
        self
    }

    pub fn read_resolve(
        mut self,
        hook: impl Fn(&mut Heap, ObjRef) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.hooks.read_resolve = Some(Arc::new(hook));
        self
    }

    /// Makes the class externalizable: its whole state goes through `write`
    /// and `read`, and no field metadata is transmitted.
    pub fn externalizable(
        mut self,
        write: impl Fn(ObjRef, &mut dyn ObjectOutput) -> Result<()> + Send + Sync + 'static,
        read: impl Fn(ObjRef, &mut dyn ObjectInput) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.external = Some((Arc::new(write), Arc::new(read)));
        self.serializable = true;
        self
    }

    pub fn build(self) -> ClassRef {
        let layout_offset = self.super_class.as_ref().map_or(0, |s| s.layout_len());
        let serial_version_uid = self
            .serial_version_uid
            .unwrap_or_else(|| derive_serial_version_uid(&self));

        ClassRef::new(ClassInfo {
            name: self.name,
            kind: self.kind,
            super_class: self.super_class,
            fields: self.fields.into_boxed_slice(),
            layout_offset,
            serializable: self.serializable,
            serial_version_uid,
            hooks: self.hooks,
            descriptor: OnceLock::new(),
        })
    }
}

/// Hashes the name and the serializable field shape.
///
/// Adding, removing or retyping a non-transient field changes the UID.
fn derive_serial_version_uid(builder: &ClassBuilder) -> i64 {
    let mut shape: Vec<(&str, u8)> = builder
        .fields
        .iter()
        .filter(|f| !f.is_transient())
        .map(|f| (f.name(), f.ty().code()))
        .collect();
    shape.sort_unstable();

    let super_name = builder.super_class.as_ref().map(|s| s.name());
    fixed_hash_one(&(builder.name.as_str(), super_name, shape)) as i64
}
