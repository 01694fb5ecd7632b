use alloc::string::String;
use alloc::vec::Vec;
use core::ops::Index;

use gw_utils::hash::HashMap;

use crate::class::{ClassKind, ClassRef};
use crate::model::{ArrayData, ObjRef, Object, ObjectBody, Value};

// -----------------------------------------------------------------------------
// Heap

/// An arena holding every object of one or more graphs.
///
/// Objects are never moved or freed individually, so an [`ObjRef`] stays
/// valid until the heap is [truncated](Heap::truncate) below it.
///
/// # Examples
///
/// ```
/// use gw_marshal::class::{ClassInfo, FieldType};
/// use gw_marshal::model::{Heap, Value};
///
/// let point = ClassInfo::builder("geo.Point")
///     .serializable()
///     .field("x", FieldType::Int)
///     .field("y", FieldType::Int)
///     .build();
///
/// let mut heap = Heap::new();
/// let p = heap.instantiate(&point);
/// heap.set_field(p, "x", Value::Int(3));
///
/// assert_eq!(heap.field(p, "x"), Some(&Value::Int(3)));
/// assert_eq!(heap.field(p, "y"), Some(&Value::Int(0)));
/// ```
#[derive(Clone, Debug, Default)]
pub struct Heap {
    objects: Vec<Object>,
}

impl Heap {
    /// Creates an empty heap.
    #[inline]
    pub const fn new() -> Self {
        Self {
            objects: Vec::new(),
        }
    }

    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            objects: Vec::with_capacity(capacity),
        }
    }

    /// Returns the number of objects allocated so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Drops every object allocated at or after `mark`.
    ///
    /// `mark` is usually a previous [`Heap::len`]. References at or above it
    /// become dangling.
    #[inline]
    pub fn truncate(&mut self, mark: usize) {
        self.objects.truncate(mark);
    }

    // -------------------------------------------------------------------------
    // Allocation

    /// Allocates an object with an explicit body.
    pub fn alloc(&mut self, class: ClassRef, body: ObjectBody) -> ObjRef {
        assert!(
            self.objects.len() < u32::MAX as usize,
            "heap exceeds the u32 address space"
        );
        let obj = ObjRef::new(self.objects.len() as u32);
        self.objects.push(Object { class, body });
        obj
    }

    /// Allocates a default instance of `class`.
    ///
    /// Field objects get the default value for every slot of their layout,
    /// containers start empty, and enums start at their first constant.
    pub fn instantiate(&mut self, class: &ClassRef) -> ObjRef {
        let body = match class.kind() {
            ClassKind::String => ObjectBody::Str(String::new()),
            ClassKind::List => ObjectBody::List(Vec::new()),
            ClassKind::Map => ObjectBody::Map(Vec::new()),
            ClassKind::Array(element) => ObjectBody::Array(ArrayData::with_len(*element, 0)),
            ClassKind::Enum(constants) => {
                ObjectBody::Enum(constants.first().cloned().unwrap_or_default())
            }
            ClassKind::Proxy(_) => ObjectBody::Proxy {
                handler: Value::Null,
            },
            ClassKind::Ordinary | ClassKind::Record | ClassKind::Interface => {
                ObjectBody::Fields(class.default_layout())
            }
        };
        self.alloc(class.clone(), body)
    }

    /// Allocates a string object.
    #[inline]
    pub fn alloc_str(&mut self, s: impl Into<String>) -> ObjRef {
        self.alloc(ClassRef::string(), ObjectBody::Str(s.into()))
    }

    /// Allocates a list object.
    #[inline]
    pub fn alloc_list(&mut self, items: Vec<Value>) -> ObjRef {
        self.alloc(ClassRef::list(), ObjectBody::List(items))
    }

    /// Allocates a map object.
    #[inline]
    pub fn alloc_map(&mut self, entries: Vec<(Value, Value)>) -> ObjRef {
        self.alloc(ClassRef::map(), ObjectBody::Map(entries))
    }

    /// Allocates an array object of the matching builtin array class.
    #[inline]
    pub fn alloc_array(&mut self, data: ArrayData) -> ObjRef {
        let class = ClassRef::array(data.element_type());
        self.alloc(class, ObjectBody::Array(data))
    }

    /// Allocates an enum constant object.
    #[inline]
    pub fn alloc_enum(&mut self, class: &ClassRef, constant: impl Into<String>) -> ObjRef {
        self.alloc(class.clone(), ObjectBody::Enum(constant.into()))
    }

    /// Allocates a proxy instance.
    #[inline]
    pub fn alloc_proxy(&mut self, class: &ClassRef, handler: Value) -> ObjRef {
        self.alloc(class.clone(), ObjectBody::Proxy { handler })
    }

    // -------------------------------------------------------------------------
    // Access

    #[inline]
    pub fn get(&self, obj: ObjRef) -> Option<&Object> {
        self.objects.get(obj.index())
    }

    #[inline]
    pub fn get_mut(&mut self, obj: ObjRef) -> Option<&mut Object> {
        self.objects.get_mut(obj.index())
    }

    /// Returns the runtime class of `obj`.
    #[inline]
    pub fn class_of(&self, obj: ObjRef) -> Option<&ClassRef> {
        self.get(obj).map(|o| &o.class)
    }

    /// Returns the field `name` of `obj`, searching from the most derived class.
    pub fn field(&self, obj: ObjRef, name: &str) -> Option<&Value> {
        let object = self.get(obj)?;
        let slot = object.class.slot_of(name)?;
        match &object.body {
            ObjectBody::Fields(values) => values.get(slot),
            _ => None,
        }
    }

    /// Sets the field `name` of `obj`. Returns `false` if there is no such field.
    pub fn set_field(&mut self, obj: ObjRef, name: &str, value: Value) -> bool {
        let Some(object) = self.get_mut(obj) else {
            return false;
        };
        let Some(slot) = object.class.slot_of(name) else {
            return false;
        };
        match &mut object.body {
            ObjectBody::Fields(values) => match values.get_mut(slot) {
                Some(v) => {
                    *v = value;
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    /// Returns the value in layout slot `slot` of `obj`.
    pub fn slot(&self, obj: ObjRef, slot: usize) -> Option<&Value> {
        match &self.get(obj)?.body {
            ObjectBody::Fields(values) => values.get(slot),
            _ => None,
        }
    }

    /// Sets the value in layout slot `slot` of `obj`.
    pub fn set_slot(&mut self, obj: ObjRef, slot: usize, value: Value) -> bool {
        match self.get_mut(obj).map(|o| &mut o.body) {
            Some(ObjectBody::Fields(values)) if slot < values.len() => {
                values[slot] = value;
                true
            }
            _ => false,
        }
    }

    /// Returns the contents of a string object.
    pub fn str(&self, obj: ObjRef) -> Option<&str> {
        match &self.get(obj)?.body {
            ObjectBody::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the elements of a list object.
    pub fn list(&self, obj: ObjRef) -> Option<&[Value]> {
        match &self.get(obj)?.body {
            ObjectBody::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the entries of a map object.
    pub fn map(&self, obj: ObjRef) -> Option<&[(Value, Value)]> {
        match &self.get(obj)?.body {
            ObjectBody::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Returns the data of an array object.
    pub fn array(&self, obj: ObjRef) -> Option<&ArrayData> {
        match &self.get(obj)?.body {
            ObjectBody::Array(data) => Some(data),
            _ => None,
        }
    }

    /// Returns the constant name of an enum object.
    pub fn enum_constant(&self, obj: ObjRef) -> Option<&str> {
        match &self.get(obj)?.body {
            ObjectBody::Enum(name) => Some(name),
            _ => None,
        }
    }

    // -------------------------------------------------------------------------
    // Comparison

    /// Structural comparison of two graphs that also checks the sharing shape.
    ///
    /// Classes are compared by name, so graphs from different registries can
    /// be equal. Every object of `self` must correspond to exactly one object
    /// of `other` and back, so a shared node never matches two copies.
    pub fn graph_eq(&self, a: &Value, other: &Heap, b: &Value) -> bool {
        let mut forward: HashMap<ObjRef, ObjRef> = HashMap::default();
        let mut backward: HashMap<ObjRef, ObjRef> = HashMap::default();
        let mut pending = alloc::vec![(a.clone(), b.clone())];

        while let Some((a, b)) = pending.pop() {
            match (&a, &b) {
                (Value::Ref(x), Value::Ref(y)) => {
                    match (forward.get(x), backward.get(y)) {
                        (Some(fy), Some(bx)) if fy == y && bx == x => continue,
                        (None, None) => {}
                        _ => return false,
                    }
                    forward.insert(*x, *y);
                    backward.insert(*y, *x);

                    let (Some(ox), Some(oy)) = (self.get(*x), other.get(*y)) else {
                        return false;
                    };
                    if ox.class.name() != oy.class.name()
                        || !push_bodies(&ox.body, &oy.body, &mut pending)
                    {
                        return false;
                    }
                }
                (Value::Class(x), Value::Class(y)) => {
                    if x.name() != y.name() {
                        return false;
                    }
                }
                (Value::Float(x), Value::Float(y)) => {
                    if x.to_bits() != y.to_bits() {
                        return false;
                    }
                }
                (Value::Double(x), Value::Double(y)) => {
                    if x.to_bits() != y.to_bits() {
                        return false;
                    }
                }
                _ => {
                    if a != b {
                        return false;
                    }
                }
            }
        }
        true
    }
}

fn push_bodies(a: &ObjectBody, b: &ObjectBody, pending: &mut Vec<(Value, Value)>) -> bool {
    fn pairs(a: &[Value], b: &[Value], pending: &mut Vec<(Value, Value)>) -> bool {
        if a.len() != b.len() {
            return false;
        }
        pending.extend(a.iter().cloned().zip(b.iter().cloned()));
        true
    }

    match (a, b) {
        (ObjectBody::Fields(a), ObjectBody::Fields(b)) | (ObjectBody::List(a), ObjectBody::List(b)) => {
            pairs(a, b, pending)
        }
        (ObjectBody::Array(ArrayData::Object(a)), ObjectBody::Array(ArrayData::Object(b))) => {
            pairs(a, b, pending)
        }
        (ObjectBody::Map(a), ObjectBody::Map(b)) => {
            if a.len() != b.len() {
                return false;
            }
            for ((ka, va), (kb, vb)) in a.iter().zip(b) {
                pending.push((ka.clone(), kb.clone()));
                pending.push((va.clone(), vb.clone()));
            }
            true
        }
        (ObjectBody::Proxy { handler: a }, ObjectBody::Proxy { handler: b }) => {
            pending.push((a.clone(), b.clone()));
            true
        }
        (a, b) => a == b,
    }
}

impl Index<ObjRef> for Heap {
    type Output = Object;

    /// # Panics
    ///
    /// Panics if `obj` does not point into this heap.
    #[inline]
    fn index(&self, obj: ObjRef) -> &Object {
        &self.objects[obj.index()]
    }
}
