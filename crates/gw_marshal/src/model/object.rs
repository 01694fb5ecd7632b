use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::class::{ClassRef, FieldType};
use crate::model::Value;

// -----------------------------------------------------------------------------
// ObjRef

/// The address of an [`Object`] inside a [`Heap`](crate::model::Heap).
///
/// Equality of `ObjRef` is reference identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjRef(u32);

impl ObjRef {
    #[inline]
    pub(crate) const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the arena index of this reference.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

impl fmt::Display for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

// -----------------------------------------------------------------------------
// Object

/// A heap object: its runtime class plus a kind-specific body.
#[derive(Clone, Debug)]
pub struct Object {
    pub class: ClassRef,
    pub body: ObjectBody,
}

/// The payload of an [`Object`].
#[derive(Clone, Debug, PartialEq)]
pub enum ObjectBody {
    /// Field values, flattened with superclass fields first.
    ///
    /// Indexed by the slots reported by [`ClassInfo::slot_of`](crate::class::ClassInfo::slot_of).
    Fields(Vec<Value>),
    Str(String),
    Array(ArrayData),
    /// The name of the enum constant this object stands for.
    Enum(String),
    List(Vec<Value>),
    /// Key/value pairs in insertion order.
    Map(Vec<(Value, Value)>),
    /// A proxy instance and its invocation handler.
    Proxy { handler: Value },
}

// -----------------------------------------------------------------------------
// ArrayData

/// Typed array storage.
///
/// Primitive arrays are stored unboxed. Object arrays hold arbitrary
/// [`Value`]s.
#[derive(Clone, Debug, PartialEq)]
pub enum ArrayData {
    Bool(Box<[bool]>),
    Byte(Box<[i8]>),
    Char(Box<[char]>),
    Short(Box<[i16]>),
    Int(Box<[i32]>),
    Long(Box<[i64]>),
    Float(Box<[f32]>),
    Double(Box<[f64]>),
    Object(Box<[Value]>),
}

impl ArrayData {
    /// Creates an array of `len` default elements.
    pub fn with_len(element: FieldType, len: usize) -> Self {
        match element {
            FieldType::Bool => Self::Bool(alloc::vec![false; len].into()),
            FieldType::Byte => Self::Byte(alloc::vec![0; len].into()),
            FieldType::Char => Self::Char(alloc::vec!['\0'; len].into()),
            FieldType::Short => Self::Short(alloc::vec![0; len].into()),
            FieldType::Int => Self::Int(alloc::vec![0; len].into()),
            FieldType::Long => Self::Long(alloc::vec![0; len].into()),
            FieldType::Float => Self::Float(alloc::vec![0.0; len].into()),
            FieldType::Double => Self::Double(alloc::vec![0.0; len].into()),
            FieldType::Object => Self::Object(alloc::vec![Value::Null; len].into()),
        }
    }

    /// Returns the element type.
    pub const fn element_type(&self) -> FieldType {
        match self {
            Self::Bool(_) => FieldType::Bool,
            Self::Byte(_) => FieldType::Byte,
            Self::Char(_) => FieldType::Char,
            Self::Short(_) => FieldType::Short,
            Self::Int(_) => FieldType::Int,
            Self::Long(_) => FieldType::Long,
            Self::Float(_) => FieldType::Float,
            Self::Double(_) => FieldType::Double,
            Self::Object(_) => FieldType::Object,
        }
    }

    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        match self {
            Self::Bool(v) => v.len(),
            Self::Byte(v) => v.len(),
            Self::Char(v) => v.len(),
            Self::Short(v) => v.len(),
            Self::Int(v) => v.len(),
            Self::Long(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Double(v) => v.len(),
            Self::Object(v) => v.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the element at `index` as a [`Value`].
    pub fn get(&self, index: usize) -> Option<Value> {
        Some(match self {
            Self::Bool(v) => Value::Bool(*v.get(index)?),
            Self::Byte(v) => Value::Byte(*v.get(index)?),
            Self::Char(v) => Value::Char(*v.get(index)?),
            Self::Short(v) => Value::Short(*v.get(index)?),
            Self::Int(v) => Value::Int(*v.get(index)?),
            Self::Long(v) => Value::Long(*v.get(index)?),
            Self::Float(v) => Value::Float(*v.get(index)?),
            Self::Double(v) => Value::Double(*v.get(index)?),
            Self::Object(v) => v.get(index)?.clone(),
        })
    }
}
