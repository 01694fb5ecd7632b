use core::fmt;

use crate::class::{ClassRef, FieldType};
use crate::model::ObjRef;

// -----------------------------------------------------------------------------
// Value

/// A single slot of the object graph.
///
/// Primitive variants are stored inline. Objects are referenced through
/// [`ObjRef`], and classes through [`ClassRef`].
///
/// Writing a primitive `Value` at the top level (or into an `Object`-typed
/// field) produces a boxed primitive on the wire, which carries no handle.
#[derive(Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Byte(i8),
    Char(char),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Class(ClassRef),
    Ref(ObjRef),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    #[inline]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the referenced object, if this is a [`Value::Ref`].
    #[inline]
    pub const fn as_obj(&self) -> Option<ObjRef> {
        match self {
            Self::Ref(obj) => Some(*obj),
            _ => None,
        }
    }

    /// Returns the referenced class, if this is a [`Value::Class`].
    #[inline]
    pub const fn as_class(&self) -> Option<&ClassRef> {
        match self {
            Self::Class(class) => Some(class),
            _ => None,
        }
    }

    /// Returns the primitive [`FieldType`] matching this value.
    ///
    /// `Null`, classes and references all map to [`FieldType::Object`].
    pub const fn field_type(&self) -> FieldType {
        match self {
            Self::Bool(_) => FieldType::Bool,
            Self::Byte(_) => FieldType::Byte,
            Self::Char(_) => FieldType::Char,
            Self::Short(_) => FieldType::Short,
            Self::Int(_) => FieldType::Int,
            Self::Long(_) => FieldType::Long,
            Self::Float(_) => FieldType::Float,
            Self::Double(_) => FieldType::Double,
            Self::Null | Self::Class(_) | Self::Ref(_) => FieldType::Object,
        }
    }

    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub const fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub const fn as_long(&self) -> Option<i64> {
        match self {
            Self::Long(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Byte(v) => write!(f, "{v}b"),
            Self::Char(v) => write!(f, "{v:?}"),
            Self::Short(v) => write!(f, "{v}s"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Long(v) => write!(f, "{v}L"),
            Self::Float(v) => write!(f, "{v}f"),
            Self::Double(v) => write!(f, "{v}d"),
            Self::Class(class) => write!(f, "class {}", class.name()),
            Self::Ref(obj) => write!(f, "{obj}"),
        }
    }
}

// -----------------------------------------------------------------------------
// Conversions

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                #[inline]
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i8 => Byte,
    char => Char,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    ObjRef => Ref,
    ClassRef => Class,
}

impl From<Option<ObjRef>> for Value {
    #[inline]
    fn from(value: Option<ObjRef>) -> Self {
        value.map_or(Self::Null, Self::Ref)
    }
}
