use alloc::string::String;

use crate::model::Value;

// -----------------------------------------------------------------------------
// FieldType

/// The declared type of a field or of an array element.
///
/// Each variant has a one-byte wire code, see [`FieldType::code`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldType {
    Bool,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    /// Any reference: objects, classes, `null` and boxed primitives.
    Object,
}

impl FieldType {
    /// All field types, primitives first.
    pub const ALL: [FieldType; 9] = [
        Self::Bool,
        Self::Byte,
        Self::Char,
        Self::Short,
        Self::Int,
        Self::Long,
        Self::Float,
        Self::Double,
        Self::Object,
    ];

    /// Returns the wire code of this type.
    ///
    /// # Examples
    ///
    /// ```
    /// use gw_marshal::class::FieldType;
    ///
    /// assert_eq!(FieldType::Long.code(), b'J');
    /// assert_eq!(FieldType::from_code(b'J'), Some(FieldType::Long));
    /// ```
    pub const fn code(self) -> u8 {
        match self {
            Self::Bool => b'Z',
            Self::Byte => b'B',
            Self::Char => b'C',
            Self::Short => b'S',
            Self::Int => b'I',
            Self::Long => b'J',
            Self::Float => b'F',
            Self::Double => b'D',
            Self::Object => b'L',
        }
    }

    /// Parses a wire code produced by [`FieldType::code`].
    pub const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            b'Z' => Self::Bool,
            b'B' => Self::Byte,
            b'C' => Self::Char,
            b'S' => Self::Short,
            b'I' => Self::Int,
            b'J' => Self::Long,
            b'F' => Self::Float,
            b'D' => Self::Double,
            b'L' => Self::Object,
            _ => return None,
        })
    }

    #[inline]
    pub const fn is_primitive(self) -> bool {
        !matches!(self, Self::Object)
    }

    /// Returns the value a field of this type holds before it is assigned.
    pub const fn default_value(self) -> Value {
        match self {
            Self::Bool => Value::Bool(false),
            Self::Byte => Value::Byte(0),
            Self::Char => Value::Char('\0'),
            Self::Short => Value::Short(0),
            Self::Int => Value::Int(0),
            Self::Long => Value::Long(0),
            Self::Float => Value::Float(0.0),
            Self::Double => Value::Double(0.0),
            Self::Object => Value::Null,
        }
    }

    /// Returns `true` if `value` may be stored in a field of this type.
    ///
    /// Object fields accept anything, including boxed primitives.
    #[inline]
    pub fn accepts(self, value: &Value) -> bool {
        self == Self::Object || value.field_type() == self
    }
}

// -----------------------------------------------------------------------------
// FieldInfo

/// A declared field of a class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldInfo {
    name: String,
    ty: FieldType,
    transient: bool,
}

impl FieldInfo {
    #[inline]
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            transient: false,
        }
    }

    /// Marks the field as transient. Transient fields are never written.
    #[inline]
    pub fn with_transient(mut self, transient: bool) -> Self {
        self.transient = transient;
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn ty(&self) -> FieldType {
        self.ty
    }

    #[inline]
    pub fn is_transient(&self) -> bool {
        self.transient
    }
}
