use std::sync::LazyLock;

use crate::class::{ClassInfo, ClassKind, ClassRef, FieldType};

// -----------------------------------------------------------------------------
// Builtin classes

pub(crate) const STRING_NAME: &str = "String";
pub(crate) const LIST_NAME: &str = "List";
pub(crate) const MAP_NAME: &str = "Map";

fn builtin(name: &str, kind: ClassKind) -> ClassRef {
    ClassInfo::builder(name)
        .builtin(kind)
        .serial_version_uid(0)
        .build()
}

static STRING: LazyLock<ClassRef> = LazyLock::new(|| builtin(STRING_NAME, ClassKind::String));
static LIST: LazyLock<ClassRef> = LazyLock::new(|| builtin(LIST_NAME, ClassKind::List));
static MAP: LazyLock<ClassRef> = LazyLock::new(|| builtin(MAP_NAME, ClassKind::Map));

static ARRAYS: LazyLock<[ClassRef; 9]> = LazyLock::new(|| {
    FieldType::ALL.map(|element| builtin(&array_class_name(element), ClassKind::Array(element)))
});

/// The name of the builtin array class for `element`, such as `[I`.
pub fn array_class_name(element: FieldType) -> alloc::string::String {
    let mut name = alloc::string::String::with_capacity(2);
    name.push('[');
    name.push(element.code() as char);
    name
}

impl ClassRef {
    /// The builtin string class.
    #[inline]
    pub fn string() -> ClassRef {
        STRING.clone()
    }

    /// The builtin list class.
    #[inline]
    pub fn list() -> ClassRef {
        LIST.clone()
    }

    /// The builtin map class.
    #[inline]
    pub fn map() -> ClassRef {
        MAP.clone()
    }

    /// The builtin array class with the given element type.
    #[inline]
    pub fn array(element: FieldType) -> ClassRef {
        ARRAYS[element as usize].clone()
    }

    /// Every builtin class.
    pub fn builtins() -> impl Iterator<Item = ClassRef> {
        [Self::string(), Self::list(), Self::map()]
            .into_iter()
            .chain(ARRAYS.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use crate::class::{ClassKind, ClassRef, FieldType};

    #[test]
    fn builtins_are_singletons() {
        assert_eq!(ClassRef::string(), ClassRef::string());
        assert_eq!(ClassRef::array(FieldType::Long).name(), "[J");
        assert_eq!(
            ClassRef::array(FieldType::Object).kind(),
            &ClassKind::Array(FieldType::Object)
        );
        assert_eq!(ClassRef::builtins().count(), 12);
        assert!(ClassRef::list().is_serializable());
    }
}
