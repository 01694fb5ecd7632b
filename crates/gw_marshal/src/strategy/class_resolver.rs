use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::class::{ClassRef, ClassRegistry};
use crate::io::{DataInput, DataOutput};
use crate::{MarshalError, Result};

// -----------------------------------------------------------------------------
// ClassResolver

/// Maps classes to wire names and back.
///
/// The `annotate_*` methods may append arbitrary primitive data after a
/// class name. The matching `resolve_*` method must consume exactly that
/// data from `input`.
pub trait ClassResolver: Send + Sync {
    /// The name written for `class`.
    fn class_name(&self, class: &ClassRef) -> String {
        class.name().into()
    }

    fn annotate_class(&self, _output: &mut dyn DataOutput, _class: &ClassRef) -> Result<()> {
        Ok(())
    }

    /// Resolves a class name read from the stream.
    ///
    /// `serial_version_uid` is present for classes whose descriptor carries
    /// one: serializable, record and externalizable classes.
    fn resolve_class(
        &self,
        input: &mut dyn DataInput,
        name: &str,
        serial_version_uid: Option<i64>,
    ) -> Result<ClassRef>;

    /// The interface names written for a proxy class.
    fn proxy_interfaces(&self, class: &ClassRef) -> Vec<String> {
        class.interfaces().to_vec()
    }

    fn annotate_proxy_class(
        &self,
        _output: &mut dyn DataOutput,
        _class: &ClassRef,
    ) -> Result<()> {
        Ok(())
    }

    fn resolve_proxy_class(
        &self,
        input: &mut dyn DataInput,
        interfaces: &[String],
    ) -> Result<ClassRef>;
}

// -----------------------------------------------------------------------------
// RegistryClassResolver

/// The default resolver: looks classes up in a [`ClassRegistry`].
///
/// With `strict_uid`, a serial version UID that differs from the local
/// class fails with [`MarshalError::InvalidClass`].
#[derive(Clone)]
pub struct RegistryClassResolver {
    registry: Arc<ClassRegistry>,
    strict_uid: bool,
}

impl RegistryClassResolver {
    pub fn new(registry: Arc<ClassRegistry>) -> Self {
        Self {
            registry,
            strict_uid: true,
        }
    }

    pub fn with_strict_uid(mut self, strict_uid: bool) -> Self {
        self.strict_uid = strict_uid;
        self
    }

    #[inline]
    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }
}

impl ClassResolver for RegistryClassResolver {
    fn resolve_class(
        &self,
        _input: &mut dyn DataInput,
        name: &str,
        serial_version_uid: Option<i64>,
    ) -> Result<ClassRef> {
        let class = self
            .registry
            .get(name)
            .ok_or_else(|| MarshalError::ClassNotFound { name: name.into() })?;

        if self.strict_uid
            && let Some(uid) = serial_version_uid
            && uid != class.serial_version_uid()
        {
            return Err(MarshalError::invalid_class(
                name,
                format_args!(
                    "stream serial version UID {uid} does not match local {}",
                    class.serial_version_uid()
                ),
            ));
        }
        Ok(class.clone())
    }

    fn resolve_proxy_class(
        &self,
        _input: &mut dyn DataInput,
        interfaces: &[String],
    ) -> Result<ClassRef> {
        self.registry
            .proxy_class(interfaces)
            .cloned()
            .ok_or_else(|| MarshalError::ClassNotFound {
                name: interfaces.join(","),
            })
    }
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use super::{ClassResolver, RegistryClassResolver};
    use crate::class::{ClassInfo, ClassRegistry, FieldType};
    use crate::{ErrorCategory, MarshalError};

    #[test]
    fn uid_checks() {
        let class = ClassInfo::builder("a.Versioned")
            .serializable()
            .field("n", FieldType::Int)
            .serial_version_uid(42)
            .build();
        let mut registry = ClassRegistry::new();
        registry.register(&class);
        let resolver = RegistryClassResolver::new(Arc::new(registry));

        let mut input: &[u8] = &[];
        assert!(resolver.resolve_class(&mut input, "a.Versioned", Some(42)).is_ok());
        assert!(resolver.resolve_class(&mut input, "a.Versioned", None).is_ok());

        let err = resolver
            .resolve_class(&mut input, "a.Versioned", Some(7))
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::ClassResolution);

        let lenient = resolver.clone().with_strict_uid(false);
        assert!(lenient.resolve_class(&mut input, "a.Versioned", Some(7)).is_ok());

        assert!(matches!(
            lenient.resolve_class(&mut input, "a.Missing", None),
            Err(MarshalError::ClassNotFound { .. })
        ));
    }
}
