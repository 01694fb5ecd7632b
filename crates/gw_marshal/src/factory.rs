use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::model::{Heap, Value};
use crate::{Marshaller, MarshallingConfiguration, Result, Unmarshaller};

/// Creates sessions that share one configuration.
///
/// The factory is cheap to clone and can be shared between threads. Each
/// session it creates is independent.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use gw_marshal::class::{ClassInfo, ClassRegistry, FieldType};
/// use gw_marshal::model::{Heap, Value};
/// use gw_marshal::{MarshallerFactory, MarshallingConfiguration};
///
/// let node = ClassInfo::builder("graph.Node")
///     .serializable()
///     .field("next", FieldType::Object)
///     .build();
/// let mut registry = ClassRegistry::new();
/// registry.register(&node);
/// let factory = MarshallerFactory::new(MarshallingConfiguration::new(Arc::new(registry)));
///
/// // A node pointing at itself.
/// let mut heap = Heap::new();
/// let n = heap.instantiate(&node);
/// heap.set_field(n, "next", Value::Ref(n));
///
/// let bytes = factory.marshal(&mut heap, &[Value::Ref(n)]).unwrap();
/// let mut copy = Heap::new();
/// let values = factory.unmarshal(&mut copy, &bytes, 1).unwrap();
///
/// let m = values[0].as_obj().unwrap();
/// assert_eq!(copy.field(m, "next"), Some(&Value::Ref(m)));
/// ```
#[derive(Clone, Debug)]
pub struct MarshallerFactory {
    config: Arc<MarshallingConfiguration>,
}

impl MarshallerFactory {
    pub fn new(config: MarshallingConfiguration) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    #[inline]
    pub fn configuration(&self) -> &Arc<MarshallingConfiguration> {
        &self.config
    }

    /// Creates an idle marshaller. Call [`Marshaller::start`] to use it.
    pub fn create_marshaller<'a>(&self) -> Marshaller<'a> {
        Marshaller::new(self.config.clone())
    }

    /// Creates an idle unmarshaller. Call [`Unmarshaller::start`] to use it.
    pub fn create_unmarshaller<'a>(&self) -> Unmarshaller<'a> {
        Unmarshaller::new(self.config.clone())
    }

    /// Writes `values` in one session and returns the encoded stream.
    pub fn marshal(&self, heap: &mut Heap, values: &[Value]) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        {
            let mut marshaller = self.create_marshaller();
            marshaller.start(&mut bytes)?;
            for value in values {
                marshaller.write_object(heap, value)?;
            }
            marshaller.finish()?;
        }
        Ok(bytes)
    }

    /// Reads `count` values from `bytes` in one session.
    pub fn unmarshal(&self, heap: &mut Heap, bytes: &[u8], count: usize) -> Result<Vec<Value>> {
        let mut unmarshaller = self.create_unmarshaller();
        unmarshaller.start(bytes)?;
        let values = (0..count)
            .map(|_| unmarshaller.read_object(heap))
            .collect::<Result<Vec<_>>>()?;
        unmarshaller.finish()?;
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use super::MarshallerFactory;
    use crate::class::ClassRegistry;
    use crate::io::{DataInput, DataOutput};
    use crate::model::{Heap, Value};
    use crate::{MarshalError, MarshallingConfiguration};

    fn factory() -> MarshallerFactory {
        MarshallerFactory::new(MarshallingConfiguration::new(Arc::new(ClassRegistry::new())))
    }

    #[test]
    fn session_lifecycle() {
        let factory = factory();
        let mut heap = Heap::new();
        let mut bytes = Vec::new();

        let mut marshaller = factory.create_marshaller();
        assert!(matches!(
            marshaller.write_object(&mut heap, &Value::Null),
            Err(MarshalError::NotActive)
        ));
        marshaller.start(&mut bytes).unwrap();
        assert!(marshaller.is_active());
        assert!(matches!(
            marshaller.start(Vec::new()),
            Err(MarshalError::AlreadyActive)
        ));
        marshaller.write_bytes(b"raw").unwrap();
        marshaller.finish().unwrap();
        assert!(!marshaller.is_active());
        drop(marshaller);

        let mut unmarshaller = factory.create_unmarshaller();
        unmarshaller.start(&bytes[..]).unwrap();
        let mut raw = [0u8; 3];
        unmarshaller.read_into(&mut raw).unwrap();
        assert_eq!(&raw, b"raw");
        unmarshaller.finish().unwrap();
    }

    #[test]
    fn convenience_round_trip() {
        let factory = factory();
        let mut heap = Heap::new();
        let s = Value::Ref(heap.alloc_str("shared"));
        let values = [s.clone(), Value::Int(3), s];

        let bytes = factory.marshal(&mut heap, &values).unwrap();
        let mut copy = Heap::new();
        let read = factory.unmarshal(&mut copy, &bytes, 3).unwrap();

        assert_eq!(read[0], read[2]);
        assert_eq!(read[1], Value::Int(3));
        assert_eq!(copy.len(), 1);
    }
}
