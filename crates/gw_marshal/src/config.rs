use alloc::string::String;
use alloc::sync::Arc;
use core::fmt;

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::class::ClassRegistry;
use crate::protocol::{DEFAULT_BUFFER_SIZE, PROTOCOL_VERSION};
use crate::strategy::{
    ClassResolver, ClassTable, Creator, DefaultCreator, ExternalizerFactory, ObjectResolver,
    ObjectTable, PatternFilter, RegistryClassResolver, StreamHeader, UnmarshallingFilter,
};

// -----------------------------------------------------------------------------
// MarshallingOptions

/// Where class descriptors are cached.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptorCachePolicy {
    /// One cache per session, dropped with it.
    #[default]
    Session,
    /// One descriptor per class, shared by every session of the process.
    Process,
}

/// The plain-data part of a configuration.
///
/// Loadable from any serde format. Missing fields take their defaults.
///
/// # Examples
///
/// ```
/// use gw_marshal::MarshallingOptions;
///
/// let options: MarshallingOptions = serde_json::from_str(r#"{ "buffer_size": 4096 }"#).unwrap();
/// assert_eq!(options.buffer_size, 4096);
/// assert_eq!(options.version, MarshallingOptions::default().version);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarshallingOptions {
    /// Protocol version written by marshallers.
    pub version: u8,
    /// Capacity of the buffered sink and source.
    pub buffer_size: usize,
    /// Expected number of instances per session, used to size handle tables.
    pub instance_count: usize,
    /// Expected number of classes per session, used to size handle tables.
    pub class_count: usize,
    pub descriptor_cache: DescriptorCachePolicy,
    /// Whether the default resolver rejects serial version UID mismatches.
    pub strict_uid: bool,
    /// A [`PatternFilter`] applied when no filter is set explicitly.
    pub filter_pattern: Option<String>,
}

impl Default for MarshallingOptions {
    fn default() -> Self {
        Self {
            version: PROTOCOL_VERSION,
            buffer_size: DEFAULT_BUFFER_SIZE,
            instance_count: 256,
            class_count: 64,
            descriptor_cache: DescriptorCachePolicy::Session,
            strict_uid: true,
            filter_pattern: None,
        }
    }
}

// -----------------------------------------------------------------------------
// MarshallingConfiguration

/// Everything a session needs besides its byte stream.
///
/// The class resolver and creator are always present. The other
/// strategies are optional.
#[derive(Clone)]
pub struct MarshallingConfiguration {
    class_resolver: Arc<dyn ClassResolver>,
    class_table: Option<Arc<dyn ClassTable>>,
    object_table: Option<Arc<dyn ObjectTable>>,
    object_resolver: Option<Arc<dyn ObjectResolver>>,
    externalizer_factory: Option<Arc<dyn ExternalizerFactory>>,
    creator: Arc<dyn Creator>,
    stream_header: Option<Arc<dyn StreamHeader>>,
    filter: Option<Arc<dyn UnmarshallingFilter>>,
    options: MarshallingOptions,
}

impl MarshallingConfiguration {
    /// A configuration resolving classes through `registry`.
    pub fn new(registry: Arc<ClassRegistry>) -> Self {
        Self {
            class_resolver: Arc::new(RegistryClassResolver::new(registry)),
            class_table: None,
            object_table: None,
            object_resolver: None,
            externalizer_factory: None,
            creator: Arc::new(DefaultCreator),
            stream_header: None,
            filter: None,
            options: MarshallingOptions::default(),
        }
    }

    /// A configuration built from loaded options.
    ///
    /// Fails if `options.filter_pattern` does not parse.
    pub fn from_options(registry: Arc<ClassRegistry>, options: MarshallingOptions) -> Result<Self> {
        let resolver = RegistryClassResolver::new(registry).with_strict_uid(options.strict_uid);
        let filter = match &options.filter_pattern {
            Some(pattern) => {
                Some(Arc::new(PatternFilter::parse(pattern)?) as Arc<dyn UnmarshallingFilter>)
            }
            None => None,
        };
        Ok(Self {
            class_resolver: Arc::new(resolver),
            filter,
            options,
            ..Self::new(Arc::new(ClassRegistry::empty()))
        })
    }

    pub fn with_class_resolver(mut self, resolver: Arc<dyn ClassResolver>) -> Self {
        self.class_resolver = resolver;
        self
    }

    pub fn with_class_table(mut self, table: Arc<dyn ClassTable>) -> Self {
        self.class_table = Some(table);
        self
    }

    pub fn with_object_table(mut self, table: Arc<dyn ObjectTable>) -> Self {
        self.object_table = Some(table);
        self
    }

    pub fn with_object_resolver(mut self, resolver: Arc<dyn ObjectResolver>) -> Self {
        self.object_resolver = Some(resolver);
        self
    }

    pub fn with_externalizer_factory(mut self, factory: Arc<dyn ExternalizerFactory>) -> Self {
        self.externalizer_factory = Some(factory);
        self
    }

    pub fn with_creator(mut self, creator: Arc<dyn Creator>) -> Self {
        self.creator = creator;
        self
    }

    pub fn with_stream_header(mut self, header: Arc<dyn StreamHeader>) -> Self {
        self.stream_header = Some(header);
        self
    }

    pub fn with_filter(mut self, filter: Arc<dyn UnmarshallingFilter>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_options(mut self, options: MarshallingOptions) -> Self {
        self.options = options;
        self
    }

    #[inline]
    pub fn class_resolver(&self) -> &Arc<dyn ClassResolver> {
        &self.class_resolver
    }

    #[inline]
    pub fn class_table(&self) -> Option<&Arc<dyn ClassTable>> {
        self.class_table.as_ref()
    }

    #[inline]
    pub fn object_table(&self) -> Option<&Arc<dyn ObjectTable>> {
        self.object_table.as_ref()
    }

    #[inline]
    pub fn object_resolver(&self) -> Option<&Arc<dyn ObjectResolver>> {
        self.object_resolver.as_ref()
    }

    #[inline]
    pub fn externalizer_factory(&self) -> Option<&Arc<dyn ExternalizerFactory>> {
        self.externalizer_factory.as_ref()
    }

    #[inline]
    pub fn creator(&self) -> &Arc<dyn Creator> {
        &self.creator
    }

    #[inline]
    pub fn stream_header(&self) -> Option<&Arc<dyn StreamHeader>> {
        self.stream_header.as_ref()
    }

    #[inline]
    pub fn filter(&self) -> Option<&Arc<dyn UnmarshallingFilter>> {
        self.filter.as_ref()
    }

    #[inline]
    pub fn options(&self) -> &MarshallingOptions {
        &self.options
    }
}

impl fmt::Debug for MarshallingConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarshallingConfiguration")
            .field("class_table", &self.class_table.is_some())
            .field("object_table", &self.object_table.is_some())
            .field("object_resolver", &self.object_resolver.is_some())
            .field("externalizer_factory", &self.externalizer_factory.is_some())
            .field("stream_header", &self.stream_header.is_some())
            .field("filter", &self.filter.is_some())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
