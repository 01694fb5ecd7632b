//! The write side: [`Marshaller`] sessions.

// -----------------------------------------------------------------------------
// Modules

mod context;
mod writer;

// -----------------------------------------------------------------------------
// Exports

pub use context::ObjectWriteContext;

pub(crate) use context::HookWriter;

// -----------------------------------------------------------------------------
// Marshaller

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::mem;
use std::io::Write;

use crate::class_stack::ClassStack;
use crate::descriptor::DescriptorCache;
use crate::io::DataOutput;
use crate::model::{Heap, Value};
use crate::protocol::{ByteSink, MAX_BLOCK_SIZE, MIN_PROTOCOL_VERSION, PROTOCOL_VERSION, tags};
use crate::session::SessionState;
use crate::tracker::{ClassHandles, InstanceHandles};
use crate::{Corruption, MarshalError, MarshallingConfiguration, Result};

use writer::Writer;

/// Writes object graphs to a byte stream.
///
/// A session runs from [`start`](Marshaller::start) to
/// [`finish`](Marshaller::finish). Within one session an object written
/// twice is encoded once and referenced afterwards, and each class
/// descriptor is written once.
///
/// Primitives written directly on the marshaller are framed as custom data,
/// so they can be interleaved freely with objects.
///
/// Any failure poisons the session: every later call except `start` and
/// `finish` returns [`MarshalError::Poisoned`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use gw_marshal::class::ClassRegistry;
/// use gw_marshal::io::DataOutput;
/// use gw_marshal::model::{Heap, Value};
/// use gw_marshal::{Marshaller, MarshallingConfiguration};
///
/// let config = Arc::new(MarshallingConfiguration::new(Arc::new(ClassRegistry::new())));
/// let mut heap = Heap::new();
/// let greeting = Value::Ref(heap.alloc_str("hello"));
///
/// let mut bytes = Vec::new();
/// let mut marshaller = Marshaller::new(config);
/// marshaller.start(&mut bytes).unwrap();
/// marshaller.write_object(&mut heap, &greeting).unwrap();
/// marshaller.write_i32(7).unwrap();
/// marshaller.finish().unwrap();
/// drop(marshaller);
///
/// assert!(!bytes.is_empty());
/// ```
pub struct Marshaller<'a> {
    pub(crate) config: Arc<MarshallingConfiguration>,
    sink: Option<ByteSink<'a>>,
    block: Vec<u8>,
    pub(crate) instances: InstanceHandles,
    pub(crate) classes: ClassHandles,
    pub(crate) descriptors: DescriptorCache,
    pub(crate) class_stack: ClassStack,
    state: SessionState,
}

impl<'a> Marshaller<'a> {
    pub fn new(config: Arc<MarshallingConfiguration>) -> Self {
        let options = config.options();
        Self {
            instances: InstanceHandles::with_capacity(options.instance_count),
            classes: ClassHandles::with_capacity(options.class_count),
            descriptors: DescriptorCache::new(options.descriptor_cache),
            config,
            sink: None,
            block: Vec::new(),
            class_stack: ClassStack::new(),
            state: SessionState::Idle,
        }
    }

    #[inline]
    pub fn configuration(&self) -> &MarshallingConfiguration {
        &self.config
    }

    /// Returns `true` between a successful `start` and `finish`.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    /// Bytes handed to the output so far, not counting unflushed custom data.
    pub fn bytes_written(&self) -> u64 {
        self.sink.as_ref().map_or(0, ByteSink::written)
    }

    /// Begins a session on `output`.
    ///
    /// Resets the handle tables and writes the stream header and version.
    /// A poisoned or finished marshaller may be started again.
    pub fn start<W: Write + 'a>(&mut self, output: W) -> Result<()> {
        if self.state == SessionState::Active {
            return Err(MarshalError::AlreadyActive);
        }
        let options = self.config.options();
        let version = options.version;
        if !(MIN_PROTOCOL_VERSION..=PROTOCOL_VERSION).contains(&version) {
            return Err(Corruption::UnsupportedVersion(version).into());
        }

        let mut sink = ByteSink::new(Box::new(output), options.buffer_size);
        if let Some(header) = self.config.stream_header() {
            header.write_header(&mut sink)?;
        }
        sink.write_u8(version)?;

        self.sink = Some(sink);
        self.block.clear();
        self.instances.clear();
        self.classes.clear();
        self.descriptors.clear();
        self.class_stack.clear();
        self.state = SessionState::Active;
        log::debug!("marshaller started with protocol version {version}");
        Ok(())
    }

    /// Writes `value` and everything reachable from it.
    pub fn write_object(&mut self, heap: &mut Heap, value: &Value) -> Result<()> {
        self.write_root(heap, value, false)
    }

    /// Writes `value` as a fresh copy that can never be referenced back.
    ///
    /// Objects reachable from `value` are still shared as usual.
    pub fn write_object_unshared(&mut self, heap: &mut Heap, value: &Value) -> Result<()> {
        self.write_root(heap, value, true)
    }

    fn write_root(&mut self, heap: &mut Heap, value: &Value, unshared: bool) -> Result<()> {
        self.state.ensure_active()?;
        let block = mem::take(&mut self.block);
        let mut writer = Writer::new(self, heap, Some(block));
        let result = writer.write_value(value, unshared);
        self.block = writer.into_block();
        self.check(result, "write_object")
    }

    /// Forgets every object written so far. Later writes encode them again.
    pub fn clear_instance_cache(&mut self) -> Result<()> {
        self.state.ensure_active()?;
        let result = self.write_clear(tags::CLEAR_INSTANCE_CACHE);
        self.instances.clear();
        self.check(result, "clear_instance_cache")
    }

    /// Forgets every class and object written so far.
    pub fn clear_class_cache(&mut self) -> Result<()> {
        self.state.ensure_active()?;
        let result = self.write_clear(tags::CLEAR_CLASS_CACHE);
        self.classes.clear();
        self.instances.clear();
        self.check(result, "clear_class_cache")
    }

    fn write_clear(&mut self, tag: u8) -> Result<()> {
        self.flush_block()?;
        self.sink()?.write_u8(tag)
    }

    /// Pushes buffered data to the output.
    pub fn flush(&mut self) -> Result<()> {
        self.state.ensure_active()?;
        let result = self.flush_block().and_then(|()| self.sink()?.flush());
        self.check(result, "flush")
    }

    /// Ends the session, flushing and releasing the output.
    ///
    /// A poisoned session releases the output and discards whatever was
    /// still buffered, so only data flushed before the failure reaches it.
    /// Finishing an idle marshaller does nothing.
    pub fn finish(&mut self) -> Result<()> {
        let result = match self.state {
            SessionState::Active => self.flush_block().and_then(|()| self.sink()?.flush()),
            SessionState::Idle | SessionState::Poisoned => Ok(()),
        };
        if let Some(sink) = self.sink.take() {
            log::debug!("marshaller finished after {} bytes", sink.written());
            if self.state == SessionState::Poisoned {
                sink.discard();
            }
        }
        self.block.clear();
        self.instances.clear();
        self.classes.clear();
        self.state = SessionState::Idle;
        result
    }

    // -------------------------------------------------------------------------
    // Internal

    #[inline]
    pub(crate) fn sink(&mut self) -> Result<&mut ByteSink<'a>> {
        self.sink.as_mut().ok_or(MarshalError::NotActive)
    }

    /// Frames `data` as one block of custom data.
    pub(crate) fn write_block_data(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let sink = self.sink()?;
        sink.write_u8(tags::START_BLOCK)?;
        sink.write_varint(data.len() as u64)?;
        sink.write_bytes(data)
    }

    fn flush_block(&mut self) -> Result<()> {
        let block = mem::take(&mut self.block);
        let result = self.write_block_data(&block);
        self.block = block;
        self.block.clear();
        result
    }

    fn check<T>(&mut self, result: Result<T>, action: &str) -> Result<T> {
        if let Err(err) = &result {
            self.state = SessionState::Poisoned;
            self.class_stack.report(action, err);
        }
        result
    }
}

impl DataOutput for Marshaller<'_> {
    #[inline]
    fn write_u8(&mut self, v: u8) -> Result<()> {
        self.write_bytes(&[v])
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.state.ensure_active()?;
        self.block.extend_from_slice(bytes);
        if self.block.len() >= MAX_BLOCK_SIZE {
            let result = self.flush_block();
            return self.check(result, "write");
        }
        Ok(())
    }
}

impl Drop for Marshaller<'_> {
    fn drop(&mut self) {
        if self.state == SessionState::Active {
            log::warn!("marshaller dropped without `finish`, flushing buffered data");
            if let Err(err) = self.flush_block().and_then(|()| self.sink()?.flush()) {
                log::warn!("flush on drop failed: {err}");
            }
        } else if let Some(sink) = self.sink.take() {
            sink.discard();
        }
    }
}
