//! The read side: [`Unmarshaller`] sessions.

// -----------------------------------------------------------------------------
// Modules

mod context;
mod reader;

// -----------------------------------------------------------------------------
// Exports

pub use context::ObjectReadContext;

pub(crate) use context::HookReader;

// -----------------------------------------------------------------------------
// Unmarshaller

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use std::io::Read;

use gw_utils::hash::HashMap;

use crate::class_stack::ClassStack;
use crate::descriptor::DescriptorCache;
use crate::io::DataInput;
use crate::model::{Heap, ObjRef, Value};
use crate::protocol::{ByteSource, MIN_PROTOCOL_VERSION, PROTOCOL_VERSION, tags};
use crate::session::SessionState;
use crate::tracker::{InstanceTable, StreamClassTable};
use crate::{Corruption, MarshalError, MarshallingConfiguration, Result};

use reader::Reader;

/// Position inside a run of custom-data blocks.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct BlockState {
    /// Bytes left in the current block.
    pub remaining: usize,
}

/// Reads object graphs written by a [`Marshaller`](crate::Marshaller).
///
/// Objects are allocated in the [`Heap`] passed to each read. Enum constants
/// are canonicalised per session, so all reads of one session should use
/// the same heap.
///
/// A failed read removes every object it allocated from the heap and
/// poisons the session.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use gw_marshal::class::ClassRegistry;
/// use gw_marshal::io::{DataInput, DataOutput};
/// use gw_marshal::model::{Heap, Value};
/// use gw_marshal::{Marshaller, MarshallingConfiguration, Unmarshaller};
///
/// let config = Arc::new(MarshallingConfiguration::new(Arc::new(ClassRegistry::new())));
///
/// let mut heap = Heap::new();
/// let greeting = Value::Ref(heap.alloc_str("hello"));
/// let mut bytes = Vec::new();
/// let mut marshaller = Marshaller::new(config.clone());
/// marshaller.start(&mut bytes).unwrap();
/// marshaller.write_object(&mut heap, &greeting).unwrap();
/// marshaller.write_i32(7).unwrap();
/// marshaller.finish().unwrap();
/// drop(marshaller);
///
/// let mut copy = Heap::new();
/// let mut unmarshaller = Unmarshaller::new(config);
/// unmarshaller.start(&bytes[..]).unwrap();
/// let value = unmarshaller.read_object(&mut copy).unwrap();
/// assert_eq!(copy.str(value.as_obj().unwrap()), Some("hello"));
/// assert_eq!(unmarshaller.read_i32().unwrap(), 7);
/// unmarshaller.finish().unwrap();
/// ```
pub struct Unmarshaller<'a> {
    pub(crate) config: Arc<MarshallingConfiguration>,
    source: Option<ByteSource<'a>>,
    block: BlockState,
    pub(crate) instances: InstanceTable,
    pub(crate) classes: StreamClassTable,
    pub(crate) descriptors: DescriptorCache,
    pub(crate) enums: HashMap<(usize, String), ObjRef>,
    pub(crate) depth: usize,
    pub(crate) class_stack: ClassStack,
    state: SessionState,
}

impl<'a> Unmarshaller<'a> {
    pub fn new(config: Arc<MarshallingConfiguration>) -> Self {
        let options = config.options();
        Self {
            instances: InstanceTable::with_capacity(options.instance_count),
            classes: StreamClassTable::with_capacity(options.class_count),
            descriptors: DescriptorCache::new(options.descriptor_cache),
            config,
            source: None,
            block: BlockState::default(),
            enums: HashMap::default(),
            depth: 0,
            class_stack: ClassStack::new(),
            state: SessionState::Idle,
        }
    }

    #[inline]
    pub fn configuration(&self) -> &MarshallingConfiguration {
        &self.config
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    /// Bytes consumed from the input so far.
    pub fn bytes_read(&self) -> u64 {
        self.source.as_ref().map_or(0, ByteSource::consumed)
    }

    /// Begins a session on `input`, checking the stream header and version.
    pub fn start<R: Read + 'a>(&mut self, input: R) -> Result<()> {
        if self.state == SessionState::Active {
            return Err(MarshalError::AlreadyActive);
        }

        let mut source = ByteSource::new(Box::new(input), self.config.options().buffer_size);
        if let Some(header) = self.config.stream_header() {
            header.read_header(&mut source)?;
        }
        let version = source.read_u8()?;
        if !(MIN_PROTOCOL_VERSION..=PROTOCOL_VERSION).contains(&version) {
            return Err(Corruption::UnsupportedVersion(version).into());
        }

        self.source = Some(source);
        self.block = BlockState::default();
        self.instances.clear();
        self.classes.clear();
        self.descriptors.clear();
        self.enums.clear();
        self.depth = 0;
        self.class_stack.clear();
        self.state = SessionState::Active;
        log::debug!("unmarshaller started with protocol version {version}");
        Ok(())
    }

    /// Reads the next value, allocating new objects in `heap`.
    pub fn read_object(&mut self, heap: &mut Heap) -> Result<Value> {
        self.read_root(heap, false)
    }

    /// Reads the next value as an unshared object.
    ///
    /// Later back references to it are rejected as stream corruption.
    pub fn read_object_unshared(&mut self, heap: &mut Heap) -> Result<Value> {
        self.read_root(heap, true)
    }

    fn read_root(&mut self, heap: &mut Heap, unshared: bool) -> Result<Value> {
        self.state.ensure_active()?;
        let mark = heap.len();
        let block = self.block;
        let mut reader = Reader::new(self, heap, Some(block));
        let result = reader.read_value(unshared);
        self.block = reader.into_block();
        if result.is_err() {
            heap.truncate(mark);
            self.depth = 0;
        }
        self.check(result, "read_object")
    }

    /// Ends the session and releases the input.
    pub fn finish(&mut self) -> Result<()> {
        if let Some(source) = &self.source {
            log::debug!("unmarshaller finished after {} bytes", source.consumed());
        }
        self.source = None;
        self.block = BlockState::default();
        self.instances.clear();
        self.classes.clear();
        self.enums.clear();
        self.state = SessionState::Idle;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Internal

    #[inline]
    pub(crate) fn source(&mut self) -> Result<&mut ByteSource<'a>> {
        self.source.as_mut().ok_or(MarshalError::NotActive)
    }

    /// Fills `buf` from custom data, crossing block boundaries as needed.
    pub(crate) fn read_block_bytes(&mut self, block: &mut BlockState, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            if block.remaining == 0 {
                self.next_block(block)?;
            }
            let n = (buf.len() - filled).min(block.remaining);
            self.source()?.read_into(&mut buf[filled..filled + n])?;
            block.remaining -= n;
            filled += n;
        }
        Ok(())
    }

    /// Moves to the next block of custom data.
    fn next_block(&mut self, block: &mut BlockState) -> Result<()> {
        loop {
            let source = self.source()?;
            match source.peek_u8()? {
                Some(tags::START_BLOCK) => {
                    source.read_u8()?;
                    block.remaining = source.read_len()?;
                    if block.remaining > 0 {
                        return Ok(());
                    }
                }
                Some(tag @ (tags::CLEAR_INSTANCE_CACHE | tags::CLEAR_CLASS_CACHE)) => {
                    source.read_u8()?;
                    self.apply_clear(tag);
                }
                Some(tags::END_BLOCK_DATA) => return Err(MarshalError::EndOfCustomData),
                Some(_) => return Err(MarshalError::UnexpectedObject),
                None => {
                    return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
                }
            }
        }
    }

    pub(crate) fn apply_clear(&mut self, tag: u8) {
        self.instances.clear();
        if tag == tags::CLEAR_CLASS_CACHE {
            self.classes.clear();
            log::debug!("class cache cleared by stream");
        } else {
            log::debug!("instance cache cleared by stream");
        }
    }

    fn check<T>(&mut self, result: Result<T>, action: &str) -> Result<T> {
        if let Err(err) = &result {
            self.state = SessionState::Poisoned;
            self.class_stack.report(action, err);
        }
        result
    }
}

impl DataInput for Unmarshaller<'_> {
    fn read_u8(&mut self) -> Result<u8> {
        let mut byte = [0u8; 1];
        self.read_into(&mut byte)?;
        Ok(byte[0])
    }

    fn read_into(&mut self, buf: &mut [u8]) -> Result<()> {
        self.state.ensure_active()?;
        let mut block = self.block;
        let result = self.read_block_bytes(&mut block, buf);
        self.block = block;
        self.check(result, "read")
    }
}
