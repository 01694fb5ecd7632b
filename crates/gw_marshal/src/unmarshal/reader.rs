use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::class::{ClassKind, ClassRef, FieldType, array_class_name};
use crate::descriptor::{DescriptorKind, StreamClass};
use crate::io::{DataInput, ObjectInput};
use crate::model::{ArrayData, Heap, ObjRef, ObjectBody, Value};
use crate::protocol::tags;
use crate::strategy::{FilterInfo, FilterStatus};
use crate::unmarshal::{BlockState, HookReader, ObjectReadContext, Unmarshaller};
use crate::{Corruption, MarshalError, Result};

/// Elements reserved up front for arrays and containers. Larger inputs grow
/// as elements actually arrive.
const PREALLOC_LIMIT: usize = 4096;

// -----------------------------------------------------------------------------
// Reader

/// One pass of the read pipeline into a heap.
///
/// `block` is `Some` while reading custom data, mirroring the writer.
pub(super) struct Reader<'u, 'a> {
    u: &'u mut Unmarshaller<'a>,
    heap: &'u mut Heap,
    block: Option<BlockState>,
}

impl<'u, 'a> Reader<'u, 'a> {
    pub fn new(u: &'u mut Unmarshaller<'a>, heap: &'u mut Heap, block: Option<BlockState>) -> Self {
        Self { u, heap, block }
    }

    pub fn into_block(self) -> BlockState {
        self.block.unwrap_or_default()
    }

    pub fn read_value(&mut self, unshared: bool) -> Result<Value> {
        if let Some(block) = self.block {
            if block.remaining > 0 {
                return Err(MarshalError::OptionalData);
            }
            match self.u.source()?.peek_u8()? {
                Some(tags::START_BLOCK) => return Err(MarshalError::OptionalData),
                Some(tags::END_BLOCK_DATA) => return Err(MarshalError::EndOfCustomData),
                _ => {}
            }
        }

        let saved = self.block.take();
        let result = self.read_tagged(unshared);
        self.block = saved;
        result
    }

    fn read_tagged(&mut self, unshared: bool) -> Result<Value> {
        let tag = loop {
            match self.read_u8()? {
                tag @ (tags::CLEAR_INSTANCE_CACHE | tags::CLEAR_CLASS_CACHE) => {
                    self.u.apply_clear(tag);
                }
                tag => break tag,
            }
        };

        match tag {
            tags::NULL => Ok(Value::Null),
            tags::REPEAT_OBJECT => {
                let handle = self.read_handle()?;
                if unshared {
                    return Err(Corruption::BackReferenceAsUnshared(handle).into());
                }
                self.u.instances.resolve(handle)
            }
            tags::UNSHARED => match self.read_u8()? {
                tag @ (tags::NEW_OBJECT
                | tags::PROXY_OBJECT
                | tags::STRING
                | tags::LIST
                | tags::MAP) => self.read_new(tag, true),
                found => Err(unexpected(found, "unshared object")),
            },
            tags::PREDEFINED_OBJECT => {
                let table = self
                    .u
                    .config
                    .object_table()
                    .cloned()
                    .ok_or(MarshalError::MissingStrategy("object table"))?;
                table.read_object(self)
            }
            tags::CLASS_OBJECT => {
                let stream_class = self.read_class_desc()?;
                Ok(Value::Class(stream_class.class.clone()))
            }
            tags::BOOLEAN_FALSE => Ok(Value::Bool(false)),
            tags::BOOLEAN_TRUE => Ok(Value::Bool(true)),
            tags::BYTE => Ok(Value::Byte(self.read_i8()?)),
            tags::CHAR => Ok(Value::Char(self.read_char()?)),
            tags::SHORT => Ok(Value::Short(self.read_i16()?)),
            tags::INT => Ok(Value::Int(self.read_i32()?)),
            tags::LONG => Ok(Value::Long(self.read_i64()?)),
            tags::FLOAT => Ok(Value::Float(self.read_f32()?)),
            tags::DOUBLE => Ok(Value::Double(self.read_f64()?)),
            tags::NEW_OBJECT | tags::PROXY_OBJECT | tags::STRING | tags::LIST | tags::MAP => {
                self.read_new(tag, unshared)
            }
            found => Err(unexpected(found, "object")),
        }
    }

    // -------------------------------------------------------------------------
    // Objects

    fn read_new(&mut self, tag: u8, unshared: bool) -> Result<Value> {
        self.u.depth += 1;
        self.check_filter(None, None)?;
        let value = match tag {
            tags::STRING => {
                let handle = self.u.instances.reserve(unshared);
                let s = self.read_utf()?;
                let obj = self.heap.alloc_str(s);
                self.resolve(handle, obj)
            }
            tags::LIST => {
                let handle = self.u.instances.reserve(unshared);
                let len = self.read_len()?;
                self.check_filter(None, Some(len))?;
                let obj = self.heap.alloc_list(Vec::with_capacity(len.min(PREALLOC_LIMIT)));
                self.u.instances.bind(handle, Value::Ref(obj));
                for _ in 0..len {
                    let item = self.read_value(false)?;
                    if let Some(ObjectBody::List(items)) = self.body_mut(obj) {
                        items.push(item);
                    }
                }
                self.resolve(handle, obj)
            }
            tags::MAP => {
                let handle = self.u.instances.reserve(unshared);
                let len = self.read_len()?;
                self.check_filter(None, Some(len))?;
                let obj = self.heap.alloc_map(Vec::with_capacity(len.min(PREALLOC_LIMIT)));
                self.u.instances.bind(handle, Value::Ref(obj));
                for _ in 0..len {
                    let key = self.read_value(false)?;
                    let value = self.read_value(false)?;
                    if let Some(ObjectBody::Map(entries)) = self.body_mut(obj) {
                        entries.push((key, value));
                    }
                }
                self.resolve(handle, obj)
            }
            tags::PROXY_OBJECT => {
                let stream_class = self.read_class_desc()?;
                if stream_class.kind != DescriptorKind::Proxy {
                    return Err(MarshalError::invalid_class(
                        stream_class.class.name(),
                        "proxy object with a non-proxy class",
                    ));
                }
                let handle = self.u.instances.reserve(unshared);
                let obj = self.heap.alloc_proxy(&stream_class.class, Value::Null);
                self.u.instances.bind(handle, Value::Ref(obj));
                let handler = self.read_value(false)?;
                if let Some(ObjectBody::Proxy { handler: slot }) = self.body_mut(obj) {
                    *slot = handler;
                }
                self.resolve(handle, obj)
            }
            _ => {
                let stream_class = self.read_class_desc()?;
                self.u.class_stack.push(stream_class.class.name());
                let value = self.read_new_object(&stream_class, unshared)?;
                self.u.class_stack.pop();
                Ok(value)
            }
        }?;
        self.u.depth -= 1;
        Ok(value)
    }

    fn read_new_object(&mut self, stream_class: &Arc<StreamClass>, unshared: bool) -> Result<Value> {
        let class = stream_class.class.clone();

        if let Some(externalizer) = stream_class.externalizer.clone() {
            let handle = self.u.instances.reserve(unshared);
            let obj = self.in_custom_data(|r| {
                let obj = externalizer.create_external(&class, r)?;
                r.u.instances.bind(handle, Value::Ref(obj));
                externalizer.read_external(obj, r)?;
                Ok(obj)
            })?;
            return self.resolve(handle, obj);
        }

        match stream_class.kind {
            DescriptorKind::Serializable => {
                let handle = self.u.instances.reserve(unshared);
                let creator = self.u.config.creator().clone();
                let obj = creator.create(&mut *self.heap, &class)?;
                self.u.instances.bind(handle, Value::Ref(obj));

                for level in StreamClass::levels(stream_class) {
                    if !level.has_hook_data {
                        self.read_fields(obj, &level)?;
                        continue;
                    }
                    match level.class.hooks().read_object().cloned() {
                        Some(hook) => self.in_custom_data(|r| {
                            let mut ctx = ObjectReadContext::new(r, obj, level.clone());
                            hook(&mut ctx)
                        })?,
                        None => {
                            self.read_fields(obj, &level)?;
                            self.in_custom_data(|_| Ok(()))?;
                        }
                    }
                }
                self.resolve(handle, obj)
            }
            DescriptorKind::Record => {
                let handle = self.u.instances.reserve(unshared);
                let mut layout = class.default_layout();
                for field in stream_class.fields.iter() {
                    let value = self.read_field(field.ty)?;
                    if let Some(slot) = field.slot {
                        layout[slot] = value;
                    }
                }
                let obj = self.heap.alloc(class, ObjectBody::Fields(layout));
                self.resolve(handle, obj)
            }
            DescriptorKind::Externalizable => {
                let Some(hook) = class.hooks().external_read().cloned() else {
                    return Err(MarshalError::invalid_class(
                        class.name(),
                        "externalizable class has no read hook",
                    ));
                };
                let handle = self.u.instances.reserve(unshared);
                let creator = self.u.config.creator().clone();
                let obj = creator.create(&mut *self.heap, &class)?;
                self.u.instances.bind(handle, Value::Ref(obj));
                self.in_custom_data(|r| hook(obj, r))?;
                self.resolve(handle, obj)
            }
            DescriptorKind::Enum => {
                let handle = self.u.instances.reserve(unshared);
                let constant = self.read_utf()?;
                if !class
                    .enum_constants()
                    .is_some_and(|constants| constants.contains(&constant))
                {
                    return Err(Corruption::UnknownEnumConstant {
                        class: class.name().into(),
                        constant,
                    }
                    .into());
                }
                let key = (class.identity(), constant);
                let existing = self.u.enums.get(&key).copied();
                let obj = match existing {
                    Some(obj) => obj,
                    None => {
                        let obj = self.heap.alloc_enum(&class, key.1.as_str());
                        self.u.enums.insert(key, obj);
                        obj
                    }
                };
                self.u.instances.bind(handle, Value::Ref(obj));
                Ok(Value::Ref(obj))
            }
            DescriptorKind::Array(FieldType::Object) => {
                let len = self.read_len()?;
                self.check_filter(None, Some(len))?;
                let handle = self.u.instances.reserve(unshared);
                let initial = ArrayData::with_len(FieldType::Object, len.min(PREALLOC_LIMIT));
                let obj = self.heap.alloc_array(initial);
                self.u.instances.bind(handle, Value::Ref(obj));
                for index in 0..len {
                    let element = self.read_value(false)?;
                    if let Some(ObjectBody::Array(ArrayData::Object(elements))) = self.body_mut(obj) {
                        if index == elements.len() {
                            grow_object_array(elements, len);
                        }
                        elements[index] = element;
                    }
                }
                self.resolve(handle, obj)
            }
            DescriptorKind::Array(element) => {
                let len = self.read_len()?;
                self.check_filter(None, Some(len))?;
                let handle = self.u.instances.reserve(unshared);
                let data = read_primitive_array(self, element, len)?;
                let obj = self.heap.alloc_array(data);
                self.resolve(handle, obj)
            }
            DescriptorKind::Proxy
            | DescriptorKind::Plain
            | DescriptorKind::String
            | DescriptorKind::List
            | DescriptorKind::Map => Err(MarshalError::invalid_class(
                class.name(),
                "class has no object encoding",
            )),
        }
    }

    #[inline]
    fn body_mut(&mut self, obj: ObjRef) -> Option<&mut ObjectBody> {
        self.heap.get_mut(obj).map(|o| &mut o.body)
    }

    /// Applies the class `read_resolve` hook and the object resolver, then
    /// binds the handle to the result.
    fn resolve(&mut self, handle: u32, obj: ObjRef) -> Result<Value> {
        let mut value = Value::Ref(obj);
        if let Some(hook) = self
            .heap
            .class_of(obj)
            .and_then(|c| c.hooks().read_resolve().cloned())
        {
            value = hook(&mut *self.heap, obj);
        }
        if let Some(resolver) = self.u.config.object_resolver() {
            value = resolver.read_resolve(&mut *self.heap, value);
        }
        self.u.instances.bind(handle, value.clone());
        Ok(value)
    }

    /// Runs `f` over the custom data of one hook, then skips what it left.
    fn in_custom_data<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = self.block.replace(BlockState::default());
        let result = f(self).and_then(|value| self.skip_custom_data().map(|()| value));
        self.block = saved;
        result
    }

    /// Discards custom data up to and including its end marker.
    fn skip_custom_data(&mut self) -> Result<()> {
        loop {
            if let Some(block) = self.block.as_mut()
                && block.remaining > 0
            {
                let remaining = core::mem::take(&mut block.remaining);
                log::trace!("skipping {remaining} unread bytes of custom data");
                self.u.source()?.skip_bytes(remaining)?;
            }

            let source = self.u.source()?;
            match source.peek_u8()? {
                Some(tags::START_BLOCK) => {
                    source.read_u8()?;
                    let len = source.read_len()?;
                    if let Some(block) = self.block.as_mut() {
                        block.remaining = len;
                    }
                }
                Some(tags::END_BLOCK_DATA) => {
                    source.read_u8()?;
                    return Ok(());
                }
                Some(_) => {
                    self.read_value(false)?;
                }
                None => {
                    return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Fields

    fn read_fields(&mut self, obj: ObjRef, level: &StreamClass) -> Result<()> {
        for field in level.fields.iter() {
            let value = self.read_field(field.ty)?;
            if let Some(slot) = field.slot {
                self.heap.set_slot(obj, slot, value);
            }
        }
        Ok(())
    }

    fn read_field(&mut self, ty: FieldType) -> Result<Value> {
        Ok(match ty {
            FieldType::Bool => Value::Bool(self.read_bool()?),
            FieldType::Byte => Value::Byte(self.read_i8()?),
            FieldType::Char => Value::Char(self.read_char()?),
            FieldType::Short => Value::Short(self.read_i16()?),
            FieldType::Int => Value::Int(self.read_i32()?),
            FieldType::Long => Value::Long(self.read_i64()?),
            FieldType::Float => Value::Float(self.read_f32()?),
            FieldType::Double => Value::Double(self.read_f64()?),
            FieldType::Object => self.read_value(false)?,
        })
    }

    // -------------------------------------------------------------------------
    // Class descriptors

    fn read_class_desc(&mut self) -> Result<Arc<StreamClass>> {
        let tag = self.read_u8()?;
        self.read_class_desc_tagged(tag)?
            .ok_or_else(|| unexpected(tags::NO_CLASS_DESC, "class descriptor"))
    }

    fn read_class_desc_tagged(&mut self, tag: u8) -> Result<Option<Arc<StreamClass>>> {
        let resolver = self.u.config.class_resolver().clone();
        let stream_class = match tag {
            tags::NO_CLASS_DESC => return Ok(None),
            tags::REPEAT_CLASS => {
                let handle = self.read_handle()?;
                return self.u.classes.get(handle).map(Some);
            }
            tags::PREDEFINED_CLASS => {
                let table = self
                    .u
                    .config
                    .class_table()
                    .cloned()
                    .ok_or(MarshalError::MissingStrategy("class table"))?;
                let class = table.read_class(self)?;
                StreamClass::from_local(&class, &mut self.u.descriptors)
            }
            tags::SERIALIZABLE_CLASS | tags::RECORD_CLASS => {
                let kind = if tag == tags::RECORD_CLASS {
                    DescriptorKind::Record
                } else {
                    DescriptorKind::Serializable
                };
                let name = self.read_utf()?;
                let uid = self.read_i64()?;
                let flags = self.read_u8()?;
                let count = self.read_len()?;
                let mut fields = Vec::with_capacity(count.min(PREALLOC_LIMIT));
                for _ in 0..count {
                    let field_name = self.read_utf()?;
                    let code = self.read_u8()?;
                    let ty = FieldType::from_code(code).ok_or(Corruption::BadTypeCode(code))?;
                    fields.push((field_name, ty));
                }

                self.check_filter(Some(name.as_str()), None)?;
                let class = resolver.resolve_class(self, &name, Some(uid))?;
                self.expect_kind(&class, kind)?;
                let super_class = {
                    let tag = self.read_u8()?;
                    self.read_class_desc_tagged(tag)?
                };
                StreamClass::with_fields(
                    class,
                    kind,
                    fields,
                    flags & tags::FLAG_HOOK_DATA != 0,
                    super_class,
                )
            }
            tags::EXTERNALIZABLE_CLASS => {
                let name = self.read_utf()?;
                let uid = self.read_i64()?;
                self.check_filter(Some(name.as_str()), None)?;
                let class = resolver.resolve_class(self, &name, Some(uid))?;
                self.expect_kind(&class, DescriptorKind::Externalizable)?;
                StreamClass::bare(class, DescriptorKind::Externalizable)
            }
            tags::ENUM_CLASS => {
                let name = self.read_utf()?;
                self.check_filter(Some(name.as_str()), None)?;
                let class = resolver.resolve_class(self, &name, None)?;
                self.expect_kind(&class, DescriptorKind::Enum)?;
                StreamClass::bare(class, DescriptorKind::Enum)
            }
            tags::ARRAY_CLASS => {
                let code = self.read_u8()?;
                let element = FieldType::from_code(code).ok_or(Corruption::BadTypeCode(code))?;
                self.check_filter(Some(array_class_name(element).as_str()), None)?;
                StreamClass::bare(ClassRef::array(element), DescriptorKind::Array(element))
            }
            tags::PROXY_CLASS => {
                let count = self.read_len()?;
                let mut interfaces = Vec::with_capacity(count.min(PREALLOC_LIMIT));
                for _ in 0..count {
                    interfaces.push(self.read_utf()?);
                }
                for interface in &interfaces {
                    self.check_filter(Some(interface.as_str()), None)?;
                }
                let class = resolver.resolve_proxy_class(self, &interfaces)?;
                if !matches!(class.kind(), ClassKind::Proxy(_)) {
                    return Err(MarshalError::invalid_class(
                        class.name(),
                        "resolved proxy class is not a proxy",
                    ));
                }
                StreamClass::bare(class, DescriptorKind::Proxy)
            }
            tags::PLAIN_CLASS => {
                let name = self.read_utf()?;
                self.check_filter(Some(name.as_str()), None)?;
                let class = resolver.resolve_class(self, &name, None)?;
                StreamClass::bare(class, DescriptorKind::Plain)
            }
            tags::EXTERNALIZER_CLASS => {
                let inner = self.read_class_desc()?;
                let id = self.read_utf()?;
                let factory = self
                    .u
                    .config
                    .externalizer_factory()
                    .cloned()
                    .ok_or(MarshalError::MissingStrategy("externalizer factory"))?;
                let externalizer = factory.read_externalizer(&id, self)?;
                let mut stream_class = StreamClass::bare(inner.class.clone(), inner.kind);
                stream_class.externalizer = Some(externalizer);
                stream_class
            }
            found => return Err(unexpected(found, "class descriptor")),
        };

        let stream_class = Arc::new(stream_class);
        let handle = self.u.classes.push(stream_class.clone());
        log::trace!(
            "class handle {handle} resolved to `{}`",
            stream_class.class.name()
        );
        Ok(Some(stream_class))
    }

    /// Checks that the local class is encoded the way the stream claims.
    fn expect_kind(&mut self, class: &ClassRef, stream: DescriptorKind) -> Result<()> {
        let local = self.u.descriptors.describe(class).kind();
        if local == stream {
            return Ok(());
        }
        Err(MarshalError::invalid_class(
            class.name(),
            alloc::format!("stream encodes it as {stream:?} but the local class is {local:?}"),
        ))
    }

    // -------------------------------------------------------------------------
    // Filtering

    fn check_filter(&self, class_name: Option<&str>, array_length: Option<usize>) -> Result<()> {
        let Some(filter) = self.u.config.filter() else {
            return Ok(());
        };
        let info = FilterInfo {
            class_name,
            array_length,
            depth: self.u.depth,
            references: self.u.instances.len(),
            stream_bytes: self.u.bytes_read(),
        };
        if filter.check_input(&info) != FilterStatus::Reject {
            return Ok(());
        }

        let subject = match (class_name, array_length) {
            (Some(name), _) => alloc::format!("class `{name}`"),
            (None, Some(len)) => alloc::format!("array of length {len}"),
            (None, None) => alloc::format!(
                "object at depth {} after {} references",
                info.depth, info.references
            ),
        };
        log::debug!("unmarshalling filter rejected {subject}");
        Err(MarshalError::FilterRejected { subject })
    }
}

fn unexpected(found: u8, context: &'static str) -> MarshalError {
    if tags::tag_name(found) == "UNKNOWN" {
        Corruption::UnknownTag(found).into()
    } else {
        Corruption::UnexpectedTag { found, context }.into()
    }
}

/// Doubles the storage of an object array being read, up to `len` slots.
fn grow_object_array(elements: &mut Box<[Value]>, len: usize) {
    let target = (elements.len() * 2).max(PREALLOC_LIMIT).min(len);
    let mut grown = core::mem::take(elements).into_vec();
    grown.resize(target, Value::Null);
    *elements = grown.into_boxed_slice();
}

/// Reads `len` fixed-width elements of a primitive array.
fn read_primitive_array(input: &mut dyn DataInput, element: FieldType, len: usize) -> Result<ArrayData> {
    fn collect<T>(len: usize, mut read: impl FnMut() -> Result<T>) -> Result<Box<[T]>> {
        let mut items = Vec::with_capacity(len.min(PREALLOC_LIMIT));
        for _ in 0..len {
            items.push(read()?);
        }
        Ok(items.into_boxed_slice())
    }

    Ok(match element {
        FieldType::Bool => ArrayData::Bool(collect(len, || input.read_bool())?),
        FieldType::Byte => ArrayData::Byte(collect(len, || input.read_i8())?),
        FieldType::Char => ArrayData::Char(collect(len, || input.read_char())?),
        FieldType::Short => ArrayData::Short(collect(len, || input.read_i16())?),
        FieldType::Int => ArrayData::Int(collect(len, || input.read_i32())?),
        FieldType::Long => ArrayData::Long(collect(len, || input.read_i64())?),
        FieldType::Float => ArrayData::Float(collect(len, || input.read_f32())?),
        FieldType::Double => ArrayData::Double(collect(len, || input.read_f64())?),
        FieldType::Object => unreachable!("object arrays are read element by element"),
    })
}

// -----------------------------------------------------------------------------
// I/O surface

impl DataInput for Reader<'_, '_> {
    fn read_u8(&mut self) -> Result<u8> {
        let mut byte = [0u8; 1];
        self.read_into(&mut byte)?;
        Ok(byte[0])
    }

    fn read_into(&mut self, buf: &mut [u8]) -> Result<()> {
        match self.block.as_mut() {
            Some(block) => self.u.read_block_bytes(block, buf),
            None => self.u.source()?.read_into(buf),
        }
    }
}

impl ObjectInput for Reader<'_, '_> {
    #[inline]
    fn heap(&self) -> &Heap {
        &*self.heap
    }

    #[inline]
    fn heap_mut(&mut self) -> &mut Heap {
        &mut *self.heap
    }

    #[inline]
    fn read_object(&mut self) -> Result<Value> {
        self.read_value(false)
    }

    #[inline]
    fn read_object_unshared(&mut self) -> Result<Value> {
        self.read_value(true)
    }
}

impl HookReader for Reader<'_, '_> {
    fn read_default_fields(&mut self, this: ObjRef, level: &StreamClass) -> Result<()> {
        if self.block.is_some_and(|block| block.remaining > 0) {
            return Err(MarshalError::OptionalData);
        }
        let saved = self.block.take();
        let result = self.read_fields(this, level);
        self.block = saved;
        result
    }
}
