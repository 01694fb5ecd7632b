use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::class::{ClassKind, ClassRef, FieldType};
use crate::descriptor::{ClassDescriptor, DescriptorKind, serializable_levels, serializable_super};
use crate::io::{DataOutput, ObjectOutput};
use crate::marshal::{HookWriter, Marshaller, ObjectWriteContext};
use crate::model::{ArrayData, Heap, ObjRef, ObjectBody, Value};
use crate::protocol::{MAX_BLOCK_SIZE, tags};
use crate::strategy::Externalizer;
use crate::{MarshalError, Result};

// -----------------------------------------------------------------------------
// Writer

/// One pass of the write pipeline over a heap.
///
/// While `block` is `Some`, primitives are collected into custom-data
/// blocks. Objects always go to the sink directly, after any pending block
/// has been framed.
pub(super) struct Writer<'m, 'a> {
    m: &'m mut Marshaller<'a>,
    heap: &'m mut Heap,
    block: Option<Vec<u8>>,
}

impl<'m, 'a> Writer<'m, 'a> {
    pub fn new(m: &'m mut Marshaller<'a>, heap: &'m mut Heap, block: Option<Vec<u8>>) -> Self {
        Self { m, heap, block }
    }

    /// Returns the custom-data buffer, emptied of anything already framed.
    pub fn into_block(self) -> Vec<u8> {
        self.block.unwrap_or_default()
    }

    pub fn write_value(&mut self, value: &Value, unshared: bool) -> Result<()> {
        self.flush_block()?;
        let saved = self.block.take();
        let result = self.write_tagged(value, unshared);
        self.block = saved;
        result
    }

    fn write_tagged(&mut self, value: &Value, unshared: bool) -> Result<()> {
        let obj = match value {
            Value::Null => return self.write_u8(tags::NULL),
            Value::Class(class) => {
                self.write_u8(tags::CLASS_OBJECT)?;
                return self.write_class_desc(class);
            }
            Value::Ref(obj) => Some(*obj),
            _ => None,
        };

        if let Some(obj) = obj
            && !unshared
            && let Some(handle) = self.m.instances.lookup(obj)
        {
            return self.write_repeat(handle);
        }

        let replaced = self.substitute(value)?;
        let mut alias = None;
        if replaced != *value {
            if let Value::Ref(replacement) = replaced
                && !unshared
                && let Some(handle) = self.m.instances.lookup(replacement)
            {
                if let Some(original) = obj {
                    self.m.instances.alias(original, handle);
                }
                return self.write_repeat(handle);
            }
            alias = obj;
        }

        if let Some(table) = self.m.config.object_table()
            && let Some(writer) = table.object_writer(&*self.heap, &replaced)
        {
            self.write_u8(tags::PREDEFINED_OBJECT)?;
            return writer.write_object(self, &replaced);
        }

        match replaced {
            Value::Null => self.write_u8(tags::NULL),
            Value::Class(class) => {
                self.write_u8(tags::CLASS_OBJECT)?;
                self.write_class_desc(&class)
            }
            Value::Ref(obj) => {
                let class = self
                    .heap
                    .class_of(obj)
                    .cloned()
                    .ok_or(MarshalError::InvalidReference(obj))?;
                self.m.class_stack.push(class.name());
                self.write_new_object(obj, &class, alias, unshared)?;
                self.m.class_stack.pop();
                Ok(())
            }
            primitive => self.write_boxed(&primitive),
        }
    }

    fn write_repeat(&mut self, handle: u32) -> Result<()> {
        self.write_u8(tags::REPEAT_OBJECT)?;
        self.write_varint(u64::from(handle))
    }

    /// Applies the class `write_replace` hook, then the object resolver.
    fn substitute(&mut self, value: &Value) -> Result<Value> {
        let mut value = value.clone();
        if let Value::Ref(obj) = value
            && let Some(hook) = self
                .heap
                .class_of(obj)
                .and_then(|c| c.hooks().write_replace().cloned())
        {
            value = hook(&mut *self.heap, obj);
        }
        if let Some(resolver) = self.m.config.object_resolver() {
            value = resolver.write_replace(&mut *self.heap, value);
        }
        if let Value::Ref(obj) = value
            && self.heap.get(obj).is_none()
        {
            return Err(MarshalError::InvalidReference(obj));
        }
        Ok(value)
    }

    fn write_boxed(&mut self, value: &Value) -> Result<()> {
        match *value {
            Value::Bool(true) => self.write_u8(tags::BOOLEAN_TRUE),
            Value::Bool(false) => self.write_u8(tags::BOOLEAN_FALSE),
            Value::Byte(v) => {
                self.write_u8(tags::BYTE)?;
                self.write_i8(v)
            }
            Value::Char(v) => {
                self.write_u8(tags::CHAR)?;
                self.write_char(v)
            }
            Value::Short(v) => {
                self.write_u8(tags::SHORT)?;
                self.write_i16(v)
            }
            Value::Int(v) => {
                self.write_u8(tags::INT)?;
                self.write_i32(v)
            }
            Value::Long(v) => {
                self.write_u8(tags::LONG)?;
                self.write_i64(v)
            }
            Value::Float(v) => {
                self.write_u8(tags::FLOAT)?;
                self.write_f32(v)
            }
            Value::Double(v) => {
                self.write_u8(tags::DOUBLE)?;
                self.write_f64(v)
            }
            Value::Null | Value::Class(_) | Value::Ref(_) => {
                unreachable!("non-primitive value passed to write_boxed")
            }
        }
    }

    // -------------------------------------------------------------------------
    // Objects

    fn write_new_object(
        &mut self,
        obj: ObjRef,
        class: &ClassRef,
        alias: Option<ObjRef>,
        unshared: bool,
    ) -> Result<()> {
        if let ClassKind::Proxy(_) = class.kind() {
            let handler = match self.heap.get(obj).map(|o| &o.body) {
                Some(ObjectBody::Proxy { handler }) => handler.clone(),
                _ => return Err(MarshalError::InvalidReference(obj)),
            };
            self.write_prefix(tags::PROXY_OBJECT, unshared)?;
            self.write_class_desc(class)?;
            self.assign(obj, alias, unshared);
            return self.write_value(&handler, false);
        }

        // The externalizer picked for the first instance serves the whole class.
        let externalized = match self.m.classes.lookup_externalized(class) {
            Some((handle, externalizer)) => Some((Some(handle), externalizer)),
            None => self
                .m
                .config
                .externalizer_factory()
                .and_then(|factory| factory.externalizer(&*self.heap, obj))
                .map(|externalizer| (None, externalizer)),
        };
        if let Some((handle, externalizer)) = externalized {
            self.write_prefix(tags::NEW_OBJECT, unshared)?;
            self.write_externalizer_desc(class, handle, &externalizer)?;
            self.assign(obj, alias, unshared);
            return self.in_custom_data(|w| externalizer.write_external(obj, w));
        }

        match class.kind() {
            ClassKind::String => {
                let s: String = self.heap.str(obj).ok_or(MarshalError::InvalidReference(obj))?.into();
                self.write_prefix(tags::STRING, unshared)?;
                self.assign(obj, alias, unshared);
                return self.write_utf(&s);
            }
            ClassKind::List => {
                let items = self
                    .heap
                    .list(obj)
                    .ok_or(MarshalError::InvalidReference(obj))?
                    .to_vec();
                self.write_prefix(tags::LIST, unshared)?;
                self.assign(obj, alias, unshared);
                self.write_varint(items.len() as u64)?;
                for item in &items {
                    self.write_value(item, false)?;
                }
                return Ok(());
            }
            ClassKind::Map => {
                let entries = self
                    .heap
                    .map(obj)
                    .ok_or(MarshalError::InvalidReference(obj))?
                    .to_vec();
                self.write_prefix(tags::MAP, unshared)?;
                self.assign(obj, alias, unshared);
                self.write_varint(entries.len() as u64)?;
                for (key, value) in &entries {
                    self.write_value(key, false)?;
                    self.write_value(value, false)?;
                }
                return Ok(());
            }
            _ => {}
        }

        let descriptor = self.m.descriptors.describe(class);
        if !class.is_serializable() || descriptor.kind() == DescriptorKind::Plain {
            return Err(MarshalError::NotSerializable {
                class: class.name().into(),
            });
        }

        self.write_prefix(tags::NEW_OBJECT, unshared)?;
        self.write_class_desc(class)?;
        self.assign(obj, alias, unshared);

        match descriptor.kind() {
            DescriptorKind::Serializable => {
                for level in serializable_levels(class) {
                    let level_descriptor = self.m.descriptors.describe(&level);
                    let hook = level.hooks().write_object().cloned();
                    match hook {
                        Some(hook) => self.in_custom_data(|w| {
                            let mut ctx = ObjectWriteContext::new(w, obj, level, level_descriptor);
                            hook(&mut ctx)
                        })?,
                        None => self.write_fields(obj, &level_descriptor)?,
                    }
                }
                Ok(())
            }
            DescriptorKind::Record => self.write_fields(obj, &descriptor),
            DescriptorKind::Externalizable => {
                let Some(hook) = class.hooks().external_write().cloned() else {
                    return Err(MarshalError::invalid_class(
                        class.name(),
                        "externalizable class has no write hook",
                    ));
                };
                self.in_custom_data(|w| hook(obj, w))
            }
            DescriptorKind::Enum => {
                let constant: String = self
                    .heap
                    .enum_constant(obj)
                    .ok_or(MarshalError::InvalidReference(obj))?
                    .into();
                self.write_utf(&constant)
            }
            DescriptorKind::Array(FieldType::Object) => {
                let elements = match self.heap.array(obj) {
                    Some(ArrayData::Object(elements)) => elements.to_vec(),
                    _ => return Err(MarshalError::InvalidReference(obj)),
                };
                self.write_varint(elements.len() as u64)?;
                for element in &elements {
                    self.write_value(element, false)?;
                }
                Ok(())
            }
            DescriptorKind::Array(_) => {
                let data = self.heap.array(obj).ok_or(MarshalError::InvalidReference(obj))?;
                let mut encoded = Vec::with_capacity(data.len() * 4 + 5);
                encode_primitive_array(data, &mut encoded)?;
                self.write_bytes(&encoded)
            }
            DescriptorKind::Proxy
            | DescriptorKind::Plain
            | DescriptorKind::String
            | DescriptorKind::List
            | DescriptorKind::Map => Err(MarshalError::NotSerializable {
                class: class.name().into(),
            }),
        }
    }

    fn write_prefix(&mut self, tag: u8, unshared: bool) -> Result<()> {
        if unshared {
            self.write_u8(tags::UNSHARED)?;
        }
        self.write_u8(tag)
    }

    /// Gives `obj` its handle. A substituted original shares it.
    fn assign(&mut self, obj: ObjRef, alias: Option<ObjRef>, unshared: bool) {
        if unshared {
            let handle = self.m.instances.skip();
            log::trace!("unshared {obj} consumed handle {handle}");
            return;
        }
        let handle = self.m.instances.assign(obj);
        if let Some(original) = alias {
            self.m.instances.alias(original, handle);
        }
        log::trace!("assigned handle {handle} to {obj}");
    }

    /// Runs `f` with primitives framed into blocks, then ends the custom data.
    fn in_custom_data(&mut self, f: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        let saved = self.block.replace(Vec::new());
        let result = f(self).and_then(|()| self.flush_block());
        self.block = saved;
        result?;
        self.m.sink()?.write_u8(tags::END_BLOCK_DATA)
    }

    fn flush_block(&mut self) -> Result<()> {
        if let Some(block) = self.block.as_mut()
            && !block.is_empty()
        {
            self.m.write_block_data(block)?;
            block.clear();
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Fields

    fn write_fields(&mut self, obj: ObjRef, level: &ClassDescriptor) -> Result<()> {
        for field in level.fields() {
            let value = self
                .heap
                .slot(obj, field.slot())
                .cloned()
                .ok_or(MarshalError::InvalidReference(obj))?;
            self.write_field(field.name(), field.ty(), &value)?;
        }
        Ok(())
    }

    fn write_field(&mut self, name: &str, ty: FieldType, value: &Value) -> Result<()> {
        match (ty, value) {
            (FieldType::Bool, Value::Bool(v)) => self.write_bool(*v),
            (FieldType::Byte, Value::Byte(v)) => self.write_i8(*v),
            (FieldType::Char, Value::Char(v)) => self.write_char(*v),
            (FieldType::Short, Value::Short(v)) => self.write_i16(*v),
            (FieldType::Int, Value::Int(v)) => self.write_i32(*v),
            (FieldType::Long, Value::Long(v)) => self.write_i64(*v),
            (FieldType::Float, Value::Float(v)) => self.write_f32(*v),
            (FieldType::Double, Value::Double(v)) => self.write_f64(*v),
            (FieldType::Object, value) => self.write_value(value, false),
            _ => Err(MarshalError::InvalidField {
                field: name.into(),
                expected: ty,
            }),
        }
    }

    // -------------------------------------------------------------------------
    // Class descriptors

    fn write_class_desc(&mut self, class: &ClassRef) -> Result<()> {
        if let Some(handle) = self.m.classes.lookup(class) {
            self.write_u8(tags::REPEAT_CLASS)?;
            return self.write_varint(u64::from(handle));
        }

        if let Some(table) = self.m.config.class_table()
            && let Some(writer) = table.class_writer(class)
        {
            self.write_u8(tags::PREDEFINED_CLASS)?;
            writer.write_class(self, class)?;
            self.assign_class(class);
            return Ok(());
        }

        let resolver = self.m.config.class_resolver().clone();
        let descriptor = self.m.descriptors.describe(class);
        match descriptor.kind() {
            kind @ (DescriptorKind::Serializable | DescriptorKind::Record) => {
                let tag = if kind == DescriptorKind::Record {
                    tags::RECORD_CLASS
                } else {
                    tags::SERIALIZABLE_CLASS
                };
                self.write_u8(tag)?;
                self.write_utf(&resolver.class_name(class))?;
                self.write_i64(descriptor.serial_version_uid())?;
                self.write_u8(descriptor_flags(&descriptor))?;
                self.write_varint(descriptor.fields().len() as u64)?;
                for field in descriptor.fields() {
                    self.write_utf(field.name())?;
                    self.write_u8(field.ty().code())?;
                }
                resolver.annotate_class(self, class)?;

                let super_class = match kind {
                    DescriptorKind::Serializable => serializable_super(class).cloned(),
                    _ => None,
                };
                match super_class {
                    Some(super_class) => self.write_class_desc(&super_class)?,
                    None => self.write_u8(tags::NO_CLASS_DESC)?,
                }
            }
            DescriptorKind::Externalizable => {
                self.write_u8(tags::EXTERNALIZABLE_CLASS)?;
                self.write_utf(&resolver.class_name(class))?;
                self.write_i64(descriptor.serial_version_uid())?;
                resolver.annotate_class(self, class)?;
            }
            DescriptorKind::Enum => {
                self.write_u8(tags::ENUM_CLASS)?;
                self.write_utf(&resolver.class_name(class))?;
                resolver.annotate_class(self, class)?;
            }
            DescriptorKind::Array(element) => {
                self.write_u8(tags::ARRAY_CLASS)?;
                self.write_u8(element.code())?;
            }
            DescriptorKind::Proxy => {
                let interfaces = resolver.proxy_interfaces(class);
                self.write_u8(tags::PROXY_CLASS)?;
                self.write_varint(interfaces.len() as u64)?;
                for interface in &interfaces {
                    self.write_utf(interface)?;
                }
                resolver.annotate_proxy_class(self, class)?;
            }
            DescriptorKind::Plain
            | DescriptorKind::String
            | DescriptorKind::List
            | DescriptorKind::Map => {
                self.write_u8(tags::PLAIN_CLASS)?;
                self.write_utf(&resolver.class_name(class))?;
                resolver.annotate_class(self, class)?;
            }
        }

        self.assign_class(class);
        Ok(())
    }

    fn assign_class(&mut self, class: &ClassRef) {
        let handle = self.m.classes.assign(class);
        log::trace!("assigned class handle {handle} to `{}`", class.name());
    }

    fn write_externalizer_desc(
        &mut self,
        class: &ClassRef,
        handle: Option<u32>,
        externalizer: &Arc<dyn Externalizer>,
    ) -> Result<()> {
        if let Some(handle) = handle {
            self.write_u8(tags::REPEAT_CLASS)?;
            return self.write_varint(u64::from(handle));
        }

        self.write_u8(tags::EXTERNALIZER_CLASS)?;
        self.write_class_desc(class)?;
        self.write_utf(externalizer.id())?;
        externalizer.write_state(self)?;
        let handle = self.m.classes.assign_externalized(class, externalizer.clone());
        log::trace!(
            "assigned class handle {handle} to `{}` under externalizer `{}`",
            class.name(),
            externalizer.id()
        );
        Ok(())
    }
}

fn descriptor_flags(descriptor: &ClassDescriptor) -> u8 {
    let mut flags = 0;
    if descriptor.has_write_hook() {
        flags |= tags::FLAG_HOOK_DATA;
    }
    if descriptor.has_write_replace() {
        flags |= tags::FLAG_WRITE_REPLACE;
    }
    if descriptor.has_read_resolve() {
        flags |= tags::FLAG_READ_RESOLVE;
    }
    flags
}

/// Encodes the length and the fixed-width elements of a primitive array.
fn encode_primitive_array(data: &ArrayData, out: &mut Vec<u8>) -> Result<()> {
    out.write_varint(data.len() as u64)?;
    match data {
        ArrayData::Bool(v) => v.iter().try_for_each(|x| out.write_bool(*x)),
        ArrayData::Byte(v) => v.iter().try_for_each(|x| out.write_i8(*x)),
        ArrayData::Char(v) => v.iter().try_for_each(|x| out.write_char(*x)),
        ArrayData::Short(v) => v.iter().try_for_each(|x| out.write_i16(*x)),
        ArrayData::Int(v) => v.iter().try_for_each(|x| out.write_i32(*x)),
        ArrayData::Long(v) => v.iter().try_for_each(|x| out.write_i64(*x)),
        ArrayData::Float(v) => v.iter().try_for_each(|x| out.write_f32(*x)),
        ArrayData::Double(v) => v.iter().try_for_each(|x| out.write_f64(*x)),
        ArrayData::Object(_) => unreachable!("object arrays are written element by element"),
    }
}

// -----------------------------------------------------------------------------
// I/O surface

impl DataOutput for Writer<'_, '_> {
    #[inline]
    fn write_u8(&mut self, v: u8) -> Result<()> {
        self.write_bytes(&[v])
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let Some(block) = self.block.as_mut() else {
            return self.m.sink()?.write_bytes(bytes);
        };
        block.extend_from_slice(bytes);
        if block.len() >= MAX_BLOCK_SIZE {
            self.m.write_block_data(block)?;
            block.clear();
        }
        Ok(())
    }
}

impl ObjectOutput for Writer<'_, '_> {
    #[inline]
    fn heap(&self) -> &Heap {
        self.heap
    }

    #[inline]
    fn write_object(&mut self, value: &Value) -> Result<()> {
        self.write_value(value, false)
    }

    #[inline]
    fn write_object_unshared(&mut self, value: &Value) -> Result<()> {
        self.write_value(value, true)
    }
}

impl HookWriter for Writer<'_, '_> {
    fn write_default_fields(&mut self, this: ObjRef, level: &ClassDescriptor) -> Result<()> {
        self.flush_block()?;
        let saved = self.block.take();
        let result = self.write_fields(this, level);
        self.block = saved;
        result
    }
}
