use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use gw_marshal::class::{ClassInfo, ClassRef, ClassRegistry, FieldType};
use gw_marshal::io::{DataInput, DataOutput, ObjectInput, ObjectOutput};
use gw_marshal::model::{Heap, ObjRef, Value};
use gw_marshal::protocol::tags;
use gw_marshal::strategy::{Externalizer, ExternalizerFactory, ExternalizerRegistry, ObjectResolver};
use gw_marshal::{MarshalError, MarshallerFactory, MarshallingConfiguration, Result};

fn config(classes: &[&ClassRef]) -> MarshallingConfiguration {
    let mut registry = ClassRegistry::new();
    for class in classes {
        registry.register(class);
    }
    MarshallingConfiguration::new(Arc::new(registry))
}

fn obj(value: &Value) -> ObjRef {
    value.as_obj().unwrap()
}

fn str_field<'h>(heap: &'h Heap, obj: ObjRef, name: &str) -> Option<&'h str> {
    heap.str(heap.field(obj, name)?.as_obj()?)
}

// -----------------------------------------------------------------------------
// Custom field hooks

/// `app.Session` with a hook that appends a timestamp and a note.
fn session_class(read_extra: bool) -> ClassRef {
    let builder = ClassInfo::builder("app.Session")
        .serializable()
        .field("user", FieldType::Object)
        .transient_field("started", FieldType::Long)
        .transient_field("note", FieldType::Object)
        .write_object(|ctx| {
            ctx.default_write_object()?;
            let started = ctx.field("started").cloned().unwrap_or_default();
            ctx.write_i64(started.as_long().unwrap_or(0))?;
            let note = ctx.field("note").cloned().unwrap_or_default();
            ctx.write_object(&note)
        });

    if !read_extra {
        return builder.read_object(|ctx| ctx.default_read_object()).build();
    }
    builder
        .read_object(|ctx| {
            ctx.default_read_object()?;
            let started = ctx.read_i64()?;
            ctx.set_field("started", Value::Long(started));
            let note = ctx.read_object()?;
            ctx.set_field("note", note);
            Ok(())
        })
        .build()
}

fn session_graph(class: &ClassRef) -> (Heap, Value) {
    let mut heap = Heap::new();
    let s = heap.instantiate(class);
    let user = heap.alloc_str("ada");
    let note = heap.alloc_str("remember me");
    heap.set_field(s, "user", Value::Ref(user));
    heap.set_field(s, "started", Value::Long(1_700_000_000));
    heap.set_field(s, "note", Value::Ref(note));
    (heap, Value::Ref(s))
}

#[test]
fn hooks_write_extra_data() {
    let class = session_class(true);
    let factory = MarshallerFactory::new(config(&[&class]));
    let (mut heap, session) = session_graph(&class);

    let bytes = factory.marshal(&mut heap, &[session.clone(), Value::Int(7)]).unwrap();
    let mut copy = Heap::new();
    let read = factory.unmarshal(&mut copy, &bytes, 2).unwrap();

    let s = obj(&read[0]);
    assert_eq!(str_field(&copy, s, "user"), Some("ada"));
    assert_eq!(copy.field(s, "started"), Some(&Value::Long(1_700_000_000)));
    assert_eq!(str_field(&copy, s, "note"), Some("remember me"));
    assert_eq!(read[1], Value::Int(7));
}

#[test]
fn unread_custom_data_is_skipped() {
    let writer_class = session_class(true);
    let reader_class = session_class(false);
    let (mut heap, session) = session_graph(&writer_class);

    // The shared user string follows the custom data as a back reference,
    // so the skipped note must still consume its handle.
    let user = heap.field(obj(&session), "user").cloned().unwrap();
    let bytes = MarshallerFactory::new(config(&[&writer_class]))
        .marshal(&mut heap, &[session, user])
        .unwrap();

    let mut copy = Heap::new();
    let read = MarshallerFactory::new(config(&[&reader_class]))
        .unmarshal(&mut copy, &bytes, 2)
        .unwrap();

    let s = obj(&read[0]);
    assert_eq!(copy.field(s, "started"), Some(&Value::Long(0)));
    assert_eq!(copy.field(s, "note"), Some(&Value::Null));
    assert_eq!(copy.field(s, "user"), Some(&read[1]));
}

#[test]
fn hook_data_without_local_hook() {
    let writer_class = session_class(true);
    let reader_class = ClassInfo::builder("app.Session")
        .serializable()
        .field("user", FieldType::Object)
        .transient_field("started", FieldType::Long)
        .transient_field("note", FieldType::Object)
        .build();
    let (mut heap, session) = session_graph(&writer_class);

    let bytes = MarshallerFactory::new(config(&[&writer_class]))
        .marshal(&mut heap, &[session, Value::Bool(true)])
        .unwrap();
    let mut copy = Heap::new();
    let read = MarshallerFactory::new(config(&[&reader_class]))
        .unmarshal(&mut copy, &bytes, 2)
        .unwrap();

    assert_eq!(str_field(&copy, obj(&read[0]), "user"), Some("ada"));
    assert_eq!(read[1], Value::Bool(true));
}

#[test]
fn reading_past_custom_data() {
    let writer_class = ClassInfo::builder("app.Counter")
        .serializable()
        .field("n", FieldType::Int)
        .write_object(|ctx| {
            ctx.default_write_object()?;
            ctx.write_i32(1)
        })
        .build();
    let greedy = ClassInfo::builder("app.Counter")
        .serializable()
        .field("n", FieldType::Int)
        .read_object(|ctx| {
            ctx.default_read_object()?;
            ctx.read_i32()?;
            ctx.read_i32()?;
            Ok(())
        })
        .build();

    let mut heap = Heap::new();
    let c = Value::Ref(heap.instantiate(&writer_class));
    let bytes = MarshallerFactory::new(config(&[&writer_class]))
        .marshal(&mut heap, &[c])
        .unwrap();

    let err = MarshallerFactory::new(config(&[&greedy]))
        .unmarshal(&mut Heap::new(), &bytes, 1)
        .unwrap_err();
    assert!(matches!(err, MarshalError::EndOfCustomData));
}

// -----------------------------------------------------------------------------
// Substitution

#[test]
fn class_write_replace() {
    let secret = ClassInfo::builder("app.Secret")
        .serializable()
        .field("value", FieldType::Object)
        .write_replace(|heap, _| Value::Ref(heap.alloc_str("redacted")))
        .build();
    let factory = MarshallerFactory::new(config(&[&secret]));

    let mut heap = Heap::new();
    let s = heap.instantiate(&secret);
    let list = heap.alloc_list(vec![Value::Ref(s), Value::Ref(s)]);
    let bytes = factory.marshal(&mut heap, &[Value::Ref(list)]).unwrap();

    let mut copy = Heap::new();
    let read = factory.unmarshal(&mut copy, &bytes, 1).unwrap();
    let items = copy.list(obj(&read[0])).unwrap();
    assert_eq!(items[0], items[1]);
    assert_eq!(copy.str(obj(&items[0])), Some("redacted"));
}

#[test]
fn class_read_resolve() {
    let money = ClassInfo::builder("bank.Money")
        .serializable()
        .field("cents", FieldType::Long)
        .read_resolve(|heap, this| heap.field(this, "cents").cloned().unwrap_or_default())
        .build();
    let factory = MarshallerFactory::new(config(&[&money]));

    let mut heap = Heap::new();
    let m = heap.instantiate(&money);
    heap.set_field(m, "cents", Value::Long(250));
    let bytes = factory
        .marshal(&mut heap, &[Value::Ref(m), Value::Ref(m)])
        .unwrap();

    let read = factory.unmarshal(&mut Heap::new(), &bytes, 2).unwrap();
    assert_eq!(read, [Value::Long(250), Value::Long(250)]);
}

/// Replaces the string "password" on write and upper-cases strings on read.
struct Scrubber;

impl ObjectResolver for Scrubber {
    fn write_replace(&self, heap: &mut Heap, value: Value) -> Value {
        match value.as_obj().and_then(|obj| heap.str(obj)) {
            Some("password") => Value::Ref(heap.alloc_str("********")),
            _ => value,
        }
    }

    fn read_resolve(&self, heap: &mut Heap, value: Value) -> Value {
        match value.as_obj().and_then(|obj| heap.str(obj)) {
            Some(s) if s.chars().any(char::is_lowercase) => {
                let upper = s.to_uppercase();
                Value::Ref(heap.alloc_str(upper))
            }
            _ => value,
        }
    }
}

#[test]
fn object_resolver() {
    let factory =
        MarshallerFactory::new(config(&[]).with_object_resolver(Arc::new(Scrubber)));

    let mut heap = Heap::new();
    let password = Value::Ref(heap.alloc_str("password"));
    let name = Value::Ref(heap.alloc_str("ada"));
    let list = heap.alloc_list(vec![password.clone(), name.clone(), password, name]);
    let bytes = factory.marshal(&mut heap, &[Value::Ref(list)]).unwrap();

    let mut copy = Heap::new();
    let read = factory.unmarshal(&mut copy, &bytes, 1).unwrap();
    let items = copy.list(obj(&read[0])).unwrap().to_vec();
    assert_eq!(items[0], items[2]);
    assert_eq!(items[1], items[3]);
    assert_eq!(copy.str(obj(&items[0])), Some("********"));
    assert_eq!(copy.str(obj(&items[1])), Some("ADA"));
}

// -----------------------------------------------------------------------------
// Externalization

fn write_xy(this: ObjRef, output: &mut dyn ObjectOutput) -> Result<()> {
    let x = output.heap().field(this, "x").and_then(Value::as_int).unwrap_or(0);
    let y = output.heap().field(this, "y").and_then(Value::as_int).unwrap_or(0);
    output.write_i32(x)?;
    output.write_i32(y)
}

fn read_xy(this: ObjRef, input: &mut dyn ObjectInput) -> Result<()> {
    let x = input.read_i32()?;
    let y = input.read_i32()?;
    input.heap_mut().set_field(this, "x", Value::Int(x));
    input.heap_mut().set_field(this, "y", Value::Int(y));
    Ok(())
}

#[test]
fn externalizable_class() {
    let point = ClassInfo::builder("geo.Point")
        .field("x", FieldType::Int)
        .field("y", FieldType::Int)
        .field("cache", FieldType::Object)
        .externalizable(write_xy, read_xy)
        .build();
    let factory = MarshallerFactory::new(config(&[&point]));

    let mut heap = Heap::new();
    let p = heap.instantiate(&point);
    let q = heap.instantiate(&point);
    let cache = heap.alloc_str("not written");
    heap.set_field(p, "x", Value::Int(3));
    heap.set_field(p, "y", Value::Int(-4));
    heap.set_field(p, "cache", Value::Ref(cache));
    heap.set_field(q, "x", Value::Int(10));

    let values = [Value::Ref(p), Value::Ref(q), Value::Ref(p)];
    let bytes = factory.marshal(&mut heap, &values).unwrap();
    let mut copy = Heap::new();
    let read = factory.unmarshal(&mut copy, &bytes, 3).unwrap();

    assert_eq!(read[0], read[2]);
    assert_eq!(copy.field(obj(&read[0]), "y"), Some(&Value::Int(-4)));
    assert_eq!(copy.field(obj(&read[0]), "cache"), Some(&Value::Null));
    assert_eq!(copy.field(obj(&read[1]), "x"), Some(&Value::Int(10)));
}

/// Writes a vector's coordinates, scaled by a factor announced once per class.
struct ScaledVector {
    scale: i32,
    reads: Arc<AtomicUsize>,
}

impl Externalizer for ScaledVector {
    fn id(&self) -> &str {
        "scaled-vector"
    }

    fn write_state(&self, output: &mut dyn DataOutput) -> Result<()> {
        output.write_i32(self.scale)
    }

    fn write_external(&self, this: ObjRef, output: &mut dyn ObjectOutput) -> Result<()> {
        let x = output.heap().field(this, "x").and_then(Value::as_int).unwrap_or(0);
        output.write_i32(x * self.scale)?;
        let tag = output.heap().field(this, "tag").cloned().unwrap_or_default();
        output.write_object(&tag)
    }

    fn read_external(&self, this: ObjRef, input: &mut dyn ObjectInput) -> Result<()> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let x = input.read_i32()? / self.scale;
        input.heap_mut().set_field(this, "x", Value::Int(x));
        let tag = input.read_object()?;
        input.heap_mut().set_field(this, "tag", tag);
        Ok(())
    }
}

struct ScaledFactory {
    class: ClassRef,
    reads: Arc<AtomicUsize>,
}

impl ExternalizerFactory for ScaledFactory {
    fn externalizer(&self, heap: &Heap, obj: ObjRef) -> Option<Arc<dyn Externalizer>> {
        (heap.class_of(obj) == Some(&self.class)).then(|| {
            Arc::new(ScaledVector {
                scale: 3,
                reads: self.reads.clone(),
            }) as Arc<dyn Externalizer>
        })
    }

    fn read_externalizer(&self, id: &str, input: &mut dyn DataInput) -> Result<Arc<dyn Externalizer>> {
        assert_eq!(id, "scaled-vector");
        let scale = input.read_i32()?;
        Ok(Arc::new(ScaledVector {
            scale,
            reads: self.reads.clone(),
        }))
    }
}

#[test]
fn externalizer_with_state() {
    // Not serializable on its own: only the externalizer can write it.
    let vector = ClassInfo::builder("math.Vector")
        .field("x", FieldType::Int)
        .field("tag", FieldType::Object)
        .build();
    let reads = Arc::new(AtomicUsize::new(0));
    let factory = MarshallerFactory::new(config(&[&vector]).with_externalizer_factory(Arc::new(
        ScaledFactory {
            class: vector.clone(),
            reads: reads.clone(),
        },
    )));

    let mut heap = Heap::new();
    let tag = heap.alloc_str("v");
    let a = heap.instantiate(&vector);
    let b = heap.instantiate(&vector);
    heap.set_field(a, "x", Value::Int(2));
    heap.set_field(a, "tag", Value::Ref(tag));
    heap.set_field(b, "x", Value::Int(5));
    heap.set_field(b, "tag", Value::Ref(tag));

    let bytes = factory
        .marshal(&mut heap, &[Value::Ref(a), Value::Ref(b), Value::Ref(a)])
        .unwrap();
    let mut copy = Heap::new();
    let read = factory.unmarshal(&mut copy, &bytes, 3).unwrap();

    assert_eq!(reads.load(Ordering::Relaxed), 2);
    assert_eq!(read[0], read[2]);
    assert_eq!(copy.field(obj(&read[0]), "x"), Some(&Value::Int(2)));
    assert_eq!(copy.field(obj(&read[1]), "x"), Some(&Value::Int(5)));
    assert_eq!(
        copy.field(obj(&read[0]), "tag"),
        copy.field(obj(&read[1]), "tag")
    );
}

/// Picks the scale from the parity of `x`, so instances disagree.
struct ParityFactory {
    class: ClassRef,
    asked: AtomicUsize,
    reads: Arc<AtomicUsize>,
}

impl ExternalizerFactory for ParityFactory {
    fn externalizer(&self, heap: &Heap, obj: ObjRef) -> Option<Arc<dyn Externalizer>> {
        if heap.class_of(obj) != Some(&self.class) {
            return None;
        }
        self.asked.fetch_add(1, Ordering::Relaxed);
        let x = heap.field(obj, "x").and_then(Value::as_int).unwrap_or(0);
        Some(Arc::new(ScaledVector {
            scale: if x % 2 == 0 { 2 } else { 3 },
            reads: self.reads.clone(),
        }))
    }

    fn read_externalizer(&self, _id: &str, input: &mut dyn DataInput) -> Result<Arc<dyn Externalizer>> {
        Ok(Arc::new(ScaledVector {
            scale: input.read_i32()?,
            reads: self.reads.clone(),
        }))
    }
}

#[test]
fn externalizer_chosen_once_per_class() {
    let vector = ClassInfo::builder("math.Vector")
        .field("x", FieldType::Int)
        .field("tag", FieldType::Object)
        .build();
    let parity = Arc::new(ParityFactory {
        class: vector.clone(),
        asked: AtomicUsize::new(0),
        reads: Arc::new(AtomicUsize::new(0)),
    });
    let factory = MarshallerFactory::new(config(&[&vector]).with_externalizer_factory(parity.clone()));

    let mut heap = Heap::new();
    let a = heap.instantiate(&vector);
    let b = heap.instantiate(&vector);
    heap.set_field(a, "x", Value::Int(10));
    heap.set_field(b, "x", Value::Int(9));

    let bytes = factory.marshal(&mut heap, &[Value::Ref(a), Value::Ref(b)]).unwrap();
    assert_eq!(parity.asked.load(Ordering::Relaxed), 1);

    let mut copy = Heap::new();
    let read = factory.unmarshal(&mut copy, &bytes, 2).unwrap();
    assert_eq!(copy.field(obj(&read[0]), "x"), Some(&Value::Int(10)));
    assert_eq!(copy.field(obj(&read[1]), "x"), Some(&Value::Int(9)));

    // After a class cache clear the factory is asked again.
    let mut out = Vec::new();
    let mut marshaller = factory.create_marshaller();
    marshaller.start(&mut out).unwrap();
    marshaller.write_object(&mut heap, &Value::Ref(a)).unwrap();
    marshaller.clear_class_cache().unwrap();
    marshaller.write_object(&mut heap, &Value::Ref(b)).unwrap();
    marshaller.finish().unwrap();
    drop(marshaller);
    assert_eq!(parity.asked.load(Ordering::Relaxed), 3);

    let mut copy = Heap::new();
    let read = factory.unmarshal(&mut copy, &out, 2).unwrap();
    assert_eq!(copy.field(obj(&read[1]), "x"), Some(&Value::Int(9)));
}

#[test]
fn proxies_bypass_externalizers() {
    struct Refuse;

    impl Externalizer for Refuse {
        fn id(&self) -> &str {
            "refuse"
        }

        fn write_external(&self, _this: ObjRef, _output: &mut dyn ObjectOutput) -> Result<()> {
            Err(MarshalError::custom("proxy sent to an externalizer"))
        }

        fn read_external(&self, _this: ObjRef, _input: &mut dyn ObjectInput) -> Result<()> {
            Err(MarshalError::custom("proxy sent to an externalizer"))
        }
    }

    let greeter = ClassInfo::builder("svc.Greeter").interface().build();
    let proxy = ClassInfo::builder("svc.$Proxy0")
        .proxy(["svc.Greeter"])
        .build();
    let mut externalizers = ExternalizerRegistry::new();
    externalizers.register("svc.$Proxy0", Arc::new(Refuse));
    let factory = MarshallerFactory::new(
        config(&[&greeter, &proxy]).with_externalizer_factory(Arc::new(externalizers)),
    );

    let mut heap = Heap::new();
    let p = heap.alloc_proxy(&proxy, Value::Null);
    let bytes = factory.marshal(&mut heap, &[Value::Ref(p)]).unwrap();
    assert_eq!(bytes[1], tags::PROXY_OBJECT);

    let mut copy = Heap::new();
    let read = factory.unmarshal(&mut copy, &bytes, 1).unwrap();
    assert_eq!(copy.class_of(obj(&read[0])), Some(&proxy));
}

#[test]
fn externalizer_registry() {
    struct Pair;

    impl Externalizer for Pair {
        fn id(&self) -> &str {
            "pair"
        }

        fn write_external(&self, this: ObjRef, output: &mut dyn ObjectOutput) -> Result<()> {
            write_xy(this, output)
        }

        fn read_external(&self, this: ObjRef, input: &mut dyn ObjectInput) -> Result<()> {
            read_xy(this, input)
        }
    }

    let pair = ClassInfo::builder("math.Pair")
        .serializable()
        .field("x", FieldType::Int)
        .field("y", FieldType::Int)
        .build();
    let mut externalizers = ExternalizerRegistry::new();
    externalizers.register("math.Pair", Arc::new(Pair));
    let factory =
        MarshallerFactory::new(config(&[&pair]).with_externalizer_factory(Arc::new(externalizers)));

    let mut heap = Heap::new();
    let p = heap.instantiate(&pair);
    heap.set_field(p, "x", Value::Int(1));
    heap.set_field(p, "y", Value::Int(2));

    let bytes = factory.marshal(&mut heap, &[Value::Ref(p)]).unwrap();
    let mut copy = Heap::new();
    let read = factory.unmarshal(&mut copy, &bytes, 1).unwrap();
    assert!(heap.graph_eq(&Value::Ref(p), &copy, &read[0]));

    // Without the factory the reader cannot rebuild the externalizer.
    let err = MarshallerFactory::new(config(&[&pair]))
        .unmarshal(&mut Heap::new(), &bytes, 1)
        .unwrap_err();
    assert!(matches!(err, MarshalError::MissingStrategy(_)));
}
