use std::sync::Arc;

use gw_marshal::class::{ClassInfo, ClassRef, ClassRegistry, FieldType};
use gw_marshal::model::{ArrayData, Heap, ObjRef, ObjectBody, Value};
use gw_marshal::{
    Corruption, MarshalError, Marshaller, MarshallerFactory, MarshallingConfiguration, Unmarshaller,
};

fn factory(classes: &[&ClassRef]) -> MarshallerFactory {
    let mut registry = ClassRegistry::new();
    for class in classes {
        registry.register(class);
    }
    MarshallerFactory::new(MarshallingConfiguration::new(Arc::new(registry)))
}

/// Writes `values` in one session and reads them back into a fresh heap.
fn round_trip(factory: &MarshallerFactory, heap: &mut Heap, values: &[Value]) -> (Heap, Vec<Value>) {
    let bytes = factory.marshal(heap, values).unwrap();
    let mut copy = Heap::new();
    let read = factory.unmarshal(&mut copy, &bytes, values.len()).unwrap();
    (copy, read)
}

fn node_class() -> ClassRef {
    ClassInfo::builder("graph.Node")
        .serializable()
        .field("id", FieldType::Int)
        .field("next", FieldType::Object)
        .build()
}

fn obj(value: &Value) -> ObjRef {
    value.as_obj().unwrap()
}

// -----------------------------------------------------------------------------
// Values

#[test]
fn boxed_primitives() {
    let factory = factory(&[]);
    let values = [
        Value::Null,
        Value::Bool(true),
        Value::Bool(false),
        Value::Byte(-7),
        Value::Char('λ'),
        Value::Short(-12_000),
        Value::Int(i32::MIN),
        Value::Long(i64::MAX),
        Value::Float(1.5),
        Value::Double(-0.25),
    ];

    let (copy, read) = round_trip(&factory, &mut Heap::new(), &values);
    assert_eq!(read, values);
    assert!(copy.is_empty());
}

#[test]
fn primitive_arrays() {
    let factory = factory(&[]);
    let mut heap = Heap::new();
    let arrays = [
        ArrayData::Bool(vec![true, false, true].into()),
        ArrayData::Byte(vec![-1, 0, 1].into()),
        ArrayData::Char(vec!['a', 'é', '中'].into()),
        ArrayData::Short(vec![i16::MIN, i16::MAX].into()),
        ArrayData::Int(vec![1, 2, 3, 4].into()),
        ArrayData::Long(vec![].into()),
        ArrayData::Float(vec![0.5, -2.0].into()),
        ArrayData::Double(vec![1e300].into()),
    ];
    let values: Vec<Value> = arrays
        .iter()
        .map(|data| Value::Ref(heap.alloc_array(data.clone())))
        .collect();

    let (copy, read) = round_trip(&factory, &mut heap, &values);
    for (data, value) in arrays.iter().zip(&read) {
        assert_eq!(copy.array(obj(value)), Some(data));
    }
}

#[test]
fn object_array_shares_elements() {
    let factory = factory(&[]);
    let mut heap = Heap::new();
    let word = Value::Ref(heap.alloc_str("twice"));
    let elements = vec![word.clone(), word, Value::Null, Value::Int(5)];
    let array = Value::Ref(heap.alloc_array(ArrayData::Object(elements.into())));

    let (copy, read) = round_trip(&factory, &mut heap, &[array.clone()]);
    assert!(heap.graph_eq(&array, &copy, &read[0]));

    let Some(ArrayData::Object(elements)) = copy.array(obj(&read[0])) else {
        panic!("expected an object array");
    };
    assert_eq!(elements[0], elements[1]);
    assert_eq!(copy.str(obj(&elements[0])), Some("twice"));
    assert_eq!(elements[3], Value::Int(5));
}

#[test]
fn map_written_twice() {
    let factory = factory(&[]);
    let mut heap = Heap::new();
    let mut entry = |k: &str, v: &str| (Value::Ref(heap.alloc_str(k)), Value::Ref(heap.alloc_str(v)));
    let entries = vec![entry("k1", "v1"), entry("k2", "v2")];
    let map = Value::Ref(heap.alloc_map(entries));

    let once = factory.marshal(&mut heap, &[map.clone()]).unwrap();
    let twice = factory.marshal(&mut heap, &[map.clone(), map]).unwrap();
    // The second write is a REPEAT_OBJECT tag and a one-byte handle.
    assert_eq!(twice.len(), once.len() + 2);

    let mut copy = Heap::new();
    let read = factory.unmarshal(&mut copy, &twice, 2).unwrap();
    assert_eq!(read[0], read[1]);

    let decoded: Vec<(&str, &str)> = copy
        .map(obj(&read[0]))
        .unwrap()
        .iter()
        .map(|(k, v)| (copy.str(obj(k)).unwrap(), copy.str(obj(v)).unwrap()))
        .collect();
    assert_eq!(decoded, [("k1", "v1"), ("k2", "v2")]);
}

#[test]
fn nested_lists() {
    let factory = factory(&[]);
    let mut heap = Heap::new();
    let inner = heap.alloc_list(vec![Value::Int(1), Value::Bool(true)]);
    let outer = heap.alloc_list(vec![Value::Ref(inner), Value::Null, Value::Ref(inner)]);
    // A list containing itself.
    if let Some(ObjectBody::List(items)) = heap.get_mut(outer).map(|o| &mut o.body) {
        items.push(Value::Ref(outer));
    }

    let (copy, read) = round_trip(&factory, &mut heap, &[Value::Ref(outer)]);
    assert!(heap.graph_eq(&Value::Ref(outer), &copy, &read[0]));
    let items = copy.list(obj(&read[0])).unwrap();
    assert_eq!(items[3], read[0]);
    assert_eq!(items[0], items[2]);
}

#[test]
fn records() {
    let point = ClassInfo::builder("geo.Point")
        .record()
        .field("x", FieldType::Int)
        .field("y", FieldType::Int)
        .field("label", FieldType::Object)
        .build();
    let factory = factory(&[&point]);

    let mut heap = Heap::new();
    let p = heap.instantiate(&point);
    let label = heap.alloc_str("origin");
    heap.set_field(p, "x", Value::Int(-3));
    heap.set_field(p, "y", Value::Int(9));
    heap.set_field(p, "label", Value::Ref(label));

    let (copy, read) = round_trip(&factory, &mut heap, &[Value::Ref(p), Value::Ref(p)]);
    assert!(heap.graph_eq(&Value::Ref(p), &copy, &read[0]));
    assert_eq!(read[0], read[1]);
    assert_eq!(copy.field(obj(&read[0]), "y"), Some(&Value::Int(9)));
}

#[test]
fn record_referring_to_itself_is_rejected() {
    let cell = ClassInfo::builder("a.Cell")
        .record()
        .field("me", FieldType::Object)
        .build();
    let factory = factory(&[&cell]);

    let mut heap = Heap::new();
    let c = heap.instantiate(&cell);
    heap.set_field(c, "me", Value::Ref(c));
    let bytes = factory.marshal(&mut heap, &[Value::Ref(c)]).unwrap();

    let mut copy = Heap::new();
    let err = factory.unmarshal(&mut copy, &bytes, 1).unwrap_err();
    assert!(matches!(
        err,
        MarshalError::StreamCorrupted(Corruption::UnboundHandle(0))
    ));
    assert!(copy.is_empty());
}

#[test]
fn enums_are_canonical() {
    let color = ClassInfo::builder("paint.Color")
        .enumeration(["Red", "Green", "Blue"])
        .build();
    let factory = factory(&[&color]);

    let mut heap = Heap::new();
    let red_a = heap.alloc_enum(&color, "Red");
    let red_b = heap.alloc_enum(&color, "Red");
    let green = heap.alloc_enum(&color, "Green");
    let list = heap.alloc_list(vec![Value::Ref(red_a), Value::Ref(red_b), Value::Ref(green)]);

    let (copy, read) = round_trip(&factory, &mut heap, &[Value::Ref(list), Value::Ref(red_b)]);
    let items = copy.list(obj(&read[0])).unwrap();
    assert_eq!(items[0], items[1]);
    assert_ne!(items[0], items[2]);
    assert_eq!(read[1], items[0]);
    assert_eq!(copy.enum_constant(obj(&items[2])), Some("Green"));
}

#[test]
fn unknown_enum_constant() {
    let writer_side = ClassInfo::builder("paint.Color")
        .enumeration(["Red", "Green"])
        .build();
    let reader_side = ClassInfo::builder("paint.Color").enumeration(["Red"]).build();

    let mut heap = Heap::new();
    let green = heap.alloc_enum(&writer_side, "Green");
    let bytes = factory(&[&writer_side])
        .marshal(&mut heap, &[Value::Ref(green)])
        .unwrap();

    let err = factory(&[&reader_side])
        .unmarshal(&mut Heap::new(), &bytes, 1)
        .unwrap_err();
    assert!(matches!(
        err,
        MarshalError::StreamCorrupted(Corruption::UnknownEnumConstant { .. })
    ));
}

#[test]
fn proxies_and_class_values() {
    let greeter = ClassInfo::builder("svc.Greeter").interface().build();
    let proxy = ClassInfo::builder("svc.$Proxy0")
        .proxy(["svc.Greeter"])
        .build();
    let handler = ClassInfo::builder("svc.Handler")
        .serializable()
        .field("target", FieldType::Object)
        .build();
    let factory = factory(&[&greeter, &proxy, &handler]);

    let mut heap = Heap::new();
    let h = heap.instantiate(&handler);
    let p = heap.alloc_proxy(&proxy, Value::Ref(h));
    heap.set_field(h, "target", Value::Ref(p));

    let values = [
        Value::Ref(p),
        Value::Class(greeter.clone()),
        Value::Class(ClassRef::string()),
    ];
    let (copy, read) = round_trip(&factory, &mut heap, &values);

    let p2 = obj(&read[0]);
    assert_eq!(copy.class_of(p2), Some(&proxy));
    assert!(heap.graph_eq(&values[0], &copy, &read[0]));
    assert_eq!(read[1], Value::Class(greeter));
    assert_eq!(read[2], Value::Class(ClassRef::string()));
}

// -----------------------------------------------------------------------------
// Identity

#[test]
fn cycles_resolve_by_identity() {
    let node = node_class();
    let factory = factory(&[&node]);

    for len in [1, 2, 5] {
        let mut heap = Heap::new();
        let nodes: Vec<ObjRef> = (0..len).map(|_| heap.instantiate(&node)).collect();
        for (i, n) in nodes.iter().enumerate() {
            heap.set_field(*n, "id", Value::Int(i as i32));
            heap.set_field(*n, "next", Value::Ref(nodes[(i + 1) % len]));
        }

        let (copy, read) = round_trip(&factory, &mut heap, &[Value::Ref(nodes[0])]);
        assert_eq!(copy.len(), len);

        let start = obj(&read[0]);
        let mut cursor = start;
        for i in 0..len {
            assert_eq!(copy.field(cursor, "id"), Some(&Value::Int(i as i32)));
            cursor = obj(copy.field(cursor, "next").unwrap());
        }
        assert_eq!(cursor, start);
    }
}

#[test]
fn shared_and_unshared_writes() {
    let node = node_class();
    let config = Arc::new(MarshallingConfiguration::new(Arc::new({
        let mut registry = ClassRegistry::new();
        registry.register(&node);
        registry
    })));

    let mut heap = Heap::new();
    let n = Value::Ref(heap.instantiate(&node));

    let mut bytes = Vec::new();
    let mut marshaller = Marshaller::new(config.clone());
    marshaller.start(&mut bytes).unwrap();
    marshaller.write_object(&mut heap, &n).unwrap();
    marshaller.write_object_unshared(&mut heap, &n).unwrap();
    marshaller.write_object(&mut heap, &n).unwrap();
    marshaller.finish().unwrap();
    drop(marshaller);

    let mut copy = Heap::new();
    let mut unmarshaller = Unmarshaller::new(config);
    unmarshaller.start(&bytes[..]).unwrap();
    let first = unmarshaller.read_object(&mut copy).unwrap();
    let fresh = unmarshaller.read_object_unshared(&mut copy).unwrap();
    let again = unmarshaller.read_object(&mut copy).unwrap();
    unmarshaller.finish().unwrap();

    assert_eq!(first, again);
    assert_ne!(first, fresh);
    assert_eq!(copy.len(), 2);
}

#[test]
fn unshared_handles_cannot_be_referenced() {
    use gw_marshal::protocol::{PROTOCOL_VERSION, tags};

    let factory = factory(&[]);
    // An unshared string, then a back reference to its handle.
    let bytes = [
        PROTOCOL_VERSION,
        tags::UNSHARED,
        tags::STRING,
        1,
        b'a',
        tags::REPEAT_OBJECT,
        0,
    ];
    let err = factory.unmarshal(&mut Heap::new(), &bytes, 2).unwrap_err();
    assert!(matches!(
        err,
        MarshalError::StreamCorrupted(Corruption::UnsharedHandle(0))
    ));

    // A shared string read back as unshared.
    let mut heap = Heap::new();
    let s = Value::Ref(heap.alloc_str("a"));
    let bytes = factory.marshal(&mut heap, &[s.clone(), s]).unwrap();

    let config = factory.configuration().clone();
    let mut unmarshaller = Unmarshaller::new(config);
    unmarshaller.start(&bytes[..]).unwrap();
    let mut copy = Heap::new();
    unmarshaller.read_object(&mut copy).unwrap();
    assert!(matches!(
        unmarshaller.read_object_unshared(&mut copy),
        Err(MarshalError::StreamCorrupted(Corruption::BackReferenceAsUnshared(0)))
    ));
}

#[test]
fn enclosing_instance_written_twice() {
    let outer = ClassInfo::builder("app.Outer")
        .serializable()
        .field("name", FieldType::Object)
        .build();
    let inner = ClassInfo::builder("app.Outer$Inner")
        .serializable()
        .field("this$0", FieldType::Object)
        .field("n", FieldType::Int)
        .build();
    let factory = factory(&[&outer, &inner]);

    let mut heap = Heap::new();
    let o = heap.instantiate(&outer);
    let a = heap.instantiate(&inner);
    let b = heap.instantiate(&inner);
    heap.set_field(a, "this$0", Value::Ref(o));
    heap.set_field(b, "this$0", Value::Ref(o));
    heap.set_field(b, "n", Value::Int(1));

    let (copy, read) = round_trip(&factory, &mut heap, &[Value::Ref(a), Value::Ref(b)]);
    let outer_a = copy.field(obj(&read[0]), "this$0").unwrap();
    let outer_b = copy.field(obj(&read[1]), "this$0").unwrap();
    assert_eq!(outer_a, outer_b);
    assert_eq!(copy.class_of(obj(outer_a)).map(|c| c.name()), Some("app.Outer"));
}

#[test]
fn superclass_levels() {
    // A non-serializable base contributes no fields to the stream.
    let base = ClassInfo::builder("zoo.Thing")
        .field("secret", FieldType::Int)
        .build();
    let animal = ClassInfo::builder("zoo.Animal")
        .serializable()
        .extends(&base)
        .field("name", FieldType::Object)
        .build();
    let cat = ClassInfo::builder("zoo.Cat")
        .serializable()
        .extends(&animal)
        .field("lives", FieldType::Int)
        .transient_field("mood", FieldType::Object)
        .build();
    let factory = factory(&[&cat]);

    let mut heap = Heap::new();
    let c = heap.instantiate(&cat);
    let name = heap.alloc_str("Tom");
    let mood = heap.alloc_str("grumpy");
    heap.set_field(c, "secret", Value::Int(42));
    heap.set_field(c, "name", Value::Ref(name));
    heap.set_field(c, "lives", Value::Int(9));
    heap.set_field(c, "mood", Value::Ref(mood));

    let (copy, read) = round_trip(&factory, &mut heap, &[Value::Ref(c)]);
    let c2 = obj(&read[0]);
    assert_eq!(copy.field(c2, "secret"), Some(&Value::Int(0)));
    assert_eq!(copy.field(c2, "lives"), Some(&Value::Int(9)));
    assert_eq!(copy.field(c2, "mood"), Some(&Value::Null));
    assert_eq!(copy.str(obj(copy.field(c2, "name").unwrap())), Some("Tom"));
}

#[test]
fn not_serializable() {
    let plain = ClassInfo::builder("app.Connection")
        .field("fd", FieldType::Int)
        .build();
    let holder = ClassInfo::builder("app.Holder")
        .serializable()
        .field("conn", FieldType::Object)
        .build();
    let factory = factory(&[&plain, &holder]);

    let mut heap = Heap::new();
    let conn = heap.instantiate(&plain);
    let h = heap.instantiate(&holder);
    heap.set_field(h, "conn", Value::Ref(conn));

    let err = factory.marshal(&mut heap, &[Value::Ref(h)]).unwrap_err();
    assert!(matches!(
        &err,
        MarshalError::NotSerializable { class } if class == "app.Connection"
    ));
}
