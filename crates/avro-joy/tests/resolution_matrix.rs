use std::thread;

use avro_joy::{
    build_resolver, decode, decode_resolved, decode_resolved_json, encode, read_datum, AvroError,
    AvroValue, BinaryDecoder, Decoder, Reader, Schema,
};

fn parse(text: &str) -> Schema {
    Schema::parse_str(text).unwrap()
}

fn resolve(writer: &Schema, reader: &Schema, value: &AvroValue) -> avro_joy::Result<AvroValue> {
    let bytes = encode(value, writer, Vec::new()).unwrap();
    let resolver = build_resolver(writer, reader).unwrap();
    decode_resolved(&resolver, Reader::new(&bytes))
}

fn record(fields: &[(&str, AvroValue)]) -> AvroValue {
    AvroValue::Record(
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
    )
}

#[test]
fn resolving_a_schema_against_itself_is_plain_decoding() {
    let schema = parse(
        r#"{"type":"record","name":"R","fields":[
            {"name":"id","type":"long"},
            {"name":"tags","type":{"type":"array","items":"string"}},
            {"name":"kind","type":{"type":"enum","name":"K","symbols":["A","B"]}},
            {"name":"extra","type":["null",{"type":"map","values":"double"}]},
            {"name":"hash","type":{"type":"fixed","name":"H","size":2}}]}"#,
    );
    let value = record(&[
        ("id", AvroValue::Long(42)),
        (
            "tags",
            AvroValue::Array(vec![AvroValue::Str("a".into()), AvroValue::Str("b".into())]),
        ),
        ("kind", AvroValue::Enum("B".into())),
        (
            "extra",
            AvroValue::union(1, AvroValue::Map(vec![("pi".into(), AvroValue::Double(3.25))])),
        ),
        ("hash", AvroValue::Fixed(vec![9, 8])),
    ]);
    let bytes = encode(&value, &schema, Vec::new()).unwrap();
    let plain = decode(&schema, Reader::new(&bytes)).unwrap();
    assert_eq!(plain, value);
    assert_eq!(resolve(&schema, &schema, &value).unwrap(), plain);
}

#[test]
fn numeric_and_text_promotions() {
    let cases = vec![
        (Schema::int(), Schema::long(), AvroValue::Int(-7), AvroValue::Long(-7)),
        (Schema::int(), Schema::float(), AvroValue::Int(3), AvroValue::Float(3.0)),
        (Schema::int(), Schema::double(), AvroValue::Int(i32::MIN), AvroValue::Double(-2147483648.0)),
        (Schema::long(), Schema::float(), AvroValue::Long(1 << 24), AvroValue::Float(16777216.0)),
        (Schema::long(), Schema::double(), AvroValue::Long(1 << 53), AvroValue::Double(9007199254740992.0)),
        (Schema::float(), Schema::double(), AvroValue::Float(0.5), AvroValue::Double(0.5)),
        (Schema::string(), Schema::bytes(), AvroValue::Str("ab".into()), AvroValue::Bytes(b"ab".to_vec())),
        (Schema::bytes(), Schema::string(), AvroValue::Bytes(b"ab".to_vec()), AvroValue::Str("ab".into())),
    ];
    for (writer, reader, written, expected) in cases {
        assert_eq!(resolve(&writer, &reader, &written).unwrap(), expected, "{writer} as {reader}");
    }
}

#[test]
fn double_to_long_truncates_and_saturates() {
    let cases = [
        (2.9, 2),
        (-2.9, -2),
        (1e300, i64::MAX),
        (-1e300, i64::MIN),
        (f64::INFINITY, i64::MAX),
        (f64::NAN, 0),
    ];
    for (d, expected) in cases {
        assert_eq!(
            resolve(&Schema::double(), &Schema::long(), &AvroValue::Double(d)).unwrap(),
            AvroValue::Long(expected),
            "{d}"
        );
    }
}

#[test]
fn reader_default_is_back_filled() {
    let writer = parse(r#"{"type":"record","name":"Pt","fields":[{"name":"x","type":"int"}]}"#);
    let reader = parse(
        r#"{"type":"record","name":"Pt","fields":[
            {"name":"x","type":"int"},
            {"name":"y","type":"int","default":7}]}"#,
    );
    let bytes = encode(&record(&[("x", AvroValue::Int(5))]), &writer, Vec::new()).unwrap();
    assert_eq!(bytes, vec![0x0a]);

    let resolver = build_resolver(&writer, &reader).unwrap();
    let mut decoder = resolver.decoder(BinaryDecoder::new(Reader::new(&bytes)));
    let order = decoder.read_field_order().unwrap().expect("resolving decoders report an order");
    let names: Vec<&str> = order.iter().map(|f| f.name()).collect();
    assert_eq!(names, ["x", "y"]);
    assert_eq!(decoder.read_int().unwrap(), 5);
    assert_eq!(decoder.read_int().unwrap(), 7);
    decoder.drain().unwrap();
    assert!(decoder.get_mut().is_end().unwrap());

    assert_eq!(
        decode_resolved(&resolver, Reader::new(&bytes)).unwrap(),
        record(&[("x", AvroValue::Int(5)), ("y", AvroValue::Int(7))])
    );
}

#[test]
fn reordered_fields_come_back_in_reader_order() {
    let writer = parse(
        r#"{"type":"record","name":"R","fields":[
            {"name":"b","type":"string"},
            {"name":"a","type":"int"}]}"#,
    );
    let reader = parse(
        r#"{"type":"record","name":"R","fields":[
            {"name":"a","type":"long"},
            {"name":"b","type":"string"}]}"#,
    );
    let written = record(&[("b", AvroValue::Str("s".into())), ("a", AvroValue::Int(1))]);
    assert_eq!(
        resolve(&writer, &reader, &written).unwrap(),
        record(&[("a", AvroValue::Long(1)), ("b", AvroValue::Str("s".into()))])
    );
}

#[test]
fn record_and_field_aliases_resolve_renamed_data() {
    let writer = parse(
        r#"{"type":"record","name":"Old","namespace":"v1","fields":[
            {"name":"count","type":"int"}]}"#,
    );
    let reader = parse(
        r#"{"type":"record","name":"New","namespace":"v2","aliases":["v1.Old"],"fields":[
            {"name":"total","type":"long","aliases":["count"]}]}"#,
    );
    let written = record(&[("count", AvroValue::Int(12))]);
    assert_eq!(
        resolve(&writer, &reader, &written).unwrap(),
        record(&[("total", AvroValue::Long(12))])
    );
}

#[test]
fn trailing_writer_fields_are_drained() {
    let writer = parse(
        r#"{"type":"record","name":"R","fields":[
            {"name":"a","type":"int"},
            {"name":"b","type":"string"},
            {"name":"c","type":{"type":"array","items":{"type":"map","values":"long"}}}]}"#,
    );
    let reader = parse(r#"{"type":"record","name":"R","fields":[{"name":"a","type":"int"}]}"#);
    let datum = |n: i32| {
        record(&[
            ("a", AvroValue::Int(n)),
            ("b", AvroValue::Str("skip me".into())),
            (
                "c",
                AvroValue::Array(vec![AvroValue::Map(vec![("k".into(), AvroValue::Long(n.into()))])]),
            ),
        ])
    };
    let mut bytes = encode(&datum(1), &writer, Vec::new()).unwrap();
    bytes = encode(&datum(2), &writer, bytes).unwrap();

    let resolver = build_resolver(&writer, &reader).unwrap();
    let mut decoder = resolver.decoder(BinaryDecoder::new(Reader::new(&bytes)));
    for n in [1, 2] {
        let value = read_datum(&mut decoder, &reader).unwrap();
        decoder.drain().unwrap();
        assert_eq!(value, record(&[("a", AvroValue::Int(n))]));
    }
    assert!(decoder.get_mut().is_end().unwrap());
}

#[test]
fn unknown_enum_symbol_uses_reader_default() {
    let writer = parse(r#"{"type":"enum","name":"E","symbols":["A","B","C"]}"#);
    let with_default = parse(r#"{"type":"enum","name":"E","symbols":["B","A"],"default":"A"}"#);
    let without_default = parse(r#"{"type":"enum","name":"E","symbols":["B","A"]}"#);
    let c = AvroValue::Enum("C".into());
    let b = AvroValue::Enum("B".into());

    assert_eq!(resolve(&writer, &with_default, &c).unwrap(), AvroValue::Enum("A".into()));
    assert_eq!(resolve(&writer, &without_default, &b).unwrap(), b);
    match resolve(&writer, &without_default, &c) {
        Err(AvroError::Unresolvable(msg)) => assert!(msg.contains("No match for C"), "{msg}"),
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn unions_on_either_side() {
    let nullable = parse(r#"["null","int"]"#);
    let reader_union = parse(r#"["null","long"]"#);

    assert_eq!(
        resolve(&Schema::int(), &reader_union, &AvroValue::Int(4)).unwrap(),
        AvroValue::union(1, AvroValue::Long(4))
    );
    assert_eq!(
        resolve(&nullable, &Schema::long(), &AvroValue::union(1, AvroValue::Int(4))).unwrap(),
        AvroValue::Long(4)
    );
    let err = resolve(&nullable, &Schema::long(), &AvroValue::union(0, AvroValue::Null)).unwrap_err();
    assert!(matches!(err, AvroError::Unresolvable(_)), "{err}");
    assert_eq!(
        resolve(&nullable, &reader_union, &AvroValue::union(0, AvroValue::Null)).unwrap(),
        AvroValue::union(0, AvroValue::Null)
    );
}

#[test]
fn incompatibilities_fail_only_when_reached() {
    let writer = parse(r#"{"type":"record","name":"R","fields":[{"name":"a","type":"int"}]}"#);
    let reader = parse(
        r#"{"type":"record","name":"R","fields":[
            {"name":"a","type":"int"},
            {"name":"b","type":"string"}]}"#,
    );
    let resolver = build_resolver(&writer, &reader).unwrap();
    let bytes = encode(&record(&[("a", AvroValue::Int(1))]), &writer, Vec::new()).unwrap();
    match decode_resolved(&resolver, Reader::new(&bytes)) {
        Err(AvroError::Unresolvable(msg)) => assert!(msg.contains("missing required field b"), "{msg}"),
        other => panic!("unexpected: {other:?}"),
    }

    let resolver = build_resolver(&Schema::string(), &Schema::int()).unwrap();
    assert!(matches!(
        decode_resolved(&resolver, Reader::new(&[0x02, b'x'])),
        Err(AvroError::Unresolvable(_))
    ));
}

#[test]
fn json_input_can_be_resolved() {
    let writer = parse(
        r#"{"type":"record","name":"R","fields":[
            {"name":"a","type":"int"},
            {"name":"gone","type":{"type":"array","items":"string"}}]}"#,
    );
    let reader = parse(
        r#"{"type":"record","name":"R","fields":[
            {"name":"a","type":"double"},
            {"name":"added","type":["null","string"],"default":null}]}"#,
    );
    let resolver = build_resolver(&writer, &reader).unwrap();
    let value =
        decode_resolved_json(&resolver, r#"{"gone":["x","y"],"a":3}"#.as_bytes()).unwrap();
    assert_eq!(
        value,
        record(&[
            ("a", AvroValue::Double(3.0)),
            ("added", AvroValue::union(0, AvroValue::Null)),
        ])
    );
}

#[test]
fn resolver_is_shared_across_threads() {
    let writer = Schema::int();
    let reader = Schema::long();
    let resolver = build_resolver(&writer, &reader).unwrap();
    let handles: Vec<_> = (0..4)
        .map(|n| {
            let resolver = resolver.clone();
            let writer = writer.clone();
            thread::spawn(move || {
                let bytes = encode(&AvroValue::Int(n), &writer, Vec::new()).unwrap();
                decode_resolved(&resolver, Reader::new(&bytes)).unwrap()
            })
        })
        .collect();
    for (n, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), AvroValue::Long(n as i64));
    }
}
