use avro_joy::{
    decode, decode_json, encode, encode_json, AvroError, AvroValue, BinaryDecoder, BinaryEncoder,
    Decoder, Encoder, JsonWriter, Reader, Schema,
};
use proptest::prelude::*;

fn parse(text: &str) -> Schema {
    Schema::parse_str(text).unwrap()
}

fn binary_round_trip(schema: &Schema, value: &AvroValue) -> Vec<u8> {
    let bytes = encode(value, schema, Vec::new()).unwrap();
    assert_eq!(&decode(schema, Reader::new(&bytes)).unwrap(), value);
    bytes
}

fn json_round_trip(schema: &Schema, value: &AvroValue) -> String {
    let text = encode_json(value, schema, Vec::new()).unwrap();
    assert_eq!(&decode_json(schema, text.as_slice()).unwrap(), value);
    String::from_utf8(text).unwrap()
}

fn everything() -> Schema {
    parse(
        r#"{"type":"record","name":"All","namespace":"t","fields":[
            {"name":"n","type":"null"},
            {"name":"b","type":"boolean"},
            {"name":"i","type":"int"},
            {"name":"l","type":"long"},
            {"name":"f","type":"float"},
            {"name":"d","type":"double"},
            {"name":"by","type":"bytes"},
            {"name":"s","type":"string"},
            {"name":"e","type":{"type":"enum","name":"Suit","symbols":["HEART","SPADE"]}},
            {"name":"a","type":{"type":"array","items":"long"}},
            {"name":"m","type":{"type":"map","values":"string"}},
            {"name":"fx","type":{"type":"fixed","name":"Md5","size":4}},
            {"name":"u","type":["null","t.Suit","string"]}
        ]}"#,
    )
}

fn everything_value() -> AvroValue {
    AvroValue::Record(vec![
        ("n".into(), AvroValue::Null),
        ("b".into(), AvroValue::Bool(true)),
        ("i".into(), AvroValue::Int(-64)),
        ("l".into(), AvroValue::Long(1 << 40)),
        ("f".into(), AvroValue::Float(1.5)),
        ("d".into(), AvroValue::Double(0.1)),
        ("by".into(), AvroValue::Bytes(vec![0, 0x7f, 0xff])),
        ("s".into(), AvroValue::Str("h\u{e9}llo \"q\"\n".into())),
        ("e".into(), AvroValue::Enum("SPADE".into())),
        (
            "a".into(),
            AvroValue::Array(vec![AvroValue::Long(1), AvroValue::Long(-2), AvroValue::Long(3)]),
        ),
        (
            "m".into(),
            AvroValue::Map(vec![
                ("z".into(), AvroValue::Str("last".into())),
                ("a".into(), AvroValue::Str("first".into())),
            ]),
        ),
        ("fx".into(), AvroValue::Fixed(vec![1, 2, 3, 4])),
        ("u".into(), AvroValue::union(1, AvroValue::Enum("HEART".into()))),
    ])
}

#[test]
fn binary_wire_matrix() {
    let cases: Vec<(Schema, AvroValue, Vec<u8>)> = vec![
        (Schema::int(), AvroValue::Int(-1), vec![0x01]),
        (Schema::int(), AvroValue::Int(1), vec![0x02]),
        (Schema::int(), AvroValue::Int(64), vec![0x80, 0x01]),
        (Schema::long(), AvroValue::Long(-1), vec![0x01]),
        (Schema::long(), AvroValue::Long(64), vec![0x80, 0x01]),
        (Schema::boolean(), AvroValue::Bool(true), vec![0x01]),
        (Schema::null(), AvroValue::Null, vec![]),
        (Schema::float(), AvroValue::Float(1.0), vec![0x00, 0x00, 0x80, 0x3f]),
        (Schema::string(), AvroValue::Str("foo".into()), vec![0x06, b'f', b'o', b'o']),
        (Schema::bytes(), AvroValue::Bytes(vec![0xff]), vec![0x02, 0xff]),
        (
            parse(r#"{"type":"array","items":"int"}"#),
            AvroValue::Array(vec![AvroValue::Int(1), AvroValue::Int(2)]),
            vec![0x04, 0x02, 0x04, 0x00],
        ),
        (
            parse(r#"{"type":"map","values":"int"}"#),
            AvroValue::Map(vec![("a".into(), AvroValue::Int(1))]),
            vec![0x02, 0x02, b'a', 0x02, 0x00],
        ),
        (
            parse(r#"{"type":"enum","name":"E","symbols":["A","B","C"]}"#),
            AvroValue::Enum("C".into()),
            vec![0x04],
        ),
    ];
    for (schema, value, expected) in cases {
        assert_eq!(binary_round_trip(&schema, &value), expected, "{schema}");
    }
}

#[test]
fn every_kind_round_trips_in_binary_and_json() {
    let schema = everything();
    let value = everything_value();
    binary_round_trip(&schema, &value);
    let text = json_round_trip(&schema, &value);
    assert!(text.contains(r#""u":{"t.Suit":"HEART"}"#), "{text}");
    assert!(text.contains(r#""m":{"z":"last","a":"first"}"#), "{text}");
    assert!(text.contains(r#""by":"\u0000"#), "{text}");
}

#[test]
fn union_null_convention() {
    let schema = parse(r#"["null","string"]"#);
    let null = AvroValue::union(0, AvroValue::Null);
    let text = AvroValue::union(1, AvroValue::Str("a".into()));

    assert_eq!(binary_round_trip(&schema, &null), vec![0x00]);
    assert_eq!(binary_round_trip(&schema, &text), vec![0x02, 0x02, b'a']);
    assert_eq!(json_round_trip(&schema, &null), "null");
    assert_eq!(json_round_trip(&schema, &text), r#"{"string":"a"}"#);

    let err = decode_json(&schema, r#""a""#.as_bytes()).unwrap_err();
    assert!(matches!(err, AvroError::TypeMismatch { .. }), "{err}");
}

#[test]
fn cyclic_schema_values_round_trip() {
    let schema = parse(
        r#"{"type":"record","name":"Node","fields":[
            {"name":"value","type":"int"},
            {"name":"next","type":["null","Node"],"default":null}]}"#,
    );
    let tail = AvroValue::Record(vec![
        ("value".into(), AvroValue::Int(2)),
        ("next".into(), AvroValue::union(0, AvroValue::Null)),
    ]);
    let head = AvroValue::Record(vec![
        ("value".into(), AvroValue::Int(1)),
        ("next".into(), AvroValue::union(1, tail)),
    ]);
    assert_eq!(binary_round_trip(&schema, &head), vec![0x02, 0x02, 0x04, 0x00]);
    assert_eq!(
        json_round_trip(&schema, &head),
        r#"{"value":1,"next":{"Node":{"value":2,"next":null}}}"#
    );
}

#[test]
fn blocked_arrays_are_read_across_blocks() {
    // Two blocks (2 items, then 1 with a byte size), then the terminator.
    let bytes = [0x04, 0x02, 0x04, 0x01, 0x02, 0x06, 0x00];
    let schema = parse(r#"{"type":"array","items":"int"}"#);
    assert_eq!(
        decode(&schema, Reader::new(&bytes)).unwrap(),
        AvroValue::Array(vec![AvroValue::Int(1), AvroValue::Int(2), AvroValue::Int(3)])
    );
}

#[test]
fn malformed_binary_input() {
    assert!(matches!(
        decode(&Schema::string(), Reader::new(&[0x06, b'a'])),
        Err(AvroError::EndOfInput)
    ));
    assert!(matches!(
        decode(&Schema::long(), Reader::new(&[0xff; 11])),
        Err(AvroError::Malformed(_))
    ));
    assert!(matches!(
        decode(&Schema::string(), Reader::new(&[0x01])),
        Err(AvroError::Malformed(_))
    ));
    let en = parse(r#"{"type":"enum","name":"E","symbols":["A"]}"#);
    assert!(matches!(decode(&en, Reader::new(&[0x02])), Err(AvroError::Malformed(_))));
}

#[test]
fn codecs_are_usable_directly() {
    let mut encoder = BinaryEncoder::new(Vec::new());
    encoder.write_array_start().unwrap();
    encoder.set_item_count(2).unwrap();
    for s in ["x", "y"] {
        encoder.start_item().unwrap();
        encoder.write_string(s).unwrap();
    }
    encoder.write_array_end().unwrap();
    let bytes = encoder.into_inner().unwrap();

    let mut decoder = BinaryDecoder::new(Reader::new(&bytes));
    assert_eq!(decoder.read_array_start().unwrap(), 2);
    assert_eq!(decoder.read_string().unwrap(), "x");
    decoder.skip_string().unwrap();
    assert_eq!(decoder.array_next().unwrap(), 0);
    assert!(decoder.is_end().unwrap());
}

#[test]
fn json_writer_nesting_errors() {
    let mut w = JsonWriter::new();
    assert!(matches!(w.end_object(), Err(AvroError::Encoding(_))));

    let mut w = JsonWriter::new();
    w.begin_object().unwrap();
    w.key("a").unwrap();
    assert!(w.key("b").is_err());
    assert!(w.end_object().is_err());

    let mut w = JsonWriter::new();
    w.begin_array().unwrap();
    w.end_array().unwrap();
    assert!(w.begin_array().is_err());
    assert_eq!(w.take(), b"[]".to_vec());
}

proptest! {
    #[test]
    fn longs_round_trip(n in any::<i64>()) {
        let value = AvroValue::Long(n);
        binary_round_trip(&Schema::long(), &value);
        json_round_trip(&Schema::long(), &value);
    }

    #[test]
    fn ints_round_trip(n in any::<i32>()) {
        let value = AvroValue::Int(n);
        let bytes = binary_round_trip(&Schema::int(), &value);
        prop_assert!(bytes.len() <= 5);
        json_round_trip(&Schema::int(), &value);
    }

    #[test]
    fn strings_round_trip(s in any::<String>()) {
        let value = AvroValue::Str(s);
        binary_round_trip(&Schema::string(), &value);
        json_round_trip(&Schema::string(), &value);
    }

    #[test]
    fn bytes_round_trip(b in proptest::collection::vec(any::<u8>(), 0..64)) {
        let value = AvroValue::Bytes(b);
        binary_round_trip(&Schema::bytes(), &value);
        json_round_trip(&Schema::bytes(), &value);
    }

    #[test]
    fn doubles_round_trip_in_binary(bits in any::<u64>()) {
        let d = f64::from_bits(bits);
        let bytes = encode(&AvroValue::Double(d), &Schema::double(), Vec::new()).unwrap();
        prop_assert_eq!(bytes.len(), 8);
        match decode(&Schema::double(), Reader::new(&bytes)).unwrap() {
            AvroValue::Double(back) => prop_assert_eq!(back.to_bits(), bits),
            other => prop_assert!(false, "unexpected {:?}", other),
        }
    }
}
