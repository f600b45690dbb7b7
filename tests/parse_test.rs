use blizzerial::{
    parse, parse_with, DecodeError, DecodeOptions, FieldSpec, Mapped, Schema, Value,
};
use num_bigint::BigInt;

// --- test-only builders for the wire format ---

fn varint(value: i64) -> Vec<u8> {
    let mut raw = (value.unsigned_abs() << 1) | u64::from(value < 0);
    let mut out = Vec::new();
    loop {
        let group = (raw & 0x7F) as u8;
        raw >>= 7;
        if raw == 0 {
            out.push(group);
            return out;
        }
        out.push(group | 0x80);
    }
}

fn tagged_bytes(text: &str) -> Vec<u8> {
    let mut out = vec![2];
    out.extend(varint(text.len() as i64));
    out.extend_from_slice(text.as_bytes());
    out
}

fn tagged_int8(value: i8) -> Vec<u8> {
    let magnitude = value.unsigned_abs() << 1;
    vec![6, magnitude | u8::from(value < 0)]
}

fn tagged_int32(value: i32) -> Vec<u8> {
    let magnitude = value.unsigned_abs();
    vec![
        7,
        (((magnitude & 0x7F) << 1) as u8) | u8::from(value < 0),
        (magnitude >> 7) as u8,
        (magnitude >> 15) as u8,
        (magnitude >> 23) as u8,
    ]
}

fn tagged_varint(value: i64) -> Vec<u8> {
    let mut out = vec![9];
    out.extend(varint(value));
    out
}

fn array(items: &[Vec<u8>]) -> Vec<u8> {
    let mut out = vec![4, 0x01, 0x00];
    out.extend(varint(items.len() as i64));
    for item in items {
        out.extend_from_slice(item);
    }
    out
}

fn sparse_map(entries: &[(i64, Vec<u8>)]) -> Vec<u8> {
    let mut out = vec![5];
    out.extend(varint(entries.len() as i64));
    for (key, value) in entries {
        out.extend(varint(*key));
        out.extend_from_slice(value);
    }
    out
}

const TIMESTAMP: i64 = 130_000_000_000_000_000;

fn details_buffer() -> Vec<u8> {
    let toon = |region: i8, id: i32| {
        sparse_map(&[
            (0, tagged_int8(region)),
            (1, tagged_int32(1_416_784_000)),
            (2, tagged_int8(1)),
            (4, tagged_varint(i64::from(id))),
        ])
    };
    let players = array(&[
        array(&[tagged_bytes("Kerrigan"), toon(2, 1_234), tagged_int8(2)]),
        array(&[tagged_bytes("Artanis"), toon(1, -77), tagged_int8(3)]),
    ]);
    sparse_map(&[
        (0, players),
        (1, tagged_bytes("Daybreak LE")),
        (3, tagged_varint(TIMESTAMP)),
    ])
}

fn details_schema() -> Vec<Schema> {
    let toon = FieldSpec::object(
        "toon",
        vec![
            "region".into(),
            "programId".into(),
            "realm".into(),
            "unused".into(),
            "id".into(),
        ],
    );
    vec![
        FieldSpec::array("players")
            .with_map(vec![FieldSpec::string("name").into(), toon.into(), "race".into()])
            .into(),
        FieldSpec::string("title").into(),
        "unused".into(),
        "timestamp".into(),
    ]
}

#[test]
fn test_parse_player_details() {
    let record = parse(details_buffer(), &details_schema()).unwrap();

    assert_eq!(record["title"].as_text(), Some("Daybreak LE"));
    assert_eq!(record["unused"], Mapped::Absent);
    assert_eq!(
        record["timestamp"],
        Mapped::Value(Value::BigInt(BigInt::from(TIMESTAMP)))
    );
    assert_eq!(record["timestamp"].as_value().and_then(Value::as_i64), Some(TIMESTAMP));

    let players = record["players"].as_list().unwrap();
    assert_eq!(players.len(), 2);

    let kerrigan = players[0].as_record().unwrap();
    assert_eq!(kerrigan["name"].as_text(), Some("Kerrigan"));
    assert_eq!(kerrigan["race"].as_value(), Some(&Value::SmallInt(2)));
    let toon = kerrigan["toon"].as_record().unwrap();
    assert_eq!(toon["region"].as_value(), Some(&Value::SmallInt(2)));
    assert_eq!(toon["programId"].as_value(), Some(&Value::SmallInt(1_416_784_000)));
    assert_eq!(toon["unused"], Mapped::Absent);
    assert_eq!(toon["id"].as_value(), Some(&Value::SmallInt(1_234)));

    let artanis = players[1].as_record().unwrap();
    let toon = artanis["toon"].as_record().unwrap();
    assert_eq!(toon["region"].as_value(), Some(&Value::SmallInt(1)));
    assert_eq!(toon["id"].as_value(), Some(&Value::SmallInt(-77)));
}

#[test]
fn test_parse_rejects_short_schema() {
    let mut schema = details_schema();
    schema.pop();
    assert!(matches!(
        parse(details_buffer(), &schema),
        Err(DecodeError::SchemaShapeMismatch {
            expected: 3,
            actual: 4,
            ..
        })
    ));
}

#[test]
fn test_parse_empty_buffer() {
    assert!(matches!(
        parse(Vec::new(), &details_schema()),
        Err(DecodeError::MissingArgument("buffer"))
    ));
}

#[test]
fn test_parse_scalar_root() {
    assert!(matches!(
        parse(tagged_int8(4), &["a".into()]),
        Err(DecodeError::TypeMismatch { .. })
    ));
}

#[test]
fn test_parse_ignores_trailing_values() {
    let mut buffer = array(&[tagged_int8(1)]);
    buffer.extend(tagged_bytes("trailing"));
    let record = parse(buffer, &["only".into()]).unwrap();
    assert_eq!(record.len(), 1);
    assert_eq!(record["only"].as_value(), Some(&Value::SmallInt(1)));
}

#[test]
fn test_parse_unknown_tag_as_null() {
    let buffer = array(&[vec![0x0A], tagged_int8(5)]);
    let record = parse(buffer.clone(), &["mystery".into(), "known".into()]).unwrap();
    assert_eq!(record["mystery"], Mapped::Value(Value::Null));
    assert_eq!(record["known"].as_value(), Some(&Value::SmallInt(5)));

    let result = parse_with(buffer, &["mystery".into(), "known".into()], &DecodeOptions::strict());
    assert!(matches!(
        result,
        Err(DecodeError::UnknownTag { tag: 0x0A, offset: 4 })
    ));
}

#[test]
fn test_parse_aborts_on_first_bad_field() {
    let buffer = array(&[tagged_bytes("fine"), tagged_int8(1)]);
    let schema = vec![
        Schema::from(FieldSpec::string("first")),
        Schema::from(FieldSpec::string("second")),
    ];
    assert!(matches!(
        parse(buffer, &schema),
        Err(DecodeError::TypeMismatch { field, .. }) if field == "second"
    ));
}

#[test]
fn test_two_element_arrays_of_any_type() {
    let elements = [
        tagged_bytes("a"),
        tagged_int8(-3),
        tagged_int32(-100_000),
        tagged_varint(1 << 40),
        array(&[]),
        sparse_map(&[(2, tagged_int8(0))]),
        vec![0x63],
    ];
    for first in &elements {
        for second in &elements {
            let buffer = array(&[first.clone(), second.clone()]);
            let record = parse(buffer, &["first".into(), "second".into()]).unwrap();
            assert_eq!(record.len(), 2);
        }
    }
}

#[test]
fn test_builders_agree_with_decoders() {
    let buffer = array(&[
        tagged_int8(-63),
        tagged_int32(i32::MAX),
        tagged_int32(-1),
        tagged_varint(-134_217_727),
        tagged_varint(-134_217_728),
    ]);
    let record = parse(buffer, &["a".into(), "b".into(), "c".into(), "d".into(), "e".into()]).unwrap();
    assert_eq!(record["a"].as_value(), Some(&Value::SmallInt(-63)));
    assert_eq!(record["b"].as_value(), Some(&Value::SmallInt(i64::from(i32::MAX))));
    assert_eq!(record["c"].as_value(), Some(&Value::SmallInt(-1)));
    assert_eq!(record["d"].as_value(), Some(&Value::SmallInt(-134_217_727)));
    assert_eq!(
        record["e"].as_value(),
        Some(&Value::BigInt(BigInt::from(-134_217_728)))
    );
}
