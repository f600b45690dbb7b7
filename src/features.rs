#[cfg(feature = "serde_json")]
use crate::*;
#[cfg(feature = "serde_json")]
use serde_json::{Map, Number};

// --- schema from JSON ---

/// Parses a schema from its JSON shape.
///
/// The input must be an array whose entries are either a field name string or
/// an object `{ "name": ..., "type": "string" | "array" | "object", "map": [...] }`
/// where `type` and `map` are optional.
///
/// # Errors
/// Returns `MissingArgument` for `null` and `MalformedSchema` for any other
/// shape.
///
/// # Example
/// ```rust
/// # #[cfg(feature = "serde_json")] {
/// use blizzerial::{schema_from_json, Schema};
/// use serde_json::json;
///
/// let schema = schema_from_json(&json!(["id", { "name": "title", "type": "string" }])).unwrap();
/// assert_eq!(schema[0], Schema::name("id"));
/// # }
/// ```
#[cfg(feature = "serde_json")]
pub fn schema_from_json(value: &serde_json::Value) -> Result<Vec<Schema>> {
    match value {
        serde_json::Value::Null => Err(DecodeError::MissingArgument("schema")),
        serde_json::Value::Array(entries) => {
            entries.iter().map(|entry| Schema::try_from(entry)).collect()
        }
        other => Err(DecodeError::MalformedSchema(format!(
            "expected an array of entries, got {}",
            other
        ))),
    }
}

#[cfg(feature = "serde_json")]
impl TryFrom<&serde_json::Value> for Schema {
    type Error = DecodeError;

    fn try_from(value: &serde_json::Value) -> Result<Self> {
        let entry = match value {
            serde_json::Value::String(name) => return Ok(Schema::Name(name.clone())),
            serde_json::Value::Object(entry) => entry,
            other => {
                return Err(DecodeError::MalformedSchema(format!(
                    "entries must be names or objects, got {}",
                    other
                )))
            }
        };

        let name = match entry.get("name") {
            Some(serde_json::Value::String(name)) if !name.is_empty() => name.clone(),
            _ => {
                return Err(DecodeError::MalformedSchema(
                    "entry object has no name".to_string(),
                ))
            }
        };
        let kind = match entry.get("type") {
            None | Some(serde_json::Value::Null) => FieldKind::default(),
            Some(serde_json::Value::String(kind)) => FieldKind::from_name(kind).ok_or_else(|| {
                DecodeError::MalformedSchema(format!("unknown type '{}' for '{}'", kind, name))
            })?,
            Some(other) => {
                return Err(DecodeError::MalformedSchema(format!(
                    "type of '{}' must be a string, got {}",
                    name, other
                )))
            }
        };
        let map = match entry.get("map") {
            None | Some(serde_json::Value::Null) => None,
            Some(map) => Some(schema_from_json(map)?),
        };

        Ok(Schema::Field(FieldSpec { name, kind, map }))
    }
}

// --- mapped values to JSON ---

/// Converts a decoded value to JSON.
///
/// Byte strings become arrays of numbers and big integers become decimal
/// strings. Sparse map gaps become `null`; a sparse map with more than
/// [`MAX_SPARSE_GAPS`](crate::value::MAX_SPARSE_GAPS) gaps becomes an object
/// keyed by its populated keys instead.
#[cfg(feature = "serde_json")]
impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bytes(bytes) => serde_json::Value::Array(
                bytes
                    .iter()
                    .map(|byte| serde_json::Value::Number(Number::from(*byte)))
                    .collect(),
            ),
            Value::SmallInt(v) => serde_json::Value::Number(Number::from(*v)),
            Value::BigInt(v) => serde_json::Value::String(v.to_string()),
            Value::Sequence(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            Value::SparseMap(map) => match map.positions() {
                Some(slots) => serde_json::Value::Array(
                    slots
                        .into_iter()
                        .map(|slot| slot.map_or(serde_json::Value::Null, serde_json::Value::from))
                        .collect(),
                ),
                None => serde_json::Value::Object(
                    map.iter()
                        .map(|(key, value)| (key.to_string(), serde_json::Value::from(value)))
                        .collect::<Map<_, _>>(),
                ),
            },
        }
    }
}

#[cfg(feature = "serde_json")]
impl From<&Mapped> for serde_json::Value {
    fn from(mapped: &Mapped) -> Self {
        match mapped {
            Mapped::Absent => serde_json::Value::Null,
            Mapped::Value(value) => serde_json::Value::from(value),
            Mapped::Text(text) => serde_json::Value::String(text.clone()),
            Mapped::List(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            Mapped::Record(record) => record_to_json(record),
        }
    }
}

/// Converts a mapped record to a JSON object.
#[cfg(feature = "serde_json")]
pub fn record_to_json(record: &Record) -> serde_json::Value {
    let mut object = Map::with_capacity(record.len());
    for (name, mapped) in record {
        object.insert(name.clone(), serde_json::Value::from(mapped));
    }
    serde_json::Value::Object(object)
}
