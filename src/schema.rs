//! Schema-driven mapping of decoded sequences onto named records.
//!
//! A schema is a list of entries, one per position of the sequence it maps.
//! Each entry is either a bare name, which copies the value as-is, or a
//! [`FieldSpec`] that renames the value and converts it according to its
//! [`FieldKind`]:
//!
//! - `String` — the value must be a byte string; it becomes UTF-8 text.
//! - `Array` — the value must be a sequence. Without a map its elements are
//!   copied verbatim; with a map each element is mapped as a record. A sparse
//!   map with more than [`MAX_SPARSE_GAPS`](crate::value::MAX_SPARSE_GAPS)
//!   gaps is rejected.
//! - `Object` (default) — the value must be a sequence and the field must
//!   have a map, which is applied recursively.

use crate::*;

/// One entry of a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schema {
    /// Copies the value at this position under the given name.
    Name(String),
    Field(FieldSpec),
}

impl Schema {
    pub fn name(name: impl Into<String>) -> Self {
        Schema::Name(name.into())
    }

    /// The output field name of this entry.
    pub fn field_name(&self) -> &str {
        match self {
            Schema::Name(name) => name,
            Schema::Field(spec) => &spec.name,
        }
    }
}

impl From<&str> for Schema {
    fn from(name: &str) -> Self {
        Schema::Name(name.to_owned())
    }
}

impl From<String> for Schema {
    fn from(name: String) -> Self {
        Schema::Name(name)
    }
}

impl From<FieldSpec> for Schema {
    fn from(spec: FieldSpec) -> Self {
        Schema::Field(spec)
    }
}

/// How a [`FieldSpec`] converts its value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FieldKind {
    String,
    Array,
    #[default]
    Object,
}

impl FieldKind {
    /// Parses the schema spelling of a kind: `string`, `array` or `object`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(FieldKind::String),
            "array" => Some(FieldKind::Array),
            "object" => Some(FieldKind::Object),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Array => "array",
            FieldKind::Object => "object",
        }
    }
}

/// A named, typed schema entry with an optional nested map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub map: Option<Vec<Schema>>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            map: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::String)
    }

    pub fn array(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Array)
    }

    pub fn object(name: impl Into<String>, map: Vec<Schema>) -> Self {
        Self::new(name, FieldKind::Object).with_map(map)
    }

    pub fn with_map(mut self, map: Vec<Schema>) -> Self {
        self.map = Some(map);
        self
    }
}

/// A named record produced by the mapper.
#[cfg(not(feature = "indexmap"))]
pub type Record = std::collections::BTreeMap<String, Mapped>;

/// A named record produced by the mapper, in schema order.
#[cfg(feature = "indexmap")]
pub type Record = indexmap::IndexMap<String, Mapped>;

/// A value in a mapped record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mapped {
    /// A sparse map gap copied under a bare name.
    Absent,
    /// A value copied as-is.
    Value(Value),
    /// A byte string mapped with the `string` kind.
    Text(String),
    /// An `array` field.
    List(Vec<Mapped>),
    /// An `object` field, or an element of an `array` field with a map.
    Record(Record),
}

impl Mapped {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Mapped::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Mapped::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Mapped]> {
        match self {
            Mapped::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Mapped::Record(record) => Some(record),
            _ => None,
        }
    }

    fn copied(slot: Option<&Value>) -> Self {
        slot.cloned().map_or(Mapped::Absent, Mapped::Value)
    }
}

const ROOT: &str = "<root>";

/// Maps a decoded sequence (or sparse map) onto `schema`.
///
/// # Errors
/// Fails on the first entry that does not fit: a length mismatch at any
/// level, a malformed entry, or a value of the wrong type.
pub fn map_values(data: &Value, schema: &[Schema]) -> Result<Record> {
    map_record(Some(data), schema, ROOT)
}

fn found(slot: Option<&Value>) -> &'static str {
    slot.map_or("absent", Value::kind)
}

fn positional_len(slot: Option<&Value>, field: &str) -> Result<usize> {
    slot.and_then(Value::positional_len)
        .ok_or_else(|| DecodeError::TypeMismatch {
            field: field.to_owned(),
            expected: "sequence",
            found: found(slot),
        })
}

fn map_record(data: Option<&Value>, schema: &[Schema], field: &str) -> Result<Record> {
    let len = positional_len(data, field)?;
    if len != schema.len() {
        return Err(DecodeError::SchemaShapeMismatch {
            field: field.to_owned(),
            expected: schema.len(),
            actual: len,
        });
    }

    let mut record = Record::new();
    for (position, entry) in schema.iter().enumerate() {
        let slot = data.and_then(|value| value.slot(position));
        let mapped = match entry {
            Schema::Name(_) => Mapped::copied(slot),
            Schema::Field(spec) if spec.name.is_empty() => {
                return Err(DecodeError::MalformedSchema(format!(
                    "entry {} of '{}' has no name",
                    position, field
                )))
            }
            Schema::Field(spec) => map_field(spec, slot)?,
        };
        record.insert(entry.field_name().to_owned(), mapped);
    }
    Ok(record)
}

fn map_field(spec: &FieldSpec, slot: Option<&Value>) -> Result<Mapped> {
    match (spec.kind, &spec.map) {
        (FieldKind::String, _) => match slot {
            Some(Value::Bytes(bytes)) => {
                Ok(Mapped::Text(String::from_utf8_lossy(bytes).into_owned()))
            }
            other => Err(DecodeError::TypeMismatch {
                field: spec.name.clone(),
                expected: "bytes",
                found: found(other),
            }),
        },
        (FieldKind::Array, map) => {
            let items: Vec<Option<&Value>> = match slot {
                Some(Value::Sequence(items)) => items.iter().map(Some).collect(),
                Some(Value::SparseMap(sparse)) => {
                    sparse
                        .positions()
                        .ok_or_else(|| DecodeError::SparseMapTooSparse {
                            field: spec.name.clone(),
                            len: sparse.len(),
                            populated: sparse.populated(),
                        })?
                }
                other => {
                    return Err(DecodeError::TypeMismatch {
                        field: spec.name.clone(),
                        expected: "sequence",
                        found: found(other),
                    })
                }
            };
            match map {
                None => Ok(Mapped::List(items.into_iter().map(Mapped::copied).collect())),
                Some(map) => items
                    .into_iter()
                    .map(|item| map_record(item, map, &spec.name).map(Mapped::Record))
                    .collect::<Result<Vec<_>>>()
                    .map(Mapped::List),
            }
        }
        (FieldKind::Object, Some(map)) => map_record(slot, map, &spec.name).map(Mapped::Record),
        (FieldKind::Object, None) => Err(DecodeError::MalformedSchema(format!(
            "object field '{}' has no map",
            spec.name
        ))),
    }
}
