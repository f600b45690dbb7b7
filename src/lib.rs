//! # blizzerial
//!
//! A decoder for the "blizzerial" binary format: a compact, type-tagged,
//! variable-length serialization used for game-state blobs such as replay
//! headers and player details.
//!
//! Decoding happens in two steps:
//!
//! - The tag dispatcher in [`core`] turns the raw buffer into a tree of [`Value`]s.
//! - The schema mapper in [`schema`] walks that tree alongside a caller-supplied
//!   list of [`Schema`] entries and produces a named [`Record`].
//!
//! [`parse`] runs both steps and is what most callers want.
//!
//! ## Wire Format
//!
//! | Tag | Meaning     | Payload                                                    |
//! |-----|-------------|------------------------------------------------------------|
//! | 2   | Byte string | VarInt length, then that many raw bytes                    |
//! | 4   | Array       | marker bytes `01 00`, VarInt count, then that many values  |
//! | 5   | Sparse map  | VarInt count, then that many `(VarInt key, value)` pairs   |
//! | 6   | Int8        | 1 byte, sign in the low bit, magnitude in the upper 7 bits |
//! | 7   | Int32       | 4 bytes, sign in the low bit of byte 0                     |
//! | 9   | VarInt      | 7-bit groups, low group first, sign in the low bit         |
//!
//! Any other tag consumes no payload and decodes to [`Value::Null`]. Such tags
//! are reported through [`Decoded::unknown_tags`] and a `tracing` warning, or
//! rejected outright with [`UnknownTagPolicy::Reject`].
//!
//! ## Integer Representation
//!
//! VarInts encoded with at most [`core::SMALL_VARINT_GROUPS`] groups decode to
//! [`Value::SmallInt`]; longer encodings always decode to [`Value::BigInt`],
//! whatever their magnitude.
//!
//! ## Feature Flags
//!
//! - `serde_json` — Parses schemas from their JSON shape and converts mapped records to `serde_json::Value`.
//! - `indexmap` — Makes [`Record`] an `IndexMap` that keeps fields in schema order.

pub mod core;
mod features;
pub mod schema;
pub mod value;

use bytes::{Buf, Bytes};

pub use crate::core::Integer;
#[cfg(feature = "serde_json")]
pub use features::{record_to_json, schema_from_json};
pub use schema::{map_values, FieldKind, FieldSpec, Mapped, Record, Schema};
pub use value::{SparseMap, Value};

/// Errors that can occur while decoding a buffer or mapping it onto a schema.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// A required input was empty or absent.
    #[error("Missing argument: {0}")]
    MissingArgument(&'static str),
    /// A decoder needed more bytes than the buffer had left.
    #[error("Truncated buffer: needed {needed} bytes, {remaining} remaining")]
    TruncatedBuffer { needed: usize, remaining: usize },
    /// An array tag was not followed by the `01 00` marker.
    #[error("Malformed array: expected marker [01, 00], got {found:02x?}")]
    MalformedArray { found: [u8; 2] },
    /// A byte string length or element count decoded to a negative number.
    #[error("Negative length: {length}")]
    NegativeLength { length: Integer },
    /// A sparse map key was negative or too large to index a position.
    #[error("Invalid sparse map key {key} at offset {offset}")]
    InvalidMapKey { key: Integer, offset: usize },
    /// A sparse map with more than [`value::MAX_SPARSE_GAPS`] gaps was mapped as a list.
    #[error("Sparse map for '{field}' is too sparse: {populated} values over {len} positions")]
    SparseMapTooSparse {
        field: String,
        len: usize,
        populated: usize,
    },
    /// Arrays and maps were nested deeper than [`DecodeOptions::max_depth`].
    #[error("Nesting depth exceeded limit of {limit}")]
    DepthLimitExceeded { limit: usize },
    /// A tag with no known decoder, under [`UnknownTagPolicy::Reject`].
    #[error("Unknown tag {tag} at offset {offset}")]
    UnknownTag { tag: u8, offset: usize },
    /// A schema sequence and the data sequence it maps differ in length.
    #[error("Schema shape mismatch for '{field}': schema has {expected} entries, data has {actual}")]
    SchemaShapeMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },
    /// A schema entry is missing its name or combines kind and map in an unsupported way.
    #[error("Malformed schema: {0}")]
    MalformedSchema(String),
    /// A value's type does not fit the kind requested by its schema entry.
    #[error("Type mismatch for '{field}': expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// The result type used throughout this crate.
pub type Result<T> = std::result::Result<T, DecodeError>;

/// What the dispatcher does with a tag it has no decoder for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownTagPolicy {
    /// Consume only the tag byte and emit [`Value::Null`].
    ///
    /// The payload (if any) of the unknown value is left in the buffer, so
    /// everything after it is likely to be misread.
    #[default]
    Placeholder,
    /// Fail with [`DecodeError::UnknownTag`].
    Reject,
}

/// Options controlling a decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeOptions {
    pub unknown_tags: UnknownTagPolicy,
    /// Maximum nesting of arrays and sparse maps.
    pub max_depth: usize,
}

impl DecodeOptions {
    pub const DEFAULT_MAX_DEPTH: usize = 64;

    /// Options that fail on the first unknown tag.
    pub fn strict() -> Self {
        Self {
            unknown_tags: UnknownTagPolicy::Reject,
            ..Self::default()
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            unknown_tags: UnknownTagPolicy::default(),
            max_depth: Self::DEFAULT_MAX_DEPTH,
        }
    }
}

/// An unknown tag that was decoded as a [`Value::Null`] placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownTag {
    pub tag: u8,
    /// Offset of the tag byte from the start of the buffer.
    pub offset: usize,
}

/// Output of the tag dispatcher over a whole buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// Top-level values, in buffer order.
    pub values: Vec<Value>,
    /// Number of bytes consumed; always the full buffer length on success.
    pub consumed: usize,
    pub unknown_tags: Vec<UnknownTag>,
}

/// Decodes every top-level value in `buffer` with default options.
///
/// # Example
/// ```rust
/// use blizzerial::{parse_values, Value};
///
/// let decoded = parse_values(vec![0x06, 0x02, 0x09, 0x03]).unwrap();
/// assert_eq!(decoded.values, vec![Value::SmallInt(1), Value::SmallInt(-1)]);
/// assert_eq!(decoded.consumed, 4);
/// ```
pub fn parse_values(buffer: impl Into<Bytes>) -> Result<Decoded> {
    parse_values_with(buffer, &DecodeOptions::default())
}

/// Decodes every top-level value in `buffer`.
pub fn parse_values_with(buffer: impl Into<Bytes>, options: &DecodeOptions) -> Result<Decoded> {
    let mut reader = crate::core::ValueReader::new(buffer.into(), options);
    let (values, consumed) = reader.read_values(None)?;
    let unknown_tags = reader.into_unknown_tags();
    tracing::debug!(
        values = values.len(),
        consumed,
        unknown_tags = unknown_tags.len(),
        "decoded blizzerial buffer"
    );
    Ok(Decoded {
        values,
        consumed,
        unknown_tags,
    })
}

/// Decodes `buffer` and maps its first top-level value onto `schema`.
///
/// The first value must be a sequence (an array or a sparse map) with exactly
/// as many positions as `schema` has entries.
///
/// # Errors
/// Fails with [`DecodeError::MissingArgument`] on an empty buffer, and with
/// the first decoding or mapping error otherwise. No partial record is returned.
///
/// # Example
/// ```rust
/// use blizzerial::{parse, FieldSpec, Mapped, Schema, Value};
///
/// // [ "ok", 1 ]
/// let buffer = vec![0x04, 0x01, 0x00, 0x04, 0x02, 0x04, b'o', b'k', 0x06, 0x02];
/// let schema = vec![Schema::from(FieldSpec::string("name")), Schema::name("id")];
/// let record = parse(buffer, &schema).unwrap();
/// assert_eq!(record["name"], Mapped::Text("ok".to_string()));
/// assert_eq!(record["id"], Mapped::Value(Value::SmallInt(1)));
/// ```
pub fn parse(buffer: impl Into<Bytes>, schema: &[Schema]) -> Result<Record> {
    parse_with(buffer, schema, &DecodeOptions::default())
}

/// Like [`parse`], with explicit [`DecodeOptions`].
pub fn parse_with(
    buffer: impl Into<Bytes>,
    schema: &[Schema],
    options: &DecodeOptions,
) -> Result<Record> {
    let buffer = buffer.into();
    if !buffer.has_remaining() {
        return Err(DecodeError::MissingArgument("buffer"));
    }
    let decoded = parse_values_with(buffer, options)?;
    if decoded.values.len() > 1 {
        tracing::debug!(
            ignored = decoded.values.len() - 1,
            "mapping first top-level value only"
        );
    }
    match decoded.values.first() {
        Some(root) => map_values(root, schema),
        None => Err(DecodeError::MissingArgument("buffer")),
    }
}
