use bytes::Bytes;
use num_bigint::BigInt;
use std::collections::BTreeMap;

/// A decoded value.
///
/// Sparse maps are kept apart from sequences so that gaps stay visible, but
/// the schema mapper treats both as positional sequences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Placeholder for a tag with no decoder.
    Null,
    Bytes(Bytes),
    /// Int8, Int32, or a VarInt of at most four groups.
    SmallInt(i64),
    /// A VarInt of more than four groups.
    BigInt(BigInt),
    Sequence(Vec<Value>),
    SparseMap(SparseMap),
}

impl Value {
    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bytes(_) => "bytes",
            Value::SmallInt(_) => "small integer",
            Value::BigInt(_) => "big integer",
            Value::Sequence(_) => "sequence",
            Value::SparseMap(_) => "sparse map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Value::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Returns the integer value if it fits in an `i64`, whichever width it was decoded with.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::SmallInt(v) => Some(*v),
            Value::BigInt(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_sparse_map(&self) -> Option<&SparseMap> {
        match self {
            Value::SparseMap(map) => Some(map),
            _ => None,
        }
    }

    /// Number of positions when read as a sequence.
    ///
    /// `None` for values that are neither sequences nor sparse maps. A sparse
    /// map counts its gaps.
    pub fn positional_len(&self) -> Option<usize> {
        match self {
            Value::Sequence(items) => Some(items.len()),
            Value::SparseMap(map) => Some(map.len()),
            _ => None,
        }
    }

    /// The value at `position` when read as a sequence; `None` for gaps and
    /// out-of-range positions.
    pub fn slot(&self, position: usize) -> Option<&Value> {
        match self {
            Value::Sequence(items) => items.get(position),
            Value::SparseMap(map) => map.get(position),
            _ => None,
        }
    }
}

/// Most gaps a sparse map may have and still be expanded into one slot per
/// position.
pub const MAX_SPARSE_GAPS: usize = 1 << 16;

/// A collection indexed by non-negative integer keys that may skip positions.
///
/// Keys seen on the wire are often non-contiguous (for example `0, 1, 2, 4`).
/// The map's length is one past its largest key, so skipped keys still occupy
/// a position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SparseMap {
    entries: BTreeMap<usize, Value>,
}

impl SparseMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` at `key`, returning the value previously stored there.
    pub fn insert(&mut self, key: usize, value: Value) -> Option<Value> {
        self.entries.insert(key, value)
    }

    pub fn get(&self, key: usize) -> Option<&Value> {
        self.entries.get(&key)
    }

    /// Returns true if `key` is within the map but has no value.
    pub fn is_absent(&self, key: usize) -> bool {
        key < self.len() && !self.entries.contains_key(&key)
    }

    /// `max_key + 1`, or 0 when empty.
    pub fn len(&self) -> usize {
        self.entries.keys().next_back().map_or(0, |max| max.saturating_add(1))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of keys that hold a value.
    pub fn populated(&self) -> usize {
        self.entries.len()
    }

    /// Number of positions below [`len`](Self::len) that hold no value.
    pub fn gaps(&self) -> usize {
        self.len() - self.populated()
    }

    /// One slot per position, `None` for gaps.
    ///
    /// Returns `None` when the map has more than [`MAX_SPARSE_GAPS`] gaps.
    pub fn positions(&self) -> Option<Vec<Option<&Value>>> {
        if self.gaps() > MAX_SPARSE_GAPS {
            return None;
        }
        let mut slots = Vec::with_capacity(self.len());
        for (key, value) in self.iter() {
            slots.resize(key, None);
            slots.push(Some(value));
        }
        Some(slots)
    }

    /// Populated entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Value)> {
        self.entries.iter().map(|(key, value)| (*key, value))
    }
}

impl FromIterator<(usize, Value)> for SparseMap {
    fn from_iter<I: IntoIterator<Item = (usize, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
