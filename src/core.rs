use crate::*;
use num_bigint::{BigInt, BigUint, Sign};
use std::fmt;

/// Type tags used in the blizzerial binary format.
///
/// Each encoded value starts with one of these bytes. Tags outside this set
/// have no decoder; see [`UnknownTagPolicy`].

///< Length-prefixed raw bytes
pub const TAG_BYTE_STRING: u8 = 2;
///< Marker, count, then nested values
pub const TAG_ARRAY: u8 = 4;
///< Count, then (key, value) pairs
pub const TAG_SPARSE_MAP: u8 = 5;
pub const TAG_INT8: u8 = 6;
pub const TAG_INT32: u8 = 7;
pub const TAG_VARINT: u8 = 9;

/// Bytes that must follow every array tag.
pub const ARRAY_MARKER: [u8; 2] = [0x01, 0x00];

/// VarInts with at most this many 7-bit groups decode to [`Integer::Small`].
pub const SMALL_VARINT_GROUPS: usize = 4;

/// A decoded VarInt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Integer {
    /// Encoded in at most [`SMALL_VARINT_GROUPS`] groups.
    Small(i64),
    /// Encoded in more than [`SMALL_VARINT_GROUPS`] groups.
    Big(BigInt),
}

impl Integer {
    pub fn is_negative(&self) -> bool {
        match self {
            Integer::Small(v) => *v < 0,
            Integer::Big(v) => v.sign() == Sign::Minus,
        }
    }

    /// Returns the value as a position or length, if it is non-negative and fits.
    pub fn to_usize(&self) -> Option<usize> {
        match self {
            Integer::Small(v) => usize::try_from(*v).ok(),
            Integer::Big(v) => usize::try_from(v).ok(),
        }
    }
}

impl fmt::Display for Integer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Integer::Small(v) => write!(f, "{}", v),
            Integer::Big(v) => write!(f, "{}", v),
        }
    }
}

impl From<Integer> for Value {
    fn from(value: Integer) -> Self {
        match value {
            Integer::Small(v) => Value::SmallInt(v),
            Integer::Big(v) => Value::BigInt(v),
        }
    }
}

#[inline]
fn ensure(reader: &Bytes, needed: usize) -> Result<()> {
    if reader.remaining() < needed {
        return Err(DecodeError::TruncatedBuffer {
            needed,
            remaining: reader.remaining(),
        });
    }
    Ok(())
}

#[inline]
fn apply_sign(negative: bool, magnitude: i64) -> i64 {
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

/// Converts a decoded count or length into a `usize`.
///
/// # Errors
/// Returns `NegativeLength` for negative values and `TruncatedBuffer` for
/// counts no buffer could hold.
fn length_from(length: Integer, reader: &Bytes) -> Result<usize> {
    if length.is_negative() {
        return Err(DecodeError::NegativeLength { length });
    }
    length.to_usize().ok_or(DecodeError::TruncatedBuffer {
        needed: usize::MAX,
        remaining: reader.remaining(),
    })
}

/// Decodes a VarInt.
///
/// Each byte carries 7 bits of the raw value, lowest group first, and sets
/// `0x80` when another byte follows. The low bit of the raw value is the sign
/// (1 = negative) and the remaining bits are the magnitude.
///
/// # Returns
/// `(value, bytes_consumed)`.
///
/// # Errors
/// Returns `TruncatedBuffer` if the buffer ends before a byte without the
/// continuation bit.
pub fn read_varint(reader: &mut Bytes) -> Result<(Integer, usize)> {
    let len = match reader.iter().position(|byte| byte & 0x80 == 0) {
        Some(last) => last + 1,
        None => {
            return Err(DecodeError::TruncatedBuffer {
                needed: reader.remaining() + 1,
                remaining: reader.remaining(),
            })
        }
    };
    let groups = reader.split_to(len);
    let negative = groups[0] & 1 == 1;

    let value = if len <= SMALL_VARINT_GROUPS {
        let raw = groups
            .iter()
            .enumerate()
            .fold(0i64, |acc, (i, byte)| acc | (i64::from(byte & 0x7F) << (7 * i)));
        Integer::Small(apply_sign(negative, raw >> 1))
    } else {
        let digits: Vec<u8> = groups.iter().map(|byte| byte & 0x7F).collect();
        // Every digit is below 128, so this never yields `None`.
        let raw = BigUint::from_radix_le(&digits, 128).unwrap_or_default();
        let sign = if negative { Sign::Minus } else { Sign::Plus };
        Integer::Big(BigInt::from_biguint(sign, raw >> 1u32))
    };
    Ok((value, len))
}

/// Decodes a one-byte integer: sign in bit 0, magnitude in bits 1-7.
pub fn read_int8(reader: &mut Bytes) -> Result<(i64, usize)> {
    ensure(reader, 1)?;
    let byte = reader.get_u8();
    Ok((apply_sign(byte & 1 == 1, i64::from(byte >> 1)), 1))
}

/// Decodes a four-byte integer.
///
/// The sign is bit 0 of the first byte. The magnitude is the first byte's
/// upper 7 bits followed by the other three bytes, packed as
/// `(b3 << 23) | (b2 << 15) | (b1 << 7) | (b0 >> 1)`.
pub fn read_int32(reader: &mut Bytes) -> Result<(i64, usize)> {
    ensure(reader, 4)?;
    let b0 = i64::from(reader.get_u8());
    let b1 = i64::from(reader.get_u8());
    let b2 = i64::from(reader.get_u8());
    let b3 = i64::from(reader.get_u8());
    let magnitude = (b3 << 23) | (b2 << 15) | (b1 << 7) | (b0 >> 1);
    Ok((apply_sign(b0 & 1 == 1, magnitude), 4))
}

/// Decodes a VarInt length followed by that many raw bytes.
///
/// The returned `Bytes` shares memory with the input buffer.
///
/// # Errors
/// Returns `NegativeLength` if the length is negative and `TruncatedBuffer`
/// if fewer bytes remain than the length announces.
pub fn read_byte_string(reader: &mut Bytes) -> Result<(Bytes, usize)> {
    let (length, header) = read_varint(reader)?;
    let length = length_from(length, reader)?;
    ensure(reader, length)?;
    Ok((reader.split_to(length), header + length))
}

/// The tag dispatcher.
///
/// Walks a buffer value by value, recursing into arrays and sparse maps and
/// recording the unknown tags it passes over.
pub struct ValueReader<'a> {
    reader: Bytes,
    total: usize,
    options: &'a DecodeOptions,
    depth: usize,
    unknown_tags: Vec<UnknownTag>,
}

impl<'a> ValueReader<'a> {
    pub fn new(buffer: Bytes, options: &'a DecodeOptions) -> Self {
        Self {
            total: buffer.len(),
            reader: buffer,
            options,
            depth: 0,
            unknown_tags: Vec::new(),
        }
    }

    /// Offset of the next unread byte from the start of the buffer.
    pub fn offset(&self) -> usize {
        self.total - self.reader.remaining()
    }

    pub fn into_unknown_tags(self) -> Vec<UnknownTag> {
        self.unknown_tags
    }

    /// Decodes `count` values, or every remaining value when `count` is `None`.
    ///
    /// # Returns
    /// `(values, bytes_consumed)`.
    ///
    /// # Errors
    /// A bounded read fails with `TruncatedBuffer` if the buffer runs out
    /// before `count` values were decoded.
    pub fn read_values(&mut self, count: Option<usize>) -> Result<(Vec<Value>, usize)> {
        let start = self.offset();
        // Every value takes at least one byte.
        let capacity = count.unwrap_or(0).min(self.reader.remaining());
        let mut values = Vec::with_capacity(capacity);
        loop {
            match count {
                Some(n) if values.len() >= n => break,
                None if !self.reader.has_remaining() => break,
                _ => {}
            }
            let (value, _) = self.read_value()?;
            values.push(value);
        }
        Ok((values, self.offset() - start))
    }

    /// Reads one tag byte and decodes the value it introduces.
    pub fn read_value(&mut self) -> Result<(Value, usize)> {
        ensure(&self.reader, 1)?;
        let start = self.offset();
        let tag = self.reader.get_u8();
        let value = match tag {
            TAG_BYTE_STRING => Value::Bytes(read_byte_string(&mut self.reader)?.0),
            TAG_ARRAY => self.read_array()?.0,
            TAG_SPARSE_MAP => self.read_sparse_map()?.0,
            TAG_INT8 => Value::SmallInt(read_int8(&mut self.reader)?.0),
            TAG_INT32 => Value::SmallInt(read_int32(&mut self.reader)?.0),
            TAG_VARINT => read_varint(&mut self.reader)?.0.into(),
            other => self.unknown_tag(other, start)?,
        };
        tracing::trace!(tag, offset = start, kind = value.kind(), "decoded value");
        Ok((value, self.offset() - start))
    }

    /// Decodes an array body: marker, count, then that many values.
    pub fn read_array(&mut self) -> Result<(Value, usize)> {
        let start = self.offset();
        ensure(&self.reader, ARRAY_MARKER.len())?;
        let found = [self.reader[0], self.reader[1]];
        if found != ARRAY_MARKER {
            return Err(DecodeError::MalformedArray { found });
        }
        self.reader.advance(ARRAY_MARKER.len());

        let (count, _) = read_varint(&mut self.reader)?;
        let count = length_from(count, &self.reader)?;
        let (values, _) = self.nested(|r| r.read_values(Some(count)))?;
        Ok((Value::Sequence(values), self.offset() - start))
    }

    /// Decodes a sparse map body: count, then that many `(key, value)` pairs.
    ///
    /// A repeated key keeps the last value read for it.
    pub fn read_sparse_map(&mut self) -> Result<(Value, usize)> {
        let start = self.offset();
        let (count, _) = read_varint(&mut self.reader)?;
        let count = length_from(count, &self.reader)?;
        let map = self.nested(|r| {
            let mut map = SparseMap::new();
            for _ in 0..count {
                let offset = r.offset();
                let (key, _) = read_varint(&mut r.reader)?;
                let position = match key.to_usize().filter(|key| *key < usize::MAX) {
                    Some(position) => position,
                    None => return Err(DecodeError::InvalidMapKey { key, offset }),
                };
                let (value, _) = r.read_value()?;
                map.insert(position, value);
            }
            Ok(map)
        })?;
        Ok((Value::SparseMap(map), self.offset() - start))
    }

    fn nested<T>(&mut self, read: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= self.options.max_depth {
            return Err(DecodeError::DepthLimitExceeded {
                limit: self.options.max_depth,
            });
        }
        self.depth += 1;
        let result = read(self);
        self.depth -= 1;
        result
    }

    fn unknown_tag(&mut self, tag: u8, offset: usize) -> Result<Value> {
        match self.options.unknown_tags {
            UnknownTagPolicy::Reject => Err(DecodeError::UnknownTag { tag, offset }),
            UnknownTagPolicy::Placeholder => {
                tracing::warn!(tag, offset, "unknown tag decoded as null placeholder");
                self.unknown_tags.push(UnknownTag { tag, offset });
                Ok(Value::Null)
            }
        }
    }
}
