//! Little-endian primitive codec.
//!
//! Two layers: [`Reader`], a bounds-checked cursor used by every typed
//! decoder in this crate, and the schema-driven [`unpack`]/[`pack`] pair
//! which maps an ordered list of named fixed-width fields onto a byte
//! buffer of exactly matching length.

use std::collections::BTreeMap;

use crate::error::CoreError;

// ==============================================================================
// Cursor
// ==============================================================================

/// Bounds-checked little-endian cursor over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    context: &'static str,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8], context: &'static str) -> Self {
        Self {
            data,
            pos: 0,
            context,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], CoreError> {
        if self.remaining() < len {
            return Err(CoreError::Truncated {
                context: self.context,
                needed: len,
                available: self.remaining(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CoreError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, CoreError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, CoreError> {
        Ok(i8::from_le_bytes(self.read_array()?))
    }

    pub fn read_u16(&mut self) -> Result<u16, CoreError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16, CoreError> {
        Ok(i16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, CoreError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, CoreError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Skip `len` bytes without inspecting them.
    pub fn skip(&mut self, len: usize) -> Result<(), CoreError> {
        self.read_bytes(len).map(|_| ())
    }

    /// Split off the next `len` bytes as an independent reader and advance
    /// past them.
    pub fn sub_reader(&mut self, len: usize, context: &'static str) -> Result<Reader<'a>, CoreError> {
        Ok(Reader::new(self.read_bytes(len)?, context))
    }

    /// Consume and return everything left in the buffer.
    pub fn rest(&mut self) -> &'a [u8] {
        let bytes = &self.data[self.pos..];
        self.pos = self.data.len();
        bytes
    }

    /// Fail unless every byte has been consumed.
    pub fn ensure_exhausted(&self) -> Result<(), CoreError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(CoreError::LengthMismatch {
                context: self.context,
                expected: self.pos,
                actual: self.data.len(),
            })
        }
    }
}

/// Round `size` up to the next multiple of 8, the alignment used between
/// consecutive transactions in a block or aggregate.
pub fn padded_size(size: usize) -> usize {
    size + (8 - size % 8) % 8
}

// ==============================================================================
// Schema Unpacking
// ==============================================================================

/// Wire format of a single schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldFormat {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    Bytes(usize),
}

impl FieldFormat {
    pub fn size(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 => 4,
            Self::U64 | Self::I64 => 8,
            Self::Bytes(len) => len,
        }
    }
}

/// A decoded schema field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Unsigned(u64),
    Signed(i64),
    Bytes(Vec<u8>),
}

impl FieldValue {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Unsigned(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(v) => Some(v),
            _ => None,
        }
    }
}

/// Ordered field-name → format list.
pub type Schema = [(&'static str, FieldFormat)];

/// Name → value mapping produced by [`unpack`].
pub type Record = BTreeMap<&'static str, FieldValue>;

pub fn schema_size(schema: &Schema) -> usize {
    schema.iter().map(|(_, format)| format.size()).sum()
}

/// Decode `buffer` against `schema`. The buffer length must equal the
/// schema size exactly.
pub fn unpack(buffer: &[u8], schema: &Schema) -> Result<Record, CoreError> {
    let expected = schema_size(schema);
    if buffer.len() != expected {
        return Err(CoreError::LengthMismatch {
            context: "schema unpack",
            expected,
            actual: buffer.len(),
        });
    }

    let mut reader = Reader::new(buffer, "schema unpack");
    let mut record = Record::new();
    for &(name, format) in schema {
        let value = match format {
            FieldFormat::U8 => FieldValue::Unsigned(reader.read_u8()?.into()),
            FieldFormat::U16 => FieldValue::Unsigned(reader.read_u16()?.into()),
            FieldFormat::U32 => FieldValue::Unsigned(reader.read_u32()?.into()),
            FieldFormat::U64 => FieldValue::Unsigned(reader.read_u64()?),
            FieldFormat::I8 => FieldValue::Signed(reader.read_i8()?.into()),
            FieldFormat::I16 => FieldValue::Signed(reader.read_i16()?.into()),
            FieldFormat::I32 => FieldValue::Signed(i32::from_le_bytes(reader.read_array()?).into()),
            FieldFormat::I64 => FieldValue::Signed(i64::from_le_bytes(reader.read_array()?)),
            FieldFormat::Bytes(len) => FieldValue::Bytes(reader.read_bytes(len)?.to_vec()),
        };
        record.insert(name, value);
    }
    Ok(record)
}

/// Encode `record` against `schema`, the inverse of [`unpack`]. Missing
/// fields or values that do not fit their format are reported as a length
/// mismatch on the offending field.
pub fn pack(record: &Record, schema: &Schema) -> Result<Vec<u8>, CoreError> {
    let mut out = Vec::with_capacity(schema_size(schema));
    for &(name, format) in schema {
        let mismatch = |actual: usize| CoreError::LengthMismatch {
            context: name,
            expected: format.size(),
            actual,
        };
        match (format, record.get(name)) {
            (FieldFormat::Bytes(len), Some(FieldValue::Bytes(bytes))) => {
                if bytes.len() != len {
                    return Err(mismatch(bytes.len()));
                }
                out.extend_from_slice(bytes);
            }
            (FieldFormat::U8, Some(FieldValue::Unsigned(v))) => {
                out.push(u8::try_from(*v).map_err(|_| mismatch(8))?)
            }
            (FieldFormat::U16, Some(FieldValue::Unsigned(v))) => out.extend_from_slice(
                &u16::try_from(*v).map_err(|_| mismatch(8))?.to_le_bytes(),
            ),
            (FieldFormat::U32, Some(FieldValue::Unsigned(v))) => out.extend_from_slice(
                &u32::try_from(*v).map_err(|_| mismatch(8))?.to_le_bytes(),
            ),
            (FieldFormat::U64, Some(FieldValue::Unsigned(v))) => {
                out.extend_from_slice(&v.to_le_bytes())
            }
            (FieldFormat::I8, Some(FieldValue::Signed(v))) => out.extend_from_slice(
                &i8::try_from(*v).map_err(|_| mismatch(8))?.to_le_bytes(),
            ),
            (FieldFormat::I16, Some(FieldValue::Signed(v))) => out.extend_from_slice(
                &i16::try_from(*v).map_err(|_| mismatch(8))?.to_le_bytes(),
            ),
            (FieldFormat::I32, Some(FieldValue::Signed(v))) => out.extend_from_slice(
                &i32::try_from(*v).map_err(|_| mismatch(8))?.to_le_bytes(),
            ),
            (FieldFormat::I64, Some(FieldValue::Signed(v))) => {
                out.extend_from_slice(&v.to_le_bytes())
            }
            _ => return Err(mismatch(0)),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &Schema = &[
        ("size", FieldFormat::U32),
        ("delta", FieldFormat::I8),
        ("id", FieldFormat::U64),
        ("key", FieldFormat::Bytes(3)),
    ];

    #[test]
    fn unpack_reads_little_endian_fields_in_order() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0x0102_0304u32.to_le_bytes());
        buf.push(0xFF);
        buf.extend_from_slice(&42u64.to_le_bytes());
        buf.extend_from_slice(b"abc");

        let record = unpack(&buf, SCHEMA).expect("unpack");
        assert_eq!(record["size"], FieldValue::Unsigned(0x0102_0304));
        assert_eq!(record["delta"], FieldValue::Signed(-1));
        assert_eq!(record["id"].as_u64(), Some(42));
        assert_eq!(record["key"].as_bytes(), Some(&b"abc"[..]));

        assert_eq!(pack(&record, SCHEMA).expect("pack"), buf);
    }

    #[test]
    fn unpack_rejects_length_mismatch() {
        let err = unpack(&[0u8; 15], SCHEMA).unwrap_err();
        assert!(matches!(
            err,
            CoreError::LengthMismatch {
                expected: 16,
                actual: 15,
                ..
            }
        ));
        assert!(unpack(&[0u8; 17], SCHEMA).is_err());
    }

    #[test]
    fn reader_reports_truncation() {
        let mut reader = Reader::new(&[1, 2, 3], "test");
        assert_eq!(reader.read_u16().expect("u16"), 0x0201);
        let err = reader.read_u32().unwrap_err();
        assert!(matches!(
            err,
            CoreError::Truncated {
                needed: 4,
                available: 1,
                ..
            }
        ));
    }

    #[test]
    fn reader_ensure_exhausted() {
        let mut reader = Reader::new(&[1, 2], "test");
        reader.read_u8().expect("u8");
        assert!(reader.ensure_exhausted().is_err());
        assert_eq!(reader.rest(), &[2]);
        reader.ensure_exhausted().expect("exhausted");
    }

    #[test]
    fn padding_rounds_to_eight() {
        assert_eq!(padded_size(176), 176);
        assert_eq!(padded_size(177), 184);
        assert_eq!(padded_size(81), 88);
        assert_eq!(padded_size(0), 0);
    }
}
