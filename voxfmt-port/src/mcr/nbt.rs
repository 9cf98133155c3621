//! Minecraft's Named Binary Tag format, big-endian Java edition flavor.

use std::collections::HashMap;

use voxfmt::stream::ByteReader;

use crate::FormatError;


/// Compounds nested deeper than this are rejected.
const MAX_DEPTH: usize = 512;

const TAG_END: u8 = 0;
const TAG_BYTE: u8 = 1;
const TAG_SHORT: u8 = 2;
const TAG_INT: u8 = 3;
const TAG_LONG: u8 = 4;
const TAG_FLOAT: u8 = 5;
const TAG_DOUBLE: u8 = 6;
const TAG_BYTE_ARRAY: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_LIST: u8 = 9;
const TAG_COMPOUND: u8 = 10;
const TAG_INT_ARRAY: u8 = 11;
const TAG_LONG_ARRAY: u8 = 12;

pub(crate) type Compound = HashMap<String, Tag>;

/// One decoded tag.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Tag {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<u8>),
    String(String),
    List(Vec<Tag>),
    Compound(Compound),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
}

impl Tag {
    pub(crate) fn get(&self, key: &str) -> Option<&Tag> {
        match self {
            Tag::Compound(entries) => entries.get(key),
            _ => None,
        }
    }

    /// Numeric value of any integer tag.
    pub(crate) fn as_i64(&self) -> Option<i64> {
        match *self {
            Tag::Byte(v) => Some(v.into()),
            Tag::Short(v) => Some(v.into()),
            Tag::Int(v) => Some(v.into()),
            Tag::Long(v) => Some(v),
            _ => None,
        }
    }

    pub(crate) fn as_str(&self) -> Option<&str> {
        match self {
            Tag::String(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn as_list(&self) -> Option<&[Tag]> {
        match self {
            Tag::List(items) => Some(items),
            _ => None,
        }
    }
}

/// Parses a whole NBT document, whose root must be a named compound.
pub(crate) fn parse(bytes: &[u8]) -> Result<Tag, FormatError> {
    let r = &mut ByteReader::new(bytes);
    let root_type = r.read_u8()?;
    if root_type != TAG_COMPOUND {
        return Err(FormatError::malformed(format!(
            "nbt root tag of type {root_type}"
        )));
    }
    let name = read_name(r)?;
    log::trace!("nbt root {name:?}");
    read_payload(r, root_type, 0)
}

fn read_name(r: &mut ByteReader<'_>) -> Result<String, FormatError> {
    let len = r.read_u16_be()?;
    Ok(String::from_utf8_lossy(r.read_bytes(len.into())?).into_owned())
}

/// Reads an array length and checks that that many elements of `element_len` bytes remain,
/// so that the allocation is bounded by the input.
fn read_array_len(r: &mut ByteReader<'_>, element_len: usize) -> Result<usize, FormatError> {
    let len = r.read_i32_be()?;
    let len = usize::try_from(len)
        .map_err(|_| FormatError::malformed(format!("nbt array length {len}")))?;
    r.peek_bytes(len.saturating_mul(element_len))?;
    Ok(len)
}

fn read_payload(r: &mut ByteReader<'_>, tag_type: u8, depth: usize) -> Result<Tag, FormatError> {
    if depth > MAX_DEPTH {
        return Err(FormatError::malformed("nbt nested too deeply"));
    }
    Ok(match tag_type {
        TAG_BYTE => Tag::Byte(r.read_i8()?),
        TAG_SHORT => Tag::Short(r.read_i16_be()?),
        TAG_INT => Tag::Int(r.read_i32_be()?),
        TAG_LONG => Tag::Long(r.read_i64_be()?),
        TAG_FLOAT => Tag::Float(r.read_f32_be()?),
        TAG_DOUBLE => Tag::Double(f64::from_bits(r.read_u64_be()?)),
        TAG_BYTE_ARRAY => {
            let len = read_array_len(r, 1)?;
            Tag::ByteArray(r.read_bytes(len)?.to_vec())
        }
        TAG_STRING => Tag::String(read_name(r)?),
        TAG_LIST => {
            let element_type = r.read_u8()?;
            let len = read_array_len(r, 0)?;
            if element_type == TAG_END && len > 0 {
                return Err(FormatError::malformed("nbt list of end tags"));
            }
            let items = (0..len)
                .map(|_| read_payload(r, element_type, depth + 1))
                .collect::<Result<Vec<Tag>, FormatError>>()?;
            Tag::List(items)
        }
        TAG_COMPOUND => {
            let mut entries = Compound::new();
            loop {
                let entry_type = r.read_u8()?;
                if entry_type == TAG_END {
                    break;
                }
                let name = read_name(r)?;
                let value = read_payload(r, entry_type, depth + 1)?;
                entries.insert(name, value);
            }
            Tag::Compound(entries)
        }
        TAG_INT_ARRAY => {
            let len = read_array_len(r, 4)?;
            Tag::IntArray((0..len).map(|_| r.read_i32_be()).collect::<Result<_, _>>()?)
        }
        TAG_LONG_ARRAY => {
            let len = read_array_len(r, 8)?;
            Tag::LongArray((0..len).map(|_| r.read_i64_be()).collect::<Result<_, _>>()?)
        }
        other => {
            return Err(FormatError::malformed(format!("unknown nbt tag type {other}")));
        }
    })
}
