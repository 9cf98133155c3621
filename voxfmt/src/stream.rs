//! Fallible cursors over in-memory file contents.
//!
//! Every codec reads through a [`ByteReader`] and writes through a [`ByteWriter`].
//! Reads never panic: running off the end of the data yields [`StreamError::Truncated`].
//! Each multi-byte accessor names its byte order, since formats mix them freely.

use std::fmt;

/// Errors from [`ByteReader`] and [`ByteWriter`] operations.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum StreamError {
    /// A read needed more bytes than remain.
    #[error("unexpected end of data: needed {needed} bytes at offset {pos}, {remaining} remain")]
    Truncated {
        /// Number of bytes the read required.
        needed: usize,
        /// Number of bytes that were available.
        remaining: usize,
        /// Cursor position at the start of the failed read.
        pos: usize,
    },

    /// A seek or skip targeted a position outside the data.
    #[error("position {target} is outside the data of length {len}")]
    OutOfRange {
        /// Requested absolute position.
        target: usize,
        /// Length of the data.
        len: usize,
    },

    /// Text could not be read or written as requested.
    #[error("invalid text at offset {pos}: {reason}")]
    InvalidText {
        /// Cursor position where the text started.
        pos: usize,
        /// What was wrong.
        reason: &'static str,
    },
}

// -------------------------------------------------------------------------------------------------

macro_rules! reader_scalars {
    ($($ty:ident: $read_le:ident $read_be:ident $peek_le:ident $peek_be:ident;)*) => {
        $(
            #[doc = concat!("Reads a little-endian `", stringify!($ty), "`.")]
            #[inline]
            pub fn $read_le(&mut self) -> Result<$ty, StreamError> {
                Ok($ty::from_le_bytes(self.read_array()?))
            }
            #[doc = concat!("Reads a big-endian `", stringify!($ty), "`.")]
            #[inline]
            pub fn $read_be(&mut self) -> Result<$ty, StreamError> {
                Ok($ty::from_be_bytes(self.read_array()?))
            }
            #[doc = concat!("Reads a little-endian `", stringify!($ty), "` without advancing.")]
            #[inline]
            pub fn $peek_le(&self) -> Result<$ty, StreamError> {
                Ok($ty::from_le_bytes(self.peek_array()?))
            }
            #[doc = concat!("Reads a big-endian `", stringify!($ty), "` without advancing.")]
            #[inline]
            pub fn $peek_be(&self) -> Result<$ty, StreamError> {
                Ok($ty::from_be_bytes(self.peek_array()?))
            }
        )*
    };
}

/// Read cursor over a byte slice.
#[derive(Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Starts reading `data` from the beginning.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Total length of the data.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the data is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current cursor position.
    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Number of bytes after the cursor.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Whether the cursor is at the end of the data.
    #[inline]
    pub fn is_eof(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// The bytes after the cursor, without advancing.
    #[inline]
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Moves the cursor to the absolute position `target`, which may equal the length.
    pub fn seek(&mut self, target: usize) -> Result<(), StreamError> {
        if target > self.data.len() {
            return Err(StreamError::OutOfRange {
                target,
                len: self.data.len(),
            });
        }
        self.pos = target;
        Ok(())
    }

    /// Advances the cursor by `count` bytes.
    pub fn skip(&mut self, count: usize) -> Result<(), StreamError> {
        self.seek(self.pos.saturating_add(count))
    }

    fn truncated(&self, needed: usize) -> StreamError {
        StreamError::Truncated {
            needed,
            remaining: self.remaining(),
            pos: self.pos,
        }
    }

    /// Returns the next `count` bytes without advancing.
    pub fn peek_bytes(&self, count: usize) -> Result<&'a [u8], StreamError> {
        self.data
            .get(self.pos..)
            .and_then(|rest| rest.get(..count))
            .ok_or_else(|| self.truncated(count))
    }

    /// Reads the next `count` bytes.
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], StreamError> {
        let bytes = self.peek_bytes(count)?;
        self.pos += count;
        Ok(bytes)
    }

    /// Reads exactly `N` bytes into an array.
    #[inline]
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], StreamError> {
        let array = self.peek_array()?;
        self.pos += N;
        Ok(array)
    }

    #[inline]
    fn peek_array<const N: usize>(&self) -> Result<[u8; N], StreamError> {
        let mut array = [0; N];
        array.copy_from_slice(self.peek_bytes(N)?);
        Ok(array)
    }

    /// Reads one byte.
    #[inline]
    pub fn read_u8(&mut self) -> Result<u8, StreamError> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Reads one byte without advancing.
    #[inline]
    pub fn peek_u8(&self) -> Result<u8, StreamError> {
        Ok(self.peek_array::<1>()?[0])
    }

    /// Reads one signed byte.
    #[inline]
    pub fn read_i8(&mut self) -> Result<i8, StreamError> {
        Ok(i8::from_le_bytes(self.read_array()?))
    }

    reader_scalars! {
        u16: read_u16_le read_u16_be peek_u16_le peek_u16_be;
        i16: read_i16_le read_i16_be peek_i16_le peek_i16_be;
        u32: read_u32_le read_u32_be peek_u32_le peek_u32_be;
        i32: read_i32_le read_i32_be peek_i32_le peek_i32_be;
        u64: read_u64_le read_u64_be peek_u64_le peek_u64_be;
        i64: read_i64_le read_i64_be peek_i64_le peek_i64_be;
        f32: read_f32_le read_f32_be peek_f32_le peek_f32_be;
    }

    /// Reads `len` bytes as text. Invalid UTF-8 is replaced, not rejected,
    /// since names in voxel files are frequently in legacy encodings.
    pub fn read_string(&mut self, len: usize) -> Result<String, StreamError> {
        Ok(String::from_utf8_lossy(self.read_bytes(len)?).into_owned())
    }

    /// Reads a string preceded by a one-byte length.
    pub fn read_pascal_string_u8(&mut self) -> Result<String, StreamError> {
        let len = self.read_u8()?;
        self.read_string(usize::from(len))
    }

    /// Reads a string preceded by a little-endian `u16` length.
    pub fn read_pascal_string_u16_le(&mut self) -> Result<String, StreamError> {
        let len = self.read_u16_le()?;
        self.read_string(usize::from(len))
    }

    /// Reads a string preceded by a little-endian `u32` length.
    pub fn read_pascal_string_u32_le(&mut self) -> Result<String, StreamError> {
        let len = self.read_u32_le()?;
        self.read_string(len as usize)
    }

    /// Reads a string preceded by a big-endian `u32` length.
    pub fn read_pascal_string_u32_be(&mut self) -> Result<String, StreamError> {
        let len = self.read_u32_be()?;
        self.read_string(len as usize)
    }

    /// Reads a zero-terminated string, consuming the terminator.
    ///
    /// Fails with [`StreamError::InvalidText`] if no terminator occurs within `max_len`
    /// bytes, or with [`StreamError::Truncated`] if the data ends first.
    pub fn read_cstring(&mut self, max_len: usize) -> Result<String, StreamError> {
        let start = self.pos;
        let rest = self.rest();
        let Some(end) = rest.iter().take(max_len + 1).position(|&b| b == 0) else {
            return Err(if rest.len() <= max_len {
                self.truncated(rest.len() + 1)
            } else {
                StreamError::InvalidText {
                    pos: start,
                    reason: "string too long",
                }
            });
        };
        let text = String::from_utf8_lossy(&rest[..end]).into_owned();
        self.pos += end + 1;
        Ok(text)
    }

    /// Reads up to and including the next `\n`, returning the text before it with any
    /// trailing `\r` removed.
    ///
    /// At the end of the data, a final unterminated line is returned as-is; if no bytes
    /// remain at all, fails with [`StreamError::Truncated`]. Fails with
    /// [`StreamError::InvalidText`] if no newline occurs within `max_len` bytes.
    pub fn read_line(&mut self, max_len: usize) -> Result<String, StreamError> {
        let start = self.pos;
        let rest = self.rest();
        if rest.is_empty() {
            return Err(self.truncated(1));
        }
        let (line, consumed) = match rest.iter().position(|&b| b == b'\n') {
            Some(newline) => (&rest[..newline], newline + 1),
            None => (rest, rest.len()),
        };
        if line.len() > max_len {
            return Err(StreamError::InvalidText {
                pos: start,
                reason: "line too long",
            });
        }
        self.pos += consumed;
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        Ok(String::from_utf8_lossy(line).into_owned())
    }
}

impl fmt::Debug for ByteReader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteReader")
            .field("len", &self.data.len())
            .field("pos", &self.pos)
            .finish_non_exhaustive()
    }
}

// -------------------------------------------------------------------------------------------------

macro_rules! writer_scalars {
    ($($ty:ident: $write_le:ident $write_be:ident;)*) => {
        $(
            #[doc = concat!("Writes a little-endian `", stringify!($ty), "`.")]
            #[inline]
            pub fn $write_le(&mut self, value: $ty) {
                self.write_bytes(&value.to_le_bytes());
            }
            #[doc = concat!("Writes a big-endian `", stringify!($ty), "`.")]
            #[inline]
            pub fn $write_be(&mut self, value: $ty) {
                self.write_bytes(&value.to_be_bytes());
            }
        )*
    };
}

/// Position of a placeholder written by [`ByteWriter::reserve_u32_le()`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[must_use = "a reserved field should be patched"]
pub struct Reserved(usize);

impl Reserved {
    /// Position of the first byte after the placeholder.
    pub fn end(self) -> usize {
        self.0 + 4
    }
}

/// Write cursor over a growable buffer.
///
/// Writing at a position before the end overwrites; writing past the end extends.
/// Together with [`seek()`](Self::seek) this supports writing a placeholder size field,
/// writing the body, and going back to fill in the real size.
#[derive(Clone, Default)]
pub struct ByteWriter {
    data: Vec<u8>,
    pos: usize,
}

impl ByteWriter {
    /// Constructs an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current cursor position.
    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Length of the data written so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing has been written.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The data written so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Finishes writing, returning the data.
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    /// Moves the cursor to the absolute position `target`, which may equal the length.
    pub fn seek(&mut self, target: usize) -> Result<(), StreamError> {
        if target > self.data.len() {
            return Err(StreamError::OutOfRange {
                target,
                len: self.data.len(),
            });
        }
        self.pos = target;
        Ok(())
    }

    /// Moves the cursor to the end of the data.
    pub fn seek_end(&mut self) {
        self.pos = self.data.len();
    }

    /// Writes `bytes` at the cursor.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        let end = self.pos + bytes.len();
        let overlap = end.min(self.data.len()).saturating_sub(self.pos);
        self.data[self.pos..self.pos + overlap].copy_from_slice(&bytes[..overlap]);
        self.data.extend_from_slice(&bytes[overlap..]);
        self.pos = end;
    }

    /// Writes one byte.
    #[inline]
    pub fn write_u8(&mut self, value: u8) {
        self.write_bytes(&[value]);
    }

    /// Writes one signed byte.
    #[inline]
    pub fn write_i8(&mut self, value: i8) {
        self.write_bytes(&value.to_le_bytes());
    }

    writer_scalars! {
        u16: write_u16_le write_u16_be;
        i16: write_i16_le write_i16_be;
        u32: write_u32_le write_u32_be;
        i32: write_i32_le write_i32_be;
        u64: write_u64_le write_u64_be;
        i64: write_i64_le write_i64_be;
        f32: write_f32_le write_f32_be;
    }

    /// Writes the bytes of `text` with no length or terminator.
    pub fn write_string(&mut self, text: &str) {
        self.write_bytes(text.as_bytes());
    }

    /// Writes the bytes of `text` followed by a zero byte.
    pub fn write_cstring(&mut self, text: &str) {
        self.write_string(text);
        self.write_u8(0);
    }

    /// Writes `text` preceded by a one-byte length.
    pub fn write_pascal_string_u8(&mut self, text: &str) -> Result<(), StreamError> {
        let len = u8::try_from(text.len()).map_err(|_| StreamError::InvalidText {
            pos: self.pos,
            reason: "string longer than 255 bytes",
        })?;
        self.write_u8(len);
        self.write_string(text);
        Ok(())
    }

    /// Writes `text` preceded by a little-endian `u32` length.
    pub fn write_pascal_string_u32_le(&mut self, text: &str) -> Result<(), StreamError> {
        let len = u32::try_from(text.len()).map_err(|_| StreamError::InvalidText {
            pos: self.pos,
            reason: "string longer than u32::MAX bytes",
        })?;
        self.write_u32_le(len);
        self.write_string(text);
        Ok(())
    }

    /// Writes a zero placeholder for a little-endian `u32`, to be filled in by
    /// [`patch_u32_le()`](Self::patch_u32_le).
    pub fn reserve_u32_le(&mut self) -> Reserved {
        let at = self.pos;
        self.write_u32_le(0);
        Reserved(at)
    }

    /// Overwrites a placeholder, leaving the cursor where it was.
    pub fn patch_u32_le(&mut self, reserved: Reserved, value: u32) {
        let resume = self.pos;
        self.pos = reserved.0;
        self.write_u32_le(value);
        self.pos = resume;
    }

    /// Patches `reserved` with the number of bytes from its end to the cursor.
    pub fn patch_size_since(&mut self, reserved: Reserved) -> Result<(), StreamError> {
        let size = self.pos.saturating_sub(reserved.end());
        let size = u32::try_from(size).map_err(|_| StreamError::OutOfRange {
            target: size,
            len: u32::MAX as usize,
        })?;
        self.patch_u32_le(reserved, size);
        Ok(())
    }
}

impl fmt::Debug for ByteWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteWriter")
            .field("len", &self.data.len())
            .field("pos", &self.pos)
            .finish_non_exhaustive()
    }
}
