//! Bounds-checked wire buffer primitives.
//!
//! Integers travel big-endian. A string step is a u32 length followed by the
//! bytes, with the whole step padded up to an 8-byte multiple so that fixed
//! fields after it stay aligned on both ends of the link.

use tracing::error;

use crate::errors::CodecError;

pub(crate) const U32_LEN: usize = 4;

/// Rounds up to the next multiple of 8.
pub(crate) fn eight_byte_align(len: usize) -> usize {
    (len + 7) & !7
}

/// Wire length of one string step, padding included.
pub(crate) fn string_len(text: &str) -> usize {
    eight_byte_align(U32_LEN + text.len())
}

/// Append-only wire buffer writer.
#[derive(Debug, Default)]
pub struct ParcelWriter {
    buf: Vec<u8>,
}

impl ParcelWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        ParcelWriter {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_string(&mut self, text: &str) -> Result<(), CodecError> {
        let length = u32::try_from(text.len()).map_err(|_| {
            error!(size = text.len(), "string too long for wire format");
            CodecError::InvalidArgs("string too long".to_string())
        })?;
        self.write_u32(length);
        self.buf.extend_from_slice(text.as_bytes());
        let padded = eight_byte_align(U32_LEN + text.len()) - (U32_LEN + text.len());
        self.buf.extend(std::iter::repeat(0u8).take(padded));
        Ok(())
    }

    /// Pads the buffer out to an 8-byte boundary.
    pub fn eight_byte_align(&mut self) {
        let padded = eight_byte_align(self.buf.len()) - self.buf.len();
        self.buf.extend(std::iter::repeat(0u8).take(padded));
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over a received wire buffer. Every read is bounds-checked; a read
/// past the end is an error, never a panic or a silent wrap.
#[derive(Debug)]
pub struct ParcelReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ParcelReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        ParcelReader { buf, pos: 0 }
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], CodecError> {
        let end = self.pos.checked_add(count).ok_or_else(overread)?;
        if end > self.buf.len() {
            return Err(overread());
        }
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        let bytes = self.take(U32_LEN)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_string(&mut self) -> Result<String, CodecError> {
        let length = self.read_u32()? as usize;
        let bytes = self.take(length)?;
        let text = std::str::from_utf8(bytes)
            .map_err(|_| CodecError::InvalidArgs("string is not utf-8".to_string()))?
            .to_string();
        // Skip the step padding.
        let padded = eight_byte_align(U32_LEN + length) - (U32_LEN + length);
        self.take(padded)?;
        Ok(text)
    }

    /// Advances to the next 8-byte boundary.
    pub fn eight_byte_align(&mut self) -> Result<(), CodecError> {
        let padded = eight_byte_align(self.pos) - self.pos;
        self.take(padded)?;
        Ok(())
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

fn overread() -> CodecError {
    error!("read past end of parcel");
    CodecError::InvalidArgs("read past end of buffer".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_step_is_aligned() {
        assert_eq!(string_len(""), 8);
        assert_eq!(string_len("abcd"), 8);
        assert_eq!(string_len("abcde"), 16);
        let mut writer = ParcelWriter::default();
        writer.write_string("abcde").unwrap();
        assert_eq!(writer.len(), 16);
    }

    #[test]
    fn test_round_trip() {
        let mut writer = ParcelWriter::default();
        writer.write_string("table_1").unwrap();
        writer.write_u32(1);
        writer.write_u32(0);
        writer.eight_byte_align();
        let bytes = writer.into_bytes();
        assert_eq!(bytes.len() % 8, 0);

        let mut reader = ParcelReader::new(&bytes);
        assert_eq!(reader.read_string().unwrap(), "table_1");
        assert_eq!(reader.read_u32().unwrap(), 1);
        assert_eq!(reader.read_u32().unwrap(), 0);
        reader.eight_byte_align().unwrap();
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_u32_is_big_endian() {
        let mut writer = ParcelWriter::default();
        writer.write_u32(0x0102_0304);
        assert_eq!(writer.into_bytes(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_truncated_read_is_error() {
        let mut writer = ParcelWriter::default();
        writer.write_string("some_table_name").unwrap();
        let bytes = writer.into_bytes();
        let mut reader = ParcelReader::new(&bytes[..6]);
        assert!(reader.read_string().is_err());

        let mut reader = ParcelReader::new(&[0xff; 4]);
        // Length claims far more data than the buffer holds.
        assert!(reader.read_string().is_err());
    }
}
