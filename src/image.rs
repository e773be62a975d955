use std::ops::Range;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::FormatError;

/// Size of one image word, in bytes.
pub const WORD: usize = 4;

/// A whole firmware image, addressed as little-endian 32-bit words.
///
/// The bytes are owned so the image can be patched in place and handed back
/// for writing. Every word access is bounds checked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
    bytes: Vec<u8>,
}

impl Image {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, FormatError> {
        if bytes.is_empty() {
            return Err(FormatError::Empty);
        }
        if bytes.len() % WORD != 0 {
            return Err(FormatError::Misaligned { len: bytes.len() });
        }
        Ok(Self { bytes })
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn word(&self, index: usize) -> Result<u32, FormatError> {
        let range = self.word_range(index)?;
        Ok(LittleEndian::read_u32(&self.bytes[range]))
    }

    pub fn set_word(&mut self, index: usize, value: u32) -> Result<(), FormatError> {
        let range = self.word_range(index)?;
        LittleEndian::write_u32(&mut self.bytes[range], value);
        Ok(())
    }

    /// Fails the same way `set_word` would, without writing anything.
    pub fn check_word(&self, index: usize) -> Result<(), FormatError> {
        self.word_range(index).map(drop)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    fn word_range(&self, index: usize) -> Result<Range<usize>, FormatError> {
        let len = self.bytes.len();
        match index.checked_mul(WORD) {
            Some(start) if start < len => Ok(start..start + WORD),
            _ => Err(FormatError::OutOfBounds {
                offset: index.saturating_mul(WORD),
                len,
            }),
        }
    }
}
