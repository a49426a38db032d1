use super::Backend;
use crate::Result;

/// Backend that owns its bytes.
///
/// Buffers passed to [`crate::PeImage::from_mem`] land here, as does everything collected from
/// a reader by [`crate::PeImage::from_reader`].
pub struct Memory {
    buffer: Box<[u8]>,
}

impl Memory {
    /// Takes ownership of `data`.
    pub fn new(data: Vec<u8>) -> Memory {
        Memory {
            buffer: data.into_boxed_slice(),
        }
    }
}

impl Backend for Memory {
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.buffer.get(offset..end))
            .ok_or(truncated_error!(offset, len, self.buffer.len()))
    }

    fn data(&self) -> &[u8] {
        &self.buffer
    }

    fn len(&self) -> usize {
        self.buffer.len()
    }
}
