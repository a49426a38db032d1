//! Read-only file mapping backend.
//!
//! Images opened from disk are mapped rather than read, so decoding a large file only faults in
//! the pages that the header and directory decoders actually touch. The mapping is never
//! written through and is released when the owning [`crate::file::ByteSource`] is dropped.

use super::Backend;
use crate::Result;

use memmap2::Mmap;
use std::fs::File;

/// A memory-mapped file.
///
/// Empty and oversized files are rejected by [`crate::file::ByteSource::from_file`] before a
/// mapping is created.
pub struct Physical {
    map: Mmap,
}

impl Physical {
    /// Maps `file` read-only.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the mapping cannot be created.
    #[allow(unsafe_code)]
    pub fn map(file: &File) -> Result<Physical> {
        // SAFETY: the mapping is read-only and no mutable reference is ever created from it.
        // Another process truncating the file while it is mapped cannot be guarded against.
        let map = unsafe { Mmap::map(file) }?;
        Ok(Physical { map })
    }
}

impl Backend for Physical {
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.map.get(offset..end))
            .ok_or(truncated_error!(offset, len, self.map.len()))
    }

    fn data(&self) -> &[u8] {
        &self.map
    }

    fn len(&self) -> usize {
        self.map.len()
    }
}
