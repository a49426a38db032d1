//! Bounded raw-byte access over files, buffers and streams.
//!
//! This module abstracts over where the bytes of a PE image live. Decoders never touch a
//! backing store directly; they go through [`crate::file::ByteSource`], which performs every
//! bounds check in one place regardless of whether the data is an owned buffer or a
//! memory-mapped file.
//!
//! # Architecture
//!
//! - **Backend system** - [`crate::file::Backend`] is implemented by an in-memory buffer
//!   (`Memory`) and a read-only file mapping (`Physical`)
//! - **ByteSource** - owns one backend and offers checked little-endian integer reads and ASCII
//!   string extraction at absolute file offsets
//! - **Parser** - [`crate::file::parser::Parser`] walks fixed-layout records sliced out of a
//!   `ByteSource`
//! - **io** - [`crate::file::io`] holds the endian conversion primitives
//!
//! # Construction rules
//!
//! - File paths that do not exist fail with [`crate::Error::NotFound`]
//! - Zero-length files fail with [`crate::Error::Truncated`]
//! - Inputs larger than [`crate::ParseOptions::max_file_size`] fail with
//!   [`crate::Error::UnsupportedFormat`]
//! - Streams are read to the end and materialized into an owned buffer
//!
//! # Usage Examples
//!
//! ```rust
//! use pescope::{ByteSource, ParseOptions};
//!
//! let source = ByteSource::from_mem(b"MZ\x90\0name\0".to_vec(), &ParseOptions::default())?;
//! assert_eq!(source.read_u16(0)?, 0x5A4D);
//! assert_eq!(source.read_cstring(4), "name");
//! assert_eq!(source.read_cstring(100), "");
//! # Ok::<(), pescope::Error>(())
//! ```

pub mod io;
pub mod parser;

mod memory;
mod physical;

use std::{
    fs,
    io::{ErrorKind, Read},
    path::Path,
};

use crate::{
    file::{io::ascii_until_nul, io::PeIO, parser::Parser},
    Error, ParseOptions, Result,
};
use memory::Memory;
use physical::Physical;

/// Backend trait for file data sources.
///
/// This trait abstracts over the source of PE data, allowing for both in-memory and on-disk
/// representations. All implementations must be thread-safe, since a decoded image may be
/// shared across threads.
pub trait Backend: Send + Sync {
    /// Returns a slice of the data at the given offset and length.
    ///
    /// # Arguments
    ///
    /// * `offset` - The starting offset within the data.
    /// * `len` - The length of the slice in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Truncated`] if the requested range is out of bounds or
    /// `offset + len` overflows.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]>;

    /// Returns the entire data buffer.
    fn data(&self) -> &[u8];

    /// Returns the total length of the data buffer.
    fn len(&self) -> usize;
}

/// Bounded, backend-agnostic accessor for the raw bytes of an input.
///
/// `ByteSource` is the single owner of the backing store. When it is dropped, owned buffers
/// are freed and file mappings are unmapped; ownership guarantees this happens exactly once.
pub struct ByteSource {
    backend: Box<dyn Backend>,
}

impl ByteSource {
    /// Memory-maps the file at `path`.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::NotFound`] if the path does not exist
    /// - [`crate::Error::Truncated`] if the file is empty
    /// - [`crate::Error::UnsupportedFormat`] if the file exceeds `options.max_file_size`
    /// - [`crate::Error::FileError`] for other I/O failures
    pub fn from_file(path: impl AsRef<Path>, options: &ParseOptions) -> Result<ByteSource> {
        let path = path.as_ref();
        let file = fs::File::open(path).map_err(|error| match error.kind() {
            ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
            _ => Error::FileError(error),
        })?;

        let len = file.metadata()?.len();
        if len == 0 {
            return Err(truncated_error!(0, 1, 0));
        }
        Self::check_size(len, options)?;

        Ok(ByteSource {
            backend: Box::new(Physical::map(&file)?),
        })
    }

    /// Takes ownership of an in-memory buffer.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnsupportedFormat`] if the buffer exceeds
    /// `options.max_file_size`.
    pub fn from_mem(data: Vec<u8>, options: &ParseOptions) -> Result<ByteSource> {
        Self::check_size(data.len() as u64, options)?;

        Ok(ByteSource {
            backend: Box::new(Memory::new(data)),
        })
    }

    /// Reads `reader` to the end and takes ownership of the collected bytes.
    ///
    /// Reading stops early with [`crate::Error::UnsupportedFormat`] once the stream grows
    /// past `options.max_file_size`, so an endless stream cannot exhaust memory.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if reading fails, or
    /// [`crate::Error::UnsupportedFormat`] if the stream is too large.
    pub fn from_reader<R: Read>(reader: R, options: &ParseOptions) -> Result<ByteSource> {
        let mut data = Vec::new();
        reader
            .take(options.max_file_size.saturating_add(1))
            .read_to_end(&mut data)?;

        Self::from_mem(data, options)
    }

    fn check_size(len: u64, options: &ParseOptions) -> Result<()> {
        if len > options.max_file_size {
            return Err(Error::UnsupportedFormat(format!(
                "input of {} bytes exceeds the maximum supported size of {} bytes",
                len, options.max_file_size
            )));
        }
        Ok(())
    }

    /// Returns the total size of the input in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.backend.len()
    }

    /// Returns `true` if the input has a length of zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the complete input.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.backend.data()
    }

    /// Returns `length` bytes starting at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Truncated`] if `offset + length` exceeds [`ByteSource::len`].
    pub fn read(&self, offset: usize, length: usize) -> Result<&[u8]> {
        self.backend.data_slice(offset, length)
    }

    /// Returns a [`Parser`] over the `length` bytes at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Truncated`] if the range is out of bounds.
    pub fn parser(&self, offset: usize, length: usize) -> Result<Parser<'_>> {
        Ok(Parser::with_base(self.read(offset, length)?, offset))
    }

    /// Reads a little-endian value of type `T` at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Truncated`] if the value extends past the end of the input.
    pub fn read_le<T: PeIO>(&self, offset: usize) -> Result<T> {
        self.parser(offset, std::mem::size_of::<T>())?.read_le::<T>()
    }

    /// Reads a byte at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Truncated`] if `offset` is past the end of the input.
    pub fn read_u8(&self, offset: usize) -> Result<u8> {
        self.read_le::<u8>(offset)
    }

    /// Reads a little-endian `u16` at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Truncated`] if the value extends past the end of the input.
    pub fn read_u16(&self, offset: usize) -> Result<u16> {
        self.read_le::<u16>(offset)
    }

    /// Reads a little-endian `u32` at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Truncated`] if the value extends past the end of the input.
    pub fn read_u32(&self, offset: usize) -> Result<u32> {
        self.read_le::<u32>(offset)
    }

    /// Reads a little-endian `u64` at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Truncated`] if the value extends past the end of the input.
    pub fn read_u64(&self, offset: usize) -> Result<u64> {
        self.read_le::<u64>(offset)
    }

    /// Reads a fixed-length ASCII field, truncated at the first NUL.
    ///
    /// # Errors
    /// Returns [`crate::Error::Truncated`] if the field extends past the end of the input.
    pub fn read_fixed_ascii(&self, offset: usize, length: usize) -> Result<String> {
        Ok(ascii_until_nul(self.read(offset, length)?))
    }

    /// Reads a NUL-terminated ASCII string starting at `offset`.
    ///
    /// The scan is bounded by the end of the input; an unterminated string runs to end-of-file.
    /// Returns an empty string if `offset` is at or past the end of the input.
    #[must_use]
    pub fn read_cstring(&self, offset: usize) -> String {
        match self.data().get(offset..) {
            Some(tail) => ascii_until_nul(tail),
            None => String::new(),
        }
    }
}

impl std::fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteSource")
            .field("len", &self.len())
            .finish()
    }
}
