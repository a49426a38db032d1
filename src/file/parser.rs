//! Cursor-based reader for fixed-layout PE structures.
//!
//! This module provides the [`crate::file::parser::Parser`] type, a small cursor over a byte
//! slice that reads little-endian fields in declaration order. Every header and directory
//! record in the PE format is a packed sequence of integers, so decoders obtain a slice of the
//! exact record size from the [`crate::file::ByteSource`] and walk it field by field.
//!
//! A parser remembers the absolute file offset its slice was taken from, so truncation errors
//! report positions in the input file rather than in the slice.
//!
//! # Usage Examples
//!
//! ```rust
//! use pescope::Parser;
//!
//! let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
//! let mut parser = Parser::new(&data);
//!
//! let first = parser.read_le::<u32>()?;
//! assert_eq!(first, 0x04030201);
//!
//! parser.seek(6)?;
//! let last = parser.read_le::<u16>()?;
//! assert_eq!(last, 0x0807);
//! # Ok::<(), pescope::Error>(())
//! ```

use crate::{
    file::io::{ascii_until_nul, read_le_at, PeIO},
    Result,
};

/// A generic parser for fixed-layout binary records.
///
/// Maintains a position within a byte slice and provides bounds-checked, little-endian reads
/// that advance the position.
#[derive(Debug)]
pub struct Parser<'a> {
    /// The data to be parsed
    data: &'a [u8],
    /// Current position within the data
    position: usize,
    /// Absolute file offset of `data[0]`, used to report errors
    base: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`crate::file::parser::Parser`] from a byte slice.
    ///
    /// # Arguments
    /// * `data` - The byte slice to read from
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser {
            data,
            position: 0,
            base: 0,
        }
    }

    /// Create a parser over a slice that starts at absolute file offset `base`.
    #[must_use]
    pub fn with_base(data: &'a [u8], base: usize) -> Self {
        Parser {
            data,
            position: 0,
            base,
        }
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if there is more data available to parse.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Number of bytes left between the current position and the end of the data.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Get the current position of the parser within the data buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Move the current position to the specified index.
    ///
    /// Seeking to exactly the end of the data is allowed.
    ///
    /// # Errors
    /// Returns [`crate::Error::Truncated`] if position is beyond the data length.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(truncated_error!(
                self.base.saturating_add(pos),
                0,
                self.base.saturating_add(self.data.len())
            ));
        }

        self.position = pos;
        Ok(())
    }

    /// Move the position forward by the specified number of bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::Truncated`] if advancing by step would exceed the data length.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        if step > self.remaining() {
            return Err(self.truncated(step));
        }

        self.position += step;
        Ok(())
    }

    /// Read a type `T` from the current position in little-endian format and advance the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::Truncated`] if reading would exceed the data length.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pescope::Parser;
    /// let data = [0x01, 0x02, 0x03, 0x04];
    /// let mut parser = Parser::new(&data);
    ///
    /// let value: u16 = parser.read_le()?;
    /// assert_eq!(value, 0x0201);
    /// assert_eq!(parser.pos(), 2);
    /// # Ok::<(), pescope::Error>(())
    /// ```
    pub fn read_le<T: PeIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
            .map_err(|_| self.truncated(std::mem::size_of::<T>()))
    }

    /// Read `length` raw bytes and advance past them.
    ///
    /// # Errors
    /// Returns [`crate::Error::Truncated`] if reading would exceed the data length.
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        if length > self.remaining() {
            return Err(self.truncated(length));
        }

        let bytes = &self.data[self.position..self.position + length];
        self.position += length;
        Ok(bytes)
    }

    /// Read a fixed-length ASCII field, such as a section name, truncated at the first NUL.
    ///
    /// The full `length` bytes are consumed even if the string is shorter.
    ///
    /// # Errors
    /// Returns [`crate::Error::Truncated`] if reading would exceed the data length.
    pub fn read_fixed_ascii(&mut self, length: usize) -> Result<String> {
        let bytes = self.read_bytes(length)?;
        Ok(ascii_until_nul(bytes))
    }

    fn truncated(&self, length: usize) -> crate::Error {
        truncated_error!(
            self.base.saturating_add(self.position),
            length,
            self.base.saturating_add(self.data.len())
        )
    }
}
