//! Low-level little-endian reading utilities for PE parsing.
//!
//! Every multi-byte field in the PE/COFF format is stored little-endian. This module provides
//! the [`crate::file::io::PeIO`] trait, which maps each primitive integer type to its fixed-size
//! byte representation, and the bounds-checked [`crate::file::io::read_le`] /
//! [`crate::file::io::read_le_at`] helpers built on top of it.
//!
//! # Usage Examples
//!
//! ```rust,ignore
//! use pescope::file::io::read_le_at;
//!
//! let data = [0x4D, 0x5A, 0x90, 0x00, 0x03, 0x00, 0x00, 0x00];
//! let mut offset = 0;
//!
//! let magic: u16 = read_le_at(&data, &mut offset)?;  // offset: 0 -> 2
//! let pages: u16 = read_le_at(&data, &mut offset)?;  // offset: 2 -> 4
//! let value: u32 = read_le_at(&data, &mut offset)?;  // offset: 4 -> 8
//!
//! assert_eq!(magic, 0x5A4D);
//! assert_eq!(pages, 0x0090);
//! assert_eq!(value, 3);
//! # Ok::<(), pescope::Error>(())
//! ```
//!
//! # Error Handling
//!
//! All reading functions return [`crate::Error::Truncated`] if there are insufficient bytes in
//! the buffer to complete the operation. The reported offset is relative to the slice.

use crate::Result;

/// Trait for type-specific safe little-endian reading.
///
/// Each implementation defines a `Bytes` associated type holding the fixed-size byte array
/// for that type (e.g. `[u8; 4]` for `u32`). Implemented for the integer widths that appear in
/// PE structures.
pub trait PeIO: Sized {
    /// Associated type representing the byte array type for this numeric type.
    type Bytes: Sized + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in little-endian
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
}

macro_rules! impl_pe_io {
    ($($ty:ty => $len:literal),* $(,)?) => {
        $(
            impl PeIO for $ty {
                type Bytes = [u8; $len];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_pe_io!(u8 => 1, u16 => 2, u32 => 4, u64 => 8, i16 => 2, i32 => 4, i64 => 8);

/// Safely reads a value of type `T` in little-endian byte order from the start of a buffer.
///
/// # Errors
/// Returns [`crate::Error::Truncated`] if the buffer is shorter than `size_of::<T>()`.
pub fn read_le<T: PeIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Safely reads a value of type `T` in little-endian byte order at `offset`, advancing the
/// offset by `size_of::<T>()` on success.
///
/// # Errors
/// Returns [`crate::Error::Truncated`] if reading would exceed the buffer. The offset is left
/// untouched in that case.
pub fn read_le_at<T: PeIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(truncated_error!(*offset, type_len, data.len()));
    };
    if end > data.len() {
        return Err(truncated_error!(*offset, type_len, data.len()));
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(truncated_error!(*offset, type_len, data.len()));
    };

    *offset = end;
    Ok(T::from_le_bytes(read))
}

/// Decodes raw bytes as ASCII, stopping at the first NUL.
///
/// Bytes above 0x7F are replaced with `?`, so the result is always valid ASCII regardless of
/// what the input contains.
#[must_use]
pub fn ascii_until_nul(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    bytes[..end]
        .iter()
        .map(|&b| if b.is_ascii() { char::from(b) } else { '?' })
        .collect()
}
