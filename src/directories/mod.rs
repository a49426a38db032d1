//! Decoders for the data directories of a PE image.
//!
//! Each decoder is independent. It takes the raw bytes, an [`crate::RvaResolver`] built from
//! the section table, and the `(VirtualAddress, Size)` descriptor of its slot, and it returns:
//!
//! - `Ok(Some(_))` with the decoded directory
//! - `Ok(None)` when the directory's RVA does not map into any section
//! - `Err(Error::Truncated)` when a record runs past the end of the input
//!
//! [`crate::PeImage`] turns the last case into "absent" as well; calling a decoder directly
//! exposes the distinction.
//!
//! # Key Components
//!
//! - [`export`] - exported functions, names, ordinals and forwarders
//! - [`import`] - imported modules and their by-name or by-ordinal functions
//! - [`resource`] - the nested resource tree
//! - [`reloc`] - base relocation blocks
//! - [`debug`] - debug directory entries

pub mod debug;
pub mod export;
pub mod import;
pub mod reloc;
pub mod resource;

use crate::{
    file::{parser::Parser, ByteSource},
    Result,
};

/// Returns a parser over a table of `count` records of `width` bytes at `offset`.
///
/// The whole table is bounds checked up front, so a hostile count fails fast instead of
/// driving a long loop.
pub(crate) fn table(
    source: &ByteSource,
    offset: usize,
    count: u32,
    width: usize,
) -> Result<Parser<'_>> {
    let Some(length) = (count as usize).checked_mul(width) else {
        return Err(truncated_error!(offset, usize::MAX, source.len()));
    };
    source.parser(offset, length)
}
