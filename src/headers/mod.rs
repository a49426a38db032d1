//! Header decoding for PE images.
//!
//! Headers are decoded once, eagerly, by [`Headers::parse`]. Any failure here is fatal: an input
//! whose headers cannot be decoded never becomes a [`crate::PeImage`].
//!
//! # Layout
//!
//! ```text
//! 0x00                DOS header (64 bytes), e_lfanew at 0x3C
//! e_lfanew            "PE\0\0"
//! e_lfanew + 4        COFF header (20 bytes)
//! e_lfanew + 24       Optional header (SizeOfOptionalHeader bytes)
//! ... + SizeOfOptionalHeader
//!                     Section table (NumberOfSections * 40 bytes)
//! ```
//!
//! # Key Components
//!
//! - [`dos`] - the MS-DOS stub header
//! - [`coff`] - machine type and file characteristics
//! - [`optional`] - the PE32 / PE32+ Optional header and its data-directory array
//! - [`datadir`] - data-directory descriptors and slot indices
//! - [`section`] - the section table

pub mod coff;
pub mod datadir;
pub mod dos;
pub mod optional;
pub mod section;

use log::debug;

use crate::{
    file::ByteSource,
    headers::{coff::CoffHeader, dos::DosHeader, optional::OptionalHeader, section::SectionHeader},
    Error, Result,
};

/// The `PE\0\0` signature as a little-endian `u32`.
pub const PE_SIGNATURE: u32 = 0x0000_4550;

/// Every header of an image, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Headers {
    /// MS-DOS header
    pub dos: DosHeader,
    /// COFF file header
    pub coff: CoffHeader,
    /// Optional header
    pub optional: OptionalHeader,
    /// Section table, in disk order
    pub sections: Vec<SectionHeader>,
}

impl Headers {
    /// Decodes all headers of `source`.
    ///
    /// # Errors
    /// - [`crate::Error::Truncated`] if any header runs past the end of the input, or
    ///   `e_lfanew` is negative
    /// - [`crate::Error::InvalidSignature`] if the `MZ` magic or the `PE\0\0` signature is wrong
    /// - [`crate::Error::UnsupportedFormat`] if the Optional header magic is unknown
    pub fn parse(source: &ByteSource) -> Result<Headers> {
        let dos = DosHeader::parse(source)?;

        let Ok(pe_offset) = usize::try_from(dos.pe_header_offset) else {
            return Err(truncated_error!(0, 4, source.len()));
        };
        if pe_offset.saturating_add(4) > source.len() {
            return Err(truncated_error!(pe_offset, 4, source.len()));
        }

        let signature = source.read_u32(pe_offset)?;
        if signature != PE_SIGNATURE {
            return Err(Error::InvalidSignature {
                expected: PE_SIGNATURE,
                found: signature,
            });
        }

        let coff_offset = pe_offset + 4;
        let coff = CoffHeader::parse(source, coff_offset)?;

        let optional_offset = coff_offset + CoffHeader::SIZE;
        let optional = OptionalHeader::parse(source, optional_offset)?;

        let sections_offset = optional_offset + usize::from(coff.size_of_optional_header);
        let sections = SectionHeader::parse_all(source, sections_offset, coff.number_of_sections)?;

        debug!(
            "decoded headers: machine={:?} magic={:?} sections={} directories={}",
            coff.machine,
            optional.magic,
            sections.len(),
            optional.data_directories.len()
        );

        Ok(Headers {
            dos,
            coff,
            optional,
            sections,
        })
    }
}
