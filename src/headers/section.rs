//! The section table.
//!
//! One 40-byte record per section, directly after the Optional header. Names are 8 bytes of
//! ASCII padded with NUL. A `/nnn` string table reference is kept as written.

use bitflags::bitflags;
use log::trace;

use crate::{
    file::{parser::Parser, ByteSource},
    Result,
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Section header characteristics
    pub struct SectionCharacteristics: u32 {
        /// Section contains executable code
        const CNT_CODE = 0x0000_0020;
        /// Section contains initialized data
        const CNT_INITIALIZED_DATA = 0x0000_0040;
        /// Section contains uninitialized data
        const CNT_UNINITIALIZED_DATA = 0x0000_0080;
        /// Section contains comments or other information (object files only)
        const LNK_INFO = 0x0000_0200;
        /// Section will not become part of the image (object files only)
        const LNK_REMOVE = 0x0000_0800;
        /// Section contains COMDAT data (object files only)
        const LNK_COMDAT = 0x0000_1000;
        /// Section contains data referenced through the global pointer
        const GPREL = 0x0000_8000;
        /// Section contains extended relocations
        const LNK_NRELOC_OVFL = 0x0100_0000;
        /// Section can be discarded as needed
        const MEM_DISCARDABLE = 0x0200_0000;
        /// Section cannot be cached
        const MEM_NOT_CACHED = 0x0400_0000;
        /// Section is not pageable
        const MEM_NOT_PAGED = 0x0800_0000;
        /// Section can be shared in memory
        const MEM_SHARED = 0x1000_0000;
        /// Section can be executed as code
        const MEM_EXECUTE = 0x2000_0000;
        /// Section can be read
        const MEM_READ = 0x4000_0000;
        /// Section can be written to
        const MEM_WRITE = 0x8000_0000;
    }
}

/// One entry of the section table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHeader {
    /// Name from the 8-byte name field, cut at the first NUL
    pub name: String,
    /// Size of the section once loaded
    pub virtual_size: u32,
    /// RVA of the first byte of the section once loaded
    pub virtual_address: u32,
    /// Size of the raw data in the file
    pub size_of_raw_data: u32,
    /// File offset of the raw data
    pub pointer_to_raw_data: u32,
    /// File offset of the COFF relocations
    pub pointer_to_relocations: u32,
    /// File offset of the COFF line numbers
    pub pointer_to_linenumbers: u32,
    /// Number of COFF relocations
    pub number_of_relocations: u16,
    /// Number of COFF line numbers
    pub number_of_linenumbers: u16,
    /// Section flags, unknown bits preserved
    pub characteristics: SectionCharacteristics,
}

impl SectionHeader {
    /// Size of one section table entry.
    pub const SIZE: usize = 40;

    /// Returns `true` if `rva` lies inside
    /// `[virtual_address, virtual_address + max(virtual_size, size_of_raw_data))`.
    ///
    /// The end of the range is computed in 64 bits, so a section placed near the top of the
    /// address space cannot wrap around and claim low addresses.
    #[must_use]
    pub fn contains_rva(&self, rva: u32) -> bool {
        let start = u64::from(self.virtual_address);
        let extent = u64::from(self.virtual_size.max(self.size_of_raw_data));
        (start..start + extent).contains(&u64::from(rva))
    }

    /// Decodes one 40-byte entry from the parser's current position.
    ///
    /// # Errors
    /// Returns [`crate::Error::Truncated`] if fewer than 40 bytes remain.
    pub fn read(parser: &mut Parser<'_>) -> Result<SectionHeader> {
        Ok(SectionHeader {
            name: parser.read_fixed_ascii(8)?,
            virtual_size: parser.read_le::<u32>()?,
            virtual_address: parser.read_le::<u32>()?,
            size_of_raw_data: parser.read_le::<u32>()?,
            pointer_to_raw_data: parser.read_le::<u32>()?,
            pointer_to_relocations: parser.read_le::<u32>()?,
            pointer_to_linenumbers: parser.read_le::<u32>()?,
            number_of_relocations: parser.read_le::<u16>()?,
            number_of_linenumbers: parser.read_le::<u16>()?,
            characteristics: SectionCharacteristics::from_bits_retain(parser.read_le::<u32>()?),
        })
    }

    /// Decodes `count` consecutive entries starting at `offset`, in disk order.
    ///
    /// # Errors
    /// Returns [`crate::Error::Truncated`] if the table runs past the end of the input.
    pub fn parse_all(source: &ByteSource, offset: usize, count: u16) -> Result<Vec<SectionHeader>> {
        let mut parser = source.parser(offset, usize::from(count) * Self::SIZE)?;

        let mut sections = Vec::with_capacity(usize::from(count));
        while parser.has_more_data() {
            let section = Self::read(&mut parser)?;
            trace!(
                "section {:?} va={:#x} vsize={:#x} raw={:#x}+{:#x}",
                section.name,
                section.virtual_address,
                section.virtual_size,
                section.pointer_to_raw_data,
                section.size_of_raw_data
            );
            sections.push(section);
        }

        Ok(sections)
    }
}
