//! The MS-DOS header.

use crate::{file::ByteSource, Error, Result};

/// The `MZ` magic that starts every PE image.
pub const DOS_MAGIC: u16 = 0x5A4D;

/// The legacy MS-DOS header at offset 0 of every PE image.
///
/// Only `magic` and `pe_header_offset` (`e_lfanew`) matter to a PE loader; the remaining fields
/// describe the DOS stub program and are kept for completeness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DosHeader {
    /// `e_magic`, must be [`DOS_MAGIC`]
    pub magic: u16,
    /// `e_cblp`, bytes on the last page of the file
    pub last_page_bytes: u16,
    /// `e_cp`, pages in the file
    pub page_count: u16,
    /// `e_crlc`, relocations
    pub relocation_count: u16,
    /// `e_cparhdr`, size of the header in paragraphs
    pub header_paragraphs: u16,
    /// `e_minalloc`
    pub min_alloc: u16,
    /// `e_maxalloc`
    pub max_alloc: u16,
    /// `e_ss`
    pub initial_ss: u16,
    /// `e_sp`
    pub initial_sp: u16,
    /// `e_csum`
    pub checksum: u16,
    /// `e_ip`
    pub initial_ip: u16,
    /// `e_cs`
    pub initial_cs: u16,
    /// `e_lfarlc`, file offset of the relocation table
    pub relocation_table_offset: u16,
    /// `e_ovno`
    pub overlay_number: u16,
    /// `e_res`
    pub reserved: [u16; 4],
    /// `e_oemid`
    pub oem_id: u16,
    /// `e_oeminfo`
    pub oem_info: u16,
    /// `e_res2`
    pub reserved2: [u16; 10],
    /// `e_lfanew`, signed file offset of the PE signature
    pub pe_header_offset: i32,
}

impl DosHeader {
    /// Size of the DOS header in bytes.
    pub const SIZE: usize = 64;

    /// Returns `true` if the magic is `MZ`.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.magic == DOS_MAGIC
    }

    /// Decodes the DOS header from the start of `source`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Truncated`] if the input is shorter than 64 bytes, or
    /// [`crate::Error::InvalidSignature`] if the magic is not `MZ`.
    pub fn parse(source: &ByteSource) -> Result<DosHeader> {
        if source.len() < Self::SIZE {
            return Err(truncated_error!(0, Self::SIZE, source.len()));
        }

        let mut parser = source.parser(0, Self::SIZE)?;
        let magic = parser.read_le::<u16>()?;
        if magic != DOS_MAGIC {
            return Err(Error::InvalidSignature {
                expected: u32::from(DOS_MAGIC),
                found: u32::from(magic),
            });
        }

        let last_page_bytes = parser.read_le::<u16>()?;
        let page_count = parser.read_le::<u16>()?;
        let relocation_count = parser.read_le::<u16>()?;
        let header_paragraphs = parser.read_le::<u16>()?;
        let min_alloc = parser.read_le::<u16>()?;
        let max_alloc = parser.read_le::<u16>()?;
        let initial_ss = parser.read_le::<u16>()?;
        let initial_sp = parser.read_le::<u16>()?;
        let checksum = parser.read_le::<u16>()?;
        let initial_ip = parser.read_le::<u16>()?;
        let initial_cs = parser.read_le::<u16>()?;
        let relocation_table_offset = parser.read_le::<u16>()?;
        let overlay_number = parser.read_le::<u16>()?;

        let mut reserved = [0_u16; 4];
        for value in &mut reserved {
            *value = parser.read_le::<u16>()?;
        }

        let oem_id = parser.read_le::<u16>()?;
        let oem_info = parser.read_le::<u16>()?;

        let mut reserved2 = [0_u16; 10];
        for value in &mut reserved2 {
            *value = parser.read_le::<u16>()?;
        }

        let pe_header_offset = parser.read_le::<i32>()?;

        Ok(DosHeader {
            magic,
            last_page_bytes,
            page_count,
            relocation_count,
            header_paragraphs,
            min_alloc,
            max_alloc,
            initial_ss,
            initial_sp,
            checksum,
            initial_ip,
            initial_cs,
            relocation_table_offset,
            overlay_number,
            reserved,
            oem_id,
            oem_info,
            reserved2,
            pe_header_offset,
        })
    }
}
