//! The debug directory.
//!
//! A packed array of 28-byte `IMAGE_DEBUG_DIRECTORY` records. The entry count is the
//! directory size divided by 28; trailing bytes that do not make up a whole record are ignored.

use crate::{
    directories::table, file::ByteSource, headers::datadir::DataDirectory, resolver::RvaResolver,
    Result,
};

/// Format of the data a debug entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum DebugType {
    Unknown,
    Coff,
    /// CodeView, usually an `RSDS` record naming the PDB
    CodeView,
    Fpo,
    Misc,
    Exception,
    Fixup,
    OmapToSrc,
    OmapFromSrc,
    Borland,
    Reserved10,
    Clsid,
    VcFeature,
    Pogo,
    Iltcg,
    Mpx,
    /// Deterministic build marker
    Repro,
    EmbeddedPortablePdb,
    PdbChecksum,
    ExtendedDllCharacteristics,
    /// Any other type value
    Other(u32),
}

impl From<u32> for DebugType {
    fn from(value: u32) -> Self {
        match value {
            0 => DebugType::Unknown,
            1 => DebugType::Coff,
            2 => DebugType::CodeView,
            3 => DebugType::Fpo,
            4 => DebugType::Misc,
            5 => DebugType::Exception,
            6 => DebugType::Fixup,
            7 => DebugType::OmapToSrc,
            8 => DebugType::OmapFromSrc,
            9 => DebugType::Borland,
            10 => DebugType::Reserved10,
            11 => DebugType::Clsid,
            12 => DebugType::VcFeature,
            13 => DebugType::Pogo,
            14 => DebugType::Iltcg,
            15 => DebugType::Mpx,
            16 => DebugType::Repro,
            17 => DebugType::EmbeddedPortablePdb,
            19 => DebugType::PdbChecksum,
            20 => DebugType::ExtendedDllCharacteristics,
            other => DebugType::Other(other),
        }
    }
}

/// One `IMAGE_DEBUG_DIRECTORY` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugDirectoryEntry {
    /// Reserved, zero
    pub characteristics: u32,
    /// Creation time of the debug data
    pub time_date_stamp: u32,
    /// Major version of the debug data format
    pub major_version: u16,
    /// Minor version of the debug data format
    pub minor_version: u16,
    /// Format of the debug data
    pub kind: DebugType,
    /// Size of the debug data, header excluded
    pub size_of_data: u32,
    /// RVA of the debug data once loaded, zero if it is not mapped
    pub address_of_raw_data: u32,
    /// File offset of the debug data
    pub pointer_to_raw_data: u32,
}

/// A decoded debug directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugDirectory {
    /// Entries in disk order
    pub entries: Vec<DebugDirectoryEntry>,
}

impl DebugDirectory {
    /// Size of one debug directory entry.
    pub const ENTRY_SIZE: usize = 28;

    /// Decodes `dir.size / 28` entries at the directory's RVA.
    ///
    /// # Errors
    /// Returns [`crate::Error::Truncated`] if the entries run past the end of the input.
    pub fn parse(
        source: &ByteSource,
        resolver: &RvaResolver,
        dir: &DataDirectory,
    ) -> Result<Option<DebugDirectory>> {
        let Some(offset) = resolver.resolve_offset(dir.virtual_address) else {
            return Ok(None);
        };

        let count = dir.size / Self::ENTRY_SIZE as u32;
        let mut parser = table(source, offset, count, Self::ENTRY_SIZE)?;

        let mut entries = Vec::new();
        for _ in 0..count {
            entries.push(DebugDirectoryEntry {
                characteristics: parser.read_le::<u32>()?,
                time_date_stamp: parser.read_le::<u32>()?,
                major_version: parser.read_le::<u16>()?,
                minor_version: parser.read_le::<u16>()?,
                kind: DebugType::from(parser.read_le::<u32>()?),
                size_of_data: parser.read_le::<u32>()?,
                address_of_raw_data: parser.read_le::<u32>()?,
                pointer_to_raw_data: parser.read_le::<u32>()?,
            });
        }

        Ok(Some(DebugDirectory { entries }))
    }
}
