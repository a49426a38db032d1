//! The COFF file header.
//!
//! Twenty bytes directly after the `PE\0\0` signature: target machine, section count,
//! timestamp, the legacy symbol table fields, the size of the Optional header that follows and
//! the file characteristics.

use bitflags::bitflags;

use crate::{file::ByteSource, Result};

/// Target architecture from the COFF `Machine` field.
///
/// Values not listed are kept verbatim in [`MachineType::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MachineType {
    /// `IMAGE_FILE_MACHINE_UNKNOWN`, applicable to any machine type
    Unknown,
    /// Intel 386 and compatibles
    I386,
    /// x64
    Amd64,
    /// ARM little endian
    Arm,
    /// ARM Thumb-2 little endian
    ArmNt,
    /// ARM64 little endian
    Arm64,
    /// Intel Itanium
    Ia64,
    /// RISC-V 32-bit address space
    RiscV32,
    /// RISC-V 64-bit address space
    RiscV64,
    /// Any other machine value
    Other(u16),
}

impl From<u16> for MachineType {
    fn from(value: u16) -> Self {
        match value {
            0x0000 => MachineType::Unknown,
            0x014C => MachineType::I386,
            0x8664 => MachineType::Amd64,
            0x01C0 => MachineType::Arm,
            0x01C4 => MachineType::ArmNt,
            0xAA64 => MachineType::Arm64,
            0x0200 => MachineType::Ia64,
            0x5032 => MachineType::RiscV32,
            0x5064 => MachineType::RiscV64,
            other => MachineType::Other(other),
        }
    }
}

impl From<MachineType> for u16 {
    fn from(value: MachineType) -> Self {
        match value {
            MachineType::Unknown => 0x0000,
            MachineType::I386 => 0x014C,
            MachineType::Amd64 => 0x8664,
            MachineType::Arm => 0x01C0,
            MachineType::ArmNt => 0x01C4,
            MachineType::Arm64 => 0xAA64,
            MachineType::Ia64 => 0x0200,
            MachineType::RiscV32 => 0x5032,
            MachineType::RiscV64 => 0x5064,
            MachineType::Other(other) => other,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// COFF file characteristics
    pub struct FileCharacteristics: u16 {
        /// Image contains no base relocations and must load at its preferred base
        const RELOCS_STRIPPED = 0x0001;
        /// Image is valid and can be run
        const EXECUTABLE_IMAGE = 0x0002;
        /// COFF line numbers have been removed (deprecated)
        const LINE_NUMS_STRIPPED = 0x0004;
        /// COFF local symbols have been removed (deprecated)
        const LOCAL_SYMS_STRIPPED = 0x0008;
        /// Aggressively trim working set (obsolete)
        const AGGRESSIVE_WS_TRIM = 0x0010;
        /// Application can handle addresses above 2 GB
        const LARGE_ADDRESS_AWARE = 0x0020;
        /// Little endian (deprecated)
        const BYTES_REVERSED_LO = 0x0080;
        /// Machine is based on a 32-bit word architecture
        const MACHINE_32BIT = 0x0100;
        /// Debugging information is removed from the image file
        const DEBUG_STRIPPED = 0x0200;
        /// Copy to swap if the image is on removable media
        const REMOVABLE_RUN_FROM_SWAP = 0x0400;
        /// Copy to swap if the image is on network media
        const NET_RUN_FROM_SWAP = 0x0800;
        /// The image is a system file
        const SYSTEM = 0x1000;
        /// The image is a dynamic-link library
        const DLL = 0x2000;
        /// Run only on a uniprocessor machine
        const UP_SYSTEM_ONLY = 0x4000;
        /// Big endian (deprecated)
        const BYTES_REVERSED_HI = 0x8000;
    }
}

/// The COFF file header that follows the `PE\0\0` signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoffHeader {
    /// Target architecture
    pub machine: MachineType,
    /// Number of entries in the section table
    pub number_of_sections: u16,
    /// Seconds since the Unix epoch at which the image was linked
    pub time_date_stamp: u32,
    /// File offset of the COFF symbol table, zero for most images
    pub pointer_to_symbol_table: u32,
    /// Number of entries in the COFF symbol table
    pub number_of_symbols: u32,
    /// Size of the optional header that follows, in bytes
    pub size_of_optional_header: u16,
    /// File attribute flags, unknown bits preserved
    pub characteristics: FileCharacteristics,
}

impl CoffHeader {
    /// Size of the COFF header in bytes.
    pub const SIZE: usize = 20;

    /// Returns `true` if the `DLL` characteristic is set.
    #[must_use]
    pub fn is_dll(&self) -> bool {
        self.characteristics.contains(FileCharacteristics::DLL)
    }

    /// Returns `true` if the `EXECUTABLE_IMAGE` characteristic is set.
    #[must_use]
    pub fn is_executable(&self) -> bool {
        self.characteristics
            .contains(FileCharacteristics::EXECUTABLE_IMAGE)
    }

    /// Decodes the 20-byte COFF header at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Truncated`] if the header extends past the end of the input.
    pub fn parse(source: &ByteSource, offset: usize) -> Result<CoffHeader> {
        let mut parser = source.parser(offset, Self::SIZE)?;

        Ok(CoffHeader {
            machine: MachineType::from(parser.read_le::<u16>()?),
            number_of_sections: parser.read_le::<u16>()?,
            time_date_stamp: parser.read_le::<u32>()?,
            pointer_to_symbol_table: parser.read_le::<u32>()?,
            number_of_symbols: parser.read_le::<u32>()?,
            size_of_optional_header: parser.read_le::<u16>()?,
            characteristics: FileCharacteristics::from_bits_retain(parser.read_le::<u16>()?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ParseOptions;

    fn coff_bytes(machine: u16, sections: u16, characteristics: u16) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&machine.to_le_bytes());
        data.extend_from_slice(&sections.to_le_bytes());
        data.extend_from_slice(&0x6000_0000_u32.to_le_bytes());
        data.extend_from_slice(&0_u32.to_le_bytes());
        data.extend_from_slice(&0_u32.to_le_bytes());
        data.extend_from_slice(&0xF0_u16.to_le_bytes());
        data.extend_from_slice(&characteristics.to_le_bytes());
        data
    }

    #[test]
    fn crafted() {
        let source =
            ByteSource::from_mem(coff_bytes(0x8664, 3, 0x2022), &ParseOptions::default()).unwrap();
        let header = CoffHeader::parse(&source, 0).unwrap();

        assert_eq!(header.machine, MachineType::Amd64);
        assert_eq!(header.number_of_sections, 3);
        assert_eq!(header.time_date_stamp, 0x6000_0000);
        assert_eq!(header.size_of_optional_header, 0xF0);
        assert!(header.is_dll());
        assert!(header.is_executable());
        assert!(header
            .characteristics
            .contains(FileCharacteristics::LARGE_ADDRESS_AWARE));
    }

    #[test]
    fn unknown_values_are_retained() {
        let source =
            ByteSource::from_mem(coff_bytes(0x1234, 0, 0x0040), &ParseOptions::default()).unwrap();
        let header = CoffHeader::parse(&source, 0).unwrap();

        assert_eq!(header.machine, MachineType::Other(0x1234));
        assert_eq!(u16::from(header.machine), 0x1234);
        assert_eq!(header.characteristics.bits(), 0x0040);
        assert!(!header.is_dll());
        assert!(!header.is_executable());
    }

    #[test]
    fn machine_roundtrip() {
        for raw in [0x0000, 0x014C, 0x8664, 0x01C0, 0x01C4, 0xAA64, 0x0200, 0x5032, 0x5064] {
            assert_eq!(u16::from(MachineType::from(raw)), raw);
        }
    }

    #[test]
    fn truncated() {
        let source =
            ByteSource::from_mem(vec![0x4C, 0x01, 0x01], &ParseOptions::default()).unwrap();
        assert!(CoffHeader::parse(&source, 0).unwrap_err().is_truncated());
    }
}
