//! The PE32 / PE32+ Optional header.
//!
//! Both layouts are decoded into a single [`OptionalHeader`] tagged with a [`PeMagic`]. The
//! variants differ only in three places:
//!
//! - PE32 carries a `BaseOfData` field after `BaseOfCode`; PE32+ does not, and the decoded
//!   value is zero.
//! - `ImageBase` is 4 bytes in PE32 and 8 bytes in PE32+.
//! - The four stack and heap size fields are 4 bytes in PE32 and 8 bytes in PE32+.
//!
//! Widths are normalized to `u64` so callers never branch on the variant to read a field.
//!
//! After the fixed part, `NumberOfRvaAndSizes` descriptors follow. The raw count is kept as
//! found on disk, but at most [`MAX_DATA_DIRECTORIES`] descriptors are ever read.

use bitflags::bitflags;

use crate::{
    file::{parser::Parser, ByteSource},
    headers::datadir::{DataDirectory, DataDirectoryType, MAX_DATA_DIRECTORIES},
    Error, Result,
};

/// Width tag of the Optional header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeMagic {
    /// `0x10B`, 32-bit image
    Pe32,
    /// `0x20B`, 64-bit image
    Pe32Plus,
}

impl PeMagic {
    /// On-disk value of this magic.
    #[must_use]
    pub fn value(self) -> u16 {
        match self {
            PeMagic::Pe32 => 0x010B,
            PeMagic::Pe32Plus => 0x020B,
        }
    }

    /// Size of the fixed fields that precede the data-directory array.
    #[must_use]
    pub fn fixed_size(self) -> usize {
        match self {
            PeMagic::Pe32 => 96,
            PeMagic::Pe32Plus => 112,
        }
    }
}

impl TryFrom<u16> for PeMagic {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self> {
        match value {
            0x010B => Ok(PeMagic::Pe32),
            0x020B => Ok(PeMagic::Pe32Plus),
            other => Err(Error::UnsupportedFormat(format!(
                "unknown Optional header magic {other:#06x}"
            ))),
        }
    }
}

/// Subsystem required to run the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Subsystem {
    Unknown,
    Native,
    WindowsGui,
    WindowsCui,
    Os2Cui,
    PosixCui,
    NativeWindows,
    WindowsCeGui,
    EfiApplication,
    EfiBootServiceDriver,
    EfiRuntimeDriver,
    EfiRom,
    Xbox,
    WindowsBootApplication,
    /// Any other subsystem value
    Other(u16),
}

impl From<u16> for Subsystem {
    fn from(value: u16) -> Self {
        match value {
            0 => Subsystem::Unknown,
            1 => Subsystem::Native,
            2 => Subsystem::WindowsGui,
            3 => Subsystem::WindowsCui,
            5 => Subsystem::Os2Cui,
            7 => Subsystem::PosixCui,
            8 => Subsystem::NativeWindows,
            9 => Subsystem::WindowsCeGui,
            10 => Subsystem::EfiApplication,
            11 => Subsystem::EfiBootServiceDriver,
            12 => Subsystem::EfiRuntimeDriver,
            13 => Subsystem::EfiRom,
            14 => Subsystem::Xbox,
            16 => Subsystem::WindowsBootApplication,
            other => Subsystem::Other(other),
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// `DllCharacteristics` of the Optional header
    pub struct DllCharacteristics: u16 {
        /// Image can handle a high entropy 64-bit virtual address space
        const HIGH_ENTROPY_VA = 0x0020;
        /// DLL can be relocated at load time (ASLR)
        const DYNAMIC_BASE = 0x0040;
        /// Code integrity checks are enforced
        const FORCE_INTEGRITY = 0x0080;
        /// Image is NX compatible
        const NX_COMPAT = 0x0100;
        /// Isolation aware, but do not isolate the image
        const NO_ISOLATION = 0x0200;
        /// Does not use structured exception handling
        const NO_SEH = 0x0400;
        /// Do not bind the image
        const NO_BIND = 0x0800;
        /// Image must execute in an AppContainer
        const APPCONTAINER = 0x1000;
        /// A WDM driver
        const WDM_DRIVER = 0x2000;
        /// Image supports Control Flow Guard
        const GUARD_CF = 0x4000;
        /// Terminal Server aware
        const TERMINAL_SERVER_AWARE = 0x8000;
    }
}

/// The Optional header, normalized across the PE32 and PE32+ layouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionalHeader {
    /// Layout variant
    pub magic: PeMagic,
    /// Linker major version
    pub major_linker_version: u8,
    /// Linker minor version
    pub minor_linker_version: u8,
    /// Total size of all code sections
    pub size_of_code: u32,
    /// Total size of all initialized data sections
    pub size_of_initialized_data: u32,
    /// Total size of all uninitialized data sections
    pub size_of_uninitialized_data: u32,
    /// RVA of the entry point, zero if there is none
    pub address_of_entry_point: u32,
    /// RVA of the beginning of the code section
    pub base_of_code: u32,
    /// RVA of the beginning of the data section, zero for PE32+
    pub base_of_data: u32,
    /// Preferred load address
    pub image_base: u64,
    /// Alignment of sections once loaded
    pub section_alignment: u32,
    /// Alignment of raw section data in the file
    pub file_alignment: u32,
    /// Required operating system major version
    pub major_operating_system_version: u16,
    /// Required operating system minor version
    pub minor_operating_system_version: u16,
    /// Image major version
    pub major_image_version: u16,
    /// Image minor version
    pub minor_image_version: u16,
    /// Subsystem major version
    pub major_subsystem_version: u16,
    /// Subsystem minor version
    pub minor_subsystem_version: u16,
    /// Reserved, must be zero
    pub win32_version_value: u32,
    /// Size of the image once loaded
    pub size_of_image: u32,
    /// Combined size of all headers rounded to the file alignment
    pub size_of_headers: u32,
    /// Image checksum
    pub check_sum: u32,
    /// Required subsystem
    pub subsystem: Subsystem,
    /// DLL characteristics, unknown bits preserved
    pub dll_characteristics: DllCharacteristics,
    /// Stack reserve size
    pub size_of_stack_reserve: u64,
    /// Stack commit size
    pub size_of_stack_commit: u64,
    /// Heap reserve size
    pub size_of_heap_reserve: u64,
    /// Heap commit size
    pub size_of_heap_commit: u64,
    /// Reserved, must be zero
    pub loader_flags: u32,
    /// The count as stored on disk, before clamping
    pub number_of_rva_and_sizes: u32,
    /// The first `min(number_of_rva_and_sizes, 16)` descriptors
    pub data_directories: Vec<DataDirectory>,
}

impl OptionalHeader {
    /// Returns `true` for the 32-bit layout.
    #[must_use]
    pub fn is_pe32(&self) -> bool {
        self.magic == PeMagic::Pe32
    }

    /// Returns `true` for the 64-bit layout.
    #[must_use]
    pub fn is_pe32_plus(&self) -> bool {
        self.magic == PeMagic::Pe32Plus
    }

    /// Returns the descriptor in slot `kind`, or `None` if the slot was not parsed.
    #[must_use]
    pub fn data_directory(&self, kind: DataDirectoryType) -> Option<&DataDirectory> {
        self.data_directories.get(kind.index())
    }

    /// Decodes the Optional header starting at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnsupportedFormat`] for an unknown magic, or
    /// [`crate::Error::Truncated`] if the fixed fields or the descriptors run past the end of
    /// the input.
    pub fn parse(source: &ByteSource, offset: usize) -> Result<OptionalHeader> {
        let magic = PeMagic::try_from(source.read_u16(offset)?)?;
        let wide = magic == PeMagic::Pe32Plus;

        let mut parser = source.parser(offset, magic.fixed_size())?;
        parser.advance_by(2)?;

        let major_linker_version = parser.read_le::<u8>()?;
        let minor_linker_version = parser.read_le::<u8>()?;
        let size_of_code = parser.read_le::<u32>()?;
        let size_of_initialized_data = parser.read_le::<u32>()?;
        let size_of_uninitialized_data = parser.read_le::<u32>()?;
        let address_of_entry_point = parser.read_le::<u32>()?;
        let base_of_code = parser.read_le::<u32>()?;
        let base_of_data = if wide { 0 } else { parser.read_le::<u32>()? };

        let image_base = read_word(&mut parser, wide)?;

        let section_alignment = parser.read_le::<u32>()?;
        let file_alignment = parser.read_le::<u32>()?;
        let major_operating_system_version = parser.read_le::<u16>()?;
        let minor_operating_system_version = parser.read_le::<u16>()?;
        let major_image_version = parser.read_le::<u16>()?;
        let minor_image_version = parser.read_le::<u16>()?;
        let major_subsystem_version = parser.read_le::<u16>()?;
        let minor_subsystem_version = parser.read_le::<u16>()?;
        let win32_version_value = parser.read_le::<u32>()?;
        let size_of_image = parser.read_le::<u32>()?;
        let size_of_headers = parser.read_le::<u32>()?;
        let check_sum = parser.read_le::<u32>()?;
        let subsystem = Subsystem::from(parser.read_le::<u16>()?);
        let dll_characteristics = DllCharacteristics::from_bits_retain(parser.read_le::<u16>()?);

        let size_of_stack_reserve = read_word(&mut parser, wide)?;
        let size_of_stack_commit = read_word(&mut parser, wide)?;
        let size_of_heap_reserve = read_word(&mut parser, wide)?;
        let size_of_heap_commit = read_word(&mut parser, wide)?;

        let loader_flags = parser.read_le::<u32>()?;
        let number_of_rva_and_sizes = parser.read_le::<u32>()?;

        let count = (number_of_rva_and_sizes as usize).min(MAX_DATA_DIRECTORIES);
        let mut dirs = source.parser(
            offset + magic.fixed_size(),
            count * DataDirectory::SIZE,
        )?;
        let mut data_directories = Vec::with_capacity(count);
        for _ in 0..count {
            data_directories.push(DataDirectory {
                virtual_address: dirs.read_le::<u32>()?,
                size: dirs.read_le::<u32>()?,
            });
        }

        Ok(OptionalHeader {
            magic,
            major_linker_version,
            minor_linker_version,
            size_of_code,
            size_of_initialized_data,
            size_of_uninitialized_data,
            address_of_entry_point,
            base_of_code,
            base_of_data,
            image_base,
            section_alignment,
            file_alignment,
            major_operating_system_version,
            minor_operating_system_version,
            major_image_version,
            minor_image_version,
            major_subsystem_version,
            minor_subsystem_version,
            win32_version_value,
            size_of_image,
            size_of_headers,
            check_sum,
            subsystem,
            dll_characteristics,
            size_of_stack_reserve,
            size_of_stack_commit,
            size_of_heap_reserve,
            size_of_heap_commit,
            loader_flags,
            number_of_rva_and_sizes,
            data_directories,
        })
    }
}

/// Reads a field that is 4 bytes wide in PE32 and 8 bytes wide in PE32+.
fn read_word(parser: &mut Parser<'_>, wide: bool) -> Result<u64> {
    if wide {
        parser.read_le::<u64>()
    } else {
        parser.read_le::<u32>().map(u64::from)
    }
}
