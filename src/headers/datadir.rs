//! Data-directory descriptors.
//!
//! The Optional header ends with up to 16 `(VirtualAddress, Size)` pairs. The position of a
//! pair in the array names the directory it describes, see [`DataDirectoryType`].

use strum::{EnumCount, EnumIter};

/// Maximum number of data-directory slots an Optional header can describe.
pub const MAX_DATA_DIRECTORIES: usize = 16;

/// A `(VirtualAddress, Size)` descriptor from the Optional header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DataDirectory {
    /// RVA of the table
    pub virtual_address: u32,
    /// Size of the table in bytes
    pub size: u32,
}

impl DataDirectory {
    /// Size of one descriptor on disk.
    pub const SIZE: usize = 8;

    /// A descriptor with a zero address or a zero size describes no table.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.virtual_address == 0 || self.size == 0
    }

    /// Returns `true` if `rva` lies inside `[virtual_address, virtual_address + size)`.
    #[must_use]
    pub fn contains_rva(&self, rva: u32) -> bool {
        let start = u64::from(self.virtual_address);
        let end = start + u64::from(self.size);
        (start..end).contains(&u64::from(rva))
    }
}

/// Slot indices of the data-directory array, in on-disk order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount)]
#[repr(usize)]
pub enum DataDirectoryType {
    /// Export table (`.edata`)
    ExportTable = 0,
    /// Import table (`.idata`)
    ImportTable = 1,
    /// Resource table (`.rsrc`)
    ResourceTable = 2,
    /// Exception table (`.pdata`)
    ExceptionTable = 3,
    /// Attribute certificate table, the address is a file offset
    CertificateTable = 4,
    /// Base relocation table (`.reloc`)
    BaseRelocationTable = 5,
    /// Debug data
    Debug = 6,
    /// Reserved, must be zero
    Architecture = 7,
    /// RVA of the global pointer register value
    GlobalPtr = 8,
    /// Thread local storage table (`.tls`)
    TlsTable = 9,
    /// Load configuration table
    LoadConfigTable = 10,
    /// Bound import table
    BoundImport = 11,
    /// Import address table
    ImportAddressTable = 12,
    /// Delay import descriptor
    DelayImportDescriptor = 13,
    /// CLR runtime header (`.cormeta`)
    ClrRuntimeHeader = 14,
    /// Reserved, must be zero
    Reserved = 15,
}

impl DataDirectoryType {
    /// Position of this slot in the data-directory array.
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn slots_are_contiguous() {
        assert_eq!(DataDirectoryType::COUNT, MAX_DATA_DIRECTORIES);
        for (expected, kind) in DataDirectoryType::iter().enumerate() {
            assert_eq!(kind.index(), expected);
        }
        assert_eq!(DataDirectoryType::Debug.index(), 6);
        assert_eq!(DataDirectoryType::ClrRuntimeHeader.index(), 14);
    }

    #[test]
    fn emptiness() {
        assert!(DataDirectory::default().is_empty());
        assert!(DataDirectory {
            virtual_address: 0x1000,
            size: 0
        }
        .is_empty());
        assert!(DataDirectory {
            virtual_address: 0,
            size: 0x20
        }
        .is_empty());
        assert!(!DataDirectory {
            virtual_address: 0x1000,
            size: 0x20
        }
        .is_empty());
    }

    #[test]
    fn range() {
        let dir = DataDirectory {
            virtual_address: 0xFFFF_FFF0,
            size: 0x100,
        };
        assert!(!dir.contains_rva(0xFFFF_FFEF));
        assert!(dir.contains_rva(0xFFFF_FFF0));
        assert!(dir.contains_rva(u32::MAX));
    }
}
