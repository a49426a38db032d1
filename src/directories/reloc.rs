//! The base relocation table (`.reloc`).
//!
//! The table is a sequence of blocks, one per 4 KiB page that needs fixups. Each block starts
//! with the page RVA and the block size (header included), followed by 16-bit entries whose
//! high nibble is the relocation type and low 12 bits the offset within the page.
//! `IMAGE_REL_BASED_ABSOLUTE` entries are padding and are dropped while decoding.

use crate::{
    directories::table, file::ByteSource, headers::datadir::DataDirectory, resolver::RvaResolver,
    Result,
};

/// The kind of fixup a relocation entry requests.
///
/// Values 5, 7 and 8 are machine specific; their meaning depends on the COFF machine type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseRelocationType {
    /// Padding, skipped by the loader
    Absolute,
    /// High 16 bits of the delta
    High,
    /// Low 16 bits of the delta
    Low,
    /// All 32 bits of the delta
    HighLow,
    /// High 16 bits adjusted by the next entry
    HighAdj,
    /// `MIPS_JMPADDR`, `ARM_MOV32` or `RISCV_HIGH20`
    MachineSpecific5,
    /// Reserved
    Reserved6,
    /// `THUMB_MOV32` or `RISCV_LOW12I`
    MachineSpecific7,
    /// `RISCV_LOW12S` or `LOONGARCH32_MARK_LA` / `LOONGARCH64_MARK_LA`
    MachineSpecific8,
    /// `MIPS_JMPADDR16`
    MipsJmpAddr16,
    /// All 64 bits of the delta
    Dir64,
    /// Any other type nibble
    Other(u8),
}

impl From<u8> for BaseRelocationType {
    fn from(value: u8) -> Self {
        match value {
            0 => BaseRelocationType::Absolute,
            1 => BaseRelocationType::High,
            2 => BaseRelocationType::Low,
            3 => BaseRelocationType::HighLow,
            4 => BaseRelocationType::HighAdj,
            5 => BaseRelocationType::MachineSpecific5,
            6 => BaseRelocationType::Reserved6,
            7 => BaseRelocationType::MachineSpecific7,
            8 => BaseRelocationType::MachineSpecific8,
            9 => BaseRelocationType::MipsJmpAddr16,
            10 => BaseRelocationType::Dir64,
            other => BaseRelocationType::Other(other),
        }
    }
}

/// A single fixup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseRelocationEntry {
    /// Fixup kind, never [`BaseRelocationType::Absolute`]
    pub kind: BaseRelocationType,
    /// Offset within the block's page
    pub offset: u16,
}

/// The fixups for one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseRelocationBlock {
    /// RVA of the page
    pub page_rva: u32,
    /// Non-padding entries in disk order
    pub entries: Vec<BaseRelocationEntry>,
}

/// A decoded base relocation table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaseRelocation {
    /// Blocks in disk order
    pub blocks: Vec<BaseRelocationBlock>,
}

impl BaseRelocation {
    /// Size of a block header.
    pub const BLOCK_HEADER_SIZE: usize = 8;

    /// Total number of entries across all blocks.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.blocks.iter().map(|block| block.entries.len()).sum()
    }

    /// Decodes the relocation table described by `dir`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Truncated`] if a block runs past the end of the input.
    pub fn parse(
        source: &ByteSource,
        resolver: &RvaResolver,
        dir: &DataDirectory,
    ) -> Result<Option<BaseRelocation>> {
        let Some(start) = resolver.resolve_offset(dir.virtual_address) else {
            return Ok(None);
        };
        let end = start.saturating_add(dir.size as usize);

        let mut blocks = Vec::new();
        let mut position = start;
        while position < end {
            let mut header = source.parser(position, Self::BLOCK_HEADER_SIZE)?;
            let page_rva = header.read_le::<u32>()?;
            let block_size = header.read_le::<u32>()?;
            if block_size == 0 {
                break;
            }

            let count = block_size.saturating_sub(Self::BLOCK_HEADER_SIZE as u32) / 2;
            let mut raw = table(source, position + Self::BLOCK_HEADER_SIZE, count, 2)?;

            let mut entries = Vec::new();
            for _ in 0..count {
                let value = raw.read_le::<u16>()?;
                let kind = BaseRelocationType::from((value >> 12) as u8);
                if kind == BaseRelocationType::Absolute {
                    continue;
                }
                entries.push(BaseRelocationEntry {
                    kind,
                    offset: value & 0x0FFF,
                });
            }

            blocks.push(BaseRelocationBlock { page_rva, entries });

            let Some(next) = position.checked_add(block_size as usize) else {
                break;
            };
            position = next;
        }

        Ok(Some(BaseRelocation { blocks }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test::builder::PeBuilder, PeImage};

    const RVA: u32 = 0x5000;

    fn block(page_rva: u32, entries: &[u16]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&page_rva.to_le_bytes());
        data.extend_from_slice(&(8 + 2 * entries.len() as u32).to_le_bytes());
        for entry in entries {
            data.extend_from_slice(&entry.to_le_bytes());
        }
        data
    }

    fn relocations(payload: Vec<u8>) -> Option<BaseRelocation> {
        let image = PeBuilder::with_directory(true, 5, RVA, payload);
        PeImage::from_mem(image).unwrap().relocations().cloned()
    }

    #[test]
    fn blocks_and_entries() {
        let mut payload = block(0x1000, &[0xA010, 0xA018, 0x0000]);
        payload.extend(block(0x2000, &[0x3004, 0x1FFF]));

        let relocations = relocations(payload).unwrap();
        assert_eq!(relocations.blocks.len(), 2);
        assert_eq!(relocations.entry_count(), 4);

        let first = &relocations.blocks[0];
        assert_eq!(first.page_rva, 0x1000);
        assert_eq!(
            first.entries,
            vec![
                BaseRelocationEntry {
                    kind: BaseRelocationType::Dir64,
                    offset: 0x010
                },
                BaseRelocationEntry {
                    kind: BaseRelocationType::Dir64,
                    offset: 0x018
                },
            ]
        );

        let second = &relocations.blocks[1];
        assert_eq!(second.entries[0].kind, BaseRelocationType::HighLow);
        assert_eq!(second.entries[0].offset, 0x004);
        assert_eq!(second.entries[1].kind, BaseRelocationType::High);
        assert_eq!(second.entries[1].offset, 0xFFF);
    }

    #[test]
    fn absolute_entries_never_appear() {
        let payload = block(0x1000, &[0x0000, 0x0123, 0x0FFF, 0xC001, 0x5002]);
        let relocations = relocations(payload).unwrap();

        let kinds: Vec<_> = relocations.blocks[0].entries.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                BaseRelocationType::Other(12),
                BaseRelocationType::MachineSpecific5
            ]
        );
        assert!(relocations
            .blocks
            .iter()
            .flat_map(|b| b.entries.iter())
            .all(|e| e.kind != BaseRelocationType::Absolute));
    }

    #[test]
    fn zero_block_size_stops() {
        let mut payload = block(0x1000, &[0x3000]);
        payload.extend_from_slice(&0x2000_u32.to_le_bytes());
        payload.extend_from_slice(&0_u32.to_le_bytes());
        payload.extend(block(0x3000, &[0x3000]));

        let relocations = relocations(payload).unwrap();
        assert_eq!(relocations.blocks.len(), 1);
    }

    #[test]
    fn undersized_block_has_no_entries() {
        // a 4-byte block; the next header overlaps its size field and reads a zero size
        let mut payload = Vec::new();
        payload.extend_from_slice(&0x1000_u32.to_le_bytes());
        payload.extend_from_slice(&4_u32.to_le_bytes());
        payload.extend_from_slice(&[0; 8]);

        let relocations = relocations(payload).unwrap();
        assert_eq!(relocations.blocks.len(), 1);
        assert_eq!(relocations.blocks[0].page_rva, 0x1000);
        assert!(relocations.blocks[0].entries.is_empty());
    }

    #[test]
    fn block_past_end_of_file_is_absent() {
        let mut payload = block(0x1000, &[0x3000]);
        payload[4..8].copy_from_slice(&0x0010_0000_u32.to_le_bytes());
        assert!(relocations(payload).is_none());
    }

    #[test]
    fn type_nibbles() {
        assert_eq!(BaseRelocationType::from(0), BaseRelocationType::Absolute);
        assert_eq!(BaseRelocationType::from(4), BaseRelocationType::HighAdj);
        assert_eq!(BaseRelocationType::from(9), BaseRelocationType::MipsJmpAddr16);
        assert_eq!(BaseRelocationType::from(15), BaseRelocationType::Other(15));
    }
}
