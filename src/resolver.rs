//! Virtual-address to file-offset translation.
//!
//! Data directories and most cross references inside a PE image are RVAs: offsets relative to
//! the address the image is loaded at. [`RvaResolver`] maps them back to positions in the file
//! through the section table. Section order on disk matters: when hostile input declares
//! overlapping sections, the first one that contains the RVA wins.
//!
//! # Usage Examples
//!
//! ```rust
//! use pescope::{PeImage, RvaResolver};
//!
//! # fn example(image: &PeImage) {
//! let resolver = RvaResolver::new(image.sections());
//! if let Some(offset) = resolver.resolve(image.entry_point()) {
//!     println!("entry point is at file offset {offset:#x}");
//! }
//! # }
//! ```

use crate::headers::section::SectionHeader;

/// Translates RVAs into file offsets using a section table.
#[derive(Debug, Clone, Default)]
pub struct RvaResolver {
    sections: Vec<SectionHeader>,
}

impl RvaResolver {
    /// Builds a resolver over `sections`, keeping their order.
    #[must_use]
    pub fn new(sections: &[SectionHeader]) -> Self {
        RvaResolver {
            sections: sections.to_vec(),
        }
    }

    /// Returns the file offset that `rva` maps to, or `None` if no section contains it.
    ///
    /// A result that would not fit in 32 bits is treated as unresolved.
    #[must_use]
    pub fn resolve(&self, rva: u32) -> Option<u32> {
        let section = self.sections.iter().find(|s| s.contains_rva(rva))?;

        let offset = u64::from(rva) - u64::from(section.virtual_address)
            + u64::from(section.pointer_to_raw_data);
        u32::try_from(offset).ok()
    }

    /// Same as [`RvaResolver::resolve`], widened to `usize` for slicing.
    #[must_use]
    pub fn resolve_offset(&self, rva: u32) -> Option<usize> {
        self.resolve(rva).map(|offset| offset as usize)
    }

    /// The section table this resolver searches.
    #[must_use]
    pub fn sections(&self) -> &[SectionHeader] {
        &self.sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::section::SectionCharacteristics;

    fn section(name: &str, va: u32, vsize: u32, raw_ptr: u32, raw_size: u32) -> SectionHeader {
        SectionHeader {
            name: name.to_string(),
            virtual_size: vsize,
            virtual_address: va,
            size_of_raw_data: raw_size,
            pointer_to_raw_data: raw_ptr,
            pointer_to_relocations: 0,
            pointer_to_linenumbers: 0,
            number_of_relocations: 0,
            number_of_linenumbers: 0,
            characteristics: SectionCharacteristics::empty(),
        }
    }

    fn resolver() -> RvaResolver {
        RvaResolver::new(&[
            section(".text", 0x1000, 0x0800, 0x0400, 0x0A00),
            section(".data", 0x2000, 0x1000, 0x0E00, 0x0200),
        ])
    }

    #[test]
    fn every_offset_inside_a_section() {
        let resolver = resolver();
        for section in resolver.sections().to_vec() {
            let extent = section.virtual_size.max(section.size_of_raw_data);
            assert_eq!(
                resolver.resolve(section.virtual_address),
                Some(section.pointer_to_raw_data)
            );
            for k in 0..extent {
                assert_eq!(
                    resolver.resolve(section.virtual_address + k),
                    Some(section.pointer_to_raw_data + k)
                );
            }
        }
    }

    #[test]
    fn outside_every_section() {
        let resolver = resolver();
        assert_eq!(resolver.resolve(0), None);
        assert_eq!(resolver.resolve(0x0FFF), None);
        // .text extent is max(0x800, 0xA00)
        assert_eq!(resolver.resolve(0x1A00), None);
        assert_eq!(resolver.resolve(0x3000), None);
        assert_eq!(resolver.resolve(u32::MAX), None);
        assert_eq!(RvaResolver::default().resolve(0x1000), None);
    }

    #[test]
    fn first_match_wins() {
        let resolver = RvaResolver::new(&[
            section("first", 0x1000, 0x1000, 0x400, 0),
            section("second", 0x1800, 0x1000, 0x2000, 0),
        ]);
        assert_eq!(resolver.resolve(0x1900), Some(0x900 + 0x400));
        assert_eq!(resolver.resolve(0x2100), Some(0x2000 + 0x900));
    }

    #[test]
    fn hostile_values_do_not_overflow() {
        let resolver = RvaResolver::new(&[section("evil", 0xFFFF_0000, 0xFFFF, 0xFFFF_FF00, 0)]);
        assert_eq!(resolver.resolve(0xFFFF_0000), Some(0xFFFF_FF00));
        assert_eq!(resolver.resolve(0xFFFF_00FF), Some(0xFFFF_FFFF));
        assert_eq!(resolver.resolve(0xFFFF_0100), None);
        assert_eq!(resolver.resolve_offset(0xFFFF_0010), Some(0xFFFF_FF10));
    }
}
