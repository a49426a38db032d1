//! The decoded PE image.
//!
//! [`PeImage`] owns the raw bytes of an input and the headers decoded from them. Headers and
//! the section table are decoded eagerly when the image is constructed; the data directories
//! are decoded on first access and memoized, one [`std::sync::OnceLock`] per directory kind.
//!
//! # Failure model
//!
//! - A header-phase failure is fatal: construction returns the error and no image exists.
//! - A directory whose slot is missing, empty or unresolvable is reported as `None`.
//! - A directory whose records run past the end of the input is also reported as `None`.
//!   Partial results are discarded.
//! - A resource tree nested deeper than [`ParseOptions::max_resource_depth`], or holding more
//!   entries than [`ParseOptions::max_resource_entries`], is the one directory-phase failure
//!   that is surfaced, and only by [`PeImage::resources`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use pescope::PeImage;
//!
//! let image = PeImage::from_file("C:/Windows/System32/kernel32.dll")?;
//! println!("64-bit: {}  dll: {}", image.is_64_bit(), image.is_dll());
//!
//! if let Some(exports) = image.exports() {
//!     for function in &exports.functions {
//!         println!("#{} {:?}", function.ordinal, function.name);
//!     }
//! }
//!
//! if let Some(imports) = image.imports() {
//!     for module in &imports.modules {
//!         println!("{} ({} functions)", module.name, module.functions.len());
//!     }
//! }
//! # Ok::<(), pescope::Error>(())
//! ```
//!
//! # Thread Safety
//!
//! [`PeImage`] is [`Send`] and [`Sync`]. Concurrent first accesses to the same directory are
//! serialized by its lock and every caller observes the same decoded value.

use std::{io::Read, path::Path, sync::OnceLock};

use log::{debug, warn};
use strum::IntoEnumIterator;

use crate::{
    directories::{
        debug::DebugDirectory, export::ExportDirectory, import::ImportDirectory,
        reloc::BaseRelocation, resource::ResourceDirectory,
    },
    file::ByteSource,
    headers::{
        coff::CoffHeader,
        datadir::{DataDirectory, DataDirectoryType},
        dos::DosHeader,
        optional::OptionalHeader,
        section::SectionHeader,
        Headers,
    },
    resolver::RvaResolver,
    Error, ParseOptions, Result,
};

/// The resource limit a tree exceeded, with the limit's value.
#[derive(Debug, Clone, Copy)]
enum ResourceLimit {
    Depth(usize),
    Entries(usize),
}

impl From<ResourceLimit> for Error {
    fn from(limit: ResourceLimit) -> Self {
        match limit {
            ResourceLimit::Depth(depth) => Error::ResourceRecursionExceeded(depth),
            ResourceLimit::Entries(entries) => Error::EntryLimitExceeded(entries),
        }
    }
}

/// A decoded Portable Executable image.
pub struct PeImage {
    source: ByteSource,
    options: ParseOptions,
    headers: Headers,
    resolver: RvaResolver,
    exports: OnceLock<Option<ExportDirectory>>,
    imports: OnceLock<Option<ImportDirectory>>,
    resources: OnceLock<std::result::Result<Option<ResourceDirectory>, ResourceLimit>>,
    relocations: OnceLock<Option<BaseRelocation>>,
    debug: OnceLock<Option<DebugDirectory>>,
}

impl PeImage {
    /// Memory-maps and decodes the file at `path` with default options.
    ///
    /// # Errors
    /// - [`crate::Error::NotFound`] if the path does not exist
    /// - [`crate::Error::FileError`] for other I/O failures
    /// - any header-phase error, see [`Headers::parse`]
    pub fn from_file(path: impl AsRef<Path>) -> Result<PeImage> {
        Self::from_file_with_options(path, ParseOptions::default())
    }

    /// Memory-maps and decodes the file at `path`.
    ///
    /// # Errors
    /// See [`PeImage::from_file`].
    pub fn from_file_with_options(
        path: impl AsRef<Path>,
        options: ParseOptions,
    ) -> Result<PeImage> {
        let source = ByteSource::from_file(path, &options)?;
        Self::load(source, options)
    }

    /// Decodes an in-memory buffer with default options.
    ///
    /// # Errors
    /// - [`crate::Error::UnsupportedFormat`] if the buffer is larger than the size cap
    /// - any header-phase error, see [`Headers::parse`]
    pub fn from_mem(data: Vec<u8>) -> Result<PeImage> {
        Self::from_mem_with_options(data, ParseOptions::default())
    }

    /// Decodes an in-memory buffer.
    ///
    /// # Errors
    /// See [`PeImage::from_mem`].
    pub fn from_mem_with_options(data: Vec<u8>, options: ParseOptions) -> Result<PeImage> {
        let source = ByteSource::from_mem(data, &options)?;
        Self::load(source, options)
    }

    /// Reads `reader` to the end and decodes the result with default options.
    ///
    /// # Errors
    /// - [`crate::Error::FileError`] if reading fails
    /// - [`crate::Error::UnsupportedFormat`] if the stream is larger than the size cap
    /// - any header-phase error, see [`Headers::parse`]
    pub fn from_reader<R: Read>(reader: R) -> Result<PeImage> {
        Self::from_reader_with_options(reader, ParseOptions::default())
    }

    /// Reads `reader` to the end and decodes the result.
    ///
    /// # Errors
    /// See [`PeImage::from_reader`].
    pub fn from_reader_with_options<R: Read>(reader: R, options: ParseOptions) -> Result<PeImage> {
        let source = ByteSource::from_reader(reader, &options)?;
        Self::load(source, options)
    }

    fn load(source: ByteSource, options: ParseOptions) -> Result<PeImage> {
        let headers = Headers::parse(&source)?;
        let resolver = RvaResolver::new(&headers.sections);

        Ok(PeImage {
            source,
            options,
            headers,
            resolver,
            exports: OnceLock::new(),
            imports: OnceLock::new(),
            resources: OnceLock::new(),
            relocations: OnceLock::new(),
            debug: OnceLock::new(),
        })
    }

    /// All decoded headers.
    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// The MS-DOS header.
    #[must_use]
    pub fn dos_header(&self) -> &DosHeader {
        &self.headers.dos
    }

    /// The COFF file header.
    #[must_use]
    pub fn coff_header(&self) -> &CoffHeader {
        &self.headers.coff
    }

    /// The Optional header.
    #[must_use]
    pub fn optional_header(&self) -> &OptionalHeader {
        &self.headers.optional
    }

    /// The section table in disk order.
    #[must_use]
    pub fn sections(&self) -> &[SectionHeader] {
        &self.headers.sections
    }

    /// The first section named `name`.
    #[must_use]
    pub fn section(&self, name: &str) -> Option<&SectionHeader> {
        self.headers.sections.iter().find(|section| section.name == name)
    }

    /// `true` for PE32+ images.
    #[must_use]
    pub fn is_64_bit(&self) -> bool {
        self.headers.optional.is_pe32_plus()
    }

    /// `true` if the DLL characteristic is set.
    #[must_use]
    pub fn is_dll(&self) -> bool {
        self.headers.coff.is_dll()
    }

    /// Preferred load address.
    #[must_use]
    pub fn image_base(&self) -> u64 {
        self.headers.optional.image_base
    }

    /// RVA of the entry point, zero if there is none.
    #[must_use]
    pub fn entry_point(&self) -> u32 {
        self.headers.optional.address_of_entry_point
    }

    /// The options this image was decoded with.
    #[must_use]
    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Size of the input in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.source.len()
    }

    /// `true` if the input is empty. Never the case for a decoded image.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    /// The whole input.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.source.data()
    }

    /// The byte source backing this image.
    #[must_use]
    pub fn source(&self) -> &ByteSource {
        &self.source
    }

    /// The resolver built from this image's section table.
    #[must_use]
    pub fn resolver(&self) -> &RvaResolver {
        &self.resolver
    }

    /// Translates `rva` into a file offset, see [`RvaResolver::resolve`].
    #[must_use]
    pub fn resolve_rva(&self, rva: u32) -> Option<u32> {
        self.resolver.resolve(rva)
    }

    /// Iterates the non-empty data-directory slots with their kind.
    pub fn data_directories(
        &self,
    ) -> impl Iterator<Item = (DataDirectoryType, DataDirectory)> + '_ {
        DataDirectoryType::iter()
            .zip(self.headers.optional.data_directories.iter())
            .filter(|(_, dir)| !dir.is_empty())
            .map(|(kind, dir)| (kind, *dir))
    }

    /// Raw data of the first section named `name`.
    ///
    /// # Errors
    /// - [`crate::Error::NotFound`] if no section has that name
    /// - [`crate::Error::Truncated`] if the section's raw data runs past the end of the input
    pub fn section_data(&self, name: &str) -> Result<&[u8]> {
        let Some(section) = self.section(name) else {
            return Err(Error::NotFound(format!("section '{name}'")));
        };
        self.raw_data(section)
    }

    /// Raw data of the section at `index` in the section table.
    ///
    /// # Errors
    /// - [`crate::Error::OutOfRange`] if `index` is past the end of the section table
    /// - [`crate::Error::Truncated`] if the section's raw data runs past the end of the input
    pub fn section_data_by_index(&self, index: usize) -> Result<&[u8]> {
        let Some(section) = self.headers.sections.get(index) else {
            return Err(Error::OutOfRange {
                index,
                count: self.headers.sections.len(),
            });
        };
        self.raw_data(section)
    }

    fn raw_data(&self, section: &SectionHeader) -> Result<&[u8]> {
        if section.size_of_raw_data == 0 || section.pointer_to_raw_data == 0 {
            return Ok(&[]);
        }
        self.source.read(
            section.pointer_to_raw_data as usize,
            section.size_of_raw_data as usize,
        )
    }

    /// The export directory, if present and decodable.
    pub fn exports(&self) -> Option<&ExportDirectory> {
        self.exports
            .get_or_init(|| {
                let dir = self.descriptor(DataDirectoryType::ExportTable)?;
                Self::absorb(
                    DataDirectoryType::ExportTable,
                    ExportDirectory::parse(&self.source, &self.resolver, &dir),
                )
            })
            .as_ref()
    }

    /// The import directory, if present and decodable.
    pub fn imports(&self) -> Option<&ImportDirectory> {
        self.imports
            .get_or_init(|| {
                let dir = self.descriptor(DataDirectoryType::ImportTable)?;
                Self::absorb(
                    DataDirectoryType::ImportTable,
                    ImportDirectory::parse(&self.source, &self.resolver, &dir, self.is_64_bit()),
                )
            })
            .as_ref()
    }

    /// The resource tree, if present and decodable.
    ///
    /// # Errors
    /// - [`crate::Error::ResourceRecursionExceeded`] if the tree nests deeper than
    ///   [`ParseOptions::max_resource_depth`]
    /// - [`crate::Error::EntryLimitExceeded`] if the tree holds more entries than
    ///   [`ParseOptions::max_resource_entries`] or the input size allows
    ///
    /// The error is memoized like a decoded tree.
    pub fn resources(&self) -> Result<Option<&ResourceDirectory>> {
        let cached = self.resources.get_or_init(|| {
            let Some(dir) = self.descriptor(DataDirectoryType::ResourceTable) else {
                return Ok(None);
            };
            match ResourceDirectory::parse(&self.source, &self.resolver, &dir, &self.options) {
                Err(Error::ResourceRecursionExceeded(depth)) => Err(ResourceLimit::Depth(depth)),
                Err(Error::EntryLimitExceeded(entries)) => Err(ResourceLimit::Entries(entries)),
                other => Ok(Self::absorb(DataDirectoryType::ResourceTable, other)),
            }
        });

        match cached {
            Ok(tree) => Ok(tree.as_ref()),
            Err(limit) => Err((*limit).into()),
        }
    }

    /// The base relocation table, if present and decodable.
    pub fn relocations(&self) -> Option<&BaseRelocation> {
        self.relocations
            .get_or_init(|| {
                let dir = self.descriptor(DataDirectoryType::BaseRelocationTable)?;
                Self::absorb(
                    DataDirectoryType::BaseRelocationTable,
                    BaseRelocation::parse(&self.source, &self.resolver, &dir),
                )
            })
            .as_ref()
    }

    /// The debug directory, if present and decodable.
    pub fn debug(&self) -> Option<&DebugDirectory> {
        self.debug
            .get_or_init(|| {
                let dir = self.descriptor(DataDirectoryType::Debug)?;
                Self::absorb(
                    DataDirectoryType::Debug,
                    DebugDirectory::parse(&self.source, &self.resolver, &dir),
                )
            })
            .as_ref()
    }

    /// The descriptor of slot `kind`, or `None` if it was not declared or is empty.
    fn descriptor(&self, kind: DataDirectoryType) -> Option<DataDirectory> {
        let Some(dir) = self.headers.optional.data_directory(kind) else {
            debug!(
                "{:?} absent: only {} directories declared",
                kind,
                self.headers.optional.data_directories.len()
            );
            return None;
        };
        if dir.is_empty() {
            debug!("{kind:?} absent: empty descriptor");
            return None;
        }
        Some(*dir)
    }

    /// Downgrades a decoder failure to an absent directory.
    fn absorb<T>(kind: DataDirectoryType, result: Result<Option<T>>) -> Option<T> {
        match result {
            Ok(Some(decoded)) => Some(decoded),
            Ok(None) => {
                debug!("{kind:?} absent: RVA does not map into any section");
                None
            }
            Err(error) => {
                warn!("{kind:?} discarded: {error}");
                None
            }
        }
    }
}

impl std::fmt::Debug for PeImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeImage")
            .field("len", &self.source.len())
            .field("machine", &self.headers.coff.machine)
            .field("magic", &self.headers.optional.magic)
            .field("sections", &self.headers.sections.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        headers::{coff::MachineType, optional::PeMagic},
        test::builder::{PeBuilder, OPTIONAL_OFFSET},
    };
    use std::io::Cursor;

    fn debug_entry() -> Vec<u8> {
        let mut entry = vec![0_u8; 28];
        entry[12..16].copy_from_slice(&16_u32.to_le_bytes());
        entry
    }

    #[test]
    fn send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PeImage>();
    }

    #[test]
    fn buffer_and_stream_agree() {
        for bytes in [PeBuilder::minimal_pe32(), PeBuilder::minimal_pe32_plus()] {
            let from_mem = PeImage::from_mem(bytes.clone()).unwrap();
            let from_reader = PeImage::from_reader(Cursor::new(bytes)).unwrap();

            assert_eq!(from_mem.headers(), from_reader.headers());
            assert_eq!(from_mem.is_64_bit(), from_reader.is_64_bit());
            assert_eq!(from_mem.is_dll(), from_reader.is_dll());
            assert_eq!(from_mem.data(), from_reader.data());
        }
    }

    #[test]
    fn pe32_basics() {
        let image = PeImage::from_mem(PeBuilder::minimal_pe32()).unwrap();

        assert!(!image.is_64_bit());
        assert!(!image.is_dll());
        assert_eq!(image.coff_header().machine, MachineType::I386);
        assert_eq!(image.optional_header().magic, PeMagic::Pe32);
        assert_eq!(image.optional_header().base_of_data, 0x2000);
        assert_eq!(image.image_base(), 0x0040_0000);
        assert_eq!(image.entry_point(), 0x1000);
        assert_eq!(image.len(), 0x400);
        assert!(!image.is_empty());
        assert!(image.dos_header().is_valid());
        assert_eq!(image.options(), &ParseOptions::default());
    }

    #[test]
    fn pe32_plus_basics() {
        let image = PeImage::from_mem(PeBuilder::pe32_plus().dll().build()).unwrap();

        assert!(image.is_64_bit());
        assert!(image.is_dll());
        assert_eq!(image.optional_header().base_of_data, 0);
        assert_eq!(image.image_base(), 0x1_4000_0000);
        assert!(image.sections().is_empty());
    }

    #[test]
    fn directory_count_is_clamped() {
        let image =
            PeImage::from_mem(PeBuilder::pe32().number_of_rva_and_sizes(100).build()).unwrap();
        assert_eq!(image.optional_header().number_of_rva_and_sizes, 100);
        assert_eq!(image.optional_header().data_directories.len(), 16);

        let image =
            PeImage::from_mem(PeBuilder::pe32().number_of_rva_and_sizes(5).build()).unwrap();
        assert_eq!(image.optional_header().data_directories.len(), 5);
    }

    #[test]
    fn header_errors_are_fatal() {
        let mut bytes = PeBuilder::minimal_pe32();
        bytes[0] = b'X';
        assert!(matches!(
            PeImage::from_mem(bytes),
            Err(Error::InvalidSignature {
                expected: 0x5A4D,
                ..
            })
        ));

        assert!(PeImage::from_mem(vec![b'M', b'Z', 0, 0])
            .unwrap_err()
            .is_truncated());
        assert!(PeImage::from_mem(Vec::new()).unwrap_err().is_truncated());
    }

    #[test]
    fn size_cap() {
        let options = ParseOptions::default().with_max_file_size(0x100);
        assert!(matches!(
            PeImage::from_mem_with_options(PeBuilder::minimal_pe32(), options),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn section_lookup() {
        let bytes = PeBuilder::pe32()
            .section_sized(".text", 0x1000, 0x10, vec![0xC3; 0x10], 0x6000_0020)
            .section_sized(".bss", 0x2000, 0x800, Vec::new(), 0xC000_0080)
            .build();
        let image = PeImage::from_mem(bytes).unwrap();

        let text = image.section_data(".text").unwrap();
        assert_eq!(text.len(), 0x200);
        assert!(text[..0x10].iter().all(|b| *b == 0xC3));
        assert_eq!(image.section_data_by_index(0).unwrap(), text);

        assert!(image.section_data(".bss").unwrap().is_empty());
        assert!(image.section_data_by_index(1).unwrap().is_empty());
        assert_eq!(image.section(".bss").unwrap().virtual_size, 0x800);

        assert!(matches!(
            image.section_data(".reloc"),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            image.section_data_by_index(2),
            Err(Error::OutOfRange { index: 2, count: 2 })
        ));
    }

    #[test]
    fn section_past_end_of_file() {
        let mut bytes = PeBuilder::minimal_pe32();
        let size_of_raw_data = OPTIONAL_OFFSET + 224 + 16;
        bytes[size_of_raw_data..size_of_raw_data + 4].copy_from_slice(&0x1_0000_u32.to_le_bytes());

        let image = PeImage::from_mem(bytes).unwrap();
        assert!(image.section_data(".text").unwrap_err().is_truncated());
    }

    #[test]
    fn rva_passthrough() {
        let image = PeImage::from_mem(PeBuilder::minimal_pe32()).unwrap();
        assert_eq!(image.resolve_rva(0x1000), Some(0x200));
        assert_eq!(image.resolve_rva(0x1004), Some(0x204));
        assert_eq!(image.resolve_rva(0x0FFF), None);
        assert_eq!(image.resolve_rva(0x5000), None);
    }

    #[test]
    fn data_directory_iteration() {
        let bytes = PeBuilder::pe32()
            .directory(1, 0x2000, 0x28)
            .directory(6, 0x3000, 0x1C)
            .directory(14, 0x4000, 0)
            .build();
        let image = PeImage::from_mem(bytes).unwrap();

        let present: Vec<_> = image.data_directories().collect();
        assert_eq!(
            present,
            vec![
                (
                    DataDirectoryType::ImportTable,
                    DataDirectory {
                        virtual_address: 0x2000,
                        size: 0x28
                    }
                ),
                (
                    DataDirectoryType::Debug,
                    DataDirectory {
                        virtual_address: 0x3000,
                        size: 0x1C
                    }
                ),
            ]
        );
    }

    #[test]
    fn directories_absent_without_descriptor() {
        let image = PeImage::from_mem(PeBuilder::minimal_pe32()).unwrap();
        assert!(image.exports().is_none());
        assert!(image.imports().is_none());
        assert!(image.resources().unwrap().is_none());
        assert!(image.relocations().is_none());
        assert!(image.debug().is_none());
    }

    #[test]
    fn slot_beyond_declared_count_is_absent() {
        let build = |count| {
            PeBuilder::pe32()
                .section(".rdata", 0x2000, debug_entry())
                .directory(6, 0x2000, 28)
                .number_of_rva_and_sizes(count)
                .build()
        };

        assert!(PeImage::from_mem(build(6)).unwrap().debug().is_none());
        assert!(PeImage::from_mem(build(7)).unwrap().debug().is_some());
    }

    #[test]
    fn unresolvable_directory_is_absent() {
        let bytes = PeBuilder::pe32()
            .section(".rdata", 0x2000, debug_entry())
            .directory(6, 0x9000, 28)
            .build();
        assert!(PeImage::from_mem(bytes).unwrap().debug().is_none());
    }

    #[test]
    fn truncated_directory_is_absent() {
        let bytes = PeBuilder::pe32()
            .section(".rdata", 0x2000, debug_entry())
            .directory(6, 0x2000, 28 * 0x1000)
            .build();
        let image = PeImage::from_mem(bytes).unwrap();

        assert!(image.debug().is_none());
        assert_eq!(image.sections().len(), 1);
        assert!(image.section_data(".rdata").is_ok());
    }

    #[test]
    fn directories_are_memoized() {
        let bytes = PeBuilder::with_directory(false, 6, 0x2000, debug_entry());
        let image = PeImage::from_mem(bytes).unwrap();

        let first = image.debug().unwrap();
        let second = image.debug().unwrap();
        assert!(std::ptr::eq(first, second));
        assert_eq!(first.entries.len(), 1);
    }

    #[test]
    fn resource_entry_limit_is_memoized() {
        // root with two leaf entries sharing one data entry
        let mut payload = vec![0_u8; 12];
        payload.extend_from_slice(&0_u16.to_le_bytes());
        payload.extend_from_slice(&2_u16.to_le_bytes());
        for id in [1_u32, 2] {
            payload.extend_from_slice(&id.to_le_bytes());
            payload.extend_from_slice(&32_u32.to_le_bytes());
        }
        payload.extend_from_slice(&[0; 16]);
        let bytes = PeBuilder::with_directory(false, 2, 0x2000, payload);

        let options = ParseOptions::default().with_max_resource_entries(1);
        let image = PeImage::from_mem_with_options(bytes.clone(), options).unwrap();
        assert!(matches!(
            image.resources(),
            Err(Error::EntryLimitExceeded(1))
        ));
        assert!(matches!(
            image.resources(),
            Err(Error::EntryLimitExceeded(1))
        ));
        assert!(image.section_data(".rdata").is_ok());

        let image = PeImage::from_mem(bytes).unwrap();
        assert_eq!(image.resources().unwrap().unwrap().entries().len(), 2);
    }

    #[test]
    fn concurrent_first_access() {
        let bytes = PeBuilder::with_directory(true, 6, 0x2000, debug_entry());
        let image = PeImage::from_mem(bytes).unwrap();

        let addresses: Vec<usize> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| image.debug().map(|d| std::ptr::from_ref(d) as usize)))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap().unwrap())
                .collect()
        });

        assert!(addresses.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[test]
    fn debug_format() {
        let image = PeImage::from_mem(PeBuilder::minimal_pe32_plus()).unwrap();
        let rendered = format!("{image:?}");
        assert!(rendered.contains("PeImage"));
        assert!(rendered.contains("Amd64"));
    }
}
