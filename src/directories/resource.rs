//! The resource directory tree.
//!
//! Resources are stored as a tree of `IMAGE_RESOURCE_DIRECTORY` nodes. Conventionally the tree
//! has three levels (type, name, language) with data entries as leaves, but nothing in the
//! format enforces that: every offset inside the tree is relative to the start of the resource
//! section and may point anywhere, including back at an ancestor. Decoding therefore threads an
//! explicit depth through the recursion and gives up once it passes
//! [`crate::ParseOptions::max_resource_depth`].
//!
//! Sibling entries may also point at the same child, so a shallow tree can still expand
//! exponentially. The total number of decoded entries is capped by
//! [`crate::ParseOptions::max_resource_entries`] and by the input size divided by the entry
//! size, whichever is smaller.
//!
//! # Node layout
//!
//! ```text
//! +0   Characteristics        u32
//! +4   TimeDateStamp          u32
//! +8   MajorVersion           u16
//! +10  MinorVersion           u16
//! +12  NumberOfNamedEntries   u16
//! +14  NumberOfIdEntries      u16
//! +16  entries                (named + id) * 8 bytes
//! ```
//!
//! Each entry is a `NameOrId` word (high bit set: offset of a length-prefixed UTF-16LE name)
//! followed by a `DataOrSubdirectory` word (high bit set: offset of a child node, otherwise
//! offset of a 16-byte data entry).

use log::warn;
use widestring::U16Str;

use crate::{
    file::ByteSource, headers::datadir::DataDirectory, resolver::RvaResolver, Error,
    ParseOptions, Result,
};

const HIGH_BIT: u32 = 0x8000_0000;

/// How an entry is identified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceName {
    /// A numeric id, e.g. `RT_ICON` at the type level
    Id(u32),
    /// A string name
    Name(String),
}

/// What an entry points to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceNode {
    /// A nested directory node
    Directory(ResourceDirectory),
    /// A leaf describing the resource bytes
    Data(ResourceDataEntry),
}

/// A leaf of the resource tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceDataEntry {
    /// RVA of the resource bytes
    pub rva: u32,
    /// Size of the resource bytes
    pub size: u32,
    /// Code page used to decode code point values in the resource
    pub code_page: u32,
}

impl ResourceDataEntry {
    /// Size of a data entry record.
    pub const SIZE: usize = 16;
}

/// One entry of a resource directory node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDirectoryEntry {
    /// Name or numeric id
    pub name: ResourceName,
    /// Child node or leaf
    pub node: ResourceNode,
}

impl ResourceDirectoryEntry {
    /// Size of an entry record.
    pub const SIZE: usize = 8;

    /// Returns `true` if this entry leads to a nested directory.
    #[must_use]
    pub fn is_directory(&self) -> bool {
        matches!(self.node, ResourceNode::Directory(_))
    }

    /// Returns `true` if this entry is identified by a string.
    #[must_use]
    pub fn is_named(&self) -> bool {
        matches!(self.name, ResourceName::Name(_))
    }

    /// The string name, for named entries.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match &self.name {
            ResourceName::Name(name) => Some(name),
            ResourceName::Id(_) => None,
        }
    }

    /// The numeric id, for id entries.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        match self.name {
            ResourceName::Id(id) => Some(id),
            ResourceName::Name(_) => None,
        }
    }

    /// The nested directory, if this entry has one.
    #[must_use]
    pub fn subdirectory(&self) -> Option<&ResourceDirectory> {
        match &self.node {
            ResourceNode::Directory(directory) => Some(directory),
            ResourceNode::Data(_) => None,
        }
    }

    /// The data entry, if this entry is a leaf.
    #[must_use]
    pub fn data(&self) -> Option<&ResourceDataEntry> {
        match &self.node {
            ResourceNode::Data(data) => Some(data),
            ResourceNode::Directory(_) => None,
        }
    }
}

/// A resource directory node and everything below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDirectory {
    /// Reserved, zero
    pub characteristics: u32,
    /// Creation time of the resource data
    pub time_date_stamp: u32,
    /// Major version
    pub major_version: u16,
    /// Minor version
    pub minor_version: u16,
    /// Entries in disk order, named entries first
    pub entries: Vec<ResourceDirectoryEntry>,
}

impl ResourceDirectory {
    /// Size of a directory node header.
    pub const SIZE: usize = 16;

    /// Entries of this node in disk order.
    #[must_use]
    pub fn entries(&self) -> &[ResourceDirectoryEntry] {
        &self.entries
    }

    /// Decodes the resource tree described by `dir`.
    ///
    /// The root node has depth 0. A node deeper than `options.max_resource_depth` aborts the
    /// decode, as does a tree with more entries than the entry limit allows.
    ///
    /// # Errors
    /// - [`crate::Error::ResourceRecursionExceeded`] if the tree nests too deep
    /// - [`crate::Error::EntryLimitExceeded`] if the tree holds too many entries
    /// - [`crate::Error::Truncated`] if a node, entry, name or data entry runs past the end of
    ///   the input
    pub fn parse(
        source: &ByteSource,
        resolver: &RvaResolver,
        dir: &DataDirectory,
        options: &ParseOptions,
    ) -> Result<Option<ResourceDirectory>> {
        let Some(base) = resolver.resolve_offset(dir.virtual_address) else {
            return Ok(None);
        };

        let max_entries = options
            .max_resource_entries
            .min(source.len() / ResourceDirectoryEntry::SIZE);
        let mut tree = TreeReader {
            source,
            base,
            max_depth: options.max_resource_depth,
            max_entries,
            remaining: max_entries,
        };
        tree.node(base, 0).map(Some)
    }
}

struct TreeReader<'a> {
    source: &'a ByteSource,
    /// File offset of the root node, all tree offsets are relative to it
    base: usize,
    max_depth: usize,
    max_entries: usize,
    /// Entries that may still be decoded
    remaining: usize,
}

impl TreeReader<'_> {
    fn node(&mut self, offset: usize, depth: usize) -> Result<ResourceDirectory> {
        if depth > self.max_depth {
            warn!(
                "resource tree exceeds the depth limit of {} at offset {:#x}",
                self.max_depth, offset
            );
            return Err(Error::ResourceRecursionExceeded(self.max_depth));
        }

        let mut header = self.source.parser(offset, ResourceDirectory::SIZE)?;
        let characteristics = header.read_le::<u32>()?;
        let time_date_stamp = header.read_le::<u32>()?;
        let major_version = header.read_le::<u16>()?;
        let minor_version = header.read_le::<u16>()?;
        let named = header.read_le::<u16>()?;
        let ids = header.read_le::<u16>()?;

        let count = usize::from(named) + usize::from(ids);
        let mut table = self.source.parser(
            offset + ResourceDirectory::SIZE,
            count * ResourceDirectoryEntry::SIZE,
        )?;

        if count > self.remaining {
            warn!(
                "resource tree exceeds the entry limit of {} at offset {:#x}",
                self.max_entries, offset
            );
            return Err(Error::EntryLimitExceeded(self.max_entries));
        }
        self.remaining -= count;

        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let name_or_id = table.read_le::<u32>()?;
            let data_or_subdirectory = table.read_le::<u32>()?;

            let name = if name_or_id & HIGH_BIT != 0 {
                ResourceName::Name(self.string(self.relative(name_or_id & !HIGH_BIT))?)
            } else {
                ResourceName::Id(name_or_id)
            };

            let node = if data_or_subdirectory & HIGH_BIT != 0 {
                let child = self.relative(data_or_subdirectory & !HIGH_BIT);
                ResourceNode::Directory(self.node(child, depth + 1)?)
            } else {
                ResourceNode::Data(self.data_entry(self.relative(data_or_subdirectory))?)
            };

            entries.push(ResourceDirectoryEntry { name, node });
        }

        Ok(ResourceDirectory {
            characteristics,
            time_date_stamp,
            major_version,
            minor_version,
            entries,
        })
    }

    fn relative(&self, offset: u32) -> usize {
        self.base.saturating_add(offset as usize)
    }

    /// A `u16` count of UTF-16 code units followed by the units themselves.
    fn string(&self, offset: usize) -> Result<String> {
        let units = usize::from(self.source.read_u16(offset)?);
        let mut parser = self.source.parser(offset.saturating_add(2), units * 2)?;

        let mut buffer = Vec::with_capacity(units);
        for _ in 0..units {
            buffer.push(parser.read_le::<u16>()?);
        }
        Ok(U16Str::from_slice(&buffer).to_string_lossy())
    }

    fn data_entry(&self, offset: usize) -> Result<ResourceDataEntry> {
        let mut parser = self.source.parser(offset, ResourceDataEntry::SIZE)?;
        Ok(ResourceDataEntry {
            rva: parser.read_le::<u32>()?,
            size: parser.read_le::<u32>()?,
            code_page: parser.read_le::<u32>()?,
        })
    }
}
