//! The export directory (`IMAGE_EXPORT_DIRECTORY`).
//!
//! An export directory is a 40-byte header followed by three tables, each located by RVA:
//!
//! - the **address table**, one RVA per exported function, indexed by `ordinal - base`
//! - the **name pointer table**, one RVA per named export
//! - the **ordinal table**, a `u16` address-table index for each entry of the name table
//!
//! An address that points back inside the export directory's own range is not code but a
//! NUL-terminated forwarder string such as `NTDLL.RtlAllocateHeap`.

use std::collections::HashMap;

use crate::{
    directories::table,
    file::ByteSource,
    headers::datadir::DataDirectory,
    resolver::RvaResolver,
    Result,
};

/// One entry of the export address table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFunction {
    /// Address-table index plus the ordinal base
    pub ordinal: u32,
    /// RVA of the export; for forwarders, the RVA of the forwarder string
    pub address: u32,
    /// Exported name, if the name table references this entry
    pub name: Option<String>,
    /// Target of a forwarded export
    pub forwarder: Option<String>,
}

impl ExportedFunction {
    /// Returns `true` if this export redirects to another module.
    #[must_use]
    pub fn is_forwarder(&self) -> bool {
        self.forwarder.is_some()
    }
}

/// A decoded export directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDirectory {
    /// Reserved, zero
    pub characteristics: u32,
    /// Creation time of the export data
    pub time_date_stamp: u32,
    /// Major version
    pub major_version: u16,
    /// Minor version
    pub minor_version: u16,
    /// Name of the DLL, empty if its RVA does not resolve
    pub name: String,
    /// Ordinal of the first address-table entry
    pub ordinal_base: u32,
    /// Exported functions in address-table order, empty slots omitted
    pub functions: Vec<ExportedFunction>,
}

impl ExportDirectory {
    /// Size of the directory header.
    pub const SIZE: usize = 40;

    /// Looks up an export by exact name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&ExportedFunction> {
        self.functions
            .iter()
            .find(|function| function.name.as_deref() == Some(name))
    }

    /// Looks up an export by ordinal.
    #[must_use]
    pub fn by_ordinal(&self, ordinal: u32) -> Option<&ExportedFunction> {
        self.functions
            .iter()
            .find(|function| function.ordinal == ordinal)
    }

    /// Decodes the export directory described by `dir`.
    ///
    /// Returns `Ok(None)` if the directory or its address table cannot be resolved.
    ///
    /// # Errors
    /// Returns [`crate::Error::Truncated`] if a table runs past the end of the input.
    pub fn parse(
        source: &ByteSource,
        resolver: &RvaResolver,
        dir: &DataDirectory,
    ) -> Result<Option<ExportDirectory>> {
        let Some(offset) = resolver.resolve_offset(dir.virtual_address) else {
            return Ok(None);
        };

        let mut header = source.parser(offset, Self::SIZE)?;
        let characteristics = header.read_le::<u32>()?;
        let time_date_stamp = header.read_le::<u32>()?;
        let major_version = header.read_le::<u16>()?;
        let minor_version = header.read_le::<u16>()?;
        let name_rva = header.read_le::<u32>()?;
        let ordinal_base = header.read_le::<u32>()?;
        let number_of_functions = header.read_le::<u32>()?;
        let number_of_names = header.read_le::<u32>()?;
        let address_of_functions = header.read_le::<u32>()?;
        let address_of_names = header.read_le::<u32>()?;
        let address_of_name_ordinals = header.read_le::<u32>()?;

        let name = resolver
            .resolve_offset(name_rva)
            .map(|at| source.read_cstring(at))
            .unwrap_or_default();

        let Some(functions_offset) = resolver.resolve_offset(address_of_functions) else {
            return Ok(None);
        };

        let mut names_by_index = HashMap::new();
        if let (Some(names_offset), Some(ordinals_offset)) = (
            resolver.resolve_offset(address_of_names),
            resolver.resolve_offset(address_of_name_ordinals),
        ) {
            let mut names = table(source, names_offset, number_of_names, 4)?;
            let mut ordinals = table(source, ordinals_offset, number_of_names, 2)?;
            for _ in 0..number_of_names {
                let name_rva = names.read_le::<u32>()?;
                let index = ordinals.read_le::<u16>()?;
                if let Some(at) = resolver.resolve_offset(name_rva) {
                    names_by_index.insert(u32::from(index), source.read_cstring(at));
                }
            }
        }

        let mut addresses = table(source, functions_offset, number_of_functions, 4)?;
        let mut functions = Vec::new();
        for index in 0..number_of_functions {
            let address = addresses.read_le::<u32>()?;
            if address == 0 {
                continue;
            }

            let forwarder = if dir.contains_rva(address) {
                resolver
                    .resolve_offset(address)
                    .map(|at| source.read_cstring(at))
            } else {
                None
            };

            functions.push(ExportedFunction {
                ordinal: index.wrapping_add(ordinal_base),
                address,
                name: names_by_index.remove(&index),
                forwarder,
            });
        }

        Ok(Some(ExportDirectory {
            characteristics,
            time_date_stamp,
            major_version,
            minor_version,
            name,
            ordinal_base,
            functions,
        }))
    }
}
