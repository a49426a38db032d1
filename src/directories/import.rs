//! The import directory.
//!
//! The directory is an array of 20-byte `IMAGE_IMPORT_DESCRIPTOR` records, one per imported
//! module, terminated by a record whose lookup-table and name RVAs are both zero. Each
//! descriptor points at a zero-terminated array of thunks, 4 bytes wide in PE32 images and 8
//! bytes wide in PE32+. A thunk with its top bit set imports by ordinal; otherwise its low 31
//! bits are the RVA of a `u16` hint followed by a NUL-terminated name.
//!
//! The import lookup table is preferred. Images produced by some linkers leave it zero, in
//! which case the import address table (identical on disk before binding) is used instead.
//!
//! Descriptors may share a thunk array. The thunks read across all descriptors are capped at
//! the number of thunks the input could hold, so such sharing cannot make decoding quadratic.

use crate::{
    file::ByteSource, headers::datadir::DataDirectory, resolver::RvaResolver, Error, Result,
};

/// A single imported symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportedFunction {
    /// Imported by name
    ByName {
        /// Index into the export name table of the target, used as a lookup hint
        hint: u16,
        /// Symbol name
        name: String,
    },
    /// Imported by ordinal
    ByOrdinal(u16),
}

impl ImportedFunction {
    /// Returns `true` for ordinal imports.
    #[must_use]
    pub fn is_by_ordinal(&self) -> bool {
        matches!(self, ImportedFunction::ByOrdinal(_))
    }

    /// The symbol name, for by-name imports.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            ImportedFunction::ByName { name, .. } => Some(name),
            ImportedFunction::ByOrdinal(_) => None,
        }
    }

    /// The ordinal, for by-ordinal imports.
    #[must_use]
    pub fn ordinal(&self) -> Option<u16> {
        match self {
            ImportedFunction::ByOrdinal(ordinal) => Some(*ordinal),
            ImportedFunction::ByName { .. } => None,
        }
    }
}

/// One imported module and the functions taken from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedModule {
    /// Module name as written by the linker, empty if its RVA does not resolve
    pub name: String,
    /// Zero until the image is bound
    pub time_date_stamp: u32,
    /// Index of the first forwarder reference, `u32::MAX` when there are none
    pub forwarder_chain: u32,
    /// RVA of the import lookup table
    pub import_lookup_table_rva: u32,
    /// RVA of the import address table
    pub import_address_table_rva: u32,
    /// Imported functions in thunk order
    pub functions: Vec<ImportedFunction>,
}

/// A decoded import directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportDirectory {
    /// Imported modules in descriptor order
    pub modules: Vec<ImportedModule>,
}

impl ImportDirectory {
    /// Size of one import descriptor.
    pub const DESCRIPTOR_SIZE: usize = 20;

    /// Finds a module by name, ignoring ASCII case.
    #[must_use]
    pub fn module(&self, name: &str) -> Option<&ImportedModule> {
        self.modules
            .iter()
            .find(|module| module.name.eq_ignore_ascii_case(name))
    }

    /// Decodes the import directory described by `dir`.
    ///
    /// `is_64_bit` selects the thunk width.
    ///
    /// # Errors
    /// - [`crate::Error::Truncated`] if a descriptor, thunk or hint runs past the end of the
    ///   input
    /// - [`crate::Error::EntryLimitExceeded`] if the descriptors read more thunks in total than
    ///   the input can hold
    pub fn parse(
        source: &ByteSource,
        resolver: &RvaResolver,
        dir: &DataDirectory,
        is_64_bit: bool,
    ) -> Result<Option<ImportDirectory>> {
        let Some(mut offset) = resolver.resolve_offset(dir.virtual_address) else {
            return Ok(None);
        };

        let width = if is_64_bit { 8 } else { 4 };
        let mut budget = ThunkBudget::new(source.len() / width);

        let mut modules = Vec::new();
        loop {
            let mut descriptor = source.parser(offset, Self::DESCRIPTOR_SIZE)?;
            let import_lookup_table_rva = descriptor.read_le::<u32>()?;
            let time_date_stamp = descriptor.read_le::<u32>()?;
            let forwarder_chain = descriptor.read_le::<u32>()?;
            let name_rva = descriptor.read_le::<u32>()?;
            let import_address_table_rva = descriptor.read_le::<u32>()?;

            if import_lookup_table_rva == 0 && name_rva == 0 {
                break;
            }

            let name = resolver
                .resolve_offset(name_rva)
                .map(|at| source.read_cstring(at))
                .unwrap_or_default();

            let thunk_rva = if import_lookup_table_rva != 0 {
                import_lookup_table_rva
            } else {
                import_address_table_rva
            };
            let functions = parse_thunks(source, resolver, thunk_rva, is_64_bit, &mut budget)?;

            modules.push(ImportedModule {
                name,
                time_date_stamp,
                forwarder_chain,
                import_lookup_table_rva,
                import_address_table_rva,
                functions,
            });

            offset += Self::DESCRIPTOR_SIZE;
        }

        Ok(Some(ImportDirectory { modules }))
    }
}

/// Thunk reads left for the whole directory.
struct ThunkBudget {
    limit: usize,
    remaining: usize,
}

impl ThunkBudget {
    fn new(limit: usize) -> Self {
        ThunkBudget {
            limit,
            remaining: limit,
        }
    }

    fn take(&mut self) -> Result<()> {
        if self.remaining == 0 {
            return Err(Error::EntryLimitExceeded(self.limit));
        }
        self.remaining -= 1;
        Ok(())
    }
}

fn parse_thunks(
    source: &ByteSource,
    resolver: &RvaResolver,
    thunk_rva: u32,
    is_64_bit: bool,
    budget: &mut ThunkBudget,
) -> Result<Vec<ImportedFunction>> {
    let mut functions = Vec::new();
    let Some(mut offset) = resolver.resolve_offset(thunk_rva) else {
        return Ok(functions);
    };

    let (width, ordinal_flag) = if is_64_bit {
        (8, 0x8000_0000_0000_0000_u64)
    } else {
        (4, 0x8000_0000_u64)
    };

    loop {
        budget.take()?;
        let thunk = if is_64_bit {
            source.read_u64(offset)?
        } else {
            u64::from(source.read_u32(offset)?)
        };
        if thunk == 0 {
            break;
        }

        if thunk & ordinal_flag != 0 {
            functions.push(ImportedFunction::ByOrdinal((thunk & 0xFFFF) as u16));
        } else if let Some(at) = resolver.resolve_offset((thunk & 0x7FFF_FFFF) as u32) {
            let hint = source.read_u16(at)?;
            let name = source.read_cstring(at + 2);
            functions.push(ImportedFunction::ByName { hint, name });
        }

        offset += width;
    }

    Ok(functions)
}
