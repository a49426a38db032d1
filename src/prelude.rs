//! # pescope Prelude
//!
//! Re-exports the types most code needs to decode and inspect a PE image.
//!
//! ```rust,no_run
//! use pescope::prelude::*;
//!
//! let image = PeImage::from_file("app.dll")?;
//! if let Some(exports) = image.exports() {
//!     println!("{} exports", exports.functions.len());
//! }
//! # Ok::<(), Error>(())
//! ```

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

pub use crate::{Error, ParseOptions, PeImage, Result};

/// Low-level byte access
pub use crate::{ByteSource, Parser, RvaResolver};

// ================================================================================================
// Headers
// ================================================================================================

pub use crate::{
    CoffHeader, DataDirectory, DataDirectoryType, DosHeader, FileCharacteristics, MachineType,
    OptionalHeader, PeMagic, SectionCharacteristics, SectionHeader,
};

// ================================================================================================
// Data Directories
// ================================================================================================

pub use crate::{
    BaseRelocation, BaseRelocationType, DebugDirectory, DebugType, ExportDirectory,
    ExportedFunction, ImportDirectory, ImportedFunction, ImportedModule, ResourceDirectory,
    ResourceDirectoryEntry, ResourceName, ResourceNode,
};
