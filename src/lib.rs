// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # pescope
//!
//! A fast, read-only decoder for Windows Portable Executable (PE) images, written in pure Rust.
//! `pescope` validates and decodes the DOS, COFF and Optional headers and the section table,
//! translates RVAs into file offsets, and lazily decodes the export, import, resource, base
//! relocation and debug directories.
//!
//! ## Features
//!
//! - **Bounded reads** - every access is checked against the input length, hostile counts fail
//!   fast instead of driving long loops
//! - **Memory-mapped input** - files are mapped, buffers and streams are owned in memory
//! - **Lazy directories** - each directory is decoded on first access and memoized
//! - **PE32 and PE32+** - one [`OptionalHeader`] type tagged by its [`PeMagic`]
//! - **Thread safe** - [`PeImage`] is `Send + Sync`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pescope::prelude::*;
//!
//! let image = PeImage::from_file("app.exe")?;
//! println!("machine: {:?}", image.coff_header().machine);
//!
//! for section in image.sections() {
//!     println!(
//!         "{:8} {:#010x} {:#x}",
//!         section.name, section.virtual_address, section.virtual_size
//!     );
//! }
//!
//! if let Some(debug) = image.debug() {
//!     for entry in &debug.entries {
//!         println!("debug entry: {:?}", entry.kind);
//!     }
//! }
//! # Ok::<(), pescope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`file`] - bounded, backend-agnostic access to the raw bytes
//! - [`headers`] - DOS, COFF, Optional and section headers, decoded eagerly
//! - [`resolver`] - RVA to file offset translation through the section table
//! - [`directories`] - independent decoders for the data directories
//! - [`options`] - decoding limits
//! - [`prelude`] - re-exports of the commonly used types
//! - [`Error`] and [`Result`] - error handling
//!
//! ## Error Handling
//!
//! Header-phase errors are fatal and no [`PeImage`] is produced. Directory-phase truncation is
//! reported as an absent directory. Only [`PeImage::resources`] can fail after construction,
//! with [`Error::ResourceRecursionExceeded`] or [`Error::EntryLimitExceeded`].

#[macro_use]
pub(crate) mod error;

pub mod directories;
pub mod file;
pub mod headers;
mod image;
pub mod options;
pub mod prelude;
pub mod resolver;

#[cfg(test)]
pub(crate) mod test;

/// `pescope` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `pescope` Error type
///
/// The main error type for all operations in this crate.
pub use error::Error;

/// The decoded PE image, the main entry point of this crate.
pub use image::PeImage;

/// Bounded access to the raw bytes of an input.
pub use file::{parser::Parser, ByteSource};

/// Decoding limits.
pub use options::ParseOptions;

/// RVA to file offset translation.
pub use resolver::RvaResolver;

pub use headers::{
    coff::{CoffHeader, FileCharacteristics, MachineType},
    datadir::{DataDirectory, DataDirectoryType},
    dos::DosHeader,
    optional::{DllCharacteristics, OptionalHeader, PeMagic, Subsystem},
    section::{SectionCharacteristics, SectionHeader},
    Headers,
};

pub use directories::{
    debug::{DebugDirectory, DebugDirectoryEntry, DebugType},
    export::{ExportDirectory, ExportedFunction},
    import::{ImportDirectory, ImportedFunction, ImportedModule},
    reloc::{BaseRelocation, BaseRelocationBlock, BaseRelocationEntry, BaseRelocationType},
    resource::{
        ResourceDataEntry, ResourceDirectory, ResourceDirectoryEntry, ResourceName, ResourceNode,
    },
};
