use thiserror::Error;

macro_rules! truncated_error {
    ($offset:expr, $length:expr, $size:expr) => {
        crate::Error::Truncated {
            offset: $offset,
            length: $length,
            size: $size,
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Errors fall into two phases. Header-phase errors ([`Error::InvalidSignature`],
/// [`Error::Truncated`] while reading headers, [`Error::UnsupportedFormat`]) are fatal and no
/// [`crate::PeImage`] is produced. Directory-phase [`Error::Truncated`] errors are absorbed by
/// the image and reported as an absent directory instead.
///
/// # Error Categories
///
/// ## Structural Errors
/// - [`Error::InvalidSignature`] - DOS or PE magic mismatch
/// - [`Error::Truncated`] - Not enough bytes for a required fixed-size read
/// - [`Error::UnsupportedFormat`] - Unknown optional header magic or oversized input
/// - [`Error::ResourceRecursionExceeded`] - Resource tree nested deeper than allowed
/// - [`Error::EntryLimitExceeded`] - A directory decodes into more entries than allowed
///
/// ## Lookup Errors
/// - [`Error::NotFound`] - A named section or an input path does not exist
/// - [`Error::OutOfRange`] - A section index is past the end of the section table
///
/// ## I/O Errors
/// - [`Error::FileError`] - Filesystem I/O errors
///
/// # Examples
///
/// ```rust,no_run
/// use pescope::{Error, PeImage};
///
/// match PeImage::from_file("kernel32.dll") {
///     Ok(image) => println!("64-bit: {}", image.is_64_bit()),
///     Err(Error::InvalidSignature { found, .. }) => eprintln!("Not a PE file: {found:#x}"),
///     Err(Error::Truncated { offset, .. }) => eprintln!("Truncated at {offset:#x}"),
///     Err(e) => eprintln!("Other error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// A magic value did not match its required constant.
    ///
    /// Raised for the DOS `MZ` magic at offset 0 and for the `PE\0\0` signature at
    /// `e_lfanew`. Both values are reported as zero-extended `u32`.
    #[error("Invalid signature - expected {expected:#x}, found {found:#x}")]
    InvalidSignature {
        /// The constant that was required
        expected: u32,
        /// The value present in the input
        found: u32,
    },

    /// A fixed-size read ran past the end of the input.
    #[error("Truncated - cannot read {length} bytes at offset {offset:#x}, input is {size} bytes")]
    Truncated {
        /// Start of the attempted read
        offset: usize,
        /// Number of bytes requested
        length: usize,
        /// Total size of the input
        size: usize,
    },

    /// The input is not a format this library decodes.
    ///
    /// Covers optional header magics other than PE32/PE32+ and inputs larger than the
    /// configured size cap.
    #[error("Unsupported format - {0}")]
    UnsupportedFormat(String),

    /// The resource directory tree is nested deeper than the configured limit.
    ///
    /// The associated value is the limit that was exceeded.
    #[error("Resource directory nesting exceeds the maximum depth of {0}")]
    ResourceRecursionExceeded(usize),

    /// A directory decodes into more entries than its input can hold.
    ///
    /// Directory records may share children, so a small input can describe a very large
    /// decoded structure. The associated value is the entry limit that was reached. Surfaced
    /// by [`crate::PeImage::resources`]; an import directory that hits it is reported absent.
    #[error("Entry limit exceeded - more than {0} entries decoded")]
    EntryLimitExceeded(usize),

    /// A section or input path could not be found.
    #[error("Not found - {0}")]
    NotFound(String),

    /// A section index is past the end of the section table.
    #[error("Index {index} is out of range, {count} entries available")]
    OutOfRange {
        /// The requested index
        index: usize,
        /// The number of valid entries
        count: usize,
    },

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` if this error is a truncation, the only kind absorbed by directory
    /// accessors.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        matches!(self, Error::Truncated { .. })
    }
}
