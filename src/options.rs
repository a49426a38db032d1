//! Parsing limits applied while decoding an image.
//!
//! [`ParseOptions`] collects the knobs that bound how much work a hostile input can cause.
//! The defaults match the limits of the PE decoding contract: a resource tree may nest at most
//! 10 levels below its root, and inputs are capped just below 2 GiB so that every file offset
//! fits a signed 32-bit integer. The total number of resource entries is capped as well, since
//! nodes may share children and the depth limit alone does not bound the decoded size.
//!
//! # Examples
//!
//! ```rust
//! use pescope::ParseOptions;
//!
//! let options = ParseOptions::default();
//! assert_eq!(options.max_resource_depth, 10);
//!
//! let tight = ParseOptions::default()
//!     .with_max_resource_depth(4)
//!     .with_max_file_size(64 * 1024 * 1024);
//! assert_eq!(tight.max_resource_depth, 4);
//! ```

/// Default nesting limit for the resource directory tree.
pub const DEFAULT_MAX_RESOURCE_DEPTH: usize = 10;

/// Default cap on the total number of resource directory entries.
pub const DEFAULT_MAX_RESOURCE_ENTRIES: usize = 1 << 20;

/// Default input size cap, the largest length representable as an `i32`.
pub const DEFAULT_MAX_FILE_SIZE: u64 = i32::MAX as u64;

/// Limits used when loading and decoding a PE image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Maximum depth of a resource directory node, the root being depth 0.
    ///
    /// A node deeper than this fails the resource accessor with
    /// [`crate::Error::ResourceRecursionExceeded`].
    pub max_resource_depth: usize,

    /// Maximum number of entries decoded across the whole resource tree.
    ///
    /// The effective limit is never larger than the input size divided by the 8-byte entry
    /// size. Reaching it fails the resource accessor with
    /// [`crate::Error::EntryLimitExceeded`].
    pub max_resource_entries: usize,

    /// Inputs longer than this many bytes are rejected with
    /// [`crate::Error::UnsupportedFormat`].
    pub max_file_size: u64,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_resource_depth: DEFAULT_MAX_RESOURCE_DEPTH,
            max_resource_entries: DEFAULT_MAX_RESOURCE_ENTRIES,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl ParseOptions {
    /// Tighter limits for bulk scanning of untrusted inputs.
    ///
    /// Real resource trees are three levels deep (type, name, language), so a depth of 4
    /// still accepts every well-formed image.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            max_resource_depth: 4,
            max_resource_entries: 1 << 16,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }

    /// Returns a copy with a different resource nesting limit.
    #[must_use]
    pub fn with_max_resource_depth(mut self, depth: usize) -> Self {
        self.max_resource_depth = depth;
        self
    }

    /// Returns a copy with a different resource entry cap.
    #[must_use]
    pub fn with_max_resource_entries(mut self, entries: usize) -> Self {
        self.max_resource_entries = entries;
        self
    }

    /// Returns a copy with a different input size cap.
    #[must_use]
    pub fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }
}
