//! Shared functionality which is used in unit tests.
//!
//! [`builder::PeBuilder`] synthesizes small PE32 and PE32+ images, so tests never depend on
//! sample binaries checked into the repository.
