//! Checksum manifest for relpack releases.
//!
//! The manifest records the MD5 of every file that survived filtering,
//! nested by directory, so an installation can be checked for integrity.

pub mod checksum;
pub mod document;

pub use checksum::ChecksumEntry;
pub use document::{validate_root_label, ChecksumManifest, DEFAULT_ROOT_LABEL};
