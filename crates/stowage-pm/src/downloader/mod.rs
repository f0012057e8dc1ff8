//! Package downloading and extraction module.
//!
//! Fetches package archives over HTTP, verifies them against the expected
//! checksum, and unpacks them into a workspace.

mod archive;
mod checksum;
mod file;

pub use archive::{ArchiveExtractor, ArchiveReader, ZipReader};
pub use checksum::{compute_sha1, digest_hex, verify_checksum, ChecksumType};
pub use file::{FileDownloader, FileWriter, FsWriter};
