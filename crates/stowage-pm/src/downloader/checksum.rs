//! Checksum verification for downloaded files.

use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::fs;
use std::io;
use std::path::Path;

/// Supported checksum types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumType {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl ChecksumType {
    /// Detect checksum type from length of hex string
    pub fn from_hex_length(len: usize) -> Option<Self> {
        match len {
            40 => Some(ChecksumType::Sha1),
            64 => Some(ChecksumType::Sha256),
            96 => Some(ChecksumType::Sha384),
            128 => Some(ChecksumType::Sha512),
            _ => None,
        }
    }
}

/// Hex digest of `bytes`
pub fn digest_hex(bytes: &[u8], checksum_type: ChecksumType) -> String {
    match checksum_type {
        ChecksumType::Sha1 => format!("{:x}", Sha1::digest(bytes)),
        ChecksumType::Sha256 => format!("{:x}", Sha256::digest(bytes)),
        ChecksumType::Sha384 => format!("{:x}", Sha384::digest(bytes)),
        ChecksumType::Sha512 => format!("{:x}", Sha512::digest(bytes)),
    }
}

/// Check `bytes` against an expected hex digest.
///
/// The algorithm follows the digest length; an expected value of any other
/// length never verifies.
pub fn verify_checksum(bytes: &[u8], expected: &str) -> bool {
    let expected = expected.trim();

    match ChecksumType::from_hex_length(expected.len()) {
        Some(checksum_type) => digest_hex(bytes, checksum_type).eq_ignore_ascii_case(expected),
        None => false,
    }
}

/// Compute SHA-1 checksum of a file
pub fn compute_sha1(path: &Path) -> io::Result<String> {
    let buffer = fs::read(path)?;
    Ok(digest_hex(&buffer, ChecksumType::Sha1))
}
