//! CRC-32 integrity trailer processor.

use crate::error::{Error, Result};

/// Trailer length in bytes.
const DIGEST_LEN: usize = 4;

/// Appends a CRC-32 digest on `process`; verifies and strips it on
/// `unprocess`, failing with [`Error::ChecksumMismatch`] on corruption.
#[derive(Default)]
pub struct Checksum;

impl Checksum {
    /// Create a checksum processor.
    pub fn new() -> Self {
        Self
    }

    pub(super) fn process(&self, data: &[u8]) -> Vec<u8> {
        let digest = crc32fast::hash(data);
        let mut out = Vec::with_capacity(data.len() + DIGEST_LEN);
        out.extend_from_slice(data);
        out.extend_from_slice(&digest.to_le_bytes());
        out
    }

    pub(super) fn unprocess(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < DIGEST_LEN {
            return Err(Error::ChecksumMismatch);
        }
        let (body, trailer) = data.split_at(data.len() - DIGEST_LEN);
        let expected = u32::from_le_bytes(trailer.try_into().expect("4-byte trailer"));
        if crc32fast::hash(body) != expected {
            return Err(Error::ChecksumMismatch);
        }
        Ok(body.to_vec())
    }
}
