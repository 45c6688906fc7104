//! Deflate-family compression processors.

use std::io::{Read, Write};

use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;

use crate::error::{Error, Result};

/// Upper bound on decompressed output, guarding against deflate bombs.
const MAX_DECOMPRESSED: u64 = 16 * 1024 * 1024;

fn validate_level(level: u32) -> Result<Compression> {
    if level > 9 {
        return Err(Error::config(format!(
            "compression level {} out of range 0-9",
            level
        )));
    }
    Ok(Compression::new(level))
}

fn bounded_read(reader: impl Read) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    reader.take(MAX_DECOMPRESSED + 1).read_to_end(&mut out)?;
    if out.len() as u64 > MAX_DECOMPRESSED {
        return Err(Error::invalid("decompressed message exceeds 16 MiB cap"));
    }
    Ok(out)
}

/// Gzip compression at a configurable quality level.
pub struct GzipCompression {
    level: Compression,
}

impl GzipCompression {
    /// Create a processor with a quality level of 0-9.
    pub fn new(level: u32) -> Result<Self> {
        Ok(Self {
            level: validate_level(level)?,
        })
    }

    pub(super) fn process(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), self.level);
        encoder.write_all(data)?;
        Ok(encoder.finish()?)
    }

    pub(super) fn unprocess(&self, data: &[u8]) -> Result<Vec<u8>> {
        bounded_read(GzDecoder::new(data))
    }
}

/// Zlib compression at a configurable quality level.
pub struct ZlibCompression {
    level: Compression,
}

impl ZlibCompression {
    /// Create a processor with a quality level of 0-9.
    pub fn new(level: u32) -> Result<Self> {
        Ok(Self {
            level: validate_level(level)?,
        })
    }

    pub(super) fn process(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), self.level);
        encoder.write_all(data)?;
        Ok(encoder.finish()?)
    }

    pub(super) fn unprocess(&self, data: &[u8]) -> Result<Vec<u8>> {
        bounded_read(ZlibDecoder::new(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gzip_roundtrip() {
        let p = GzipCompression::new(6).unwrap();
        for input in [&b""[..], b"A", &b"compress me ".repeat(100)] {
            assert_eq!(p.unprocess(&p.process(input).unwrap()).unwrap(), input);
        }
    }

    #[test]
    fn test_zlib_roundtrip() {
        let p = ZlibCompression::new(9).unwrap();
        let input = b"zzzzzzzzzzzzzzzzzzzzzzzz".repeat(50);
        let compressed = p.process(&input).unwrap();
        assert!(compressed.len() < input.len());
        assert_eq!(p.unprocess(&compressed).unwrap(), input);
    }

    #[test]
    fn test_level_validation() {
        assert!(GzipCompression::new(10).is_err());
        assert!(ZlibCompression::new(10).is_err());
        assert!(GzipCompression::new(0).is_ok());
    }

    #[test]
    fn test_garbage_input_rejected() {
        let p = ZlibCompression::new(6).unwrap();
        assert!(p.unprocess(b"not a zlib stream").is_err());
    }
}
