//! Invertible byte-stream transforms applied around a channel.
//!
//! A processor pipeline is declared as an ordered list; `process` runs in
//! ascending order before send and `unprocess` in descending order after
//! receive. Every processor satisfies `unprocess(process(b)) == b` for all
//! inputs it admits.

mod asymmetric;
mod caesar;
mod checksum;
mod compress;
mod symmetric;

pub use asymmetric::AsymmetricEncryption;
pub use caesar::Caesar;
pub use checksum::Checksum;
pub use compress::{GzipCompression, ZlibCompression};
pub use symmetric::SymmetricEncryption;

use crate::error::Result;

/// A message processor.
///
/// Closed sum over every supported transform, dispatched by exhaustive
/// match. Instances are immutable for the duration of a session.
pub enum Processor {
    /// Identity transform
    Identity,
    /// Per-byte modular shift
    Caesar(Caesar),
    /// CRC-32 integrity trailer
    Checksum(Checksum),
    /// ChaCha20-Poly1305 with a shared key
    Symmetric(SymmetricEncryption),
    /// X25519 sealed box to a peer public key
    Asymmetric(AsymmetricEncryption),
    /// Gzip compression
    Gzip(GzipCompression),
    /// Zlib compression
    Zlib(ZlibCompression),
}

impl Processor {
    /// The runtime type tag of this processor.
    pub fn tag(&self) -> &'static str {
        match self {
            Processor::Identity => "None",
            Processor::Caesar(_) => "Caesar",
            Processor::Checksum(_) => "Checksum",
            Processor::Symmetric(_) => "SymmetricEncryption",
            Processor::Asymmetric(_) => "AsymmetricEncryption",
            Processor::Gzip(_) => "GZipCompression",
            Processor::Zlib(_) => "ZLibCompression",
        }
    }

    /// Forward transform, applied before send.
    pub fn process(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Processor::Identity => Ok(data.to_vec()),
            Processor::Caesar(p) => Ok(p.process(data)),
            Processor::Checksum(p) => Ok(p.process(data)),
            Processor::Symmetric(p) => p.process(data),
            Processor::Asymmetric(p) => p.process(data),
            Processor::Gzip(p) => p.process(data),
            Processor::Zlib(p) => p.process(data),
        }
    }

    /// Inverse transform, applied after receive.
    pub fn unprocess(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Processor::Identity => Ok(data.to_vec()),
            Processor::Caesar(p) => Ok(p.unprocess(data)),
            Processor::Checksum(p) => p.unprocess(data),
            Processor::Symmetric(p) => p.unprocess(data),
            Processor::Asymmetric(p) => p.unprocess(data),
            Processor::Gzip(p) => p.unprocess(data),
            Processor::Zlib(p) => p.unprocess(data),
        }
    }
}

/// Run `data` through the pipeline in declaration order.
pub fn process_forward(processors: &[Processor], data: &[u8]) -> Result<Vec<u8>> {
    let mut out = data.to_vec();
    for p in processors {
        out = p.process(&out)?;
    }
    Ok(out)
}

/// Invert the pipeline: run `unprocess` in reverse declaration order.
pub fn unprocess_reverse(processors: &[Processor], data: &[u8]) -> Result<Vec<u8>> {
    let mut out = data.to_vec();
    for p in processors.iter().rev() {
        out = p.unprocess(&out)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{AeadKey, Identity};

    fn sample_pipeline() -> Vec<Processor> {
        let identity = Identity::generate();
        let public = identity.public();
        vec![
            Processor::Gzip(GzipCompression::new(6).unwrap()),
            Processor::Caesar(Caesar::new(-7)),
            Processor::Checksum(Checksum::new()),
            Processor::Symmetric(SymmetricEncryption::new(AeadKey::from_bytes([9u8; 32]))),
            Processor::Asymmetric(AsymmetricEncryption::new(identity, public)),
        ]
    }

    #[test]
    fn test_every_processor_roundtrips() {
        let inputs: [&[u8]; 4] = [b"", b"A", b"Hello World!", &[0xFFu8, 0x00, 0x80, 0x7F]];
        for p in sample_pipeline() {
            for input in inputs {
                let out = p.unprocess(&p.process(input).unwrap()).unwrap();
                assert_eq!(out, input, "processor {}", p.tag());
            }
        }
    }

    #[test]
    fn test_pipeline_roundtrip() {
        let pipeline = sample_pipeline();
        let input = b"The quick brown fox jumps over the lazy dog".repeat(8);

        let wire = process_forward(&pipeline, &input).unwrap();
        assert_ne!(wire, input);

        let back = unprocess_reverse(&pipeline, &wire).unwrap();
        assert_eq!(back, input);
    }

    #[test]
    fn test_caesar_pair_without_inverse_nets_plus_two() {
        // Two Caesar stages (-1 then +3) applied on send with no receive
        // side inversion shift every byte by +2.
        let pipeline = vec![
            Processor::Caesar(Caesar::new(-1)),
            Processor::Caesar(Caesar::new(3)),
        ];
        let out = process_forward(&pipeline, b"Hello World!").unwrap();
        assert_eq!(out, b"Jgnnq\"Yqtnf#");
    }

    #[test]
    fn test_empty_pipeline_is_identity() {
        let out = process_forward(&[], b"payload").unwrap();
        assert_eq!(out, b"payload");
        let out = unprocess_reverse(&[], b"payload").unwrap();
        assert_eq!(out, b"payload");
    }
}
