//! Shared-key AEAD processor.

use crate::crypto::{Aead, AeadKey, Nonce, NONCE_SIZE};
use crate::error::{Error, Result};

/// ChaCha20-Poly1305 encryption with a channel-local shared key.
///
/// Each message is sealed under a fresh random nonce carried in front of
/// the ciphertext, so `process` needs no state and messages may be
/// reordered or lost without desynchronising the cipher.
pub struct SymmetricEncryption {
    key: AeadKey,
}

impl SymmetricEncryption {
    /// Create a processor from a shared key.
    pub fn new(key: AeadKey) -> Self {
        Self { key }
    }

    pub(super) fn process(&self, data: &[u8]) -> Result<Vec<u8>> {
        let nonce = Nonce::random();
        let sealed = Aead::new(&self.key).encrypt(&nonce, data, b"")?;

        let mut out = Vec::with_capacity(NONCE_SIZE + sealed.len());
        out.extend_from_slice(nonce.as_bytes());
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    pub(super) fn unprocess(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < NONCE_SIZE {
            return Err(Error::invalid(format!(
                "sealed message shorter than nonce: {} bytes",
                data.len()
            )));
        }
        let (nonce_bytes, sealed) = data.split_at(NONCE_SIZE);
        let nonce = Nonce::from_bytes(nonce_bytes.try_into().expect("12-byte nonce"));
        Aead::new(&self.key).decrypt(&nonce, sealed, b"")
    }
}
