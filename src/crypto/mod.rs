//! Cryptographic primitives backing the encryption processors.
//!
//! This module provides:
//! - ChaCha20-Poly1305 AEAD encryption
//! - X25519 sealed-box key agreement (identities and per-message seals)
//! - HKDF key derivation
//! - Secure random number generation
//!
//! All secret material is zeroized on drop to prevent memory leakage.

mod aead;
mod kdf;
mod keys;
mod random;

pub use aead::{Aead, AeadKey, Nonce};
pub use kdf::Hkdf;
pub use keys::{Identity, MessageSeal, PeerKey};
pub use random::SecureRandom;

/// Size of symmetric keys in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// Size of AEAD nonce in bytes (96 bits for ChaCha20-Poly1305)
pub const NONCE_SIZE: usize = 12;

/// Size of AEAD authentication tag in bytes (128 bits)
pub const TAG_SIZE: usize = 16;

/// Size of X25519 public keys in bytes
pub const PUBLIC_KEY_SIZE: usize = 32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_then_encrypt_then_open() {
        // The receiver's identity is the only long-lived secret; each
        // message gets its own seal and AEAD key.
        let receiver = Identity::generate();

        let seal = MessageSeal::to_peer(&receiver.public()).unwrap();
        let nonce = Nonce::new(0);
        let sealed = Aead::new(seal.key())
            .encrypt(&nonce, b"covert payload", b"")
            .unwrap();

        let ephemeral = PeerKey::from_bytes(*seal.header());
        let key = receiver.open_key(&ephemeral).unwrap();
        let opened = Aead::new(&key).decrypt(&nonce, &sealed, b"").unwrap();

        assert_eq!(opened, b"covert payload");
    }
}
