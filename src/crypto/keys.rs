//! X25519 key material for the sealed-box processor.
//!
//! The asymmetric processor seals every message to the receiving peer's
//! public key: a fresh ephemeral keypair per message, an X25519 exchange
//! against the peer key, and HKDF-SHA256 to turn the shared secret into a
//! one-shot AEAD key. The ephemeral public key travels in front of the
//! ciphertext so the receiver can rerun the agreement; nothing long-lived
//! is ever transmitted.

use x25519_dalek::{
    EphemeralSecret as DalekEphemeral, PublicKey as DalekPublic, StaticSecret as DalekStatic,
};
use zeroize::ZeroizeOnDrop;

use crate::crypto::{AeadKey, Hkdf, PUBLIC_KEY_SIZE};
use crate::error::Result;

/// HKDF context separating sealed-box keys from other derivations.
const SEAL_INFO: &[u8] = b"covertkit_seal_v1";

/// A channel endpoint's long-term X25519 keypair.
///
/// The secret half opens messages sealed to this endpoint; the public
/// half is what the peer configures as its [`PeerKey`]. Zeroized on drop.
#[derive(Clone, ZeroizeOnDrop)]
pub struct Identity {
    secret: DalekStatic,
}

impl Identity {
    /// Generate a fresh identity.
    pub fn generate() -> Self {
        Self {
            secret: DalekStatic::random_from_rng(rand::thread_rng()),
        }
    }

    /// Rebuild an identity from stored secret bytes.
    ///
    /// # Security
    ///
    /// The input must come from a previous [`Identity::to_bytes`] or an
    /// equally trustworthy source.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self {
            secret: DalekStatic::from(bytes),
        }
    }

    /// Export the secret bytes for storage in the channel config.
    ///
    /// # Security
    ///
    /// Handle the returned bytes with care and zeroize when done.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }

    /// The public half, for handing to the peer.
    pub fn public(&self) -> PeerKey {
        PeerKey(DalekPublic::from(&self.secret))
    }

    /// Derive the AEAD key that opens a message sealed to this identity
    /// under the given ephemeral public key.
    pub fn open_key(&self, ephemeral: &PeerKey) -> Result<AeadKey> {
        let shared = self.secret.diffie_hellman(&ephemeral.0);
        Hkdf::new(None, shared.as_bytes()).derive_aead_key(SEAL_INFO)
    }
}

/// An X25519 public key as configured for, or captured from, the wire.
///
/// Doubles as the peer's configured long-term key and as the per-message
/// ephemeral key read off the front of a sealed message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeerKey(DalekPublic);

impl PeerKey {
    /// Decode a key from its 32 raw bytes.
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(DalekPublic::from(bytes))
    }

    /// The raw key bytes, as framed in front of sealed messages.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        self.0.as_bytes()
    }
}

/// One-shot sealing state for a single outbound message.
///
/// Holds the derived AEAD key and the ephemeral public header the
/// receiver needs to rerun the agreement. Consumed per message; the
/// ephemeral secret itself never leaves [`MessageSeal::to_peer`].
pub struct MessageSeal {
    header: [u8; PUBLIC_KEY_SIZE],
    key: AeadKey,
}

impl MessageSeal {
    /// Run the sender side of the agreement against the peer's long-term
    /// key: fresh ephemeral keypair, X25519, HKDF.
    pub fn to_peer(peer: &PeerKey) -> Result<Self> {
        let ephemeral = DalekEphemeral::random_from_rng(rand::thread_rng());
        let header = DalekPublic::from(&ephemeral).to_bytes();
        let shared = ephemeral.diffie_hellman(&peer.0);
        let key = Hkdf::new(None, shared.as_bytes()).derive_aead_key(SEAL_INFO)?;
        Ok(Self { header, key })
    }

    /// The ephemeral public bytes to prepend to the ciphertext.
    pub fn header(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.header
    }

    /// The one-shot AEAD key for this message.
    pub fn key(&self) -> &AeadKey {
        &self.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_and_open_agree() {
        let receiver = Identity::generate();

        let seal = MessageSeal::to_peer(&receiver.public()).unwrap();
        let opened = receiver
            .open_key(&PeerKey::from_bytes(*seal.header()))
            .unwrap();

        assert_eq!(seal.key(), &opened);
    }

    #[test]
    fn test_seals_are_one_shot() {
        let receiver = Identity::generate();

        let first = MessageSeal::to_peer(&receiver.public()).unwrap();
        let second = MessageSeal::to_peer(&receiver.public()).unwrap();

        // Fresh ephemeral per message: headers and keys both differ.
        assert_ne!(first.header(), second.header());
        assert_ne!(first.key(), second.key());
    }

    #[test]
    fn test_wrong_identity_derives_wrong_key() {
        let receiver = Identity::generate();
        let eavesdropper = Identity::generate();

        let seal = MessageSeal::to_peer(&receiver.public()).unwrap();
        let ephemeral = PeerKey::from_bytes(*seal.header());

        assert_ne!(
            seal.key(),
            &eavesdropper.open_key(&ephemeral).unwrap()
        );
    }

    #[test]
    fn test_identity_survives_config_roundtrip() {
        let original = Identity::generate();
        let restored = Identity::from_bytes(original.to_bytes());

        assert_eq!(original.public(), restored.public());
    }
}
