//! Public-key sealed-box processor.

use crate::crypto::{Aead, Identity, MessageSeal, Nonce, PeerKey, PUBLIC_KEY_SIZE};
use crate::error::{Error, Result};

/// X25519 sealed box: encrypt to the peer's public key, decrypt with our
/// own identity.
///
/// `process` draws a [`MessageSeal`] against the peer key and emits
/// `ephemeral_public ‖ ciphertext`. Because the seal's AEAD key is unique
/// per message the nonce can be fixed at zero.
pub struct AsymmetricEncryption {
    local: Identity,
    peer: PeerKey,
}

impl AsymmetricEncryption {
    /// Create a processor from our identity and the peer's public key.
    pub fn new(local: Identity, peer: PeerKey) -> Self {
        Self { local, peer }
    }

    pub(super) fn process(&self, data: &[u8]) -> Result<Vec<u8>> {
        let seal = MessageSeal::to_peer(&self.peer)?;
        let sealed = Aead::new(seal.key()).encrypt(&Nonce::new(0), data, b"")?;

        let mut out = Vec::with_capacity(PUBLIC_KEY_SIZE + sealed.len());
        out.extend_from_slice(seal.header());
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    pub(super) fn unprocess(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < PUBLIC_KEY_SIZE {
            return Err(Error::invalid(format!(
                "sealed message shorter than an X25519 public key: {} bytes",
                data.len()
            )));
        }
        let (header, sealed) = data.split_at(PUBLIC_KEY_SIZE);
        let ephemeral = PeerKey::from_bytes(header.try_into().expect("32-byte public key"));
        let key = self.local.open_key(&ephemeral)?;

        Aead::new(&key).decrypt(&Nonce::new(0), sealed, b"")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_between_peers() {
        // The receiver's identity is what both sides configure: the
        // sender seals to its public half, the receiver opens with it.
        let receiver_identity = Identity::generate();
        let receiver_public = receiver_identity.public();

        let sender = AsymmetricEncryption::new(Identity::generate(), receiver_public);
        let receiver = AsymmetricEncryption::new(receiver_identity, receiver_public);

        for input in [&b""[..], b"A", b"Hello World!"] {
            let sealed = sender.process(input).unwrap();
            assert_eq!(receiver.unprocess(&sealed).unwrap(), input);
        }
    }

    #[test]
    fn test_wrong_recipient_fails() {
        let receiver_identity = Identity::generate();
        let receiver_public = receiver_identity.public();

        let sender = AsymmetricEncryption::new(Identity::generate(), receiver_public);
        let sealed = sender.process(b"secret").unwrap();

        let eavesdropper = AsymmetricEncryption::new(Identity::generate(), receiver_public);
        assert!(eavesdropper.unprocess(&sealed).is_err());
    }

    #[test]
    fn test_short_input_rejected() {
        let identity = Identity::generate();
        let public = identity.public();
        let p = AsymmetricEncryption::new(identity, public);
        assert!(p.unprocess(&[0u8; 16]).is_err());
    }
}
