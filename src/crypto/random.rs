//! Secure random number generation.
//!
//! Provides cryptographically secure random bytes using the operating
//! system's entropy source.

use rand::{CryptoRng, RngCore};
use rand_core::OsRng;

/// Cryptographically secure random number generator.
///
/// Wraps the OS-provided entropy source (e.g., /dev/urandom on Unix).
/// Embedders also use this to fill the non-covert bits of mutated header
/// fields so that carried values stay plausible.
pub struct SecureRandom;

impl SecureRandom {
    /// Fill a buffer with cryptographically secure random bytes.
    pub fn fill(dest: &mut [u8]) {
        OsRng.fill_bytes(dest);
    }

    /// Generate a fixed-size array of random bytes.
    pub fn bytes<const N: usize>() -> [u8; N] {
        let mut buf = [0u8; N];
        OsRng.fill_bytes(&mut buf);
        buf
    }

    /// Generate a random u64.
    pub fn u64() -> u64 {
        OsRng.next_u64()
    }

    /// Generate a random u32.
    pub fn u32() -> u32 {
        OsRng.next_u32()
    }

    /// Generate a random u16.
    pub fn u16() -> u16 {
        (OsRng.next_u32() & 0xFFFF) as u16
    }

    /// Get an RNG instance that implements CryptoRng.
    pub fn rng() -> impl RngCore + CryptoRng {
        OsRng
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_changes_buffer() {
        let mut buf = [0u8; 64];
        SecureRandom::fill(&mut buf);
        // 64 zero bytes from the OS RNG would be a miracle
        assert_ne!(buf, [0u8; 64]);
    }

    #[test]
    fn test_fixed_arrays_differ() {
        let a: [u8; 32] = SecureRandom::bytes();
        let b: [u8; 32] = SecureRandom::bytes();
        assert_ne!(a, b);
    }
}
