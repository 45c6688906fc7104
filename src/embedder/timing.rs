//! Delay encoding for the timing embedders.
//!
//! A timing embedder does not touch the packet at all; the covert bits
//! live in how long the sender waits before emitting it. The receiver
//! quantises measured inter-arrival gaps back into symbols. Bucket widths
//! are coarse enough that loopback and LAN jitter, including a missed
//! scheduler tick, stay inside one bucket.

use std::time::Duration;

/// Number of delay buckets used by the `frequency` embedder (one nibble).
pub const FREQUENCY_SYMBOLS: u8 = 16;

/// Delay parameters for a timing embedder.
///
/// A transmitted symbol `s` becomes a pre-send delay of `base + s * step`;
/// decoding rounds the observed gap to the nearest bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingProfile {
    /// Delay encoding symbol zero
    pub base: Duration,
    /// Spacing between adjacent symbols
    pub step: Duration,
}

impl TimingProfile {
    /// Binary profile for `temporal` and `ecntemporal`: 6 ms vs 30 ms.
    pub fn temporal() -> Self {
        Self {
            base: Duration::from_millis(6),
            step: Duration::from_millis(24),
        }
    }

    /// Sixteen-symbol profile for `frequency`: 4 ms base, 8 ms buckets.
    pub fn frequency() -> Self {
        Self {
            base: Duration::from_millis(4),
            step: Duration::from_millis(8),
        }
    }

    /// Delay carrying a single bit.
    pub fn delay_for_bit(&self, bit: u8) -> Duration {
        if bit != 0 {
            self.base + self.step
        } else {
            self.base
        }
    }

    /// Decode a gap back into a bit: anything past the midpoint is a one.
    pub fn decode_bit(&self, gap: Duration) -> u8 {
        u8::from(gap >= self.base + self.step / 2)
    }

    /// Delay carrying one symbol of the frequency alphabet.
    pub fn delay_for_symbol(&self, symbol: u8) -> Duration {
        self.base + self.step * u32::from(symbol)
    }

    /// Decode a gap into the nearest frequency symbol, clamped to the
    /// alphabet.
    pub fn decode_symbol(&self, gap: Duration) -> u8 {
        let gap_us = gap.as_micros();
        let base_us = self.base.as_micros();
        let step_us = self.step.as_micros().max(1);
        if gap_us <= base_us {
            return 0;
        }
        let symbol = (gap_us - base_us + step_us / 2) / step_us;
        symbol.min(u128::from(FREQUENCY_SYMBOLS - 1)) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_roundtrip() {
        let p = TimingProfile::temporal();
        assert_eq!(p.decode_bit(p.delay_for_bit(0)), 0);
        assert_eq!(p.decode_bit(p.delay_for_bit(1)), 1);
    }

    #[test]
    fn test_bit_roundtrip_with_jitter() {
        let p = TimingProfile::temporal();
        let jitter = Duration::from_millis(4);
        assert_eq!(p.decode_bit(p.delay_for_bit(0) + jitter), 0);
        assert_eq!(p.decode_bit(p.delay_for_bit(1) - jitter), 1);
        // Scheduler overshoot on a one-bit must not wrap to zero
        assert_eq!(p.decode_bit(p.delay_for_bit(1) + jitter), 1);
    }

    #[test]
    fn test_symbol_roundtrip() {
        let p = TimingProfile::frequency();
        for symbol in 0..FREQUENCY_SYMBOLS {
            assert_eq!(p.decode_symbol(p.delay_for_symbol(symbol)), symbol);
        }
    }

    #[test]
    fn test_symbol_roundtrip_with_jitter() {
        let p = TimingProfile::frequency();
        let jitter = Duration::from_millis(3);
        for symbol in 0..FREQUENCY_SYMBOLS {
            let nominal = p.delay_for_symbol(symbol);
            assert_eq!(p.decode_symbol(nominal + jitter), symbol);
            if symbol > 0 {
                assert_eq!(p.decode_symbol(nominal - jitter), symbol);
            }
        }
    }

    #[test]
    fn test_symbol_decode_clamps() {
        let p = TimingProfile::frequency();
        assert_eq!(p.decode_symbol(Duration::ZERO), 0);
        assert_eq!(
            p.decode_symbol(Duration::from_secs(10)),
            FREQUENCY_SYMBOLS - 1
        );
    }
}
