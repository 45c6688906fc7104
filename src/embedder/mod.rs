//! Embedder strategies: map covert bytes onto header bits and send delays.
//!
//! An embedder is the strategy half of a covert channel: given one byte of
//! the covert stream and a position in its mask schedule, it mutates the
//! outbound headers (and/or chooses a pre-send delay); on capture it
//! inverts the mapping. The channel layer owns framing, checksums and the
//! schedule walk; embedders stay stateless.
//!
//! The mask schedule declares how much of a byte each packet in the
//! embedder's cycle carries: `[0xFF]` is one whole byte per packet, eight
//! `0x01` entries spread a byte over eight packets, and so on. Mask entry
//! `k` covers the bits starting at the combined width of entries `0..k`,
//! LSB first.

mod field;
mod timing;

pub use timing::TimingProfile;

use std::time::Duration;

use crate::error::{Error, Result};
use crate::packet::{Ipv4Header, TcpHeader, TransportHeader};

/// Schedule for one whole byte per packet.
const FULL_BYTE: &[u8] = &[0xFF];
/// Schedule for one bit per packet.
const SINGLE_BIT: &[u8] = &[0x01; 8];
/// Schedule for two bits per packet.
const BIT_PAIR: &[u8] = &[0x03; 4];
/// Schedule for four bits per packet.
const NIBBLE: &[u8] = &[0x0F; 2];

/// A covert-byte embedding strategy.
///
/// Closed sum over every supported strategy; variants are selected at
/// runtime by tag (see [`Embedder::from_tag`]) and dispatched by
/// exhaustive match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Embedder {
    /// Low byte of the TCP sequence number, high 24 bits random.
    Sequence,
    /// Low byte of the IPv4 identification field, high byte random.
    Id,
    /// One bit per packet in the TCP URG flag.
    UrgFlg,
    /// Low byte of the TCP urgent pointer; URG set when non-zero.
    UrgPtr,
    /// One bit per packet in the IPv4 ECN codepoint.
    Ecn,
    /// Low byte of the TSval in the TCP timestamp option.
    Timestamp,
    /// One bit per packet as a short or long inter-packet delay.
    Temporal(TimingProfile),
    /// Four bits per packet as one of sixteen delay buckets.
    Frequency(TimingProfile),
    /// Two bits per packet: ECN codepoint plus a temporal bit.
    EcnTemporal(TimingProfile),
}

impl Embedder {
    /// Resolve a runtime tag to its embedder.
    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "sequence" => Ok(Embedder::Sequence),
            "id" => Ok(Embedder::Id),
            "urgflg" => Ok(Embedder::UrgFlg),
            "urgptr" => Ok(Embedder::UrgPtr),
            "ecn" => Ok(Embedder::Ecn),
            "timestamp" => Ok(Embedder::Timestamp),
            "temporal" => Ok(Embedder::Temporal(TimingProfile::temporal())),
            "frequency" => Ok(Embedder::Frequency(TimingProfile::frequency())),
            "ecntemporal" => Ok(Embedder::EcnTemporal(TimingProfile::temporal())),
            other => Err(Error::config(format!("unknown embedder: {}", other))),
        }
    }

    /// The runtime tag of this embedder.
    pub fn tag(&self) -> &'static str {
        match self {
            Embedder::Sequence => "sequence",
            Embedder::Id => "id",
            Embedder::UrgFlg => "urgflg",
            Embedder::UrgPtr => "urgptr",
            Embedder::Ecn => "ecn",
            Embedder::Timestamp => "timestamp",
            Embedder::Temporal(_) => "temporal",
            Embedder::Frequency(_) => "frequency",
            Embedder::EcnTemporal(_) => "ecntemporal",
        }
    }

    /// The mask schedule: per packet position in the cycle, which bits of
    /// the current covert byte that packet carries.
    pub fn mask(&self) -> &'static [u8] {
        match self {
            Embedder::Sequence | Embedder::Id | Embedder::UrgPtr | Embedder::Timestamp => FULL_BYTE,
            Embedder::UrgFlg | Embedder::Ecn | Embedder::Temporal(_) => SINGLE_BIT,
            Embedder::EcnTemporal(_) => BIT_PAIR,
            Embedder::Frequency(_) => NIBBLE,
        }
    }

    /// Whether decoding consumes inter-packet arrival gaps. Such embedders
    /// need one data-free pilot packet per message to establish a time
    /// base.
    pub fn is_timing(&self) -> bool {
        matches!(
            self,
            Embedder::Temporal(_) | Embedder::Frequency(_) | Embedder::EcnTemporal(_)
        )
    }

    /// Whether the strategy mutates TCP-only fields.
    pub fn requires_tcp(&self) -> bool {
        matches!(
            self,
            Embedder::Sequence | Embedder::UrgFlg | Embedder::UrgPtr | Embedder::Timestamp
        )
    }

    /// Embed the bits of `byte` selected by mask entry `mask_index` into
    /// the headers. Returns the delay to apply before emitting this packet
    /// (zero for pure field embedders).
    pub fn set_byte(
        &self,
        ipv4: &mut Ipv4Header,
        transport: &mut TransportHeader,
        byte: u8,
        mask_index: usize,
    ) -> Result<Duration> {
        let k = mask_index % self.mask().len();
        match self {
            Embedder::Sequence => {
                field::set_sequence(require_tcp_mut(transport)?, byte);
                Ok(Duration::ZERO)
            }
            Embedder::Id => {
                field::set_identification(ipv4, byte);
                Ok(Duration::ZERO)
            }
            Embedder::UrgFlg => {
                field::set_urgent_flag(require_tcp_mut(transport)?, bit_of(byte, k));
                Ok(Duration::ZERO)
            }
            Embedder::UrgPtr => {
                field::set_urgent_pointer(require_tcp_mut(transport)?, byte);
                Ok(Duration::ZERO)
            }
            Embedder::Ecn => {
                field::set_ecn_bit(ipv4, bit_of(byte, k));
                Ok(Duration::ZERO)
            }
            Embedder::Timestamp => {
                field::set_timestamp(require_tcp_mut(transport)?, byte);
                Ok(Duration::ZERO)
            }
            Embedder::Temporal(profile) => Ok(profile.delay_for_bit(bit_of(byte, k))),
            Embedder::Frequency(profile) => Ok(profile.delay_for_symbol((byte >> (4 * k)) & 0x0F)),
            Embedder::EcnTemporal(profile) => {
                let bits = (byte >> (2 * k)) & 0b11;
                field::set_ecn_bit(ipv4, bits & 1);
                Ok(profile.delay_for_bit((bits >> 1) & 1))
            }
        }
    }

    /// Extract the bits carried at mask position `mask_index`, already
    /// shifted to their place in the output byte. `gap` is the channel's
    /// measured inter-arrival time and is ignored by field embedders.
    pub fn get_byte(
        &self,
        ipv4: &Ipv4Header,
        transport: &TransportHeader,
        gap: Duration,
        mask_index: usize,
    ) -> Result<u8> {
        let k = mask_index % self.mask().len();
        match self {
            Embedder::Sequence => Ok(field::get_sequence(require_tcp(transport)?)),
            Embedder::Id => Ok(field::get_identification(ipv4)),
            Embedder::UrgFlg => Ok(field::get_urgent_flag(require_tcp(transport)?) << k),
            Embedder::UrgPtr => Ok(field::get_urgent_pointer(require_tcp(transport)?)),
            Embedder::Ecn => Ok(field::get_ecn_bit(ipv4) << k),
            Embedder::Timestamp => field::get_timestamp(require_tcp(transport)?),
            Embedder::Temporal(profile) => Ok(profile.decode_bit(gap) << k),
            Embedder::Frequency(profile) => Ok(profile.decode_symbol(gap) << (4 * k)),
            Embedder::EcnTemporal(profile) => {
                let bits = field::get_ecn_bit(ipv4) | (profile.decode_bit(gap) << 1);
                Ok(bits << (2 * k))
            }
        }
    }
}

/// Bit `k` of `byte`, LSB first.
fn bit_of(byte: u8, k: usize) -> u8 {
    (byte >> k) & 1
}

fn require_tcp(transport: &TransportHeader) -> Result<&TcpHeader> {
    transport
        .as_tcp()
        .ok_or(Error::EmbedderReject("strategy needs a TCP header"))
}

fn require_tcp_mut(transport: &mut TransportHeader) -> Result<&mut TcpHeader> {
    transport
        .as_tcp_mut()
        .ok_or(Error::EmbedderReject("strategy needs a TCP header"))
}

/// Bit offset covered by the schedule entries before `index`.
pub fn mask_shift(mask: &[u8], index: usize) -> u32 {
    mask[..index].iter().map(|m| m.count_ones()).sum()
}
