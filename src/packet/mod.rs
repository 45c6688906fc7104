//! Packet model: header structs and wire encoding.
//!
//! Embedders mutate plain [`Ipv4Header`]/[`TransportHeader`] structs rather
//! than raw byte views, which keeps them pure and trivially testable. The
//! channel layer turns a [`PacketSpec`] into wire bytes (recomputing both
//! checksums) just before transmission, and parses captured bytes back.

use std::net::Ipv4Addr;

use pnet::packet::icmp::{self, echo_request::MutableEchoRequestPacket, IcmpPacket, IcmpTypes};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::{self, Ipv4Packet, MutableIpv4Packet};
use pnet::packet::tcp::{self, MutableTcpPacket, TcpOption, TcpOptionNumbers, TcpPacket};
use pnet::packet::udp::{self, MutableUdpPacket, UdpPacket};
use pnet::packet::Packet;

use crate::error::{Error, Result};

/// IPv4 header length in bytes (no options).
pub const IPV4_HEADER_LEN: usize = 20;

/// TCP header length in bytes (no options).
pub const TCP_HEADER_LEN: usize = 20;

/// UDP header length in bytes.
pub const UDP_HEADER_LEN: usize = 8;

/// ICMP echo header length in bytes.
pub const ICMP_HEADER_LEN: usize = 8;

/// TCP flag bits, as used by the channel state machines.
pub mod tcp_flags {
    /// Synchronise sequence numbers
    pub const SYN: u16 = 0b0000_0000_0010;
    /// Acknowledgement field significant
    pub const ACK: u16 = 0b0000_0001_0000;
    /// Reset the connection
    pub const RST: u16 = 0b0000_0000_0100;
    /// No more data from sender
    pub const FIN: u16 = 0b0000_0000_0001;
    /// Push function
    pub const PSH: u16 = 0b0000_0000_1000;
    /// Urgent pointer field significant
    pub const URG: u16 = 0b0000_0010_0000;
}

/// The mutable IPv4 fields the toolkit cares about.
///
/// Version, IHL, fragmentation and checksum are fixed or recomputed at
/// encode time and deliberately not represented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Header {
    /// Identification field (embedding target of the `id` embedder)
    pub identification: u16,
    /// ECN codepoint, low two bits of the TOS byte
    pub ecn: u8,
    /// Time to live
    pub ttl: u8,
    /// Source address
    pub source: Ipv4Addr,
    /// Destination address
    pub destination: Ipv4Addr,
}

impl Ipv4Header {
    /// A fresh header between the given endpoints with a random ID.
    pub fn between(source: Ipv4Addr, destination: Ipv4Addr) -> Self {
        Self {
            identification: crate::crypto::SecureRandom::u16(),
            ecn: 0,
            ttl: 64,
            source,
            destination,
        }
    }
}

/// TCP timestamp option (kind 8) contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpTimestamp {
    /// TSval
    pub value: u32,
    /// TSecr
    pub echo: u32,
}

/// The mutable TCP fields the toolkit cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpHeader {
    /// Source port
    pub source: u16,
    /// Destination port
    pub destination: u16,
    /// Sequence number (embedding target of the `sequence` embedder)
    pub sequence: u32,
    /// Acknowledgement number
    pub acknowledgement: u32,
    /// Flag bits, see [`tcp_flags`]
    pub flags: u16,
    /// Receive window
    pub window: u16,
    /// Urgent pointer (embedding target of the `urgptr` embedder)
    pub urgent_pointer: u16,
    /// Optional timestamp option (embedding target of `timestamp`)
    pub timestamp: Option<TcpTimestamp>,
}

impl TcpHeader {
    /// A fresh header with a random sequence number and the given flags.
    pub fn between(source: u16, destination: u16, flags: u16) -> Self {
        Self {
            source,
            destination,
            sequence: crate::crypto::SecureRandom::u32(),
            acknowledgement: 0,
            flags,
            window: 32768,
            urgent_pointer: 0,
            timestamp: None,
        }
    }
}

/// The UDP header fields the toolkit cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpHeader {
    /// Source port
    pub source: u16,
    /// Destination port
    pub destination: u16,
}

/// ICMP echo request fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcmpHeader {
    /// Echo identifier
    pub identifier: u16,
    /// Echo sequence number
    pub sequence: u16,
}

/// Closed sum over the transport headers a channel can carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportHeader {
    /// TCP segment header
    Tcp(TcpHeader),
    /// UDP datagram header
    Udp(UdpHeader),
    /// ICMP echo request header
    Icmp(IcmpHeader),
}

impl TransportHeader {
    /// The TCP header, if this is a TCP packet.
    pub fn as_tcp(&self) -> Option<&TcpHeader> {
        match self {
            TransportHeader::Tcp(h) => Some(h),
            _ => None,
        }
    }

    /// Mutable access to the TCP header, if this is a TCP packet.
    pub fn as_tcp_mut(&mut self) -> Option<&mut TcpHeader> {
        match self {
            TransportHeader::Tcp(h) => Some(h),
            _ => None,
        }
    }
}

/// A complete outbound or captured packet: IPv4 + transport + payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketSpec {
    /// Network-layer header
    pub ipv4: Ipv4Header,
    /// Transport-layer header
    pub transport: TransportHeader,
    /// Transport payload bytes
    pub payload: Vec<u8>,
}

impl PacketSpec {
    /// Serialize to wire bytes, recomputing the IPv4 and transport
    /// checksums. The result is a complete, wire-valid IPv4 datagram.
    pub fn encode(&self) -> Vec<u8> {
        let transport_bytes = match &self.transport {
            TransportHeader::Tcp(h) => encode_tcp(h, &self.ipv4, &self.payload),
            TransportHeader::Udp(h) => encode_udp(h, &self.ipv4, &self.payload),
            TransportHeader::Icmp(h) => encode_icmp(h, &self.payload),
        };

        let total_len = IPV4_HEADER_LEN + transport_bytes.len();
        let mut buf = vec![0u8; total_len];
        {
            let mut ip = MutableIpv4Packet::new(&mut buf).expect("buffer sized for IPv4 header");
            ip.set_version(4);
            ip.set_header_length((IPV4_HEADER_LEN / 4) as u8);
            ip.set_dscp(0);
            ip.set_ecn(self.ipv4.ecn & 0b11);
            ip.set_total_length(total_len as u16);
            ip.set_identification(self.ipv4.identification);
            ip.set_ttl(self.ipv4.ttl);
            ip.set_next_level_protocol(match &self.transport {
                TransportHeader::Tcp(_) => IpNextHeaderProtocols::Tcp,
                TransportHeader::Udp(_) => IpNextHeaderProtocols::Udp,
                TransportHeader::Icmp(_) => IpNextHeaderProtocols::Icmp,
            });
            ip.set_source(self.ipv4.source);
            ip.set_destination(self.ipv4.destination);
            ip.set_payload(&transport_bytes);
            let csum = ipv4::checksum(&ip.to_immutable());
            ip.set_checksum(csum);
        }
        buf
    }

    /// Parse a captured IPv4 datagram back into a [`PacketSpec`].
    pub fn parse(data: &[u8]) -> Result<PacketSpec> {
        let ip = Ipv4Packet::new(data)
            .ok_or_else(|| Error::invalid("datagram shorter than IPv4 header"))?;
        if ip.get_version() != 4 {
            return Err(Error::invalid(format!(
                "unsupported IP version {}",
                ip.get_version()
            )));
        }

        let ipv4 = Ipv4Header {
            identification: ip.get_identification(),
            ecn: ip.get_ecn(),
            ttl: ip.get_ttl(),
            source: ip.get_source(),
            destination: ip.get_destination(),
        };

        let (transport, payload) = match ip.get_next_level_protocol() {
            IpNextHeaderProtocols::Tcp => parse_tcp(ip.payload())?,
            IpNextHeaderProtocols::Udp => parse_udp(ip.payload())?,
            IpNextHeaderProtocols::Icmp => parse_icmp(ip.payload())?,
            other => {
                return Err(Error::invalid(format!(
                    "unsupported transport protocol {:?}",
                    other
                )))
            }
        };

        Ok(PacketSpec {
            ipv4,
            transport,
            payload,
        })
    }
}

fn encode_tcp(h: &TcpHeader, ipv4: &Ipv4Header, payload: &[u8]) -> Vec<u8> {
    // NOP padding keeps the timestamp option 32-bit aligned.
    let options: Vec<TcpOption> = match h.timestamp {
        Some(ts) => vec![
            TcpOption::nop(),
            TcpOption::nop(),
            TcpOption::timestamp(ts.value, ts.echo),
        ],
        None => Vec::new(),
    };
    let options_len = if h.timestamp.is_some() { 12 } else { 0 };

    let mut buf = vec![0u8; TCP_HEADER_LEN + options_len + payload.len()];
    let mut seg = MutableTcpPacket::new(&mut buf).expect("buffer sized for TCP header");
    seg.set_source(h.source);
    seg.set_destination(h.destination);
    seg.set_sequence(h.sequence);
    seg.set_acknowledgement(h.acknowledgement);
    seg.set_data_offset(((TCP_HEADER_LEN + options_len) / 4) as u8);
    seg.set_flags(h.flags as u8);
    seg.set_window(h.window);
    seg.set_urgent_ptr(h.urgent_pointer);
    if !options.is_empty() {
        seg.set_options(&options);
    }
    seg.set_payload(payload);
    let csum = tcp::ipv4_checksum(&seg.to_immutable(), &ipv4.source, &ipv4.destination);
    seg.set_checksum(csum);
    drop(seg);
    buf
}

fn encode_udp(h: &UdpHeader, ipv4: &Ipv4Header, payload: &[u8]) -> Vec<u8> {
    let mut buf = vec![0u8; UDP_HEADER_LEN + payload.len()];
    let mut dgram = MutableUdpPacket::new(&mut buf).expect("buffer sized for UDP header");
    dgram.set_source(h.source);
    dgram.set_destination(h.destination);
    dgram.set_length((UDP_HEADER_LEN + payload.len()) as u16);
    dgram.set_payload(payload);
    let csum = udp::ipv4_checksum(&dgram.to_immutable(), &ipv4.source, &ipv4.destination);
    dgram.set_checksum(csum);
    drop(dgram);
    buf
}

fn encode_icmp(h: &IcmpHeader, payload: &[u8]) -> Vec<u8> {
    let mut buf = vec![0u8; ICMP_HEADER_LEN + payload.len()];
    let mut echo = MutableEchoRequestPacket::new(&mut buf).expect("buffer sized for ICMP header");
    echo.set_icmp_type(IcmpTypes::EchoRequest);
    echo.set_identifier(h.identifier);
    echo.set_sequence_number(h.sequence);
    echo.set_payload(payload);
    drop(echo);
    let csum = icmp::checksum(&IcmpPacket::new(&buf).expect("buffer sized for ICMP header"));
    let mut echo = MutableEchoRequestPacket::new(&mut buf).expect("buffer sized for ICMP header");
    echo.set_checksum(csum);
    drop(echo);
    buf
}

fn parse_tcp(data: &[u8]) -> Result<(TransportHeader, Vec<u8>)> {
    let seg = TcpPacket::new(data).ok_or_else(|| Error::invalid("truncated TCP header"))?;

    let mut timestamp = None;
    for opt in seg.get_options_iter() {
        if opt.get_number() == TcpOptionNumbers::TIMESTAMPS {
            let p = opt.payload();
            if p.len() >= 8 {
                timestamp = Some(TcpTimestamp {
                    value: u32::from_be_bytes([p[0], p[1], p[2], p[3]]),
                    echo: u32::from_be_bytes([p[4], p[5], p[6], p[7]]),
                });
            }
        }
    }

    let header = TcpHeader {
        source: seg.get_source(),
        destination: seg.get_destination(),
        sequence: seg.get_sequence(),
        acknowledgement: seg.get_acknowledgement(),
        flags: seg.get_flags() as u16,
        window: seg.get_window(),
        urgent_pointer: seg.get_urgent_ptr(),
        timestamp,
    };
    Ok((TransportHeader::Tcp(header), seg.payload().to_vec()))
}

fn parse_udp(data: &[u8]) -> Result<(TransportHeader, Vec<u8>)> {
    let dgram = UdpPacket::new(data).ok_or_else(|| Error::invalid("truncated UDP header"))?;
    let header = UdpHeader {
        source: dgram.get_source(),
        destination: dgram.get_destination(),
    };
    Ok((TransportHeader::Udp(header), dgram.payload().to_vec()))
}

fn parse_icmp(data: &[u8]) -> Result<(TransportHeader, Vec<u8>)> {
    use pnet::packet::icmp::echo_request::EchoRequestPacket;

    let packet = IcmpPacket::new(data).ok_or_else(|| Error::invalid("truncated ICMP header"))?;
    if packet.get_icmp_type() != IcmpTypes::EchoRequest {
        return Err(Error::invalid(format!(
            "unexpected ICMP type {:?}",
            packet.get_icmp_type()
        )));
    }
    let echo = EchoRequestPacket::new(data).ok_or_else(|| Error::invalid("truncated ICMP echo"))?;
    let header = IcmpHeader {
        identifier: echo.get_identifier(),
        sequence: echo.get_sequence_number(),
    };
    Ok((TransportHeader::Icmp(header), echo.payload().to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback_ipv4() -> Ipv4Header {
        Ipv4Header {
            identification: 0x1234,
            ecn: 0,
            ttl: 64,
            source: Ipv4Addr::new(127, 0, 0, 1),
            destination: Ipv4Addr::new(127, 0, 0, 1),
        }
    }

    #[test]
    fn test_tcp_encode_parse_roundtrip() {
        let spec = PacketSpec {
            ipv4: loopback_ipv4(),
            transport: TransportHeader::Tcp(TcpHeader {
                source: 8090,
                destination: 8091,
                sequence: 0xDEADBEEF,
                acknowledgement: 42,
                flags: tcp_flags::SYN,
                window: 32768,
                urgent_pointer: 7,
                timestamp: None,
            }),
            payload: vec![],
        };

        let wire = spec.encode();
        assert_eq!(wire.len(), IPV4_HEADER_LEN + TCP_HEADER_LEN);

        let parsed = PacketSpec::parse(&wire).unwrap();
        assert_eq!(parsed, spec);
    }

    #[test]
    fn test_tcp_timestamp_option_roundtrip() {
        let spec = PacketSpec {
            ipv4: loopback_ipv4(),
            transport: TransportHeader::Tcp(TcpHeader {
                timestamp: Some(TcpTimestamp {
                    value: 0xAABBCC41,
                    echo: 0,
                }),
                ..TcpHeader::between(8090, 8091, tcp_flags::SYN)
            }),
            payload: vec![],
        };

        let parsed = PacketSpec::parse(&spec.encode()).unwrap();
        let tcp = parsed.transport.as_tcp().unwrap();
        assert_eq!(
            tcp.timestamp,
            Some(TcpTimestamp {
                value: 0xAABBCC41,
                echo: 0
            })
        );
    }

    #[test]
    fn test_udp_encode_parse_roundtrip() {
        let spec = PacketSpec {
            ipv4: loopback_ipv4(),
            transport: TransportHeader::Udp(UdpHeader {
                source: 8081,
                destination: 8080,
            }),
            payload: b"datagram".to_vec(),
        };

        let parsed = PacketSpec::parse(&spec.encode()).unwrap();
        assert_eq!(parsed, spec);
    }

    #[test]
    fn test_icmp_encode_parse_roundtrip() {
        let spec = PacketSpec {
            ipv4: loopback_ipv4(),
            transport: TransportHeader::Icmp(IcmpHeader {
                identifier: 99,
                sequence: 3,
            }),
            payload: b"ping ping".to_vec(),
        };

        let parsed = PacketSpec::parse(&spec.encode()).unwrap();
        assert_eq!(parsed, spec);
    }

    #[test]
    fn test_ecn_survives_roundtrip() {
        let mut spec = PacketSpec {
            ipv4: loopback_ipv4(),
            transport: TransportHeader::Udp(UdpHeader {
                source: 1,
                destination: 2,
            }),
            payload: vec![],
        };
        spec.ipv4.ecn = 0b01;

        let parsed = PacketSpec::parse(&spec.encode()).unwrap();
        assert_eq!(parsed.ipv4.ecn, 0b01);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(PacketSpec::parse(&[0u8; 4]).is_err());
        // Valid length, bogus version nibble
        assert!(PacketSpec::parse(&[0x60; 40]).is_err());
    }

    #[test]
    fn test_encoded_checksums_are_valid() {
        let spec = PacketSpec {
            ipv4: loopback_ipv4(),
            transport: TransportHeader::Tcp(TcpHeader::between(1000, 2000, tcp_flags::SYN)),
            payload: vec![],
        };
        let wire = spec.encode();

        let ip = Ipv4Packet::new(&wire).unwrap();
        assert_eq!(ip.get_checksum(), ipv4::checksum(&ip));

        let seg = TcpPacket::new(ip.payload()).unwrap();
        assert_eq!(
            seg.get_checksum(),
            tcp::ipv4_checksum(&seg, &ip.get_source(), &ip.get_destination())
        );
    }
}
