//! The configuration envelope exchanged over the command surface.
//!
//! The wire shape mirrors the command protocol: an envelope carrying the
//! defaults, the active processor list and the active channel selection.
//! The `Data` of each entry holds every possible sub-config; only the kind
//! named in `Type` is consulted. Every leaf option is an object whose
//! `Value` is the only semantically significant field; the metadata rides
//! along for user interfaces.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

use crate::crypto::Identity;

/// A single leaf option: the value plus display metadata.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Item<T> {
    /// The configured value
    pub value: T,
    /// Human-readable description shown by user interfaces
    pub description: String,
}

impl<T> Item<T> {
    /// Create a leaf option.
    pub fn new(value: T, description: &str) -> Self {
        Self {
            value,
            description: description.to_string(),
        }
    }
}

/// Top-level configuration envelope.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ConfigEnvelope {
    /// Envelope opcode ("config" in replies, "open" in requests)
    pub op_code: String,
    /// Default sub-configs for every kind
    pub default: DefaultConfig,
    /// Active processor pipeline, applied in order on send
    pub processors: Vec<ProcessorEntry>,
    /// Active channel selection
    pub channel: ChannelEntry,
}

/// The defaults block: one pristine sub-config per kind.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct DefaultConfig {
    /// Default processor sub-configs
    pub processor: ProcessorData,
    /// Default channel sub-configs
    pub channel: ChannelData,
}

/// One active processor: its kind tag and the full sub-config set.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ProcessorEntry {
    /// Processor kind tag
    #[serde(rename = "Type")]
    pub kind: String,
    /// Sub-configs for every processor kind
    pub data: ProcessorData,
}

/// The active channel: its kind tag and the full sub-config set.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ChannelEntry {
    /// Channel kind tag
    #[serde(rename = "Type")]
    pub kind: String,
    /// Sub-configs for every channel kind
    pub data: ChannelData,
}

/// Sub-configs for every channel kind.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ChannelData {
    /// Overt TCP
    pub tcp_normal: TcpNormalData,
    /// Handshake-framed covert TCP
    pub tcp_handshake: TcpHandshakeData,
    /// Bare-SYN covert TCP
    pub tcp_syn: TcpSynData,
    /// Overt UDP
    pub udp_normal: UdpNormalData,
    /// Covert UDP/IP
    #[serde(rename = "UdpIP")]
    pub udp_ip: UdpIpData,
    /// Covert ICMP/IP
    #[serde(rename = "IcmpIP")]
    pub icmp_ip: IcmpIpData,
    /// Overt ICMP
    pub icmp_normal: IcmpNormalData,
    /// Covert HTTP
    pub http_covert: HttpCovertData,
    /// Overt HTTP
    pub http_normal: HttpNormalData,
}

/// Overt TCP sub-config.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct TcpNormalData {
    /// Peer address
    #[serde(rename = "FriendIP")]
    pub friend_ip: Item<String>,
    /// Local address
    #[serde(rename = "OriginIP")]
    pub origin_ip: Item<String>,
    /// Port the peer listens on
    pub friend_receive_port: Item<u16>,
    /// Port we listen on
    pub origin_receive_port: Item<u16>,
    /// Dial bound in milliseconds, 0 = unbounded
    pub dial_timeout: Item<u64>,
    /// Accept bound in milliseconds, 0 = unbounded
    pub accept_timeout: Item<u64>,
    /// Read bound in milliseconds, 0 = unbounded
    pub read_timeout: Item<u64>,
    /// Write bound in milliseconds, 0 = unbounded
    pub write_timeout: Item<u64>,
}

/// Handshake-framed covert TCP sub-config.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct TcpHandshakeData {
    /// Peer address
    #[serde(rename = "FriendIP")]
    pub friend_ip: Item<String>,
    /// Local address
    #[serde(rename = "OriginIP")]
    pub origin_ip: Item<String>,
    /// Port the peer captures on
    pub friend_receive_port: Item<u16>,
    /// Port we capture on
    pub origin_receive_port: Item<u16>,
    /// Embedder tag
    pub embedder: Item<String>,
    /// Handshake-reply bound in milliseconds, 0 = unbounded
    pub dial_timeout: Item<u64>,
    /// Accept bound in milliseconds, 0 = unbounded
    pub accept_timeout: Item<u64>,
    /// Read bound in milliseconds, 0 = unbounded
    pub read_timeout: Item<u64>,
    /// Write bound in milliseconds, 0 = unbounded
    pub write_timeout: Item<u64>,
}

/// Bare-SYN covert TCP sub-config.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct TcpSynData {
    /// Peer address
    #[serde(rename = "FriendIP")]
    pub friend_ip: Item<String>,
    /// Local address
    #[serde(rename = "OriginIP")]
    pub origin_ip: Item<String>,
    /// Port the peer captures on
    pub friend_port: Item<u16>,
    /// Port we capture on
    pub origin_port: Item<u16>,
    /// Embedder tag
    pub embedder: Item<String>,
    /// Read bound in milliseconds, 0 = unbounded
    pub read_timeout: Item<u64>,
    /// Write bound in milliseconds, 0 = unbounded
    pub write_timeout: Item<u64>,
}

/// Overt UDP sub-config.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct UdpNormalData {
    /// Peer address
    #[serde(rename = "FriendIP")]
    pub friend_ip: Item<String>,
    /// Local address
    #[serde(rename = "OriginIP")]
    pub origin_ip: Item<String>,
    /// Port the peer receives on
    pub destination_port: Item<u16>,
    /// Port we receive on
    pub origin_port: Item<u16>,
    /// Read bound in milliseconds, 0 = unbounded
    pub read_timeout: Item<u64>,
    /// Write bound in milliseconds, 0 = unbounded
    pub write_timeout: Item<u64>,
}

/// Covert UDP/IP sub-config.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct UdpIpData {
    /// Peer address
    #[serde(rename = "FriendIP")]
    pub friend_ip: Item<String>,
    /// Local address
    #[serde(rename = "OriginIP")]
    pub origin_ip: Item<String>,
    /// Port the peer captures on
    pub friend_receive_port: Item<u16>,
    /// Port we capture on
    pub origin_receive_port: Item<u16>,
    /// Embedder tag (IP-level and timing embedders only)
    pub embedder: Item<String>,
    /// Read bound in milliseconds, 0 = unbounded
    pub read_timeout: Item<u64>,
    /// Write bound in milliseconds, 0 = unbounded
    pub write_timeout: Item<u64>,
}

/// Covert ICMP/IP sub-config.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct IcmpIpData {
    /// Peer address
    #[serde(rename = "FriendIP")]
    pub friend_ip: Item<String>,
    /// Local address
    #[serde(rename = "OriginIP")]
    pub origin_ip: Item<String>,
    /// Embedder tag (IP-level and timing embedders only)
    pub embedder: Item<String>,
    /// Read bound in milliseconds, 0 = unbounded
    pub read_timeout: Item<u64>,
    /// Write bound in milliseconds, 0 = unbounded
    pub write_timeout: Item<u64>,
}

/// Overt ICMP sub-config.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct IcmpNormalData {
    /// Peer address
    #[serde(rename = "FriendIP")]
    pub friend_ip: Item<String>,
    /// Local address
    #[serde(rename = "OriginIP")]
    pub origin_ip: Item<String>,
    /// Read bound in milliseconds, 0 = unbounded
    pub read_timeout: Item<u64>,
    /// Write bound in milliseconds, 0 = unbounded
    pub write_timeout: Item<u64>,
}

/// Covert HTTP sub-config.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct HttpCovertData {
    /// Peer address
    #[serde(rename = "FriendIP")]
    pub friend_ip: Item<String>,
    /// Local address
    #[serde(rename = "OriginIP")]
    pub origin_ip: Item<String>,
    /// Port the peer serves on
    pub friend_receive_port: Item<u16>,
    /// Port we serve on
    pub origin_receive_port: Item<u16>,
    /// Dial bound in milliseconds, 0 = unbounded
    pub dial_timeout: Item<u64>,
    /// Accept bound in milliseconds, 0 = unbounded
    pub accept_timeout: Item<u64>,
    /// Read bound in milliseconds, 0 = unbounded
    pub read_timeout: Item<u64>,
    /// Write bound in milliseconds, 0 = unbounded
    pub write_timeout: Item<u64>,
}

/// Overt HTTP sub-config.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct HttpNormalData {
    /// Peer address
    #[serde(rename = "FriendIP")]
    pub friend_ip: Item<String>,
    /// Local address
    #[serde(rename = "OriginIP")]
    pub origin_ip: Item<String>,
    /// Port the peer serves on
    pub friend_receive_port: Item<u16>,
    /// Port we serve on
    pub origin_receive_port: Item<u16>,
    /// Dial bound in milliseconds, 0 = unbounded
    pub dial_timeout: Item<u64>,
    /// Accept bound in milliseconds, 0 = unbounded
    pub accept_timeout: Item<u64>,
    /// Read bound in milliseconds, 0 = unbounded
    pub read_timeout: Item<u64>,
    /// Write bound in milliseconds, 0 = unbounded
    pub write_timeout: Item<u64>,
}

/// Sub-configs for every processor kind.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ProcessorData {
    /// Identity
    pub none: NoneData,
    /// Per-byte shift
    pub caesar: CaesarData,
    /// CRC-32 trailer
    pub checksum: ChecksumData,
    /// Shared-key AEAD
    pub symmetric_encryption: SymmetricEncryptionData,
    /// Sealed box
    pub asymmetric_encryption: AsymmetricEncryptionData,
    /// Gzip
    #[serde(rename = "GZipCompression")]
    pub gzip_compression: GZipCompressionData,
    /// Zlib
    #[serde(rename = "ZLibCompression")]
    pub zlib_compression: ZLibCompressionData,
}

/// Identity sub-config (no options).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct NoneData {}

/// Caesar sub-config.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct CaesarData {
    /// Signed per-byte shift, -128 to 127
    pub shift: Item<i16>,
}

/// Checksum sub-config (no options).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct ChecksumData {}

/// Shared-key AEAD sub-config.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct SymmetricEncryptionData {
    /// 32-byte key, base64
    pub key: Item<String>,
}

/// Sealed-box sub-config.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct AsymmetricEncryptionData {
    /// Our 32-byte X25519 secret, base64
    pub local_secret_key: Item<String>,
    /// Peer's 32-byte X25519 public key, base64
    pub peer_public_key: Item<String>,
}

/// Gzip sub-config.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct GZipCompressionData {
    /// Quality level, 0-9
    pub level: Item<u32>,
}

/// Zlib sub-config.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ZLibCompressionData {
    /// Quality level, 0-9
    pub level: Item<u32>,
}

const LOOPBACK: &str = "127.0.0.1";

fn ip_items() -> (Item<String>, Item<String>) {
    (
        Item::new(LOOPBACK.to_string(), "IPv4 address of the peer"),
        Item::new(LOOPBACK.to_string(), "IPv4 address of this endpoint"),
    )
}

fn timeout_item(what: &str) -> Item<u64> {
    Item::new(0, what)
}

impl ChannelData {
    /// Pristine defaults for every channel kind.
    pub fn defaults() -> Self {
        let (friend_ip, origin_ip) = ip_items();
        Self {
            tcp_normal: TcpNormalData {
                friend_ip: friend_ip.clone(),
                origin_ip: origin_ip.clone(),
                friend_receive_port: Item::new(8080, "Port the peer listens on"),
                origin_receive_port: Item::new(8081, "Port this endpoint listens on"),
                dial_timeout: timeout_item("Dial bound in ms, 0 for none"),
                accept_timeout: timeout_item("Accept bound in ms, 0 for none"),
                read_timeout: timeout_item("Read bound in ms, 0 for none"),
                write_timeout: timeout_item("Write bound in ms, 0 for none"),
            },
            tcp_handshake: TcpHandshakeData {
                friend_ip: friend_ip.clone(),
                origin_ip: origin_ip.clone(),
                friend_receive_port: Item::new(8080, "Port the peer captures on"),
                origin_receive_port: Item::new(8081, "Port this endpoint captures on"),
                embedder: Item::new("sequence".to_string(), "Embedder tag"),
                dial_timeout: timeout_item("Handshake-reply bound in ms, 0 for none"),
                accept_timeout: timeout_item("Accept bound in ms, 0 for none"),
                read_timeout: timeout_item("Read bound in ms, 0 for none"),
                write_timeout: timeout_item("Write bound in ms, 0 for none"),
            },
            tcp_syn: TcpSynData {
                friend_ip: friend_ip.clone(),
                origin_ip: origin_ip.clone(),
                friend_port: Item::new(8080, "Port the peer captures on"),
                origin_port: Item::new(8081, "Port this endpoint captures on"),
                embedder: Item::new("sequence".to_string(), "Embedder tag"),
                read_timeout: timeout_item("Read bound in ms, 0 for none"),
                write_timeout: timeout_item("Write bound in ms, 0 for none"),
            },
            udp_normal: UdpNormalData {
                friend_ip: friend_ip.clone(),
                origin_ip: origin_ip.clone(),
                destination_port: Item::new(8080, "Port the peer receives on"),
                origin_port: Item::new(8081, "Port this endpoint receives on"),
                read_timeout: timeout_item("Read bound in ms, 0 for none"),
                write_timeout: timeout_item("Write bound in ms, 0 for none"),
            },
            udp_ip: UdpIpData {
                friend_ip: friend_ip.clone(),
                origin_ip: origin_ip.clone(),
                friend_receive_port: Item::new(8080, "Port the peer captures on"),
                origin_receive_port: Item::new(8081, "Port this endpoint captures on"),
                embedder: Item::new("id".to_string(), "Embedder tag (IP-level or timing)"),
                read_timeout: timeout_item("Read bound in ms, 0 for none"),
                write_timeout: timeout_item("Write bound in ms, 0 for none"),
            },
            icmp_ip: IcmpIpData {
                friend_ip: friend_ip.clone(),
                origin_ip: origin_ip.clone(),
                embedder: Item::new("id".to_string(), "Embedder tag (IP-level or timing)"),
                read_timeout: timeout_item("Read bound in ms, 0 for none"),
                write_timeout: timeout_item("Write bound in ms, 0 for none"),
            },
            icmp_normal: IcmpNormalData {
                friend_ip: friend_ip.clone(),
                origin_ip: origin_ip.clone(),
                read_timeout: timeout_item("Read bound in ms, 0 for none"),
                write_timeout: timeout_item("Write bound in ms, 0 for none"),
            },
            http_covert: HttpCovertData {
                friend_ip: friend_ip.clone(),
                origin_ip: origin_ip.clone(),
                friend_receive_port: Item::new(8080, "Port the peer serves on"),
                origin_receive_port: Item::new(8081, "Port this endpoint serves on"),
                dial_timeout: timeout_item("Dial bound in ms, 0 for none"),
                accept_timeout: timeout_item("Accept bound in ms, 0 for none"),
                read_timeout: timeout_item("Read bound in ms, 0 for none"),
                write_timeout: timeout_item("Write bound in ms, 0 for none"),
            },
            http_normal: HttpNormalData {
                friend_ip,
                origin_ip,
                friend_receive_port: Item::new(8080, "Port the peer serves on"),
                origin_receive_port: Item::new(8081, "Port this endpoint serves on"),
                dial_timeout: timeout_item("Dial bound in ms, 0 for none"),
                accept_timeout: timeout_item("Accept bound in ms, 0 for none"),
                read_timeout: timeout_item("Read bound in ms, 0 for none"),
                write_timeout: timeout_item("Write bound in ms, 0 for none"),
            },
        }
    }
}

impl ProcessorData {
    /// Pristine defaults for every processor kind.
    ///
    /// Key material gets a fresh keypair per defaults call: there is no
    /// meaningful shared default for public-key material, so real use must
    /// override it anyway.
    pub fn defaults() -> Self {
        let identity = Identity::generate();
        Self {
            none: NoneData {},
            caesar: CaesarData {
                shift: Item::new(3, "Signed per-byte shift, -128 to 127"),
            },
            checksum: ChecksumData {},
            symmetric_encryption: SymmetricEncryptionData {
                key: Item::new(BASE64.encode([0u8; 32]), "32-byte shared key, base64"),
            },
            asymmetric_encryption: AsymmetricEncryptionData {
                local_secret_key: Item::new(
                    BASE64.encode(identity.to_bytes()),
                    "Our X25519 secret key, base64",
                ),
                peer_public_key: Item::new(
                    BASE64.encode(identity.public().as_bytes()),
                    "Peer's X25519 public key, base64",
                ),
            },
            gzip_compression: GZipCompressionData {
                level: Item::new(6, "Quality level, 0-9"),
            },
            zlib_compression: ZLibCompressionData {
                level: Item::new(6, "Quality level, 0-9"),
            },
        }
    }
}

impl ConfigEnvelope {
    /// The envelope a freshly created controller starts from.
    pub fn defaults() -> Self {
        Self {
            op_code: "config".to_string(),
            default: DefaultConfig {
                processor: ProcessorData::defaults(),
                channel: ChannelData::defaults(),
            },
            processors: Vec::new(),
            channel: ChannelEntry {
                kind: "TcpHandshake".to_string(),
                data: ChannelData::defaults(),
            },
        }
    }
}
