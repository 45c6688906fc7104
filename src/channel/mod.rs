//! Channel variants: the per-carrier state machines.
//!
//! Every variant exposes the same byte-pipe surface: `send` one message,
//! `receive` one message, `close`. Overt variants (`TcpNormal`,
//! `UdpNormal`, `HttpNormal`) run over ordinary sockets and serve as
//! control baselines; covert variants push packets through a
//! [`crate::wire::PacketConduit`] and hide the payload with an
//! [`crate::embedder::Embedder`].

mod codec;
mod engine;
mod http;

pub mod http_covert;
pub mod http_normal;
pub mod icmp_ip;
pub mod icmp_normal;
pub mod tcp_handshake;
pub mod tcp_normal;
pub mod tcp_syn;
pub mod udp_ip;
pub mod udp_normal;

pub use http_covert::HttpCovertChannel;
pub use http_normal::HttpNormalChannel;
pub use icmp_ip::IcmpIpChannel;
pub use icmp_normal::IcmpNormalChannel;
pub use tcp_handshake::TcpHandshakeChannel;
pub use tcp_normal::TcpNormalChannel;
pub use tcp_syn::TcpSynChannel;
pub use udp_ip::UdpIpChannel;
pub use udp_normal::UdpNormalChannel;

use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::packet::PacketSpec;

/// Addressing and timeout configuration shared by every channel variant.
///
/// The friend is the remote peer; the origin is the local endpoint. A
/// `None` (or zero) timeout means unbounded.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Peer address
    pub friend_ip: Ipv4Addr,
    /// Local address
    pub origin_ip: Ipv4Addr,
    /// Port the peer receives on
    pub friend_port: u16,
    /// Port we receive on
    pub origin_port: u16,
    /// Bound on connection establishment / handshake replies
    pub dial_timeout: Option<Duration>,
    /// Bound on accepting an inbound connection
    pub accept_timeout: Option<Duration>,
    /// Bound on one `receive` call
    pub read_timeout: Option<Duration>,
    /// Bound on one `send` call
    pub write_timeout: Option<Duration>,
}

impl ChannelConfig {
    /// Loopback configuration with the given port pair and no timeouts.
    pub fn loopback(friend_port: u16, origin_port: u16) -> Self {
        Self {
            friend_ip: Ipv4Addr::LOCALHOST,
            origin_ip: Ipv4Addr::LOCALHOST,
            friend_port,
            origin_port,
            dial_timeout: None,
            accept_timeout: None,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

/// A live channel of any variant.
pub enum Channel {
    /// Overt length-prefixed TCP
    TcpNormal(TcpNormalChannel),
    /// Covert bytes inside full three-way handshakes
    TcpHandshake(TcpHandshakeChannel),
    /// Covert bytes inside isolated SYNs
    TcpSyn(TcpSynChannel),
    /// Overt UDP datagrams
    UdpNormal(UdpNormalChannel),
    /// Covert bytes inside UDP/IP headers
    UdpIp(UdpIpChannel),
    /// Covert bytes inside ICMP/IP headers
    IcmpIp(IcmpIpChannel),
    /// Overt ICMP echo payloads
    IcmpNormal(IcmpNormalChannel),
    /// Covert bytes inside HTTP request headers
    HttpCovert(HttpCovertChannel),
    /// Overt HTTP POST bodies
    HttpNormal(HttpNormalChannel),
}

impl Channel {
    /// Send one message; returns the number of payload bytes accepted.
    pub async fn send(&self, data: &[u8]) -> Result<u64> {
        match self {
            Channel::TcpNormal(c) => c.send(data).await,
            Channel::TcpHandshake(c) => c.send(data).await,
            Channel::TcpSyn(c) => c.send(data).await,
            Channel::UdpNormal(c) => c.send(data).await,
            Channel::UdpIp(c) => c.send(data).await,
            Channel::IcmpIp(c) => c.send(data).await,
            Channel::IcmpNormal(c) => c.send(data).await,
            Channel::HttpCovert(c) => c.send(data).await,
            Channel::HttpNormal(c) => c.send(data).await,
        }
    }

    /// Receive one message into `buf`; returns the number of bytes written.
    ///
    /// If the decoded message does not fit, `buf` is filled with its prefix
    /// and [`Error::BufferFull`] is returned; the remainder is discarded.
    pub async fn receive(&self, buf: &mut [u8]) -> Result<u64> {
        match self {
            Channel::TcpNormal(c) => c.receive(buf).await,
            Channel::TcpHandshake(c) => c.receive(buf).await,
            Channel::TcpSyn(c) => c.receive(buf).await,
            Channel::UdpNormal(c) => c.receive(buf).await,
            Channel::UdpIp(c) => c.receive(buf).await,
            Channel::IcmpIp(c) => c.receive(buf).await,
            Channel::IcmpNormal(c) => c.receive(buf).await,
            Channel::HttpCovert(c) => c.receive(buf).await,
            Channel::HttpNormal(c) => c.receive(buf).await,
        }
    }

    /// Cancel background workers and release sockets. Idempotent.
    pub async fn close(&self) -> Result<()> {
        match self {
            Channel::TcpNormal(c) => c.close().await,
            Channel::TcpHandshake(c) => c.close().await,
            Channel::TcpSyn(c) => c.close().await,
            Channel::UdpNormal(c) => c.close().await,
            Channel::UdpIp(c) => c.close().await,
            Channel::IcmpIp(c) => c.close().await,
            Channel::IcmpNormal(c) => c.close().await,
            Channel::HttpCovert(c) => c.close().await,
            Channel::HttpNormal(c) => c.close().await,
        }
    }
}

/// One parsed inbound packet with its arrival timestamp.
#[derive(Debug, Clone)]
pub(crate) struct InboundPacket {
    pub spec: PacketSpec,
    pub arrival: Instant,
}

/// Bounded inbound-packet queue with drop-oldest overflow.
///
/// The demultiplexer pushes, exactly one receive path pops. On overflow
/// the oldest packet is dropped and the hole surfaces downstream as a
/// decode error.
pub(crate) struct Mailbox {
    queue: parking_lot::Mutex<VecDeque<InboundPacket>>,
    notify: tokio::sync::Notify,
    capacity: usize,
    closed: AtomicBool,
}

impl Mailbox {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            queue: parking_lot::Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            notify: tokio::sync::Notify::new(),
            capacity,
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn push(&self, packet: InboundPacket) {
        {
            let mut queue = self.queue.lock();
            if queue.len() >= self.capacity {
                queue.pop_front();
                tracing::debug!("inbound mailbox full, dropping oldest packet");
            }
            queue.push_back(packet);
        }
        self.notify.notify_one();
    }

    pub(crate) async fn pop(&self, cancel: &CancellationToken) -> Result<InboundPacket> {
        loop {
            if let Some(packet) = self.queue.lock().pop_front() {
                return Ok(packet);
            }
            if self.closed.load(Ordering::Acquire) || cancel.is_cancelled() {
                return Err(Error::ChannelClosed);
            }
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = cancel.cancelled() => return Err(Error::ChannelClosed),
            }
        }
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }
}

/// Copy a decoded message into the caller's buffer, truncating with
/// [`Error::BufferFull`] when it does not fit.
pub(crate) fn copy_message(message: &[u8], buf: &mut [u8]) -> Result<u64> {
    if message.len() > buf.len() {
        let n = buf.len();
        buf.copy_from_slice(&message[..n]);
        return Err(Error::BufferFull { written: n as u64 });
    }
    buf[..message.len()].copy_from_slice(message);
    Ok(message.len() as u64)
}

/// Run `op` under an optional deadline, mapping expiry to
/// [`Error::Timeout`]. A `None` or zero deadline means unbounded.
pub(crate) async fn with_deadline<T>(
    deadline: Option<Duration>,
    op: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    match deadline {
        Some(limit) if !limit.is_zero() => tokio::time::timeout(limit, op)
            .await
            .map_err(|_| Error::Timeout(limit))?,
        _ => op.await,
    }
}
