//! Covert channel over bare UDP datagrams.
//!
//! The carrier is an empty UDP datagram; covert bits live in the IPv4
//! header or in inter-packet timing, so only IP-level and timing embedders
//! are accepted.

use std::sync::Arc;

use crate::channel::engine::{CovertLink, Shape};
use crate::channel::ChannelConfig;
use crate::embedder::Embedder;
use crate::error::{Error, Result};
use crate::wire::PacketConduit;

/// A UDP/IP covert channel.
pub struct UdpIpChannel {
    link: CovertLink,
}

impl std::fmt::Debug for UdpIpChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpIpChannel").finish_non_exhaustive()
    }
}

impl UdpIpChannel {
    /// Bind the channel to a conduit and spawn its demultiplexer.
    ///
    /// Rejects embedders that mutate TCP-only fields.
    pub fn open(
        cfg: ChannelConfig,
        embedder: Embedder,
        conduit: Arc<dyn PacketConduit>,
    ) -> Result<Self> {
        if embedder.requires_tcp() {
            return Err(Error::config(format!(
                "embedder {} needs a TCP carrier and cannot ride UDP",
                embedder.tag()
            )));
        }
        Ok(Self {
            link: CovertLink::spawn(Shape::Udp, cfg, embedder, conduit),
        })
    }

    /// Send one message as a burst of datagrams.
    pub async fn send(&self, data: &[u8]) -> Result<u64> {
        self.link.send(data).await
    }

    /// Receive one message.
    pub async fn receive(&self, buf: &mut [u8]) -> Result<u64> {
        self.link.receive(buf).await
    }

    /// Close the channel. Idempotent.
    pub async fn close(&self) -> Result<()> {
        self.link.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::TimingProfile;
    use crate::wire::MemoryConduit;

    fn pair(embedder: Embedder) -> (UdpIpChannel, UdpIpChannel) {
        let (wire_a, wire_b) = MemoryConduit::pair();
        let cfg_a = ChannelConfig::loopback(8090, 8091);
        let cfg_b = ChannelConfig::loopback(8091, 8090);
        let a = UdpIpChannel::open(cfg_a, embedder.clone(), Arc::new(wire_a)).unwrap();
        let b = UdpIpChannel::open(cfg_b, embedder, Arc::new(wire_b)).unwrap();
        (a, b)
    }

    #[tokio::test]
    async fn test_exchange_with_id() {
        let (a, b) = pair(Embedder::Id);
        for message in ["", "A", "Hello World!", "🍌🍌🍌"] {
            assert_eq!(
                a.send(message.as_bytes()).await.unwrap(),
                message.len() as u64
            );
            let mut buf = [0u8; 1024];
            let n = b.receive(&mut buf).await.unwrap();
            assert_eq!(&buf[..n as usize], message.as_bytes());
        }
        a.close().await.unwrap();
        b.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_exchange_with_ecn() {
        let (a, b) = pair(Embedder::Ecn);
        assert_eq!(a.send(b"ecn bits").await.unwrap(), 8);
        let mut buf = [0u8; 64];
        let n = b.receive(&mut buf).await.unwrap();
        assert_eq!(&buf[..n as usize], b"ecn bits");
        a.close().await.unwrap();
        b.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_exchange_with_ecntemporal() {
        let (a, b) = pair(Embedder::EcnTemporal(TimingProfile::temporal()));
        let receive = async {
            let mut buf = [0u8; 64];
            let n = b.receive(&mut buf).await.unwrap();
            assert_eq!(&buf[..n as usize], b"Hi!");
        };
        let send = async {
            assert_eq!(a.send(b"Hi!").await.unwrap(), 3);
        };
        tokio::join!(receive, send);
        a.close().await.unwrap();
        b.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_tcp_embedders_rejected() {
        let (wire, _peer) = MemoryConduit::pair();
        let err = UdpIpChannel::open(
            ChannelConfig::loopback(1, 2),
            Embedder::Sequence,
            Arc::new(wire),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
