//! Covert channel over ICMP echo requests.
//!
//! The carrier is an empty echo request with random identifier and
//! sequence; covert bits live in the IPv4 header or in timing, so only
//! IP-level and timing embedders are accepted.

use std::sync::Arc;

use crate::channel::engine::{CovertLink, Shape};
use crate::channel::ChannelConfig;
use crate::embedder::Embedder;
use crate::error::{Error, Result};
use crate::wire::PacketConduit;

/// An ICMP/IP covert channel.
pub struct IcmpIpChannel {
    link: CovertLink,
}

impl std::fmt::Debug for IcmpIpChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IcmpIpChannel").finish_non_exhaustive()
    }
}

impl IcmpIpChannel {
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
                "embedder {} needs a TCP carrier and cannot ride ICMP",
                embedder.tag()
            )));
        }
        Ok(Self {
            link: CovertLink::spawn(Shape::Icmp, cfg, embedder, conduit),
        })
    }

    /// Send one message as a burst of echo requests.
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
