//! Covert channel framed by TCP three-way handshakes.
//!
//! Each message is negotiated as its own connection attempt: the sender
//! opens with a SYN (the first schedule slot, or the pilot for timing
//! embedders), waits for the listener's SYN-ACK, streams the remaining
//! slots as ACK packets and tears down with an RST. The receiver answers
//! the SYN and inverts the schedule over the captured sender-side packets.

use std::sync::Arc;

use crate::channel::engine::{CovertLink, Shape};
use crate::channel::ChannelConfig;
use crate::embedder::Embedder;
use crate::error::Result;
use crate::wire::PacketConduit;

/// A handshake-framed covert channel.
pub struct TcpHandshakeChannel {
    link: CovertLink,
}

impl TcpHandshakeChannel {
    /// Bind the channel to a conduit and spawn its demultiplexer.
    ///
    /// Every embedder is usable here since the carrier is TCP.
    pub fn open(
        cfg: ChannelConfig,
        embedder: Embedder,
        conduit: Arc<dyn PacketConduit>,
    ) -> Result<Self> {
        Ok(Self {
            link: CovertLink::spawn(Shape::TcpHandshake, cfg, embedder, conduit),
        })
    }

    /// Send one message as a covert handshake exchange.
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
