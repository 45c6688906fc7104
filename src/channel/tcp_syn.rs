//! Covert channel over isolated SYN packets.
//!
//! Every schedule slot rides its own SYN; no connection is ever
//! established and no reply is expected. Whatever RSTs the receiving
//! host's kernel emits happen below the capture point and are ignored.

use std::sync::Arc;

use crate::channel::engine::{CovertLink, Shape};
use crate::channel::ChannelConfig;
use crate::embedder::Embedder;
use crate::error::Result;
use crate::wire::PacketConduit;

/// A bare-SYN covert channel.
pub struct TcpSynChannel {
    link: CovertLink,
}

impl TcpSynChannel {
    /// Bind the channel to a conduit and spawn its demultiplexer.
    pub fn open(
        cfg: ChannelConfig,
        embedder: Embedder,
        conduit: Arc<dyn PacketConduit>,
    ) -> Result<Self> {
        Ok(Self {
            link: CovertLink::spawn(Shape::TcpSyn, cfg, embedder, conduit),
        })
    }

    /// Send one message as a burst of SYNs.
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
    use std::time::Duration;

    fn pair(embedder: Embedder) -> (TcpSynChannel, TcpSynChannel) {
        let (wire_a, wire_b) = MemoryConduit::pair();
        let mut cfg_a = ChannelConfig::loopback(8090, 8091);
        let mut cfg_b = ChannelConfig::loopback(8091, 8090);
        cfg_a.read_timeout = Some(Duration::from_secs(5));
        cfg_b.read_timeout = Some(Duration::from_secs(5));
        let a = TcpSynChannel::open(cfg_a, embedder.clone(), Arc::new(wire_a)).unwrap();
        let b = TcpSynChannel::open(cfg_b, embedder, Arc::new(wire_b)).unwrap();
        (a, b)
    }

    async fn exchange(a: &TcpSynChannel, b: &TcpSynChannel, message: &[u8]) {
        let receive = {
            let expected = message.to_vec();
            async move {
                let mut buf = [0u8; 1024];
                let n = b.receive(&mut buf).await.unwrap();
                assert_eq!(&buf[..n as usize], expected);
            }
        };
        let send = async {
            assert_eq!(a.send(message).await.unwrap(), message.len() as u64);
        };
        tokio::join!(receive, send);
    }

    #[tokio::test]
    async fn test_exchange_with_sequence() {
        // No reply path: the sender never blocks on the receiver, so a
        // message survives being sent before anyone listens.
        let (a, b) = pair(Embedder::Sequence);
        for message in ["", "A", "Hello World!", "🍌🍌🍌", "Hello\nNewline!"] {
            exchange(&a, &b, message.as_bytes()).await;
            exchange(&b, &a, message.as_bytes()).await;
        }
        a.close().await.unwrap();
        b.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_exchange_with_urgflg() {
        let (a, b) = pair(Embedder::UrgFlg);
        exchange(&a, &b, b"Hello World!").await;
        a.close().await.unwrap();
        b.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_exchange_with_temporal() {
        let (a, b) = pair(Embedder::Temporal(TimingProfile::temporal()));
        exchange(&a, &b, b"Hi").await;
        a.close().await.unwrap();
        b.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_message_survives_queued_before_receive() {
        let (a, b) = pair(Embedder::Sequence);
        // Send completes entirely before the receiver shows up; the SYNs
        // wait in the mailbox.
        assert_eq!(a.send(b"patience").await.unwrap(), 8);
        let mut buf = [0u8; 64];
        let n = b.receive(&mut buf).await.unwrap();
        assert_eq!(&buf[..n as usize], b"patience");
        a.close().await.unwrap();
        b.close().await.unwrap();
    }
}
