//! In-memory loopback conduit for tests.

use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::wire::{Captured, PacketConduit};

/// A linked pair of in-memory conduits.
///
/// Datagrams transmitted on one endpoint surface on the other with an
/// arrival timestamp taken at transmission, so timing embedders observe
/// the sender's inter-packet gaps undistorted by queueing.
pub struct MemoryConduit {
    peer: mpsc::UnboundedSender<Captured>,
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<Captured>>,
    cancel: CancellationToken,
}

impl MemoryConduit {
    /// Create two conduits wired back-to-back.
    pub fn pair() -> (MemoryConduit, MemoryConduit) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();

        let a = MemoryConduit {
            peer: b_tx,
            inbound: tokio::sync::Mutex::new(a_rx),
            cancel: CancellationToken::new(),
        };
        let b = MemoryConduit {
            peer: a_tx,
            inbound: tokio::sync::Mutex::new(b_rx),
            cancel: CancellationToken::new(),
        };
        (a, b)
    }
}

#[async_trait]
impl PacketConduit for MemoryConduit {
    async fn transmit(&self, datagram: &[u8]) -> Result<()> {
        // A vanished peer behaves like any other packet loss on the wire.
        let _ = self.peer.send(Captured {
            data: datagram.to_vec(),
            arrival: Instant::now(),
        });
        Ok(())
    }

    async fn capture(&self) -> Result<Captured> {
        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            _ = self.cancel.cancelled() => Err(Error::ChannelClosed),
            pkt = inbound.recv() => pkt.ok_or(Error::ChannelClosed),
        }
    }

    fn shutdown(&self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_delivers_both_directions() {
        let (a, b) = MemoryConduit::pair();

        a.transmit(b"to b").await.unwrap();
        b.transmit(b"to a").await.unwrap();

        assert_eq!(b.capture().await.unwrap().data, b"to b");
        assert_eq!(a.capture().await.unwrap().data, b"to a");
    }

    #[tokio::test]
    async fn test_shutdown_unblocks_capture() {
        let (a, _b) = MemoryConduit::pair();
        a.shutdown();
        assert!(a.capture().await.unwrap_err().is_closed());
    }

    #[tokio::test]
    async fn test_transmit_to_dropped_peer_is_lossy_not_fatal() {
        let (a, b) = MemoryConduit::pair();
        drop(b);
        assert!(a.transmit(b"into the void").await.is_ok());
    }
}
