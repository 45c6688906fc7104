//! Raw-packet I/O seam.
//!
//! Covert channels speak to the network through the [`PacketConduit`]
//! capability: an opaque sink/source of whole IPv4 datagrams. Production
//! code uses [`RawConduit`] (a pnet Layer-3 transport channel, which needs
//! CAP_NET_RAW); the test suite links two channels with
//! [`MemoryConduit::pair`] instead.
//!
//! Matching and filtering by friend/origin address happens above this
//! layer, in each channel's demultiplexer.

mod memory;
mod raw;

pub use memory::MemoryConduit;
pub use raw::{ConduitProtocol, RawConduit};

use std::time::Instant;

use async_trait::async_trait;

use crate::error::Result;

/// One inbound datagram together with its arrival timestamp.
///
/// The timestamp is taken as close to the wire as the conduit can manage;
/// timing embedders decode inter-packet gaps from it.
#[derive(Debug, Clone)]
pub struct Captured {
    /// Raw IPv4 datagram bytes
    pub data: Vec<u8>,
    /// When the datagram hit this conduit
    pub arrival: Instant,
}

/// Capability for sending and capturing raw IPv4 datagrams.
#[async_trait]
pub trait PacketConduit: Send + Sync {
    /// Emit one complete IPv4 datagram. Any embedder-requested send delay
    /// has already been applied by the caller.
    async fn transmit(&self, datagram: &[u8]) -> Result<()>;

    /// Wait for the next inbound datagram.
    ///
    /// Returns [`crate::Error::ChannelClosed`] once the conduit has been
    /// shut down and its queue drained.
    async fn capture(&self) -> Result<Captured>;

    /// Stop capturing. Idempotent; in-flight `capture` calls return
    /// [`crate::Error::ChannelClosed`].
    fn shutdown(&self);
}
