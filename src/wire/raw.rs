//! Raw-socket conduit backed by pnet Layer-3 transport channels.
//!
//! Requires CAP_NET_RAW (or root) on Linux. The blocking pnet receiver
//! runs on a dedicated OS thread and feeds captured datagrams into an
//! async queue; sends go straight through the pnet transport sender.

use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::Packet;
use pnet::transport::{ipv4_packet_iter, transport_channel, TransportChannelType::Layer3};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::wire::{Captured, PacketConduit};

/// Poll interval for the capture thread's stop flag.
const CAPTURE_POLL: Duration = Duration::from_millis(200);

/// Which IP protocol the raw socket is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConduitProtocol {
    /// Raw TCP segments
    Tcp,
    /// Raw UDP datagrams
    Udp,
    /// Raw ICMP messages
    Icmp,
}

/// A raw IPv4 conduit over a pnet transport channel.
pub struct RawConduit {
    sender: parking_lot::Mutex<pnet::transport::TransportSender>,
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<Captured>>,
    stop: Arc<AtomicBool>,
}

impl RawConduit {
    /// Open a Layer-3 transport channel for the given protocol and start
    /// the capture thread.
    pub fn open(protocol: ConduitProtocol) -> Result<Self> {
        let proto = match protocol {
            ConduitProtocol::Tcp => IpNextHeaderProtocols::Tcp,
            ConduitProtocol::Udp => IpNextHeaderProtocols::Udp,
            ConduitProtocol::Icmp => IpNextHeaderProtocols::Icmp,
        };
        let (sender, mut receiver) = transport_channel(4096, Layer3(proto))?;

        let (pkt_tx, pkt_rx) = mpsc::unbounded_channel();
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);

        // The thread exits on its own once `stop` is set or the queue
        // receiver is dropped; the handle is not retained.
        let _reader = std::thread::Builder::new()
            .name("covertkit-capture".into())
            .spawn(move || {
                let mut iter = ipv4_packet_iter(&mut receiver);
                while !thread_stop.load(Ordering::Relaxed) {
                    match iter.next_with_timeout(CAPTURE_POLL) {
                        Ok(Some((packet, _addr))) => {
                            let captured = Captured {
                                data: packet.packet().to_vec(),
                                arrival: Instant::now(),
                            };
                            if pkt_tx.send(captured).is_err() {
                                break;
                            }
                        }
                        Ok(None) => continue,
                        Err(e) => {
                            tracing::warn!("raw capture thread exiting: {}", e);
                            break;
                        }
                    }
                }
            })?;

        Ok(Self {
            sender: parking_lot::Mutex::new(sender),
            inbound: tokio::sync::Mutex::new(pkt_rx),
            stop,
        })
    }
}

#[async_trait]
impl PacketConduit for RawConduit {
    async fn transmit(&self, datagram: &[u8]) -> Result<()> {
        let packet = Ipv4Packet::new(datagram)
            .ok_or_else(|| Error::invalid("outbound datagram shorter than IPv4 header"))?;
        let destination = IpAddr::V4(packet.get_destination());

        let sent = self.sender.lock().send_to(packet, destination)?;
        if sent != datagram.len() {
            return Err(Error::WriteFail {
                written: sent as u64,
                total: datagram.len() as u64,
                reason: "short raw-socket send".into(),
            });
        }
        Ok(())
    }

    async fn capture(&self) -> Result<Captured> {
        if self.stop.load(Ordering::Relaxed) {
            return Err(Error::ChannelClosed);
        }
        let mut inbound = self.inbound.lock().await;
        inbound.recv().await.ok_or(Error::ChannelClosed)
    }

    fn shutdown(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}
