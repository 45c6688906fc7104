//! Overt ICMP channel: one echo request per message, payload in the clear.
//!
//! No embedder is involved; this is a baseline carrier for hosts where
//! only ICMP passes the network policy.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::channel::{copy_message, with_deadline, ChannelConfig, InboundPacket, Mailbox};
use crate::error::{Error, Result};
use crate::packet::{IcmpHeader, Ipv4Header, PacketSpec, TransportHeader};
use crate::wire::PacketConduit;
use crate::MAILBOX_CAPACITY;

/// An overt ICMP echo channel.
pub struct IcmpNormalChannel {
    cfg: ChannelConfig,
    conduit: Arc<dyn PacketConduit>,
    mailbox: Arc<Mailbox>,
    cancel: CancellationToken,
    demux: parking_lot::Mutex<Option<tokio::task::JoinHandle<()>>>,
    send_gate: tokio::sync::Mutex<()>,
    recv_gate: tokio::sync::Mutex<()>,
    sequence: std::sync::atomic::AtomicU16,
}

impl IcmpNormalChannel {
    /// Bind the channel to a conduit and spawn its demultiplexer.
    pub fn open(cfg: ChannelConfig, conduit: Arc<dyn PacketConduit>) -> Result<Self> {
        let mailbox = Arc::new(Mailbox::new(MAILBOX_CAPACITY));
        let cancel = CancellationToken::new();

        let demux = {
            let conduit = Arc::clone(&conduit);
            let mailbox = Arc::clone(&mailbox);
            let cancel = cancel.clone();
            let cfg = cfg.clone();
            tokio::spawn(async move {
                loop {
                    let captured = tokio::select! {
                        _ = cancel.cancelled() => break,
                        captured = conduit.capture() => match captured {
                            Ok(captured) => captured,
                            Err(_) => break,
                        },
                    };
                    let Ok(spec) = PacketSpec::parse(&captured.data) else {
                        continue;
                    };
                    if spec.ipv4.source != cfg.friend_ip
                        || spec.ipv4.destination != cfg.origin_ip
                        || !matches!(spec.transport, TransportHeader::Icmp(_))
                    {
                        continue;
                    }
                    mailbox.push(InboundPacket {
                        spec,
                        arrival: captured.arrival,
                    });
                }
            })
        };

        Ok(Self {
            cfg,
            conduit,
            mailbox,
            cancel,
            demux: parking_lot::Mutex::new(Some(demux)),
            send_gate: tokio::sync::Mutex::new(()),
            recv_gate: tokio::sync::Mutex::new(()),
            sequence: std::sync::atomic::AtomicU16::new(1),
        })
    }

    /// Send one message as a single echo request.
    pub async fn send(&self, data: &[u8]) -> Result<u64> {
        let _gate = self.send_gate.lock().await;
        if self.cancel.is_cancelled() {
            return Err(Error::ChannelClosed);
        }
        with_deadline(self.cfg.write_timeout, async {
            let packet = PacketSpec {
                ipv4: Ipv4Header::between(self.cfg.origin_ip, self.cfg.friend_ip),
                transport: TransportHeader::Icmp(IcmpHeader {
                    identifier: crate::crypto::SecureRandom::u16(),
                    sequence: self
                        .sequence
                        .fetch_add(1, std::sync::atomic::Ordering::Relaxed),
                }),
                payload: data.to_vec(),
            };
            self.conduit.transmit(&packet.encode()).await?;
            Ok(data.len() as u64)
        })
        .await
    }

    /// Receive one message from the next matching echo request.
    pub async fn receive(&self, buf: &mut [u8]) -> Result<u64> {
        let _gate = self.recv_gate.lock().await;
        if self.cancel.is_cancelled() {
            return Err(Error::ChannelClosed);
        }
        with_deadline(self.cfg.read_timeout, async {
            let packet = self.mailbox.pop(&self.cancel).await?;
            copy_message(&packet.spec.payload, buf)
        })
        .await
    }

    /// Close the channel. Idempotent.
    pub async fn close(&self) -> Result<()> {
        self.cancel.cancel();
        self.conduit.shutdown();
        self.mailbox.close();
        let handle = self.demux.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        Ok(())
    }
}
