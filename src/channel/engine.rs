//! Shared machinery for the packet-level covert channels.
//!
//! A [`CovertLink`] owns the conduit, the inbound mailbox and the
//! demultiplexer task, and runs the mask-schedule walk for both
//! directions. The four packet shapes differ only in carrier headers and
//! handshake behaviour, so they share this engine and stay thin.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::channel::codec::{frame_message, plan_slots, MessageDecoder};
use crate::channel::{copy_message, with_deadline, ChannelConfig, InboundPacket, Mailbox};
use crate::embedder::Embedder;
use crate::error::{Error, Result};
use crate::packet::{
    tcp_flags, IcmpHeader, Ipv4Header, PacketSpec, TcpHeader, TransportHeader, UdpHeader,
};
use crate::wire::PacketConduit;
use crate::MAILBOX_CAPACITY;

/// Packet shape of a covert link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Shape {
    /// SYN, handshake reply, then ACK data packets, RST teardown
    TcpHandshake,
    /// Isolated SYNs, no replies
    TcpSyn,
    /// Bare UDP datagrams
    Udp,
    /// ICMP echo requests
    Icmp,
}

/// A live covert link: conduit + mailboxes + demultiplexer + embedder.
pub(crate) struct CovertLink {
    shape: Shape,
    cfg: ChannelConfig,
    embedder: Embedder,
    conduit: Arc<dyn PacketConduit>,
    data_mail: Arc<Mailbox>,
    /// TcpHandshake only: SYN-ACK replies to our outbound messages.
    ctrl_mail: Arc<Mailbox>,
    cancel: CancellationToken,
    demux: parking_lot::Mutex<Option<tokio::task::JoinHandle<()>>>,
    send_gate: tokio::sync::Mutex<()>,
    recv_gate: tokio::sync::Mutex<()>,
}

impl CovertLink {
    /// Spawn the demultiplexer and return the ready link. Must be called
    /// from within a tokio runtime.
    pub(crate) fn spawn(
        shape: Shape,
        cfg: ChannelConfig,
        embedder: Embedder,
        conduit: Arc<dyn PacketConduit>,
    ) -> Self {
        let data_mail = Arc::new(Mailbox::new(MAILBOX_CAPACITY));
        let ctrl_mail = Arc::new(Mailbox::new(MAILBOX_CAPACITY));
        let cancel = CancellationToken::new();

        let demux = tokio::spawn(demux_loop(
            shape,
            cfg.clone(),
            Arc::clone(&conduit),
            Arc::clone(&data_mail),
            Arc::clone(&ctrl_mail),
            cancel.clone(),
        ));

        Self {
            shape,
            cfg,
            embedder,
            conduit,
            data_mail,
            ctrl_mail,
            cancel,
            demux: parking_lot::Mutex::new(Some(demux)),
            send_gate: tokio::sync::Mutex::new(()),
            recv_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Send one message. Serialised against concurrent sends so packet
    /// bursts for different messages never interleave.
    pub(crate) async fn send(&self, data: &[u8]) -> Result<u64> {
        let _gate = self.send_gate.lock().await;
        if self.cancel.is_cancelled() {
            return Err(Error::ChannelClosed);
        }
        with_deadline(self.cfg.write_timeout, self.send_inner(data)).await
    }

    async fn send_inner(&self, data: &[u8]) -> Result<u64> {
        let framed = frame_message(data);
        let slots = plan_slots(&self.embedder, framed.len());

        let mut awaiting_accept = self.shape == Shape::TcpHandshake;

        // Timing embedders cannot encode a gap on the first packet; lead
        // with a data-free pilot that establishes the receiver's time base.
        if self.embedder.is_timing() {
            let pilot = self.outbound_packet(true);
            self.conduit.transmit(&pilot.encode()).await?;
            if awaiting_accept {
                self.await_handshake_reply().await?;
                awaiting_accept = false;
            }
        }

        for (i, slot) in slots.iter().enumerate() {
            let opening = i == 0 && !self.embedder.is_timing();
            let mut packet = self.outbound_packet(opening);
            let delay = self.embedder.set_byte(
                &mut packet.ipv4,
                &mut packet.transport,
                framed[slot.byte],
                slot.mask_index,
            )?;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            self.conduit.transmit(&packet.encode()).await?;

            if opening && awaiting_accept {
                self.await_handshake_reply().await?;
                awaiting_accept = false;
            }
        }

        if self.shape == Shape::TcpHandshake {
            self.send_teardown().await?;
        }
        Ok(data.len() as u64)
    }

    /// Receive one message into `buf`. Serialised against concurrent
    /// receives; callers obtain decoded messages first-come-first-served.
    pub(crate) async fn receive(&self, buf: &mut [u8]) -> Result<u64> {
        let _gate = self.recv_gate.lock().await;
        if self.cancel.is_cancelled() {
            return Err(Error::ChannelClosed);
        }
        with_deadline(self.cfg.read_timeout, self.receive_inner(buf)).await
    }

    async fn receive_inner(&self, buf: &mut [u8]) -> Result<u64> {
        let mut decoder = MessageDecoder::new(self.embedder.clone());
        let mut last_arrival: Option<Instant> = None;
        let mut started = false;

        loop {
            let packet = self.data_mail.pop(&self.cancel).await?;

            if !started {
                started = true;
                if self.shape == Shape::TcpHandshake {
                    if let TransportHeader::Tcp(tcp) = &packet.spec.transport {
                        if tcp.flags & tcp_flags::SYN != 0 {
                            self.reply_handshake(tcp).await?;
                        }
                    }
                }
                if self.embedder.is_timing() {
                    // Pilot packet: time base only, no covert bits.
                    last_arrival = Some(packet.arrival);
                    continue;
                }
            }

            let gap = match last_arrival {
                Some(previous) => packet.arrival.duration_since(previous),
                None => Duration::ZERO,
            };
            last_arrival = Some(packet.arrival);

            match decoder.absorb(&packet.spec.ipv4, &packet.spec.transport, gap) {
                Ok(Some(message)) => return copy_message(&message, buf),
                Ok(None) => {}
                Err(e) if e.is_reject() => {
                    tracing::debug!("skipping unusable packet: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Cancel workers, shut the conduit and join the demultiplexer.
    /// Idempotent.
    pub(crate) async fn close(&self) -> Result<()> {
        self.cancel.cancel();
        self.conduit.shutdown();
        self.data_mail.close();
        self.ctrl_mail.close();

        let handle = self.demux.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        Ok(())
    }

    /// Carrier headers for the next outbound packet. `opening` selects the
    /// SYN of a TcpHandshake message; TcpSyn packets are always SYNs.
    fn outbound_packet(&self, opening: bool) -> PacketSpec {
        let ipv4 = Ipv4Header::between(self.cfg.origin_ip, self.cfg.friend_ip);
        let transport = match self.shape {
            Shape::TcpHandshake => {
                let flags = if opening {
                    tcp_flags::SYN
                } else {
                    tcp_flags::ACK
                };
                TransportHeader::Tcp(TcpHeader::between(
                    self.cfg.origin_port,
                    self.cfg.friend_port,
                    flags,
                ))
            }
            Shape::TcpSyn => TransportHeader::Tcp(TcpHeader::between(
                self.cfg.origin_port,
                self.cfg.friend_port,
                tcp_flags::SYN,
            )),
            Shape::Udp => TransportHeader::Udp(UdpHeader {
                source: self.cfg.origin_port,
                destination: self.cfg.friend_port,
            }),
            Shape::Icmp => TransportHeader::Icmp(IcmpHeader {
                identifier: crate::crypto::SecureRandom::u16(),
                sequence: crate::crypto::SecureRandom::u16(),
            }),
        };
        PacketSpec {
            ipv4,
            transport,
            payload: Vec::new(),
        }
    }

    /// Wait for the peer's SYN-ACK, bounded by the dial timeout.
    async fn await_handshake_reply(&self) -> Result<()> {
        with_deadline(self.cfg.dial_timeout, async {
            self.ctrl_mail.pop(&self.cancel).await.map(|_| ())
        })
        .await
    }

    /// Answer a captured SYN with a SYN-ACK acknowledging its sequence.
    async fn reply_handshake(&self, syn: &TcpHeader) -> Result<()> {
        let ipv4 = Ipv4Header::between(self.cfg.origin_ip, self.cfg.friend_ip);
        let mut tcp = TcpHeader::between(
            self.cfg.origin_port,
            self.cfg.friend_port,
            tcp_flags::SYN | tcp_flags::ACK,
        );
        tcp.acknowledgement = syn.sequence.wrapping_add(1);
        let reply = PacketSpec {
            ipv4,
            transport: TransportHeader::Tcp(tcp),
            payload: Vec::new(),
        };
        self.conduit.transmit(&reply.encode()).await
    }

    /// RST ends the simulated connection after a message.
    async fn send_teardown(&self) -> Result<()> {
        let packet = PacketSpec {
            ipv4: Ipv4Header::between(self.cfg.origin_ip, self.cfg.friend_ip),
            transport: TransportHeader::Tcp(TcpHeader::between(
                self.cfg.origin_port,
                self.cfg.friend_port,
                tcp_flags::RST,
            )),
            payload: Vec::new(),
        };
        self.conduit.transmit(&packet.encode()).await
    }
}

/// Read the conduit, parse, filter by friend/origin addressing and route
/// into the mailboxes until cancelled.
async fn demux_loop(
    shape: Shape,
    cfg: ChannelConfig,
    conduit: Arc<dyn PacketConduit>,
    data_mail: Arc<Mailbox>,
    ctrl_mail: Arc<Mailbox>,
    cancel: CancellationToken,
) {
    loop {
        let captured = tokio::select! {
            _ = cancel.cancelled() => break,
            captured = conduit.capture() => match captured {
                Ok(captured) => captured,
                Err(_) => break,
            },
        };

        let spec = match PacketSpec::parse(&captured.data) {
            Ok(spec) => spec,
            Err(e) => {
                tracing::debug!("discarding unparseable capture: {}", e);
                continue;
            }
        };
        if spec.ipv4.source != cfg.friend_ip || spec.ipv4.destination != cfg.origin_ip {
            continue;
        }

        // Copy the routing fields out so the packet can move into a mailbox.
        let routing = match &spec.transport {
            TransportHeader::Tcp(tcp) => Some((tcp.source, tcp.destination, tcp.flags)),
            TransportHeader::Udp(udp) => Some((udp.source, udp.destination, 0)),
            TransportHeader::Icmp(_) => None,
        };
        let inbound = InboundPacket {
            spec,
            arrival: captured.arrival,
        };
        match shape {
            Shape::TcpHandshake => {
                let Some((source, destination, flags)) = routing else {
                    continue;
                };
                if !matches!(inbound.spec.transport, TransportHeader::Tcp(_))
                    || source != cfg.friend_port
                    || destination != cfg.origin_port
                {
                    continue;
                }
                let syn_ack = tcp_flags::SYN | tcp_flags::ACK;
                if flags & syn_ack == syn_ack {
                    ctrl_mail.push(inbound);
                } else if flags & tcp_flags::RST != 0 {
                    tracing::debug!("peer tore down a handshake message");
                } else {
                    data_mail.push(inbound);
                }
            }
            Shape::TcpSyn => {
                let Some((source, destination, flags)) = routing else {
                    continue;
                };
                if !matches!(inbound.spec.transport, TransportHeader::Tcp(_))
                    || source != cfg.friend_port
                    || destination != cfg.origin_port
                    || flags & tcp_flags::SYN == 0
                    || flags & tcp_flags::ACK != 0
                {
                    continue;
                }
                data_mail.push(inbound);
            }
            Shape::Udp => {
                let Some((source, destination, _)) = routing else {
                    continue;
                };
                if !matches!(inbound.spec.transport, TransportHeader::Udp(_))
                    || source != cfg.friend_port
                    || destination != cfg.origin_port
                {
                    continue;
                }
                data_mail.push(inbound);
            }
            Shape::Icmp => {
                if !matches!(inbound.spec.transport, TransportHeader::Icmp(_)) {
                    continue;
                }
                data_mail.push(inbound);
            }
        }
    }
}
