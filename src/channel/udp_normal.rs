//! Overt UDP channel: one datagram per message.

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::channel::{copy_message, with_deadline, ChannelConfig};
use crate::error::{Error, Result};

/// Largest datagram we are prepared to receive.
const MAX_DATAGRAM: usize = 65535;

/// An overt UDP datagram channel.
pub struct UdpNormalChannel {
    cfg: ChannelConfig,
    socket: UdpSocket,
    cancel: CancellationToken,
    send_gate: tokio::sync::Mutex<()>,
    recv_gate: tokio::sync::Mutex<()>,
}

impl UdpNormalChannel {
    /// Bind the socket on the origin address.
    pub async fn open(cfg: ChannelConfig) -> Result<Self> {
        let socket = UdpSocket::bind((cfg.origin_ip, cfg.origin_port)).await?;
        Ok(Self {
            cfg,
            socket,
            cancel: CancellationToken::new(),
            send_gate: tokio::sync::Mutex::new(()),
            recv_gate: tokio::sync::Mutex::new(()),
        })
    }

    /// Send one message as a single datagram. Empty messages are legal.
    pub async fn send(&self, data: &[u8]) -> Result<u64> {
        let _gate = self.send_gate.lock().await;
        if self.cancel.is_cancelled() {
            return Err(Error::ChannelClosed);
        }
        with_deadline(self.cfg.write_timeout, async {
            let n = self
                .socket
                .send_to(data, (self.cfg.friend_ip, self.cfg.friend_port))
                .await?;
            Ok(n as u64)
        })
        .await
    }

    /// Receive the next datagram from the friend.
    pub async fn receive(&self, buf: &mut [u8]) -> Result<u64> {
        let _gate = self.recv_gate.lock().await;
        if self.cancel.is_cancelled() {
            return Err(Error::ChannelClosed);
        }
        with_deadline(self.cfg.read_timeout, async {
            let mut scratch = vec![0u8; MAX_DATAGRAM];
            loop {
                let (n, peer) = tokio::select! {
                    _ = self.cancel.cancelled() => return Err(Error::ChannelClosed),
                    received = self.socket.recv_from(&mut scratch) => received?,
                };
                if peer.ip() != self.cfg.friend_ip || peer.port() != self.cfg.friend_port {
                    continue;
                }
                return copy_message(&scratch[..n], buf);
            }
        })
        .await
    }

    /// Close the channel. Idempotent; pending receives are unblocked.
    pub async fn close(&self) -> Result<()> {
        self.cancel.cancel();
        Ok(())
    }
}
