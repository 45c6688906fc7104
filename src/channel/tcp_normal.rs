//! Overt TCP channel: the control baseline.
//!
//! Each message is one connection: dial, write a `u64` big-endian length
//! prefix and the payload, close. The listener side accepts one connection
//! per `receive` call and returns exactly one `send`'s worth of bytes.

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::channel::{with_deadline, ChannelConfig};
use crate::error::{Error, Result};

/// An overt length-prefixed TCP channel.
pub struct TcpNormalChannel {
    cfg: ChannelConfig,
    listener: TcpListener,
    cancel: CancellationToken,
    send_gate: tokio::sync::Mutex<()>,
    recv_gate: tokio::sync::Mutex<()>,
}

impl TcpNormalChannel {
    /// Bind the listening socket on the origin address.
    pub async fn open(cfg: ChannelConfig) -> Result<Self> {
        let listener = TcpListener::bind((cfg.origin_ip, cfg.origin_port)).await?;
        Ok(Self {
            cfg,
            listener,
            cancel: CancellationToken::new(),
            send_gate: tokio::sync::Mutex::new(()),
            recv_gate: tokio::sync::Mutex::new(()),
        })
    }

    /// Send one message over a fresh connection to the friend.
    pub async fn send(&self, data: &[u8]) -> Result<u64> {
        let _gate = self.send_gate.lock().await;
        if self.cancel.is_cancelled() {
            return Err(Error::ChannelClosed);
        }

        let mut stream = with_deadline(self.cfg.dial_timeout, async {
            Ok(TcpStream::connect((self.cfg.friend_ip, self.cfg.friend_port)).await?)
        })
        .await?;

        with_deadline(self.cfg.write_timeout, async {
            let mut frame = BytesMut::with_capacity(8 + data.len());
            frame.put_u64(data.len() as u64);
            frame.put_slice(data);
            stream.write_all(&frame).await?;
            stream.flush().await?;
            Ok(data.len() as u64)
        })
        .await
    }

    /// Accept one connection and read one message.
    pub async fn receive(&self, buf: &mut [u8]) -> Result<u64> {
        let _gate = self.recv_gate.lock().await;
        if self.cancel.is_cancelled() {
            return Err(Error::ChannelClosed);
        }

        let (mut stream, _peer) = with_deadline(self.cfg.accept_timeout, async {
            tokio::select! {
                _ = self.cancel.cancelled() => Err(Error::ChannelClosed),
                accepted = self.listener.accept() => Ok(accepted?),
            }
        })
        .await?;

        with_deadline(self.cfg.read_timeout, async {
            let mut prefix = [0u8; 8];
            stream.read_exact(&mut prefix).await?;
            let len = u64::from_be_bytes(prefix) as usize;

            if len > buf.len() {
                stream.read_exact(buf).await?;
                drain(&mut stream, len - buf.len()).await?;
                return Err(Error::BufferFull {
                    written: buf.len() as u64,
                });
            }
            stream.read_exact(&mut buf[..len]).await?;
            Ok(len as u64)
        })
        .await
    }

    /// Close the channel. Idempotent; pending accepts are unblocked.
    pub async fn close(&self) -> Result<()> {
        self.cancel.cancel();
        Ok(())
    }
}

/// Read and discard `remaining` bytes so the truncated message does not
/// resume on a later call.
async fn drain(stream: &mut TcpStream, mut remaining: usize) -> Result<()> {
    let mut scratch = [0u8; 4096];
    while remaining > 0 {
        let take = remaining.min(scratch.len());
        let n = stream.read(&mut scratch[..take]).await?;
        if n == 0 {
            break;
        }
        remaining -= n;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    async fn channel_pair(port_a: u16, port_b: u16) -> (TcpNormalChannel, TcpNormalChannel) {
        let sender = TcpNormalChannel::open(ChannelConfig::loopback(port_a, port_b))
            .await
            .unwrap();
        let receiver = TcpNormalChannel::open(ChannelConfig::loopback(port_b, port_a))
            .await
            .unwrap();
        (sender, receiver)
    }

    #[tokio::test]
    async fn test_receive_send() {
        let (sender, receiver) = channel_pair(8080, 8081).await;

        for input in ["Hello world!", ""] {
            let receive = async {
                let mut data = [0u8; 15];
                let n = receiver.receive(&mut data).await.unwrap();
                assert_eq!(&data[..n as usize], input.as_bytes());
                n
            };
            let send = async {
                let n = sender.send(input.as_bytes()).await.unwrap();
                assert_eq!(n, input.len() as u64);
            };
            let (received, _) = tokio::join!(receive, send);
            assert_eq!(received, input.len() as u64);
        }

        sender.close().await.unwrap();
        receiver.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_receive_send_self() {
        // Friend and origin share one port: the channel talks to itself.
        let channel = TcpNormalChannel::open(ChannelConfig::loopback(8085, 8085))
            .await
            .unwrap();

        let receive = async {
            let mut data = [0u8; 15];
            let n = channel.receive(&mut data).await.unwrap();
            assert_eq!(&data[..n as usize], b"Hello world!");
        };
        let send = async {
            assert_eq!(channel.send(b"Hello world!").await.unwrap(), 12);
        };
        tokio::join!(receive, send);

        channel.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_receive_overflow() {
        let (sender, receiver) = channel_pair(8082, 8083).await;

        let receive = async {
            let mut data = [0u8; 5];
            let err = receiver.receive(&mut data).await.unwrap_err();
            assert!(matches!(err, Error::BufferFull { written: 5 }));
            assert_eq!(&data, b"12345");
        };
        let send = async {
            // The sender still reports the full message length.
            assert_eq!(sender.send(b"123456").await.unwrap(), 6);
        };
        tokio::join!(receive, send);

        sender.close().await.unwrap();
        receiver.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_multiple_concurrent_sends() {
        let (sender, receiver) = channel_pair(8086, 8087).await;
        let sender = Arc::new(sender);
        let receiver = Arc::new(receiver);

        let inputs: Vec<String> = (0..32).map(|i| format!("message number {}", i)).collect();

        let mut receives = Vec::new();
        for _ in 0..32 {
            let receiver = Arc::clone(&receiver);
            receives.push(tokio::spawn(async move {
                let mut data = [0u8; 1024];
                let n = receiver.receive(&mut data).await.unwrap();
                String::from_utf8(data[..n as usize].to_vec()).unwrap()
            }));
        }

        let mut sends = Vec::new();
        for input in &inputs {
            let sender = Arc::clone(&sender);
            let input = input.clone();
            sends.push(tokio::spawn(async move {
                let n = sender.send(input.as_bytes()).await.unwrap();
                assert_eq!(n, input.len() as u64);
            }));
        }
        for send in sends {
            send.await.unwrap();
        }

        let mut outputs = Vec::new();
        for receive in receives {
            outputs.push(receive.await.unwrap());
        }

        // Delivered as a set, exactly once each; ordering across
        // concurrent callers is not promised.
        let mut expected = inputs.clone();
        expected.sort();
        outputs.sort();
        assert_eq!(outputs, expected);

        sender.close().await.unwrap();
        receiver.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_accept_timeout() {
        let mut cfg = ChannelConfig::loopback(8089, 8088);
        cfg.accept_timeout = Some(Duration::from_millis(100));
        let receiver = TcpNormalChannel::open(cfg).await.unwrap();

        let mut data = [0u8; 8];
        let err = receiver.receive(&mut data).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        receiver.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_close_unblocks_receive_and_is_idempotent() {
        let (sender, receiver) = channel_pair(8078, 8079).await;
        let receiver = Arc::new(receiver);

        let pending = {
            let receiver = Arc::clone(&receiver);
            tokio::spawn(async move {
                let mut data = [0u8; 8];
                receiver.receive(&mut data).await
            })
        };
        tokio::task::yield_now().await;

        receiver.close().await.unwrap();
        receiver.close().await.unwrap();
        assert!(pending.await.unwrap().unwrap_err().is_closed());

        assert!(sender.close().await.is_ok());
        assert!(sender.send(b"x").await.unwrap_err().is_closed());
    }
}
