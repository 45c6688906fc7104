//! Overt HTTP channel: one POST per message, body in the clear.

use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::channel::http;
use crate::channel::{copy_message, with_deadline, ChannelConfig};
use crate::error::{Error, Result};

/// An overt HTTP POST channel.
pub struct HttpNormalChannel {
    cfg: ChannelConfig,
    listener: TcpListener,
    cancel: CancellationToken,
    send_gate: tokio::sync::Mutex<()>,
    recv_gate: tokio::sync::Mutex<()>,
}

impl HttpNormalChannel {
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

    /// POST one message to the friend and wait for its 204.
    pub async fn send(&self, data: &[u8]) -> Result<u64> {
        let _gate = self.send_gate.lock().await;
        if self.cancel.is_cancelled() {
            return Err(Error::ChannelClosed);
        }

        let stream = with_deadline(self.cfg.dial_timeout, async {
            Ok(TcpStream::connect((self.cfg.friend_ip, self.cfg.friend_port)).await?)
        })
        .await?;
        let (read, mut write) = stream.into_split();
        let mut reader = BufReader::new(read);

        with_deadline(self.cfg.write_timeout, async {
            http::write_request(
                &mut write,
                "POST",
                "/sync",
                &self.cfg.friend_ip.to_string(),
                &[("Connection", "close".to_string())],
                data,
            )
            .await?;
            let status = http::read_response(&mut reader).await?;
            if status != 204 {
                return Err(Error::invalid(format!(
                    "unexpected response status {}",
                    status
                )));
            }
            Ok(data.len() as u64)
        })
        .await
    }

    /// Accept one request and return its body.
    pub async fn receive(&self, buf: &mut [u8]) -> Result<u64> {
        let _gate = self.recv_gate.lock().await;
        if self.cancel.is_cancelled() {
            return Err(Error::ChannelClosed);
        }

        let (stream, _peer) = with_deadline(self.cfg.accept_timeout, async {
            tokio::select! {
                _ = self.cancel.cancelled() => Err(Error::ChannelClosed),
                accepted = self.listener.accept() => Ok(accepted?),
            }
        })
        .await?;
        let (read, mut write) = stream.into_split();
        let mut reader = BufReader::new(read);

        with_deadline(self.cfg.read_timeout, async {
            let request = http::read_request(&mut reader)
                .await?
                .ok_or_else(|| Error::invalid("peer closed before sending a request"))?;
            http::write_no_content(&mut write).await?;
            copy_message(&request.body, buf)
        })
        .await
    }

    /// Close the channel. Idempotent.
    pub async fn close(&self) -> Result<()> {
        self.cancel.cancel();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn channel_pair() -> (HttpNormalChannel, HttpNormalChannel) {
        let sender = HttpNormalChannel::open(ChannelConfig::loopback(8060, 8061))
            .await
            .unwrap();
        let receiver = HttpNormalChannel::open(ChannelConfig::loopback(8061, 8060))
            .await
            .unwrap();
        (sender, receiver)
    }

    #[tokio::test]
    async fn test_receive_send() {
        let (sender, receiver) = channel_pair().await;

        for input in ["Hello world!", ""] {
            let receive = async {
                let mut data = [0u8; 15];
                let n = receiver.receive(&mut data).await.unwrap();
                assert_eq!(&data[..n as usize], input.as_bytes());
            };
            let send = async {
                assert_eq!(
                    sender.send(input.as_bytes()).await.unwrap(),
                    input.len() as u64
                );
            };
            tokio::join!(receive, send);
        }

        sender.close().await.unwrap();
        receiver.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_receive_overflow() {
        let sender = HttpNormalChannel::open(ChannelConfig::loopback(8062, 8063))
            .await
            .unwrap();
        let receiver = HttpNormalChannel::open(ChannelConfig::loopback(8063, 8062))
            .await
            .unwrap();

        let receive = async {
            let mut data = [0u8; 5];
            let err = receiver.receive(&mut data).await.unwrap_err();
            assert!(matches!(err, Error::BufferFull { written: 5 }));
            assert_eq!(&data, b"12345");
        };
        let send = async {
            assert_eq!(sender.send(b"123456").await.unwrap(), 6);
        };
        tokio::join!(receive, send);

        sender.close().await.unwrap();
        receiver.close().await.unwrap();
    }
}
