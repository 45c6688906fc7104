//! Covert HTTP channel: bytes hidden in request-identifier headers.
//!
//! Each message opens one keep-alive connection and issues a series of
//! body-less GETs; every request smuggles one byte of the length-prefixed
//! message in the low byte of its `X-Request-Id` hex value, which
//! otherwise looks like an ordinary random correlation id. The receiver
//! answers every request with a 204 and reassembles the frame.

use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::channel::codec::{frame_message, LENGTH_PREFIX_LEN, MAX_MESSAGE_LEN};
use crate::channel::http;
use crate::channel::{copy_message, with_deadline, ChannelConfig};
use crate::crypto::SecureRandom;
use crate::error::{Error, Result};

/// Header carrying the covert byte.
const CARRIER_HEADER: &str = "X-Request-Id";

/// An HTTP covert channel.
pub struct HttpCovertChannel {
    cfg: ChannelConfig,
    listener: TcpListener,
    cancel: CancellationToken,
    send_gate: tokio::sync::Mutex<()>,
    recv_gate: tokio::sync::Mutex<()>,
}

impl HttpCovertChannel {
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

    /// Send one message as a run of innocuous-looking GETs.
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
            let framed = frame_message(data);
            let host = self.cfg.friend_ip.to_string();
            for byte in framed {
                // 15 random bytes of id, one covert byte at the end.
                let mut id = http::to_hex(&SecureRandom::bytes::<15>());
                id.push_str(&format!("{:02x}", byte));
                http::write_request(
                    &mut write,
                    "GET",
                    "/assets/pixel.gif",
                    &host,
                    &[(CARRIER_HEADER, id)],
                    b"",
                )
                .await?;
                let status = http::read_response(&mut reader).await?;
                if status != 204 {
                    return Err(Error::invalid(format!(
                        "unexpected response status {}",
                        status
                    )));
                }
            }
            Ok(data.len() as u64)
        })
        .await
    }

    /// Accept one connection and reassemble its message.
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
            let mut bytes: Vec<u8> = Vec::new();
            let mut body_len: Option<usize> = None;

            loop {
                let request = http::read_request(&mut reader)
                    .await?
                    .ok_or_else(|| Error::invalid("peer closed mid-message"))?;
                http::write_no_content(&mut write).await?;

                let Some(byte) = extract_byte(&request) else {
                    tracing::debug!("skipping request without a usable {}", CARRIER_HEADER);
                    continue;
                };
                bytes.push(byte);

                match body_len {
                    None if bytes.len() == LENGTH_PREFIX_LEN => {
                        let len =
                            u64::from_le_bytes(bytes[..].try_into().expect("8-byte prefix"));
                        if len > MAX_MESSAGE_LEN as u64 {
                            return Err(Error::invalid(format!(
                                "decoded length prefix {} exceeds the {} byte cap",
                                len, MAX_MESSAGE_LEN
                            )));
                        }
                        body_len = Some(len as usize);
                        bytes.clear();
                        if len == 0 {
                            return copy_message(&[], buf);
                        }
                    }
                    Some(len) if bytes.len() == len => {
                        return copy_message(&bytes, buf);
                    }
                    _ => {}
                }
            }
        })
        .await
    }

    /// Close the channel. Idempotent.
    pub async fn close(&self) -> Result<()> {
        self.cancel.cancel();
        Ok(())
    }
}

/// The covert byte is the last two hex digits of the carrier header.
fn extract_byte(request: &http::HttpRequest) -> Option<u8> {
    let id = request.header(CARRIER_HEADER)?;
    if id.len() < 2 {
        return None;
    }
    u8::from_str_radix(&id[id.len() - 2..], 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn covert_pair_cfg(a: u16, b: u16) -> (ChannelConfig, ChannelConfig) {
        (ChannelConfig::loopback(a, b), ChannelConfig::loopback(b, a))
    }

    #[tokio::test]
    async fn test_exchange() {
        let (cfg_a, cfg_b) = covert_pair_cfg(8050, 8051);
        let a = HttpCovertChannel::open(cfg_a).await.unwrap();
        let b = HttpCovertChannel::open(cfg_b).await.unwrap();

        for message in ["", "A", "Hello World!", "🍌🍌🍌", "Hello\nNewline!"] {
            let receive = async {
                let mut buf = [0u8; 1024];
                let n = b.receive(&mut buf).await.unwrap();
                assert_eq!(&buf[..n as usize], message.as_bytes());
            };
            let send = async {
                assert_eq!(
                    a.send(message.as_bytes()).await.unwrap(),
                    message.len() as u64
                );
            };
            tokio::join!(receive, send);
        }

        a.close().await.unwrap();
        b.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_buffer_overflow() {
        let (cfg_a, cfg_b) = covert_pair_cfg(8052, 8053);
        let a = HttpCovertChannel::open(cfg_a).await.unwrap();
        let b = HttpCovertChannel::open(cfg_b).await.unwrap();

        let receive = async {
            let mut buf = [0u8; 5];
            let err = b.receive(&mut buf).await.unwrap_err();
            assert!(matches!(err, Error::BufferFull { written: 5 }));
            assert_eq!(&buf, b"12345");
        };
        let send = async {
            assert_eq!(a.send(b"123456").await.unwrap(), 6);
        };
        tokio::join!(receive, send);

        a.close().await.unwrap();
        b.close().await.unwrap();
    }

    #[test]
    fn test_extract_byte() {
        let request = http::HttpRequest {
            method: "GET".into(),
            headers: vec![("X-Request-Id".into(), "a0b1c2d3e4f5a6b7c8d9e0f1a2b3c47e".into())],
            body: vec![],
        };
        assert_eq!(extract_byte(&request), Some(0x7E));
    }
}
