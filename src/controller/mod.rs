//! Session controller: composes one channel with a processor pipeline and
//! drives the receive loop.
//!
//! The controller is an explicit instance with a `new → dispatch* →
//! shutdown` lifecycle. Commands arrive as JSON frames; replies are
//! returned synchronously, while decoded reads and background faults are
//! pushed onto the outbound queue (the control transport's send side —
//! the transport itself lives outside this crate).

mod config;

pub use config::*;

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::channel::{
    Channel, ChannelConfig, HttpCovertChannel, HttpNormalChannel, IcmpIpChannel,
    IcmpNormalChannel, TcpHandshakeChannel, TcpNormalChannel, TcpSynChannel, UdpIpChannel,
    UdpNormalChannel,
};
use crate::crypto::{AeadKey, Identity, PeerKey};
use crate::embedder::Embedder;
use crate::error::{Error, Result};
use crate::processor::{
    self, AsymmetricEncryption, Caesar, Checksum, GzipCompression, Processor,
    SymmetricEncryption, ZlibCompression,
};
use crate::wire::{ConduitProtocol, RawConduit};
use crate::{CLOSE_WATCHDOG, READ_BUFFER_SIZE};

/// One command or reply frame on the control surface.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct MessageFrame {
    /// Operation code
    pub op_code: String,
    /// Payload text (absent on `config`/`open` envelopes)
    #[serde(default)]
    pub message: String,
}

/// Serialise a reply frame, falling back to a hand-built error on the
/// (unreachable in practice) marshal failure.
fn to_message(op_code: &str, message: &str) -> Vec<u8> {
    serde_json::to_vec(&MessageFrame {
        op_code: op_code.to_string(),
        message: message.to_string(),
    })
    .unwrap_or_else(|_| br#"{"OpCode":"error","Message":"Marshal Error"}"#.to_vec())
}

struct Layers {
    channel: Arc<Channel>,
    processors: Arc<Vec<Processor>>,
    cancel: CancellationToken,
    done: oneshot::Receiver<()>,
}

/// The session controller.
pub struct Controller {
    config: ConfigEnvelope,
    layers: Option<Layers>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

impl Controller {
    /// Create a controller and the outbound queue the control transport
    /// should drain.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        (
            Self {
                config: ConfigEnvelope::defaults(),
                layers: None,
                outbound,
            },
            outbound_rx,
        )
    }

    /// Handle one inbound command frame and return the reply frame.
    pub async fn dispatch(&mut self, raw: &[u8]) -> Vec<u8> {
        let frame: MessageFrame = match serde_json::from_slice(raw) {
            Ok(frame) => frame,
            Err(e) => return to_message("error", &format!("Unable to read command: {}", e)),
        };

        match frame.op_code.as_str() {
            "open" => {
                if let Err(e) = self.handle_close().await {
                    return to_message("error", &format!("Unable to close channel: {}", e));
                }
                match self.handle_open(raw).await {
                    Ok(()) => to_message("open", "Open success"),
                    Err(e) => to_message("error", &format!("Unable to open channel: {}", e)),
                }
            }
            "close" => match self.handle_close().await {
                Ok(()) => to_message("close", "Close success"),
                Err(e) => to_message("error", &format!("Unable to close channel: {}", e)),
            },
            "write" => match self.handle_write(&frame.message).await {
                Ok(()) => to_message("write", "Message write success"),
                Err(e) => to_message("error", &format!("Unable to write to channel: {}", e)),
            },
            "config" => match self.handle_config() {
                Ok(reply) => reply,
                Err(e) => to_message("error", &format!("Could not encode config: {}", e)),
            },
            other => to_message(
                "error",
                &Error::UnknownOpCode(other.to_string()).to_string(),
            ),
        }
    }

    /// Tear down any open session.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.handle_close().await
    }

    fn handle_config(&mut self) -> Result<Vec<u8>> {
        self.config.op_code = "config".to_string();
        Ok(serde_json::to_vec(&self.config)?)
    }

    async fn handle_open(&mut self, raw: &[u8]) -> Result<()> {
        let mut envelope: ConfigEnvelope = serde_json::from_slice(raw)?;

        let processors = Arc::new(build_processors(&envelope)?);
        let channel = Arc::new(build_channel(&envelope).await?);

        envelope.op_code = "config".to_string();
        self.config = envelope;

        let cancel = CancellationToken::new();
        let (done_tx, done_rx) = oneshot::channel();
        tokio::spawn(read_loop(
            Arc::clone(&channel),
            Arc::clone(&processors),
            cancel.clone(),
            self.outbound.clone(),
            done_tx,
        ));

        self.layers = Some(Layers {
            channel,
            processors,
            cancel,
            done: done_rx,
        });
        Ok(())
    }

    async fn handle_close(&mut self) -> Result<()> {
        let Some(layers) = self.layers.take() else {
            return Ok(());
        };

        layers.cancel.cancel();
        let close_result = layers.channel.close().await;

        // The loop may be stuck in a receive the channel failed to cancel;
        // bounded wait, then abandon the handle rather than hang the caller.
        if tokio::time::timeout(CLOSE_WATCHDOG, layers.done)
            .await
            .is_err()
        {
            tracing::error!(
                "failed to stop read loop; covert channel did not return from cancel"
            );
        }
        close_result
    }

    async fn handle_write(&self, message: &str) -> Result<()> {
        let layers = self.layers.as_ref().ok_or(Error::ChannelClosed)?;

        let data = processor::process_forward(&layers.processors, message.as_bytes())
            .map_err(|e| Error::invalid(format!("unable to process outgoing message: {}", e)))?;

        match layers.channel.send(&data).await {
            Ok(_) => Ok(()),
            Err(e) => Err(Error::WriteFail {
                written: 0,
                total: data.len() as u64,
                reason: e.to_string(),
            }),
        }
    }
}

async fn handle_read(channel: &Channel, processors: &[Processor]) -> Result<Vec<u8>> {
    let mut buffer = [0u8; READ_BUFFER_SIZE];
    let n = channel.receive(&mut buffer).await? as usize;
    processor::unprocess_reverse(processors, &buffer[..n])
}

/// Background receive loop: decoded messages go out as `read` frames,
/// faults as `error` frames with a one-second backoff against a
/// persistently failing channel.
async fn read_loop(
    channel: Arc<Channel>,
    processors: Arc<Vec<Processor>>,
    cancel: CancellationToken,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    _done: oneshot::Sender<()>,
) {
    loop {
        if cancel.is_cancelled() {
            break;
        }
        match handle_read(&channel, &processors).await {
            Ok(data) => {
                let text = String::from_utf8_lossy(&data).into_owned();
                if outbound.send(to_message("read", &text)).is_err() {
                    break;
                }
            }
            Err(e) => {
                // During teardown the failure is just the cancellation
                // arriving through the channel; don't report it.
                if cancel.is_cancelled() {
                    break;
                }
                let _ = outbound.send(to_message("error", &format!("Read fail: {}", e)));
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                    _ = cancel.cancelled() => break,
                }
            }
        }
    }
    // Dropping _done signals completion exactly once.
}

fn parse_ip(item: &Item<String>) -> Result<Ipv4Addr> {
    item.value
        .parse()
        .map_err(|_| Error::config(format!("invalid IPv4 address: {}", item.value)))
}

fn optional_ms(item: &Item<u64>) -> Option<Duration> {
    (item.value > 0).then(|| Duration::from_millis(item.value))
}

fn parse_key32(item: &Item<String>, what: &str) -> Result<[u8; 32]> {
    let bytes = BASE64
        .decode(&item.value)
        .map_err(|_| Error::config(format!("{} is not valid base64", what)))?;
    bytes
        .try_into()
        .map_err(|_| Error::config(format!("{} must decode to 32 bytes", what)))
}

fn parse_embedder(item: &Item<String>) -> Result<Embedder> {
    Embedder::from_tag(&item.value)
}

fn build_processors(envelope: &ConfigEnvelope) -> Result<Vec<Processor>> {
    envelope.processors.iter().map(build_processor).collect()
}

fn build_processor(entry: &ProcessorEntry) -> Result<Processor> {
    match entry.kind.as_str() {
        "None" => Ok(Processor::Identity),
        "Caesar" => {
            let shift = entry.data.caesar.shift.value;
            let shift = i8::try_from(shift)
                .map_err(|_| Error::config(format!("caesar shift {} out of range", shift)))?;
            Ok(Processor::Caesar(Caesar::new(shift)))
        }
        "Checksum" => Ok(Processor::Checksum(Checksum::new())),
        "SymmetricEncryption" => {
            let key = parse_key32(&entry.data.symmetric_encryption.key, "symmetric key")?;
            Ok(Processor::Symmetric(SymmetricEncryption::new(
                AeadKey::from_bytes(key),
            )))
        }
        "AsymmetricEncryption" => {
            let data = &entry.data.asymmetric_encryption;
            let secret = parse_key32(&data.local_secret_key, "local secret key")?;
            let public = parse_key32(&data.peer_public_key, "peer public key")?;
            Ok(Processor::Asymmetric(AsymmetricEncryption::new(
                Identity::from_bytes(secret),
                PeerKey::from_bytes(public),
            )))
        }
        "GZipCompression" => Ok(Processor::Gzip(GzipCompression::new(
            entry.data.gzip_compression.level.value,
        )?)),
        "ZLibCompression" => Ok(Processor::Zlib(ZlibCompression::new(
            entry.data.zlib_compression.level.value,
        )?)),
        other => Err(Error::config(format!("unknown processor type: {}", other))),
    }
}

async fn build_channel(envelope: &ConfigEnvelope) -> Result<Channel> {
    let data = &envelope.channel.data;
    match envelope.channel.kind.as_str() {
        "TcpNormal" => {
            let d = &data.tcp_normal;
            let cfg = ChannelConfig {
                friend_ip: parse_ip(&d.friend_ip)?,
                origin_ip: parse_ip(&d.origin_ip)?,
                friend_port: d.friend_receive_port.value,
                origin_port: d.origin_receive_port.value,
                dial_timeout: optional_ms(&d.dial_timeout),
                accept_timeout: optional_ms(&d.accept_timeout),
                read_timeout: optional_ms(&d.read_timeout),
                write_timeout: optional_ms(&d.write_timeout),
            };
            Ok(Channel::TcpNormal(TcpNormalChannel::open(cfg).await?))
        }
        "TcpHandshake" => {
            let d = &data.tcp_handshake;
            let cfg = ChannelConfig {
                friend_ip: parse_ip(&d.friend_ip)?,
                origin_ip: parse_ip(&d.origin_ip)?,
                friend_port: d.friend_receive_port.value,
                origin_port: d.origin_receive_port.value,
                dial_timeout: optional_ms(&d.dial_timeout),
                accept_timeout: optional_ms(&d.accept_timeout),
                read_timeout: optional_ms(&d.read_timeout),
                write_timeout: optional_ms(&d.write_timeout),
            };
            let embedder = parse_embedder(&d.embedder)?;
            let conduit = Arc::new(RawConduit::open(ConduitProtocol::Tcp)?);
            Ok(Channel::TcpHandshake(TcpHandshakeChannel::open(
                cfg, embedder, conduit,
            )?))
        }
        "TcpSyn" => {
            let d = &data.tcp_syn;
            let cfg = ChannelConfig {
                friend_ip: parse_ip(&d.friend_ip)?,
                origin_ip: parse_ip(&d.origin_ip)?,
                friend_port: d.friend_port.value,
                origin_port: d.origin_port.value,
                dial_timeout: None,
                accept_timeout: None,
                read_timeout: optional_ms(&d.read_timeout),
                write_timeout: optional_ms(&d.write_timeout),
            };
            let embedder = parse_embedder(&d.embedder)?;
            let conduit = Arc::new(RawConduit::open(ConduitProtocol::Tcp)?);
            Ok(Channel::TcpSyn(TcpSynChannel::open(cfg, embedder, conduit)?))
        }
        "UdpNormal" => {
            let d = &data.udp_normal;
            let cfg = ChannelConfig {
                friend_ip: parse_ip(&d.friend_ip)?,
                origin_ip: parse_ip(&d.origin_ip)?,
                friend_port: d.destination_port.value,
                origin_port: d.origin_port.value,
                dial_timeout: None,
                accept_timeout: None,
                read_timeout: optional_ms(&d.read_timeout),
                write_timeout: optional_ms(&d.write_timeout),
            };
            Ok(Channel::UdpNormal(UdpNormalChannel::open(cfg).await?))
        }
        "UdpIP" => {
            let d = &data.udp_ip;
            let cfg = ChannelConfig {
                friend_ip: parse_ip(&d.friend_ip)?,
                origin_ip: parse_ip(&d.origin_ip)?,
                friend_port: d.friend_receive_port.value,
                origin_port: d.origin_receive_port.value,
                dial_timeout: None,
                accept_timeout: None,
                read_timeout: optional_ms(&d.read_timeout),
                write_timeout: optional_ms(&d.write_timeout),
            };
            let embedder = parse_embedder(&d.embedder)?;
            let conduit = Arc::new(RawConduit::open(ConduitProtocol::Udp)?);
            Ok(Channel::UdpIp(UdpIpChannel::open(cfg, embedder, conduit)?))
        }
        "IcmpIP" => {
            let d = &data.icmp_ip;
            let cfg = ChannelConfig {
                friend_ip: parse_ip(&d.friend_ip)?,
                origin_ip: parse_ip(&d.origin_ip)?,
                friend_port: 0,
                origin_port: 0,
                dial_timeout: None,
                accept_timeout: None,
                read_timeout: optional_ms(&d.read_timeout),
                write_timeout: optional_ms(&d.write_timeout),
            };
            let embedder = parse_embedder(&d.embedder)?;
            let conduit = Arc::new(RawConduit::open(ConduitProtocol::Icmp)?);
            Ok(Channel::IcmpIp(IcmpIpChannel::open(cfg, embedder, conduit)?))
        }
        "IcmpNormal" => {
            let d = &data.icmp_normal;
            let cfg = ChannelConfig {
                friend_ip: parse_ip(&d.friend_ip)?,
                origin_ip: parse_ip(&d.origin_ip)?,
                friend_port: 0,
                origin_port: 0,
                dial_timeout: None,
                accept_timeout: None,
                read_timeout: optional_ms(&d.read_timeout),
                write_timeout: optional_ms(&d.write_timeout),
            };
            let conduit = Arc::new(RawConduit::open(ConduitProtocol::Icmp)?);
            Ok(Channel::IcmpNormal(IcmpNormalChannel::open(cfg, conduit)?))
        }
        "HttpCovert" => {
            let d = &data.http_covert;
            let cfg = ChannelConfig {
                friend_ip: parse_ip(&d.friend_ip)?,
                origin_ip: parse_ip(&d.origin_ip)?,
                friend_port: d.friend_receive_port.value,
                origin_port: d.origin_receive_port.value,
                dial_timeout: optional_ms(&d.dial_timeout),
                accept_timeout: optional_ms(&d.accept_timeout),
                read_timeout: optional_ms(&d.read_timeout),
                write_timeout: optional_ms(&d.write_timeout),
            };
            Ok(Channel::HttpCovert(HttpCovertChannel::open(cfg).await?))
        }
        "HttpNormal" => {
            let d = &data.http_normal;
            let cfg = ChannelConfig {
                friend_ip: parse_ip(&d.friend_ip)?,
                origin_ip: parse_ip(&d.origin_ip)?,
                friend_port: d.friend_receive_port.value,
                origin_port: d.origin_receive_port.value,
                dial_timeout: optional_ms(&d.dial_timeout),
                accept_timeout: optional_ms(&d.accept_timeout),
                read_timeout: optional_ms(&d.read_timeout),
                write_timeout: optional_ms(&d.write_timeout),
            };
            Ok(Channel::HttpNormal(HttpNormalChannel::open(cfg).await?))
        }
        other => Err(Error::config(format!("unknown channel type: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(raw: &[u8]) -> MessageFrame {
        serde_json::from_slice(raw).unwrap()
    }

    async fn open_tcp_normal(
        ctr: &mut Controller,
        friend_port: u16,
        origin_port: u16,
        processors: Vec<ProcessorEntry>,
    ) {
        let conf_raw = ctr.dispatch(br#"{"OpCode":"config"}"#).await;
        let mut conf: ConfigEnvelope = serde_json::from_slice(&conf_raw).unwrap();
        conf.op_code = "open".to_string();
        conf.channel.kind = "TcpNormal".to_string();
        conf.channel.data.tcp_normal.friend_receive_port.value = friend_port;
        conf.channel.data.tcp_normal.origin_receive_port.value = origin_port;
        conf.processors = processors;

        let reply = frame(&ctr.dispatch(&serde_json::to_vec(&conf).unwrap()).await);
        assert_eq!(reply.op_code, "open");
        assert_eq!(reply.message, "Open success");
    }

    fn caesar_entry(shift: i16) -> ProcessorEntry {
        let mut data = ProcessorData::defaults();
        data.caesar.shift.value = shift;
        ProcessorEntry {
            kind: "Caesar".to_string(),
            data,
        }
    }

    async fn next_frame(rx: &mut mpsc::UnboundedReceiver<Vec<u8>>) -> MessageFrame {
        let raw = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("outbound frame within 5s")
            .expect("outbound queue open");
        frame(&raw)
    }

    #[tokio::test]
    async fn test_retrieve_config() {
        let (mut ctr, _rx) = Controller::new();
        let reply = ctr.dispatch(br#"{"OpCode":"config"}"#).await;
        let conf: ConfigEnvelope = serde_json::from_slice(&reply).unwrap();
        assert_eq!(conf.op_code, "config");
        assert_eq!(conf.channel.kind, "TcpHandshake");
    }

    #[tokio::test]
    async fn test_unknown_opcode() {
        let (mut ctr, _rx) = Controller::new();
        let reply = frame(&ctr.dispatch(br#"{"OpCode":"selfdestruct"}"#).await);
        assert_eq!(reply.op_code, "error");
        assert_eq!(reply.message, "unknown operation code: selfdestruct");
    }

    #[tokio::test]
    async fn test_malformed_command() {
        let (mut ctr, _rx) = Controller::new();
        let reply = frame(&ctr.dispatch(b"{not json").await);
        assert_eq!(reply.op_code, "error");
        assert!(reply.message.starts_with("Unable to read command"));
    }

    #[tokio::test]
    async fn test_write_without_session() {
        let (mut ctr, _rx) = Controller::new();
        let reply = frame(
            &ctr.dispatch(br#"{"OpCode":"write","Message":"hello"}"#)
                .await,
        );
        assert_eq!(reply.op_code, "error");
        assert!(reply.message.contains("channel closed"));
    }

    #[tokio::test]
    async fn test_close_idempotent_and_write_between() {
        let (mut ctr, _rx) = Controller::new();
        open_tcp_normal(&mut ctr, 18070, 18071, Vec::new()).await;

        let reply = frame(&ctr.dispatch(br#"{"OpCode":"close"}"#).await);
        assert_eq!((reply.op_code.as_str(), reply.message.as_str()), ("close", "Close success"));

        let reply = frame(
            &ctr.dispatch(br#"{"OpCode":"write","Message":"hi"}"#)
                .await,
        );
        assert_eq!(reply.op_code, "error");
        assert!(reply.message.contains("channel closed"));

        let reply = frame(&ctr.dispatch(br#"{"OpCode":"close"}"#).await);
        assert_eq!((reply.op_code.as_str(), reply.message.as_str()), ("close", "Close success"));
    }

    #[tokio::test]
    async fn test_message_exchange_over_tcp_normal() {
        let (mut ctr1, mut rx1) = Controller::new();
        let (mut ctr2, mut rx2) = Controller::new();
        open_tcp_normal(&mut ctr1, 18080, 18081, Vec::new()).await;
        open_tcp_normal(&mut ctr2, 18081, 18080, Vec::new()).await;

        for text in ["", "A", "Hello World!", "🍌🍌🍌", "Hello\nNewline!"] {
            let cmd = serde_json::to_vec(&MessageFrame {
                op_code: "write".to_string(),
                message: text.to_string(),
            })
            .unwrap();

            let reply = frame(&ctr1.dispatch(&cmd).await);
            assert_eq!(reply.message, "Message write success");
            let read = next_frame(&mut rx2).await;
            assert_eq!((read.op_code.as_str(), read.message.as_str()), ("read", text));

            let reply = frame(&ctr2.dispatch(&cmd).await);
            assert_eq!(reply.message, "Message write success");
            let read = next_frame(&mut rx1).await;
            assert_eq!((read.op_code.as_str(), read.message.as_str()), ("read", text));
        }

        ctr1.shutdown().await.unwrap();
        ctr2.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_caesar_pipeline_without_inverse() {
        // Sender applies Caesar -1 then +3; the receiver applies nothing,
        // so the message lands shifted by +2 per byte.
        let (mut ctr1, _rx1) = Controller::new();
        let (mut ctr2, mut rx2) = Controller::new();
        open_tcp_normal(
            &mut ctr1,
            18090,
            18091,
            vec![caesar_entry(-1), caesar_entry(3)],
        )
        .await;
        open_tcp_normal(&mut ctr2, 18091, 18090, Vec::new()).await;

        let reply = frame(
            &ctr1
                .dispatch(br#"{"OpCode":"write","Message":"Hello World!"}"#)
                .await,
        );
        assert_eq!(reply.message, "Message write success");

        let read = next_frame(&mut rx2).await;
        assert_eq!(read.op_code, "read");
        assert_eq!(read.message, "Jgnnq\"Yqtnf#");

        ctr1.shutdown().await.unwrap();
        ctr2.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_matched_caesar_pipelines_roundtrip() {
        let (mut ctr1, _rx1) = Controller::new();
        let (mut ctr2, mut rx2) = Controller::new();
        open_tcp_normal(
            &mut ctr1,
            18092,
            18093,
            vec![caesar_entry(-1), caesar_entry(3)],
        )
        .await;
        open_tcp_normal(
            &mut ctr2,
            18093,
            18092,
            vec![caesar_entry(-1), caesar_entry(3)],
        )
        .await;

        let reply = frame(
            &ctr1
                .dispatch(br#"{"OpCode":"write","Message":"Hello World!"}"#)
                .await,
        );
        assert_eq!(reply.message, "Message write success");

        let read = next_frame(&mut rx2).await;
        assert_eq!(read.message, "Hello World!");

        ctr1.shutdown().await.unwrap();
        ctr2.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_rejects_bad_config() {
        let (mut ctr, _rx) = Controller::new();

        let conf_raw = ctr.dispatch(br#"{"OpCode":"config"}"#).await;
        let mut conf: ConfigEnvelope = serde_json::from_slice(&conf_raw).unwrap();
        conf.op_code = "open".to_string();
        conf.channel.kind = "TcpNormal".to_string();
        conf.channel.data.tcp_normal.friend_ip.value = "not-an-ip".to_string();

        let reply = frame(&ctr.dispatch(&serde_json::to_vec(&conf).unwrap()).await);
        assert_eq!(reply.op_code, "error");
        assert!(reply.message.contains("invalid IPv4 address"));
    }

    #[tokio::test]
    async fn test_open_rejects_bad_processor() {
        let (mut ctr, _rx) = Controller::new();

        let conf_raw = ctr.dispatch(br#"{"OpCode":"config"}"#).await;
        let mut conf: ConfigEnvelope = serde_json::from_slice(&conf_raw).unwrap();
        conf.op_code = "open".to_string();
        conf.channel.kind = "TcpNormal".to_string();
        conf.channel.data.tcp_normal.friend_receive_port.value = 18094;
        conf.channel.data.tcp_normal.origin_receive_port.value = 18095;
        conf.processors = vec![caesar_entry(4000)];

        let reply = frame(&ctr.dispatch(&serde_json::to_vec(&conf).unwrap()).await);
        assert_eq!(reply.op_code, "error");
        assert!(reply.message.contains("out of range"));
    }

    #[test]
    fn test_build_processor_rejects_unknown_kind() {
        let entry = ProcessorEntry {
            kind: "Rot13".to_string(),
            data: ProcessorData::defaults(),
        };
        assert!(matches!(
            build_processor(&entry),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_build_processor_full_set() {
        for kind in [
            "None",
            "Caesar",
            "Checksum",
            "SymmetricEncryption",
            "AsymmetricEncryption",
            "GZipCompression",
            "ZLibCompression",
        ] {
            let entry = ProcessorEntry {
                kind: kind.to_string(),
                data: ProcessorData::defaults(),
            };
            let processor = build_processor(&entry).unwrap();
            assert_eq!(processor.tag(), kind);
        }
    }
}
