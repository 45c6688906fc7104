//! # Covert Channel Toolkit
//!
//! Transmits arbitrary byte streams between two cooperating peers by
//! encoding data into header fields and timing of otherwise-ordinary
//! network traffic (TCP/IP, UDP/IP, ICMP, HTTP).
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Controller (session lifecycle, JSON command dispatch)  │
//! ├─────────────────────────────────────────────────────────┤
//! │  Processors (caesar, checksum, AEAD, deflate, ...)      │
//! ├─────────────────────────────────────────────────────────┤
//! │  Channels (TcpHandshake, TcpSyn, UdpIP, IcmpIP, ...)    │
//! ├─────────────────────────────────────────────────────────┤
//! │  Embedders (seq, id, urgflg, ecn, temporal, ...)        │
//! ├─────────────────────────────────────────────────────────┤
//! │  Wire (raw IPv4 conduit / in-memory loopback)           │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Outbound data flows controller → processors (forward order) →
//! channel → embedder → conduit; inbound traffic is mirrored in reverse.
//!
//! A channel variant decides what the traffic looks like on the wire; an
//! embedder decides which header bits or inter-packet gaps carry the covert
//! payload; processors are invertible byte transforms applied around the
//! channel. The controller composes one channel with an ordered processor
//! pipeline and exposes a JSON command surface over an outbound queue.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod channel;
pub mod controller;
pub mod crypto;
pub mod embedder;
pub mod error;
pub mod packet;
pub mod processor;
pub mod wire;

pub use error::{Error, Result};

/// Capacity of each channel's inbound packet mailbox.
///
/// On overflow the oldest packet is dropped; a missed packet surfaces as a
/// decode error at the channel layer rather than blocking the wire reader.
pub const MAILBOX_CAPACITY: usize = 1024;

/// Size of the controller's per-read receive buffer.
pub const READ_BUFFER_SIZE: usize = 1024;

/// How long the controller waits for the receive loop to acknowledge
/// cancellation before abandoning its handle.
pub const CLOSE_WATCHDOG: std::time::Duration = std::time::Duration::from_secs(5);
