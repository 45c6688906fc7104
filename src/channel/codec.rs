//! Message framing and the mask-schedule accumulator.
//!
//! Covert messages are framed with an 8-byte little-endian length prefix;
//! the framed bytes then walk the embedder's mask schedule, one schedule
//! slot per packet. The sender plans the walk up front; the receiver ORs
//! extracted fragments into the current byte until its coverage is
//! complete, first for the prefix, then for the body.

use std::time::Duration;

use crate::embedder::{mask_shift, Embedder};
use crate::error::{Error, Result};
use crate::packet::{Ipv4Header, TransportHeader};

/// Length of the little-endian message-length prefix.
pub(crate) const LENGTH_PREFIX_LEN: usize = 8;

/// Upper bound on a decoded message body. A length prefix beyond this is
/// treated as corruption (e.g. a dropped packet shifting the schedule)
/// rather than an instruction to buffer gigabytes.
pub(crate) const MAX_MESSAGE_LEN: usize = 1 << 20;

/// Prefix `data` with its length.
pub(crate) fn frame_message(data: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(LENGTH_PREFIX_LEN + data.len());
    framed.extend_from_slice(&(data.len() as u64).to_le_bytes());
    framed.extend_from_slice(data);
    framed
}

/// One planned packet: which framed byte it carries and at which schedule
/// position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Slot {
    /// Index into the framed message
    pub byte: usize,
    /// Index into the embedder's mask schedule
    pub mask_index: usize,
}

/// Plan the packet sequence for a framed message of `framed_len` bytes.
pub(crate) fn plan_slots(embedder: &Embedder, framed_len: usize) -> Vec<Slot> {
    let mask = embedder.mask();
    let mut slots = Vec::new();
    let mut cursor = 0usize;
    for byte in 0..framed_len {
        let mut covered = 0u8;
        while covered != 0xFF {
            let index = cursor % mask.len();
            covered |= mask[index] << mask_shift(mask, index);
            slots.push(Slot {
                byte,
                mask_index: index,
            });
            cursor += 1;
        }
    }
    slots
}

/// Streaming decoder: absorbs one packet at a time and yields the message
/// once the length prefix and body are complete.
pub(crate) struct MessageDecoder {
    embedder: Embedder,
    cursor: usize,
    acc: u8,
    covered: u8,
    bytes: Vec<u8>,
    body_len: Option<usize>,
}

impl MessageDecoder {
    pub(crate) fn new(embedder: Embedder) -> Self {
        Self {
            embedder,
            cursor: 0,
            acc: 0,
            covered: 0,
            bytes: Vec::new(),
            body_len: None,
        }
    }

    /// Absorb one captured packet. Returns the completed message body, or
    /// `None` if more packets are needed.
    ///
    /// An [`Error::EmbedderReject`] leaves the schedule cursor untouched so
    /// the caller can retry with the next packet.
    pub(crate) fn absorb(
        &mut self,
        ipv4: &Ipv4Header,
        transport: &TransportHeader,
        gap: Duration,
    ) -> Result<Option<Vec<u8>>> {
        let mask = self.embedder.mask();
        let index = self.cursor % mask.len();
        let fragment = self.embedder.get_byte(ipv4, transport, gap, index)?;

        self.acc |= fragment;
        self.covered |= mask[index] << mask_shift(mask, index);
        self.cursor += 1;

        if self.covered != 0xFF {
            return Ok(None);
        }
        self.bytes.push(self.acc);
        self.acc = 0;
        self.covered = 0;

        match self.body_len {
            None => {
                if self.bytes.len() == LENGTH_PREFIX_LEN {
                    let len = u64::from_le_bytes(
                        self.bytes[..].try_into().expect("8-byte length prefix"),
                    );
                    if len > MAX_MESSAGE_LEN as u64 {
                        return Err(Error::invalid(format!(
                            "decoded length prefix {} exceeds the {} byte cap",
                            len, MAX_MESSAGE_LEN
                        )));
                    }
                    self.body_len = Some(len as usize);
                    self.bytes.clear();
                    if len == 0 {
                        return Ok(Some(Vec::new()));
                    }
                }
                Ok(None)
            }
            Some(len) => {
                if self.bytes.len() == len {
                    Ok(Some(std::mem::take(&mut self.bytes)))
                } else {
                    Ok(None)
                }
            }
        }
    }
}
