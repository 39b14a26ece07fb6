//! Packet layout and TCP framing
//!
//! ```text
//! TCP frame
//! ┌────────────────────┬──────────────┬───────────────────────────────────┐
//! │ 50 50 82 7D        │ length (u32) │ packet (length bytes)             │
//! └────────────────────┴──────────────┴───────────────────────────────────┘
//!
//! packet
//! ┌─────────┬──────────┬───────────┬──────────┬─────────────┐
//! │ command │ checksum │ sessionID │ replyID  │ payload     │
//! │ u16 LE  │ u16 LE   │ u16 LE    │ u16 LE   │ N bytes     │
//! └─────────┴──────────┴───────────┴──────────┴─────────────┘
//! ```

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::command::Command;
use crate::error::{Error, Result};

/// Magic bytes opening every TCP frame
pub const FRAME_MAGIC: [u8; 4] = [0x50, 0x50, 0x82, 0x7D];

/// Size of the TCP frame prefix (magic + length)
pub const FRAME_PREFIX_SIZE: usize = 8;

/// Largest frame the gateway accepts
pub const MAX_FRAME_SIZE: usize = 1 << 20;

/// Ones-complement checksum over the header (checksum field zeroed) and payload
///
/// Words are summed little-endian with end-around folding; an odd trailing
/// byte counts as a low byte.
pub fn checksum(command: u16, session_id: u16, reply_id: u16, payload: &[u8]) -> u16 {
    let fold = |sum: u32, word: u16| {
        let sum = sum + u32::from(word);
        if sum > 0xFFFF { sum - 0xFFFF } else { sum }
    };

    let mut sum = [command, 0, session_id, reply_id]
        .into_iter()
        .fold(0u32, fold);

    let mut words = payload.chunks_exact(2);
    for word in &mut words {
        sum = fold(sum, u16::from_le_bytes([word[0], word[1]]));
    }
    if let [last] = words.remainder() {
        sum = fold(sum, u16::from(*last));
    }

    !(sum as u16)
}

/// One protocol packet
#[derive(Clone, PartialEq, Eq)]
pub struct Packet {
    pub command: Command,
    pub session_id: u16,
    pub reply_id: u16,
    pub payload: Bytes,
}

impl Packet {
    /// Packet header size in bytes
    pub const HEADER_SIZE: usize = 8;

    pub fn new(command: Command, session_id: u16, reply_id: u16) -> Self {
        Self::with_payload(command, session_id, reply_id, Bytes::new())
    }

    pub fn with_payload(
        command: Command,
        session_id: u16,
        reply_id: u16,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            command,
            session_id,
            reply_id,
            payload: payload.into(),
        }
    }

    pub fn checksum(&self) -> u16 {
        checksum(
            self.command.into(),
            self.session_id,
            self.reply_id,
            &self.payload,
        )
    }

    /// Encode header and payload
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(Self::HEADER_SIZE + self.payload.len());
        buf.put_u16_le(self.command.into());
        buf.put_u16_le(self.checksum());
        buf.put_u16_le(self.session_id);
        buf.put_u16_le(self.reply_id);
        buf.put_slice(&self.payload);
        buf
    }

    /// Encode with the TCP frame prefix
    ///
    /// # Examples
    ///
    /// ```
    /// use zkattend_gateway::zk::{Command, Packet};
    ///
    /// let frame = Packet::new(Command::Connect, 0, 0).encode_frame();
    /// assert_eq!(&frame[..4], &[0x50, 0x50, 0x82, 0x7D]);
    /// assert_eq!(frame.len(), 16);
    /// ```
    pub fn encode_frame(&self) -> BytesMut {
        let packet = self.encode();
        let mut buf = BytesMut::with_capacity(FRAME_PREFIX_SIZE + packet.len());
        buf.put_slice(&FRAME_MAGIC);
        buf.put_u32_le(packet.len() as u32);
        buf.put_slice(&packet);
        buf
    }

    /// Packet length announced by a frame prefix
    pub fn frame_len(prefix: &[u8; FRAME_PREFIX_SIZE]) -> Result<usize> {
        if prefix[..4] != FRAME_MAGIC {
            return Err(Error::BadFrame(format!(
                "missing magic, got {}",
                hex::encode(&prefix[..4])
            )));
        }

        let len = u32::from_le_bytes([prefix[4], prefix[5], prefix[6], prefix[7]]) as usize;
        if !(Self::HEADER_SIZE..=MAX_FRAME_SIZE).contains(&len) {
            return Err(Error::BadFrame(format!("impossible packet length {}", len)));
        }
        Ok(len)
    }

    /// Decode header and payload, verifying the checksum
    pub fn decode(mut buf: Bytes) -> Result<Self> {
        if buf.len() < Self::HEADER_SIZE {
            return Err(Error::PacketTooShort {
                expected: Self::HEADER_SIZE,
                actual: buf.len(),
            });
        }

        let command = Command::try_from(buf.get_u16_le())?;
        let received = buf.get_u16_le();
        let session_id = buf.get_u16_le();
        let reply_id = buf.get_u16_le();

        let packet = Self::with_payload(command, session_id, reply_id, buf);

        let expected = packet.checksum();
        if expected != received {
            return Err(Error::ChecksumMismatch { expected, received });
        }

        Ok(packet)
    }

    pub fn is_success(&self) -> bool {
        self.command.is_success()
    }

    /// Payload up to the first NUL, lossily decoded
    pub fn payload_text(&self) -> String {
        let end = self
            .payload
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.payload.len());
        String::from_utf8_lossy(&self.payload[..end]).trim().to_string()
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("command", &self.command)
            .field("session_id", &format!("0x{:04X}", self.session_id))
            .field("reply_id", &format!("0x{:04X}", self.reply_id))
            .field("payload_len", &self.payload.len())
            .finish()
    }
}
