//! Gateway errors

use std::io;

use crate::zk::Command;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not connected")]
    NotConnected,

    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("Read timeout")]
    ReadTimeout,

    #[error("Connection closed by remote")]
    ConnectionClosed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Packet is too short to be valid
    #[error("Packet too short: expected at least {expected} bytes, got {actual} bytes")]
    PacketTooShort { expected: usize, actual: usize },

    /// TCP frame prefix is missing or carries an impossible length
    #[error("Bad frame: {0}")]
    BadFrame(String),

    #[error("Checksum mismatch: expected 0x{expected:04X}, received 0x{received:04X}")]
    ChecksumMismatch { expected: u16, received: u16 },

    #[error("Unknown command code: {0}")]
    UnknownCommand(u16),

    #[error("Authentication failed - invalid password")]
    AuthenticationFailed,

    #[error("{command} rejected by device with {response}")]
    DeviceRejected { command: Command, response: Command },

    #[error("Unexpected response to {command}: {response}")]
    UnexpectedResponse { command: Command, response: Command },

    /// Device data could not be decoded into records
    #[error("Malformed device data: {0}")]
    Decode(String),

    /// A record cannot be represented in the device's storage format
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Operation not supported: {0}")]
    NotSupported(String),
}

impl Error {
    /// Check if the error came from the network rather than the device
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::NotConnected
                | Self::ConnectionTimeout
                | Self::ReadTimeout
                | Self::ConnectionClosed
                | Self::Io(_)
        )
    }
}
