//! ZKTeco binding of the gateway traits
//!
//! Terminals speak a request/reply protocol over TCP port 4370. Each request
//! carries the session id handed out by `CMD_CONNECT` and an incrementing
//! reply id; tables larger than one packet are pulled through the terminal's
//! transfer buffer.

pub mod codec;
pub mod command;
pub mod commkey;
pub mod link;
pub mod packet;
pub mod session;

pub use command::Command;
pub use packet::Packet;
pub use session::ZkSession;

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use zkattend_types::DeviceDescriptor;

use crate::error::Result;
use crate::{DeviceSession, Gateway};

/// Default TCP port of ZKTeco terminals
pub const DEFAULT_PORT: u16 = 4370;

/// Opens [`ZkSession`]s over TCP
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use zkattend_gateway::ZkGateway;
///
/// let gateway = ZkGateway::new()
///     .with_port(4370)
///     .with_timeout(Duration::from_secs(10))
///     .with_password(12345);
/// assert_eq!(gateway.port(), 4370);
/// ```
#[derive(Debug, Clone)]
pub struct ZkGateway {
    port: u16,
    connect_timeout: Duration,
    read_timeout: Duration,
    password: u32,
}

impl ZkGateway {
    pub fn new() -> Self {
        Self {
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(5),
            password: 0,
        }
    }

    /// Port used for devices that do not name their own
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set both the connect and the per-reply timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self.read_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set CommKey password (default: 0)
    pub fn with_password(mut self, password: u32) -> Self {
        self.password = password;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Default for ZkGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Gateway for ZkGateway {
    async fn connect(&self, device: &DeviceDescriptor) -> Result<Box<dyn DeviceSession>> {
        let addr = SocketAddr::V4(device.socket_addr(self.port));
        info!("Connecting to {} at {}...", device.name, addr);

        let link = link::TcpLink::connect(addr, self.connect_timeout, self.read_timeout).await?;
        let session = ZkSession::handshake(link, self.password).await?;
        Ok(Box::new(session))
    }
}

#[cfg(test)]
mod tests;
