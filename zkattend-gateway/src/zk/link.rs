//! Framed TCP link to one terminal

use std::net::SocketAddr;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use super::packet::{FRAME_PREFIX_SIZE, Packet};
use crate::error::{Error, Result};

/// TCP stream carrying framed packets
pub struct TcpLink {
    addr: SocketAddr,
    stream: Option<TcpStream>,
    read_timeout: Duration,
}

impl TcpLink {
    /// Dial `addr`, giving up after `connect_timeout`
    pub async fn connect(
        addr: SocketAddr,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self> {
        debug!("Connecting to {}...", addr);

        let stream = timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::ConnectionTimeout)??;

        stream.set_nodelay(true)?;

        debug!("Connected to {}", addr);

        Ok(Self {
            addr,
            stream: Some(stream),
            read_timeout,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    pub async fn send(&mut self, packet: &Packet) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        let frame = packet.encode_frame();
        trace!("Sending {:?}: {}", packet, hex::encode(&frame[..frame.len().min(24)]));

        stream.write_all(&frame).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Read one framed packet
    pub async fn receive(&mut self) -> Result<Packet> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        let read = async {
            let mut prefix = [0u8; FRAME_PREFIX_SIZE];
            stream.read_exact(&mut prefix).await?;
            let len = Packet::frame_len(&prefix)?;

            let mut body = BytesMut::zeroed(len);
            stream.read_exact(&mut body).await?;
            Ok::<Bytes, Error>(body.freeze())
        };

        let body = timeout(self.read_timeout, read)
            .await
            .map_err(|_| Error::ReadTimeout)?
            .map_err(|e| match e {
                Error::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                    Error::ConnectionClosed
                }
                other => other,
            })?;

        let packet = Packet::decode(body)?;
        trace!("Received {:?}", packet);
        Ok(packet)
    }

    pub async fn shutdown(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            debug!("Disconnecting from {}...", self.addr);
            if let Err(e) = stream.shutdown().await {
                debug!("Shutdown of {} failed: {}", self.addr, e);
            }
        }
    }
}

impl Drop for TcpLink {
    fn drop(&mut self) {
        if self.stream.is_some() {
            warn!("TcpLink to {} dropped while still open", self.addr);
        }
    }
}
