//! Terminal addressing

use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};

use crate::error::{Error, Result};

/// A named terminal on the network
///
/// The name doubles as the artifact file prefix, so it must be non-empty and
/// free of path separators.
///
/// # Examples
///
/// ```
/// use zkattend_types::DeviceDescriptor;
///
/// let device = DeviceDescriptor::parse("HeadOffice", "10.10.10.201").unwrap();
/// assert_eq!(device.socket_addr(4370).to_string(), "10.10.10.201:4370");
///
/// let device = DeviceDescriptor::parse("Annex", "10.0.0.9:5005").unwrap();
/// assert_eq!(device.socket_addr(4370).port(), 5005);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub name: String,
    pub address: Ipv4Addr,
    /// Overrides the configured default port when set
    pub port: Option<u16>,
}

impl DeviceDescriptor {
    pub fn new(name: impl Into<String>, address: Ipv4Addr) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self {
            name,
            address,
            port: None,
        })
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Build a descriptor from operator or configuration text
    ///
    /// Accepts `a.b.c.d` or `a.b.c.d:port`.
    pub fn parse(name: impl Into<String>, address: &str) -> Result<Self> {
        let address = address.trim();
        let (host, port) = match address.split_once(':') {
            Some((host, port)) => {
                let port: u16 = port
                    .parse()
                    .map_err(|_| Error::Parse(format!("invalid port in '{}'", address)))?;
                if port == 0 {
                    return Err(Error::Validation("port cannot be 0".into()));
                }
                (host, Some(port))
            }
            None => (address, None),
        };

        let ip: Ipv4Addr = host
            .parse()
            .map_err(|_| Error::Parse(format!("invalid IPv4 address '{}'", host)))?;

        let mut device = Self::new(name, ip)?;
        device.port = port;
        Ok(device)
    }

    /// Socket address to dial, falling back to `default_port`
    pub fn socket_addr(&self, default_port: u16) -> SocketAddrV4 {
        SocketAddrV4::new(self.address, self.port.unwrap_or(default_port))
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{} ({}:{})", self.name, self.address, port),
            None => write!(f, "{} ({})", self.name, self.address),
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::Validation("device name cannot be empty".into()));
    }
    if name.contains(['/', '\\']) {
        return Err(Error::Validation(format!(
            "device name '{}' cannot contain path separators",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_plain_address() {
        let device = DeviceDescriptor::parse("MaadiBranch", " 196.202.19.227 ").unwrap();
        assert_eq!(device.name, "MaadiBranch");
        assert_eq!(device.address, Ipv4Addr::new(196, 202, 19, 227));
        assert_eq!(device.port, None);
        assert_eq!(device.to_string(), "MaadiBranch (196.202.19.227)");
    }

    #[test]
    fn test_parse_address_with_port() {
        let device = DeviceDescriptor::parse("Gate", "192.168.1.201:4371").unwrap();
        assert_eq!(device.port, Some(4371));
        assert_eq!(
            device.socket_addr(4370),
            "192.168.1.201:4371".parse::<SocketAddrV4>().unwrap()
        );
    }

    #[test]
    fn test_default_port_applies() {
        let device = DeviceDescriptor::new("Gate", Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        assert_eq!(device.socket_addr(4370).port(), 4370);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            DeviceDescriptor::parse("Gate", "10.0.0"),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            DeviceDescriptor::parse("Gate", "10.0.0.1:http"),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            DeviceDescriptor::parse("Gate", "10.0.0.1:0"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            DeviceDescriptor::parse("  ", "10.0.0.1"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            DeviceDescriptor::parse("../etc", "10.0.0.1"),
            Err(Error::Validation(_))
        ));
    }
}
