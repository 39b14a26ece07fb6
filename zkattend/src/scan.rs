//! Naive subnet probing for terminals
//!
//! Hosts are probed one at a time in ascending order with a short TCP
//! connect, so a /24 takes roughly 256 × the probe timeout.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, trace};

use crate::error::{Error, Result};

/// An IPv4 CIDR block
///
/// # Examples
///
/// ```
/// use zkattend::scan::SubnetBlock;
///
/// let block: SubnetBlock = "192.168.1.0/30".parse().unwrap();
/// let hosts: Vec<String> = block.addresses().map(|a| a.to_string()).collect();
/// assert_eq!(hosts, ["192.168.1.0", "192.168.1.1", "192.168.1.2", "192.168.1.3"]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubnetBlock {
    network: Ipv4Addr,
    prefix_len: u8,
}

impl SubnetBlock {
    /// Build a block, rejecting set host bits
    pub fn new(network: Ipv4Addr, prefix_len: u8) -> Result<Self> {
        if prefix_len > 32 {
            return Err(Error::Input(format!("prefix length {} exceeds 32", prefix_len)));
        }
        let block = Self {
            network,
            prefix_len,
        };
        if u32::from(network) & !block.mask() != 0 {
            return Err(Error::Input(format!(
                "{}/{} has host bits set",
                network, prefix_len
            )));
        }
        Ok(block)
    }

    fn mask(&self) -> u32 {
        if self.prefix_len == 0 {
            0
        } else {
            u32::MAX << (32 - self.prefix_len)
        }
    }

    /// Number of addresses in the block, network and broadcast included
    pub fn size(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix_len))
    }

    /// Every address in the block, ascending
    pub fn addresses(&self) -> Addresses {
        let first = u32::from(self.network);
        Addresses(first..=first | !self.mask())
    }
}

impl FromStr for SubnetBlock {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (addr, prefix) = s
            .split_once('/')
            .ok_or_else(|| Error::Input(format!("'{}' is not in a.b.c.d/n form", s)))?;
        let network: Ipv4Addr = addr
            .parse()
            .map_err(|_| Error::Input(format!("invalid network address '{}'", addr)))?;
        let prefix_len: u8 = prefix
            .parse()
            .map_err(|_| Error::Input(format!("invalid prefix length '{}'", prefix)))?;
        Self::new(network, prefix_len)
    }
}

impl fmt::Display for SubnetBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

/// Remaining addresses of a block; resumable between prompts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Addresses(RangeInclusive<u32>);

impl Iterator for Addresses {
    type Item = Ipv4Addr;

    fn next(&mut self) -> Option<Ipv4Addr> {
        self.0.next().map(Ipv4Addr::from)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

/// Reachability check for one host
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, addr: Ipv4Addr) -> bool;
}

/// Probes by opening (and immediately dropping) a TCP connection
#[derive(Debug, Clone)]
pub struct TcpProber {
    port: u16,
    timeout: Duration,
}

impl TcpProber {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, addr: Ipv4Addr) -> bool {
        let target = SocketAddrV4::new(addr, self.port);
        match timeout(self.timeout, TcpStream::connect(target)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                trace!("{} refused: {}", target, e);
                false
            }
            Err(_) => false,
        }
    }
}

/// Probe `remaining` in order until a host answers
///
/// Returns `None` once the block is exhausted.
pub async fn next_responder(prober: &dyn Prober, remaining: &mut Addresses) -> Option<Ipv4Addr> {
    for addr in remaining.by_ref() {
        debug!("Probing {}", addr);
        if prober.probe(addr).await {
            info!("Found active device at {}", addr);
            return Some(addr);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::Sequence;
    use pretty_assertions::assert_eq;
    use tokio::net::TcpListener;

    #[test]
    fn test_parse_and_enumerate() {
        let block: SubnetBlock = " 10.1.2.0/24 ".parse().unwrap();
        assert_eq!(block.size(), 256);
        let all: Vec<_> = block.addresses().collect();
        assert_eq!(all.len(), 256);
        assert_eq!(all[0], Ipv4Addr::new(10, 1, 2, 0));
        assert_eq!(all[255], Ipv4Addr::new(10, 1, 2, 255));

        let single: SubnetBlock = "10.1.2.3/32".parse().unwrap();
        assert_eq!(
            single.addresses().collect::<Vec<_>>(),
            vec![Ipv4Addr::new(10, 1, 2, 3)]
        );

        let everything: SubnetBlock = "0.0.0.0/0".parse().unwrap();
        assert_eq!(everything.size(), 1 << 32);
        assert_eq!(everything.addresses().next(), Some(Ipv4Addr::UNSPECIFIED));
    }

    #[test]
    fn test_rejects_malformed_blocks() {
        for input in ["10.1.2.0", "10.1.2.0/33", "10.1.2/24", "10.1.2.0/x", "10.1.2.1/24"] {
            assert!(
                matches!(input.parse::<SubnetBlock>(), Err(Error::Input(_))),
                "{} should be rejected",
                input
            );
        }
    }

    #[tokio::test]
    async fn test_slash_30_probes_in_order() {
        let block: SubnetBlock = "192.168.1.0/30".parse().unwrap();
        let mut seq = Sequence::new();
        let mut prober = MockProber::new();
        for last in 0..4u8 {
            prober
                .expect_probe()
                .withf(move |addr| *addr == Ipv4Addr::new(192, 168, 1, last))
                .times(1)
                .in_sequence(&mut seq)
                .returning(move |_| last == 1 || last == 3);
        }

        let mut remaining = block.addresses();
        assert_eq!(
            next_responder(&prober, &mut remaining).await,
            Some(Ipv4Addr::new(192, 168, 1, 1))
        );
        assert_eq!(
            next_responder(&prober, &mut remaining).await,
            Some(Ipv4Addr::new(192, 168, 1, 3))
        );
        assert_eq!(next_responder(&prober, &mut remaining).await, None);
    }

    #[tokio::test]
    async fn test_tcp_prober() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let prober = TcpProber::new(port, Duration::from_secs(1));
        assert!(prober.probe(Ipv4Addr::LOCALHOST).await);

        drop(listener);
        assert!(!prober.probe(Ipv4Addr::LOCALHOST).await);
    }
}
