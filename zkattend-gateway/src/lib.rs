//! # zkattend-gateway
//!
//! Device session gateway for time-clock terminals.
//!
//! The rest of the workspace talks to terminals only through the two traits
//! defined here:
//! - [`Gateway`] opens a session with one terminal
//! - [`DeviceSession`] exposes the capability calls on an open session
//!
//! [`zk::ZkGateway`] binds these traits to ZKTeco terminals over TCP.
//!
//! ## Quick Start
//!
//! ```no_run
//! use zkattend_gateway::{Gateway, ZkGateway};
//! use zkattend_types::DeviceDescriptor;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gateway = ZkGateway::new();
//!     let device = DeviceDescriptor::parse("HeadOffice", "192.168.1.201")?;
//!
//!     let mut session = gateway.connect(&device).await?;
//!     session.disable().await?;
//!     let logs = session.list_attendance().await;
//!     session.enable().await?;
//!     session.close().await?;
//!
//!     println!("{} records", logs?.len());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod zk;

pub use error::{Error, Result};
pub use zk::ZkGateway;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use zkattend_types::{AttendanceRecord, DeviceDescriptor, DeviceInfo, UserRecord};

/// Opens sessions with terminals
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Establish a session with `device`
    ///
    /// Fails on timeout, unreachable host, or a handshake the terminal rejects.
    async fn connect(&self, device: &DeviceDescriptor) -> Result<Box<dyn DeviceSession>>;
}

/// Capability calls on one open terminal session
///
/// Every call may fail independently. Callers own the session lifecycle and
/// must call [`DeviceSession::close`] on every exit path.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait DeviceSession: Send {
    /// Suspend normal scanning so a read/write burst sees a stable log
    async fn disable(&mut self) -> Result<()>;

    /// Resume normal scanning
    async fn enable(&mut self) -> Result<()>;

    /// Full attendance log, in device storage order
    async fn list_attendance(&mut self) -> Result<Vec<AttendanceRecord>>;

    /// All enrolled users
    async fn list_users(&mut self) -> Result<Vec<UserRecord>>;

    /// Set the terminal clock
    async fn set_clock(&mut self, at: NaiveDateTime) -> Result<()>;

    /// Reboot the terminal; the session is unusable afterwards except for `close`
    async fn restart(&mut self) -> Result<()>;

    /// Enroll `user`, updating it in place if the user id already exists
    async fn create_user(&mut self, user: &UserRecord) -> Result<()>;

    /// Remove one attendance record
    async fn delete_attendance(&mut self, record: &AttendanceRecord) -> Result<()>;

    /// Name, serial number and firmware version
    async fn device_info(&mut self) -> Result<DeviceInfo>;

    /// End the session
    async fn close(&mut self) -> Result<()>;
}
