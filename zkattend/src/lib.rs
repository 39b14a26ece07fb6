//! # zkattend
//!
//! Attendance extraction and maintenance for ZKTeco time-clock terminals.
//!
//! - [`extract`] holds the device workflows (fetch to CSV, backup, delete,
//!   clock sync, restart, enrollment, live tail)
//! - [`console`] drives them from numbered menus
//! - [`registry`] and [`scan`] decide which terminal to talk to
//!
//! Terminals are reached only through the [`zkattend_gateway`] traits.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//!
//! use zkattend::extract::{FetchOutcome, fetch_attendance};
//! use zkattend_gateway::ZkGateway;
//! use zkattend_types::DeviceDescriptor;
//!
//! #[tokio::main]
//! async fn main() -> zkattend::Result<()> {
//!     let gateway = ZkGateway::new();
//!     let device = DeviceDescriptor::parse("HeadOffice", "10.10.10.201")?;
//!     let now = chrono::Local::now().naive_local();
//!
//!     match fetch_attendance(&gateway, &device, Path::new("."), now).await? {
//!         FetchOutcome::Saved { path, count } => {
//!             println!("{} rows in {}", count, path.display())
//!         }
//!         FetchOutcome::Empty => println!("nothing this period"),
//!     }
//!     Ok(())
//! }
//! ```

pub mod backup;
pub mod config;
pub mod console;
pub mod error;
pub mod export;
pub mod extract;
pub mod interrupt;
pub mod logging;
pub mod period;
pub mod registry;
pub mod scan;
pub mod schedule;
pub mod session;

pub use error::{Error, Result};
