//! Type definitions for zkattend

pub mod attendance;
pub mod device;
pub mod device_info;
pub mod error;
pub mod user;

pub use attendance::{AttendanceRecord, PunchMode};
pub use device::DeviceDescriptor;
pub use device_info::DeviceInfo;
pub use error::{Error, Result};
pub use user::{Privilege, UserRecord};
