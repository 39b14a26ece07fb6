//! Device information structures

use std::fmt;

/// Identity of a terminal as reported by the terminal itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Device name (user-assigned on the terminal)
    pub name: String,
    
    /// Device serial number
    pub serial_number: String,
    
    /// Firmware version
    pub firmware_version: String,
}

impl DeviceInfo {
    pub fn new(
        name: impl Into<String>,
        serial_number: impl Into<String>,
        firmware_version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            serial_number: serial_number.into(),
            firmware_version: firmware_version.into(),
        }
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Device[{}, SN: {}, FW: {}]",
            self.name, self.serial_number, self.firmware_version
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_info_display() {
        let info = DeviceInfo::new("K40", "A6F1201", "Ver 6.60 Apr 2020");
        assert_eq!(info.to_string(), "Device[K40, SN: A6F1201, FW: Ver 6.60 Apr 2020]");
    }
}
