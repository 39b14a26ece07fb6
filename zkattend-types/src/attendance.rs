//! Attendance punch records

use chrono::NaiveDateTime;

/// Punch mode reported by the terminal with each record
///
/// The codes are device-defined; unknown values are carried through untouched
/// so they still land in exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PunchMode {
    CheckIn,
    CheckOut,
    BreakOut,
    BreakIn,
    OvertimeIn,
    OvertimeOut,
    Other(u8),
}

impl PunchMode {
    /// Numeric code as stored on the device
    pub fn code(self) -> u8 {
        match self {
            Self::CheckIn => 0,
            Self::CheckOut => 1,
            Self::BreakOut => 2,
            Self::BreakIn => 3,
            Self::OvertimeIn => 4,
            Self::OvertimeOut => 5,
            Self::Other(code) => code,
        }
    }
}

impl From<u8> for PunchMode {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::CheckIn,
            1 => Self::CheckOut,
            2 => Self::BreakOut,
            3 => Self::BreakIn,
            4 => Self::OvertimeIn,
            5 => Self::OvertimeOut,
            other => Self::Other(other),
        }
    }
}

impl From<PunchMode> for u8 {
    fn from(mode: PunchMode) -> u8 {
        mode.code()
    }
}

/// One punch as stored on the terminal
///
/// Timestamps are in the terminal's local clock; no zone is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceRecord {
    pub user_id: String,
    pub timestamp: NaiveDateTime,
    pub status: u8,
    pub punch: PunchMode,
}

impl AttendanceRecord {
    pub fn new(
        user_id: impl Into<String>,
        timestamp: NaiveDateTime,
        status: u8,
        punch: impl Into<PunchMode>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            timestamp,
            status,
            punch: punch.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_punch_mode_codes() {
        for code in 0..=u8::MAX {
            assert_eq!(PunchMode::from(code).code(), code);
        }
        assert_eq!(PunchMode::from(1), PunchMode::CheckOut);
        assert_eq!(PunchMode::from(255), PunchMode::Other(255));
    }
}
