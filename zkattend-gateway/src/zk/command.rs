//! ZKTeco command codes used by the gateway

use std::fmt;

use crate::error::{Error, Result};

/// Protocol command codes
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Command {
    // Session
    Connect = 1000,
    Exit = 1001,
    EnableDevice = 1002,
    DisableDevice = 1003,
    Restart = 1004,
    RefreshData = 1013,
    GetVersion = 1100,
    Auth = 1102,

    // Buffered transfer
    PrepareData = 1500,
    Data = 1501,
    FreeData = 1502,
    PrepareBuffer = 1503,
    ReadBuffer = 1504,

    // Database
    UserWrq = 8,
    UserTempRrq = 9,
    OptionsRrq = 11,
    AttLogRrq = 13,
    GetFreeSizes = 50,
    SetTime = 202,
    RegEvent = 500,

    // Responses
    AckOk = 2000,
    AckError = 2001,
    AckData = 2002,
    AckRetry = 2003,
    AckRepeat = 2004,
    AckUnauth = 2005,
    AckUnknown = 0xFFFF,
    AckErrorCmd = 0xFFFD,
    AckErrorInit = 0xFFFC,
    AckErrorData = 0xFFFB,
}

impl Command {
    /// Check if this is a success response
    pub fn is_success(self) -> bool {
        matches!(self, Self::AckOk | Self::AckData)
    }

    /// Check if this is an error response
    pub fn is_error(self) -> bool {
        matches!(
            self,
            Self::AckError
                | Self::AckUnknown
                | Self::AckErrorCmd
                | Self::AckErrorInit
                | Self::AckErrorData
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Connect => "CMD_CONNECT",
            Self::Exit => "CMD_EXIT",
            Self::EnableDevice => "CMD_ENABLEDEVICE",
            Self::DisableDevice => "CMD_DISABLEDEVICE",
            Self::Restart => "CMD_RESTART",
            Self::RefreshData => "CMD_REFRESHDATA",
            Self::GetVersion => "CMD_GET_VERSION",
            Self::Auth => "CMD_AUTH",
            Self::PrepareData => "CMD_PREPARE_DATA",
            Self::Data => "CMD_DATA",
            Self::FreeData => "CMD_FREE_DATA",
            Self::PrepareBuffer => "CMD_PREPARE_BUFFER",
            Self::ReadBuffer => "CMD_READ_BUFFER",
            Self::UserWrq => "CMD_USER_WRQ",
            Self::UserTempRrq => "CMD_USERTEMP_RRQ",
            Self::OptionsRrq => "CMD_OPTIONS_RRQ",
            Self::AttLogRrq => "CMD_ATTLOG_RRQ",
            Self::GetFreeSizes => "CMD_GET_FREE_SIZES",
            Self::SetTime => "CMD_SET_TIME",
            Self::RegEvent => "CMD_REG_EVENT",
            Self::AckOk => "CMD_ACK_OK",
            Self::AckError => "CMD_ACK_ERROR",
            Self::AckData => "CMD_ACK_DATA",
            Self::AckRetry => "CMD_ACK_RETRY",
            Self::AckRepeat => "CMD_ACK_REPEAT",
            Self::AckUnauth => "CMD_ACK_UNAUTH",
            Self::AckUnknown => "CMD_ACK_UNKNOWN",
            Self::AckErrorCmd => "CMD_ACK_ERROR_CMD",
            Self::AckErrorInit => "CMD_ACK_ERROR_INIT",
            Self::AckErrorData => "CMD_ACK_ERROR_DATA",
        }
    }
}

impl From<Command> for u16 {
    fn from(cmd: Command) -> u16 {
        cmd as u16
    }
}

impl TryFrom<u16> for Command {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self> {
        let command = match value {
            1000 => Self::Connect,
            1001 => Self::Exit,
            1002 => Self::EnableDevice,
            1003 => Self::DisableDevice,
            1004 => Self::Restart,
            1013 => Self::RefreshData,
            1100 => Self::GetVersion,
            1102 => Self::Auth,
            1500 => Self::PrepareData,
            1501 => Self::Data,
            1502 => Self::FreeData,
            1503 => Self::PrepareBuffer,
            1504 => Self::ReadBuffer,
            8 => Self::UserWrq,
            9 => Self::UserTempRrq,
            11 => Self::OptionsRrq,
            13 => Self::AttLogRrq,
            50 => Self::GetFreeSizes,
            202 => Self::SetTime,
            500 => Self::RegEvent,
            2000 => Self::AckOk,
            2001 => Self::AckError,
            2002 => Self::AckData,
            2003 => Self::AckRetry,
            2004 => Self::AckRepeat,
            2005 => Self::AckUnauth,
            0xFFFF => Self::AckUnknown,
            0xFFFD => Self::AckErrorCmd,
            0xFFFC => Self::AckErrorInit,
            0xFFFB => Self::AckErrorData,
            _ => return Err(Error::UnknownCommand(value)),
        };
        Ok(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), *self as u16)
    }
}
