//! Backup snapshots

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::ser::{PrettyFormatter, Serializer};

use zkattend_types::{AttendanceRecord, UserRecord};

use crate::error::{Error, Result};
use crate::export::TIMESTAMP_FORMAT;

/// Full dump of one terminal's users and attendance log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSnapshot {
    pub users: Vec<BackupUser>,
    pub logs: Vec<BackupLog>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupUser {
    pub user_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupLog {
    pub user_id: String,
    /// `YYYY-MM-DD HH:MM:SS`
    pub timestamp: String,
    pub status: u8,
    pub punch: u8,
}

impl BackupLog {
    /// Parse the timestamp back into the device-local time
    pub fn timestamp(&self) -> Result<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.timestamp, TIMESTAMP_FORMAT)
            .map_err(|e| Error::Input(format!("timestamp '{}': {}", self.timestamp, e)))
    }
}

impl From<&UserRecord> for BackupUser {
    fn from(user: &UserRecord) -> Self {
        Self {
            user_id: user.user_id.clone(),
            name: user.name.clone(),
        }
    }
}

impl From<&AttendanceRecord> for BackupLog {
    fn from(record: &AttendanceRecord) -> Self {
        Self {
            user_id: record.user_id.clone(),
            timestamp: record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            status: record.status,
            punch: record.punch.code(),
        }
    }
}

impl BackupSnapshot {
    pub fn new(users: &[UserRecord], logs: &[AttendanceRecord]) -> Self {
        Self {
            users: users.iter().map(BackupUser::from).collect(),
            logs: logs.iter().map(BackupLog::from).collect(),
        }
    }

    /// Serialize as JSON with four-space indentation
    pub fn to_writer(&self, out: impl Write) -> serde_json::Result<()> {
        let mut serializer = Serializer::with_formatter(out, PrettyFormatter::with_indent(b"    "));
        self.serialize(&mut serializer)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut buf = Vec::new();
        self.to_writer(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Input(format!("backup snapshot: {}", e)))
    }

    /// Write the snapshot to `path`, replacing any previous file
    pub fn write(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(Error::file_write(path))?;
        let mut out = BufWriter::new(file);
        self.to_writer(&mut out)
            .map_err(|e| Error::FileWrite {
                path: path.to_path_buf(),
                source: e.into(),
            })?;
        out.flush().map_err(Error::file_write(path))
    }
}
