//! CSV attendance artifacts

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::NaiveDate;

use zkattend_types::AttendanceRecord;

use crate::error::{Error, Result};

pub const CSV_HEADER: &str = "UserID,DateTime,Status,InOutMode";

/// Timestamp layout used in every artifact
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `<name>_<YYYY-MM-DD>.csv`
pub fn csv_file_name(device: &str, day: NaiveDate) -> String {
    format!("{}_{}.csv", device, day.format("%Y-%m-%d"))
}

/// `<name>_backup_<YYYY-MM-DD>.json`
pub fn backup_file_name(device: &str, day: NaiveDate) -> String {
    format!("{}_backup_{}.json", device, day.format("%Y-%m-%d"))
}

/// One CSV row, without the line terminator
///
/// Fields are written verbatim; nothing is quoted.
pub fn csv_row(record: &AttendanceRecord) -> String {
    format!(
        "{},{},{},{}",
        record.user_id,
        record.timestamp.format(TIMESTAMP_FORMAT),
        record.status,
        record.punch.code()
    )
}

fn write_rows(out: &mut impl Write, records: &[AttendanceRecord]) -> std::io::Result<()> {
    writeln!(out, "{}", CSV_HEADER)?;
    for record in records {
        writeln!(out, "{}", csv_row(record))?;
    }
    out.flush()
}

/// Write `records` to `path`, replacing any previous file
pub fn write_csv(path: &Path, records: &[AttendanceRecord]) -> Result<()> {
    let file = File::create(path).map_err(Error::file_write(path))?;
    let mut out = BufWriter::new(file);
    write_rows(&mut out, records).map_err(Error::file_write(path))
}
