//! Record layouts stored on the terminal
//!
//! User records come in a 72-byte (TCP firmware) or 28-byte (older firmware)
//! layout; attendance records in 40, 16 or 8 bytes. Every buffered table
//! starts with a u32 holding the size of the records that follow.

use std::collections::HashMap;

use byteorder::{ByteOrder, LittleEndian};
use bytes::{BufMut, BytesMut};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use tracing::warn;

use zkattend_types::{AttendanceRecord, Privilege, UserRecord};

use crate::error::{Error, Result};

pub const USER_RECORD_72: usize = 72;
pub const USER_RECORD_28: usize = 28;

const ATT_RECORD_SIZES: [usize; 3] = [40, 16, 8];

/// Privilege byte the terminal stores for administrators
pub const PRIVILEGE_ADMIN: u8 = 14;

/// Decode the terminal's packed timestamp
///
/// Returns `None` when the fields do not form a calendar date.
pub fn decode_time(mut t: u32) -> Option<NaiveDateTime> {
    let second = t % 60;
    t /= 60;
    let minute = t % 60;
    t /= 60;
    let hour = t % 24;
    t /= 24;
    let day = t % 31 + 1;
    t /= 31;
    let month = t % 12 + 1;
    t /= 12;
    let year = i32::try_from(t).ok()? + 2000;

    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
}

/// Pack a timestamp the way the terminal stores it
///
/// Only years 2000..=2099 are representable.
pub fn encode_time(at: NaiveDateTime) -> Result<u32> {
    if !(2000..=2099).contains(&at.year()) {
        return Err(Error::InvalidRecord(format!(
            "year {} outside the terminal's range",
            at.year()
        )));
    }

    let year = (at.year() % 100) as u32;
    let days = (year * 12 * 31) + ((at.month() - 1) * 31) + at.day() - 1;
    Ok(days * 86400 + (at.hour() * 60 + at.minute()) * 60 + at.second())
}

/// A user as stored in a terminal slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUser {
    /// Internal slot number
    pub uid: u16,
    pub user: UserRecord,
}

fn text(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).trim().to_string()
}

fn privilege(code: u8) -> Privilege {
    if code == 0 { Privilege::Normal } else { Privilege::Admin }
}

/// Split a buffered table into its record area
fn records_area(data: &[u8]) -> Result<&[u8]> {
    if data.len() < 4 {
        return Err(Error::Decode(format!(
            "table header needs 4 bytes, got {}",
            data.len()
        )));
    }
    let total = LittleEndian::read_u32(&data[..4]) as usize;
    let body = &data[4..];
    Ok(&body[..total.min(body.len())])
}

/// Work out the record size from the table size and the advertised count
fn record_size(total: usize, count: usize, candidates: &[usize]) -> Option<usize> {
    if count > 0 && total % count == 0 && candidates.contains(&(total / count)) {
        return Some(total / count);
    }
    candidates.iter().copied().find(|size| total % size == 0)
}

/// Decode the user table
///
/// `count` is the user count reported by the terminal, or 0 if unknown.
/// Returns the detected record size alongside the users.
pub fn decode_users(data: &[u8], count: usize) -> Result<(usize, Vec<StoredUser>)> {
    let body = records_area(data)?;
    if body.is_empty() {
        return Ok((USER_RECORD_72, Vec::new()));
    }

    let size = record_size(body.len(), count, &[USER_RECORD_72, USER_RECORD_28])
        .ok_or_else(|| Error::Decode(format!("user table of {} bytes", body.len())))?;

    let users = body
        .chunks_exact(size)
        .filter_map(|raw| {
            let (uid, user) = if size == USER_RECORD_72 {
                decode_user_72(raw)
            } else {
                decode_user_28(raw)
            };
            match user {
                Ok(user) => Some(StoredUser { uid, user }),
                Err(e) => {
                    warn!("Skipping user slot {}: {}", uid, e);
                    None
                }
            }
        })
        .collect();

    Ok((size, users))
}

fn decode_user_72(raw: &[u8]) -> (u16, zkattend_types::Result<UserRecord>) {
    let uid = LittleEndian::read_u16(&raw[0..2]);
    let mut user_id = text(&raw[48..72]);
    if user_id.is_empty() {
        user_id = uid.to_string();
    }
    (uid, UserRecord::new(user_id, text(&raw[11..35]), privilege(raw[2])))
}

fn decode_user_28(raw: &[u8]) -> (u16, zkattend_types::Result<UserRecord>) {
    let uid = LittleEndian::read_u16(&raw[0..2]);
    let user_id = LittleEndian::read_u32(&raw[24..28]);
    (
        uid,
        UserRecord::new(user_id.to_string(), text(&raw[8..16]), privilege(raw[2])),
    )
}

fn put_text(buf: &mut BytesMut, value: &str, width: usize) {
    let mut end = value.len().min(width);
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    buf.put_slice(&value.as_bytes()[..end]);
    buf.put_bytes(0, width - end);
}

/// Encode a user into a slot of the given record size
pub fn encode_user(uid: u16, user: &UserRecord, size: usize) -> Result<BytesMut> {
    let privilege = match user.privilege {
        Privilege::Normal => 0,
        Privilege::Admin => PRIVILEGE_ADMIN,
    };

    let mut buf = BytesMut::with_capacity(size);
    match size {
        USER_RECORD_72 => {
            if user.user_id.len() > 24 {
                return Err(Error::InvalidRecord(format!(
                    "user id '{}' longer than 24 bytes",
                    user.user_id
                )));
            }
            buf.put_u16_le(uid);
            buf.put_u8(privilege);
            put_text(&mut buf, "", 8);
            put_text(&mut buf, &user.name, 24);
            buf.put_u32_le(0);
            buf.put_u8(0);
            put_text(&mut buf, "", 7);
            buf.put_u8(0);
            put_text(&mut buf, &user.user_id, 24);
        }
        USER_RECORD_28 => {
            let user_id: u32 = user.user_id.parse().map_err(|_| {
                Error::InvalidRecord(format!(
                    "user id '{}' must be numeric on this terminal",
                    user.user_id
                ))
            })?;
            buf.put_u16_le(uid);
            buf.put_u8(privilege);
            put_text(&mut buf, "", 5);
            put_text(&mut buf, &user.name, 8);
            buf.put_u32_le(0);
            buf.put_u8(0);
            buf.put_u8(0);
            buf.put_u16_le(0);
            buf.put_u32_le(user_id);
        }
        other => {
            return Err(Error::InvalidRecord(format!(
                "unsupported user record size {}",
                other
            )));
        }
    }
    Ok(buf)
}

/// Decode the attendance table
///
/// `count` is the record count reported by the terminal, or 0 if unknown.
/// 8-byte records carry only the slot number; `uid_map` resolves it to a
/// user id. Records with impossible timestamps are skipped.
pub fn decode_attendance(
    data: &[u8],
    count: usize,
    uid_map: &HashMap<u16, String>,
) -> Result<Vec<AttendanceRecord>> {
    let body = records_area(data)?;
    if body.is_empty() {
        return Ok(Vec::new());
    }

    let size = record_size(body.len(), count, &ATT_RECORD_SIZES)
        .ok_or_else(|| Error::Decode(format!("attendance table of {} bytes", body.len())))?;

    let mut records = Vec::with_capacity(body.len() / size);
    for raw in body.chunks_exact(size) {
        let (user_id, time, status, punch) = match size {
            40 => (
                text(&raw[2..26]),
                LittleEndian::read_u32(&raw[27..31]),
                raw[26],
                raw[31],
            ),
            16 => (
                LittleEndian::read_u32(&raw[0..4]).to_string(),
                LittleEndian::read_u32(&raw[4..8]),
                raw[8],
                raw[9],
            ),
            _ => {
                let uid = LittleEndian::read_u16(&raw[0..2]);
                let user_id = uid_map
                    .get(&uid)
                    .cloned()
                    .unwrap_or_else(|| uid.to_string());
                (user_id, LittleEndian::read_u32(&raw[3..7]), raw[2], raw[7])
            }
        };

        match decode_time(time) {
            Some(timestamp) => {
                records.push(AttendanceRecord::new(user_id, timestamp, status, punch))
            }
            None => warn!(
                "Skipping attendance record of user {} with invalid time 0x{:08X}",
                user_id, time
            ),
        }
    }

    Ok(records)
}
