//! Device workflows
//!
//! Every workflow owns exactly one session for its duration and releases it
//! (enable, then close) on every path once the connection succeeded.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use zkattend_gateway::{DeviceSession, Gateway};
use zkattend_types::{AttendanceRecord, DeviceDescriptor, DeviceInfo, UserRecord};

use crate::backup::BackupSnapshot;
use crate::error::{Error, Result};
use crate::export::{backup_file_name, csv_file_name, write_csv};
use crate::interrupt::Interrupt;
use crate::period::ReportingPeriod;
use crate::session::ManagedSession;

/// Result of a successful attendance fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Records in the period were written to `path`
    Saved { path: PathBuf, count: usize },
    /// Nothing fell inside the period; no file was written
    Empty,
}

/// Keep the records inside `period`, in device order
pub fn filter_period(
    records: Vec<AttendanceRecord>,
    period: &ReportingPeriod,
) -> Vec<AttendanceRecord> {
    records
        .into_iter()
        .filter(|record| period.contains(record.timestamp))
        .collect()
}

/// Write this period's attendance of `device` to `<name>_<date>.csv`
///
/// The period ends on `now`'s day.
pub async fn fetch_attendance(
    gateway: &dyn Gateway,
    device: &DeviceDescriptor,
    output_dir: &Path,
    now: NaiveDateTime,
) -> Result<FetchOutcome> {
    let period = ReportingPeriod::ending_on(now);
    info!("Fetching attendance of {} for {}", device, period);

    let mut managed = ManagedSession::open(gateway, device).await?;
    let result = fetch_into_csv(managed.session(), device, &period, output_dir, now).await;
    managed.release().await;
    result
}

async fn fetch_into_csv(
    session: &mut dyn DeviceSession,
    device: &DeviceDescriptor,
    period: &ReportingPeriod,
    output_dir: &Path,
    now: NaiveDateTime,
) -> Result<FetchOutcome> {
    let records = session
        .list_attendance()
        .await
        .map_err(Error::operation("list attendance"))?;
    debug!("{} holds {} records", device.name, records.len());

    let records = filter_period(records, period);
    if records.is_empty() {
        info!("No records of {} in {}", device.name, period);
        return Ok(FetchOutcome::Empty);
    }

    let path = output_dir.join(csv_file_name(&device.name, now.date()));
    write_csv(&path, &records)?;
    info!("Saved {} records to {}", records.len(), path.display());

    Ok(FetchOutcome::Saved {
        path,
        count: records.len(),
    })
}

/// Outcome of one device within [`fetch_all`]
#[derive(Debug)]
pub struct DeviceFetch {
    pub device: DeviceDescriptor,
    pub result: Result<FetchOutcome>,
}

/// Fetch every device in turn, one session at a time
///
/// A failing device does not stop the rest. `on_device` sees each outcome as
/// soon as it is known.
pub async fn fetch_all<'a>(
    gateway: &dyn Gateway,
    devices: impl IntoIterator<Item = &'a DeviceDescriptor>,
    output_dir: &Path,
    now: NaiveDateTime,
    mut on_device: impl FnMut(&DeviceFetch),
) -> Vec<DeviceFetch> {
    let mut outcomes = Vec::new();
    for device in devices {
        let fetch = DeviceFetch {
            device: device.clone(),
            result: fetch_attendance(gateway, device, output_dir, now).await,
        };
        on_device(&fetch);
        outcomes.push(fetch);
    }
    outcomes
}

/// Dump every user and every attendance record to `<name>_backup_<date>.json`
pub async fn backup(
    gateway: &dyn Gateway,
    device: &DeviceDescriptor,
    output_dir: &Path,
    now: NaiveDateTime,
) -> Result<PathBuf> {
    let mut managed = ManagedSession::open(gateway, device).await?;
    let result = async {
        let session = managed.session();
        let users = session
            .list_users()
            .await
            .map_err(Error::operation("list users"))?;
        let logs = session
            .list_attendance()
            .await
            .map_err(Error::operation("list attendance"))?;

        let path = output_dir.join(backup_file_name(&device.name, now.date()));
        BackupSnapshot::new(&users, &logs).write(&path)?;
        info!(
            "Backed up {} users and {} records of {} to {}",
            users.len(),
            logs.len(),
            device.name,
            path.display()
        );
        Ok::<_, Error>(path)
    }
    .await;
    managed.release().await;
    result
}

/// Per-record outcome of [`delete_period_logs`]
#[derive(Debug, Default)]
pub struct DeleteReport {
    pub deleted: Vec<AttendanceRecord>,
    pub failed: Vec<(AttendanceRecord, zkattend_gateway::Error)>,
}

impl DeleteReport {
    pub fn attempted(&self) -> usize {
        self.deleted.len() + self.failed.len()
    }
}

/// Delete this period's records one by one
///
/// Failures do not stop the loop and nothing is rolled back; the report
/// records which deletions went through.
pub async fn delete_period_logs(
    gateway: &dyn Gateway,
    device: &DeviceDescriptor,
    now: NaiveDateTime,
) -> Result<DeleteReport> {
    let period = ReportingPeriod::ending_on(now);

    let mut managed = ManagedSession::open(gateway, device).await?;
    let result = async {
        let session = managed.session();
        let records = session
            .list_attendance()
            .await
            .map_err(Error::operation("list attendance"))?;

        let mut report = DeleteReport::default();
        for record in filter_period(records, &period) {
            match session.delete_attendance(&record).await {
                Ok(()) => report.deleted.push(record),
                Err(e) => {
                    warn!(
                        "Could not delete record of {} at {}: {}",
                        record.user_id, record.timestamp, e
                    );
                    report.failed.push((record, e));
                }
            }
        }
        info!(
            "Deleted {} of {} records of {} in {}",
            report.deleted.len(),
            report.attempted(),
            device.name,
            period
        );
        Ok::<_, Error>(report)
    }
    .await;
    managed.release().await;
    result
}

/// Set the terminal clock to `now`
pub async fn sync_clock(
    gateway: &dyn Gateway,
    device: &DeviceDescriptor,
    now: NaiveDateTime,
) -> Result<()> {
    let mut managed = ManagedSession::open(gateway, device).await?;
    let result = managed
        .session()
        .set_clock(now)
        .await
        .map_err(Error::operation("set clock"));
    managed.release().await;
    result
}

pub async fn restart(gateway: &dyn Gateway, device: &DeviceDescriptor) -> Result<()> {
    let mut managed = ManagedSession::open(gateway, device).await?;
    let result = managed
        .session()
        .restart()
        .await
        .map_err(Error::operation("restart"));
    managed.release().await;
    result
}

/// Enroll `user`, replacing an existing user with the same id
pub async fn add_user(
    gateway: &dyn Gateway,
    device: &DeviceDescriptor,
    user: &UserRecord,
) -> Result<()> {
    let mut managed = ManagedSession::open(gateway, device).await?;
    let result = managed
        .session()
        .create_user(user)
        .await
        .map_err(Error::operation("add user"));
    managed.release().await;
    result
}

pub async fn device_info(gateway: &dyn Gateway, device: &DeviceDescriptor) -> Result<DeviceInfo> {
    let mut managed = ManagedSession::open(gateway, device).await?;
    let result = managed
        .session()
        .device_info()
        .await
        .map_err(Error::operation("read device info"));
    managed.release().await;
    result
}

/// Pause between live-tail polls
pub const TAIL_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Print the attendance log as it grows until `interrupt` fires
///
/// The first poll shows the whole log; later polls only show records appended
/// since. Each poll suspends the terminal just long enough to read the log.
/// Returns the number of records shown.
pub async fn live_tail(
    gateway: &dyn Gateway,
    device: &DeviceDescriptor,
    interrupt: &dyn Interrupt,
    poll_interval: Duration,
    mut on_record: impl FnMut(&AttendanceRecord),
) -> Result<usize> {
    let mut managed = ManagedSession::connect(gateway, device).await?;

    let mut shown = 0;
    let mut total = 0;
    let mut first = true;
    let result = loop {
        let delay = if first { Duration::ZERO } else { poll_interval };
        first = false;

        tokio::select! {
            biased;
            _ = interrupt.wait() => break Ok(total),
            polled = poll_log(managed.session(), delay) => match polled {
                Ok(records) => {
                    if records.len() < shown {
                        debug!("Log of {} shrank, showing it again", device.name);
                        shown = 0;
                    }
                    for record in &records[shown..] {
                        on_record(record);
                        total += 1;
                    }
                    shown = records.len();
                }
                Err(e) => break Err(e),
            },
        }
    };

    managed.release().await;
    result
}

async fn poll_log(
    session: &mut dyn DeviceSession,
    delay: Duration,
) -> Result<Vec<AttendanceRecord>> {
    tokio::time::sleep(delay).await;
    session
        .disable()
        .await
        .map_err(Error::operation("disable device"))?;
    let records = session
        .list_attendance()
        .await
        .map_err(Error::operation("list attendance"));
    session
        .enable()
        .await
        .map_err(Error::operation("enable device"))?;
    records
}
