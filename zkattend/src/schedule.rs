//! Once-a-day fetch

use std::path::Path;

use chrono::{Duration, NaiveDateTime, NaiveTime};
use tracing::{debug, info};

use zkattend_gateway::Gateway;
use zkattend_types::DeviceDescriptor;

use crate::error::Result;
use crate::extract::{FetchOutcome, fetch_attendance};
use crate::interrupt::Interrupt;

/// First occurrence of `at` strictly after `now`
pub fn next_run(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// Fetch `device` every day at `at` until `interrupt` fires
///
/// `clock` supplies the local time; each firing is a full fetch with its own
/// session, reported through `on_fetch`. An interruption is only honoured
/// while waiting, never in the middle of a fetch. Returns the number of
/// fetches run.
pub async fn run_daily(
    gateway: &dyn Gateway,
    device: &DeviceDescriptor,
    output_dir: &Path,
    at: NaiveTime,
    interrupt: &dyn Interrupt,
    clock: fn() -> NaiveDateTime,
    mut on_fetch: impl FnMut(&Result<FetchOutcome>),
) -> usize {
    let mut runs = 0;
    loop {
        let now = clock();
        let next = next_run(now, at);
        let wait = (next - now).to_std().unwrap_or_default();
        debug!("Next fetch of {} at {}", device.name, next);

        tokio::select! {
            biased;
            _ = interrupt.wait() => break,
            _ = tokio::time::sleep(wait) => {}
        }

        info!("Scheduled fetch of {}", device.name);
        let result = fetch_attendance(gateway, device, output_dir, clock()).await;
        on_fetch(&result);
        runs += 1;
    }
    runs
}
