//! Interactive operator console
//!
//! The console is a small state machine over numbered menus. It only
//! prompts, sequences and prints; every device action is one of the
//! workflows in [`crate::extract`] or [`crate::schedule`].

use std::io::{self, BufRead, Write};
use std::net::Ipv4Addr;

use chrono::{Local, NaiveDateTime};
use tokio::sync::mpsc;
use tracing::{debug, error};

use zkattend_gateway::Gateway;
use zkattend_types::{DeviceDescriptor, Privilege, UserRecord};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::export::TIMESTAMP_FORMAT;
use crate::extract::{self, DeviceFetch, FetchOutcome, TAIL_POLL_INTERVAL};
use crate::interrupt::Interrupt;
use crate::registry::Registry;
use crate::scan::{Addresses, Prober, SubnetBlock, next_responder};
use crate::schedule::run_daily;

/// Where the console is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    MainMenu,
    AutoFetchAll,
    ManualSelect,
    CustomIp,
    NetworkScan,
    /// Probing the rest of a block
    Scanning(Addresses),
    /// Initial fetch before the device menu
    Connecting {
        device: DeviceDescriptor,
        origin: Origin,
    },
    Operations {
        device: DeviceDescriptor,
        origin: Origin,
    },
    Exit,
}

/// How the current device was chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Manual,
    Custom,
    /// Found by a scan; holds the addresses not yet probed
    Scan(Addresses),
}

impl Origin {
    /// State after the device could not be reached
    fn unreachable(self) -> State {
        match self {
            Self::Manual | Self::Custom => State::MainMenu,
            Self::Scan(rest) => State::Scanning(rest),
        }
    }

    /// State after the operator asks for another device
    fn change_device(self) -> State {
        match self {
            Self::Manual => State::ManualSelect,
            Self::Custom => State::CustomIp,
            Self::Scan(rest) => State::Scanning(rest),
        }
    }
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

const MAIN_MENU: &str = "\nMain Menu
1. Fetch All Branch Logs (Auto)
2. Manual Device Selection
3. Enter Custom IP
4. Scan Network for Devices
5. Exit";

const DEVICE_MENU: &str = "1. Get Attendance Data
2. Set Date/Time
3. Restart Device
4. Change Device
5. Backup Device Data
6. Add New User
7. Delete Logs
8. Get Device Info
9. Real-Time Monitoring
10. Schedule Data Fetch
11. Go to Main Menu";

/// Lines typed by the operator; a closed channel means end of input
pub type Lines = mpsc::Receiver<io::Result<String>>;

/// Read stdin line by line on a dedicated thread
///
/// A blocking stdin read cannot be cancelled, so it must not run on the
/// runtime: the process has to be able to exit while the thread still
/// waits for a line.
pub fn stdin_lines() -> io::Result<Lines> {
    let (tx, rx) = mpsc::channel(1);
    std::thread::Builder::new()
        .name("stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}

/// Menu-driven console over operator lines and a writer
pub struct Console<'a, W> {
    gateway: &'a dyn Gateway,
    prober: &'a dyn Prober,
    config: &'a Config,
    registry: &'a Registry,
    interrupt: &'a dyn Interrupt,
    input: Lines,
    output: W,
    clock: fn() -> NaiveDateTime,
}

impl<'a, W: Write> Console<'a, W> {
    pub fn new(
        gateway: &'a dyn Gateway,
        prober: &'a dyn Prober,
        config: &'a Config,
        registry: &'a Registry,
        interrupt: &'a dyn Interrupt,
        input: Lines,
        output: W,
    ) -> Self {
        Self {
            gateway,
            prober,
            config,
            registry,
            interrupt,
            input,
            output,
            clock: local_now,
        }
    }

    /// Replace the local clock
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    /// Run until the operator exits, input ends, or a prompt is interrupted
    ///
    /// Device failures are reported and never end the run; only a failing
    /// output stream does.
    pub async fn run(mut self) -> io::Result<()> {
        let mut state = State::MainMenu;
        loop {
            debug!(?state, "Console step");
            state = match state {
                State::MainMenu => self.main_menu().await?,
                State::AutoFetchAll => self.fetch_all().await?,
                State::ManualSelect => self.manual_select().await?,
                State::CustomIp => self.custom_ip().await?,
                State::NetworkScan => self.network_scan().await?,
                State::Scanning(rest) => self.scan_next(rest).await?,
                State::Connecting { device, origin } => {
                    self.enter_device(device, origin).await?
                }
                State::Operations { device, origin } => {
                    self.operations(device, origin).await?
                }
                State::Exit => return Ok(()),
            };
        }
    }

    /// Print `text` and read one trimmed line
    ///
    /// `None` on end of input or when the interrupt fires.
    async fn prompt(&mut self, text: &str) -> io::Result<Option<String>> {
        write!(self.output, "{}", text)?;
        self.output.flush()?;

        let interrupt = self.interrupt;
        let line = tokio::select! {
            biased;
            _ = interrupt.wait() => None,
            line = self.input.recv() => line,
        };
        match line {
            Some(line) => Ok(Some(line?.trim().to_string())),
            None => {
                writeln!(self.output)?;
                Ok(None)
            }
        }
    }

    async fn main_menu(&mut self) -> io::Result<State> {
        writeln!(self.output, "{}", MAIN_MENU)?;
        let Some(choice) = self.prompt("Choose option (1-5): ").await? else {
            return Ok(State::Exit);
        };
        Ok(match choice.as_str() {
            "1" => State::AutoFetchAll,
            "2" => State::ManualSelect,
            "3" => State::CustomIp,
            "4" => State::NetworkScan,
            "5" => {
                writeln!(self.output, "Exiting program.")?;
                State::Exit
            }
            _ => {
                writeln!(self.output, "Invalid choice")?;
                State::MainMenu
            }
        })
    }

    async fn fetch_all(&mut self) -> io::Result<State> {
        let out = &mut self.output;
        let mut written = Ok(());
        extract::fetch_all(
            self.gateway,
            self.registry.devices(),
            &self.config.output_dir,
            (self.clock)(),
            |fetch| {
                if written.is_ok() {
                    written = report_device_fetch(&mut *out, fetch);
                }
            },
        )
        .await;
        written?;
        Ok(State::MainMenu)
    }

    async fn manual_select(&mut self) -> io::Result<State> {
        writeln!(self.output, "\nManual Device Menu:")?;
        for (key, device) in self.registry.iter() {
            writeln!(self.output, "{}. {} - {}", key, device.name, device.address)?;
        }
        let Some(choice) = self.prompt("Enter your choice: ").await? else {
            return Ok(State::Exit);
        };
        Ok(match self.registry.get(&choice) {
            Some(device) => State::Connecting {
                device: device.clone(),
                origin: Origin::Manual,
            },
            None => {
                writeln!(self.output, "Invalid choice!")?;
                State::MainMenu
            }
        })
    }

    async fn custom_ip(&mut self) -> io::Result<State> {
        let Some(address) = self.prompt("Enter device IP: ").await? else {
            return Ok(State::Exit);
        };
        let Some(name) = self.prompt("Enter a name for the device: ").await? else {
            return Ok(State::Exit);
        };
        match DeviceDescriptor::parse(name, &address) {
            Ok(device) => Ok(State::Connecting {
                device,
                origin: Origin::Custom,
            }),
            Err(e) => {
                report_error(&mut self.output, &Error::from(e))?;
                Ok(State::MainMenu)
            }
        }
    }

    async fn network_scan(&mut self) -> io::Result<State> {
        let Some(network) = self
            .prompt("Enter network to scan (e.g., 192.168.1.0/24): ")
            .await?
        else {
            return Ok(State::Exit);
        };
        match network.parse::<SubnetBlock>() {
            Ok(block) => {
                writeln!(self.output, "Scanning network for devices...")?;
                Ok(State::Scanning(block.addresses()))
            }
            Err(e) => {
                report_error(&mut self.output, &e)?;
                Ok(State::MainMenu)
            }
        }
    }

    async fn scan_next(&mut self, mut rest: Addresses) -> io::Result<State> {
        let interrupt = self.interrupt;
        let found = tokio::select! {
            biased;
            _ = interrupt.wait() => {
                writeln!(self.output, "\nScan aborted.")?;
                return Ok(State::MainMenu);
            }
            found = next_responder(self.prober, &mut rest) => found,
        };
        let Some(addr) = found else {
            writeln!(self.output, "Scan complete.")?;
            return Ok(State::MainMenu);
        };

        writeln!(self.output, "Found active device at {}", addr)?;
        let Some(name) = self
            .prompt(&format!("Enter name for device at {}: ", addr))
            .await?
        else {
            return Ok(State::Exit);
        };
        self.scanned_device(name, addr, rest)
    }

    fn scanned_device(
        &mut self,
        name: String,
        addr: Ipv4Addr,
        rest: Addresses,
    ) -> io::Result<State> {
        match DeviceDescriptor::new(name, addr) {
            Ok(device) => Ok(State::Connecting {
                device,
                origin: Origin::Scan(rest),
            }),
            Err(e) => {
                report_error(&mut self.output, &Error::from(e))?;
                Ok(State::Scanning(rest))
            }
        }
    }

    /// Fetch once, then open the device menu if the terminal answered
    async fn enter_device(
        &mut self,
        device: DeviceDescriptor,
        origin: Origin,
    ) -> io::Result<State> {
        let result = extract::fetch_attendance(
            self.gateway,
            &device,
            &self.config.output_dir,
            (self.clock)(),
        )
        .await;
        report_fetch(&mut self.output, &device, &result)?;

        Ok(match result {
            Err(Error::Connection { .. }) => origin.unreachable(),
            _ => State::Operations { device, origin },
        })
    }

    async fn operations(
        &mut self,
        device: DeviceDescriptor,
        origin: Origin,
    ) -> io::Result<State> {
        writeln!(self.output, "\nDevice Menu - {}", device.name)?;
        writeln!(self.output, "{}", DEVICE_MENU)?;
        let Some(choice) = self.prompt("Select option: ").await? else {
            return Ok(State::Exit);
        };

        match choice.as_str() {
            "1" => {
                let result = extract::fetch_attendance(
                    self.gateway,
                    &device,
                    &self.config.output_dir,
                    (self.clock)(),
                )
                .await;
                report_fetch(&mut self.output, &device, &result)?;
            }
            "2" => {
                let now = (self.clock)();
                match extract::sync_clock(self.gateway, &device, now).await {
                    Ok(()) => writeln!(
                        self.output,
                        "Device time updated to: {}",
                        now.format(TIMESTAMP_FORMAT)
                    )?,
                    Err(e) => report_error(&mut self.output, &e)?,
                }
            }
            "3" => match extract::restart(self.gateway, &device).await {
                Ok(()) => writeln!(self.output, "Device restarting...")?,
                Err(e) => report_error(&mut self.output, &e)?,
            },
            "4" => return Ok(origin.change_device()),
            "5" => {
                let result = extract::backup(
                    self.gateway,
                    &device,
                    &self.config.output_dir,
                    (self.clock)(),
                )
                .await;
                match result {
                    Ok(path) => writeln!(self.output, "Backup saved to {}", path.display())?,
                    Err(e) => report_error(&mut self.output, &e)?,
                }
            }
            "6" => {
                if !self.add_user(&device).await? {
                    return Ok(State::Exit);
                }
            }
            "7" => self.delete_logs(&device).await?,
            "8" => match extract::device_info(self.gateway, &device).await {
                Ok(info) => {
                    writeln!(self.output, "\nDevice Info:")?;
                    writeln!(self.output, "Device Name: {}", info.name)?;
                    writeln!(self.output, "Serial Number: {}", info.serial_number)?;
                    writeln!(self.output, "Firmware Version: {}", info.firmware_version)?;
                }
                Err(e) => report_error(&mut self.output, &e)?,
            },
            "9" => self.live_tail(&device).await?,
            "10" => self.daily_schedule(&device).await?,
            "11" => return Ok(State::MainMenu),
            _ => writeln!(self.output, "Invalid option")?,
        }

        Ok(State::Operations { device, origin })
    }

    /// Prompt for and enroll one user; `false` when input ended
    async fn add_user(&mut self, device: &DeviceDescriptor) -> io::Result<bool> {
        let Some(user_id) = self.prompt("Enter User ID: ").await? else {
            return Ok(false);
        };
        let Some(name) = self.prompt("Enter User Name: ").await? else {
            return Ok(false);
        };
        let Some(privilege) = self
            .prompt("Enter Privilege (0 for User, 1 for Admin): ")
            .await?
        else {
            return Ok(false);
        };

        let user = match parse_user(user_id, name, &privilege) {
            Ok(user) => user,
            Err(e) => {
                report_error(&mut self.output, &e)?;
                return Ok(true);
            }
        };
        match extract::add_user(self.gateway, device, &user).await {
            Ok(()) => writeln!(self.output, "User added successfully.")?,
            Err(e) => report_error(&mut self.output, &e)?,
        }
        Ok(true)
    }

    async fn delete_logs(&mut self, device: &DeviceDescriptor) -> io::Result<()> {
        let report = match extract::delete_period_logs(self.gateway, device, (self.clock)()).await
        {
            Ok(report) => report,
            Err(e) => return report_error(&mut self.output, &e),
        };

        writeln!(
            self.output,
            "Deleted {} logs from the device.",
            report.deleted.len()
        )?;
        if let Some((_, first)) = report.failed.first() {
            error!(
                "{} of {} deletions on {} failed, first: {}",
                report.failed.len(),
                report.attempted(),
                device.name,
                first
            );
            writeln!(
                self.output,
                "{} of {} logs could not be deleted: {}",
                report.failed.len(),
                report.attempted(),
                first
            )?;
        }
        Ok(())
    }

    async fn live_tail(&mut self, device: &DeviceDescriptor) -> io::Result<()> {
        writeln!(
            self.output,
            "Real-time monitoring started. Press Ctrl+C to stop."
        )?;
        self.output.flush()?;

        let out = &mut self.output;
        let mut written = Ok(());
        let result = extract::live_tail(
            self.gateway,
            device,
            self.interrupt,
            TAIL_POLL_INTERVAL,
            |record| {
                if written.is_ok() {
                    written = writeln!(
                        out,
                        "UserID: {}, DateTime: {}, Status: {}, Mode: {}",
                        record.user_id,
                        record.timestamp.format(TIMESTAMP_FORMAT),
                        record.status,
                        record.punch.code()
                    )
                    .and_then(|()| out.flush());
                }
            },
        )
        .await;
        written?;

        if let Err(e) = result {
            report_error(&mut self.output, &e)?;
        }
        writeln!(self.output, "Monitoring stopped.")
    }

    async fn daily_schedule(&mut self, device: &DeviceDescriptor) -> io::Result<()> {
        let at = match self.config.schedule.daily_time() {
            Ok(at) => at,
            Err(e) => return report_error(&mut self.output, &e),
        };
        writeln!(self.output, "Scheduler started. Press Ctrl+C to stop.")?;
        self.output.flush()?;

        let out = &mut self.output;
        let mut written = Ok(());
        run_daily(
            self.gateway,
            device,
            &self.config.output_dir,
            at,
            self.interrupt,
            self.clock,
            |result| {
                if written.is_ok() {
                    written = report_fetch(&mut *out, device, result).and_then(|()| out.flush());
                }
            },
        )
        .await;
        written?;

        writeln!(self.output, "Scheduler stopped.")
    }
}

fn parse_user(user_id: String, name: String, privilege: &str) -> Result<UserRecord> {
    let code: u8 = privilege
        .parse()
        .map_err(|_| Error::Input(format!("privilege must be 0 or 1, got '{}'", privilege)))?;
    Ok(UserRecord::new(user_id, name, Privilege::try_from(code)?)?)
}

fn report_fetch(
    out: &mut impl Write,
    device: &DeviceDescriptor,
    result: &Result<FetchOutcome>,
) -> io::Result<()> {
    match result {
        Ok(FetchOutcome::Saved { path, count }) => {
            writeln!(out, "Saved {} logs to {}", count, path.display())
        }
        Ok(FetchOutcome::Empty) => writeln!(
            out,
            "No logs found for {} in specified period.",
            device.name
        ),
        Err(e @ Error::Connection { .. }) => {
            report_error(out, e)?;
            writeln!(out, "Failed to connect to device: {}", device.name)
        }
        Err(e) => {
            error!("Error processing device {}: {}", device.name, e);
            writeln!(out, "Error processing device {}: {}", device.name, e)
        }
    }
}

fn report_device_fetch(out: &mut impl Write, fetch: &DeviceFetch) -> io::Result<()> {
    writeln!(out, "\nConnecting to device: {}", fetch.device)?;
    report_fetch(out, &fetch.device, &fetch.result)
}

fn report_error(out: &mut impl Write, e: &Error) -> io::Result<()> {
    error!("{}", e);
    writeln!(out, "{}", e)
}
