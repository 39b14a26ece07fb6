//! Tracing setup
//!
//! Two sinks: stderr, filtered by `RUST_LOG` (default `warn`), and the
//! append-only error log, which only ever receives `ERROR` events. The
//! console already prints every failure it logs at `ERROR`, so those events
//! go to the error log only.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing::{Level, Subscriber};
use tracing_subscriber::filter::{FilterExt, LevelFilter, filter_fn};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

use crate::error::{Error, Result};

/// Open `path` for appending, creating it if needed
pub fn open_error_log(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(Error::file_write(path))
}

/// Layer writing `ERROR` events, timestamped and without colour, to `file`
pub fn error_file_layer<S>(file: File) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .with_filter(LevelFilter::ERROR)
}

/// Layer writing events accepted by `filter` to `writer`, except `ERROR`
pub fn diagnostics_layer<S, W>(writer: W, filter: EnvFilter) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let below_error = filter_fn(|meta| *meta.level() != Level::ERROR);
    fmt::layer()
        .with_writer(writer)
        .with_target(false)
        .with_filter(below_error.and(filter))
}

/// Install the global subscriber
pub fn init(error_log: &Path) -> Result<()> {
    let file = open_error_log(error_log)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(diagnostics_layer(io::stderr, filter))
        .with(error_file_layer(file))
        .try_init()
        .map_err(|e| Error::Config(format!("logging already initialised: {}", e)))
}
