//! Errors reported to the operator

use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The terminal could not be reached or refused the session
    #[error("Connection to {device} failed: {source}")]
    Connection {
        device: String,
        #[source]
        source: zkattend_gateway::Error,
    },

    /// A call on an open session failed
    #[error("{action} failed: {source}")]
    Operation {
        action: &'static str,
        #[source]
        source: zkattend_gateway::Error,
    },

    #[error("Cannot write {}: {source}", path.display())]
    FileWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    Input(String),
}

impl Error {
    pub(crate) fn operation(action: &'static str) -> impl FnOnce(zkattend_gateway::Error) -> Self {
        move |source| Self::Operation { action, source }
    }

    pub(crate) fn file_write(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::FileWrite { path, source }
    }
}

impl From<zkattend_types::Error> for Error {
    fn from(e: zkattend_types::Error) -> Self {
        Self::Input(e.to_string())
    }
}
