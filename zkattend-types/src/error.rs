//! Validation errors for the data model

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A value is well-formed but not acceptable
    #[error("Validation error: {0}")]
    Validation(String),

    /// A value could not be parsed at all
    #[error("Parse error: {0}")]
    Parse(String),
}
