use thiserror::Error;

use crate::eol::error::ConversionError;

#[derive(Error, Debug)]
/// Batch error
pub enum BatchError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Step failed: {0}")]
    Step(String),

    #[error("Tasklet failed: {0}")]
    Tasklet(String),

    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),
}
