use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by tracker and logger operations
#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("Total must be non-negative, got: {0}")]
    NegativeTotal(i64),

    #[error("Interval must be positive, got: {}ms", .0.as_millis())]
    InvalidInterval(Duration),

    #[error("Failed to read config file {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid config format in {}: {message}", .path.display())]
    ConfigParse { path: PathBuf, message: String },
}

pub type Result<T> = std::result::Result<T, ProgressError>;

impl From<ProgressError> for io::Error {
    fn from(err: ProgressError) -> Self {
        match err {
            ProgressError::ConfigRead { source, .. } => source,
            ProgressError::NegativeTotal(_) | ProgressError::InvalidInterval(_) => {
                io::Error::new(io::ErrorKind::InvalidInput, err)
            }
            ProgressError::ConfigParse { .. } => io::Error::new(io::ErrorKind::InvalidData, err),
        }
    }
}
