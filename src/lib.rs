//! Live progress tables for named, concurrently running tasks.
//!
//! ```no_run
//! use progress_logger::ProgressLogger;
//!
//! # fn main() -> std::io::Result<()> {
//! let logger = ProgressLogger::global()?;
//! let download = logger.get("download");
//! download.set_total(100)?;
//! for _ in 0..100 {
//!     download.increment(1);
//! }
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod terminal;

pub use crate::core::config::{ConfigService, LoggerConfig};
pub use crate::core::error::{ProgressError, Result};
pub use crate::core::logger::{ProgressLogger, ProgressLoggerBuilder};
pub use crate::core::models::{Counters, ProgressMetrics, ProgressState, ProgressStatus};
pub use crate::core::progress::{Progress, ProgressContext, ProgressListener};
pub use crate::core::registry::ProgressRegistry;
