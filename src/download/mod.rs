mod manager;

pub use manager::{DownloadOrchestrator, RunSummary};

use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

/// Failure log location, relative to the output root.
pub const FAILED_LOG_NAME: &str = "failed_downloads.txt";

/// Everything a run needs, fixed before dispatch starts. There is no
/// mid-run reconfiguration.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub manifest_path: PathBuf,
    pub output_root: PathBuf,
    pub workers: usize,
    /// Inclusive year range the folder skeleton covers. Timestamps outside
    /// it route to `Unsorted`.
    pub years: RangeInclusive<i32>,
    pub timeout: Option<Duration>,
}
