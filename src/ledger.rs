use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;

/// One failed transfer attempt, kept for a later retry pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub index: usize,
    pub url: String,
    pub error: String,
}

/// Accumulates failure records during the run and writes them out once at the
/// end. Append-only; records are never updated.
#[derive(Debug, Default)]
pub struct FailureLedger {
    records: Mutex<Vec<FailureRecord>>,
}

impl FailureLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, record: FailureRecord) {
        self.lock().push(record);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Writes the accumulated records as a human-readable report. When no
    /// failures occurred the destination is neither created nor truncated.
    /// Call once, after all workers have completed.
    pub fn flush(&self, path: &Path, generated_at: NaiveDateTime) -> Result<()> {
        let records = self.lock();
        if records.is_empty() {
            return Ok(());
        }

        let mut out = String::new();
        let _ = writeln!(
            out,
            "# Failed downloads - {}",
            generated_at.format("%Y-%m-%d %H:%M:%S")
        );
        let _ = writeln!(out, "# Total failed: {}", records.len());
        let _ = writeln!(out);
        for record in records.iter() {
            let _ = writeln!(out, "Index: {}", record.index);
            let _ = writeln!(out, "URL: {}", record.url);
            let _ = writeln!(out, "Error: {}", record.error);
            let _ = writeln!(out, "{}", "-".repeat(50));
        }

        fs::write(path, out).with_context(|| format!("failed to write failure log {:?}", path))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<FailureRecord>> {
        // A worker panicking mid-push cannot leave the Vec inconsistent.
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
