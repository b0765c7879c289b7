use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Shared per-run counters. Each counter is incremented exactly once per item
/// by whichever worker finishes that item; `processed` moves on every
/// terminal state including `no_url`.
#[derive(Debug, Default)]
pub struct RunStats {
    downloaded: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    no_url: AtomicU64,
    processed: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub downloaded: u64,
    pub skipped: u64,
    pub failed: u64,
    pub no_url: u64,
    pub processed: u64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_downloaded(&self) {
        self.downloaded.fetch_add(1, Ordering::Relaxed);
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mark_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mark_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mark_no_url(&self) {
        self.no_url.fetch_add(1, Ordering::Relaxed);
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            downloaded: self.downloaded.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            no_url: self.no_url.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
        }
    }
}

/// Elapsed-rate ETA over the processed count. The clock starts when dispatch
/// begins, not at process start.
pub struct ProgressTracker {
    total: u64,
    started: Instant,
}

#[derive(Debug, Clone, Copy)]
pub struct ProgressSnapshot {
    pub processed: u64,
    pub total: u64,
    pub elapsed: Duration,
}

impl ProgressTracker {
    pub fn start(total: u64) -> Self {
        Self {
            total,
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn snapshot(&self, processed: u64) -> ProgressSnapshot {
        self.snapshot_at(processed, self.started.elapsed())
    }

    fn snapshot_at(&self, processed: u64, elapsed: Duration) -> ProgressSnapshot {
        ProgressSnapshot {
            processed,
            total: self.total,
            elapsed,
        }
    }
}

impl ProgressSnapshot {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.processed as f64 / self.total as f64 * 100.0
    }

    pub fn eta_seconds(&self) -> f64 {
        let elapsed = self.elapsed.as_secs_f64();
        if elapsed <= f64::EPSILON {
            return 0.0;
        }
        let rate = self.processed as f64 / elapsed;
        if rate > 0.0 {
            (self.total - self.processed.min(self.total)) as f64 / rate
        } else {
            0.0
        }
    }

    /// `[42/100] 42.0% | ETA: 3m 10s`, or a starting line before the first
    /// completion lands.
    pub fn display(&self) -> String {
        if self.processed == 0 {
            return format!("[0/{}] Starting...", self.total);
        }
        format!(
            "[{}/{}] {:.1}% | ETA: {}",
            self.processed,
            self.total,
            self.percent(),
            format_duration(Duration::from_secs_f64(self.eta_seconds()))
        )
    }
}

pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    if total < 60 {
        format!("{total}s")
    } else if total < 3600 {
        format!("{}m {}s", total / 60, total % 60)
    } else {
        format!("{}h {}m", total / 3600, (total % 3600) / 60)
    }
}
