use std::collections::VecDeque;
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use futures_util::StreamExt;
use log::{debug, info, warn};
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinSet;

use crate::dates;
use crate::download::{RunConfig, FAILED_LOG_NAME};
use crate::error::TransferError;
use crate::index::ExistingFileIndex;
use crate::layout;
use crate::ledger::{FailureLedger, FailureRecord};
use crate::manifest::{Manifest, MediaRecord};
use crate::progress::{format_duration, ProgressTracker, RunStats, StatsSnapshot};

/// Coordinates the whole run: manifest load, folder skeleton, skip index,
/// bounded-parallelism dispatch, outcome aggregation, final summary and
/// ledger flush.
pub struct DownloadOrchestrator {
    config: RunConfig,
    client: Client,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub stats: StatsSnapshot,
    pub total_items: u64,
    pub elapsed: Duration,
}

/// Terminal state of one item. Every item reaches exactly one of these.
enum ItemOutcome {
    Downloaded { label: String },
    Skipped,
    NoUrl,
    Failed { url: String, error: String },
}

struct ItemResult {
    index: usize,
    name: String,
    outcome: ItemOutcome,
}

/// Immutable context shared by every worker task.
struct WorkerContext {
    client: Client,
    output_root: PathBuf,
    years: RangeInclusive<i32>,
    existing: ExistingFileIndex,
    stats: RunStats,
}

impl DownloadOrchestrator {
    pub fn new(config: RunConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(concat!("memfetch/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::limited(10));
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("failed to build HTTP client")?;
        Ok(Self { config, client })
    }

    pub async fn run(self) -> Result<RunSummary> {
        let root = self.config.output_root.clone();
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create output root {:?}", root))?;

        let manifest = Manifest::load(&self.config.manifest_path)?;
        let items = manifest.saved_media;
        let total = items.len();

        info!("setting up folder structure under {:?}", root);
        layout::ensure_layout(&root, &self.config.years)?;

        let existing = ExistingFileIndex::build(&root)?;
        debug!("skip index holds {} existing files", existing.len());

        info!(
            "found {} items; downloading with {} parallel workers",
            total, self.config.workers
        );

        let ctx = Arc::new(WorkerContext {
            client: self.client.clone(),
            output_root: root.clone(),
            years: self.config.years.clone(),
            existing,
            stats: RunStats::new(),
        });
        let ledger = FailureLedger::new();
        let tracker = ProgressTracker::start(total as u64);

        let mut pending: VecDeque<(usize, MediaRecord)> = items
            .into_iter()
            .enumerate()
            .map(|(i, record)| (i + 1, record))
            .collect();
        let mut join_set: JoinSet<ItemResult> = JoinSet::new();

        // Keep at most `workers` tasks in flight; reap one completion, then
        // top the pool back up. Completions arrive in any order.
        while !pending.is_empty() || !join_set.is_empty() {
            while join_set.len() < self.config.workers {
                let Some((index, record)) = pending.pop_front() else {
                    break;
                };
                let ctx = ctx.clone();
                join_set.spawn(async move { process_item(&ctx, index, record).await });
            }

            match join_set.join_next().await {
                Some(Ok(result)) => report_item(&result, &tracker, &ctx.stats, &ledger),
                Some(Err(join_err)) => warn!("worker task panic: {join_err}"),
                None => break,
            }
        }

        let elapsed = tracker.elapsed();
        let stats = ctx.stats.snapshot();
        print_summary(&stats, elapsed);
        if stats.no_url > 0 {
            debug!("{} items carried no download URL", stats.no_url);
        }

        let log_path = root.join(FAILED_LOG_NAME);
        ledger.flush(&log_path, chrono::Local::now().naive_local())?;
        if !ledger.is_empty() {
            info!(
                "{} failed downloads saved to {:?} for retry",
                ledger.len(),
                log_path
            );
        }

        Ok(RunSummary {
            stats,
            total_items: total as u64,
            elapsed,
        })
    }
}

/// Per-item state machine, evaluated in isolation by one worker. First match
/// wins: skip, no-url, then the transfer outcome.
async fn process_item(ctx: &WorkerContext, index: usize, record: MediaRecord) -> ItemResult {
    let name = layout::asset_name(index, record.media_type());

    if ctx.existing.contains(&name) {
        ctx.stats.mark_skipped();
        return ItemResult {
            index,
            name,
            outcome: ItemOutcome::Skipped,
        };
    }

    let Some(url) = record.url().map(str::to_string) else {
        ctx.stats.mark_no_url();
        return ItemResult {
            index,
            name,
            outcome: ItemOutcome::NoUrl,
        };
    };

    let timestamp = dates::resolve(&record);
    let folder = layout::target_folder(&ctx.output_root, timestamp, &ctx.years);
    let path = folder.join(&name);

    match fetch_to_file(&ctx.client, &url, &path).await {
        Ok(()) => {
            ctx.stats.mark_downloaded();
            ItemResult {
                index,
                name,
                outcome: ItemOutcome::Downloaded {
                    label: layout::date_label(timestamp),
                },
            }
        }
        Err(err) => {
            ctx.stats.mark_failed();
            // Drop any partial file so a later run retries instead of
            // skipping a truncated asset.
            let _ = tokio::fs::remove_file(&path).await;
            ItemResult {
                index,
                name,
                outcome: ItemOutcome::Failed {
                    url,
                    error: err.to_string(),
                },
            }
        }
    }
}

/// Streams the response body straight into the destination file.
async fn fetch_to_file(client: &Client, url: &str, path: &Path) -> Result<(), TransferError> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(TransferError::Status(status));
    }

    let mut file = tokio::fs::File::create(path).await?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(())
}

fn report_item(
    result: &ItemResult,
    tracker: &ProgressTracker,
    stats: &RunStats,
    ledger: &FailureLedger,
) {
    let progress = tracker.snapshot(stats.processed()).display();
    match &result.outcome {
        ItemOutcome::Downloaded { label } => {
            println!("{} {} -> {}  {}", "✓".green(), result.name, label, progress);
        }
        ItemOutcome::Failed { url, error } => {
            println!("{} {}: {}  {}", "✗".red(), result.name, error, progress);
            ledger.record(FailureRecord {
                index: result.index,
                url: url.clone(),
                error: error.clone(),
            });
        }
        // Skipped and no-url items stay silent in the run log.
        ItemOutcome::Skipped | ItemOutcome::NoUrl => {}
    }
}

fn print_summary(stats: &StatsSnapshot, elapsed: Duration) {
    println!();
    println!("{}", "=".repeat(60));
    println!("Done in {}!", format_duration(elapsed));
    println!("  Downloaded: {}", stats.downloaded);
    println!("  Skipped:    {}", stats.skipped);
    println!("  Failed:     {}", stats.failed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Minimal HTTP responder: `/media/...` serves a small body, anything
    /// else gets a 404. Enough for reqwest to talk to.
    async fn spawn_server() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 1024];
                    // Read until the end of the request headers.
                    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                    }
                    let request = String::from_utf8_lossy(&buf);
                    let path = request.split_whitespace().nth(1).unwrap_or("/");
                    let response = if path.starts_with("/media/") {
                        let body = b"media-bytes";
                        format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                            body.len()
                        )
                        .into_bytes()
                        .into_iter()
                        .chain(body.iter().copied())
                        .collect::<Vec<u8>>()
                    } else {
                        b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                            .to_vec()
                    };
                    let _ = socket.write_all(&response).await;
                });
            }
        });
        addr
    }

    fn write_manifest(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("memories_history.json");
        fs::write(&path, body).expect("write manifest");
        path
    }

    fn config(manifest: PathBuf, root: PathBuf) -> RunConfig {
        RunConfig {
            manifest_path: manifest,
            output_root: root,
            workers: 4,
            years: 2016..=2025,
            timeout: Some(Duration::from_secs(5)),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn classifies_every_terminal_state() {
        let addr = spawn_server().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("out");
        let manifest = write_manifest(
            dir.path(),
            &format!(
                r#"{{"Saved Media": [
                    {{"Date": "2023-05-01 10:00:00 UTC", "Media Type": "photo", "Media Download Url": "http://{addr}/media/1"}},
                    {{"Media Type": "video", "Media Download Url": "http://{addr}/media/2"}},
                    {{"Media Type": "photo"}},
                    {{"Date": "2023-05-01 10:00:00 UTC", "Media Type": "photo", "Media Download Url": "http://{addr}/gone"}}
                ]}}"#
            ),
        );

        let summary = DownloadOrchestrator::new(config(manifest, root.clone()))
            .expect("orchestrator")
            .run()
            .await
            .expect("run");

        assert_eq!(summary.stats.downloaded, 2);
        assert_eq!(summary.stats.no_url, 1);
        assert_eq!(summary.stats.failed, 1);
        assert_eq!(summary.stats.skipped, 0);
        assert_eq!(summary.stats.processed, summary.total_items);

        // Dated photo lands under its year/month, undated video in Unsorted.
        assert!(root.join("2023/May/00001.jpg").is_file());
        assert!(root.join("Unsorted/00002.mp4").is_file());

        // The 404 item produced a ledger entry and no partial file.
        assert!(!root.join("2023/May/00004.jpg").exists());
        let log = fs::read_to_string(root.join(FAILED_LOG_NAME)).expect("ledger");
        assert!(log.contains("# Total failed: 1"));
        assert!(log.contains("Index: 4"));
        assert!(log.contains(&format!("URL: http://{addr}/gone")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn second_run_skips_everything() {
        let addr = spawn_server().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("out");
        let manifest = write_manifest(
            dir.path(),
            &format!(
                r#"{{"Saved Media": [
                    {{"Date": "2024-03-15", "Media Type": "photo", "Media Download Url": "http://{addr}/media/a"}},
                    {{"Media Type": "video", "Media Download Url": "http://{addr}/media/b"}}
                ]}}"#
            ),
        );

        let first = DownloadOrchestrator::new(config(manifest.clone(), root.clone()))
            .expect("orchestrator")
            .run()
            .await
            .expect("first run");
        assert_eq!(first.stats.downloaded, 2);

        let count_files = |root: &Path| {
            let mut total = 0usize;
            let mut stack = vec![root.to_path_buf()];
            while let Some(dir) = stack.pop() {
                for entry in fs::read_dir(dir).expect("read_dir") {
                    let path = entry.expect("entry").path();
                    if path.is_dir() {
                        stack.push(path);
                    } else {
                        total += 1;
                    }
                }
            }
            total
        };
        let after_first = count_files(&root);

        let second = DownloadOrchestrator::new(config(manifest, root.clone()))
            .expect("orchestrator")
            .run()
            .await
            .expect("second run");
        assert_eq!(second.stats.downloaded, 0);
        assert_eq!(second.stats.skipped, 2);
        assert_eq!(count_files(&root), after_first);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn counters_sum_to_total_with_small_pool() {
        let addr = spawn_server().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("out");

        let mut items = Vec::new();
        for i in 0..40 {
            match i % 3 {
                0 => items.push(format!(
                    r#"{{"Date": "2022-08-01", "Media Type": "photo", "Media Download Url": "http://{addr}/media/{i}"}}"#
                )),
                1 => items.push(r#"{"Media Type": "photo"}"#.to_string()),
                _ => items.push(format!(
                    r#"{{"Media Type": "video", "Media Download Url": "http://{addr}/missing/{i}"}}"#
                )),
            }
        }
        let manifest = write_manifest(
            dir.path(),
            &format!(r#"{{"Saved Media": [{}]}}"#, items.join(",")),
        );

        let mut cfg = config(manifest, root);
        cfg.workers = 3;
        let summary = DownloadOrchestrator::new(cfg)
            .expect("orchestrator")
            .run()
            .await
            .expect("run");

        let s = summary.stats;
        assert_eq!(s.processed, 40);
        assert_eq!(s.downloaded + s.skipped + s.failed + s.no_url, 40);
        assert_eq!(s.downloaded, 14);
        assert_eq!(s.no_url, 13);
        assert_eq!(s.failed, 13);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreadable_manifest_is_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = config(dir.path().join("nope.json"), dir.path().join("out"));
        let err = DownloadOrchestrator::new(cfg)
            .expect("orchestrator")
            .run()
            .await
            .expect_err("missing manifest must abort");
        assert!(err.to_string().contains("failed to open manifest"));
    }
}
