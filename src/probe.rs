use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{info, warn};
use reqwest::Client;

const TEST_URLS: &[(&str, &str)] = &[
    ("1MB", "http://speedtest.tele2.net/1MB.zip"),
    ("10MB", "http://speedtest.tele2.net/10MB.zip"),
];

const FALLBACK_URLS: &[(&str, &str)] = &[
    ("1MB", "http://ipv4.download.thinkbroadband.com/1MB.zip"),
    ("5MB", "http://ipv4.download.thinkbroadband.com/5MB.zip"),
];

const LATENCY_ATTEMPTS: usize = 3;

/// Measures connection latency and throughput against public test files and
/// prints a recommended `--workers` value. Never touches the output root.
pub async fn run() -> Result<()> {
    let client = Client::builder()
        .user_agent(concat!("memfetch/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(60))
        .build()
        .context("failed to build HTTP client")?;

    info!("testing latency...");
    let latency_ms = measure_latency(&client, TEST_URLS[0].1).await;
    match latency_ms {
        Some(ms) => info!("latency: {ms:.0} ms"),
        None => warn!("could not measure latency"),
    }

    info!("testing download speed...");
    let mut speeds = Vec::new();
    for (label, url) in TEST_URLS {
        if let Some(mbps) = measure_speed(&client, url, label).await {
            speeds.push(mbps);
        }
    }
    if speeds.is_empty() {
        info!("trying fallback servers...");
        for (label, url) in FALLBACK_URLS {
            if let Some(mbps) = measure_speed(&client, url, label).await {
                speeds.push(mbps);
                break;
            }
        }
    }

    let avg_mbps = if speeds.is_empty() {
        None
    } else {
        Some(speeds.iter().sum::<f64>() / speeds.len() as f64)
    };

    let (workers, reason) = recommend_workers(avg_mbps, latency_ms);
    println!("{}", "=".repeat(60));
    if let Some(mbps) = avg_mbps {
        println!("Average speed:       {mbps:.1} Mbps");
    }
    if let Some(ms) = latency_ms {
        println!("Latency:             {ms:.0} ms");
    }
    println!("Recommended workers: {workers}");
    println!("Reason: {reason}");
    println!();
    println!("Pass it with: memfetch --workers {workers} ...");
    Ok(())
}

/// Mean time-to-first-byte over a few HEAD requests, in milliseconds.
async fn measure_latency(client: &Client, url: &str) -> Option<f64> {
    let mut samples = Vec::new();
    for _ in 0..LATENCY_ATTEMPTS {
        let start = Instant::now();
        match client.head(url).send().await {
            Ok(_) => samples.push(start.elapsed().as_secs_f64() * 1000.0),
            Err(err) => {
                warn!("latency probe failed: {err}");
            }
        }
    }
    if samples.is_empty() {
        None
    } else {
        Some(samples.iter().sum::<f64>() / samples.len() as f64)
    }
}

/// Downloads one test file and reports the observed speed in Mbps.
async fn measure_speed(client: &Client, url: &str, label: &str) -> Option<f64> {
    let start = Instant::now();
    let bytes = match client.get(url).send().await {
        Ok(response) => match response.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("{label} test failed: {err}");
                return None;
            }
        },
        Err(err) => {
            warn!("{label} test failed: {err}");
            return None;
        }
    };
    let elapsed = start.elapsed().as_secs_f64();
    if elapsed <= f64::EPSILON {
        return None;
    }
    let mbps = (bytes.len() as f64 * 8.0) / (elapsed * 1_000_000.0);
    info!(
        "{label}: {:.1} MB in {elapsed:.1}s = {mbps:.1} Mbps",
        bytes.len() as f64 / (1024.0 * 1024.0)
    );
    Some(mbps)
}

/// Tiered worker recommendation: faster links get more parallelism, high
/// latency pulls the number back down, capped at 32 to stay clear of server
/// rate limits.
fn recommend_workers(speed_mbps: Option<f64>, latency_ms: Option<f64>) -> (usize, String) {
    let Some(speed) = speed_mbps else {
        return (8, "could not test speed, using safe default".to_string());
    };

    let (mut workers, base_reason): (usize, &str) = if speed < 10.0 {
        (4, "slow connection, fewer workers prevent congestion")
    } else if speed < 25.0 {
        (8, "moderate connection, balanced worker count")
    } else if speed < 50.0 {
        (12, "good connection, can handle more parallel downloads")
    } else if speed < 100.0 {
        (16, "fast connection, optimal parallel throughput")
    } else if speed < 200.0 {
        (24, "very fast connection, high parallelism")
    } else {
        (32, "excellent connection, maximum recommended")
    };
    let mut reason = base_reason.to_string();

    if latency_ms.is_some_and(|ms| ms > 200.0) {
        workers = workers.saturating_sub(4).max(4);
        reason.push_str(" (reduced due to high latency)");
    }

    (workers.min(32), reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_speed_falls_back_to_default() {
        let (workers, reason) = recommend_workers(None, None);
        assert_eq!(workers, 8);
        assert!(reason.contains("safe default"));
    }

    #[test]
    fn tiers_scale_with_speed() {
        assert_eq!(recommend_workers(Some(5.0), None).0, 4);
        assert_eq!(recommend_workers(Some(20.0), None).0, 8);
        assert_eq!(recommend_workers(Some(40.0), None).0, 12);
        assert_eq!(recommend_workers(Some(80.0), None).0, 16);
        assert_eq!(recommend_workers(Some(150.0), None).0, 24);
        assert_eq!(recommend_workers(Some(500.0), None).0, 32);
    }

    #[test]
    fn high_latency_reduces_but_keeps_a_floor() {
        let (workers, reason) = recommend_workers(Some(150.0), Some(350.0));
        assert_eq!(workers, 20);
        assert!(reason.contains("high latency"));

        let (workers, _) = recommend_workers(Some(5.0), Some(350.0));
        assert_eq!(workers, 4);
    }
}
