use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDateTime};

use crate::manifest::MediaType;

pub const UNSORTED_DIR: &str = "Unsorted";

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Destination filename for the item at the given 1-based manifest position.
/// A pure function of (position, media type), which is what makes
/// skip-detection safe across runs.
pub fn asset_name(index: usize, media_type: MediaType) -> String {
    format!("{index:05}{}", media_type.extension())
}

/// Maps a resolved timestamp to its destination directory. Items without a
/// timestamp, and items whose year falls outside the configured range, go to
/// `Unsorted`; the folder skeleton is static and workers never create
/// directories mid-run.
pub fn target_folder(
    root: &Path,
    timestamp: Option<NaiveDateTime>,
    years: &RangeInclusive<i32>,
) -> PathBuf {
    match timestamp {
        Some(dt) if years.contains(&dt.year()) => root
            .join(dt.year().to_string())
            .join(MONTHS[dt.month0() as usize]),
        _ => root.join(UNSORTED_DIR),
    }
}

/// Console label for a resolved timestamp: `YYYY-MM`, or `Unsorted`.
pub fn date_label(timestamp: Option<NaiveDateTime>) -> String {
    match timestamp {
        Some(dt) => dt.format("%Y-%m").to_string(),
        None => UNSORTED_DIR.to_string(),
    }
}

/// Creates the full `<root>/<year>/<MonthName>` skeleton for the configured
/// year range, plus `<root>/Unsorted`.
pub fn ensure_layout(root: &Path, years: &RangeInclusive<i32>) -> Result<()> {
    for year in years.clone() {
        for month in MONTHS {
            let path = root.join(year.to_string()).join(month);
            fs::create_dir_all(&path)
                .with_context(|| format!("failed to create directory {:?}", path))?;
        }
    }
    let unsorted = root.join(UNSORTED_DIR);
    fs::create_dir_all(&unsorted)
        .with_context(|| format!("failed to create directory {:?}", unsorted))?;
    Ok(())
}
