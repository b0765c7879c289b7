use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// A Snapchat Memories export. The only part the downloader cares about is
/// the ordered `"Saved Media"` array; item identity is the 1-based position
/// within it.
#[derive(Debug, Deserialize)]
pub struct Manifest {
    #[serde(rename = "Saved Media", default)]
    pub saved_media: Vec<MediaRecord>,
}

impl Manifest {
    /// Reads and decodes the export JSON. Any failure here is fatal to the
    /// run; nothing has been dispatched yet.
    pub fn load(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("failed to open manifest {:?}", path))?;
        let manifest: Manifest = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to decode manifest {:?}", path))?;
        Ok(manifest)
    }
}

/// One saved media item. Exports vary in which date field they carry, so all
/// known spellings are modeled and tried in a fixed priority order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaRecord {
    #[serde(rename = "Media Type")]
    pub media_type: Option<String>,

    #[serde(rename = "Media Download Url")]
    pub download_url: Option<String>,

    #[serde(rename = "Date")]
    pub date: Option<String>,
    #[serde(rename = "Created")]
    pub created: Option<String>,
    #[serde(rename = "Timestamp")]
    pub timestamp: Option<String>,
    #[serde(rename = "Creation Timestamp")]
    pub creation_timestamp: Option<String>,
    #[serde(rename = "date")]
    pub date_lower: Option<String>,
    #[serde(rename = "created")]
    pub created_lower: Option<String>,
}

impl MediaRecord {
    pub fn media_type(&self) -> MediaType {
        self.media_type
            .as_deref()
            .map(MediaType::from_label)
            .unwrap_or_default()
    }

    /// Candidate date values in priority order. Order matters: the resolver
    /// consults only the first non-empty entry.
    pub fn date_candidates(&self) -> [Option<&str>; 6] {
        [
            self.date.as_deref(),
            self.created.as_deref(),
            self.timestamp.as_deref(),
            self.creation_timestamp.as_deref(),
            self.date_lower.as_deref(),
            self.created_lower.as_deref(),
        ]
    }

    /// A URL that is missing or blank classifies the item as `no_url`.
    pub fn url(&self) -> Option<&str> {
        self.download_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaType {
    #[default]
    Photo,
    Video,
}

impl MediaType {
    pub fn from_label(label: &str) -> Self {
        if label.trim().eq_ignore_ascii_case("video") {
            MediaType::Video
        } else {
            MediaType::Photo
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            MediaType::Photo => ".jpg",
            MediaType::Video => ".mp4",
        }
    }
}
