//! Row and view models used by repositories.
//!
//! Keep these structs focused on the data returned by queries. Business logic
//! lives in the sync orchestrator.

use chrono::NaiveDate;

/// Series slice used to resolve and verify the target of a metadata sync.
#[derive(Debug, Clone)]
pub struct SeriesRef {
    pub id: i64,
    pub name_english: String,
    pub slug: String,
    pub rabbi_slug: String,
}

/// A video ready for insertion by metadata sync. Locator fields start unset.
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub video_id: String,
    pub series_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub publish_date: NaiveDate,
    pub url: Option<String>,
    pub duration_seconds: Option<i64>,
}

/// Worklist row for audio migration: everything needed to derive the object
/// key without another join at processing time.
#[derive(Debug, Clone)]
pub struct PendingAudio {
    pub id: i64,
    pub video_id: String,
    pub title: String,
    pub publish_date: NaiveDate,
    pub series_slug: String,
    pub rabbi_slug: String,
}

/// Locator slice re-read immediately before each per-item mutation.
#[derive(Debug, Clone)]
pub struct VideoLocators {
    pub id: i64,
    pub video_id: String,
    pub bucket: Option<String>,
    pub path: Option<String>,
    pub transcript_bucket: Option<String>,
    pub transcript_path: Option<String>,
}

impl VideoLocators {
    pub fn has_audio(&self) -> bool {
        self.bucket.is_some() && self.path.is_some()
    }

    pub fn has_transcript(&self) -> bool {
        self.transcript_bucket.is_some() && self.transcript_path.is_some()
    }
}
