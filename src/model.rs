use regex::Regex;
use serde::{Deserialize, Serialize};

/// Where a metadata sync discovers candidate videos.
#[derive(Debug, Clone)]
pub enum CatalogSource {
    /// Every video of a single playlist.
    Playlist { playlist_id: String },
    /// Every video of every channel playlist whose title matches the filter.
    Channel {
        channel_id: String,
        title_filter: Regex,
    },
}

/// Aggregate outcome of one batch operation. `succeeded` is reported to the
/// operator as "added", "processed" or "uploaded" depending on the operation,
/// but the triple is always independently retrievable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SyncReport {
    /// Accounting invariant: every item lands in exactly one bucket.
    pub fn is_balanced(&self) -> bool {
        self.succeeded + self.skipped + self.failed == self.total
    }
}
