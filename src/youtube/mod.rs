//! Paginated read access to the YouTube Data API v3.
//!
//! Listing endpoints return bounded pages (50 items) with an opaque
//! continuation token; the client loops until the token is absent. Detail
//! lookups batch IDs at the API's 50-per-request cap. Any upstream error
//! aborts the in-flight call as `CatalogUnavailable`, so callers get a
//! complete sequence or an error, never a silent partial result.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use reqwest::{Client, Url};
use std::fmt;
use tracing::info;

use crate::error::{Result, SyncError};
use crate::youtube::model::{PlaylistItemsResp, PlaylistListResp, VideoListResp};

pub mod model;

const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3/";

/// The API rejects more than 50 IDs per `videos.list` request.
pub const MAX_IDS_PER_REQUEST: usize = 50;

/// Maximum page size for listing endpoints.
const MAX_PAGE_SIZE: &str = "50";

/// A playlist as listed under a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistInfo {
    pub id: String,
    pub title: String,
}

/// Per-video detail as consumed by metadata sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoDetails {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub publish_date: NaiveDate,
    pub duration_seconds: i64,
    pub url: String,
}

impl VideoDetails {
    pub fn duration_minutes(&self) -> f64 {
        self.duration_seconds as f64 / 60.0
    }
}

#[async_trait]
pub trait CatalogService: Send + Sync {
    /// All playlists of a channel, across every page.
    async fn channel_playlists(&self, channel_id: &str) -> Result<Vec<PlaylistInfo>>;

    /// All video IDs of a playlist, across every page.
    async fn playlist_video_ids(&self, playlist_id: &str) -> Result<Vec<String>>;

    /// Details for a set of video IDs, fetched in batches of at most
    /// [`MAX_IDS_PER_REQUEST`]. No order guarantee across batches.
    async fn video_details(&self, video_ids: &[String]) -> Result<Vec<VideoDetails>>;
}

#[derive(Clone)]
pub struct YoutubeClient {
    http: Client,
    base_url: Url,
    api_key: String,
}

impl fmt::Debug for YoutubeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YoutubeClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl YoutubeClient {
    pub fn new(api_key: String) -> Self {
        let base_url = Url::parse(YOUTUBE_API_BASE).expect("valid default YouTube URL");
        Self::with_base_url(api_key, base_url)
    }

    pub fn with_base_url(api_key: String, base_url: Url) -> Self {
        let http = Client::builder()
            .user_agent("kol-ingest/0.1")
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url,
            api_key,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let url = self
            .base_url
            .join(endpoint)
            .map_err(|e| SyncError::CatalogUnavailable(format!("invalid endpoint: {}", e)))?;
        let res = self
            .http
            .get(url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| SyncError::CatalogUnavailable(format!("request failed: {}", e)))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(SyncError::CatalogUnavailable(format!(
                "{} returned {}: {}",
                endpoint, status, body
            )));
        }
        res.json::<T>()
            .await
            .map_err(|e| SyncError::CatalogUnavailable(format!("invalid response JSON: {}", e)))
    }
}

#[async_trait]
impl CatalogService for YoutubeClient {
    async fn channel_playlists(&self, channel_id: &str) -> Result<Vec<PlaylistInfo>> {
        let mut playlists = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut params = vec![
                ("part", "snippet"),
                ("channelId", channel_id),
                ("maxResults", MAX_PAGE_SIZE),
            ];
            if let Some(token) = page_token.as_deref() {
                params.push(("pageToken", token));
            }
            let page: PlaylistListResp = self.get_json("playlists", &params).await?;
            playlists.extend(page.items.into_iter().map(|item| PlaylistInfo {
                id: item.id,
                title: item.snippet.title,
            }));
            // A missing or empty token ends the stream.
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        info!(channel_id, count = playlists.len(), "listed channel playlists");
        Ok(playlists)
    }

    async fn playlist_video_ids(&self, playlist_id: &str) -> Result<Vec<String>> {
        let mut video_ids = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut params = vec![
                ("part", "contentDetails"),
                ("playlistId", playlist_id),
                ("maxResults", MAX_PAGE_SIZE),
            ];
            if let Some(token) = page_token.as_deref() {
                params.push(("pageToken", token));
            }
            let page: PlaylistItemsResp = self.get_json("playlistItems", &params).await?;
            video_ids.extend(
                page.items
                    .into_iter()
                    .map(|item| item.content_details.video_id),
            );
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        info!(playlist_id, count = video_ids.len(), "listed playlist videos");
        Ok(video_ids)
    }

    async fn video_details(&self, video_ids: &[String]) -> Result<Vec<VideoDetails>> {
        let mut details = Vec::new();
        for batch in video_ids.chunks(MAX_IDS_PER_REQUEST) {
            let ids = batch.join(",");
            let resp: VideoListResp = self
                .get_json(
                    "videos",
                    &[("part", "snippet,contentDetails"), ("id", ids.as_str())],
                )
                .await?;
            for item in resp.items {
                let publish_date = parse_published_at(&item.snippet.published_at)?;
                let duration_seconds = parse_iso8601_duration(&item.content_details.duration)?;
                let url = watch_url(&item.id);
                details.push(VideoDetails {
                    video_id: item.id,
                    title: item.snippet.title,
                    description: item.snippet.description,
                    publish_date,
                    duration_seconds,
                    url,
                });
            }
        }
        Ok(details)
    }
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

fn parse_published_at(raw: &str) -> Result<NaiveDate> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .map_err(|e| {
            SyncError::CatalogUnavailable(format!("invalid publishedAt '{}': {}", raw, e))
        })
}

/// Parse an ISO-8601 duration as returned by the API (e.g. `PT1H2M3S`,
/// `P1DT30S`, `PT45S`) into total seconds.
pub fn parse_iso8601_duration(raw: &str) -> Result<i64> {
    let invalid =
        || SyncError::CatalogUnavailable(format!("invalid ISO-8601 duration '{}'", raw));

    let rest = raw.strip_prefix('P').ok_or_else(invalid)?;
    let mut total: i64 = 0;
    let mut in_time = false;
    let mut number = String::new();
    let mut saw_component = false;

    for ch in rest.chars() {
        match ch {
            'T' if !in_time => in_time = true,
            '0'..='9' => number.push(ch),
            unit => {
                let value: i64 = number.parse().map_err(|_| invalid())?;
                number.clear();
                let factor = match (unit, in_time) {
                    ('W', false) => 7 * 86_400,
                    ('D', false) => 86_400,
                    ('H', true) => 3_600,
                    ('M', false) => return Err(invalid()), // month durations never occur
                    ('M', true) => 60,
                    ('S', true) => 1,
                    _ => return Err(invalid()),
                };
                total += value * factor;
                saw_component = true;
            }
        }
    }
    // Trailing digits without a unit, or a bare "P"/"PT".
    if !number.is_empty() || !saw_component {
        return Err(invalid());
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_durations() {
        assert_eq!(parse_iso8601_duration("PT5M30S").unwrap(), 330);
        assert_eq!(parse_iso8601_duration("PT1H2M3S").unwrap(), 3723);
        assert_eq!(parse_iso8601_duration("PT45S").unwrap(), 45);
        assert_eq!(parse_iso8601_duration("PT10M").unwrap(), 600);
        assert_eq!(parse_iso8601_duration("P1DT30S").unwrap(), 86_430);
        assert_eq!(parse_iso8601_duration("P2W").unwrap(), 1_209_600);
        assert_eq!(parse_iso8601_duration("PT0S").unwrap(), 0);
    }

    #[test]
    fn rejects_malformed_durations() {
        assert!(parse_iso8601_duration("").is_err());
        assert!(parse_iso8601_duration("P").is_err());
        assert!(parse_iso8601_duration("PT").is_err());
        assert!(parse_iso8601_duration("5M30S").is_err());
        assert!(parse_iso8601_duration("PT5X").is_err());
        assert!(parse_iso8601_duration("PT5").is_err());
        // Calendar months are ambiguous and never returned by the API.
        assert!(parse_iso8601_duration("P1M").is_err());
    }

    #[test]
    fn fractional_minutes_from_seconds() {
        let details = VideoDetails {
            video_id: "abc".into(),
            title: "t".into(),
            description: String::new(),
            publish_date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            duration_seconds: 630,
            url: watch_url("abc"),
        };
        assert!((details.duration_minutes() - 10.5).abs() < f64::EPSILON);
    }

    #[test]
    fn publish_date_from_rfc3339() {
        assert_eq!(
            parse_published_at("2024-01-05T08:30:00Z").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
        );
        assert!(parse_published_at("yesterday").is_err());
    }
}
