//! Wire models for the YouTube Data API v3 responses we consume.

use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct PlaylistListResp {
    #[serde(default)]
    pub items: Vec<PlaylistItem>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct PlaylistItem {
    pub id: String,
    pub snippet: PlaylistSnippet,
}

#[derive(Deserialize, Debug)]
pub struct PlaylistSnippet {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Deserialize, Debug)]
pub struct PlaylistItemsResp {
    #[serde(default)]
    pub items: Vec<PlaylistEntry>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct PlaylistEntry {
    #[serde(rename = "contentDetails")]
    pub content_details: PlaylistEntryContent,
}

#[derive(Deserialize, Debug)]
pub struct PlaylistEntryContent {
    #[serde(rename = "videoId")]
    pub video_id: String,
}

#[derive(Deserialize, Debug)]
pub struct VideoListResp {
    #[serde(default)]
    pub items: Vec<VideoItem>,
}

#[derive(Deserialize, Debug)]
pub struct VideoItem {
    pub id: String,
    pub snippet: VideoSnippet,
    #[serde(rename = "contentDetails")]
    pub content_details: VideoContentDetails,
}

#[derive(Deserialize, Debug)]
pub struct VideoSnippet {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "publishedAt")]
    pub published_at: String,
}

#[derive(Deserialize, Debug)]
pub struct VideoContentDetails {
    pub duration: String,
}
