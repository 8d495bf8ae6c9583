//! Sync orchestrator: composes the catalog client, media fetcher, store
//! client and repository into the three pipeline operations.
//!
//! All three are idempotent and re-runnable. Batch operations isolate
//! per-item failures: one item's error is logged with its video ID, counted,
//! and never aborts the rest of the batch. Every read that gates a write is
//! re-issued immediately before the write, because items cross long network
//! calls between "checked" and "acted". The only per-item write is a
//! monotonic "locator now set" transition, so the worst benign race is
//! redundant work detected and skipped.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{info, instrument, warn};

use crate::db::{self, NewVideo, PendingAudio, Pool};
use crate::error::{Result, SyncError};
use crate::fetcher::MediaFetcher;
use crate::model::{CatalogSource, SyncReport};
use crate::storage::{audio_key, transcript_key_for, ArtifactStore};
use crate::youtube::{CatalogService, VideoDetails};

const AUDIO_CONTENT_TYPE: &str = "audio/mpeg";
const TRANSCRIPT_CONTENT_TYPE: &str = "application/json";

/// Discover new videos for a series, filter them, and persist the survivors.
///
/// The whole surviving batch is inserted in one transaction: a constraint
/// violation fails the call loudly with nothing persisted. In the report,
/// `succeeded` counts inserted ("added") videos and `skipped` counts videos
/// rejected by the duration filter.
#[instrument(skip_all, fields(series_id))]
pub async fn sync_metadata(
    pool: &Pool,
    catalog: &dyn CatalogService,
    source: &CatalogSource,
    series_id: i64,
    max_duration_minutes: Option<f64>,
) -> Result<SyncReport> {
    if !db::series_exists(pool, series_id).await? {
        return Err(SyncError::NotFound(format!("series {}", series_id)));
    }

    let candidate_ids = collect_candidate_ids(catalog, source).await?;
    info!(count = candidate_ids.len(), "unique candidate videos");

    let existing = db::existing_video_ids(pool, &candidate_ids).await?;
    let new_ids: Vec<String> = candidate_ids
        .into_iter()
        .filter(|id| !existing.contains(id))
        .collect();
    info!(
        existing = existing.len(),
        new = new_ids.len(),
        "deduplicated against catalog"
    );
    if new_ids.is_empty() {
        return Ok(SyncReport::default());
    }

    let details = catalog.video_details(&new_ids).await?;
    let total = details.len();

    let mut to_insert = Vec::new();
    let mut skipped = 0usize;
    for video in details {
        if exceeds_duration_limit(&video, max_duration_minutes) {
            info!(
                video_id = %video.video_id,
                minutes = format!("{:.1}", video.duration_minutes()),
                "skipping video over duration limit"
            );
            skipped += 1;
            continue;
        }
        to_insert.push(NewVideo {
            video_id: video.video_id,
            series_id,
            title: video.title,
            description: Some(video.description).filter(|d| !d.is_empty()),
            publish_date: video.publish_date,
            url: Some(video.url),
            duration_seconds: Some(video.duration_seconds),
        });
    }

    let added = db::insert_videos(pool, &to_insert).await?;
    info!(added, skipped, "metadata sync complete");
    Ok(SyncReport {
        total,
        succeeded: added,
        skipped,
        failed: 0,
    })
}

/// Strict boundary: a video exactly at the limit passes; only strictly longer
/// ones are skipped.
fn exceeds_duration_limit(video: &VideoDetails, max_minutes: Option<f64>) -> bool {
    match max_minutes {
        Some(max) => video.duration_minutes() > max,
        None => false,
    }
}

/// Gather candidate IDs for a source, deduplicated in memory before any
/// database or detail-fetch work. Sorted so repeated runs see a stable order.
async fn collect_candidate_ids(
    catalog: &dyn CatalogService,
    source: &CatalogSource,
) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    match source {
        CatalogSource::Playlist { playlist_id } => {
            seen.extend(catalog.playlist_video_ids(playlist_id).await?);
        }
        CatalogSource::Channel {
            channel_id,
            title_filter,
        } => {
            let playlists = catalog.channel_playlists(channel_id).await?;
            let matching: Vec<_> = playlists
                .into_iter()
                .filter(|p| title_filter.is_match(&p.title))
                .collect();
            info!(count = matching.len(), "playlists matching title filter");
            for playlist in matching {
                info!(playlist_id = %playlist.id, title = %playlist.title, "listing playlist");
                seen.extend(catalog.playlist_video_ids(&playlist.id).await?);
            }
        }
    }
    let mut ids: Vec<String> = seen.into_iter().collect();
    ids.sort();
    Ok(ids)
}

enum ItemOutcome {
    Uploaded,
    Skipped,
}

/// Download audio and upload it to the store for every video lacking a
/// payload locator, bounded by `limit`. Sequential by design: external rate
/// limits dominate, and per-item freshness re-checks keep repeated or
/// overlapping runs safe.
#[instrument(skip_all)]
pub async fn migrate_audio(
    pool: &Pool,
    fetcher: &dyn MediaFetcher,
    store: &dyn ArtifactStore,
    limit: Option<i64>,
) -> Result<SyncReport> {
    let pending = db::videos_missing_audio(pool, limit).await?;
    let mut report = SyncReport {
        total: pending.len(),
        ..Default::default()
    };
    info!(total = report.total, "videos missing audio");

    for (idx, item) in pending.iter().enumerate() {
        info!(
            video_id = %item.video_id,
            progress = format!("{}/{}", idx + 1, report.total),
            "processing video"
        );
        match process_pending_audio(pool, fetcher, store, item).await {
            Ok(ItemOutcome::Uploaded) => report.succeeded += 1,
            Ok(ItemOutcome::Skipped) => report.skipped += 1,
            Err(err) => {
                warn!(video_id = %item.video_id, %err, "audio migration failed for video");
                report.failed += 1;
            }
        }
    }

    info!(?report, "audio migration complete");
    Ok(report)
}

async fn process_pending_audio(
    pool: &Pool,
    fetcher: &dyn MediaFetcher,
    store: &dyn ArtifactStore,
    item: &PendingAudio,
) -> Result<ItemOutcome> {
    // Fresh read: the worklist may be stale by the time this item is reached.
    let video = db::find_video_locators(pool, item.id)
        .await?
        .ok_or_else(|| SyncError::NotFound(format!("video {}", item.video_id)))?;
    if video.has_audio() {
        info!(video_id = %item.video_id, "audio already recorded, skipping");
        return Ok(ItemOutcome::Skipped);
    }

    let key = audio_key(
        &item.rabbi_slug,
        &item.series_slug,
        item.publish_date,
        &item.video_id,
        "mp3",
    );

    // Store/DB drift: the object exists but the row never recorded it. Repair
    // the record without re-downloading or re-uploading.
    if store.exists(&key).await? {
        warn!(video_id = %item.video_id, key, "object exists in store but not in catalog, repairing record");
        db::set_audio_location(pool, item.id, store.bucket(), &key).await?;
        return Ok(ItemOutcome::Skipped);
    }

    let audio = fetcher.download_audio(&item.video_id).await?;
    store.upload(audio.path(), &key, AUDIO_CONTENT_TYPE).await?;
    db::set_audio_location(pool, item.id, store.bucket(), &key).await?;
    info!(video_id = %item.video_id, key, "audio uploaded and recorded");
    Ok(ItemOutcome::Uploaded)
}

/// Attach local transcript files (`<videoId>.json`) to their videos: upload
/// next to the audio object and record the locator. Skips videos that are
/// unknown, have no audio locator to derive the path from, or already carry a
/// transcript; counts malformed JSON as a failure.
#[instrument(skip_all)]
pub async fn attach_transcripts(
    pool: &Pool,
    store: &dyn ArtifactStore,
    transcript_dir: &Path,
) -> Result<SyncReport> {
    if !transcript_dir.is_dir() {
        return Err(SyncError::NotFound(format!(
            "transcript directory {}",
            transcript_dir.display()
        )));
    }

    let mut files: Vec<_> = std::fs::read_dir(transcript_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();

    let mut report = SyncReport {
        total: files.len(),
        ..Default::default()
    };
    info!(total = report.total, "transcript files found");
    if files.is_empty() {
        return Ok(report);
    }

    // One query for every video still lacking a transcript, keyed by external
    // ID for the per-file lookups.
    let candidates: HashMap<String, i64> = db::videos_without_transcript(pool)
        .await?
        .into_iter()
        .map(|v| (v.video_id.clone(), v.id))
        .collect();
    info!(count = candidates.len(), "videos without transcript");

    for file in &files {
        let Some(video_id) = file.file_stem().and_then(|s| s.to_str()) else {
            report.skipped += 1;
            continue;
        };
        let Some(&db_id) = candidates.get(video_id) else {
            info!(video_id, "video unknown or transcript already recorded, skipping");
            report.skipped += 1;
            continue;
        };
        match attach_one_transcript(pool, store, db_id, video_id, file).await {
            Ok(ItemOutcome::Uploaded) => report.succeeded += 1,
            Ok(ItemOutcome::Skipped) => report.skipped += 1,
            Err(err @ SyncError::ValidationFailed(_)) => {
                warn!(video_id, %err, "invalid transcript file");
                report.failed += 1;
            }
            Err(err) => {
                warn!(video_id, %err, "transcript attachment failed for video");
                report.failed += 1;
            }
        }
    }

    info!(?report, "transcript attachment complete");
    Ok(report)
}

async fn attach_one_transcript(
    pool: &Pool,
    store: &dyn ArtifactStore,
    db_id: i64,
    video_id: &str,
    file: &Path,
) -> Result<ItemOutcome> {
    // Fresh read gates the mutation; the candidate map may be stale.
    let video = db::find_video_locators(pool, db_id)
        .await?
        .ok_or_else(|| SyncError::NotFound(format!("video {}", video_id)))?;
    if video.has_transcript() {
        info!(video_id, "transcript already recorded, skipping");
        return Ok(ItemOutcome::Skipped);
    }
    let Some(audio_path) = video.path.as_deref() else {
        // The transcript key is derived from the audio key; without audio
        // there is nowhere to colocate it yet.
        info!(video_id, "video has no audio locator, skipping");
        return Ok(ItemOutcome::Skipped);
    };

    let content = std::fs::read(file)?;
    if serde_json::from_slice::<serde_json::Value>(&content).is_err() {
        return Err(SyncError::ValidationFailed(format!(
            "{} is not well-formed JSON",
            file.display()
        )));
    }

    let key = transcript_key_for(audio_path);
    if store.exists(&key).await? {
        warn!(video_id, key, "transcript exists in store but not in catalog, repairing record");
        db::set_transcript_location(pool, db_id, store.bucket(), &key).await?;
        return Ok(ItemOutcome::Skipped);
    }

    store.upload(file, &key, TRANSCRIPT_CONTENT_TYPE).await?;
    db::set_transcript_location(pool, db_id, store.bucket(), &key).await?;
    info!(video_id, key, "transcript uploaded and recorded");
    Ok(ItemOutcome::Uploaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn video_with_duration(seconds: i64) -> VideoDetails {
        VideoDetails {
            video_id: "abc123".into(),
            title: "Shiur".into(),
            description: String::new(),
            publish_date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            duration_seconds: seconds,
            url: crate::youtube::watch_url("abc123"),
        }
    }

    #[test]
    fn duration_boundary_is_strict() {
        // Exactly ten minutes with a ten-minute limit passes.
        assert!(!exceeds_duration_limit(&video_with_duration(600), Some(10.0)));
        assert!(exceeds_duration_limit(&video_with_duration(601), Some(10.0)));
        assert!(!exceeds_duration_limit(&video_with_duration(599), Some(10.0)));
        // No limit means nothing is filtered.
        assert!(!exceeds_duration_limit(&video_with_duration(7200), None));
    }
}
