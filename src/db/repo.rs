use super::model::{NewVideo, PendingAudio, SeriesRef, VideoLocators};
use anyhow::Result;
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;
use tracing::instrument;

pub type Pool = SqlitePool;

/// Result of a repository query.
pub type DbResult<T> = std::result::Result<T, sqlx::Error>;

/// Upper bound on bound parameters per statement; SQLite caps the count, so
/// bulk membership checks run in chunks of this size.
const IN_CLAUSE_CHUNK: usize = 500;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized).await?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys=ON;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// For a file-backed SQLite URL, ensure the parent directory exists so a first
/// run can create the database. In-memory and non-sqlite URLs pass through.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }
    let rest = url["sqlite:".len()..].trim_start_matches("//");
    let path_part = rest.split('?').next().unwrap_or(rest);
    if let Some(parent) = std::path::Path::new(path_part).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }
    url.to_string()
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn find_series_by_slugs(
    pool: &Pool,
    rabbi_slug: &str,
    series_slug: &str,
) -> DbResult<Option<SeriesRef>> {
    let row = sqlx::query(
        "SELECT s.id, s.name_english, s.slug, r.slug AS rabbi_slug \
         FROM series s JOIN rabbis r ON s.rabbi_id = r.id \
         WHERE r.slug = ? AND s.slug = ?",
    )
    .bind(rabbi_slug)
    .bind(series_slug)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|row| SeriesRef {
        id: row.get("id"),
        name_english: row.get("name_english"),
        slug: row.get("slug"),
        rabbi_slug: row.get("rabbi_slug"),
    }))
}

#[instrument(skip_all)]
pub async fn series_exists(pool: &Pool, series_id: i64) -> DbResult<bool> {
    let id = sqlx::query_scalar::<_, i64>("SELECT id FROM series WHERE id = ?")
        .bind(series_id)
        .fetch_optional(pool)
        .await?;
    Ok(id.is_some())
}

/// Bulk membership check: which of `candidate_ids` already have a row. One
/// query per chunk of the IN list, never one query per ID.
#[instrument(skip_all, fields(candidates = candidate_ids.len()))]
pub async fn existing_video_ids(
    pool: &Pool,
    candidate_ids: &[String],
) -> DbResult<HashSet<String>> {
    let mut existing = HashSet::new();
    for chunk in candidate_ids.chunks(IN_CLAUSE_CHUNK) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!(
            "SELECT video_id FROM videos WHERE video_id IN ({})",
            placeholders
        );
        let mut query = sqlx::query_scalar::<_, String>(&sql);
        for id in chunk {
            query = query.bind(id);
        }
        existing.extend(query.fetch_all(pool).await?);
    }
    Ok(existing)
}

/// Insert a batch of newly discovered videos in a single transaction: either
/// the whole batch commits or, on any constraint violation, the sync call
/// fails loudly with nothing persisted.
#[instrument(skip_all, fields(count = videos.len()))]
pub async fn insert_videos(pool: &Pool, videos: &[NewVideo]) -> DbResult<usize> {
    let mut tx = pool.begin().await?;
    for video in videos {
        sqlx::query(
            "INSERT INTO videos (video_id, series_id, title, description, publish_date, url, duration_seconds) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&video.video_id)
        .bind(video.series_id)
        .bind(&video.title)
        .bind(&video.description)
        .bind(video.publish_date)
        .bind(&video.url)
        .bind(video.duration_seconds)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(videos.len())
}

/// Videos lacking an audio locator, in a stable order (rabbi slug, series
/// slug, publish date) so repeated runs resume where they left off.
#[instrument(skip_all)]
pub async fn videos_missing_audio(
    pool: &Pool,
    limit: Option<i64>,
) -> DbResult<Vec<PendingAudio>> {
    let sql = "SELECT v.id, v.video_id, v.title, v.publish_date, \
               s.slug AS series_slug, r.slug AS rabbi_slug \
               FROM videos v \
               JOIN series s ON v.series_id = s.id \
               JOIN rabbis r ON s.rabbi_id = r.id \
               WHERE v.bucket IS NULL AND v.path IS NULL \
               ORDER BY r.slug, s.slug, v.publish_date \
               LIMIT ?";
    let rows = sqlx::query(sql)
        .bind(limit.unwrap_or(-1))
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| PendingAudio {
            id: row.get("id"),
            video_id: row.get("video_id"),
            title: row.get("title"),
            publish_date: row.get("publish_date"),
            series_slug: row.get("series_slug"),
            rabbi_slug: row.get("rabbi_slug"),
        })
        .collect())
}

#[instrument(skip_all)]
pub async fn find_video_locators(pool: &Pool, id: i64) -> DbResult<Option<VideoLocators>> {
    let row = sqlx::query(
        "SELECT id, video_id, bucket, path, transcript_bucket, transcript_path \
         FROM videos WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(locators_from_row))
}

#[instrument(skip_all)]
pub async fn find_video_by_external_id(
    pool: &Pool,
    video_id: &str,
) -> DbResult<Option<VideoLocators>> {
    let row = sqlx::query(
        "SELECT id, video_id, bucket, path, transcript_bucket, transcript_path \
         FROM videos WHERE video_id = ?",
    )
    .bind(video_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(locators_from_row))
}

fn locators_from_row(row: sqlx::sqlite::SqliteRow) -> VideoLocators {
    VideoLocators {
        id: row.get("id"),
        video_id: row.get("video_id"),
        bucket: row.get("bucket"),
        path: row.get("path"),
        transcript_bucket: row.get("transcript_bucket"),
        transcript_path: row.get("transcript_path"),
    }
}

#[instrument(skip_all)]
pub async fn set_audio_location(pool: &Pool, id: i64, bucket: &str, path: &str) -> DbResult<()> {
    sqlx::query("UPDATE videos SET bucket = ?, path = ? WHERE id = ?")
        .bind(bucket)
        .bind(path)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn set_transcript_location(
    pool: &Pool,
    id: i64,
    bucket: &str,
    path: &str,
) -> DbResult<()> {
    sqlx::query("UPDATE videos SET transcript_bucket = ?, transcript_path = ? WHERE id = ?")
        .bind(bucket)
        .bind(path)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Videos still lacking a transcript locator, keyed by external ID so the
/// transcript-attachment pass can match local files in one pass.
#[instrument(skip_all)]
pub async fn videos_without_transcript(pool: &Pool) -> DbResult<Vec<VideoLocators>> {
    let rows = sqlx::query(
        "SELECT id, video_id, bucket, path, transcript_bucket, transcript_path \
         FROM videos WHERE transcript_path IS NULL",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(locators_from_row).collect())
}

#[cfg(test)]
pub async fn seed_series(pool: &Pool, rabbi_slug: &str, series_slug: &str) -> DbResult<i64> {
    let rabbi_id: i64 = sqlx::query(
        "INSERT INTO rabbis (name_hebrew, name_english, slug) VALUES (?, ?, ?) RETURNING id",
    )
    .bind(rabbi_slug)
    .bind(rabbi_slug)
    .bind(rabbi_slug)
    .fetch_one(pool)
    .await?
    .get("id");
    let series_id: i64 = sqlx::query(
        "INSERT INTO series (rabbi_id, name_hebrew, name_english, slug) VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(rabbi_id)
    .bind(series_slug)
    .bind(series_slug)
    .bind(series_slug)
    .fetch_one(pool)
    .await?
    .get("id");
    Ok(series_id)
}
