//! Media fetcher: downloads best-available audio for one video via `yt-dlp`
//! into a temporary directory whose lifetime is tied to the returned handle.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::process::Command;
use tracing::info;

use crate::error::{Result, SyncError};
use crate::youtube::watch_url;

/// A downloaded audio file inside its scoped temp directory. The directory
/// (and the file) is removed when this handle drops, on every exit path.
#[derive(Debug)]
pub struct TempAudio {
    _dir: TempDir,
    path: PathBuf,
}

impl TempAudio {
    /// Wrap an already-downloaded file; `path` must live inside `dir`.
    pub fn new(dir: TempDir, path: PathBuf) -> Self {
        Self { _dir: dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Download the audio track of `video_id` as an mp3. No internal retry;
    /// retry policy belongs to the orchestrator.
    async fn download_audio(&self, video_id: &str) -> Result<TempAudio>;
}

#[derive(Debug, Default, Clone)]
pub struct YtDlpFetcher;

impl YtDlpFetcher {
    /// Ensure the `yt-dlp` binary is available on PATH by invoking
    /// `yt-dlp --version`.
    pub async fn ensure_available() -> Result<()> {
        let status = Command::new("yt-dlp")
            .arg("--version")
            .kill_on_drop(true)
            .status()
            .await;
        match status {
            Ok(s) if s.success() => Ok(()),
            Ok(s) => Err(SyncError::FetchFailed {
                video_id: String::new(),
                reason: format!("yt-dlp not available (exit status {})", s),
            }),
            Err(e) => Err(SyncError::FetchFailed {
                video_id: String::new(),
                reason: format!("yt-dlp not available: {}", e),
            }),
        }
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn download_audio(&self, video_id: &str) -> Result<TempAudio> {
        let fetch_err = |reason: String| SyncError::FetchFailed {
            video_id: video_id.to_string(),
            reason,
        };

        let dir = TempDir::new().map_err(|e| fetch_err(format!("temp dir: {}", e)))?;
        // yt-dlp appends the final extension itself.
        let template = dir.path().join(format!("{}.%(ext)s", video_id));
        let url = watch_url(video_id);

        info!(video_id, "downloading audio");
        let output = Command::new("yt-dlp")
            .arg("--format")
            .arg("bestaudio/best")
            .arg("--extract-audio")
            .arg("--audio-format")
            .arg("mp3")
            .arg("--audio-quality")
            .arg("192K")
            .arg("--no-warnings")
            .arg("--output")
            .arg(&template)
            .arg(&url)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| fetch_err(format!("failed to spawn yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail = stderr.lines().last().unwrap_or("no output").to_string();
            return Err(fetch_err(format!(
                "yt-dlp exited with {}: {}",
                output.status, tail
            )));
        }

        let path = dir.path().join(format!("{}.mp3", video_id));
        if !path.is_file() {
            return Err(fetch_err("yt-dlp produced no mp3 output".into()));
        }
        Ok(TempAudio { _dir: dir, path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn temp_audio_cleans_up_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.mp3");
        tokio::fs::write(&path, b"fake audio").await.unwrap();
        let dir_path = dir.path().to_path_buf();
        let audio = TempAudio::new(dir, path);
        assert!(audio.path().is_file());
        drop(audio);
        assert!(!dir_path.exists());
    }
}
