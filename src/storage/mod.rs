//! S3 object-store client: existence checks, uploads, and deterministic key
//! derivation for audio and transcript artifacts.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::{Client, StatusCode, Url};
use std::fmt;
use std::path::Path;
use tracing::info;

use crate::config::Storage;
use crate::error::{Result, SyncError};
use crate::storage::sigv4::{authorization_header, sha256_hex, uri_encode, Credentials};

pub mod sigv4;

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// The bucket this client writes to; recorded alongside each object key.
    fn bucket(&self) -> &str;

    /// Whether an object exists at `key`. A clean not-found is `Ok(false)`;
    /// any other store-level error is `StoreUnavailable`.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Upload a local file to `key`. The object becomes visible only once
    /// fully written (single atomic PUT).
    async fn upload(&self, local: &Path, key: &str, content_type: &str) -> Result<()>;
}

/// Deterministic object key for a video's audio artifact:
/// `{rabbi-slug}/{series-slug}/{YYYY-MM-DD}-{video-id}.{ext}`.
pub fn audio_key(
    rabbi_slug: &str,
    series_slug: &str,
    publish_date: NaiveDate,
    video_id: &str,
    extension: &str,
) -> String {
    format!(
        "{}/{}/{}-{}.{}",
        rabbi_slug,
        series_slug,
        publish_date.format("%Y-%m-%d"),
        video_id,
        extension
    )
}

/// Transcript key derived from the audio key: same path, `.json` extension, so
/// the transcript is colocated next to its source.
pub fn transcript_key_for(audio_key: &str) -> String {
    match audio_key.rsplit_once('.') {
        Some((stem, _)) => format!("{}.json", stem),
        None => format!("{}.json", audio_key),
    }
}

#[derive(Clone)]
pub struct S3Client {
    http: Client,
    endpoint: Url,
    host: String,
    bucket: String,
    region: String,
    credentials: Credentials,
}

impl fmt::Debug for S3Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Client")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl S3Client {
    pub fn from_config(cfg: &Storage) -> Result<Self> {
        let endpoint = match &cfg.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!("https://{}.s3.{}.amazonaws.com", cfg.bucket, cfg.region),
        };
        let endpoint = Url::parse(&endpoint)
            .map_err(|e| SyncError::StoreUnavailable(format!("invalid endpoint: {}", e)))?;
        let host = endpoint
            .host_str()
            .ok_or_else(|| SyncError::StoreUnavailable("endpoint has no host".into()))?
            .to_string();
        let http = Client::builder()
            .user_agent("kol-ingest/0.1")
            .build()
            .map_err(|e| SyncError::StoreUnavailable(format!("http client: {}", e)))?;
        Ok(Self {
            http,
            endpoint,
            host,
            bucket: cfg.bucket.clone(),
            region: cfg.region.clone(),
            credentials: Credentials {
                access_key_id: cfg.access_key_id.clone(),
                secret_access_key: cfg.secret_access_key.clone(),
            },
        })
    }

    fn object_url(&self, key: &str) -> Result<(Url, String)> {
        // Keep any path on a custom endpoint (e.g. path-style buckets).
        let base_path = self.endpoint.path().trim_end_matches('/');
        let canonical_uri = format!("{}/{}", base_path, uri_encode(key, false));
        let mut url = self.endpoint.clone();
        url.set_path(&canonical_uri);
        Ok((url, canonical_uri))
    }

    fn signed_headers(
        &self,
        method: &str,
        canonical_uri: &str,
        payload_hash: &str,
        content_type: Option<&str>,
    ) -> Vec<(String, String)> {
        let amz_date = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
        let mut headers = vec![
            ("host".to_string(), self.host.clone()),
            ("x-amz-content-sha256".to_string(), payload_hash.to_string()),
            ("x-amz-date".to_string(), amz_date.clone()),
        ];
        if let Some(content_type) = content_type {
            headers.push(("content-type".to_string(), content_type.to_string()));
        }
        let authorization = authorization_header(
            &self.credentials,
            &self.region,
            method,
            canonical_uri,
            "",
            &headers,
            payload_hash,
            &amz_date,
        );
        headers.push(("authorization".to_string(), authorization));
        headers
    }
}

#[async_trait]
impl ArtifactStore for S3Client {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let (url, canonical_uri) = self.object_url(key)?;
        let mut request = self.http.head(url);
        for (name, value) in
            self.signed_headers("HEAD", &canonical_uri, sigv4::EMPTY_PAYLOAD_HASH, None)
        {
            request = request.header(name, value);
        }
        let res = request
            .send()
            .await
            .map_err(|e| SyncError::StoreUnavailable(format!("HEAD {} failed: {}", key, e)))?;
        match res.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(SyncError::StoreUnavailable(format!(
                "HEAD {} returned {}",
                key, status
            ))),
        }
    }

    async fn upload(&self, local: &Path, key: &str, content_type: &str) -> Result<()> {
        let body = tokio::fs::read(local).await?;
        let payload_hash = sha256_hex(&body);
        let size_mb = body.len() as f64 / (1024.0 * 1024.0);

        let (url, canonical_uri) = self.object_url(key)?;
        let mut request = self.http.put(url).body(body);
        for (name, value) in
            self.signed_headers("PUT", &canonical_uri, &payload_hash, Some(content_type))
        {
            request = request.header(name, value);
        }

        info!(key, size_mb = format!("{:.2}", size_mb), "uploading object");
        let res = request
            .send()
            .await
            .map_err(|e| SyncError::StoreUnavailable(format!("PUT {} failed: {}", key, e)))?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(SyncError::StoreUnavailable(format!(
                "PUT {} returned {}: {}",
                key, status, body
            )));
        }
        info!(key, "upload complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_key_is_deterministic() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(
            audio_key("butbul", "daily-halacha", date, "abc123", "mp3"),
            "butbul/daily-halacha/2024-01-05-abc123.mp3"
        );
    }

    #[test]
    fn transcript_key_swaps_extension() {
        assert_eq!(
            transcript_key_for("butbul/daily-halacha/2024-01-05-abc123.mp3"),
            "butbul/daily-halacha/2024-01-05-abc123.json"
        );
        // No extension to swap: append.
        assert_eq!(transcript_key_for("a/b/c"), "a/b/c.json");
    }

    #[test]
    fn default_endpoint_is_virtual_hosted() {
        let cfg = Storage {
            bucket: "kol-torah-media".into(),
            region: "us-east-1".into(),
            access_key_id: "id".into(),
            secret_access_key: "secret".into(),
            endpoint: None,
        };
        let client = S3Client::from_config(&cfg).unwrap();
        assert_eq!(client.host, "kol-torah-media.s3.us-east-1.amazonaws.com");
        let (url, canonical_uri) = client.object_url("butbul/x/y.mp3").unwrap();
        assert_eq!(canonical_uri, "/butbul/x/y.mp3");
        assert_eq!(url.path(), "/butbul/x/y.mp3");
    }
}
