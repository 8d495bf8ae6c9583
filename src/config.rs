//! Configuration loader and validator for the ingestion pipelines.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub youtube: Youtube,
    pub storage: Storage,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
}

/// YouTube Data API settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Youtube {
    pub api_key: String,
}

/// Object-store settings and credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Storage {
    pub bucket: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Optional S3-compatible endpoint override. Defaults to the AWS
    /// virtual-hosted URL for `bucket`/`region` when absent.
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
/// - `YOUTUBE_API_KEY`, `AWS_ACCESS_KEY_ID` and `AWS_SECRET_ACCESS_KEY`
///   environment variables override their YAML counterparts so secrets can be
///   kept out of the file entirely.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let mut cfg: Config = serde_yaml::from_str(&content)?;
    apply_env_overrides(&mut cfg);
    validate(&cfg)?;
    Ok(cfg)
}

fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(key) = std::env::var("YOUTUBE_API_KEY") {
        cfg.youtube.api_key = key;
    }
    if let Ok(key) = std::env::var("AWS_ACCESS_KEY_ID") {
        cfg.storage.access_key_id = key;
    }
    if let Ok(key) = std::env::var("AWS_SECRET_ACCESS_KEY") {
        cfg.storage.secret_access_key = key;
    }
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.youtube.api_key.trim().is_empty() {
        return Err(ConfigError::Invalid("youtube.api_key must be non-empty"));
    }
    if cfg.storage.bucket.trim().is_empty() {
        return Err(ConfigError::Invalid("storage.bucket must be non-empty"));
    }
    if cfg.storage.region.trim().is_empty() {
        return Err(ConfigError::Invalid("storage.region must be non-empty"));
    }
    if cfg.storage.access_key_id.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "storage.access_key_id must be non-empty",
        ));
    }
    if cfg.storage.secret_access_key.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "storage.secret_access_key must be non-empty",
        ));
    }
    if let Some(endpoint) = &cfg.storage.endpoint {
        if endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "storage.endpoint must be non-empty when set",
            ));
        }
    }
    Ok(())
}

/// Example YAML configuration, also used as a fixture by tests.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"

youtube:
  api_key: "YOUR_YOUTUBE_API_KEY"

storage:
  bucket: "kol-torah-media"
  region: "us-east-1"
  access_key_id: "YOUR_AWS_ACCESS_KEY_ID"
  secret_access_key: "YOUR_AWS_SECRET_ACCESS_KEY"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.storage.bucket, "kol-torah-media");
        assert!(cfg.storage.endpoint.is_none());
    }

    #[test]
    fn invalid_api_key() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.youtube.api_key = "".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("youtube.api_key")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_storage_fields() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.storage.bucket = "".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.storage.region = "".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.storage.secret_access_key = "".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.storage.endpoint = Some("  ".into());
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn ensure_dirs_creates_data_dir() {
        let td = tempdir().unwrap();
        let data_path = td.path().join("data");
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = data_path.to_string_lossy().to_string();
        cfg.ensure_dirs().unwrap();
        assert!(data_path.exists());
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.storage.region, "us-east-1");
    }
}
