use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use regex::Regex;
use std::path::PathBuf;
use tracing::info;

use kol_ingest::config;
use kol_ingest::db;
use kol_ingest::fetcher::YtDlpFetcher;
use kol_ingest::model::{CatalogSource, SyncReport};
use kol_ingest::storage::S3Client;
use kol_ingest::sync;
use kol_ingest::youtube::YoutubeClient;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Fetch new videos for a series from YouTube and add them to the catalog
    Fetch {
        /// Rabbi slug the target series belongs to
        #[arg(long, default_value = "butbul")]
        rabbi_slug: String,
        /// Series slug to attach new videos to
        #[arg(long, default_value = "daily-halacha")]
        series_slug: String,
        /// Fetch every video of this playlist
        #[arg(long, conflicts_with = "channel_id")]
        playlist_id: Option<String>,
        /// Fetch from every playlist of this channel whose title matches
        /// --playlist-filter
        #[arg(long, requires = "playlist_filter")]
        channel_id: Option<String>,
        /// Regex applied to channel playlist titles
        #[arg(long)]
        playlist_filter: Option<String>,
        /// Skip videos strictly longer than this many minutes
        #[arg(long)]
        max_duration: Option<f64>,
    },
    /// Download audio for all videos missing it and upload to the object store
    DownloadAudio {
        /// Maximum number of videos to process
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Upload local transcript files (<videoId>.json) and record their locators
    UploadTranscripts {
        /// Directory containing transcript JSON files
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| format!("sqlite://{}/catalog.db", cfg.app.data_dir));
    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    match args.command {
        CliCommand::Fetch {
            rabbi_slug,
            series_slug,
            playlist_id,
            channel_id,
            playlist_filter,
            max_duration,
        } => {
            let source = match (playlist_id, channel_id) {
                (Some(playlist_id), None) => CatalogSource::Playlist { playlist_id },
                (None, Some(channel_id)) => CatalogSource::Channel {
                    channel_id,
                    title_filter: Regex::new(
                        playlist_filter.as_deref().unwrap_or_default(),
                    )?,
                },
                _ => bail!("exactly one of --playlist-id or --channel-id is required"),
            };

            let Some(series) = db::find_series_by_slugs(&pool, &rabbi_slug, &series_slug).await?
            else {
                bail!(
                    "series not found for rabbi '{}' and series '{}'",
                    rabbi_slug,
                    series_slug
                );
            };
            info!(series = %series.name_english, series_id = series.id, "target series");

            let catalog = YoutubeClient::new(cfg.youtube.api_key.clone());
            let report =
                sync::sync_metadata(&pool, &catalog, &source, series.id, max_duration).await?;
            print_report("Metadata sync", "Added", &report);
        }
        CliCommand::DownloadAudio { limit } => {
            YtDlpFetcher::ensure_available().await?;
            let fetcher = YtDlpFetcher;
            let store = S3Client::from_config(&cfg.storage)?;
            let report = sync::migrate_audio(&pool, &fetcher, &store, limit).await?;
            print_report("Audio migration", "Processed", &report);
        }
        CliCommand::UploadTranscripts { dir } => {
            let store = S3Client::from_config(&cfg.storage)?;
            let report = sync::attach_transcripts(&pool, &store, &dir).await?;
            print_report("Transcript upload", "Uploaded", &report);
        }
    }

    Ok(())
}

/// Operator-facing summary. A nonzero failure count is reported, not fatal.
fn print_report(operation: &str, success_label: &str, report: &SyncReport) {
    println!("{}", "=".repeat(50));
    println!("{} complete", operation);
    println!("{}", "=".repeat(50));
    println!("Total:     {}", report.total);
    println!("{:<10} {}", format!("{}:", success_label), report.succeeded);
    println!("Skipped:   {}", report.skipped);
    println!("Failed:    {}", report.failed);
}
