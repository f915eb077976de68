//! # Headline Pipeline
//!
//! Event-driven glue that moves scraped newspaper front pages through the
//! headline pipeline: extract headlines from raw HTML into partitioned CSVs,
//! refresh the metadata catalog over those partitions, and run the downstream
//! analytics job on a transient cluster.
//!
//! ## Usage
//!
//! ```sh
//! headline_pipeline event --file event.json
//! headline_pipeline extract -b headlinesdyn -k headlines/raw/x-portafolio-2024-05-01.html
//! headline_pipeline refresh-catalog
//! headline_pipeline run-cluster-job
//! ```
//!
//! ## Architecture
//!
//! Every command is one independent invocation:
//! 1. **Extraction**: raw page → newspaper detection → headlines → CSV partition
//! 2. **Catalog refresh**: start crawler → wait for `READY` → check table
//! 3. **Cluster job**: create cluster with one step → wait for termination
//!
//! The result is printed to stdout as `{"statusCode": .., "body": ..}`; logs
//! go to stderr.

use aws_config::{BehaviorVersion, Region, SdkConfig};
use chrono::Utc;
use clap::Parser;
use std::error::Error;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod catalog;
mod cli;
mod cluster;
mod config;
mod error;
mod models;
mod outputs;
mod partition;
mod pipeline;
mod scrapers;
mod storage;
mod utils;
mod wait;

use catalog::{GlueCatalog, refresh_catalog};
use cli::{Cli, Command};
use cluster::{EmrClusters, run_cluster_job};
use config::PipelineConfig;
use models::{ExtractionOutcome, InvocationResult, ObjectCreatedEvent};
use pipeline::{handle_event, process_object};
use storage::{LocalStore, S3Store, Store};
use utils::ensure_writable_dir;
use wait::Poller;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    let start_time = std::time::Instant::now();
    info!(invoked_at = %Utc::now().to_rfc3339(), "headline_pipeline starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let config = PipelineConfig::load(args.config.as_deref()).await?;

    // Early check: a local store root must be writable before any work starts
    if let Some(root) = &args.local_root {
        if let Err(e) = ensure_writable_dir(root).await {
            error!(
                path = %root.display(),
                error = %e,
                "Local store root is not writable (fix perms or choose a different path)"
            );
            return Err(e);
        }
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; cancelling");
            on_interrupt.cancel();
        }
    });

    let result = run(&args, &config, cancel).await;
    println!("{}", serde_json::to_string(&result)?);

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        status = result.status_code,
        "Execution complete"
    );

    if result.is_success() {
        Ok(())
    } else {
        Err(format!("invocation failed with status {}: {}", result.status_code, result.body).into())
    }
}

/// Dispatch the selected command and fold its outcome into one result.
async fn run(args: &Cli, config: &PipelineConfig, cancel: CancellationToken) -> InvocationResult {
    match &args.command {
        Command::Event { file } => {
            let event = match read_event(file.as_deref()).await {
                Ok(event) => event,
                Err(e) => {
                    error!(error = %e, "Could not read event");
                    return InvocationResult::bad_request(format!("unsupported event: {e}"));
                }
            };
            let store = open_store(args).await;
            handle_event(&store, &config.storage, &event).await
        }
        Command::Extract { bucket, key } => {
            let store = open_store(args).await;
            match process_object(&store, &config.storage, bucket, key).await {
                Ok(ExtractionOutcome::Written { csv_key, rows }) => {
                    InvocationResult::ok(format!("{rows} headlines written to {csv_key}"))
                }
                Ok(ExtractionOutcome::Skipped(reason)) => {
                    InvocationResult::ok(format!("{key} skipped: {reason}"))
                }
                Err(e) => {
                    error!(%key, error = %e, "Extraction failed");
                    InvocationResult::failed(format!("error processing {key}: {e}"))
                }
            }
        }
        Command::RefreshCatalog { timeout_secs } => {
            let catalog = GlueCatalog::new(&load_sdk_config(args.region.clone()).await);
            let poller = Poller::new(config.catalog.poll_interval())
                .with_timeout(timeout_secs.map(Duration::from_secs).or(config.catalog.timeout()))
                .with_cancellation(cancel);
            match refresh_catalog(&catalog, &config.catalog, &poller).await {
                Ok(report) => InvocationResult::ok(format!(
                    "crawler '{}' finished after {} polls and table '{}' is present",
                    report.crawler, report.polls, report.table
                )),
                Err(e) => {
                    error!(error = %e, "Catalog refresh failed");
                    InvocationResult::failed(format!("catalog refresh failed: {e}"))
                }
            }
        }
        Command::RunClusterJob { timeout_secs } => {
            let clusters = EmrClusters::new(&load_sdk_config(args.region.clone()).await);
            let poller = Poller::new(config.cluster.poll_interval())
                .with_timeout(timeout_secs.map(Duration::from_secs).or(config.cluster.timeout()))
                .with_cancellation(cancel);
            match run_cluster_job(&clusters, &config.cluster, &poller).await {
                Ok(run) if run.succeeded() => InvocationResult::ok(format!(
                    "cluster {} finished its job and terminated",
                    run.cluster_id
                )),
                Ok(run) => InvocationResult::failed(format!(
                    "cluster {} ended in {}",
                    run.cluster_id, run.final_state
                )),
                Err(e) => {
                    error!(error = %e, "Cluster job failed");
                    InvocationResult::failed(format!("cluster job failed: {e}"))
                }
            }
        }
    }
}

/// Local directory when `--local-root` is set, S3 otherwise.
async fn open_store(args: &Cli) -> Store {
    match &args.local_root {
        Some(root) => {
            info!(root = %root.display(), "Using local object store");
            Store::Local(LocalStore::new(root))
        }
        None => Store::S3(S3Store::new(&load_sdk_config(args.region.clone()).await)),
    }
}

#[instrument(level = "info")]
async fn load_sdk_config(region: Option<String>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(Region::new(region));
    }
    loader.load().await
}

/// Read an event document from `path`, or from stdin when absent.
#[instrument(level = "info")]
async fn read_event(path: Option<&Path>) -> Result<ObjectCreatedEvent, Box<dyn Error>> {
    let text = match path {
        Some(path) => tokio::fs::read_to_string(path).await?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await?;
            buf
        }
    };
    debug!(event = %utils::truncate_for_log(&text, 500), "Event received");
    Ok(serde_json::from_str(&text)?)
}
