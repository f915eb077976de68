//! Raw page to partitioned CSV.
//!
//! [`process_object`] handles one upload: check the key, fetch the page,
//! detect the newspaper, extract headlines, and store the CSV at the
//! partition derived from the file name. [`handle_event`] runs that for each
//! record of an object-created notification.
//!
//! Unknown sites and malformed names are skips, not failures. Storage faults
//! fail the record; the event result is a failure if any record failed.

use crate::config::StorageConfig;
use crate::error::PipelineError;
use crate::models::{ExtractionOutcome, Headline, InvocationResult, ObjectCreatedEvent, PartitionKey, SkipReason};
use crate::outputs::headline_csv::{CSV_CONTENT_TYPE, headlines_to_csv};
use crate::partition::is_raw_object;
use crate::scrapers::{detect_site, extract_headlines};
use crate::storage::ObjectStore;
use crate::utils::truncate_for_log;
use scraper::Html;
use tracing::{debug, error, info, instrument, warn};

/// Turn one raw upload into its partition CSV.
#[instrument(level = "info", skip(store, storage))]
pub async fn process_object<S: ObjectStore>(
    store: &S,
    storage: &StorageConfig,
    bucket: &str,
    key: &str,
) -> Result<ExtractionOutcome, PipelineError> {
    if !is_raw_object(key, storage) {
        warn!("Object is not a raw HTML upload; skipping");
        return Ok(ExtractionOutcome::Skipped(SkipReason::NotRawObject));
    }
    let Some(partition) = PartitionKey::from_object_key(key, storage) else {
        warn!("File name does not match <label>-<site>-<year>-<month>-<day>; skipping");
        return Ok(ExtractionOutcome::Skipped(SkipReason::MalformedKey));
    };
    let csv_key = partition.csv_key(storage);

    let body = store.get_object(bucket, key).await?;
    let html = String::from_utf8(body).map_err(|source| PipelineError::Decode {
        key: key.to_string(),
        source,
    })?;
    debug!(bytes = html.len(), preview = %truncate_for_log(&html, 120), "Fetched raw page");

    let Some(headlines) = parse_page(key, &html) else {
        warn!("Could not determine the newspaper; skipping");
        return Ok(ExtractionOutcome::Skipped(SkipReason::UnknownSite));
    };

    let rows = headlines.len();
    let csv = headlines_to_csv(&headlines)?;
    store.put_object(bucket, &csv_key, csv, CSV_CONTENT_TYPE).await?;
    info!(%csv_key, rows, "Headline CSV stored");

    Ok(ExtractionOutcome::Written { csv_key, rows })
}

/// Parse and extract in one synchronous step so the DOM never lives across
/// an await. `None` when the site is unknown.
fn parse_page(key: &str, html: &str) -> Option<Vec<Headline>> {
    let document = Html::parse_document(html);
    let site = detect_site(key, &document)?;
    info!(%site, "Newspaper detected");
    Some(extract_headlines(site, &document))
}

/// Process every record of a notification.
#[instrument(level = "info", skip_all, fields(records = event.records.len()))]
pub async fn handle_event<S: ObjectStore>(
    store: &S,
    storage: &StorageConfig,
    event: &ObjectCreatedEvent,
) -> InvocationResult {
    if event.records.is_empty() {
        warn!("Event carries no storage records");
        return InvocationResult::bad_request("unsupported event: no storage records");
    }

    let mut written = 0usize;
    let mut skipped = 0usize;
    let mut failures = Vec::new();

    for record in &event.records {
        let bucket = record.s3.bucket.name.as_str();
        let key = record.decoded_key();
        info!(%bucket, %key, "Record received");

        match process_object(store, storage, bucket, &key).await {
            Ok(ExtractionOutcome::Written { .. }) => written += 1,
            Ok(ExtractionOutcome::Skipped(reason)) => {
                info!(%key, %reason, "Record skipped");
                skipped += 1;
            }
            Err(e) => {
                error!(%key, error = %e, "Record failed");
                failures.push(format!("{key}: {e}"));
            }
        }
    }

    let summary = format!(
        "{written} written, {skipped} skipped, {} failed",
        failures.len()
    );
    if failures.is_empty() {
        InvocationResult::ok(summary)
    } else {
        InvocationResult::failed(format!("{summary}; {}", failures.join("; ")))
    }
}
