//! Data models shared across the pipeline.
//!
//! - [`Site`]: the newspapers whose front pages we know how to parse
//! - [`Headline`]: one extracted `(category, title, link)` row
//! - [`PartitionKey`]: site and date parsed from a raw object key
//! - [`ObjectCreatedEvent`]: the storage notification that triggers extraction
//! - [`InvocationResult`]: status code and message returned by every command

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fallback written when an element carries no category.
pub const NO_CATEGORY: &str = "Sin categoría";
/// Fallback written when an element carries no title.
pub const NO_TITLE: &str = "Sin titular";
/// Fallback written when an element carries no link.
pub const NO_LINK: &str = "Sin enlace";

/// A newspaper with a known front-page layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    Portafolio,
    ElTiempo,
}

impl Site {
    /// Detection order for filename matching; first match wins.
    pub const ALL: [Site; 2] = [Site::Portafolio, Site::ElTiempo];

    /// Token that identifies the site inside a raw object key.
    pub fn token(self) -> &'static str {
        match self {
            Site::Portafolio => "portafolio",
            Site::ElTiempo => "eltiempo",
        }
    }

    /// Origin used to absolutize site-relative links.
    pub fn base_url(self) -> &'static str {
        match self {
            Site::Portafolio => "https://www.portafolio.co",
            Site::ElTiempo => "https://www.eltiempo.com",
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// One headline row. Every field is non-empty; absent values hold the
/// `NO_*` sentinels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Headline {
    pub category: String,
    pub title: String,
    pub link: String,
}

/// Site and date segments parsed from `<label>-<site>-<year>-<month>-<day>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionKey {
    pub label: String,
    pub site: String,
    pub year: String,
    pub month: String,
    pub day: String,
}

/// Why an object produced no CSV. None of these fail the invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Key is outside the raw folder or has the wrong extension.
    NotRawObject,
    /// File name does not split into five dash-separated parts.
    MalformedKey,
    /// Neither the key nor the markup identified a known site.
    UnknownSite,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::NotRawObject => "not a raw HTML object",
            SkipReason::MalformedKey => "file name does not match <label>-<site>-<year>-<month>-<day>",
            SkipReason::UnknownSite => "newspaper could not be determined",
        };
        f.write_str(s)
    }
}

/// Result of processing one raw object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    Written { csv_key: String, rows: usize },
    Skipped(SkipReason),
}

/// Object-created notification as delivered by the storage service.
///
/// Only the fields the pipeline reads are modelled.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ObjectCreatedEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<EventRecord>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventRecord {
    pub s3: EventEntity,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventEntity {
    pub bucket: EventBucket,
    pub object: EventObject,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventBucket {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventObject {
    /// URL-encoded object key, spaces as `+`.
    pub key: String,
}

impl EventRecord {
    /// The object key with notification encoding removed.
    ///
    /// Falls back to the raw key when it is not valid percent-encoding.
    pub fn decoded_key(&self) -> String {
        let plus_decoded = self.s3.object.key.replace('+', " ");
        let decoded = urlencoding::decode(&plus_decoded).map(|k| k.into_owned());
        decoded.unwrap_or(plus_decoded)
    }
}

/// Status code and short message returned by every command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationResult {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl InvocationResult {
    pub fn ok(body: impl Into<String>) -> Self {
        Self { status_code: 200, body: body.into() }
    }

    pub fn bad_request(body: impl Into<String>) -> Self {
        Self { status_code: 400, body: body.into() }
    }

    pub fn failed(body: impl Into<String>) -> Self {
        Self { status_code: 500, body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        self.status_code < 400
    }
}
