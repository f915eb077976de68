//! Error type shared by every pipeline component.
//!
//! Unrecognized input (unknown site, malformed key) is not an error: those
//! cases are reported as [`crate::models::SkipReason`]. Everything here is an
//! external or environmental fault that fails the invocation.

use std::io;
use std::string::FromUtf8Error;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("storage request failed: {0}")]
    Storage(String),
    #[error("object '{key}' is not valid UTF-8")]
    Decode {
        key: String,
        #[source]
        source: FromUtf8Error,
    },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("catalog request failed: {0}")]
    Catalog(String),
    #[error("cluster request failed: {0}")]
    Cluster(String),
    #[error("crawler '{0}' reported no state")]
    MissingCrawlerState(String),
    #[error("table '{table}' not found in database '{database}'")]
    TableMissing { database: String, table: String },
    #[error("{what} did not finish within {after:?}")]
    TimedOut { what: String, after: Duration },
    #[error("{0} was cancelled")]
    Cancelled(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<serde_yaml::Error> for PipelineError {
    fn from(e: serde_yaml::Error) -> Self {
        PipelineError::Config(e.to_string())
    }
}
