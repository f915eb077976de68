//! Catalog refresh: run the crawler, wait for it, check the table landed.
//!
//! # Sequence
//!
//! 1. Start the crawler. If it is already running that run is awaited
//!    instead; a second start is never attempted.
//! 2. Poll the crawler state until it is `READY` again.
//! 3. List the tables of the configured database and fail if the expected
//!    headline table is missing.

use crate::config::CatalogConfig;
use crate::error::PipelineError;
use crate::wait::{Poller, Probe};
use aws_sdk_glue::Client;
use aws_sdk_glue::error::DisplayErrorContext;
use std::fmt;
use tracing::{error, info, instrument, warn};

/// How a start request was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlStart {
    Started,
    AlreadyRunning,
}

/// Crawler lifecycle as reported by the catalog service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlerState {
    Ready,
    Running,
    Stopping,
    Other(String),
}

impl CrawlerState {
    pub fn from_name(name: &str) -> Self {
        match name {
            "READY" => CrawlerState::Ready,
            "RUNNING" => CrawlerState::Running,
            "STOPPING" => CrawlerState::Stopping,
            other => CrawlerState::Other(other.to_string()),
        }
    }
}

impl fmt::Display for CrawlerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrawlerState::Ready => f.write_str("READY"),
            CrawlerState::Running => f.write_str("RUNNING"),
            CrawlerState::Stopping => f.write_str("STOPPING"),
            CrawlerState::Other(s) => f.write_str(s),
        }
    }
}

/// The three catalog calls the refresh needs.
pub trait CatalogClient {
    async fn start_crawler(&self, name: &str) -> Result<CrawlStart, PipelineError>;

    /// `None` when the service answered without a state.
    async fn crawler_state(&self, name: &str) -> Result<Option<CrawlerState>, PipelineError>;

    /// Every table name in `database`.
    async fn list_tables(&self, database: &str) -> Result<Vec<String>, PipelineError>;
}

/// Summary of a successful refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    pub crawler: String,
    pub start: CrawlStart,
    pub polls: u32,
    pub table: String,
}

/// Run the crawler to completion and confirm the expected table exists.
#[instrument(level = "info", skip_all, fields(crawler = %config.crawler_name))]
pub async fn refresh_catalog<C: CatalogClient>(
    client: &C,
    config: &CatalogConfig,
    poller: &Poller,
) -> Result<CrawlReport, PipelineError> {
    let crawler = config.crawler_name.as_str();

    let start = client.start_crawler(crawler).await.map_err(|e| {
        error!(error = %e, "Failed to start crawler");
        e
    })?;
    match start {
        CrawlStart::Started => info!("Crawler started"),
        CrawlStart::AlreadyRunning => info!("Crawler already running; waiting for current run"),
    }

    let mut polls = 0u32;
    poller
        .until("crawler", |attempt| {
            polls = attempt;
            async move {
                match client.crawler_state(crawler).await {
                    Err(e) => Err(e),
                    Ok(None) => {
                        error!(attempt, "Crawler state missing from response");
                        Err(PipelineError::MissingCrawlerState(crawler.to_string()))
                    }
                    Ok(Some(CrawlerState::Ready)) => Ok(Probe::Done(())),
                    Ok(Some(state)) => {
                        info!(attempt, %state, interval = ?poller.interval(), "Crawler still working");
                        Ok(Probe::Pending)
                    }
                }
            }
        })
        .await?;
    info!(polls, "Crawler finished");

    let tables = client.list_tables(&config.database).await?;
    if !tables.iter().any(|t| t == &config.table) {
        warn!(
            database = %config.database,
            table = %config.table,
            found = tables.len(),
            "Expected table not found in catalog"
        );
        return Err(PipelineError::TableMissing {
            database: config.database.clone(),
            table: config.table.clone(),
        });
    }
    info!(database = %config.database, table = %config.table, "Catalog table present");

    Ok(CrawlReport {
        crawler: crawler.to_string(),
        start,
        polls,
        table: config.table.clone(),
    })
}

/// Glue-backed [`CatalogClient`].
#[derive(Debug, Clone)]
pub struct GlueCatalog {
    client: Client,
}

impl GlueCatalog {
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }
}

impl CatalogClient for GlueCatalog {
    #[instrument(level = "info", skip(self))]
    async fn start_crawler(&self, name: &str) -> Result<CrawlStart, PipelineError> {
        match self.client.start_crawler().name(name).send().await {
            Ok(_) => Ok(CrawlStart::Started),
            Err(e) => {
                let running = e
                    .as_service_error()
                    .is_some_and(|service| service.is_crawler_running_exception());
                if running {
                    Ok(CrawlStart::AlreadyRunning)
                } else {
                    Err(PipelineError::Catalog(DisplayErrorContext(&e).to_string()))
                }
            }
        }
    }

    #[instrument(level = "debug", skip(self))]
    async fn crawler_state(&self, name: &str) -> Result<Option<CrawlerState>, PipelineError> {
        let response = self
            .client
            .get_crawler()
            .name(name)
            .send()
            .await
            .map_err(|e| PipelineError::Catalog(DisplayErrorContext(&e).to_string()))?;
        Ok(response
            .crawler()
            .and_then(|c| c.state())
            .map(|state| CrawlerState::from_name(state.as_str())))
    }

    #[instrument(level = "info", skip(self))]
    async fn list_tables(&self, database: &str) -> Result<Vec<String>, PipelineError> {
        let mut names = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let response = self
                .client
                .get_tables()
                .database_name(database)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| PipelineError::Catalog(DisplayErrorContext(&e).to_string()))?;
            names.extend(response.table_list().iter().map(|t| t.name().to_string()));
            match response.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeCatalog {
        start: Option<CrawlStart>,
        start_fails: bool,
        states: RefCell<VecDeque<Option<CrawlerState>>>,
        tables: Vec<String>,
        start_calls: Cell<u32>,
        state_calls: Cell<u32>,
    }

    impl FakeCatalog {
        fn new(start: CrawlStart, states: Vec<Option<CrawlerState>>, tables: &[&str]) -> Self {
            Self {
                start: Some(start),
                states: RefCell::new(states.into()),
                tables: tables.iter().map(|t| t.to_string()).collect(),
                ..Default::default()
            }
        }
    }

    impl CatalogClient for FakeCatalog {
        async fn start_crawler(&self, _name: &str) -> Result<CrawlStart, PipelineError> {
            self.start_calls.set(self.start_calls.get() + 1);
            if self.start_fails {
                return Err(PipelineError::Catalog("access denied".to_string()));
            }
            Ok(self.start.unwrap_or(CrawlStart::Started))
        }

        async fn crawler_state(&self, _name: &str) -> Result<Option<CrawlerState>, PipelineError> {
            self.state_calls.set(self.state_calls.get() + 1);
            Ok(self
                .states
                .borrow_mut()
                .pop_front()
                .unwrap_or(Some(CrawlerState::Ready)))
        }

        async fn list_tables(&self, _database: &str) -> Result<Vec<String>, PipelineError> {
            Ok(self.tables.clone())
        }
    }

    fn poller() -> Poller {
        Poller::new(Duration::from_secs(10))
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_running_is_success_with_single_start() {
        let fake = FakeCatalog::new(
            CrawlStart::AlreadyRunning,
            vec![Some(CrawlerState::Running), Some(CrawlerState::Ready)],
            &["s3pnt3headlines"],
        );
        let report = refresh_catalog(&fake, &CatalogConfig::default(), &poller())
            .await
            .unwrap();
        assert_eq!(report.start, CrawlStart::AlreadyRunning);
        assert_eq!(fake.start_calls.get(), 1);
        assert_eq!(report.polls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_ready() {
        let fake = FakeCatalog::new(
            CrawlStart::Started,
            vec![
                Some(CrawlerState::Running),
                Some(CrawlerState::Running),
                Some(CrawlerState::Stopping),
                Some(CrawlerState::Ready),
            ],
            &["other", "s3pnt3headlines"],
        );
        let report = refresh_catalog(&fake, &CatalogConfig::default(), &poller())
            .await
            .unwrap();
        assert_eq!(report.polls, 4);
        assert_eq!(fake.state_calls.get(), 4);
        assert_eq!(report.table, "s3pnt3headlines");
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_state_fails() {
        let fake = FakeCatalog::new(CrawlStart::Started, vec![None], &["s3pnt3headlines"]);
        let err = refresh_catalog(&fake, &CatalogConfig::default(), &poller())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::MissingCrawlerState(ref c) if c == "crawlers3pt3"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_table_fails() {
        let fake = FakeCatalog::new(CrawlStart::Started, vec![], &["something_else"]);
        let err = refresh_catalog(&fake, &CatalogConfig::default(), &poller())
            .await
            .unwrap_err();
        match err {
            PipelineError::TableMissing { database, table } => {
                assert_eq!(database, "dbs3pnt3");
                assert_eq!(table, "s3pnt3headlines");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_failure_stops_before_polling() {
        let fake = FakeCatalog {
            start_fails: true,
            ..Default::default()
        };
        let err = refresh_catalog(&fake, &CatalogConfig::default(), &poller())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Catalog(_)));
        assert_eq!(fake.state_calls.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_crawler_times_out() {
        let fake = FakeCatalog::new(
            CrawlStart::Started,
            vec![Some(CrawlerState::Running); 100],
            &["s3pnt3headlines"],
        );
        let bounded = poller().with_timeout(Some(Duration::from_secs(60)));
        let err = refresh_catalog(&fake, &CatalogConfig::default(), &bounded)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::TimedOut { .. }));
    }

    #[test]
    fn test_state_names() {
        assert_eq!(CrawlerState::from_name("READY"), CrawlerState::Ready);
        assert_eq!(CrawlerState::from_name("RUNNING"), CrawlerState::Running);
        assert_eq!(
            CrawlerState::from_name("SOMETHING"),
            CrawlerState::Other("SOMETHING".to_string())
        );
        assert_eq!(CrawlerState::Stopping.to_string(), "STOPPING");
    }
}
