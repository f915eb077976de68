//! Fixed-interval polling with an optional deadline and cancellation.
//!
//! Both the crawler and the cluster are waited on the same way: probe the
//! external state, and if it is not terminal yet sleep for a fixed interval
//! and probe again. [`Poller`] bounds that loop with an optional overall
//! timeout and a [`CancellationToken`], and it runs on `tokio::time` so tests
//! can drive it on a paused clock.

use crate::error::PipelineError;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What one probe observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe<T> {
    /// Terminal state reached; stop polling with this value.
    Done(T),
    /// Not there yet; sleep and probe again.
    Pending,
}

#[derive(Debug, Clone)]
pub struct Poller {
    interval: Duration,
    timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl Poller {
    /// Poll every `interval` with no deadline and a fresh token.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            timeout: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Probe until it reports [`Probe::Done`].
    ///
    /// The first probe runs immediately. A probe error ends the wait with
    /// that error. `what` names the awaited thing in logs and errors.
    pub async fn until<T, F, Fut>(&self, what: &str, mut probe: F) -> Result<T, PipelineError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Probe<T>, PipelineError>>,
    {
        let started = Instant::now();
        let interval = self.interval;

        let polling = async {
            let mut attempt = 0u32;
            loop {
                attempt += 1;
                match probe(attempt).await {
                    Err(e) => return Err(e),
                    Ok(Probe::Done(value)) => {
                        info!(
                            what,
                            attempt,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "Wait finished"
                        );
                        return Ok(value);
                    }
                    Ok(Probe::Pending) => {
                        debug!(what, attempt, ?interval, "Not finished; sleeping");
                        sleep(interval).await;
                    }
                }
            }
        };

        let bounded = async {
            match self.timeout {
                Some(limit) => match timeout(limit, polling).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(what, ?limit, "Wait timed out");
                        Err(PipelineError::TimedOut {
                            what: what.to_string(),
                            after: limit,
                        })
                    }
                },
                None => polling.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                warn!(what, "Wait cancelled");
                Err(PipelineError::Cancelled(what.to_string()))
            }
            result = bounded => result,
        }
    }
}
