// src/fetcher/mod.rs
//! Rating lookups with bounded retry.
//!
//! The fetcher is cache-unaware: callers consult [`crate::cache::RatingCache`]
//! first (see [`crate::ratings::RatingService`]).

pub mod omdb;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;

use crate::error::FetchError;
use crate::record::RatingRecord;

pub use omdb::{LookupResponse, OmdbClient};

/// Low-level lookup against the rating API: one request, no retry.
#[async_trait]
pub trait RatingSource: Send + Sync {
    async fn lookup(&self, title: &str, api_key: &str) -> Result<LookupResponse, FetchError>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(300),
        }
    }
}

impl RetryPolicy {
    /// Wait after the failed attempt `attempt` (0-based): `base * 2^attempt`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(16))
    }
}

/// What a fetch learned, before collapsing to a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Matched(RatingRecord),
    /// The API answered: no such title. Never retried.
    NotFound,
    /// Every attempt failed in transport or parsing.
    Exhausted,
}

impl FetchOutcome {
    pub fn into_record(self) -> RatingRecord {
        match self {
            FetchOutcome::Matched(r) => r,
            FetchOutcome::NotFound | FetchOutcome::Exhausted => RatingRecord::neutral(),
        }
    }
}

pub struct RatingFetcher {
    source: Arc<dyn RatingSource>,
    retry: RetryPolicy,
}

impl RatingFetcher {
    pub fn new(source: Arc<dyn RatingSource>) -> Self {
        Self {
            source,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// `None` when no API key is available; no request is made in that case.
    pub async fn fetch_outcome(&self, title: &str, api_key: Option<&str>) -> Option<FetchOutcome> {
        let key = api_key.filter(|k| !k.is_empty())?;

        let attempts = self.retry.attempts.max(1);
        for attempt in 0..attempts {
            counter!("ratings_fetch_attempts_total").increment(1);
            match self.source.lookup(title, key).await {
                Ok(resp) => {
                    let outcome = resp.into_outcome();
                    if outcome == FetchOutcome::NotFound {
                        counter!("ratings_not_found_total").increment(1);
                        tracing::debug!(target: "fetch", %title, "no catalog match");
                    }
                    return Some(outcome);
                }
                Err(e) => {
                    counter!("ratings_fetch_failures_total").increment(1);
                    tracing::warn!(
                        target: "fetch",
                        %title,
                        attempt = attempt + 1,
                        source = self.source.name(),
                        error = %e,
                        "rating lookup failed"
                    );
                    if attempt + 1 < attempts {
                        tokio::time::sleep(self.retry.delay_after(attempt)).await;
                    }
                }
            }
        }

        counter!("ratings_fetch_exhausted_total").increment(1);
        Some(FetchOutcome::Exhausted)
    }

    /// Not-found and exhausted retries both come back as the neutral record.
    pub async fn fetch(&self, title: &str, api_key: Option<&str>) -> Option<RatingRecord> {
        self.fetch_outcome(title, api_key)
            .await
            .map(FetchOutcome::into_record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_base() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_after(0), Duration::from_millis(300));
        assert_eq!(p.delay_after(1), Duration::from_millis(600));
        assert_eq!(p.delay_after(2), Duration::from_millis(1200));
    }

    #[test]
    fn outcomes_collapse_to_neutral() {
        assert_eq!(FetchOutcome::NotFound.into_record(), RatingRecord::neutral());
        assert_eq!(FetchOutcome::Exhausted.into_record(), RatingRecord::neutral());
    }
}
