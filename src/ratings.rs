// src/ratings.rs
use crate::cache::RatingCache;
use crate::fetcher::{FetchOutcome, RatingFetcher};
use crate::record::RatingRecord;
use crate::settings::SettingsStore;

use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RatingOrigin {
    Cache,
    Network,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found {
        record: RatingRecord,
        origin: RatingOrigin,
    },
    /// No API key configured: nothing was fetched and nothing may be shown.
    NoApiKey,
}

impl Resolution {
    pub fn record(&self) -> Option<&RatingRecord> {
        match self {
            Resolution::Found { record, .. } => Some(record),
            Resolution::NoApiKey => None,
        }
    }
}

/// Cache-through rating lookup shared by the enrichment scan and the HTTP surface.
#[derive(Clone)]
pub struct RatingService {
    cache: RatingCache,
    fetcher: Arc<RatingFetcher>,
    settings: SettingsStore,
}

impl RatingService {
    pub fn new(cache: RatingCache, fetcher: Arc<RatingFetcher>, settings: SettingsStore) -> Self {
        Self {
            cache,
            fetcher,
            settings,
        }
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    /// Cached records are returned as-is. Otherwise the API is asked; only
    /// catalog matches are written back, so a title that is unknown today is
    /// looked up again on the next scan.
    pub async fn resolve(&self, title: &str) -> Resolution {
        if let Some(record) = self.cache.get(title).await {
            return Resolution::Found {
                record,
                origin: RatingOrigin::Cache,
            };
        }

        let api_key = self.settings.api_key().await;
        let Some(outcome) = self.fetcher.fetch_outcome(title, api_key.as_deref()).await else {
            tracing::debug!(target: "fetch", %title, "no api key; skipping lookup");
            return Resolution::NoApiKey;
        };

        if let FetchOutcome::Matched(record) = &outcome {
            self.cache.put(title, record).await;
        }
        Resolution::Found {
            record: outcome.into_record(),
            origin: RatingOrigin::Network,
        }
    }
}
