// src/settings.rs
//! Synced settings scope: the rating API key and the two threshold sets.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::error::StoreError;
use crate::store::KeyValueStore;
use crate::thresholds::{default_ranges, validate_ranges, RangeIssue, Scale, ThresholdRange, Thresholds};

pub const API_KEY: &str = "omdbApiKey";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Please enter an API key.")]
    EmptyApiKey,
    #[error("Invalid API key. Please check your key and try again.")]
    InvalidApiKey,
    #[error("range validation failed")]
    InvalidRanges {
        decimal: Vec<RangeIssue>,
        percent: Vec<RangeIssue>,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct SettingsStore {
    store: Arc<dyn KeyValueStore>,
}

impl SettingsStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Stored key, trimmed. Unreadable or blank counts as absent.
    pub async fn api_key(&self) -> Option<String> {
        match self.store.get(API_KEY).await {
            Ok(Some(Value::String(k))) => {
                let k = k.trim();
                (!k.is_empty()).then(|| k.to_string())
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(target: "settings", error = %e, "api key read failed");
                None
            }
        }
    }

    pub async fn set_api_key(&self, key: &str) -> Result<(), SettingsError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(SettingsError::EmptyApiKey);
        }
        self.store.set(API_KEY, Value::String(key.to_string())).await?;
        tracing::info!(target: "settings", "api key saved");
        Ok(())
    }

    /// Stored set for `scale` if it is a non-empty array of ranges, else defaults.
    pub async fn ranges(&self, scale: Scale) -> Vec<ThresholdRange> {
        let raw = match self.store.get(scale.storage_key()).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(target: "settings", error = %e, %scale, "range read failed");
                None
            }
        };
        raw.and_then(|v| serde_json::from_value::<Vec<ThresholdRange>>(v).ok())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| default_ranges(scale))
    }

    pub async fn thresholds(&self) -> Thresholds {
        Thresholds {
            decimal: self.ranges(Scale::Decimal).await,
            percent: self.ranges(Scale::Percent).await,
        }
    }

    /// Validate both sets and persist them only if both pass.
    /// Colors are stored in `#rrggbb` form.
    pub async fn save_ranges(
        &self,
        decimal: Vec<ThresholdRange>,
        percent: Vec<ThresholdRange>,
    ) -> Result<Thresholds, SettingsError> {
        let decimal_issues = validate_ranges(&decimal, Scale::Decimal);
        let percent_issues = validate_ranges(&percent, Scale::Percent);
        if !decimal_issues.is_empty() || !percent_issues.is_empty() {
            return Err(SettingsError::InvalidRanges {
                decimal: decimal_issues,
                percent: percent_issues,
            });
        }

        let t = Thresholds {
            decimal: normalize_colors(decimal),
            percent: normalize_colors(percent),
        };
        self.write_thresholds(&t).await?;
        tracing::info!(target: "settings", "ranges saved");
        Ok(t)
    }

    pub async fn reset_ranges(&self) -> Result<Thresholds, SettingsError> {
        let t = Thresholds::default();
        self.write_thresholds(&t).await?;
        tracing::info!(target: "settings", "ranges reset to defaults");
        Ok(t)
    }

    async fn write_thresholds(&self, t: &Thresholds) -> Result<(), SettingsError> {
        for scale in Scale::ALL {
            let v = serde_json::to_value(t.for_scale(scale)).map_err(StoreError::from)?;
            self.store.set(scale.storage_key(), v).await?;
        }
        Ok(())
    }
}

fn normalize_colors(ranges: Vec<ThresholdRange>) -> Vec<ThresholdRange> {
    ranges
        .into_iter()
        .map(|r| ThresholdRange {
            color: r.color.to_hex(),
            ..r
        })
        .collect()
}
