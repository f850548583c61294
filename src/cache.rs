// src/cache.rs
use std::sync::Arc;

use metrics::counter;

use crate::record::RatingRecord;
use crate::store::KeyValueStore;

/// Durable title → rating mapping.
///
/// Keys are the raw title strings: no case folding, no trimming beyond what
/// the site adapter already did. Storage failures degrade to a miss on read
/// and are logged on write; they never reach the enrichment path.
#[derive(Clone)]
pub struct RatingCache {
    store: Arc<dyn KeyValueStore>,
}

impl RatingCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, title: &str) -> Option<RatingRecord> {
        let raw = match self.store.get(title).await {
            Ok(v) => v?,
            Err(e) => {
                tracing::warn!(target: "cache", error = %e, "rating cache read failed");
                return None;
            }
        };
        match serde_json::from_value::<RatingRecord>(raw) {
            Ok(rec) => {
                counter!("ratings_cache_hits_total").increment(1);
                Some(rec)
            }
            Err(e) => {
                tracing::warn!(target: "cache", error = %e, "ignoring malformed cache entry");
                None
            }
        }
    }

    pub async fn put(&self, title: &str, record: &RatingRecord) {
        let value = match serde_json::to_value(record) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(target: "cache", error = %e, "rating record not serializable");
                return;
            }
        };
        if let Err(e) = self.store.set(title, value).await {
            tracing::warn!(target: "cache", error = %e, "rating cache write failed");
        }
    }
}
