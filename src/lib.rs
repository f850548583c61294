// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod badge;
pub mod cache;
pub mod config;
pub mod dom;
pub mod error;
pub mod fetcher;
pub mod metrics;
pub mod ratings;
pub mod record;
pub mod scheduler;
pub mod settings;
pub mod sites;
pub mod store;
pub mod thresholds;
pub mod watcher;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::ratings::{RatingService, Resolution};
pub use crate::record::RatingRecord;
pub use crate::scheduler::{EnrichmentScheduler, ScanReport, SchedulerConfig};
pub use crate::watcher::MutationWatcher;

use std::sync::Arc;

use crate::config::ScanConfig;
use crate::dom::Document;
use crate::sites::SiteAdapter;
use crate::thresholds::ThresholdClassifier;

/// Scheduler and watcher for one document, paced by the `[scan]` settings.
pub fn enrichment_watcher(
    scan: &ScanConfig,
    doc: Arc<dyn Document>,
    site: Arc<dyn SiteAdapter>,
    ratings: RatingService,
    classifier: Arc<ThresholdClassifier>,
) -> MutationWatcher {
    let scheduler =
        EnrichmentScheduler::new(doc, site, ratings, classifier).with_config(scan.scheduler());
    MutationWatcher::new(scheduler).with_quiet(scan.debounce())
}
