// src/scheduler.rs
//! Enrichment scan: discover tiles, filter, and badge them batch by batch.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use metrics::{counter, histogram};
use tracing::{debug, info};

use crate::badge;
use crate::dom::{Candidate, Document, NodeId, Positioning};
use crate::metrics::ensure_metrics_described;
use crate::ratings::{RatingService, Resolution};
use crate::sites::SiteAdapter;
use crate::thresholds::ThresholdClassifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Candidates in flight at once; batches run one after another.
    pub batch_size: usize,
    /// Pause before each candidate starts its lookup.
    pub stagger: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            stagger: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOutcome {
    Attached,
    /// Target gained a badge, lost its width or left the document meanwhile.
    Stale,
    NoApiKey,
    /// Both scores are the sentinel; nothing is shown.
    NoRatings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub discovered: usize,
    pub eligible: usize,
    pub attached: usize,
    pub stale: usize,
    pub no_api_key: usize,
    pub no_ratings: usize,
}

impl ScanReport {
    fn tally(&mut self, outcome: CandidateOutcome) {
        match outcome {
            CandidateOutcome::Attached => self.attached += 1,
            CandidateOutcome::Stale => self.stale += 1,
            CandidateOutcome::NoApiKey => self.no_api_key += 1,
            CandidateOutcome::NoRatings => self.no_ratings += 1,
        }
    }
}

#[derive(Clone)]
pub struct EnrichmentScheduler {
    doc: Arc<dyn Document>,
    site: Arc<dyn SiteAdapter>,
    ratings: RatingService,
    classifier: Arc<ThresholdClassifier>,
    cfg: SchedulerConfig,
}

impl EnrichmentScheduler {
    pub fn new(
        doc: Arc<dyn Document>,
        site: Arc<dyn SiteAdapter>,
        ratings: RatingService,
        classifier: Arc<ThresholdClassifier>,
    ) -> Self {
        Self {
            doc,
            site,
            ratings,
            classifier,
            cfg: SchedulerConfig::default(),
        }
    }

    pub fn with_config(mut self, cfg: SchedulerConfig) -> Self {
        self.cfg = cfg;
        self
    }

    pub fn ratings(&self) -> &RatingService {
        &self.ratings
    }

    pub fn classifier(&self) -> &Arc<ThresholdClassifier> {
        &self.classifier
    }

    fn is_eligible(&self, target: NodeId) -> bool {
        self.doc.is_element(target)
            && !self.doc.has_badge(target)
            && self.doc.rendered_width(target) > 0.0
    }

    /// Candidates worth working on, in discovery order, one per target.
    pub fn eligible_candidates(&self) -> (usize, Vec<Candidate>) {
        let found = self.site.discover_candidates(self.doc.as_ref());
        let discovered = found.len();
        let mut seen = HashSet::new();
        let eligible = found
            .into_iter()
            .filter(|c| self.is_eligible(c.target) && seen.insert(c.target))
            .collect();
        (discovered, eligible)
    }

    /// One full pass over the document.
    pub async fn scan(&self) -> ScanReport {
        ensure_metrics_described();
        counter!("scan_runs_total").increment(1);
        let started = Instant::now();

        let (discovered, candidates) = self.eligible_candidates();
        let mut report = ScanReport {
            discovered,
            eligible: candidates.len(),
            ..ScanReport::default()
        };
        counter!("scan_candidates_total").increment(candidates.len() as u64);

        let batch_size = self.cfg.batch_size.max(1);
        for (i, batch) in candidates.chunks(batch_size).enumerate() {
            debug!(target: "scan", batch = i, size = batch.len(), "processing batch");
            let outcomes = join_all(batch.iter().map(|c| self.process(c))).await;
            for outcome in outcomes {
                report.tally(outcome);
            }
        }

        let ms = started.elapsed().as_millis() as f64;
        histogram!("scan_duration_ms").record(ms);
        info!(
            target: "scan",
            site = self.site.name(),
            discovered = report.discovered,
            eligible = report.eligible,
            attached = report.attached,
            stale = report.stale,
            no_ratings = report.no_ratings,
            no_api_key = report.no_api_key,
            "scan finished"
        );
        report
    }

    async fn process(&self, candidate: &Candidate) -> CandidateOutcome {
        if !self.cfg.stagger.is_zero() {
            tokio::time::sleep(self.cfg.stagger).await;
        }
        if !self.is_eligible(candidate.target) {
            return CandidateOutcome::Stale;
        }

        let resolution = self.ratings.resolve(&candidate.title).await;
        let record = match resolution {
            Resolution::NoApiKey => return CandidateOutcome::NoApiKey,
            Resolution::Found { record, .. } => record,
        };
        if record.is_all_sentinel() {
            debug!(target: "scan", title = %candidate.title, "no ratings; skipping badge");
            return CandidateOutcome::NoRatings;
        }

        let width = self.doc.rendered_width(candidate.target);
        if width <= 0.0 {
            return CandidateOutcome::Stale;
        }
        let badge = badge::render(
            &candidate.title,
            &record,
            width,
            self.site.size_multiplier(),
            &self.classifier,
        );

        if self.doc.position(candidate.target) == Positioning::Static {
            self.doc.set_position(candidate.target, Positioning::Relative);
        }
        if self.doc.attach_badge(candidate.target, badge) {
            counter!("badges_attached_total").increment(1);
            debug!(target: "scan", title = %candidate.title, target = %candidate.target, "badge attached");
            CandidateOutcome::Attached
        } else {
            CandidateOutcome::Stale
        }
    }
}
