// src/metrics.rs
use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ratings_cache_hits_total", "Titles answered from the rating cache.");
        describe_counter!(
            "ratings_fetch_attempts_total",
            "Rating API requests issued, retries included."
        );
        describe_counter!(
            "ratings_fetch_failures_total",
            "Rating API attempts that failed (transport, status or parse)."
        );
        describe_counter!(
            "ratings_not_found_total",
            "Lookups answered with Response=False."
        );
        describe_counter!(
            "ratings_fetch_exhausted_total",
            "Lookups that gave up after the last retry."
        );
        describe_counter!("scan_runs_total", "Enrichment scans started.");
        describe_counter!(
            "scan_candidates_total",
            "Candidates left after filtering, per scan."
        );
        describe_counter!("badges_attached_total", "Badges attached to targets.");
        describe_histogram!("scan_duration_ms", "Wall time of one enrichment scan in milliseconds.");
        describe_counter!("watch_mutation_batches_total", "Mutation batches observed.");
        describe_counter!("watch_rescans_total", "Debounced rescans triggered.");
        describe_gauge!("scan_batch_size", "Configured candidates per batch.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder; fails if one is already installed.
    pub fn init(batch_size: usize) -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;

        ensure_metrics_described();
        gauge!("scan_batch_size").set(batch_size as f64);

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
