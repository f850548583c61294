// src/watcher.rs
//! Turns bursts of document mutations into debounced rescans.

use std::time::Duration;

use metrics::counter;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::dom::MutationSubscription;
use crate::metrics::ensure_metrics_described;
use crate::scheduler::EnrichmentScheduler;

pub const DEFAULT_QUIET: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DebounceState {
    Idle,
    Pending(Instant),
}

/// Trailing-edge debounce: fires once `quiet` has passed since the last change.
#[derive(Debug, Clone)]
pub struct Debouncer {
    quiet: Duration,
    state: DebounceState,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            state: DebounceState::Idle,
        }
    }

    /// Record a change; restarts the quiet period.
    pub fn on_change(&mut self, now: Instant) {
        self.state = DebounceState::Pending(now + self.quiet);
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            DebounceState::Idle => None,
            DebounceState::Pending(at) => Some(at),
        }
    }

    /// True exactly once per quiet period that has elapsed by `now`.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.state {
            DebounceState::Pending(at) if now >= at => {
                self.state = DebounceState::Idle;
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchSummary {
    pub batches: u64,
    pub rescans: u64,
}

pub struct MutationWatcher {
    scheduler: EnrichmentScheduler,
    quiet: Duration,
}

impl MutationWatcher {
    pub fn new(scheduler: EnrichmentScheduler) -> Self {
        Self {
            scheduler,
            quiet: DEFAULT_QUIET,
        }
    }

    pub fn with_quiet(mut self, quiet: Duration) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn spawn(self, subscription: MutationSubscription) -> JoinHandle<WatchSummary> {
        tokio::spawn(self.run(subscription))
    }

    /// Runs until the subscription ends, then waits for scans still in flight.
    ///
    /// The start counts as a change, so the page is scanned once even if it
    /// never mutates. Scans already running are never cancelled; a new burst
    /// simply schedules another one.
    pub async fn run(self, mut subscription: MutationSubscription) -> WatchSummary {
        ensure_metrics_described();
        let mut debouncer = Debouncer::new(self.quiet);
        let mut scans: JoinSet<()> = JoinSet::new();
        let mut summary = WatchSummary::default();

        debouncer.on_change(Instant::now());

        loop {
            let wake = debouncer.deadline();
            tokio::select! {
                batch = subscription.next() => match batch {
                    Some(batch) => {
                        summary.batches += 1;
                        counter!("watch_mutation_batches_total").increment(1);
                        if batch.skipped > 0 {
                            debug!(target: "watch", skipped = batch.skipped, "subscriber lagged; coalesced");
                        }
                        debouncer.on_change(Instant::now());
                    }
                    None => break,
                },
                _ = sleep_until(wake.unwrap_or_else(Instant::now)), if wake.is_some() => {
                    if debouncer.poll(Instant::now()) {
                        summary.rescans += 1;
                        counter!("watch_rescans_total").increment(1);
                        self.trigger(&mut scans);
                    }
                }
                Some(joined) = scans.join_next(), if !scans.is_empty() => {
                    if let Err(e) = joined {
                        warn!(target: "watch", error = %e, "scan task failed");
                    }
                }
            }
        }

        info!(target: "watch", batches = summary.batches, rescans = summary.rescans, "mutation stream closed");
        while let Some(joined) = scans.join_next().await {
            if let Err(e) = joined {
                warn!(target: "watch", error = %e, "scan task failed");
            }
        }
        summary
    }

    fn trigger(&self, scans: &mut JoinSet<()>) {
        let scheduler = self.scheduler.clone();
        scans.spawn(async move {
            // Colors must come from settings before anything is drawn.
            scheduler
                .classifier()
                .ensure_loaded(scheduler.ratings().settings())
                .await;
            scheduler.scan().await;
        });
    }
}
