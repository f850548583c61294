//! Rating overlay service: binary entrypoint.
//! Loads config, wires the stores and the rating client, and serves the
//! local HTTP surface.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rating_overlay::cache::RatingCache;
use rating_overlay::config::{AppConfig, ENV_API_KEY};
use rating_overlay::fetcher::{OmdbClient, RatingFetcher};
use rating_overlay::metrics::Metrics;
use rating_overlay::settings::SettingsStore;
use rating_overlay::sites::SiteRegistry;
use rating_overlay::store::JsonFileStore;
use rating_overlay::thresholds::ThresholdClassifier;
use rating_overlay::{router, AppState, RatingService};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("rating_overlay=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

/// Store `OMDB_API_KEY` unless a key is already saved.
async fn seed_api_key(settings: &SettingsStore) -> Result<()> {
    let Ok(key) = std::env::var(ENV_API_KEY) else {
        return Ok(());
    };
    if key.trim().is_empty() || settings.api_key().await.is_some() {
        return Ok(());
    }
    settings
        .set_api_key(&key)
        .await
        .context("seeding api key from environment")?;
    info!(target: "settings", "api key seeded from {ENV_API_KEY}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load_default()?;
    let metrics = Metrics::init(cfg.scan.batch_size)?;

    let sites = match &cfg.sites_path {
        Some(p) => SiteRegistry::load_from(p)?,
        None => SiteRegistry::builtin(),
    };
    info!(sites = sites.domains().count(), "site adapters loaded");

    let settings = SettingsStore::new(Arc::new(JsonFileStore::new(&cfg.settings_path)));
    let cache = RatingCache::new(Arc::new(JsonFileStore::new(&cfg.cache_path)));
    seed_api_key(&settings).await?;

    let client = Arc::new(
        OmdbClient::new(
            cfg.api.base_url.clone(),
            cfg.api.connect_timeout(),
            cfg.api.timeout(),
        )
        .context("building rating API client")?,
    );
    let fetcher = Arc::new(RatingFetcher::new(client.clone()).with_retry(cfg.api.retry_policy()));

    let classifier = Arc::new(ThresholdClassifier::new());
    classifier.ensure_loaded(&settings).await;
    if settings.api_key().await.is_none() {
        warn!("no API key stored; lookups are skipped until one is set");
    }

    let state = AppState {
        ratings: RatingService::new(cache, fetcher, settings),
        classifier,
        sites: Arc::new(sites),
        key_probe: Some(client),
    };
    let app = router(state).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(cfg.bind)
        .await
        .with_context(|| format!("binding {}", cfg.bind))?;
    info!(addr = %cfg.bind, "listening");
    axum::serve(listener, app).await.context("http server")?;
    Ok(())
}
