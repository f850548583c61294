// tests/common/mod.rs
//
// Shared fixtures: a scripted rating source and service builders over
// in-memory stores.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use rating_overlay::cache::RatingCache;
use rating_overlay::error::FetchError;
use rating_overlay::fetcher::{LookupResponse, RatingFetcher, RatingSource};
use rating_overlay::settings::SettingsStore;
use rating_overlay::store::MemoryStore;
use rating_overlay::RatingService;

pub const TEST_KEY: &str = "test-key";

#[derive(Clone)]
pub enum Scripted {
    Found {
        imdb: &'static str,
        rt: Option<&'static str>,
        id: &'static str,
    },
    NotFound,
    /// Transport-style failure on every attempt.
    Fail,
}

/// Answers from a per-title script and counts calls.
#[derive(Default)]
pub struct MockSource {
    script: Mutex<HashMap<String, Scripted>>,
    calls: AtomicUsize,
    titles: Mutex<Vec<String>>,
    keys: Mutex<Vec<String>>,
}

impl MockSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, title: &str, answer: Scripted) {
        self.script
            .lock()
            .expect("script mutex poisoned")
            .insert(title.to_string(), answer);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn titles(&self) -> Vec<String> {
        self.titles.lock().expect("titles mutex poisoned").clone()
    }

    /// API keys as received, one per call.
    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().expect("keys mutex poisoned").clone()
    }
}

#[async_trait]
impl RatingSource for MockSource {
    async fn lookup(&self, title: &str, api_key: &str) -> Result<LookupResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.keys
            .lock()
            .expect("keys mutex poisoned")
            .push(api_key.to_string());
        self.titles
            .lock()
            .expect("titles mutex poisoned")
            .push(title.to_string());
        let answer = self
            .script
            .lock()
            .expect("script mutex poisoned")
            .get(title)
            .cloned()
            .unwrap_or(Scripted::NotFound);
        let json = match answer {
            Scripted::Found { imdb, rt, id } => {
                let ratings = match rt {
                    Some(v) => serde_json::json!([
                        { "Source": "Internet Movie Database", "Value": format!("{imdb}/10") },
                        { "Source": "Rotten Tomatoes", "Value": v },
                    ]),
                    None => serde_json::json!([]),
                };
                serde_json::json!({
                    "Response": "True",
                    "imdbRating": imdb,
                    "Ratings": ratings,
                    "imdbID": id,
                })
            }
            Scripted::NotFound => serde_json::json!({
                "Response": "False",
                "Error": "Movie not found!",
            }),
            Scripted::Fail => return Err(FetchError::Status(503)),
        };
        Ok(serde_json::from_value(json).expect("scripted body parses"))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

pub struct Harness {
    pub source: Arc<MockSource>,
    pub settings_store: Arc<MemoryStore>,
    pub cache_store: Arc<MemoryStore>,
    pub service: RatingService,
}

/// Rating service over fresh memory stores, with `TEST_KEY` stored when `with_key`.
pub async fn harness(with_key: bool) -> Harness {
    let source = MockSource::new();
    let settings_store = Arc::new(MemoryStore::new());
    let cache_store = Arc::new(MemoryStore::new());
    let settings = SettingsStore::new(settings_store.clone());
    if with_key {
        settings.set_api_key(TEST_KEY).await.expect("store key");
    }
    let fetcher = Arc::new(RatingFetcher::new(source.clone()));
    let service = RatingService::new(RatingCache::new(cache_store.clone()), fetcher, settings);
    Harness {
        source,
        settings_store,
        cache_store,
        service,
    }
}
