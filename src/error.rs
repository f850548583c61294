// src/error.rs
use thiserror::Error;

/// Failures of the key-value persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// One failed attempt against the rating API. Every variant is treated as transient.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("rating request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("rating API returned HTTP {0}")]
    Status(u16),
    #[error("rating response could not be parsed: {0}")]
    Parse(String),
}
