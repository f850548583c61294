// src/fetcher/omdb.rs
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{FetchOutcome, RatingSource};
use crate::error::FetchError;
use crate::record::{RatingRecord, SENTINEL};

pub const DEFAULT_BASE_URL: &str = "https://www.omdbapi.com/";

/// Name of the percent-scale source inside `Ratings`.
pub const SECONDARY_SOURCE: &str = "Rotten Tomatoes";

const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SourceRating {
    #[serde(rename = "Source")]
    pub source: String,
    #[serde(rename = "Value")]
    pub value: String,
}

/// Body of a title lookup.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LookupResponse {
    /// "True" | "False"
    #[serde(rename = "Response")]
    pub response: String,
    #[serde(rename = "imdbRating", default)]
    pub imdb_rating: Option<String>,
    #[serde(rename = "Ratings", default)]
    pub ratings: Vec<SourceRating>,
    #[serde(rename = "imdbID", default)]
    pub imdb_id: Option<String>,
    #[serde(rename = "Error", default)]
    pub error: Option<String>,
}

fn score_or_sentinel(v: Option<&str>) -> String {
    match v {
        Some(s) if !s.is_empty() && s != NOT_AVAILABLE => s.to_string(),
        _ => SENTINEL.to_string(),
    }
}

impl LookupResponse {
    pub fn is_match(&self) -> bool {
        self.response == "True"
    }

    /// A semantic answer: matched or not found. Never a transient failure.
    pub fn into_outcome(self) -> FetchOutcome {
        if !self.is_match() {
            return FetchOutcome::NotFound;
        }
        let secondary = self
            .ratings
            .iter()
            .find(|r| r.source == SECONDARY_SOURCE)
            .map(|r| r.value.as_str());
        FetchOutcome::Matched(RatingRecord {
            primary_score: score_or_sentinel(self.imdb_rating.as_deref()),
            secondary_score: score_or_sentinel(secondary),
            external_id: self.imdb_id,
        })
    }
}

/// HTTP client for the rating API.
pub struct OmdbClient {
    http: reqwest::Client,
    base_url: String,
}

impl OmdbClient {
    pub fn new(
        base_url: impl Into<String>,
        connect_timeout: Duration,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("rating-overlay/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, params: &[(&str, &str)]) -> Result<LookupResponse, FetchError> {
        let resp = self.http.get(&self.base_url).query(params).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        match serde_json::from_str::<LookupResponse>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(_) if !status.is_success() => Err(FetchError::Status(status.as_u16())),
            Err(e) => Err(FetchError::Parse(e.to_string())),
        }
    }

    /// Probe the API with a throwaway lookup. A key is invalid when the API
    /// complains about it or when the probe cannot complete at all; any other
    /// answer, including "Movie not found!", means the key works.
    pub async fn validate_key(&self, api_key: &str) -> bool {
        match self
            .get(&[("apikey", api_key), ("t", "test"), ("plot", "short")])
            .await
        {
            Ok(resp) => !resp
                .error
                .as_deref()
                .is_some_and(|e| e.contains("API key")),
            Err(e) => {
                tracing::warn!(target: "fetch", error = %e, "api key probe failed");
                false
            }
        }
    }
}

#[async_trait]
impl RatingSource for OmdbClient {
    async fn lookup(&self, title: &str, api_key: &str) -> Result<LookupResponse, FetchError> {
        self.get(&[("apikey", api_key), ("t", title)]).await
    }

    fn name(&self) -> &'static str {
        "omdb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> LookupResponse {
        serde_json::from_str(s).unwrap()
    }

    #[test]
    fn matched_response_maps_both_scores() {
        let r = parse(
            r#"{"Response":"True","imdbRating":"8.8","imdbID":"tt1375666",
                "Ratings":[{"Source":"Internet Movie Database","Value":"8.8/10"},
                           {"Source":"Rotten Tomatoes","Value":"87%"}]}"#,
        );
        assert_eq!(
            r.into_outcome(),
            FetchOutcome::Matched(RatingRecord::new("8.8", "87%", Some("tt1375666".into())))
        );
    }

    #[test]
    fn na_and_missing_sources_become_sentinels() {
        let r = parse(r#"{"Response":"True","imdbRating":"N/A","imdbID":"tt1","Ratings":[]}"#);
        assert_eq!(
            r.into_outcome(),
            FetchOutcome::Matched(RatingRecord::new(SENTINEL, SENTINEL, Some("tt1".into())))
        );

        let r = parse(r#"{"Response":"True","imdbRating":"6.1","imdbID":"tt2"}"#);
        match r.into_outcome() {
            FetchOutcome::Matched(rec) => {
                assert_eq!(rec.primary_score, "6.1");
                assert_eq!(rec.secondary_score, SENTINEL);
            }
            other => panic!("expected match, got {other:?}"),
        }
    }

    #[test]
    fn false_response_is_not_found() {
        let r = parse(r#"{"Response":"False","Error":"Movie not found!"}"#);
        assert_eq!(r.into_outcome(), FetchOutcome::NotFound);
    }
}
