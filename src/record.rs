// src/record.rs
use serde::{Deserialize, Serialize};

/// Marker for "no confident rating value". Rendered as `?` in a neutral color.
pub const SENTINEL: &str = "--";

/// Ratings for one title, as fetched from the external catalog.
///
/// Field names on the wire match the persisted cache entries
/// (`{"imdb": "8.8", "rt": "87%", "imdbID": "tt1375666"}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingRecord {
    /// Decimal-scale score, e.g. "8.8", or the sentinel.
    #[serde(rename = "imdb")]
    pub primary_score: String,
    /// Percent-scale score, e.g. "87%", or the sentinel.
    #[serde(rename = "rt")]
    pub secondary_score: String,
    #[serde(rename = "imdbID", default)]
    pub external_id: Option<String>,
}

impl RatingRecord {
    pub fn new(
        primary_score: impl Into<String>,
        secondary_score: impl Into<String>,
        external_id: Option<String>,
    ) -> Self {
        Self {
            primary_score: primary_score.into(),
            secondary_score: secondary_score.into(),
            external_id,
        }
    }

    /// Both scores sentinel, no catalog id. Used for "not found" and for exhausted retries.
    pub fn neutral() -> Self {
        Self::new(SENTINEL, SENTINEL, None)
    }

    /// True when neither score carries data; such records never produce a badge.
    pub fn is_all_sentinel(&self) -> bool {
        self.primary_score == SENTINEL && self.secondary_score == SENTINEL
    }
}
