// src/thresholds.rs
//! Color buckets for rating values.
//!
//! Two independent range sets exist, one per [`Scale`]. Lookup is
//! first-match-wins in source order; validation (run before a set is saved)
//! additionally rejects sets whose ranges overlap or touch.

use std::fmt;
use std::sync::RwLock;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::SENTINEL;
use crate::settings::SettingsStore;

pub const MAX_RANGES: usize = 5;

pub const GREEN: &str = "#28cd41";
pub const BLUE: &str = "#86c5e8";
pub const YELLOW: &str = "#ffff54";
pub const RED: &str = "#ff0000";
/// Value parsed but no range matched.
pub const FALLBACK: &str = "gray";
/// Sentinel, empty or non-numeric value.
pub const UNAVAILABLE: &str = "white";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    /// [0, 10], one decimal (primary critic aggregate).
    Decimal,
    /// [0, 100], integer, percent-suffixed (critical consensus).
    Percent,
}

impl Scale {
    pub const ALL: [Scale; 2] = [Scale::Decimal, Scale::Percent];

    pub fn bounds(self) -> (f64, f64) {
        match self {
            Scale::Decimal => (0.0, 10.0),
            Scale::Percent => (0.0, 100.0),
        }
    }

    /// Short label used in validation messages.
    pub fn label(self) -> &'static str {
        match self {
            Scale::Decimal => "IMDB",
            Scale::Percent => "RT",
        }
    }

    /// Tooltip label of the badge indicator.
    pub fn source_name(self) -> &'static str {
        match self {
            Scale::Decimal => "IMDB",
            Scale::Percent => "Rotten Tomatoes",
        }
    }

    /// Key of the range set in the settings store.
    pub fn storage_key(self) -> &'static str {
        match self {
            Scale::Decimal => "imdbRanges",
            Scale::Percent => "rtRanges",
        }
    }

    /// Sanitize a user-typed bound: drop stray characters, clamp to the
    /// scale and round to the scale's granularity.
    pub fn sanitize_input(self, raw: &str) -> Option<f64> {
        let cleaned: String = match self {
            Scale::Decimal => {
                let mut seen_dot = false;
                raw.chars()
                    .filter(|c| {
                        if *c == '.' {
                            let keep = !seen_dot;
                            seen_dot = true;
                            keep
                        } else {
                            c.is_ascii_digit()
                        }
                    })
                    .collect()
            }
            Scale::Percent => raw.chars().filter(|c| c.is_ascii_digit()).collect(),
        };
        let n: f64 = cleaned.parse().ok()?;
        let (lo, hi) = self.bounds();
        let n = n.clamp(lo, hi);
        Some(match self {
            Scale::Decimal => (n * 10.0).round() / 10.0,
            Scale::Percent => n.trunc(),
        })
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scale::Decimal => "decimal",
            Scale::Percent => "percent",
        })
    }
}

impl std::str::FromStr for Scale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "decimal" | "imdb" => Ok(Scale::Decimal),
            "percent" | "rt" => Ok(Scale::Percent),
            other => Err(format!("unknown scale: {other}")),
        }
    }
}

/// Opaque color value (CSS color string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(String);

impl Color {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `#rrggbb` form: `#rgb` is expanded, anything else becomes red.
    pub fn to_hex(&self) -> Color {
        static RE6: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("hex6 regex"));
        static RE3: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#[0-9a-fA-F]{3}$").expect("hex3 regex"));
        if RE6.is_match(&self.0) {
            return self.clone();
        }
        if RE3.is_match(&self.0) {
            let mut out = String::with_capacity(7);
            out.push('#');
            for c in self.0.chars().skip(1) {
                out.push(c);
                out.push(c);
            }
            return Color(out);
        }
        Color::new(RED)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRange {
    pub min: f64,
    pub max: f64,
    pub color: Color,
}

impl ThresholdRange {
    pub fn new(min: f64, max: f64, color: &str) -> Self {
        Self {
            min,
            max,
            color: Color::new(color),
        }
    }

    pub fn contains(&self, v: f64) -> bool {
        self.min <= v && v <= self.max
    }
}

/// Built-in buckets, used until the configured sets are loaded and whenever
/// the store holds no set for a scale.
pub fn default_ranges(scale: Scale) -> Vec<ThresholdRange> {
    match scale {
        Scale::Decimal => vec![
            ThresholdRange::new(8.0, 10.0, GREEN),
            ThresholdRange::new(6.6, 7.9, BLUE),
            ThresholdRange::new(4.5, 6.5, YELLOW),
            ThresholdRange::new(0.0, 4.4, RED),
        ],
        Scale::Percent => vec![
            ThresholdRange::new(80.0, 100.0, GREEN),
            ThresholdRange::new(66.0, 79.0, BLUE),
            ThresholdRange::new(45.0, 65.0, YELLOW),
            ThresholdRange::new(0.0, 44.0, RED),
        ],
    }
}

/// A range as submitted by the settings form. Bounds stay raw JSON until
/// validation so that non-numeric input is reported like any other issue.
#[derive(Debug, Clone, Deserialize)]
pub struct RangeInput {
    pub min: serde_json::Value,
    pub max: serde_json::Value,
    pub color: Color,
}

/// Numbers pass through, numeric strings are parsed, anything else is NaN.
fn bound(v: &serde_json::Value) -> f64 {
    match v {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

impl From<RangeInput> for ThresholdRange {
    fn from(r: RangeInput) -> Self {
        Self {
            min: bound(&r.min),
            max: bound(&r.max),
            color: r.color,
        }
    }
}

/// Both range sets as submitted.
#[derive(Debug, Clone, Deserialize)]
pub struct ThresholdsInput {
    #[serde(rename = "imdbRanges")]
    pub decimal: Vec<RangeInput>,
    #[serde(rename = "rtRanges")]
    pub percent: Vec<RangeInput>,
}

impl ThresholdsInput {
    pub fn into_ranges(self) -> (Vec<ThresholdRange>, Vec<ThresholdRange>) {
        (
            self.decimal.into_iter().map(Into::into).collect(),
            self.percent.into_iter().map(Into::into).collect(),
        )
    }
}

/// Both range sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(rename = "imdbRanges")]
    pub decimal: Vec<ThresholdRange>,
    #[serde(rename = "rtRanges")]
    pub percent: Vec<ThresholdRange>,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            decimal: default_ranges(Scale::Decimal),
            percent: default_ranges(Scale::Percent),
        }
    }
}

impl Thresholds {
    pub fn for_scale(&self, scale: Scale) -> &[ThresholdRange] {
        match scale {
            Scale::Decimal => &self.decimal,
            Scale::Percent => &self.percent,
        }
    }
}

/// Numeric magnitude of a rating string: "8.8" → 8.8, "87%" → 87.
/// Sentinel, empty and non-numeric values yield `None`.
pub fn parse_score(value: &str) -> Option<f64> {
    static NUM: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^\s*[+-]?(\d+(\.\d*)?|\.\d+)").expect("number regex"));
    if value == SENTINEL {
        return None;
    }
    let stripped = value.replacen('%', "", 1);
    let m = NUM.find(&stripped)?;
    m.as_str().trim().parse::<f64>().ok()
}

/// First range containing `v`, in source order.
pub fn lookup(ranges: &[ThresholdRange], v: f64) -> Option<&Color> {
    ranges.iter().find(|r| r.contains(v)).map(|r| &r.color)
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RangeIssue {
    #[error("At least one range required.")]
    Empty,
    #[error("{label}: at most {max} ranges allowed (got {count}).")]
    TooMany {
        label: &'static str,
        count: usize,
        max: usize,
    },
    #[error("{label} Range {index}: Min ({min}) cannot be greater than max ({max}).")]
    Inverted {
        label: &'static str,
        index: usize,
        min: f64,
        max: f64,
    },
    #[error("{label} Range {index}: Values must be between {lo} and {hi}.")]
    OutOfBounds {
        label: &'static str,
        index: usize,
        lo: f64,
        hi: f64,
    },
    #[error("{label} Range {index}: Only numbers are allowed.")]
    NotANumber { label: &'static str, index: usize },
    #[error("{label} Range {first} and {label} Range {second} overlap or touch.")]
    Overlap {
        label: &'static str,
        first: usize,
        second: usize,
    },
}

/// Validate one range set. Indices in issues are 1-based.
///
/// Overlap is reported once per range, against the lowest earlier range it
/// meets, lower index first.
pub fn validate_ranges(ranges: &[ThresholdRange], scale: Scale) -> Vec<RangeIssue> {
    let label = scale.label();
    let (lo, hi) = scale.bounds();
    let mut issues = Vec::new();

    if ranges.is_empty() {
        issues.push(RangeIssue::Empty);
    }
    if ranges.len() > MAX_RANGES {
        issues.push(RangeIssue::TooMany {
            label,
            count: ranges.len(),
            max: MAX_RANGES,
        });
    }

    for (i, r) in ranges.iter().enumerate() {
        let index = i + 1;
        if r.min.is_nan() || r.max.is_nan() {
            issues.push(RangeIssue::NotANumber { label, index });
            continue;
        }
        if r.min > r.max {
            issues.push(RangeIssue::Inverted {
                label,
                index,
                min: r.min,
                max: r.max,
            });
        }
        if r.min < lo || r.max > hi {
            issues.push(RangeIssue::OutOfBounds { label, index, lo, hi });
        }
    }

    for i in 1..ranges.len() {
        for j in 0..i {
            if ranges[i].min <= ranges[j].max && ranges[i].max >= ranges[j].min {
                issues.push(RangeIssue::Overlap {
                    label,
                    first: j + 1,
                    second: i + 1,
                });
                break;
            }
        }
    }

    issues
}

/// Maps rating strings to colors using the session's range sets.
///
/// Starts on the built-in defaults so badges can render before the settings
/// read completes. `ensure_loaded` performs the one-time load; `reload`
/// forces a fresh read after the user saves.
#[derive(Debug, Default)]
pub struct ThresholdClassifier {
    loaded: RwLock<Option<Thresholds>>,
}

impl ThresholdClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(t: Thresholds) -> Self {
        Self {
            loaded: RwLock::new(Some(t)),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.read().expect("thresholds lock poisoned").is_some()
    }

    pub async fn ensure_loaded(&self, settings: &SettingsStore) {
        if !self.is_loaded() {
            self.reload(settings).await;
        }
    }

    pub async fn reload(&self, settings: &SettingsStore) {
        let t = settings.thresholds().await;
        tracing::debug!(
            target: "settings",
            decimal = t.decimal.len(),
            percent = t.percent.len(),
            "threshold ranges loaded"
        );
        *self.loaded.write().expect("thresholds lock poisoned") = Some(t);
    }

    /// Snapshot of the active sets (defaults if nothing loaded yet).
    pub fn active(&self) -> Thresholds {
        self.loaded
            .read()
            .expect("thresholds lock poisoned")
            .clone()
            .unwrap_or_default()
    }

    pub fn classify(&self, value: &str, scale: Scale) -> Color {
        let Some(v) = parse_score(value) else {
            return Color::new(UNAVAILABLE);
        };
        let guard = self.loaded.read().expect("thresholds lock poisoned");
        let color = match guard.as_ref() {
            Some(t) => lookup(t.for_scale(scale), v).cloned(),
            None => lookup(&default_ranges(scale), v).cloned(),
        };
        color.unwrap_or_else(|| Color::new(FALLBACK))
    }
}
