// src/badge.rs
//! Badge descriptors: what gets attached to a tile, independent of how a
//! particular document renders it.

use serde::Serialize;

use crate::record::{RatingRecord, SENTINEL};
use crate::thresholds::{parse_score, Color, Scale, ThresholdClassifier, UNAVAILABLE};

/// Class of the container element; its presence on a target is the badge marker.
pub const CONTAINER_CLASS: &str = "rating-overlay-container";
/// Attribute on the container holding the source title.
pub const TITLE_ATTR: &str = "data-movie-title";

/// Ring fill for values without data, so the indicator is never empty.
const UNAVAILABLE_FILL: f64 = 15.0;
const DIAMETER_RATIO: f64 = 0.15;
const FONT_RATIO: f64 = 0.35;
const GAP_RATIO: f64 = 0.015;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Indicator {
    pub scale: Scale,
    /// Tooltip text.
    pub label: &'static str,
    pub text: String,
    pub show_percent: bool,
    pub color: Color,
    pub text_color: Color,
    /// 0–100.
    pub fill_percent: f64,
    pub diameter_px: f64,
    pub font_px: f64,
}

impl Indicator {
    /// CSS ring: filled arc in the bucket color, remainder gray.
    pub fn ring_gradient(&self) -> String {
        let p = self.fill_percent;
        format!("conic-gradient({} 0% {p}%, gray {p}% 100%)", self.color)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Badge {
    pub title: String,
    pub gap_px: f64,
    pub indicators: Vec<Indicator>,
}

/// Share of the ring to fill: linear on the percent scale, value/10×100 on
/// the decimal scale. Values without data get a small fixed fill.
pub fn fill_percentage(value: &str, scale: Scale) -> f64 {
    let Some(v) = parse_score(value) else {
        return UNAVAILABLE_FILL;
    };
    let pct = match scale {
        Scale::Decimal => v / 10.0 * 100.0,
        Scale::Percent => v,
    };
    pct.clamp(0.0, 100.0)
}

fn indicator(
    value: &str,
    scale: Scale,
    classifier: &ThresholdClassifier,
    diameter_px: f64,
) -> Indicator {
    let color = classifier.classify(value, scale);
    let missing = value == SENTINEL || value.trim().is_empty();
    let (text, show_percent, text_color) = if missing {
        ("?".to_string(), false, Color::new(UNAVAILABLE))
    } else {
        match scale {
            Scale::Percent => (value.replacen('%', "", 1), true, color.clone()),
            Scale::Decimal => (value.to_string(), false, color.clone()),
        }
    };
    Indicator {
        scale,
        label: scale.source_name(),
        text,
        show_percent,
        color,
        text_color,
        fill_percent: fill_percentage(value, scale),
        diameter_px,
        font_px: diameter_px * FONT_RATIO,
    }
}

/// Build the two-indicator badge for a target of `target_width` px.
pub fn render(
    title: &str,
    record: &RatingRecord,
    target_width: f64,
    size_multiplier: f64,
    classifier: &ThresholdClassifier,
) -> Badge {
    let diameter = target_width * DIAMETER_RATIO * size_multiplier;
    Badge {
        title: title.to_string(),
        gap_px: target_width * GAP_RATIO,
        indicators: vec![
            indicator(&record.primary_score, Scale::Decimal, classifier, diameter),
            indicator(&record.secondary_score, Scale::Percent, classifier, diameter),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thresholds::GREEN;

    #[test]
    fn inception_badge() {
        let c = ThresholdClassifier::new();
        let rec = RatingRecord::new("8.8", "87%", Some("tt1375666".into()));
        let b = render("Inception", &rec, 200.0, 1.5, &c);

        assert_eq!(b.title, "Inception");
        assert!((b.gap_px - 3.0).abs() < 1e-9);
        let [imdb, rt] = [&b.indicators[0], &b.indicators[1]];

        assert_eq!(imdb.color.as_str(), GREEN);
        assert_eq!(rt.color.as_str(), GREEN);
        assert!((imdb.fill_percent - 88.0).abs() < 1e-9);
        assert!((rt.fill_percent - 87.0).abs() < 1e-9);

        assert_eq!(imdb.text, "8.8");
        assert!(!imdb.show_percent);
        assert_eq!(rt.text, "87");
        assert!(rt.show_percent);
        assert_eq!(rt.label, "Rotten Tomatoes");

        assert!((imdb.diameter_px - 45.0).abs() < 1e-9);
        assert!((imdb.font_px - 15.75).abs() < 1e-9);
    }

    #[test]
    fn sentinel_side_renders_question_mark() {
        let c = ThresholdClassifier::new();
        let rec = RatingRecord::new("7.2", SENTINEL, Some("tt1".into()));
        let b = render("Partial", &rec, 100.0, 1.0, &c);
        let rt = &b.indicators[1];
        assert_eq!(rt.text, "?");
        assert!(!rt.show_percent);
        assert_eq!(rt.color.as_str(), UNAVAILABLE);
        assert_eq!(rt.text_color.as_str(), UNAVAILABLE);
        assert_eq!(rt.fill_percent, 15.0);
    }

    #[test]
    fn ring_gradient_uses_fill_and_color() {
        let c = ThresholdClassifier::new();
        let rec = RatingRecord::new("5.0", "50%", None);
        let b = render("Mid", &rec, 100.0, 1.0, &c);
        assert_eq!(
            b.indicators[1].ring_gradient(),
            "conic-gradient(#ffff54 0% 50%, gray 50% 100%)"
        );
    }
}
