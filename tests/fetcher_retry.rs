// tests/fetcher_retry.rs
//
// Retry/backoff timing and outcome mapping of RatingFetcher, on a paused clock.

mod common;

use std::time::Duration;

use tokio::time::Instant;

use common::{MockSource, Scripted, TEST_KEY};
use rating_overlay::fetcher::{FetchOutcome, RatingFetcher, RetryPolicy};
use rating_overlay::record::RatingRecord;

#[tokio::test(start_paused = true)]
async fn failing_source_is_tried_three_times_with_doubling_waits() {
    let source = MockSource::new();
    source.set("Broken", Scripted::Fail);
    let fetcher = RatingFetcher::new(source.clone());

    let t0 = Instant::now();
    let rec = fetcher.fetch("Broken", Some(TEST_KEY)).await;
    let elapsed = t0.elapsed();

    assert_eq!(source.calls(), 3);
    assert_eq!(rec, Some(RatingRecord::neutral()));
    // 300ms + 600ms between attempts, no wait after the last one.
    assert!(elapsed >= Duration::from_millis(900), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(1_000), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn not_found_is_a_semantic_answer_and_not_retried() {
    let source = MockSource::new();
    let fetcher = RatingFetcher::new(source.clone());

    let t0 = Instant::now();
    let outcome = fetcher.fetch_outcome("Nope", Some(TEST_KEY)).await;

    assert_eq!(outcome, Some(FetchOutcome::NotFound));
    assert_eq!(source.calls(), 1);
    assert_eq!(t0.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn exhausted_and_not_found_collapse_to_the_same_record() {
    let source = MockSource::new();
    source.set("Down", Scripted::Fail);
    let fetcher = RatingFetcher::new(source.clone());

    let exhausted = fetcher.fetch_outcome("Down", Some(TEST_KEY)).await.unwrap();
    assert_eq!(exhausted, FetchOutcome::Exhausted);
    let missing = fetcher.fetch_outcome("Missing", Some(TEST_KEY)).await.unwrap();
    assert_eq!(exhausted.into_record(), missing.into_record());
}

#[tokio::test]
async fn matched_answer_maps_both_scores() {
    let source = MockSource::new();
    source.set(
        "Inception",
        Scripted::Found {
            imdb: "8.8",
            rt: Some("87%"),
            id: "tt1375666",
        },
    );
    source.set(
        "Obscure",
        Scripted::Found {
            imdb: "N/A",
            rt: None,
            id: "tt0000001",
        },
    );
    let fetcher = RatingFetcher::new(source.clone());

    assert_eq!(
        fetcher.fetch("Inception", Some(TEST_KEY)).await,
        Some(RatingRecord::new("8.8", "87%", Some("tt1375666".into())))
    );
    assert_eq!(
        fetcher.fetch("Obscure", Some(TEST_KEY)).await,
        Some(RatingRecord::new("--", "--", Some("tt0000001".into())))
    );
}

#[tokio::test]
async fn missing_or_empty_key_makes_no_request() {
    let source = MockSource::new();
    let fetcher = RatingFetcher::new(source.clone());

    assert_eq!(fetcher.fetch("Inception", None).await, None);
    assert_eq!(fetcher.fetch("Inception", Some("")).await, None);
    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn key_is_passed_through_unchanged() {
    let source = MockSource::new();
    let fetcher = RatingFetcher::new(source.clone());

    fetcher.fetch("Inception", Some(" k-1 ")).await;
    assert_eq!(source.keys(), vec![" k-1 ".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn custom_policy_controls_attempts() {
    let source = MockSource::new();
    source.set("Broken", Scripted::Fail);
    let fetcher = RatingFetcher::new(source.clone()).with_retry(RetryPolicy {
        attempts: 1,
        base_delay: Duration::from_millis(300),
    });

    let t0 = Instant::now();
    let outcome = fetcher.fetch_outcome("Broken", Some(TEST_KEY)).await;
    assert_eq!(outcome, Some(FetchOutcome::Exhausted));
    assert_eq!(source.calls(), 1);
    assert_eq!(t0.elapsed(), Duration::ZERO);
}
