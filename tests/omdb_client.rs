// tests/omdb_client.rs
//
// OmdbClient against a loopback axum server standing in for the rating API.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{extract::Query, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;

use rating_overlay::error::FetchError;
use rating_overlay::fetcher::{FetchOutcome, OmdbClient, RatingFetcher, RatingSource};
use rating_overlay::record::RatingRecord;

type Seen = Arc<Mutex<Vec<HashMap<String, String>>>>;

async fn fake_api(seen: Seen, Query(q): Query<HashMap<String, String>>) -> impl IntoResponse {
    seen.lock().expect("seen mutex poisoned").push(q.clone());
    let key = q.get("apikey").map(String::as_str).unwrap_or_default();
    let title = q.get("t").map(String::as_str).unwrap_or_default();

    if key != "good" {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "Response": "False", "Error": "Invalid API key!" })),
        )
            .into_response();
    }
    match title {
        "The Matrix" => Json(json!({
            "Title": "The Matrix",
            "Response": "True",
            "imdbRating": "8.7",
            "imdbID": "tt0133093",
            "Ratings": [
                { "Source": "Internet Movie Database", "Value": "8.7/10" },
                { "Source": "Rotten Tomatoes", "Value": "83%" },
                { "Source": "Metacritic", "Value": "73/100" }
            ]
        }))
        .into_response(),
        "Garbage" => (StatusCode::OK, "<html>oops</html>").into_response(),
        "Down" => (StatusCode::BAD_GATEWAY, "upstream down").into_response(),
        _ => Json(json!({ "Response": "False", "Error": "Movie not found!" })).into_response(),
    }
}

async fn spawn_fake() -> (String, Seen) {
    let seen: Seen = Arc::default();
    let s = seen.clone();
    let app = Router::new().route("/", get(move |q: Query<HashMap<String, String>>| fake_api(s.clone(), q)));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/"), seen)
}

fn client(base: &str) -> OmdbClient {
    OmdbClient::new(base, Duration::from_secs(2), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn lookup_sends_key_and_title_and_maps_scores() {
    let (base, seen) = spawn_fake().await;
    let c = client(&base);

    let resp = c.lookup("The Matrix", "good").await.unwrap();
    assert_eq!(
        resp.into_outcome(),
        FetchOutcome::Matched(RatingRecord::new("8.7", "83%", Some("tt0133093".into())))
    );

    let q = seen.lock().unwrap()[0].clone();
    assert_eq!(q.get("apikey").map(String::as_str), Some("good"));
    assert_eq!(q.get("t").map(String::as_str), Some("The Matrix"));
}

#[tokio::test]
async fn unparseable_bodies_are_errors() {
    let (base, _) = spawn_fake().await;
    let c = client(&base);

    assert!(matches!(
        c.lookup("Garbage", "good").await,
        Err(FetchError::Parse(_))
    ));
    assert!(matches!(
        c.lookup("Down", "good").await,
        Err(FetchError::Status(502))
    ));
}

#[tokio::test]
async fn key_probe_distinguishes_bad_keys_from_unknown_titles() {
    let (base, seen) = spawn_fake().await;
    let c = client(&base);

    assert!(c.validate_key("good").await);
    assert!(!c.validate_key("bad").await);

    let q = seen.lock().unwrap()[0].clone();
    assert_eq!(q.get("t").map(String::as_str), Some("test"));
    assert_eq!(q.get("plot").map(String::as_str), Some("short"));
}

#[tokio::test]
async fn unreachable_api_fails_the_probe_and_exhausts_the_fetcher() {
    // Bind then drop to get a port nobody listens on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let c = Arc::new(client(&format!("http://{addr}/")));

    assert!(!c.validate_key("good").await);

    let fetcher = RatingFetcher::new(c).with_retry(rating_overlay::fetcher::RetryPolicy {
        attempts: 2,
        base_delay: Duration::from_millis(10),
    });
    assert_eq!(
        fetcher.fetch_outcome("The Matrix", Some("good")).await,
        Some(FetchOutcome::Exhausted)
    );
}
