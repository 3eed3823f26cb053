//! Fixed-window throttling through a router.

use std::time::Duration;

use axum::{
    http::{header, StatusCode},
    routing::{get, post},
    Router,
};

use request_gate::security::RateLimiter;

mod common;
use common::{get as get_req, json_body, post_json, send, with_peer};

fn limited(limiter: &RateLimiter) -> Router {
    Router::new()
        .route("/ping", get(|| async { "pong" }))
        .route(
            "/login",
            post(|body: String| async move {
                if body.contains("secret") {
                    StatusCode::OK
                } else {
                    StatusCode::UNAUTHORIZED
                }
            }),
        )
        .layer(limiter.layer())
}

#[tokio::test(start_paused = true)]
async fn test_rejects_over_limit_until_window_lapses() {
    let limiter = RateLimiter::new(3, Duration::from_millis(1000));
    let app = limited(&limiter);

    for _ in 0..3 {
        let response = send(&app, with_peer(get_req("/ping"), "203.0.113.5:4000")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = send(&app, with_peer(get_req("/ping"), "203.0.113.5:4000")).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()[header::RETRY_AFTER], "1");
    let body = json_body(response).await;
    assert_eq!(body["type"], "Throttled");
    assert_eq!(body["title"], "Request has been throttled");

    // Rejections do not count
    assert_eq!(limiter.store().entry("203.0.113.5").unwrap().hits, 3);

    tokio::time::advance(Duration::from_millis(1000)).await;
    let response = send(&app, with_peer(get_req("/ping"), "203.0.113.5:4000")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test(start_paused = true)]
async fn test_clients_are_counted_separately() {
    let limiter = RateLimiter::new(1, Duration::from_secs(5));
    let app = limited(&limiter);

    let first = send(&app, with_peer(get_req("/ping"), "198.51.100.1:1000")).await;
    let second = send(&app, with_peer(get_req("/ping"), "198.51.100.2:1000")).await;
    let again = send(&app, with_peer(get_req("/ping"), "198.51.100.1:1001")).await;

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(again.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test(start_paused = true)]
async fn test_forwarded_client_behind_trusted_proxy() {
    let limiter = RateLimiter::new(1, Duration::from_secs(5));
    let app = limited(&limiter);

    let forwarded = |client: &str| {
        let mut req = with_peer(get_req("/ping"), "127.0.0.1:9000");
        req.headers_mut()
            .insert("x-forwarded-for", client.parse().unwrap());
        req
    };

    assert_eq!(send(&app, forwarded("203.0.113.7")).await.status(), StatusCode::OK);
    assert_eq!(send(&app, forwarded("203.0.113.8")).await.status(), StatusCode::OK);
    assert_eq!(
        send(&app, forwarded("203.0.113.7")).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
}

#[tokio::test(start_paused = true)]
async fn test_status_filter_counts_only_failures() {
    let limiter =
        RateLimiter::new(2, Duration::from_secs(60)).count_only([StatusCode::UNAUTHORIZED]);
    let app = limited(&limiter);
    let peer = "203.0.113.9:5000";

    for _ in 0..5 {
        let response = send(&app, with_peer(post_json("/login", "secret"), peer)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    for _ in 0..2 {
        let response = send(&app, with_peer(post_json("/login", "guess"), peer)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = send(&app, with_peer(post_json("/login", "secret"), peer)).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test(start_paused = true)]
async fn test_custom_key() {
    let limiter = RateLimiter::new(1, Duration::from_secs(5)).key_by(|req| {
        req.headers()
            .get("x-api-key")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    });
    let app = limited(&limiter);

    let keyed = |key: &str| {
        let mut req = with_peer(get_req("/ping"), "203.0.113.1:1");
        req.headers_mut().insert("x-api-key", key.parse().unwrap());
        req
    };

    assert_eq!(send(&app, keyed("a")).await.status(), StatusCode::OK);
    assert_eq!(send(&app, keyed("b")).await.status(), StatusCode::OK);
    assert_eq!(send(&app, keyed("a")).await.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test(start_paused = true)]
async fn test_requests_without_peer_share_a_bucket() {
    let limiter = RateLimiter::new(1, Duration::from_secs(5));
    let app = limited(&limiter);

    assert_eq!(send(&app, get_req("/ping")).await.status(), StatusCode::OK);
    assert_eq!(
        send(&app, get_req("/ping")).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
    assert!(limiter.store().entry("unknown").is_some());
}
