//! Per-client request limits on `/api/*`

mod common;

use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode, header};
use common::{ScriptedBackend, test_config, test_state};
use itinerary_gateway::handlers::router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

fn limited_app(max_requests: u32, exempt_loopback: bool) -> Router {
    let extra = format!(
        "[rate_limit]\nwindow_seconds = 60\nmax_requests = {max_requests}\nexempt_loopback = {exempt_loopback}\n"
    );
    let state = test_state(
        Arc::new(ScriptedBackend::new()),
        test_config(Some("test-key"), &extra),
    );
    router(state)
}

fn from_peer(uri: &str, peer: &str) -> Request<Body> {
    let mut request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let addr: SocketAddr = peer.parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

async fn status_of(app: &Router, request: Request<Body>) -> StatusCode {
    app.clone().oneshot(request).await.unwrap().status()
}

#[tokio::test]
async fn test_client_over_limit_gets_429_with_retry_after() {
    let app = limited_app(2, true);

    for _ in 0..2 {
        assert_eq!(
            status_of(&app, from_peer("/api/status", "203.0.113.7:5000")).await,
            StatusCode::OK
        );
    }

    let response = app
        .clone()
        .oneshot(from_peer("/api/status", "203.0.113.7:5001"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response.headers()[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], "RATE_LIMITED");
    assert_eq!(body["error"], "Too many requests from this IP. Please try again later.");
}

#[tokio::test]
async fn test_clients_are_counted_separately() {
    let app = limited_app(1, true);

    assert_eq!(
        status_of(&app, from_peer("/api/status", "203.0.113.7:5000")).await,
        StatusCode::OK
    );
    assert_eq!(
        status_of(&app, from_peer("/api/status", "198.51.100.4:5000")).await,
        StatusCode::OK
    );
    assert_eq!(
        status_of(&app, from_peer("/api/status", "203.0.113.7:5000")).await,
        StatusCode::TOO_MANY_REQUESTS
    );
}

#[tokio::test]
async fn test_paths_outside_api_are_not_limited() {
    let app = limited_app(1, true);

    for _ in 0..5 {
        assert_eq!(
            status_of(&app, from_peer("/health", "203.0.113.7:5000")).await,
            StatusCode::OK
        );
    }
    assert_eq!(
        status_of(&app, from_peer("/api/status", "203.0.113.7:5000")).await,
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_loopback_exemption_follows_configuration() {
    let exempt = limited_app(1, true);
    for _ in 0..3 {
        assert_eq!(
            status_of(&exempt, from_peer("/api/status", "127.0.0.1:4000")).await,
            StatusCode::OK
        );
    }

    let counted = limited_app(1, false);
    assert_eq!(
        status_of(&counted, from_peer("/api/status", "127.0.0.1:4000")).await,
        StatusCode::OK
    );
    assert_eq!(
        status_of(&counted, from_peer("/api/status", "127.0.0.1:4000")).await,
        StatusCode::TOO_MANY_REQUESTS
    );
}

#[tokio::test]
async fn test_forwarded_for_is_trusted_only_behind_loopback_proxy() {
    let app = limited_app(1, false);

    let forwarded = |client: &str, peer: &str| {
        let mut request = from_peer("/api/status", peer);
        request
            .headers_mut()
            .insert("x-forwarded-for", client.parse().unwrap());
        request
    };

    // Behind a local proxy each forwarded client gets its own window
    assert_eq!(
        status_of(&app, forwarded("192.0.2.10", "127.0.0.1:8080")).await,
        StatusCode::OK
    );
    assert_eq!(
        status_of(&app, forwarded("192.0.2.11", "127.0.0.1:8080")).await,
        StatusCode::OK
    );

    // A remote peer cannot dodge its limit by rotating the header
    assert_eq!(
        status_of(&app, forwarded("192.0.2.20", "203.0.113.9:1000")).await,
        StatusCode::OK
    );
    assert_eq!(
        status_of(&app, forwarded("192.0.2.21", "203.0.113.9:1000")).await,
        StatusCode::TOO_MANY_REQUESTS
    );
}
