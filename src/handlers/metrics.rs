//! Prometheus metrics endpoint
//!
//! Exposes metrics in Prometheus text format for scraping.

use axum::{extract::State, http::StatusCode};

use crate::handlers::AppState;

/// Metrics handler for Prometheus scraping
///
/// # Response
///
/// - `200 OK` with metrics in Prometheus text format
/// - `500 Internal Server Error` if metrics collection fails
///
/// # Example
///
/// ```bash
/// curl http://localhost:3001/metrics
/// # HELP itinerary_gateway_requests_total Total API requests by endpoint and outcome code
/// # TYPE itinerary_gateway_requests_total counter
/// itinerary_gateway_requests_total{code="ok",endpoint="gemini"} 42
/// ```
pub async fn handler(State(state): State<AppState>) -> (StatusCode, String) {
    match state.metrics().gather() {
        Ok(output) => (StatusCode::OK, output),
        Err(e) => {
            tracing::error!(
                error = %e,
                "Failed to gather metrics for Prometheus scraping"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to gather metrics: {}", e),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::metrics::Endpoint;
    use crate::models::ModelId;
    use crate::upstream::GeminiClient;
    use std::str::FromStr;
    use std::sync::Arc;

    fn state() -> AppState {
        let config = Config::from_str("[server]\nhost = \"127.0.0.1\"\nport = 3001\n").unwrap();
        let client = GeminiClient::new("http://127.0.0.1:9", "unused").unwrap();
        AppState::new(Arc::new(config), Arc::new(client)).unwrap()
    }

    #[tokio::test]
    async fn test_metrics_handler_returns_prometheus_format() {
        let state = state();
        let metrics = state.metrics();
        metrics.record_request(Endpoint::Gemini, "ok").unwrap();
        metrics
            .record_upstream_latency(&ModelId::from("gemini-2.0-flash"), 850.0)
            .unwrap();

        let (status, body) = handler(State(state)).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("# TYPE itinerary_gateway_requests_total counter"));
        assert!(body.contains("# TYPE itinerary_gateway_upstream_latency_ms histogram"));
        assert!(body.contains(r#"model="gemini-2.0-flash""#));
    }

    #[tokio::test]
    async fn test_concurrent_metrics_scraping() {
        let state = state();
        for i in 0..50 {
            let endpoint = if i % 2 == 0 {
                Endpoint::Chat
            } else {
                Endpoint::GenerateItinerary
            };
            state.metrics().record_request(endpoint, "ok").unwrap();
        }

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let state = state.clone();
                tokio::spawn(async move { handler(State(state)).await })
            })
            .collect();

        let results = futures::future::join_all(handles).await;
        let first = &results[0].as_ref().unwrap().1;
        for result in &results {
            let (status, body) = result.as_ref().unwrap();
            assert_eq!(*status, StatusCode::OK);
            assert_eq!(body, first, "scrapes without new events should be identical");
        }
    }
}
