//! Prometheus metrics collection for the itinerary gateway
//!
//! This module provides metrics instrumentation for tracking:
//! - Request outcomes by endpoint and error code
//! - Model attempts by model and outcome
//! - Resolver outcomes
//! - Upstream latency by model
//!
//! Metrics are exposed via the `/metrics` endpoint in Prometheus text format.
//! Recording never fails a request: callers go through [`Metrics::record_or_log`].

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

use crate::models::ModelId;

/// Public API endpoint, for type-safe metric labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Gemini,
    GeminiStream,
    GenerateItinerary,
    Chat,
    Checkout,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Gemini => "gemini",
            Endpoint::GeminiStream => "gemini_stream",
            Endpoint::GenerateItinerary => "generate_itinerary",
            Endpoint::Chat => "chat",
            Endpoint::Checkout => "create_checkout",
        }
    }
}

/// Terminal outcome of one model attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptLabel {
    Success,
    Rejected,
    TimedOut,
    Transport,
    Undecodable,
    EmptyStream,
}

impl AttemptLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptLabel::Success => "success",
            AttemptLabel::Rejected => "rejected",
            AttemptLabel::TimedOut => "timed_out",
            AttemptLabel::Transport => "transport",
            AttemptLabel::Undecodable => "undecodable",
            AttemptLabel::EmptyStream => "empty_stream",
        }
    }
}

/// Metrics collector
///
/// Cheap to clone; all collectors share one registry.
#[derive(Clone)]
pub struct Metrics {
    pub registry: Arc<Registry>,
    requests_total: IntCounterVec,
    model_attempts: IntCounterVec,
    resolutions: IntCounterVec,
    upstream_latency: HistogramVec,
    stream_interruptions: IntCounterVec,
    recording_failures: IntCounterVec,
}

impl Metrics {
    /// Create a new Metrics instance
    ///
    /// # Errors
    ///
    /// Returns an error if metric registration fails (e.g., duplicate names).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // Cardinality: 5 endpoints × 14 codes at most, "ok" included
        let requests_total = IntCounterVec::new(
            Opts::new(
                "itinerary_gateway_requests_total",
                "Total API requests by endpoint and outcome code",
            ),
            &["endpoint", "code"],
        )?;

        // Model names come from configuration, so cardinality is bounded
        let model_attempts = IntCounterVec::new(
            Opts::new(
                "itinerary_gateway_model_attempts_total",
                "Upstream model attempts by model and outcome",
            ),
            &["model", "outcome"],
        )?;

        let resolutions = IntCounterVec::new(
            Opts::new(
                "itinerary_gateway_resolutions_total",
                "Response resolution outcomes",
            ),
            &["outcome"],
        )?;

        let upstream_latency = HistogramVec::new(
            HistogramOpts::new(
                "itinerary_gateway_upstream_latency_ms",
                "Latency of successful upstream calls in milliseconds",
            )
            .buckets(vec![
                250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 20000.0, 40000.0, 80000.0,
                120000.0,
            ]),
            &["model"],
        )?;

        let stream_interruptions = IntCounterVec::new(
            Opts::new(
                "itinerary_gateway_stream_interruptions_total",
                "Streams that failed after their first fragment was delivered",
            ),
            &["model"],
        )?;

        let recording_failures = IntCounterVec::new(
            Opts::new(
                "itinerary_gateway_metrics_recording_failures_total",
                "Metrics recording operation failures by operation. \
                Requests continue normally when this increments.",
            ),
            &["operation"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(model_attempts.clone()))?;
        registry.register(Box::new(resolutions.clone()))?;
        registry.register(Box::new(upstream_latency.clone()))?;
        registry.register(Box::new(stream_interruptions.clone()))?;
        registry.register(Box::new(recording_failures.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            requests_total,
            model_attempts,
            resolutions,
            upstream_latency,
            stream_interruptions,
            recording_failures,
        })
    }

    /// Record one finished API request; `code` is `"ok"` or an error code
    pub fn record_request(&self, endpoint: Endpoint, code: &str) -> Result<(), prometheus::Error> {
        self.requests_total
            .get_metric_with_label_values(&[endpoint.as_str(), code])?
            .inc();
        Ok(())
    }

    /// Record the terminal outcome of one model attempt
    pub fn record_attempt(
        &self,
        model: &ModelId,
        outcome: AttemptLabel,
    ) -> Result<(), prometheus::Error> {
        self.model_attempts
            .get_metric_with_label_values(&[model.short_name(), outcome.as_str()])?
            .inc();
        Ok(())
    }

    /// Record a resolver outcome label (`complete`, `truncated` or an error code)
    pub fn record_resolution(&self, outcome: &str) -> Result<(), prometheus::Error> {
        self.resolutions
            .get_metric_with_label_values(&[outcome])?
            .inc();
        Ok(())
    }

    /// Record the latency of a successful upstream call
    ///
    /// # Errors
    ///
    /// Rejects NaN, infinite and negative durations, which would corrupt the
    /// histogram's percentiles.
    pub fn record_upstream_latency(
        &self,
        model: &ModelId,
        duration_ms: f64,
    ) -> Result<(), prometheus::Error> {
        if !duration_ms.is_finite() || duration_ms < 0.0 {
            return Err(prometheus::Error::Msg(format!(
                "Histogram value must be finite and non-negative, got: {}",
                duration_ms
            )));
        }

        self.upstream_latency
            .get_metric_with_label_values(&[model.short_name()])?
            .observe(duration_ms);
        Ok(())
    }

    /// Record a stream that broke after commitment
    pub fn stream_interruption(&self, model: &ModelId) {
        self.stream_interruptions
            .with_label_values(&[model.short_name()])
            .inc();
    }

    /// Record a failed metrics operation
    pub fn recording_failure(&self, operation: &str) {
        self.recording_failures
            .with_label_values(&[operation])
            .inc();
    }

    /// Total metrics recording failures since startup, across operations
    pub fn recording_failures_count(&self) -> u64 {
        let metric_families = self.registry.gather();
        metric_families
            .iter()
            .find(|mf| mf.name() == "itinerary_gateway_metrics_recording_failures_total")
            .map(|mf| {
                mf.get_metric()
                    .iter()
                    .map(|m| m.counter.value.unwrap_or(0.0) as u64)
                    .sum()
            })
            .unwrap_or(0)
    }

    /// Swallow a recording error after logging it and counting it
    pub fn record_or_log(&self, operation: &'static str, result: Result<(), prometheus::Error>) {
        if let Err(e) = result {
            self.recording_failure(operation);
            tracing::error!(
                operation,
                error = %e,
                "Metrics recording failed. Observability degraded but request continues."
            );
        }
    }

    /// Gather all metrics and encode them in Prometheus text format
    ///
    /// # Errors
    ///
    /// Returns an error if metric encoding fails.
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();
        let metric_count = metric_families.len();

        tracing::debug!(
            metric_family_count = metric_count,
            "Encoding metrics to Prometheus text format"
        );

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    metric_family_count = metric_count,
                    "Prometheus text encoder failed"
                );
                e
            })?;

        String::from_utf8(buffer).map_err(|e| {
            prometheus::Error::Msg(format!(
                "Failed to convert metrics to UTF-8 at byte {}: {}",
                e.utf8_error().valid_up_to(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new_registers_collectors() {
        let metrics = Metrics::new().expect("Failed to create metrics");
        let model = ModelId::from("gemini-2.5-flash");

        metrics
            .record_request(Endpoint::Gemini, "ok")
            .expect("Test operation should succeed");
        metrics
            .record_attempt(&model, AttemptLabel::Success)
            .expect("Test operation should succeed");
        metrics
            .record_resolution("complete")
            .expect("Test operation should succeed");
        metrics
            .record_upstream_latency(&model, 1200.0)
            .expect("Test operation should succeed");
        metrics.stream_interruption(&model);
        metrics.recording_failure("record_request");

        let names: Vec<String> = metrics
            .registry
            .gather()
            .iter()
            .map(|m| m.name().to_string())
            .collect();
        assert_eq!(names.len(), 6, "Expected 6 metric families, got {names:?}");
        assert!(names.contains(&"itinerary_gateway_requests_total".to_string()));
        assert!(names.contains(&"itinerary_gateway_model_attempts_total".to_string()));
        assert!(names.contains(&"itinerary_gateway_upstream_latency_ms".to_string()));
    }

    #[test]
    fn test_attempt_labels_use_short_model_name() {
        let metrics = Metrics::new().expect("Failed to create test metrics");
        metrics
            .record_attempt(&ModelId::from("models/gemini-2.0-flash"), AttemptLabel::TimedOut)
            .expect("Test operation should succeed");

        let output = metrics.gather().expect("Failed to gather test metrics");
        assert!(output.contains("model=\"gemini-2.0-flash\""));
        assert!(output.contains("outcome=\"timed_out\""));
    }

    #[test]
    fn test_latency_rejects_non_finite_and_negative_values() {
        let metrics = Metrics::new().expect("Failed to create test metrics");
        let model = ModelId::from("m");
        assert!(metrics.record_upstream_latency(&model, f64::NAN).is_err());
        assert!(metrics.record_upstream_latency(&model, f64::INFINITY).is_err());
        assert!(metrics.record_upstream_latency(&model, -1.0).is_err());
    }

    #[test]
    fn test_record_or_log_counts_failures() {
        let metrics = Metrics::new().expect("Failed to create test metrics");
        assert_eq!(metrics.recording_failures_count(), 0);

        let model = ModelId::from("m");
        let result = metrics.record_upstream_latency(&model, f64::NAN);
        metrics.record_or_log("record_upstream_latency", result);
        metrics.record_or_log("record_request", Ok(()));

        assert_eq!(metrics.recording_failures_count(), 1);
    }
}
