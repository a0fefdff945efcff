//! HTTP request handlers for the itinerary gateway

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, StatusCode, Uri, header},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Config;
use crate::error::{AppError, AppResult, ErrorKind};
use crate::metrics::{Endpoint, Metrics};
use crate::middleware::{
    RateLimiter, rate_limit_middleware, request_id_middleware, security_headers_middleware,
};
use crate::models::FailoverInvoker;
use crate::prompt::PromptAssembler;
use crate::upstream::{GeminiClient, GenerativeBackend};

pub mod chat;
pub mod checkout;
pub mod gemini;
pub mod health;
pub mod itinerary;
pub mod metrics;
pub mod types;

/// Maximum accepted request body size
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Routes listed in the 404 response
pub const AVAILABLE_ENDPOINTS: [&str; 7] = [
    "GET /health",
    "GET /api/status",
    "GET /metrics",
    "POST /api/gemini",
    "POST /api/generate-itinerary",
    "POST /api/chat",
    "POST /api/create-checkout",
];

/// Application state shared across all handlers
///
/// All fields are Arc'd (or Arc-backed) for cheap cloning across Axum handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    invoker: FailoverInvoker,
    prompts: Arc<PromptAssembler>,
    metrics: Arc<Metrics>,
    limiter: RateLimiter,
}

impl AppState {
    /// Create state around an explicit backend
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics registry cannot be initialized.
    pub fn new(config: Arc<Config>, backend: Arc<dyn GenerativeBackend>) -> AppResult<Self> {
        let metrics = Arc::new(Metrics::new().map_err(|e| {
            AppError::Internal(format!("Failed to initialize metrics: {}", e))
        })?);
        let invoker = FailoverInvoker::new(backend, metrics.clone());
        let prompts = Arc::new(PromptAssembler::new(
            config.upstream.affiliate_id().map(str::to_string),
        ));
        let limiter = RateLimiter::new(&config.rate_limit);

        Ok(Self {
            config,
            invoker,
            prompts,
            metrics,
            limiter,
        })
    }

    /// Create state with the production upstream client
    pub fn from_config(config: Arc<Config>) -> AppResult<Self> {
        let client = GeminiClient::new(
            config.upstream.base_url.clone(),
            config.upstream.api_key().unwrap_or_default(),
        )
        .map_err(|e| AppError::Internal(format!("Failed to build upstream client: {}", e)))?;
        Self::new(config, Arc::new(client))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn invoker(&self) -> &FailoverInvoker {
        &self.invoker
    }

    pub fn prompts(&self) -> &PromptAssembler {
        &self.prompts
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Fail fast when no API key is configured
    pub fn require_api_key(&self) -> AppResult<()> {
        match self.config.upstream.api_key() {
            Some(_) => Ok(()),
            None => Err(AppError::ServiceUnavailable(
                ErrorKind::ServiceUnavailable.public_message().to_string(),
            )),
        }
    }

    /// Count a finished request and pass the result through
    pub fn observe<T>(&self, endpoint: Endpoint, result: AppResult<T>) -> AppResult<T> {
        let code = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind().code(),
        };
        self.metrics
            .record_or_log("record_request", self.metrics.record_request(endpoint, code));
        result
    }
}

/// Build the full application router
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/status", get(health::status))
        .route("/api/gemini", post(gemini::handler))
        .route("/api/generate-itinerary", post(itinerary::handler))
        .route("/api/chat", post(chat::handler))
        .route("/api/create-checkout", post(checkout::handler));

    Router::new()
        .route("/health", get(health::handler))
        .route("/metrics", get(metrics::handler))
        .merge(api)
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(
            state.limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors_layer(&state.config))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::HeaderName::from_static("x-requested-with"),
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(86_400))
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    tracing::debug!(path = %uri.path(), "No route");
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "error": ErrorKind::NotFound.public_message(),
            "code": ErrorKind::NotFound.code(),
            "availableEndpoints": AVAILABLE_ENDPOINTS,
        })),
    )
}
