//! Error types for the itinerary gateway
//!
//! Every failure a client can observe maps to one [`ErrorKind`] with a stable
//! `code` string. All errors implement `IntoResponse` for Axum handlers and
//! render as `{ "error": ..., "code": ..., "retryAfter"?: ... }`.
//!
//! Upstream bodies, raw model text and other internal detail never reach the
//! response payload. They are logged server-side when the response is built.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::intake::InvalidInput;
use crate::models::InvocationError;
use crate::resolver::ResolveError;

/// Stable error classification exposed to clients via the `code` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed, oversized or missing user text
    InvalidInput,
    /// Upstream returned no text and no special finish reason
    EmptyResponse,
    /// Upstream blocked the content on policy grounds
    SafetyFiltered,
    /// Upstream hit its token limit without usable partial text
    MaxTokensExceeded,
    /// No JSON object could be located in the upstream text
    NoJsonFound,
    /// A JSON candidate was located but did not parse
    MalformedJson,
    /// Parsed itinerary violated the schema and strict validation is on
    SchemaViolation,
    /// Every model candidate in the chain failed
    AllModelsFailed,
    /// Upstream answered 429 on the final candidate
    RateLimited,
    /// Upstream rejected the API credential
    AuthError,
    /// This client exceeded the gateway's own request window
    ClientRateLimited,
    /// A required collaborator is not configured
    ServiceUnavailable,
    /// Unknown route
    NotFound,
    /// Anything else
    Internal,
}

impl ErrorKind {
    /// Stable machine-readable identifier
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::EmptyResponse => "EMPTY_RESPONSE",
            ErrorKind::SafetyFiltered => "SAFETY_FILTERED",
            ErrorKind::MaxTokensExceeded => "MAX_TOKENS_EXCEEDED",
            ErrorKind::NoJsonFound => "NO_JSON_FOUND",
            ErrorKind::MalformedJson => "MALFORMED_JSON",
            ErrorKind::SchemaViolation => "SCHEMA_VIOLATION",
            ErrorKind::AllModelsFailed => "ALL_MODELS_FAILED",
            ErrorKind::RateLimited => "AI_RATE_LIMITED",
            ErrorKind::AuthError => "AI_AUTH_ERROR",
            ErrorKind::ClientRateLimited => "RATE_LIMITED",
            ErrorKind::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }

    /// HTTP status the kind is surfaced with
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::InvalidInput | ErrorKind::SafetyFiltered => StatusCode::BAD_REQUEST,
            ErrorKind::RateLimited | ErrorKind::ClientRateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::EmptyResponse
            | ErrorKind::MaxTokensExceeded
            | ErrorKind::NoJsonFound
            | ErrorKind::MalformedJson
            | ErrorKind::SchemaViolation
            | ErrorKind::AllModelsFailed
            | ErrorKind::AuthError
            | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message that carries no internal detail
    pub fn public_message(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "Invalid input.",
            ErrorKind::EmptyResponse => "AI service returned an empty response. Please try again.",
            ErrorKind::SafetyFiltered => {
                "Content was filtered by safety systems. Please rephrase your request."
            }
            ErrorKind::MaxTokensExceeded => {
                "Response too long for AI service. Please try a shorter or more specific request."
            }
            ErrorKind::NoJsonFound | ErrorKind::MalformedJson | ErrorKind::SchemaViolation => {
                "AI service returned a malformed response. Please try again."
            }
            ErrorKind::AllModelsFailed | ErrorKind::Internal => {
                "AI service temporarily unavailable. Please try again."
            }
            ErrorKind::RateLimited => {
                "AI service is temporarily overloaded. Please try again in a few moments."
            }
            ErrorKind::AuthError => "AI service temporarily unavailable.",
            ErrorKind::ClientRateLimited => {
                "Too many requests from this IP. Please try again later."
            }
            ErrorKind::ServiceUnavailable => "AI service not properly configured.",
            ErrorKind::NotFound => "Endpoint not found.",
        }
    }
}

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read config file '{path}': {source}")]
    ConfigFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ConfigParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration in '{path}': {reason}")]
    ConfigValidationFailed { path: String, reason: String },

    #[error(transparent)]
    InvalidInput(#[from] InvalidInput),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Invocation(#[from] InvocationError),

    #[error("Itinerary failed schema validation: {}", .0.join("; "))]
    SchemaViolation(Vec<String>),

    #[error("Client exceeded request window, retry after {retry_after_seconds}s")]
    ClientRateLimited { retry_after_seconds: u64 },

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("No route for {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Classify this error for the client-facing `code`
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Config(_)
            | AppError::ConfigFileRead { .. }
            | AppError::ConfigParseFailed { .. }
            | AppError::ConfigValidationFailed { .. }
            | AppError::Internal(_) => ErrorKind::Internal,
            AppError::InvalidInput(_) => ErrorKind::InvalidInput,
            AppError::Resolve(e) => e.kind(),
            AppError::Invocation(e) => e.kind(),
            AppError::SchemaViolation(_) => ErrorKind::SchemaViolation,
            AppError::ClientRateLimited { .. } => ErrorKind::ClientRateLimited,
            AppError::ServiceUnavailable(_) => ErrorKind::ServiceUnavailable,
            AppError::NotFound(_) => ErrorKind::NotFound,
        }
    }

    /// Seconds the client should wait before retrying, for rate-limit kinds
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            AppError::Invocation(e) => e.retry_after(),
            AppError::ClientRateLimited {
                retry_after_seconds,
            } => Some(*retry_after_seconds),
            _ => None,
        }
    }

    /// Message safe to show the client
    ///
    /// Validation failures describe the caller's own input and are passed
    /// through; everything else uses the kind's fixed message.
    fn client_message(&self) -> String {
        match self {
            AppError::InvalidInput(e) => e.to_string(),
            AppError::ServiceUnavailable(msg) => msg.clone(),
            other => other.kind().public_message().to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = kind.status();

        if status.is_server_error() {
            tracing::error!(code = kind.code(), error = %self, "Request failed");
        } else {
            tracing::warn!(code = kind.code(), error = %self, "Request rejected");
        }

        let mut body = serde_json::json!({
            "error": self.client_message(),
            "code": kind.code(),
        });
        let retry_after = self.retry_after();
        if let Some(seconds) = retry_after {
            body["retryAfter"] = serde_json::json!(seconds);
        }

        let mut response = (status, Json(body)).into_response();
        if let Some(seconds) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Convenience type alias for Results
pub type AppResult<T> = Result<T, AppError>;
