//! Generative-language API access
//!
//! [`GenerativeBackend`] is the seam between the invocation strategy and the
//! network. [`gemini::GeminiClient`] is the production implementation; tests
//! substitute scripted backends.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::GenerationConfig;
use crate::models::ModelId;

pub mod gemini;
pub mod response;
pub mod stream;
pub mod types;

pub use gemini::GeminiClient;
pub use response::{FinishReason, RawModelResponse, SafetyRating};
pub use stream::{FragmentStream, LineDecoder, StreamLine, decode_fragments, parse_stream_line};

/// Prompt plus the generation parameters for one call
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub config: GenerationConfig,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, config: GenerationConfig) -> Self {
        Self {
            prompt: prompt.into(),
            config,
        }
    }
}

/// Failure of a single upstream call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Non-2xx answer; `body` is kept for logs only
    #[error("upstream returned HTTP {status}")]
    Status {
        status: u16,
        body: String,
        retry_after: Option<u64>,
    },

    /// Connection, TLS or body read failure before a complete answer
    #[error("upstream transport error: {0}")]
    Transport(String),

    /// 2xx answer whose body is not a valid response document
    #[error("upstream response could not be decoded: {0}")]
    Decode(String),
}

/// One generative-language service that can answer prompts
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Complete `request` with `model` in a single round trip
    async fn generate(
        &self,
        model: &ModelId,
        request: &GenerationRequest,
    ) -> Result<RawModelResponse, BackendError>;

    /// Start a streamed completion
    ///
    /// Returns once the upstream has accepted the call; fragments arrive on
    /// the returned stream.
    async fn stream(
        &self,
        model: &ModelId,
        request: &GenerationRequest,
    ) -> Result<FragmentStream, BackendError>;
}
