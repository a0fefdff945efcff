//! reqwest client for the Gemini REST API

use async_trait::async_trait;
use reqwest::{Client, Response, header::RETRY_AFTER};
use std::time::Duration;

use crate::models::ModelId;
use crate::upstream::types::{GenerateContentRequest, GenerateContentResponse};
use crate::upstream::{
    BackendError, FragmentStream, GenerationRequest, GenerativeBackend, RawModelResponse,
    decode_fragments,
};

const API_KEY_HEADER: &str = "x-goog-api-key";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Production [`GenerativeBackend`]
///
/// No request-level timeout is set on the client. Attempt deadlines are owned
/// by the invocation strategy, which drops the in-flight future on expiry.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Build a client for `base_url` (e.g. `https://generativelanguage.googleapis.com/v1beta`)
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn url(&self, model: &ModelId, method: &str) -> String {
        format!("{}/{}:{}", self.base_url, model.resource_path(), method)
    }

    async fn post(
        &self,
        url: String,
        request: &GenerationRequest,
    ) -> Result<Response, BackendError> {
        let body = GenerateContentRequest::single_turn(&request.prompt, &request.config);

        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();

        Err(BackendError::Status {
            status,
            body,
            retry_after,
        })
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    async fn generate(
        &self,
        model: &ModelId,
        request: &GenerationRequest,
    ) -> Result<RawModelResponse, BackendError> {
        let response = self
            .post(self.url(model, "generateContent"), request)
            .await?;

        let text = response
            .text()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        let parsed: GenerateContentResponse =
            serde_json::from_str(&text).map_err(|e| BackendError::Decode(e.to_string()))?;

        Ok(parsed.into())
    }

    async fn stream(
        &self,
        model: &ModelId,
        request: &GenerationRequest,
    ) -> Result<FragmentStream, BackendError> {
        let response = self
            .post(self.url(model, "streamGenerateContent?alt=sse"), request)
            .await?;

        Ok(decode_fragments(response.bytes_stream()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_base_and_model_resource() {
        let client = GeminiClient::new("https://example.test/v1beta/", "key").unwrap();
        assert_eq!(
            client.url(&ModelId::from("gemini-2.5-flash"), "generateContent"),
            "https://example.test/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert_eq!(
            client.url(&ModelId::from("models/gemini-2.0-flash"), "generateContent"),
            "https://example.test/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn test_debug_output_hides_api_key() {
        let client = GeminiClient::new("https://example.test", "super-secret").unwrap();
        assert!(!format!("{client:?}").contains("super-secret"));
    }
}
