//! Configuration management for the itinerary gateway
//!
//! Parses TOML configuration files and provides typed access to settings.
//! Secrets and deployment-specific values can be supplied through environment
//! variables, see [`Config::apply_env_overrides`].

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::models::ModelCandidates;

/// Hard upper bound for any attempt timeout, in seconds
const MAX_TIMEOUT_SECONDS: u64 = 300;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub generation: GenerationSettings,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Free-form deployment label reported by `/health`
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_environment() -> String {
    "development".to_string()
}

/// Generative-language API access and partner integrations
#[derive(Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Never written back out; usually supplied via `GEMINI_API_KEY`
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Travel-affiliate identifier injected into booking links
    #[serde(default)]
    pub affiliate_id: Option<String>,
    /// Payment link returned by `/api/create-checkout`
    #[serde(default)]
    pub checkout_link: Option<String>,
}

impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("affiliate_id", &self.affiliate_id)
            .field("checkout_link", &self.checkout_link)
            .finish()
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            affiliate_id: None,
            checkout_link: None,
        }
    }
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

impl UpstreamConfig {
    /// The API key, when one is set and non-blank
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    pub fn affiliate_id(&self) -> Option<&str> {
        self.affiliate_id.as_deref().filter(|id| !id.trim().is_empty())
    }

    /// The checkout link, unless it is missing or still a template placeholder
    pub fn checkout_link(&self) -> Option<&str> {
        self.checkout_link
            .as_deref()
            .map(str::trim)
            .filter(|link| !link.is_empty() && !link.contains("your_") && !link.contains("_here"))
    }
}

/// Prioritized model candidates per endpoint family
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelsConfig {
    #[serde(default = "default_itinerary_models")]
    pub itinerary: ModelCandidates,
    #[serde(default = "default_streaming_models")]
    pub streaming: ModelCandidates,
    #[serde(default = "default_chat_models")]
    pub chat: ModelCandidates,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            itinerary: default_itinerary_models(),
            streaming: default_streaming_models(),
            chat: default_chat_models(),
        }
    }
}

fn default_itinerary_models() -> ModelCandidates {
    [
        "gemini-2.0-flash",
        "gemini-2.5-flash",
        "gemini-flash-latest",
        "gemini-2.5-pro",
    ]
    .into_iter()
    .collect()
}

fn default_streaming_models() -> ModelCandidates {
    ["gemini-2.5-flash", "gemini-2.0-flash", "gemini-flash-latest"]
        .into_iter()
        .collect()
}

fn default_chat_models() -> ModelCandidates {
    ["gemini-2.5-flash", "gemini-2.0-flash", "gemini-flash-latest"]
        .into_iter()
        .collect()
}

/// Sampling parameters sent with every upstream call
///
/// Fields missing from a TOML section take the [`Default`] values.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub temperature: f64,
    pub top_k: u32,
    pub top_p: f64,
    pub max_output_tokens: u32,
    pub candidate_count: u32,
    pub response_mime_type: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 8192,
            candidate_count: 1,
            response_mime_type: Some("application/json".to_string()),
        }
    }
}

/// Generation parameters per endpoint family
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationSettings {
    #[serde(default)]
    pub itinerary: GenerationConfig,
    #[serde(default = "default_streaming_generation")]
    pub streaming: GenerationConfig,
    #[serde(default = "default_chat_generation")]
    pub chat: GenerationConfig,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            itinerary: GenerationConfig::default(),
            streaming: default_streaming_generation(),
            chat: default_chat_generation(),
        }
    }
}

/// Lower temperature and a larger token budget for long streamed itineraries
fn default_streaming_generation() -> GenerationConfig {
    GenerationConfig {
        temperature: 0.5,
        top_k: 30,
        top_p: 0.85,
        max_output_tokens: 32768,
        candidate_count: 1,
        response_mime_type: None,
    }
}

fn default_chat_generation() -> GenerationConfig {
    GenerationConfig {
        response_mime_type: None,
        ..GenerationConfig::default()
    }
}

/// Per-attempt timeouts, in seconds
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeoutsConfig {
    /// Itinerary generation, streamed or not
    #[serde(default = "default_generation_timeout")]
    pub generation_seconds: u64,
    #[serde(default = "default_chat_timeout")]
    pub chat_seconds: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            generation_seconds: default_generation_timeout(),
            chat_seconds: default_chat_timeout(),
        }
    }
}

fn default_generation_timeout() -> u64 {
    120
}

fn default_chat_timeout() -> u64 {
    60
}

impl TimeoutsConfig {
    pub fn generation(&self) -> Duration {
        Duration::from_secs(self.generation_seconds)
    }

    pub fn chat(&self) -> Duration {
        Duration::from_secs(self.chat_seconds)
    }
}

/// Per-client fixed-window rate limit on `/api/*`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    /// Skip limiting for loopback clients
    #[serde(default = "default_true")]
    pub exempt_loopback: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_seconds: default_window_seconds(),
            max_requests: default_max_requests(),
            exempt_loopback: true,
        }
    }
}

fn default_window_seconds() -> u64 {
    15 * 60
}

fn default_max_requests() -> u32 {
    100
}

fn default_true() -> bool {
    true
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

/// Browser origins allowed to call the API
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:5500".to_string(),
        "http://127.0.0.1:5500".to_string(),
        "http://localhost:8000".to_string(),
    ]
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ResolverConfig {
    /// Fail itinerary requests whose schedule has structural issues
    /// instead of returning them with warnings
    #[serde(default)]
    pub strict_schema: bool,
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path_display = path.as_ref().display().to_string();

        // Phase 1: Read file (preserves io::Error context)
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|source| AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            })?;

        // Phase 2: Parse TOML (preserves toml::de::Error context)
        let config: Self = toml::from_str(&content).map_err(|source| AppError::ConfigParseFailed {
            path: path_display.clone(),
            source,
        })?;

        // Phase 3: Validate parsed config (provides contextual reason)
        config
            .validate()
            .map_err(|e| AppError::ConfigValidationFailed {
                path: path_display,
                reason: e.to_string(),
            })?;

        Ok(config)
    }

    /// Overlay values from the process environment
    ///
    /// `lookup` abstracts `std::env::var` so tests can pass a map. Recognized
    /// variables: `GEMINI_API_KEY`, `TRAVELPAYOUTS_ID`,
    /// `STRIPE_PRO_PAYMENT_LINK`, `FRONTEND_URL` (appended to the CORS
    /// allow-list), `PORT`, `RATE_LIMIT_WINDOW_MS`, `RATE_LIMIT_MAX_REQUESTS`.
    ///
    /// The result is validated again.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_blank("GEMINI_API_KEY") {
            self.upstream.api_key = Some(key);
        }
        if let Some(id) = non_blank("TRAVELPAYOUTS_ID") {
            self.upstream.affiliate_id = Some(id);
        }
        if let Some(link) = non_blank("STRIPE_PRO_PAYMENT_LINK") {
            self.upstream.checkout_link = Some(link);
        }
        if let Some(origin) = non_blank("FRONTEND_URL") {
            if !self.cors.allowed_origins.contains(&origin) {
                self.cors.allowed_origins.push(origin);
            }
        }
        if let Some(port) = non_blank("PORT") {
            self.server.port = parse_env("PORT", &port)?;
        }
        if let Some(window_ms) = non_blank("RATE_LIMIT_WINDOW_MS") {
            let window_ms: u64 = parse_env("RATE_LIMIT_WINDOW_MS", &window_ms)?;
            self.rate_limit.window_seconds = window_ms.div_ceil(1000);
        }
        if let Some(max) = non_blank("RATE_LIMIT_MAX_REQUESTS") {
            self.rate_limit.max_requests = parse_env("RATE_LIMIT_MAX_REQUESTS", &max)?;
        }

        self.validate()
    }

    /// Validate configuration after parsing
    ///
    /// This is called automatically by `from_file()`, but can also be called
    /// explicitly when constructing Config via other means (e.g., in tests).
    pub fn validate(&self) -> AppResult<()> {
        if !self.upstream.base_url.starts_with("http://")
            && !self.upstream.base_url.starts_with("https://")
        {
            return Err(AppError::Config(format!(
                "upstream.base_url '{}' must start with 'http://' or 'https://'",
                self.upstream.base_url
            )));
        }

        for (name, candidates) in [
            ("itinerary", &self.models.itinerary),
            ("streaming", &self.models.streaming),
            ("chat", &self.models.chat),
        ] {
            if candidates.is_empty() {
                return Err(AppError::Config(format!(
                    "models.{} has no candidates. Example fix:\n\
                    [models]\n\
                    {} = [\"gemini-2.5-flash\", \"gemini-2.0-flash\"]",
                    name, name
                )));
            }
            if candidates.has_blank() {
                return Err(AppError::Config(format!(
                    "models.{} contains a blank model identifier",
                    name
                )));
            }
        }

        for (name, generation) in [
            ("itinerary", &self.generation.itinerary),
            ("streaming", &self.generation.streaming),
            ("chat", &self.generation.chat),
        ] {
            validate_generation(name, generation)?;
        }

        for (name, timeout) in [
            ("generation_seconds", self.timeouts.generation_seconds),
            ("chat_seconds", self.timeouts.chat_seconds),
        ] {
            if timeout == 0 {
                return Err(AppError::Config(format!(
                    "timeouts.{} must be greater than 0",
                    name
                )));
            }
            if timeout > MAX_TIMEOUT_SECONDS {
                return Err(AppError::Config(format!(
                    "timeouts.{} cannot exceed {} seconds, got {}",
                    name, MAX_TIMEOUT_SECONDS, timeout
                )));
            }
        }

        if self.rate_limit.window_seconds == 0 || self.rate_limit.max_requests == 0 {
            return Err(AppError::Config(
                "rate_limit.window_seconds and rate_limit.max_requests must be greater than 0"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

fn validate_generation(name: &str, generation: &GenerationConfig) -> AppResult<()> {
    if !generation.temperature.is_finite() || !(0.0..=2.0).contains(&generation.temperature) {
        return Err(AppError::Config(format!(
            "generation.{}.temperature must be a finite number between 0.0 and 2.0, got {}",
            name, generation.temperature
        )));
    }
    if !generation.top_p.is_finite() || generation.top_p <= 0.0 || generation.top_p > 1.0 {
        return Err(AppError::Config(format!(
            "generation.{}.top_p must be in (0.0, 1.0], got {}",
            name, generation.top_p
        )));
    }
    if generation.max_output_tokens == 0 {
        return Err(AppError::Config(format!(
            "generation.{}.max_output_tokens must be greater than 0",
            name
        )));
    }
    if generation.candidate_count == 0 {
        return Err(AppError::Config(format!(
            "generation.{}.candidate_count must be at least 1",
            name
        )));
    }
    Ok(())
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> AppResult<T> {
    value.trim().parse().map_err(|_| AppError::ConfigValidationFailed {
        path: format!("env:{}", key),
        reason: format!("'{}' is not a valid value", value),
    })
}

impl FromStr for Config {
    type Err = AppError;

    fn from_str(toml_str: &str) -> Result<Self, Self::Err> {
        let config: Config = toml::from_str(toml_str).map_err(|source| AppError::ConfigParseFailed {
            path: "<string>".to_string(),
            source,
        })?;

        config.validate()?;
        Ok(config)
    }
}
