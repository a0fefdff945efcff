//! Command-line interface for the itinerary gateway
//!
//! Provides argument parsing and subcommand handling for the gateway binary.

use clap::{Parser, Subcommand};

/// Travel itinerary gateway in front of a generative-language API
#[derive(Parser)]
#[command(name = "itinerary-gateway")]
#[command(version)]
#[command(about = "Travel itinerary gateway in front of a generative-language API")]
#[command(
    long_about = "itinerary-gateway turns free-text travel requests into structured itineraries. \
    It sanitizes input, assembles prompts, fails over across a prioritized list of models and \
    resolves the model reply into typed JSON or a classified error."
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# itinerary-gateway configuration
# ================================
#
# Secrets are read from the environment and override this file:
#   GEMINI_API_KEY            upstream API key
#   TRAVELPAYOUTS_ID          affiliate id injected into booking links
#   STRIPE_PRO_PAYMENT_LINK   checkout link for the "pro" plan
#   FRONTEND_URL              extra allowed CORS origin
#   PORT                      overrides server.port
#   RATE_LIMIT_WINDOW_MS      overrides rate_limit.window_seconds
#   RATE_LIMIT_MAX_REQUESTS   overrides rate_limit.max_requests

# ─────────────────────────────────────────────────────────────────────────────
# SERVER CONFIGURATION
# ─────────────────────────────────────────────────────────────────────────────

[server]
# IP address to bind to (0.0.0.0 for all interfaces, 127.0.0.1 for localhost only)
host = "0.0.0.0"

# Port to listen on
port = 3001

# Label reported by /health
environment = "development"

# ─────────────────────────────────────────────────────────────────────────────
# UPSTREAM
# ─────────────────────────────────────────────────────────────────────────────

[upstream]
base_url = "https://generativelanguage.googleapis.com/v1beta"
# affiliate_id = "123456"
# checkout_link = "https://buy.stripe.com/..."

# ─────────────────────────────────────────────────────────────────────────────
# MODEL CANDIDATES
# ─────────────────────────────────────────────────────────────────────────────
#
# Candidates are tried strictly in order, one at a time. The first model that
# answers wins; 401/403 stops the chain, 429 on the last candidate is
# reported to the client as rate limited.

[models]
itinerary = ["gemini-2.0-flash", "gemini-2.5-flash", "gemini-flash-latest", "gemini-2.5-pro"]
streaming = ["gemini-2.5-flash", "gemini-2.0-flash", "gemini-flash-latest"]
chat = ["gemini-2.5-flash", "gemini-2.0-flash", "gemini-flash-latest"]

# ─────────────────────────────────────────────────────────────────────────────
# GENERATION PARAMETERS
# ─────────────────────────────────────────────────────────────────────────────

[generation.itinerary]
temperature = 0.7
top_k = 40
top_p = 0.95
max_output_tokens = 8192
candidate_count = 1
response_mime_type = "application/json"

[generation.streaming]
temperature = 0.5
top_k = 30
top_p = 0.85
max_output_tokens = 32768
candidate_count = 1

[generation.chat]
temperature = 0.7
top_k = 40
top_p = 0.95
max_output_tokens = 8192
candidate_count = 1

# ─────────────────────────────────────────────────────────────────────────────
# TIMEOUTS
# ─────────────────────────────────────────────────────────────────────────────
#
# Per-attempt deadlines in seconds, each in (0, 300]. Every candidate gets a
# fresh deadline.

[timeouts]
generation_seconds = 120
chat_seconds = 60

# ─────────────────────────────────────────────────────────────────────────────
# CLIENT RATE LIMIT (/api/* only)
# ─────────────────────────────────────────────────────────────────────────────

[rate_limit]
window_seconds = 900
max_requests = 100
exempt_loopback = true

[cors]
allowed_origins = [
    "http://localhost:3000",
    "http://localhost:5500",
    "http://127.0.0.1:5500",
    "http://localhost:8000",
]

# ─────────────────────────────────────────────────────────────────────────────
# RESOLVER
# ─────────────────────────────────────────────────────────────────────────────

[resolver]
# When true, itineraries with structural schedule issues (days without
# activities, activities without clock times) fail with SCHEMA_VIOLATION.
# When false they are returned with a "warnings" list.
strict_schema = false

# ─────────────────────────────────────────────────────────────────────────────
# OBSERVABILITY
# ─────────────────────────────────────────────────────────────────────────────

[observability]
# Log level: "trace", "debug", "info", "warn", "error"
log_level = "info"

# Prometheus metrics are always available at /metrics on the server port
"#
}
