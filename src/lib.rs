//! itinerary-gateway - free-text travel requests in, structured itineraries out
//!
//! The gateway sanitizes user text, assembles a prompt, invokes a prioritized
//! chain of generative models with per-attempt timeouts, and resolves the
//! model's reply into a typed itinerary or a classified error.

pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod intake;
pub mod itinerary;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod prompt;
pub mod resolver;
pub mod shared;
pub mod telemetry;
pub mod upstream;
