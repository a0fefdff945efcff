//! Shared utilities used across multiple handlers
//!
//! The itinerary pipeline lives here because `/api/gemini` (both delivery
//! modes) and `/api/generate-itinerary` run it.

pub mod generation;

pub use generation::{
    Generated, ItineraryOutcome, PreparedInput, check_schedule, generate_itinerary, prepare_input,
    record_resolution,
};
