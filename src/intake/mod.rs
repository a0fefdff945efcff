//! Request intake: sanitization and metadata extraction
//!
//! Everything a user types passes through [`sanitize`] before it is
//! interpolated into a prompt. [`extract`] then derives the signals used to
//! pick prompt variants.

pub mod metadata;
pub mod sanitizer;

pub use metadata::{RequestMetadata, extract};
pub use sanitizer::{InvalidInput, MAX_INPUT_CHARS, preview, sanitize, sanitize_value};
