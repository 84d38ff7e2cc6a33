//! Gemini integration for mood-based menu recommendations.
//!
//! [`GeminiClient`] is the production [`crate::services::ReasoningService`].

mod client;
pub mod error;
pub mod types;

pub use client::GeminiClient;
pub use error::GeminiError;
