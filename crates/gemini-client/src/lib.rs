//! Minimal typed client for the Generative Language `generateContent` REST API.

mod client;
mod types;

pub use client::{GeminiClient, GeminiError, DEFAULT_BASE_URL};
pub use types::{
    Candidate, Content, GenerateRequest, GenerateResponse, GenerationConfig, Part,
};

/// Strip markdown code fences from a model response before JSON parsing.
///
/// Models asked for `application/json` output still occasionally wrap the
/// payload in ```json fences.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}
