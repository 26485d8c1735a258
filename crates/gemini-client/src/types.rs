//! Wire types for the `generateContent` endpoint.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

impl GenerateRequest {
    /// Single-turn text prompt, plain-text response.
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.into(),
                }],
            }],
            generation_config: None,
        }
    }

    /// Single-turn text prompt asking for a JSON-typed response body.
    pub fn json(prompt: impl Into<String>) -> Self {
        let mut request = Self::text(prompt);
        request.generation_config = Some(GenerationConfig {
            response_mime_type: Some("application/json".to_string()),
        });
        request
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationConfig {
    #[serde(rename = "responseMimeType", skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    pub content: Content,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate's parts.
    pub fn text(&self) -> Option<String> {
        let candidate = self.candidates.first()?;
        let mut combined = String::new();
        for part in &candidate.content.parts {
            combined.push_str(&part.text);
        }
        if combined.is_empty() {
            None
        } else {
            Some(combined)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_request_sets_response_mime_type() {
        let request = GenerateRequest::json("list chapters");
        let body = serde_json::to_value(&request).expect("serialize request");
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(body["contents"][0]["parts"][0]["text"], "list chapters");
    }

    #[test]
    fn response_text_joins_parts() {
        let response: GenerateResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Hello " }, { "text": "world" }] }
            }]
        }))
        .expect("parse response");
        assert_eq!(response.text().as_deref(), Some("Hello world"));
    }

    #[test]
    fn response_text_is_none_without_candidates() {
        let response: GenerateResponse =
            serde_json::from_value(serde_json::json!({})).expect("parse empty response");
        assert!(response.text().is_none());
    }
}
