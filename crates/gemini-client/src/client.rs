use reqwest::StatusCode;
use thiserror::Error;

use crate::types::{GenerateRequest, GenerateResponse};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const STATUS_BODY_EXCERPT_LEN: usize = 512;

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("request to generation API failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("generation API returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("generation API returned no candidates")]
    EmptyResponse,
}

/// One authenticated handle to the generation API.
///
/// The key travels as a query parameter, so a fresh `GeminiClient` per key is
/// cheap; callers that rotate keys construct one per attempt over a shared
/// `reqwest::Client`.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub async fn generate(
        &self,
        model: &str,
        request: &GenerateRequest,
    ) -> Result<String, GeminiError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, model
        );

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            truncate_excerpt(&mut body, STATUS_BODY_EXCERPT_LEN);
            tracing::warn!(
                target: "gemini_client",
                %status,
                "generation request rejected",
            );
            return Err(GeminiError::Status { status, body });
        }

        let payload: GenerateResponse = response.json().await?;
        payload.text().ok_or(GeminiError::EmptyResponse)
    }
}

/// Shorten an error body to at most `max_len` bytes without splitting a
/// multi-byte character. `String::truncate` panics off a char boundary.
fn truncate_excerpt(body: &mut String, max_len: usize) {
    if body.len() <= max_len {
        return;
    }
    let mut end = max_len;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body.truncate(end);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let client = GeminiClient::new(
            reqwest::Client::new(),
            "https://generativelanguage.googleapis.com/",
            "key",
        );
        assert_eq!(client.base_url, "https://generativelanguage.googleapis.com");
    }

    #[test]
    fn error_body_excerpt_respects_char_boundaries() {
        // 511 ASCII bytes followed by a two-byte char straddling the limit.
        let mut body = "a".repeat(STATUS_BODY_EXCERPT_LEN - 1);
        body.push('é');
        truncate_excerpt(&mut body, STATUS_BODY_EXCERPT_LEN);
        assert_eq!(body.len(), STATUS_BODY_EXCERPT_LEN - 1);
        assert!(body.chars().all(|c| c == 'a'));
    }

    #[test]
    fn short_error_bodies_are_left_intact() {
        let mut body = "quota exhausted".to_string();
        truncate_excerpt(&mut body, STATUS_BODY_EXCERPT_LEN);
        assert_eq!(body, "quota exhausted");
    }
}
