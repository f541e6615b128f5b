use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

/// Model version used for all completions. Pinned so runs are comparable.
pub const GEMINI_MODEL: &str = "gemini-1.5-flash-latest";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

// --- Shared Utilities ---

/// Extract the domain/host from a URL string safely.
/// Returns "unknown" if the URL cannot be parsed.
pub fn extract_domain(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

// --- Shared Logging ---

/// Initialize structured logging with JSON format in production (when RUST_LOG is set),
/// or pretty format for local development.
pub fn init_logging() {
    let is_production = std::env::var("RUST_LOG").is_ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if is_production {
        let _ = fmt()
            .with_env_filter(filter)
            .json()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(true)
            .with_line_number(true)
            .try_init();
    } else {
        let _ = fmt().with_env_filter(filter).with_target(false).try_init();
    }
}

// --- Errors ---

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request to model endpoint failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model endpoint returned {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("model provider error: {message}")]
    Provider { message: String },

    /// The completion carried no content parts (safety filtering, empty
    /// candidate). The provider's prompt feedback is preserved for diagnosis.
    #[error("empty completion from model; prompt feedback: {}", .feedback.as_deref().unwrap_or("none"))]
    EmptyCompletion { feedback: Option<String> },
}

// --- Capability Trait ---

/// Narrow generative-text capability: prompt in, raw model text out.
/// Production uses [`GeminiClient`]; tests substitute a deterministic stub.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

// --- Gemini Structs ---

#[derive(Serialize, Deserialize, Debug)]
pub struct GeminiPart {
    pub text: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct GeminiContent {
    pub parts: Vec<GeminiPart>,
}

#[derive(Serialize, Debug)]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
}

#[derive(Deserialize, Debug)]
pub struct GeminiCandidate {
    // Absent when the candidate was blocked before any text was produced.
    pub content: Option<GeminiContent>,
}

#[derive(Deserialize, Debug)]
pub struct GeminiResponse {
    pub candidates: Option<Vec<GeminiCandidate>>,
    #[serde(rename = "promptFeedback")]
    pub prompt_feedback: Option<serde_json::Value>,
    pub error: Option<GeminiError>,
}

#[derive(Deserialize, Debug)]
pub struct GeminiError {
    pub message: String,
}

// --- Client ---

/// Gemini-backed [`TextCompletion`] implementation. One blocking request per
/// call; failures are terminal for the caller's current unit of work.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different endpoint (mock servers in tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl TextCompletion for GeminiClient {
    #[instrument(skip(self, prompt), fields(prompt_len = prompt.len()))]
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        // API key in the URL is required by the Gemini API; it is never logged.
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, GEMINI_MODEL, self.api_key
        );

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
        };

        debug!("Sending request to Gemini API");

        let res = self.http.post(&url).json(&request).send().await?;

        let status = res.status();
        debug!(status = %status, "Gemini API response received");

        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, body });
        }

        let resp: GeminiResponse = res.json().await?;
        completion_text(resp)
    }
}

/// Pull the first text part out of a decoded response, mapping contentless
/// completions to [`LlmError::EmptyCompletion`] with the provider's feedback.
pub fn completion_text(resp: GeminiResponse) -> Result<String, LlmError> {
    if let Some(error) = resp.error {
        return Err(LlmError::Provider {
            message: error.message,
        });
    }

    let feedback = resp.prompt_feedback.as_ref().map(|v| v.to_string());

    let text = resp
        .candidates
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .map(|p| p.text);

    match text {
        Some(text) => Ok(text),
        None => Err(LlmError::EmptyCompletion { feedback }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_request_serialization() {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: "Hello, Gemini!".to_string(),
                }],
            }],
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("Hello, Gemini!"));
        assert!(json.contains("contents"));
        assert!(json.contains("parts"));
        assert!(json.contains("text"));
    }

    #[test]
    fn test_gemini_response_deserialization_success() {
        let json = r#"{
            "candidates": [{
                "content": {
                    "parts": [{"text": "Hello from Gemini!"}]
                }
            }]
        }"#;

        let response: GeminiResponse = serde_json::from_str(json).unwrap();
        let text = completion_text(response).unwrap();
        assert_eq!(text, "Hello from Gemini!");
    }

    #[test]
    fn test_gemini_response_deserialization_error() {
        let json = r#"{
            "error": {
                "message": "API key invalid"
            }
        }"#;

        let response: GeminiResponse = serde_json::from_str(json).unwrap();
        match completion_text(response) {
            Err(LlmError::Provider { message }) => assert_eq!(message, "API key invalid"),
            other => panic!("expected provider error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_empty_response_preserves_prompt_feedback() {
        let json = r#"{
            "promptFeedback": {
                "blockReason": "SAFETY"
            }
        }"#;

        let response: GeminiResponse = serde_json::from_str(json).unwrap();
        match completion_text(response) {
            Err(LlmError::EmptyCompletion { feedback }) => {
                assert!(feedback.unwrap().contains("SAFETY"));
            }
            other => panic!("expected empty completion, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_blocked_candidate_without_content_is_empty() {
        let json = r#"{"candidates": [{"finishReason": "SAFETY"}]}"#;

        let response: GeminiResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(
            completion_text(response),
            Err(LlmError::EmptyCompletion { .. })
        ));
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(extract_domain("https://example.com/news"), "example.com");
        assert_eq!(extract_domain("not a url"), "unknown");
    }
}
