//! Text-generation client.
//!
//! [`TextGenerator`] is the seam the provider calls; [`GeminiClient`] is the
//! production implementation over the Gemini `generateContent` REST API.

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::HeaderValue;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("API key not configured")]
    MissingCredential,
    #[error("rate limited by generation service: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },
    #[error("generation request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("generation service returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("generation response contained no text")]
    Malformed,
}

/// Single request/response text generation.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, credential: &str, prompt: &str) -> Result<String, GenerationError>;
}

/// Gemini REST client.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    /// Point the client at another endpoint root (used by tests).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

impl Default for GeminiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, credential: &str, prompt: &str) -> Result<String, GenerationError> {
        if credential.trim().is_empty() {
            return Err(GenerationError::MissingCredential);
        }

        let url = format!(
            "{}/{model}:generateContent",
            self.base_url.trim_end_matches('/'),
            model = self.model
        );
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", credential)
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers().get("retry-after"));
            let text = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, &text, retry_after));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|_| GenerationError::Malformed)?;
        extract_text(parsed).ok_or(GenerationError::Malformed)
    }
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Deserialize)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

fn extract_text(response: GenerateContentResponse) -> Option<String> {
    let text: String = response
        .candidates?
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .filter_map(|part| part.text)
        .collect();
    (!text.trim().is_empty()).then_some(text)
}

fn map_http_error(status: StatusCode, body: &str, retry_after: Option<Duration>) -> GenerationError {
    let message = serde_json::from_str::<ErrorWrapper>(body)
        .ok()
        .map(|wrapper| {
            let msg = wrapper.error.message.unwrap_or_else(|| body.to_string());
            match wrapper.error.status.filter(|s| !s.is_empty()) {
                Some(status_text) => format!("{status_text}: {msg}"),
                None => msg,
            }
        })
        .unwrap_or_else(|| body.to_string());

    if status == StatusCode::TOO_MANY_REQUESTS {
        GenerationError::RateLimited {
            message,
            retry_after,
        }
    } else {
        GenerationError::Status {
            status: status.as_u16(),
            message,
        }
    }
}

fn parse_retry_after(header: Option<&HeaderValue>) -> Option<Duration> {
    let value = header?.to_str().ok()?;
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Read a `retry in 12.3s` hint out of a rate-limit message.
pub fn retry_hint(message: &str) -> Option<Duration> {
    static RETRY: OnceLock<Option<Regex>> = OnceLock::new();
    let re = RETRY
        .get_or_init(|| Regex::new(r"(?i)retry in ([\d.]+)s").ok())
        .as_ref()?;
    let secs: f64 = re.captures(message)?.get(1)?.as_str().parse().ok()?;
    secs.is_finite()
        .then(|| Duration::from_secs(secs.max(0.0).ceil() as u64))
}
