//! Capability traits and shared HTTP plumbing for providers
//!
//! The studio talks to three external capabilities through these traits:
//! image generation, prompt refinement, and image analysis. Each trait has
//! one HTTP implementation and can be replaced by a fake in tests.

use crate::error::{InkforgeError, Result};
use crate::storage::{ImageQuality, ImageSize};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A chat message sent to a language model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the sender (system, user, assistant)
    pub role: String,
    /// Text content
    pub content: String,
}

impl ChatMessage {
    /// Creates a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Creates a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Input to a prompt refinement call
#[derive(Debug, Clone, PartialEq)]
pub struct RefinementRequest {
    /// System and user messages, in order
    pub messages: Vec<ChatMessage>,
    /// Output length budget
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

/// Produces image bytes from an enhanced prompt
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate one image
    ///
    /// # Errors
    ///
    /// Returns error for any capability failure: network, quota,
    /// authentication, or a prompt rejected by content policy.
    async fn generate(
        &self,
        prompt: &str,
        size: ImageSize,
        quality: ImageQuality,
    ) -> Result<Vec<u8>>;
}

/// Merges a conversation into one generation prompt using a language model
#[async_trait]
pub trait PromptRefiner: Send + Sync {
    /// Return the model's text for the request
    async fn refine(&self, request: &RefinementRequest) -> Result<String>;
}

/// Produces a natural-language critique of an image
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    /// Analyze the encoded image bytes
    async fn analyze(&self, image: &[u8]) -> Result<String>;
}

/// Build an HTTP client with an explicit request timeout
pub(crate) fn http_client(timeout_seconds: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .user_agent(concat!("inkforge/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| InkforgeError::Provider(format!("Failed to create HTTP client: {}", e)).into())
}

/// Normalize a configured base URL (no trailing slash)
pub(crate) fn normalize_base(base: &str) -> String {
    base.trim().trim_end_matches('/').to_string()
}

/// Envelope used by both OpenAI and Anthropic for error bodies
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}

/// Turn a non-success response into a provider error
///
/// The API's own error message is used when the body carries one.
pub(crate) async fn error_from_response(provider: &str, response: Response) -> InkforgeError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|parsed| parsed.error.message)
        .ok()
        .filter(|message| !message.is_empty())
        .unwrap_or(body);

    tracing::error!("{} returned error {}: {}", provider, status, detail);
    InkforgeError::Provider(format!("{} returned error {}: {}", provider, status, detail))
}
