//! Anthropic provider implementation for image analysis
//!
//! Sends a generated image together with a fixed critique prompt to the
//! Messages API and returns the model's text.

use crate::config::AnalysisConfig;
use crate::error::{InkforgeError, Result};
use crate::providers::base::{error_from_response, http_client, normalize_base, ImageAnalyzer};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Instructions sent alongside every image
pub const ANALYSIS_PROMPT: &str = "Please analyze this tattoo design and provide insights on:

1. **Symbolism & Meaning**: What symbols, elements, or themes are present? What might they represent?
2. **Artistic Style**: What tattoo style is this (traditional, neo-traditional, realism, etc.)?
3. **Cultural Significance**: Are there any cultural or historical references?
4. **Design Elements**: Describe the composition, use of space, and artistic techniques.
5. **Personal Interpretation**: What emotions or stories might this tattoo convey?

Please provide a thoughtful, detailed analysis that would help someone understand the depth and artistry of this tattoo.";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<RequestMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'a str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock<'a> {
    Image { source: ImageSource<'a> },
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
struct ImageSource<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    media_type: &'a str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Vision critique through the Anthropic Messages API
pub struct AnthropicAnalyzer {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicAnalyzer {
    /// Create an analyzer from the analysis settings
    ///
    /// # Errors
    ///
    /// Returns `MissingCredentials` without an API key
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| InkforgeError::MissingCredentials("anthropic".to_string()))?;

        let analyzer = Self {
            client: http_client(config.timeout_seconds)?,
            api_key,
            api_base: normalize_base(&config.api_base),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        };

        tracing::info!(
            "Initialized Anthropic analyzer: base={}, model={}",
            analyzer.api_base,
            analyzer.model
        );
        Ok(analyzer)
    }
}

/// Media type for the image, as accepted by the Messages API
///
/// Formats the API does not accept, and bytes that cannot be identified,
/// are declared as PNG.
pub fn media_type_for(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Jpeg) => "image/jpeg",
        Ok(image::ImageFormat::Gif) => "image/gif",
        Ok(image::ImageFormat::WebP) => "image/webp",
        _ => "image/png",
    }
}

#[async_trait]
impl ImageAnalyzer for AnthropicAnalyzer {
    async fn analyze(&self, image: &[u8]) -> Result<String> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![RequestMessage {
                role: "user",
                content: vec![
                    ContentBlock::Image {
                        source: ImageSource {
                            kind: "base64",
                            media_type: media_type_for(image),
                            data: BASE64.encode(image),
                        },
                    },
                    ContentBlock::Text {
                        text: ANALYSIS_PROMPT,
                    },
                ],
            }],
        };

        tracing::debug!(
            "Requesting analysis: model={}, image_bytes={}",
            self.model,
            image.len()
        );

        let url = format!("{}/messages", self.api_base);
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Anthropic request failed: {}", e);
                InkforgeError::Provider(format!("Anthropic request failed: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(error_from_response("Anthropic", response).await.into());
        }

        let parsed: MessagesResponse = response.json().await.map_err(|e| {
            InkforgeError::Provider(format!("Failed to parse Anthropic response: {}", e))
        })?;

        parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .find_map(|block| block.text)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| {
                InkforgeError::Provider("Anthropic response contained no text".to_string()).into()
            })
    }
}
