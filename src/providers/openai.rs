//! OpenAI provider implementation for Inkforge
//!
//! Two clients share one API key and base URL: `OpenAiImageClient` calls
//! `/images/generations` and `OpenAiChatClient` calls `/chat/completions`
//! for prompt refinement. Each has its own timeout.

use crate::config::{GenerationConfig, RefinementConfig};
use crate::error::{InkforgeError, Result};
use crate::providers::base::{
    error_from_response, http_client, normalize_base, ChatMessage, ImageGenerator,
    PromptRefiner, RefinementRequest,
};
use crate::storage::{ImageQuality, ImageSize};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Request body for `/images/generations`
#[derive(Debug, Serialize)]
struct ImageGenerationRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'a str,
    quality: &'a str,
    response_format: &'a str,
}

/// Response from `/images/generations`
#[derive(Debug, Deserialize)]
struct ImageGenerationResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    #[serde(default)]
    b64_json: Option<String>,
    #[serde(default)]
    revised_prompt: Option<String>,
}

/// Request body for `/chat/completions`
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

/// Response from `/chat/completions`
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Authenticated connection details shared by both clients
#[derive(Clone)]
struct Connection {
    client: Client,
    api_key: String,
    api_base: String,
}

impl Connection {
    fn new(config: &GenerationConfig, timeout_seconds: u64) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| InkforgeError::MissingCredentials("openai".to_string()))?;

        Ok(Self {
            client: http_client(timeout_seconds)?,
            api_key,
            api_base: normalize_base(&config.api_base),
        })
    }

    async fn post<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R> {
        let url = format!("{}/{}", self.api_base, path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("OpenAI request to {} failed: {}", path, e);
                InkforgeError::Provider(format!("OpenAI request failed: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(error_from_response("OpenAI", response).await.into());
        }

        response.json::<R>().await.map_err(|e| {
            tracing::error!("Failed to parse OpenAI response: {}", e);
            InkforgeError::Provider(format!("Failed to parse OpenAI response: {}", e)).into()
        })
    }
}

/// Image generation through the OpenAI Images API
///
/// # Examples
///
/// ```
/// use inkforge::config::GenerationConfig;
/// use inkforge::providers::OpenAiImageClient;
///
/// let config = GenerationConfig {
///     api_key: Some("sk-test".to_string()),
///     ..Default::default()
/// };
/// let client = OpenAiImageClient::new(&config).unwrap();
/// assert_eq!(client.model(), "dall-e-3");
/// ```
pub struct OpenAiImageClient {
    connection: Connection,
    model: String,
}

impl OpenAiImageClient {
    /// Create a client from the generation settings
    ///
    /// # Errors
    ///
    /// Returns `MissingCredentials` without an API key, or an error if the
    /// HTTP client cannot be built
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let connection = Connection::new(config, config.timeout_seconds)?;
        tracing::info!(
            "Initialized OpenAI image client: base={}, model={}",
            connection.api_base,
            config.model
        );
        Ok(Self {
            connection,
            model: config.model.clone(),
        })
    }

    /// Configured image model
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ImageGenerator for OpenAiImageClient {
    async fn generate(
        &self,
        prompt: &str,
        size: ImageSize,
        quality: ImageQuality,
    ) -> Result<Vec<u8>> {
        let request = ImageGenerationRequest {
            model: &self.model,
            prompt,
            n: 1,
            size: size.as_str(),
            quality: quality.as_str(),
            response_format: "b64_json",
        };

        tracing::debug!(
            "Requesting image: model={}, size={}, quality={}, prompt_chars={}",
            self.model,
            size,
            quality,
            prompt.chars().count()
        );

        let response: ImageGenerationResponse = self
            .connection
            .post("images/generations", &request)
            .await?;

        let datum = response.data.into_iter().next().ok_or_else(|| {
            InkforgeError::Provider("OpenAI response returned no images".to_string())
        })?;
        if let Some(revised) = &datum.revised_prompt {
            tracing::debug!("OpenAI revised prompt: {}", revised);
        }
        let encoded = datum.b64_json.ok_or_else(|| {
            InkforgeError::Provider("OpenAI response did not include image data".to_string())
        })?;

        BASE64.decode(encoded.as_bytes()).map_err(|e| {
            InkforgeError::Provider(format!("OpenAI image base64 decode failed: {}", e)).into()
        })
    }
}

/// Prompt refinement through the OpenAI Chat Completions API
pub struct OpenAiChatClient {
    connection: Connection,
    model: String,
}

impl OpenAiChatClient {
    /// Create a client from the generation credentials and refinement settings
    pub fn new(generation: &GenerationConfig, refinement: &RefinementConfig) -> Result<Self> {
        let connection = Connection::new(generation, refinement.timeout_seconds)?;
        tracing::info!(
            "Initialized OpenAI refinement client: base={}, model={}",
            connection.api_base,
            refinement.model
        );
        Ok(Self {
            connection,
            model: refinement.model.clone(),
        })
    }

    /// Configured chat model
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl PromptRefiner for OpenAiChatClient {
    async fn refine(&self, request: &RefinementRequest) -> Result<String> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response: ChatCompletionResponse =
            self.connection.post("chat/completions", &body).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                InkforgeError::Provider("OpenAI completion returned no content".to_string())
                    .into()
            })
    }
}
