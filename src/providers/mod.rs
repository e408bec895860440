//! Provider module for Inkforge
//!
//! This module contains the capability traits and their HTTP
//! implementations: OpenAI for image generation and prompt refinement,
//! Anthropic for image analysis.

pub mod anthropic;
pub mod base;
pub mod openai;

pub use anthropic::AnthropicAnalyzer;
pub use base::{ChatMessage, ImageAnalyzer, ImageGenerator, PromptRefiner, RefinementRequest};
pub use openai::{OpenAiChatClient, OpenAiImageClient};

use crate::config::Config;
use crate::error::Result;
use std::sync::Arc;

/// Create the image generation client
///
/// # Errors
///
/// Returns error if the generation API key is missing or the HTTP client
/// cannot be built
pub fn create_generator(config: &Config) -> Result<Arc<dyn ImageGenerator>> {
    Ok(Arc::new(OpenAiImageClient::new(&config.generation)?))
}

/// Create the prompt refinement client, if refinement is enabled
pub fn create_refiner(config: &Config) -> Result<Option<Arc<dyn PromptRefiner>>> {
    if !config.refinement.enabled {
        tracing::info!("Prompt refinement disabled; history uses the fallback composition");
        return Ok(None);
    }
    Ok(Some(Arc::new(OpenAiChatClient::new(
        &config.generation,
        &config.refinement,
    )?)))
}

/// Create the analysis client, if an Anthropic key is configured
///
/// Analysis is optional: without a key the studio reports an error outcome
/// for analysis requests instead of failing at startup.
pub fn create_analyzer(config: &Config) -> Result<Option<Arc<dyn ImageAnalyzer>>> {
    let has_key = config
        .analysis
        .api_key
        .as_deref()
        .is_some_and(|key| !key.trim().is_empty());
    if !has_key {
        tracing::debug!("No Anthropic API key configured; analysis unavailable");
        return Ok(None);
    }
    Ok(Some(Arc::new(AnthropicAnalyzer::new(&config.analysis)?)))
}
