//! Turns a request plus session history into one enhanced prompt
//!
//! Composition never fails. When the refinement capability is missing,
//! errors, or returns nothing usable, the deterministic fallback is used.

use crate::prompts::{fallback_prompt, finish_refined, initial_prompt, refinement_request};
use crate::providers::PromptRefiner;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Which path produced an enhanced prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptStrategy {
    /// No textual history; preamble and suffix around the request
    Initial,
    /// Refinement model merged the history
    Refined,
    /// Refinement unavailable; history listed verbatim
    Fallback,
}

impl fmt::Display for PromptStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PromptStrategy::Initial => "initial",
            PromptStrategy::Refined => "refined",
            PromptStrategy::Fallback => "fallback",
        };
        f.write_str(label)
    }
}

/// An enhanced prompt and the strategy that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComposedPrompt {
    pub text: String,
    pub strategy: PromptStrategy,
}

/// Result of asking the refinement capability for a merged prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refinement {
    /// Usable refined body, without the style suffix
    Refined(String),
    /// No refinement capability is configured
    Disabled,
    /// Refinement failed or returned nothing usable; carries the reason
    Unavailable(String),
}

/// Prompt composer
///
/// # Examples
///
/// ```
/// use inkforge::prompts::{PromptComposer, PromptStrategy};
///
/// let rt = tokio::runtime::Runtime::new().unwrap();
/// let composer = PromptComposer::new(None, 300, 0.7);
/// let prompt = rt.block_on(composer.compose("a fox", &[]));
/// assert_eq!(prompt.strategy, PromptStrategy::Initial);
/// ```
pub struct PromptComposer {
    refiner: Option<Arc<dyn PromptRefiner>>,
    max_tokens: u32,
    temperature: f32,
}

impl PromptComposer {
    /// Create a composer; `None` disables refinement
    pub fn new(refiner: Option<Arc<dyn PromptRefiner>>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            refiner,
            max_tokens,
            temperature,
        }
    }

    /// Whether a refinement capability is wired in
    pub fn has_refiner(&self) -> bool {
        self.refiner.is_some()
    }

    /// Build the enhanced prompt for `request` given prior textual requests
    pub async fn compose(&self, request: &str, history: &[String]) -> ComposedPrompt {
        if history.is_empty() {
            tracing::debug!("No prior requests; using initial prompt");
            return ComposedPrompt {
                text: initial_prompt(request),
                strategy: PromptStrategy::Initial,
            };
        }

        match self.refine(request, history).await {
            Refinement::Refined(body) => {
                tracing::debug!(
                    "Refined prompt from {} prior requests ({} chars)",
                    history.len(),
                    body.chars().count()
                );
                ComposedPrompt {
                    text: finish_refined(&body),
                    strategy: PromptStrategy::Refined,
                }
            }
            Refinement::Disabled => {
                tracing::debug!("Prompt refinement disabled, using fallback");
                ComposedPrompt {
                    text: fallback_prompt(request, history),
                    strategy: PromptStrategy::Fallback,
                }
            }
            Refinement::Unavailable(reason) => {
                tracing::warn!("Prompt refinement unavailable, using fallback: {}", reason);
                ComposedPrompt {
                    text: fallback_prompt(request, history),
                    strategy: PromptStrategy::Fallback,
                }
            }
        }
    }

    /// Ask the refinement capability to merge the history
    pub async fn refine(&self, request: &str, history: &[String]) -> Refinement {
        let Some(refiner) = &self.refiner else {
            return Refinement::Disabled;
        };

        let call = refinement_request(request, history, self.max_tokens, self.temperature);
        match refiner.refine(&call).await {
            Ok(text) if text.trim().is_empty() => {
                Refinement::Unavailable("refinement returned empty text".to_string())
            }
            Ok(text) => Refinement::Refined(text.trim().to_string()),
            Err(e) => Refinement::Unavailable(e.to_string()),
        }
    }
}
