//! Prompt texts and deterministic prompt builders
//!
//! This module holds the fixed wording used to turn design requests into
//! generation prompts. The two deterministic builders here never fail; the
//! `composer` submodule decides when to use them.

pub mod composer;

pub use composer::{ComposedPrompt, PromptComposer, PromptStrategy, Refinement};

use crate::providers::{ChatMessage, RefinementRequest};

/// Prefix for a session's first request
pub const PREAMBLE: &str = "Professional tattoo design:";

/// Finishing instructions appended to every enhanced prompt
pub const STYLE_SUFFIX: &str = "Professional tattoo design, black ink style, high contrast, clean lines suitable for skin application.";

/// First line of the fallback composition
pub const FALLBACK_HEADER: &str = "Professional tattoo design with the following evolution:";

/// Instruction closing the fallback composition, before the style suffix
pub const EVOLUTION_INSTRUCTION: &str = "Create a tattoo design that builds upon the previous requests, maintaining stylistic consistency while incorporating the new elements from the current request.";

/// System instruction for the refinement model
pub const REFINEMENT_SYSTEM_PROMPT: &str = "You are a tattoo design assistant. Based on the conversation history, create a detailed prompt for an image generation model that incorporates all previous design requests while emphasizing the latest request. The design should evolve and build upon previous iterations, maintaining consistency while adding new elements.";

const REFINEMENT_INSTRUCTIONS: &str = "Create a single, comprehensive prompt for the image generation model that:
1. Incorporates all design elements from previous requests
2. Emphasizes the new elements from the current request
3. Maintains stylistic consistency
4. Is suitable for a professional tattoo design";

/// Enhanced prompt for a session with no textual history
///
/// # Examples
///
/// ```
/// use inkforge::prompts::{initial_prompt, PREAMBLE, STYLE_SUFFIX};
///
/// let prompt = initial_prompt("minimalist mountain line art");
/// assert_eq!(
///     prompt,
///     format!("{} minimalist mountain line art. {}", PREAMBLE, STYLE_SUFFIX)
/// );
/// ```
pub fn initial_prompt(request: &str) -> String {
    format!("{} {}. {}", PREAMBLE, request, STYLE_SUFFIX)
}

/// Enhanced prompt built from the raw history without any model call
///
/// Prior requests are numbered from 1 in the order given.
pub fn fallback_prompt(request: &str, history: &[String]) -> String {
    let mut parts = Vec::with_capacity(history.len() + 4);
    parts.push(FALLBACK_HEADER.to_string());
    parts.extend(
        history
            .iter()
            .enumerate()
            .map(|(i, prior)| format!("Request {}: {}", i + 1, prior)),
    );
    parts.push(format!("Current request: {}", request));
    parts.push(EVOLUTION_INSTRUCTION.to_string());
    parts.push(STYLE_SUFFIX.to_string());
    parts.join("\n")
}

/// Append the style suffix to a refined prompt body
pub fn finish_refined(body: &str) -> String {
    format!("{}\n\n{}", body.trim(), STYLE_SUFFIX)
}

/// Messages asking the refinement model to merge history into one prompt
pub fn refinement_request(
    request: &str,
    history: &[String],
    max_tokens: u32,
    temperature: f32,
) -> RefinementRequest {
    let mut context = String::from("Previous tattoo design requests in this session:\n");
    for (i, prior) in history.iter().enumerate() {
        context.push_str(&format!("{}. {}\n", i + 1, prior));
    }
    context.push_str(&format!("\nCurrent request: {}\n\n", request));
    context.push_str(REFINEMENT_INSTRUCTIONS);

    RefinementRequest {
        messages: vec![
            ChatMessage::system(REFINEMENT_SYSTEM_PROMPT),
            ChatMessage::user(context),
        ],
        max_tokens,
        temperature,
    }
}
