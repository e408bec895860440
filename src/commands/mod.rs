/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

- `sessions`: list, create, show and delete design sessions
- `generate`: run one generation turn
- `analyze`: critique a generated image
- `export`: copy a generated image out of the studio

Handlers are thin: they parse user-facing values, call the `Studio`, and
print the result.
*/

use crate::config::Config;
use crate::error::Result;
use crate::storage::{ImageQuality, ImageSize};
use crate::studio::{AnalysisOutcome, Studio, TurnOutcome, ANALYSIS_HEADER};
use colored::Colorize;
use std::path::PathBuf;

pub mod sessions;

/// Resolve size and quality from CLI values, falling back to configuration
pub fn resolve_image_options(
    config: &Config,
    size: Option<&str>,
    quality: Option<&str>,
) -> Result<(ImageSize, ImageQuality)> {
    let size = match size {
        Some(value) => value.parse::<ImageSize>()?,
        None => config.generation.default_size,
    };
    let quality = match quality {
        Some(value) => value.parse::<ImageQuality>()?,
        None => config.generation.default_quality,
    };
    Ok((size, quality))
}

// Generation command handler
pub mod generate {
    use super::*;

    /// Run one generation turn and print the outcome
    ///
    /// A failed turn is reported but is not a process error: the request
    /// is already saved in the session.
    pub async fn run_generate(
        config: &Config,
        studio: &Studio,
        prompt: String,
        session: Option<String>,
        size: Option<String>,
        quality: Option<String>,
    ) -> Result<()> {
        let (size, quality) = resolve_image_options(config, size.as_deref(), quality.as_deref())?;

        println!("{}", "Creating your tattoo design...".dimmed());
        let outcome = studio
            .submit_generation(session.as_deref(), &prompt, size, quality)
            .await?;

        match outcome {
            TurnOutcome::Generated {
                session_id,
                image,
                enhanced_prompt,
                strategy,
                context_turns,
            } => {
                if context_turns > 0 {
                    println!(
                        "{}",
                        format!("Using {} previous requests as context", context_turns).dimmed()
                    );
                }
                println!("{} {}", "Session:".bold(), session_id.cyan());
                println!("{} {}", "Image:".bold(), image.id.cyan());
                println!("{} {}", "Saved to:".bold(), image.path.display());
                println!("{} {} ({}, {})", "Prompt:".bold(), strategy, image.size, image.quality);
                println!("{}", enhanced_prompt.dimmed());
            }
            TurnOutcome::Failed { session_id, error } => {
                println!("{} {}", "Session:".bold(), session_id.cyan());
                println!("{}", error.red());
            }
        }
        Ok(())
    }
}

// Analysis command handler
pub mod analyze {
    use super::*;

    /// Request an analysis and print the outcome
    pub async fn run_analyze(
        studio: &Studio,
        session: String,
        image: String,
        json: bool,
    ) -> Result<()> {
        println!("{}", "Analyzing tattoo design...".dimmed());
        let outcome = studio.request_analysis(&session, &image).await?;

        if json {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            return Ok(());
        }

        match outcome {
            AnalysisOutcome::Success { analysis, .. } => {
                println!("\n{}\n", ANALYSIS_HEADER.bold());
                println!("{}", analysis);
            }
            AnalysisOutcome::Error { message, .. } => {
                println!("{}", message.red());
            }
        }
        Ok(())
    }
}

// Export command handler
pub mod export {
    use super::*;

    /// Copy a stored image to `dest`
    ///
    /// An unknown image id is reported as a warning, not an error.
    pub async fn run_export(studio: &Studio, image: String, dest: PathBuf) -> Result<()> {
        match studio.export_image(&image, &dest).await? {
            Some(path) => {
                println!("{} {}", "Exported to".green(), path.display());
            }
            None => {
                println!("{}", format!("Image {} not found", image).yellow());
            }
        }
        Ok(())
    }
}
