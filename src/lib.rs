//! Inkforge - conversational tattoo design generator library
//!
//! A user describes a tattoo over several requests in a session. Each new
//! request is combined with the session's earlier requests into one
//! enhanced prompt, an image is generated from it, and the results are kept
//! in a local SQLite database. Generated images can be sent to a vision
//! model for a written critique.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `storage`: Session store (sessions, messages, image metadata)
//! - `artifacts`: Image bytes on the local file system
//! - `history`: Conversation history assembly
//! - `prompts`: Prompt composition with refinement and fallback
//! - `providers`: Generation, refinement and analysis clients
//! - `studio`: Turn orchestration and front-end entry points
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use inkforge::{Config, Studio};
//! use inkforge::storage::{ImageQuality, ImageSize};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let studio = Studio::from_config(&config)?;
//!     let outcome = studio
//!         .submit_generation(None, "a dragon coiled around a sword", ImageSize::Square, ImageQuality::Standard)
//!         .await?;
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```

pub mod artifacts;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod history;
pub mod prompts;
pub mod providers;
pub mod storage;
pub mod studio;

// Re-export commonly used types
pub use config::Config;
pub use error::{InkforgeError, Result};
pub use prompts::{ComposedPrompt, PromptComposer, PromptStrategy};
pub use studio::{AnalysisOutcome, SessionSnapshot, Studio, TurnOutcome};
