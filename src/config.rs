//! Configuration management for Inkforge
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{InkforgeError, Result};
use crate::storage::{ImageQuality, ImageSize};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for Inkforge
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where sessions and images are kept
    #[serde(default)]
    pub storage: StorageConfig,
    /// Image generation capability
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Auxiliary prompt refinement capability
    #[serde(default)]
    pub refinement: RefinementConfig,
    /// Vision critique capability
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage locations
///
/// Unset paths resolve to the platform data directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    /// Root directory for generated images
    #[serde(default)]
    pub images_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolve the database path, falling back to `<data dir>/chats.db`
    pub fn resolve_db_path(&self) -> Result<PathBuf> {
        match &self.db_path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("chats.db")),
        }
    }

    /// Resolve the image directory, falling back to `<data dir>/images`
    pub fn resolve_images_dir(&self) -> Result<PathBuf> {
        match &self.images_dir {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("images")),
        }
    }
}

fn data_dir() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("com", "inkforge", "inkforge")
        .ok_or_else(|| InkforgeError::Storage("Could not determine data directory".into()))?;
    Ok(proj_dirs.data_dir().to_path_buf())
}

/// OpenAI image generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// API key; usually supplied through `OPENAI_API_KEY`
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Base URL for the OpenAI API (useful for tests and local mocks)
    #[serde(default = "default_openai_api_base")]
    pub api_base: String,

    /// Image model
    #[serde(default = "default_image_model")]
    pub model: String,

    /// Size used when none is given on the command line
    #[serde(default)]
    pub default_size: ImageSize,

    /// Quality used when none is given on the command line
    #[serde(default)]
    pub default_quality: ImageQuality,

    /// Request timeout (seconds)
    #[serde(default = "default_generation_timeout")]
    pub timeout_seconds: u64,
}

fn default_openai_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_image_model() -> String {
    "dall-e-3".to_string()
}

fn default_generation_timeout() -> u64 {
    120
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: default_openai_api_base(),
            model: default_image_model(),
            default_size: ImageSize::default(),
            default_quality: ImageQuality::default(),
            timeout_seconds: default_generation_timeout(),
        }
    }
}

/// Prompt refinement settings
///
/// Refinement shares the generation API key and base URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinementConfig {
    /// Use the language model to merge history into one prompt
    #[serde(default = "default_refinement_enabled")]
    pub enabled: bool,

    /// Chat completion model
    #[serde(default = "default_refinement_model")]
    pub model: String,

    /// Output length budget
    #[serde(default = "default_refinement_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    #[serde(default = "default_refinement_temperature")]
    pub temperature: f32,

    /// Request timeout (seconds)
    #[serde(default = "default_refinement_timeout")]
    pub timeout_seconds: u64,
}

fn default_refinement_enabled() -> bool {
    true
}

fn default_refinement_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_refinement_max_tokens() -> u32 {
    300
}

fn default_refinement_temperature() -> f32 {
    0.7
}

fn default_refinement_timeout() -> u64 {
    30
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            enabled: default_refinement_enabled(),
            model: default_refinement_model(),
            max_tokens: default_refinement_max_tokens(),
            temperature: default_refinement_temperature(),
            timeout_seconds: default_refinement_timeout(),
        }
    }
}

/// Anthropic vision analysis settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// API key; usually supplied through `ANTHROPIC_API_KEY`
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Base URL for the Anthropic API
    #[serde(default = "default_anthropic_api_base")]
    pub api_base: String,

    /// Vision model
    #[serde(default = "default_analysis_model")]
    pub model: String,

    /// Output length budget
    #[serde(default = "default_analysis_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout (seconds)
    #[serde(default = "default_analysis_timeout")]
    pub timeout_seconds: u64,
}

fn default_anthropic_api_base() -> String {
    "https://api.anthropic.com/v1".to_string()
}

fn default_analysis_model() -> String {
    "claude-3-haiku-20240307".to_string()
}

fn default_analysis_max_tokens() -> u32 {
    1000
}

fn default_analysis_timeout() -> u64 {
    60
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: default_anthropic_api_base(),
            model: default_analysis_model(),
            max_tokens: default_analysis_max_tokens(),
            timeout_seconds: default_analysis_timeout(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file is not an error: defaults are used and a warning is
    /// logged.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| InkforgeError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| InkforgeError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Some(key) = non_empty_env("OPENAI_API_KEY") {
            self.generation.api_key = Some(key);
        }

        if let Some(key) = non_empty_env("ANTHROPIC_API_KEY") {
            self.analysis.api_key = Some(key);
        }

        if let Some(base) = non_empty_env("INKFORGE_OPENAI_API_BASE") {
            self.generation.api_base = base;
        }

        if let Some(base) = non_empty_env("INKFORGE_ANTHROPIC_API_BASE") {
            self.analysis.api_base = base;
        }

        if let Some(model) = non_empty_env("INKFORGE_IMAGE_MODEL") {
            self.generation.model = model;
        }

        if let Some(model) = non_empty_env("INKFORGE_REFINEMENT_MODEL") {
            self.refinement.model = model;
        }

        if let Some(model) = non_empty_env("INKFORGE_ANALYSIS_MODEL") {
            self.analysis.model = model;
        }

        if let Some(path) = non_empty_env("INKFORGE_DB_PATH") {
            self.storage.db_path = Some(PathBuf::from(path));
        }

        if let Some(path) = non_empty_env("INKFORGE_IMAGES_DIR") {
            self.storage.images_dir = Some(PathBuf::from(path));
        }

        if let Some(timeout) = non_empty_env("INKFORGE_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse::<u64>() {
                self.generation.timeout_seconds = value;
                self.refinement.timeout_seconds = value;
                self.analysis.timeout_seconds = value;
            } else {
                tracing::warn!("Invalid INKFORGE_TIMEOUT_SECONDS: {}", timeout);
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(path) = &cli.db_path {
            tracing::info!("Using database override from CLI: {}", path.display());
            self.storage.db_path = Some(path.clone());
        }

        if let Some(dir) = &cli.images_dir {
            tracing::info!("Using image directory override from CLI: {}", dir.display());
            self.storage.images_dir = Some(dir.clone());
        }

        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }
    }

    /// Validate the configuration
    ///
    /// A missing generation key is fatal: nothing in the tool works
    /// without it.
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        let has_key = self
            .generation
            .api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty());
        if !has_key {
            return Err(InkforgeError::MissingCredentials(
                "openai (set OPENAI_API_KEY or generation.api_key)".to_string(),
            )
            .into());
        }

        for (name, base) in [
            ("generation.api_base", &self.generation.api_base),
            ("analysis.api_base", &self.analysis.api_base),
        ] {
            url::Url::parse(base).map_err(|e| {
                InkforgeError::Config(format!("{} is not a valid URL ({}): {}", name, base, e))
            })?;
        }

        for (name, timeout) in [
            ("generation.timeout_seconds", self.generation.timeout_seconds),
            ("refinement.timeout_seconds", self.refinement.timeout_seconds),
            ("analysis.timeout_seconds", self.analysis.timeout_seconds),
        ] {
            if timeout == 0 {
                return Err(
                    InkforgeError::Config(format!("{} must be greater than 0", name)).into(),
                );
            }
        }

        if self.refinement.max_tokens == 0 {
            return Err(InkforgeError::Config(
                "refinement.max_tokens must be greater than 0".to_string(),
            )
            .into());
        }

        if self.analysis.max_tokens == 0 {
            return Err(InkforgeError::Config(
                "analysis.max_tokens must be greater than 0".to_string(),
            )
            .into());
        }

        if !(0.0..=2.0).contains(&self.refinement.temperature) {
            return Err(InkforgeError::Config(
                "refinement.temperature must be between 0.0 and 2.0".to_string(),
            )
            .into());
        }

        if self.generation.model.trim().is_empty() {
            return Err(
                InkforgeError::Config("generation.model cannot be empty".to_string()).into(),
            );
        }

        Ok(())
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.generation.api_key = Some("sk-test".to_string());
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.generation.model, "dall-e-3");
        assert_eq!(config.generation.default_size, ImageSize::Square);
        assert_eq!(config.generation.default_quality, ImageQuality::Standard);
        assert_eq!(config.refinement.model, "gpt-4o-mini");
        assert_eq!(config.refinement.max_tokens, 300);
        assert!((config.refinement.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.analysis.max_tokens, 1000);
        assert!(config.refinement.enabled);
        assert!(!config.logging.json);
    }

    #[test]
    fn test_validation_success() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validation_requires_generation_key() {
        let err = Config::default().validate().unwrap_err();
        let err = err.downcast::<InkforgeError>().unwrap();
        assert!(matches!(err, InkforgeError::MissingCredentials(_)));
    }

    #[test]
    fn test_validation_rejects_blank_key() {
        let mut config = valid_config();
        config.generation.api_key = Some("   ".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_zero_timeout() {
        let mut config = valid_config();
        config.analysis.timeout_seconds = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("analysis.timeout_seconds"));
    }

    #[test]
    fn test_validation_invalid_temperature() {
        let mut config = valid_config();
        config.refinement.temperature = 3.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_api_base() {
        let mut config = valid_config();
        config.generation.api_base = "not a url".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("generation.api_base"));
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml = r#"
storage:
  db_path: /tmp/inkforge/chats.db
generation:
  model: dall-e-3
  default_size: 1792x1024
  default_quality: hd
refinement:
  enabled: false
  temperature: 0.4
analysis:
  model: claude-3-5-sonnet-latest
logging:
  json: true
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            config.storage.db_path,
            Some(PathBuf::from("/tmp/inkforge/chats.db"))
        );
        assert_eq!(config.generation.default_size, ImageSize::Landscape);
        assert_eq!(config.generation.default_quality, ImageQuality::Hd);
        assert!(!config.refinement.enabled);
        assert_eq!(config.refinement.max_tokens, 300);
        assert_eq!(config.analysis.model, "claude-3-5-sonnet-latest");
        assert!(config.logging.json);
    }

    #[test]
    fn test_config_from_yaml_rejects_unknown_size() {
        let yaml = "generation:\n  default_size: 640x480\n";
        assert!(serde_yaml::from_str::<Config>(yaml).is_err());
    }

    #[test]
    fn test_api_keys_are_not_serialized() {
        let config = valid_config();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(!yaml.contains("sk-test"));
    }

    #[test]
    fn test_storage_paths_prefer_explicit_values() {
        let storage = StorageConfig {
            db_path: Some(PathBuf::from("/data/chats.db")),
            images_dir: Some(PathBuf::from("/data/images")),
        };
        assert_eq!(
            storage.resolve_db_path().unwrap(),
            PathBuf::from("/data/chats.db")
        );
        assert_eq!(
            storage.resolve_images_dir().unwrap(),
            PathBuf::from("/data/images")
        );
    }

    #[test]
    #[serial]
    fn test_load_nonexistent_file_uses_defaults_and_env() {
        std::env::set_var("OPENAI_API_KEY", "sk-from-env");
        std::env::set_var("INKFORGE_TIMEOUT_SECONDS", "15");

        let cli = crate::cli::Cli::default();
        let config = Config::load("/nonexistent/config.yaml", &cli).unwrap();

        std::env::remove_var("OPENAI_API_KEY");
        std::env::remove_var("INKFORGE_TIMEOUT_SECONDS");

        assert_eq!(config.generation.api_key.as_deref(), Some("sk-from-env"));
        assert_eq!(config.generation.timeout_seconds, 15);
        assert_eq!(config.refinement.timeout_seconds, 15);
        assert_eq!(config.analysis.timeout_seconds, 15);
    }

    #[test]
    #[serial]
    fn test_cli_overrides_storage_paths() {
        let cli = crate::cli::Cli {
            db_path: Some(PathBuf::from("/cli/chats.db")),
            images_dir: Some(PathBuf::from("/cli/images")),
            ..Default::default()
        };
        let config = Config::load("/nonexistent/config.yaml", &cli).unwrap();
        assert_eq!(config.storage.db_path, Some(PathBuf::from("/cli/chats.db")));
        assert_eq!(config.storage.images_dir, Some(PathBuf::from("/cli/images")));
    }
}
