//! Design studio: the entry points a chat front end calls
//!
//! `Studio` ties the session store, artifact store, prompt composer and the
//! external capabilities together. Every call takes an explicit session id;
//! there is no ambient current session.

use crate::artifacts::ImageStore;
use crate::config::Config;
use crate::error::{InkforgeError, Result};
use crate::history::conversation_history;
use crate::prompts::{PromptComposer, PromptStrategy};
use crate::providers::{create_analyzer, create_generator, create_refiner};
use crate::providers::{ImageAnalyzer, ImageGenerator};
use crate::storage::{now_utc, Image, ImageQuality, ImageSize, Message, Session, SqliteStorage};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Prefix of the text stored for a successful analysis
pub const ANALYSIS_HEADER: &str = "🔍 Tattoo Analysis:";

const SESSION_NAME_CHARS: usize = 20;

/// Phases of a generation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    ComposingPrompt,
    Requesting,
    Persisting,
    Done,
    Errored,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TurnState::Idle => "idle",
            TurnState::ComposingPrompt => "composing_prompt",
            TurnState::Requesting => "requesting",
            TurnState::Persisting => "persisting",
            TurnState::Done => "done",
            TurnState::Errored => "errored",
        };
        f.write_str(label)
    }
}

/// Result of one generation turn
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TurnOutcome {
    /// The image was generated and persisted
    Generated {
        session_id: String,
        image: Image,
        enhanced_prompt: String,
        strategy: PromptStrategy,
        /// Number of prior requests used as context
        context_turns: usize,
    },
    /// Generation or persistence failed; only the request message was stored
    Failed { session_id: String, error: String },
}

/// Result of an analysis request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AnalysisOutcome {
    Success {
        analysis: String,
        timestamp: DateTime<Utc>,
    },
    Error {
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl AnalysisOutcome {
    fn error(message: impl Into<String>) -> Self {
        AnalysisOutcome::Error {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Everything needed to redraw a session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub session: Session,
    /// Oldest first
    pub messages: Vec<Message>,
    /// Newest first
    pub images: Vec<Image>,
}

/// Marks a session as having a generation outstanding until dropped
struct InFlightGuard {
    sessions: Arc<Mutex<HashSet<String>>>,
    session_id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.remove(&self.session_id);
        }
    }
}

/// Orchestrates sessions, prompt composition, generation and analysis
pub struct Studio {
    storage: Arc<SqliteStorage>,
    images: ImageStore,
    composer: PromptComposer,
    generator: Arc<dyn ImageGenerator>,
    analyzer: Option<Arc<dyn ImageAnalyzer>>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl Studio {
    /// Assemble a studio from its parts
    pub fn new(
        storage: Arc<SqliteStorage>,
        images: ImageStore,
        composer: PromptComposer,
        generator: Arc<dyn ImageGenerator>,
        analyzer: Option<Arc<dyn ImageAnalyzer>>,
    ) -> Self {
        Self {
            storage,
            images,
            composer,
            generator,
            analyzer,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Build a studio with the configured storage locations and HTTP clients
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened or the generation
    /// client cannot be created (for example, no API key)
    pub fn from_config(config: &Config) -> Result<Self> {
        let generator = create_generator(config)?;
        let refiner = create_refiner(config)?;
        let analyzer = create_analyzer(config)?;

        let storage = Arc::new(SqliteStorage::new_with_path(
            config.storage.resolve_db_path()?,
        )?);
        let images = ImageStore::new(config.storage.resolve_images_dir()?);
        let composer = PromptComposer::new(
            refiner,
            config.refinement.max_tokens,
            config.refinement.temperature,
        );

        tracing::info!(
            "Studio ready: db={}, images={}, refinement={}, analysis={}",
            storage.db_path().display(),
            images.root().display(),
            composer.has_refiner(),
            analyzer.is_some()
        );

        Ok(Self::new(storage, images, composer, generator, analyzer))
    }

    /// Underlying session store
    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    /// Create an empty session
    pub fn create_session(&self, name: &str) -> Result<Session> {
        self.storage.create_session(name)
    }

    /// All sessions, most recently updated first
    pub fn list_sessions(&self) -> Result<Vec<Session>> {
        self.storage.list_sessions()
    }

    /// Load a session with its messages and images
    ///
    /// `session_id` may be a full id or a unique prefix of one. Returns
    /// `None` for an unknown id.
    pub fn select_session(&self, session_id: &str) -> Result<Option<SessionSnapshot>> {
        let Some(session_id) = self.storage.resolve_session_id(session_id)? else {
            return Ok(None);
        };
        let Some(session) = self.storage.get_session(&session_id)? else {
            return Ok(None);
        };
        let messages = self.storage.list_messages(&session_id)?;
        let images = self.storage.list_images(&session_id)?;
        Ok(Some(SessionSnapshot {
            session,
            messages,
            images,
        }))
    }

    /// Delete a session, its records and its image files
    ///
    /// Returns false when the session did not exist.
    pub async fn delete_session(&self, session_id: &str) -> Result<bool> {
        let Some(session_id) = self.storage.resolve_session_id(session_id)? else {
            return Ok(false);
        };
        let removed = self.storage.delete_session(&session_id)?;
        let paths: Vec<_> = removed.into_iter().map(|image| image.path).collect();
        let files = self.images.remove_session(&session_id, &paths).await;
        tracing::debug!("Removed {} image files for session {}", files, session_id);
        Ok(true)
    }

    /// Run one generation turn
    ///
    /// With no `session_id` a new session is created and named after the
    /// request. The request is stored before generation starts, so a failed
    /// turn still leaves it in the history.
    ///
    /// # Errors
    ///
    /// Returns `EmptyRequest` for blank text, `GenerationInFlight` when the
    /// session already has a turn outstanding, and storage errors. Capability
    /// failures are reported as `TurnOutcome::Failed`.
    pub async fn submit_generation(
        &self,
        session_id: Option<&str>,
        request: &str,
        size: ImageSize,
        quality: ImageQuality,
    ) -> Result<TurnOutcome> {
        let request = request.trim();
        if request.is_empty() {
            return Err(InkforgeError::EmptyRequest.into());
        }

        let (session_id, _guard) = match session_id {
            Some(id) => {
                let id = self.storage.resolve_session_id(id)?.ok_or_else(|| {
                    InkforgeError::Storage(format!("session {} does not exist", id))
                })?;
                let guard = self.begin_turn(&id)?;
                (id, guard)
            }
            None => {
                let session = self.create_session(&session_name(request))?;
                let guard = self.begin_turn(&session.id)?;
                (session.id, guard)
            }
        };

        let mut state = TurnState::Idle;
        let history = conversation_history(&self.storage.list_messages(&session_id)?);
        self.storage.append_message(&session_id, request, None)?;

        transition(&session_id, &mut state, TurnState::ComposingPrompt);
        let composed = self.composer.compose(request, &history).await;
        tracing::info!(
            "Session {}: {} prompt using {} previous requests",
            session_id,
            composed.strategy,
            history.len()
        );

        transition(&session_id, &mut state, TurnState::Requesting);
        let bytes = match self.generator.generate(&composed.text, size, quality).await {
            Ok(bytes) => bytes,
            Err(e) => return Ok(self.fail(&session_id, &mut state, e)),
        };

        transition(&session_id, &mut state, TurnState::Persisting);
        let image = match self
            .persist_image(&session_id, request, &bytes, size, quality)
            .await
        {
            Ok(image) => image,
            Err(e) => return Ok(self.fail(&session_id, &mut state, e)),
        };

        transition(&session_id, &mut state, TurnState::Done);
        tracing::info!("Session {}: generated image {}", session_id, image.id);

        Ok(TurnOutcome::Generated {
            session_id,
            image,
            enhanced_prompt: composed.text,
            strategy: composed.strategy,
            context_turns: history.len(),
        })
    }

    /// Critique a previously generated image and store the result
    ///
    /// Unknown ids, a missing analysis capability and capability failures
    /// all produce `AnalysisOutcome::Error`; only storage failures are `Err`.
    pub async fn request_analysis(
        &self,
        session_id: &str,
        image_id: &str,
    ) -> Result<AnalysisOutcome> {
        let Some(session_id) = self.storage.resolve_session_id(session_id)? else {
            return Ok(AnalysisOutcome::error(format!(
                "Session not found: {}",
                session_id
            )));
        };
        let session_id = session_id.as_str();

        let image = match self.storage.get_image(image_id)? {
            Some(image) if image.session_id == session_id => image,
            Some(_) => {
                return Ok(AnalysisOutcome::error(format!(
                    "Image {} does not belong to session {}",
                    image_id, session_id
                )))
            }
            None => return Ok(AnalysisOutcome::error(format!("Image not found: {}", image_id))),
        };

        let Some(analyzer) = &self.analyzer else {
            return Ok(AnalysisOutcome::error(
                "Image analysis is not configured (set ANTHROPIC_API_KEY)",
            ));
        };

        let bytes = match self.images.read(&image.path).await {
            Ok(bytes) => bytes,
            Err(e) => return Ok(AnalysisOutcome::error(e.to_string())),
        };

        match analyzer.analyze(&bytes).await {
            Ok(text) => {
                let content = format!("{}\n\n{}", ANALYSIS_HEADER, text);
                self.storage.append_message(session_id, &content, None)?;
                tracing::info!("Session {}: analyzed image {}", session_id, image_id);
                Ok(AnalysisOutcome::Success {
                    analysis: text,
                    timestamp: Utc::now(),
                })
            }
            Err(e) => {
                tracing::error!("Analysis of image {} failed: {}", image_id, e);
                Ok(AnalysisOutcome::error(format!("Error analyzing tattoo: {}", e)))
            }
        }
    }

    /// Copy a generated image to `dest`
    ///
    /// Returns `None` when no image has the given id.
    pub async fn export_image(&self, image_id: &str, dest: &Path) -> Result<Option<PathBuf>> {
        let Some(image) = self.storage.get_image(image_id)? else {
            tracing::warn!("Export requested for unknown image {}", image_id);
            return Ok(None);
        };
        let target = self.images.export(&image.path, dest).await?;
        Ok(Some(target))
    }

    fn begin_turn(&self, session_id: &str) -> Result<InFlightGuard> {
        let mut sessions = self
            .in_flight
            .lock()
            .map_err(|_| InkforgeError::Storage("in-flight lock poisoned".to_string()))?;
        if !sessions.insert(session_id.to_string()) {
            return Err(InkforgeError::GenerationInFlight(session_id.to_string()).into());
        }
        Ok(InFlightGuard {
            sessions: Arc::clone(&self.in_flight),
            session_id: session_id.to_string(),
        })
    }

    async fn persist_image(
        &self,
        session_id: &str,
        request: &str,
        bytes: &[u8],
        size: ImageSize,
        quality: ImageQuality,
    ) -> Result<Image> {
        let image_id = Uuid::new_v4().to_string();
        let path = self.images.write(session_id, &image_id, bytes).await?;
        let image = Image {
            id: image_id,
            session_id: session_id.to_string(),
            prompt: request.to_string(),
            path,
            size,
            quality,
            created_at: now_utc(),
        };

        if let Err(e) = self.storage.save_image_with_label(&image, request) {
            if let Err(cleanup) = self.images.remove(&image.path).await {
                tracing::warn!("{}", cleanup);
            }
            return Err(e);
        }
        Ok(image)
    }

    fn fail(&self, session_id: &str, state: &mut TurnState, error: anyhow::Error) -> TurnOutcome {
        tracing::error!("Session {}: generation failed during {}: {}", session_id, state, error);
        transition(session_id, state, TurnState::Errored);
        transition(session_id, state, TurnState::Idle);
        TurnOutcome::Failed {
            session_id: session_id.to_string(),
            error: format!("Error generating tattoo: {}", error),
        }
    }
}

fn transition(session_id: &str, state: &mut TurnState, next: TurnState) {
    tracing::debug!("Session {}: {} -> {}", session_id, state, next);
    *state = next;
}

/// Name given to a session created implicitly by its first request
pub fn session_name(request: &str) -> String {
    let prefix: String = request.chars().take(SESSION_NAME_CHARS).collect();
    format!("Session {}...", prefix)
}
