use crate::error::InkforgeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// A named, timestamped design conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier for the session
    pub id: String,
    /// Display name
    pub name: String,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// When a message was last appended
    pub updated_at: DateTime<Utc>,
}

/// A single turn in a session
///
/// Messages without an image reference are free-text user requests;
/// messages with one label a generated image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier for the message
    pub id: String,
    /// Owning session
    pub session_id: String,
    /// Text content
    pub content: String,
    /// Generated image this message labels, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Returns true when the message labels a generated image
    pub fn has_image(&self) -> bool {
        self.image_id.is_some()
    }
}

/// Metadata for a generated image artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    /// Unique identifier for the image
    pub id: String,
    /// Owning session
    pub session_id: String,
    /// The request text the user typed (not the enhanced prompt)
    pub prompt: String,
    /// Location of the image bytes
    pub path: PathBuf,
    /// Requested pixel dimensions
    pub size: ImageSize,
    /// Requested quality tier
    pub quality: ImageQuality,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Pixel dimensions accepted by the generation endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ImageSize {
    /// 1024x1024
    #[default]
    #[serde(rename = "1024x1024")]
    Square,
    /// 1024x1792
    #[serde(rename = "1024x1792")]
    Portrait,
    /// 1792x1024
    #[serde(rename = "1792x1024")]
    Landscape,
}

impl ImageSize {
    /// All supported sizes, in presentation order
    pub const ALL: [ImageSize; 3] = [Self::Square, Self::Portrait, Self::Landscape];

    /// Wire and storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Square => "1024x1024",
            Self::Portrait => "1024x1792",
            Self::Landscape => "1792x1024",
        }
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageSize {
    type Err = InkforgeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|size| size.as_str() == s.trim())
            .ok_or_else(|| InkforgeError::Storage(format!("unrecognized image size '{}'", s)))
    }
}

/// Quality tier accepted by the generation endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageQuality {
    /// Standard quality
    #[default]
    Standard,
    /// High detail
    Hd,
}

impl ImageQuality {
    /// Wire and storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Hd => "hd",
        }
    }
}

impl fmt::Display for ImageQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageQuality {
    type Err = InkforgeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "hd" | "high" => Ok(Self::Hd),
            _ => Err(InkforgeError::Storage(format!(
                "unrecognized image quality '{}'",
                s
            ))),
        }
    }
}
