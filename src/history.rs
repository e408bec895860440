//! Conversation history assembly
//!
//! History is the ordered list of free-text requests in a session. Messages
//! that label a generated image are skipped: their text repeats a request
//! rather than adding a new one. History is derived on every turn and never
//! stored.

use crate::storage::Message;

/// Collect the text of every message without an image reference, oldest first
///
/// `messages` must be the session's messages as they were *before* the
/// current request was appended.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use inkforge::history::conversation_history;
/// use inkforge::storage::Message;
///
/// let msg = |content: &str, image: Option<&str>| Message {
///     id: content.to_string(),
///     session_id: "s".to_string(),
///     content: content.to_string(),
///     image_id: image.map(str::to_string),
///     created_at: Utc::now(),
/// };
/// let history = conversation_history(&[msg("a", None), msg("b", Some("img1")), msg("c", None)]);
/// assert_eq!(history, vec!["a", "c"]);
/// ```
pub fn conversation_history(messages: &[Message]) -> Vec<String> {
    messages
        .iter()
        .filter(|m| !m.has_image())
        .map(|m| m.content.clone())
        .collect()
}
