//! Session store backed by SQLite
//!
//! Sessions own their messages and images; deleting a session cascades to
//! both through foreign keys. A single connection guarded by a mutex
//! serializes every read and write.

use crate::error::{InkforgeError, Result};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

pub mod types;
pub use types::{Image, ImageQuality, ImageSize, Message, Session};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS sessions (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS images (
        id TEXT PRIMARY KEY,
        session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
        prompt TEXT NOT NULL,
        path TEXT NOT NULL,
        size TEXT NOT NULL,
        quality TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS messages (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
        content TEXT NOT NULL,
        image_id TEXT REFERENCES images(id) ON DELETE CASCADE,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id, created_at, seq);
    CREATE INDEX IF NOT EXISTS idx_images_session ON images(session_id, created_at);
";

/// Converts rusqlite failures into storage errors with a short description.
trait StorageContext<T> {
    fn storage_context(self, what: &str) -> Result<T>;
}

impl<T> StorageContext<T> for rusqlite::Result<T> {
    fn storage_context(self, what: &str) -> Result<T> {
        self.map_err(|e| InkforgeError::Storage(format!("{}: {}", what, e)).into())
    }
}

/// Storage backend for sessions, messages and image metadata
pub struct SqliteStorage {
    db_path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open (or create) the database at `db_path`
    ///
    /// Parent directories are created as needed and the schema is applied.
    ///
    /// # Examples
    ///
    /// ```
    /// use inkforge::storage::SqliteStorage;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let storage = SqliteStorage::new_with_path(dir.path().join("chats.db")).unwrap();
    /// assert!(storage.list_sessions().unwrap().is_empty());
    /// ```
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                InkforgeError::Storage(format!(
                    "Failed to create parent directory for database: {}",
                    e
                ))
            })?;
        }

        let conn = Connection::open(&db_path).storage_context("Failed to open database")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .storage_context("Failed to enable foreign keys")?;
        conn.execute_batch(SCHEMA)
            .storage_context("Failed to create tables")?;

        tracing::debug!("Opened session store at {}", db_path.display());

        Ok(Self {
            db_path,
            conn: Mutex::new(conn),
        })
    }

    /// Path of the backing database file
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| InkforgeError::Storage("connection lock poisoned".to_string()).into())
    }

    /// Create a new, empty session
    pub fn create_session(&self, name: &str) -> Result<Session> {
        let now = now_utc();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sessions (id, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                session.id,
                session.name,
                format_ts(&session.created_at),
                format_ts(&session.updated_at)
            ],
        )
        .storage_context("Failed to insert session")?;

        tracing::info!("Created session {} ({})", session.id, session.name);
        Ok(session)
    }

    /// Look up a session by id
    pub fn get_session(&self, id: &str) -> Result<Option<Session>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, name, created_at, updated_at FROM sessions WHERE id = ?1",
            params![id],
            session_from_row,
        )
        .optional()
        .storage_context("Failed to query session")
    }

    /// Resolve a full session id from an id or a unique id prefix
    ///
    /// Listings show shortened ids, so any unambiguous prefix is accepted.
    /// Returns `None` when nothing matches.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the prefix matches several sessions
    pub fn resolve_session_id(&self, id_or_prefix: &str) -> Result<Option<String>> {
        let needle = id_or_prefix.trim();
        if needle.is_empty() {
            return Ok(None);
        }

        let conn = self.lock()?;
        let exact: Option<String> = conn
            .query_row(
                "SELECT id FROM sessions WHERE id = ?1",
                params![needle],
                |row| row.get(0),
            )
            .optional()
            .storage_context("Failed to query session")?;
        if exact.is_some() {
            return Ok(exact);
        }

        let mut stmt = conn
            .prepare("SELECT id FROM sessions WHERE id LIKE ?1 ESCAPE '\\' LIMIT 2")
            .storage_context("Failed to prepare statement")?;
        let matches = stmt
            .query_map(params![format!("{}%", escape_like(needle))], |row| {
                row.get::<_, String>(0)
            })
            .storage_context("Failed to query sessions")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .storage_context("Failed to read sessions")?;

        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.into_iter().next()),
            _ => Err(InkforgeError::Storage(format!(
                "session id prefix '{}' matches more than one session",
                needle
            ))
            .into()),
        }
    }

    /// List all sessions, most recently updated first
    pub fn list_sessions(&self) -> Result<Vec<Session>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, name, created_at, updated_at FROM sessions
                ORDER BY updated_at DESC, created_at DESC",
            )
            .storage_context("Failed to prepare statement")?;

        let rows = stmt
            .query_map([], session_from_row)
            .storage_context("Failed to query sessions")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .storage_context("Failed to read sessions")
    }

    /// List a session's messages in creation order
    ///
    /// An unknown session yields an empty list.
    pub fn list_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, session_id, content, image_id, created_at FROM messages
                WHERE session_id = ?1
                ORDER BY created_at ASC, seq ASC",
            )
            .storage_context("Failed to prepare statement")?;

        let rows = stmt
            .query_map(params![session_id], message_from_row)
            .storage_context("Failed to query messages")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .storage_context("Failed to read messages")
    }

    /// Append a message and bump the session's `updated_at`
    ///
    /// Both writes happen in one transaction. When `image_id` is given it
    /// must name an image owned by the same session.
    pub fn append_message(
        &self,
        session_id: &str,
        content: &str,
        image_id: Option<&str>,
    ) -> Result<Message> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .storage_context("Failed to start transaction")?;

        ensure_session(&tx, session_id)?;

        if let Some(image_id) = image_id {
            let owner: Option<String> = tx
                .query_row(
                    "SELECT session_id FROM images WHERE id = ?1",
                    params![image_id],
                    |row| row.get(0),
                )
                .optional()
                .storage_context("Failed to query image")?;
            if owner.as_deref() != Some(session_id) {
                return Err(InkforgeError::Storage(format!(
                    "image {} does not belong to session {}",
                    image_id, session_id
                ))
                .into());
            }
        }

        let message = insert_message(&tx, session_id, content, image_id)?;
        tx.commit().storage_context("Failed to commit transaction")?;

        Ok(message)
    }

    /// Persist metadata for a generated image
    pub fn save_image_metadata(&self, image: &Image) -> Result<()> {
        let conn = self.lock()?;
        insert_image(&conn, image)
    }

    /// Persist a generated image together with the message labelling it
    ///
    /// The image row, the label and the `updated_at` bump commit together;
    /// on error none of them are stored.
    pub fn save_image_with_label(&self, image: &Image, label: &str) -> Result<Message> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .storage_context("Failed to start transaction")?;

        ensure_session(&tx, &image.session_id)?;
        insert_image(&tx, image)?;
        let message = insert_message(&tx, &image.session_id, label, Some(&image.id))?;

        tx.commit().storage_context("Failed to commit transaction")?;
        Ok(message)
    }

    /// Look up an image by id
    pub fn get_image(&self, id: &str) -> Result<Option<Image>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, session_id, prompt, path, size, quality, created_at
            FROM images WHERE id = ?1",
            params![id],
            image_from_row,
        )
        .optional()
        .storage_context("Failed to query image")
    }

    /// List a session's images, newest first
    pub fn list_images(&self, session_id: &str) -> Result<Vec<Image>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, session_id, prompt, path, size, quality, created_at
                FROM images WHERE session_id = ?1
                ORDER BY created_at DESC, rowid DESC",
            )
            .storage_context("Failed to prepare statement")?;

        let rows = stmt
            .query_map(params![session_id], image_from_row)
            .storage_context("Failed to query images")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .storage_context("Failed to read images")
    }

    /// Delete a session together with its messages and images
    ///
    /// Returns the image records that were removed so the caller can clean
    /// up their bytes. Deleting an unknown session is a no-op.
    pub fn delete_session(&self, id: &str) -> Result<Vec<Image>> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .storage_context("Failed to start transaction")?;

        let images = {
            let mut stmt = tx
                .prepare(
                    "SELECT id, session_id, prompt, path, size, quality, created_at
                    FROM images WHERE session_id = ?1",
                )
                .storage_context("Failed to prepare statement")?;
            let rows = stmt
                .query_map(params![id], image_from_row)
                .storage_context("Failed to query images")?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .storage_context("Failed to read images")?
        };

        let deleted = tx
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])
            .storage_context("Failed to delete session")?;

        tx.commit().storage_context("Failed to commit transaction")?;

        if deleted > 0 {
            tracing::info!("Deleted session {} ({} images)", id, images.len());
        }
        Ok(images)
    }
}

/// Current time at the precision timestamps are stored with
///
/// Records built with this value compare equal after a round trip through
/// the database.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn ensure_session(conn: &Connection, session_id: &str) -> Result<()> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM sessions WHERE id = ?1",
            params![session_id],
            |_| Ok(()),
        )
        .optional()
        .storage_context("Failed to query session")?
        .is_some();
    if !exists {
        return Err(
            InkforgeError::Storage(format!("session {} does not exist", session_id)).into(),
        );
    }
    Ok(())
}

fn insert_image(conn: &Connection, image: &Image) -> Result<()> {
    conn.execute(
        "INSERT INTO images (id, session_id, prompt, path, size, quality, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            image.id,
            image.session_id,
            image.prompt,
            image.path.to_string_lossy(),
            image.size.as_str(),
            image.quality.as_str(),
            format_ts(&image.created_at)
        ],
    )
    .storage_context("Failed to insert image")?;
    Ok(())
}

/// Insert a message and bump the owning session's `updated_at`
fn insert_message(
    conn: &Connection,
    session_id: &str,
    content: &str,
    image_id: Option<&str>,
) -> Result<Message> {
    let message = Message {
        id: Uuid::new_v4().to_string(),
        session_id: session_id.to_string(),
        content: content.to_string(),
        image_id: image_id.map(str::to_string),
        created_at: now_utc(),
    };
    let created_at = format_ts(&message.created_at);

    conn.execute(
        "INSERT INTO messages (id, session_id, content, image_id, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            message.id,
            message.session_id,
            message.content,
            message.image_id,
            created_at
        ],
    )
    .storage_context("Failed to insert message")?;

    conn.execute(
        "UPDATE sessions SET updated_at = ?1 WHERE id = ?2",
        params![created_at, session_id],
    )
    .storage_context("Failed to update session timestamp")?;

    Ok(message)
}

fn parse_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = InkforgeError>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: parse_ts(row, 2)?,
        updated_at: parse_ts(row, 3)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        session_id: row.get(1)?,
        content: row.get(2)?,
        image_id: row.get(3)?,
        created_at: parse_ts(row, 4)?,
    })
}

fn image_from_row(row: &Row<'_>) -> rusqlite::Result<Image> {
    let path: String = row.get(3)?;
    Ok(Image {
        id: row.get(0)?,
        session_id: row.get(1)?,
        prompt: row.get(2)?,
        path: PathBuf::from(path),
        size: parse_column(row, 4)?,
        quality: parse_column(row, 5)?,
        created_at: parse_ts(row, 6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;
    use tempfile::tempdir;

    /// Helper: create a temporary storage instance backed by a temp directory.
    ///
    /// Returns both the `SqliteStorage` and the `TempDir` so the caller keeps
    /// ownership of the directory (preventing it from being removed).
    fn create_test_storage() -> (SqliteStorage, tempfile::TempDir) {
        let dir = tempdir().expect("failed to create tempdir");
        let db_path = dir.path().join("chats.db");
        let storage = SqliteStorage::new_with_path(db_path).expect("failed to create storage");
        (storage, dir)
    }

    fn test_image(session_id: &str, prompt: &str) -> Image {
        let id = Uuid::new_v4().to_string();
        Image {
            path: PathBuf::from(format!("/tmp/{}/{}.png", session_id, id)),
            id,
            session_id: session_id.to_string(),
            prompt: prompt.to_string(),
            size: ImageSize::Square,
            quality: ImageQuality::Standard,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_init_creates_tables() {
        let (storage, _dir) = create_test_storage();
        let conn = Connection::open(storage.db_path()).expect("open connection");
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table'
                AND name IN ('sessions', 'messages', 'images')",
                [],
                |r| r.get(0),
            )
            .expect("query row");
        assert_eq!(count, 3);
    }

    #[test]
    fn test_reopen_existing_database() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("chats.db");
        let id = {
            let storage = SqliteStorage::new_with_path(&db_path).unwrap();
            storage.create_session("persisted").unwrap().id
        };
        let storage = SqliteStorage::new_with_path(&db_path).unwrap();
        let session = storage.get_session(&id).unwrap().expect("session survives");
        assert_eq!(session.name, "persisted");
    }

    #[test]
    fn test_create_and_get_session() {
        let (storage, _dir) = create_test_storage();
        let session = storage.create_session("Koi sleeve").unwrap();
        assert_eq!(session.created_at, session.updated_at);

        let loaded = storage.get_session(&session.id).unwrap().unwrap();
        assert_eq!(loaded.name, "Koi sleeve");
        assert_eq!(loaded.id, session.id);
    }

    #[test]
    fn test_get_session_returns_none_for_missing_id() {
        let (storage, _dir) = create_test_storage();
        assert!(storage.get_session("non-existent-id").unwrap().is_none());
    }

    #[test]
    fn test_resolve_session_id_accepts_full_id_and_prefix() {
        let (storage, _dir) = create_test_storage();
        let session = storage.create_session("Koi sleeve").unwrap();

        assert_eq!(
            storage.resolve_session_id(&session.id).unwrap(),
            Some(session.id.clone())
        );
        assert_eq!(
            storage.resolve_session_id(&session.id[..8]).unwrap(),
            Some(session.id.clone())
        );
        assert!(storage.resolve_session_id("zzzzzzzz").unwrap().is_none());
        assert!(storage.resolve_session_id("  ").unwrap().is_none());
    }

    #[test]
    fn test_resolve_session_id_treats_wildcards_literally() {
        let (storage, _dir) = create_test_storage();
        storage.create_session("one").unwrap();
        assert!(storage.resolve_session_id("%").unwrap().is_none());
        assert!(storage.resolve_session_id("_").unwrap().is_none());
    }

    #[test]
    fn test_resolve_session_id_rejects_ambiguous_prefix() {
        let (storage, _dir) = create_test_storage();
        let conn = Connection::open(storage.db_path()).unwrap();
        for id in ["abc12345-0000", "abc12345-1111"] {
            conn.execute(
                "INSERT INTO sessions (id, name, created_at, updated_at)
                VALUES (?1, 'x', '2024-01-01T00:00:00.000000Z', '2024-01-01T00:00:00.000000Z')",
                params![id],
            )
            .unwrap();
        }

        let err = storage.resolve_session_id("abc12345").unwrap_err();
        assert!(err.to_string().contains("more than one session"));
        assert_eq!(
            storage.resolve_session_id("abc12345-1").unwrap().as_deref(),
            Some("abc12345-1111")
        );
    }

    #[test]
    fn test_save_image_with_label_commits_both() {
        let (storage, _dir) = create_test_storage();
        let session = storage.create_session("s").unwrap();
        let image = test_image(&session.id, "a koi");

        let label = storage.save_image_with_label(&image, "a koi").unwrap();
        assert_eq!(label.image_id.as_deref(), Some(image.id.as_str()));
        assert!(storage.get_image(&image.id).unwrap().is_some());

        let messages = storage.list_messages(&session.id).unwrap();
        assert_eq!(messages, vec![label.clone()]);
        let session = storage.get_session(&session.id).unwrap().unwrap();
        assert_eq!(session.updated_at, label.created_at);
    }

    #[test]
    fn test_save_image_with_label_rolls_back_on_failure() {
        let (storage, _dir) = create_test_storage();
        let session = storage.create_session("s").unwrap();

        // Reject labelled messages so the second insert of the transaction fails.
        let conn = Connection::open(storage.db_path()).unwrap();
        conn.execute_batch(
            "CREATE TRIGGER reject_labels BEFORE INSERT ON messages
            WHEN NEW.image_id IS NOT NULL
            BEGIN SELECT RAISE(ABORT, 'labels rejected'); END;",
        )
        .unwrap();

        let image = test_image(&session.id, "a koi");
        assert!(storage.save_image_with_label(&image, "a koi").is_err());
        assert!(storage.get_image(&image.id).unwrap().is_none());
        assert!(storage.list_images(&session.id).unwrap().is_empty());
        assert!(storage.list_messages(&session.id).unwrap().is_empty());
    }

    #[test]
    fn test_save_image_with_label_requires_session() {
        let (storage, _dir) = create_test_storage();
        let image = test_image("missing", "a koi");
        assert!(storage.save_image_with_label(&image, "a koi").is_err());
        assert!(storage.get_image(&image.id).unwrap().is_none());
    }

    #[test]
    fn test_list_sessions_ordered_by_updated_at() {
        let (storage, _dir) = create_test_storage();
        let first = storage.create_session("A").unwrap();
        sleep(Duration::from_millis(10));
        let second = storage.create_session("B").unwrap();

        let sessions = storage.list_sessions().unwrap();
        assert_eq!(sessions[0].id, second.id);
        assert_eq!(sessions[1].id, first.id);

        // Appending to the older session moves it to the top
        sleep(Duration::from_millis(10));
        storage.append_message(&first.id, "hello", None).unwrap();
        let sessions = storage.list_sessions().unwrap();
        assert_eq!(sessions[0].id, first.id);
    }

    #[test]
    fn test_append_message_bumps_updated_at() {
        let (storage, _dir) = create_test_storage();
        let session = storage.create_session("S").unwrap();
        sleep(Duration::from_millis(10));

        let message = storage.append_message(&session.id, "a dragon", None).unwrap();
        let loaded = storage.get_session(&session.id).unwrap().unwrap();
        assert!(loaded.updated_at > session.updated_at);
        assert_eq!(loaded.created_at, session.created_at);
        assert_eq!(loaded.updated_at, message.created_at);
    }

    #[test]
    fn test_append_message_to_missing_session_fails() {
        let (storage, _dir) = create_test_storage();
        let err = storage.append_message("missing", "x", None).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_list_messages_preserves_insertion_order() {
        let (storage, _dir) = create_test_storage();
        let session = storage.create_session("S").unwrap();
        for text in ["one", "two", "three", "four"] {
            storage.append_message(&session.id, text, None).unwrap();
        }
        let contents: Vec<String> = storage
            .list_messages(&session.id)
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["one", "two", "three", "four"]);
    }

    #[test]
    fn test_list_messages_unknown_session_is_empty() {
        let (storage, _dir) = create_test_storage();
        assert!(storage.list_messages("nope").unwrap().is_empty());
    }

    #[test]
    fn test_image_message_must_reference_same_session() {
        let (storage, _dir) = create_test_storage();
        let owner = storage.create_session("owner").unwrap();
        let other = storage.create_session("other").unwrap();
        let image = test_image(&owner.id, "rose");
        storage.save_image_metadata(&image).unwrap();

        assert!(storage
            .append_message(&owner.id, "rose", Some(&image.id))
            .is_ok());
        let err = storage
            .append_message(&other.id, "rose", Some(&image.id))
            .unwrap_err();
        assert!(err.to_string().contains("does not belong"));
        let err = storage
            .append_message(&owner.id, "rose", Some("no-such-image"))
            .unwrap_err();
        assert!(err.to_string().contains("does not belong"));
    }

    #[test]
    fn test_save_and_list_images_newest_first() {
        let (storage, _dir) = create_test_storage();
        let session = storage.create_session("S").unwrap();
        let older = test_image(&session.id, "first");
        storage.save_image_metadata(&older).unwrap();
        sleep(Duration::from_millis(10));
        let mut newer = test_image(&session.id, "second");
        newer.size = ImageSize::Landscape;
        newer.quality = ImageQuality::Hd;
        storage.save_image_metadata(&newer).unwrap();

        let images = storage.list_images(&session.id).unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].id, newer.id);
        assert_eq!(images[0].size, ImageSize::Landscape);
        assert_eq!(images[0].quality, ImageQuality::Hd);
        assert_eq!(images[1].prompt, "first");
        assert_eq!(storage.get_image(&older.id).unwrap().unwrap().path, older.path);
    }

    #[test]
    fn test_unrecognized_stored_size_is_rejected() {
        let (storage, _dir) = create_test_storage();
        let session = storage.create_session("S").unwrap();
        let image = test_image(&session.id, "p");
        storage.save_image_metadata(&image).unwrap();

        let conn = Connection::open(storage.db_path()).unwrap();
        conn.execute(
            "UPDATE images SET size = '256x256' WHERE id = ?1",
            params![image.id],
        )
        .unwrap();
        drop(conn);

        let err = storage.get_image(&image.id).unwrap_err();
        assert!(err.to_string().contains("Storage error"));
        assert!(storage.list_images(&session.id).is_err());
    }

    #[test]
    fn test_delete_session_cascades() {
        let (storage, _dir) = create_test_storage();
        let session = storage.create_session("S").unwrap();
        let keep = storage.create_session("keep").unwrap();
        let image = test_image(&session.id, "wolf");
        storage.save_image_metadata(&image).unwrap();
        storage.append_message(&session.id, "wolf", None).unwrap();
        storage
            .append_message(&session.id, "wolf", Some(&image.id))
            .unwrap();
        storage.append_message(&keep.id, "untouched", None).unwrap();

        let removed = storage.delete_session(&session.id).unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, image.id);

        assert!(storage.get_session(&session.id).unwrap().is_none());
        assert!(storage.list_messages(&session.id).unwrap().is_empty());
        assert!(storage.list_images(&session.id).unwrap().is_empty());
        assert!(storage.get_image(&image.id).unwrap().is_none());
        assert_eq!(storage.list_messages(&keep.id).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_session_is_idempotent() {
        let (storage, _dir) = create_test_storage();
        let session = storage.create_session("S").unwrap();
        storage.delete_session(&session.id).expect("first delete failed");
        let removed = storage
            .delete_session(&session.id)
            .expect("second delete failed");
        assert!(removed.is_empty());
    }

    #[test]
    fn test_concurrent_appends_do_not_lose_updates() {
        let (storage, _dir) = create_test_storage();
        let storage = std::sync::Arc::new(storage);
        let session = storage.create_session("S").unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let storage = storage.clone();
                let id = session.id.clone();
                std::thread::spawn(move || {
                    storage
                        .append_message(&id, &format!("msg {}", i), None)
                        .unwrap()
                })
            })
            .collect();
        let messages: Vec<Message> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let latest = messages.iter().map(|m| m.created_at).max().unwrap();
        let loaded = storage.get_session(&session.id).unwrap().unwrap();
        assert_eq!(storage.list_messages(&session.id).unwrap().len(), 8);
        assert_eq!(loaded.updated_at, latest);
    }
}
