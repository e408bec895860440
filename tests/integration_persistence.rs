//! Integration tests for the session store
//!
//! Covers ordering, history assembly from stored messages, cascade delete,
//! and reopening a database from disk.

use inkforge::history::conversation_history;
use inkforge::storage::{now_utc, Image, ImageQuality, ImageSize, SqliteStorage};
use std::path::PathBuf;

mod common;

fn image_for(session_id: &str, id: &str) -> Image {
    Image {
        id: id.to_string(),
        session_id: session_id.to_string(),
        prompt: "a compass rose".to_string(),
        path: PathBuf::from(format!("/tmp/{}.png", id)),
        size: ImageSize::Portrait,
        quality: ImageQuality::Hd,
        created_at: now_utc(),
    }
}

#[test]
fn test_history_skips_image_labels() {
    let (storage, _tmp) = common::create_temp_storage();
    let session = storage.create_session("compass").unwrap();

    storage.append_message(&session.id, "a", None).unwrap();
    storage
        .save_image_metadata(&image_for(&session.id, "img1"))
        .unwrap();
    storage
        .append_message(&session.id, "b", Some("img1"))
        .unwrap();
    storage.append_message(&session.id, "c", None).unwrap();

    let messages = storage.list_messages(&session.id).unwrap();
    assert_eq!(
        messages.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(),
        vec!["a", "b", "c"]
    );
    assert_eq!(conversation_history(&messages), vec!["a", "c"]);
}

#[test]
fn test_sessions_ordered_by_last_update() {
    let (storage, _tmp) = common::create_temp_storage();
    let older = storage.create_session("older").unwrap();
    let newer = storage.create_session("newer").unwrap();

    std::thread::sleep(std::time::Duration::from_millis(5));
    storage.append_message(&older.id, "bump", None).unwrap();

    let sessions = storage.list_sessions().unwrap();
    assert_eq!(sessions[0].id, older.id);
    assert_eq!(sessions[1].id, newer.id);
    assert!(sessions[0].updated_at > older.updated_at);
}

#[test]
fn test_delete_session_cascades() {
    let (storage, _tmp) = common::create_temp_storage();
    let keep = storage.create_session("keep").unwrap();
    let doomed = storage.create_session("doomed").unwrap();

    for session in [&keep, &doomed] {
        let image_id = format!("img-{}", session.name);
        storage
            .save_image_metadata(&image_for(&session.id, &image_id))
            .unwrap();
        storage
            .append_message(&session.id, "request", None)
            .unwrap();
        storage
            .append_message(&session.id, "request", Some(&image_id))
            .unwrap();
    }

    let removed = storage.delete_session(&doomed.id).unwrap();
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].id, "img-doomed");

    assert!(storage.get_session(&doomed.id).unwrap().is_none());
    assert!(storage.list_messages(&doomed.id).unwrap().is_empty());
    assert!(storage.list_images(&doomed.id).unwrap().is_empty());

    assert_eq!(storage.list_messages(&keep.id).unwrap().len(), 2);
    assert_eq!(storage.list_images(&keep.id).unwrap().len(), 1);
}

#[test]
fn test_records_survive_reopen() {
    let tmp = tempfile::TempDir::new().unwrap();
    let db_path = tmp.path().join("nested").join("chats.db");

    let session_id = {
        let storage = SqliteStorage::new_with_path(&db_path).unwrap();
        let session = storage.create_session("persisted").unwrap();
        storage
            .save_image_metadata(&image_for(&session.id, "img-1"))
            .unwrap();
        storage
            .append_message(&session.id, "a compass rose", Some("img-1"))
            .unwrap();
        session.id
    };

    let storage = SqliteStorage::new_with_path(&db_path).unwrap();
    let image = storage.get_image("img-1").unwrap().unwrap();
    assert_eq!(image.session_id, session_id);
    assert_eq!(image.size, ImageSize::Portrait);
    assert_eq!(image.quality, ImageQuality::Hd);
    assert_eq!(
        storage.list_messages(&session_id).unwrap()[0]
            .image_id
            .as_deref(),
        Some("img-1")
    );
}
