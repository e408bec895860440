use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use inkforge::storage::SqliteStorage;

#[allow(dead_code)]
pub fn create_temp_storage() -> (SqliteStorage, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let db_path = tmp.path().join("chats.db");
    let storage =
        SqliteStorage::new_with_path(db_path).expect("failed to create sqlite storage with path");
    (storage, tmp)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Configuration pointing both API bases at a mock server and storage at `dir`
#[allow(dead_code)]
pub fn mock_config_yaml(base: &str, dir: &TempDir, refinement_enabled: bool) -> String {
    format!(
        "storage:\n  db_path: {db}\n  images_dir: {images}\n\
generation:\n  api_key: sk-test\n  api_base: {base}\n  timeout_seconds: 5\n\
refinement:\n  enabled: {refine}\n  timeout_seconds: 5\n\
analysis:\n  api_key: ak-test\n  api_base: {base}\n  timeout_seconds: 5\n",
        db = dir.path().join("chats.db").display(),
        images = dir.path().join("images").display(),
        base = base,
        refine = refinement_enabled,
    )
}
