use std::fs;

use anyhow::Result;

use super::FileStorage;
use crate::domain::models::Session;
use crate::domain::models::SessionStorage;

#[test]
fn it_starts_empty_without_a_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let storage = FileStorage::open(&dir.path().join("abc.yaml"), "abc")?;

    assert_eq!(storage.get("conversations")?, None);
    assert!(!dir.path().join("abc.yaml").exists());

    return Ok(());
}

#[test]
fn it_writes_a_session_file_on_set() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("sessions/abc.yaml");
    let storage = FileStorage::open(&path, "abc")?;

    storage.set("selectedModel", "llama3")?;

    let session: Session = serde_yaml::from_str(&fs::read_to_string(&path)?)?;
    assert_eq!(session.id, "abc");
    assert_eq!(session.version, env!("CARGO_PKG_VERSION"));
    assert!(chrono::DateTime::parse_from_rfc3339(&session.timestamp).is_ok());
    assert_eq!(
        session.entries.get("selectedModel"),
        Some(&"llama3".to_string())
    );

    return Ok(());
}

#[test]
fn it_reopens_previous_entries() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("abc.yaml");

    let storage = FileStorage::open(&path, "abc")?;
    storage.set("conversations", "[]")?;
    storage.set("activeConversationId", "\"c1\"")?;
    storage.remove("activeConversationId")?;

    let reopened = FileStorage::open(&path, "abc")?;
    assert_eq!(reopened.get("conversations")?, Some("[]".to_string()));
    assert_eq!(reopened.get("activeConversationId")?, None);

    return Ok(());
}

#[test]
fn it_clears_entries_on_disk() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("abc.yaml");

    let storage = FileStorage::open(&path, "abc")?;
    storage.set("selectedModel", "mistral")?;
    storage.clear()?;

    let reopened = FileStorage::open(&path, "abc")?;
    assert_eq!(reopened.get("selectedModel")?, None);

    return Ok(());
}

#[test]
fn it_starts_over_on_corrupt_files() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("abc.yaml");
    fs::write(&path, "entries: [not, a, map")?;

    let storage = FileStorage::open(&path, "abc")?;
    assert_eq!(storage.get("conversations")?, None);

    storage.set("selectedModel", "llama3")?;
    let reopened = FileStorage::open(&path, "abc")?;
    assert_eq!(reopened.get("selectedModel")?, Some("llama3".to_string()));

    return Ok(());
}
