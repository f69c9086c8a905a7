#[cfg(test)]
#[path = "file_test.rs"]
mod tests;

use std::collections::BTreeMap;
use std::fs;
use std::path;

use anyhow::Result;
use chrono::Local;
use chrono::SecondsFormat;
use parking_lot::Mutex;

use crate::domain::models::Session;
use crate::domain::models::SessionStorage;

/// Session entries kept in a single YAML file. Every change rewrites the file.
pub struct FileStorage {
    id: String,
    path: path::PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Opens the session file at `path`, starting empty if it doesn't exist
    /// yet or can't be read.
    pub fn open(path: &path::Path, id: &str) -> Result<FileStorage> {
        let mut entries = BTreeMap::new();
        if path.exists() {
            let payload = fs::read_to_string(path)?;
            match serde_yaml::from_str::<Session>(&payload) {
                Ok(session) => entries = session.entries,
                Err(err) => {
                    tracing::warn!(error = ?err, path = ?path, "Session file is corrupt, starting over");
                }
            }
        }

        return Ok(FileStorage {
            id: id.to_string(),
            path: path.to_path_buf(),
            entries: Mutex::new(entries),
        });
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let session = Session {
            id: self.id.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Local::now().to_rfc3339_opts(SecondsFormat::Secs, false),
            entries: entries.clone(),
        };

        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        fs::write(&self.path, serde_yaml::to_string(&session)?)?;
        return Ok(());
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        return Ok(self.entries.lock().get(key).cloned());
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock();
        if entries.get(key).map(|val| return val.as_str()) == Some(value) {
            return Ok(());
        }

        entries.insert(key.to_string(), value.to_string());
        return self.flush(&entries);
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_none() {
            return Ok(());
        }

        return self.flush(&entries);
    }

    fn clear(&self) -> Result<()> {
        let mut entries = self.entries.lock();
        entries.clear();
        return self.flush(&entries);
    }
}
