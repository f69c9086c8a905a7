#[cfg(test)]
#[path = "sessions_test.rs"]
mod tests;

use std::env;
use std::path;

use anyhow::bail;
use anyhow::Result;
use chrono::DateTime;
use tokio::fs;
use uuid::Uuid;

use crate::domain::models::Session;

/// Session files on disk, one YAML document per session id.
pub struct Sessions {
    pub cache_dir: path::PathBuf,
}

impl Default for Sessions {
    fn default() -> Sessions {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(env::temp_dir)
            .join("diagnosis-ai/sessions");

        return Sessions::new(cache_dir);
    }
}

impl Sessions {
    pub fn new(cache_dir: path::PathBuf) -> Sessions {
        return Sessions { cache_dir };
    }

    pub fn create_id() -> String {
        return Uuid::new_v4()
            .to_string()
            .split('-')
            .take(2)
            .collect::<Vec<&str>>()
            .join("-");
    }

    pub fn file_path(&self, id: &str) -> path::PathBuf {
        return self.cache_dir.join(format!("{id}.yaml"));
    }

    /// All readable sessions, oldest first. Files that fail to parse are
    /// skipped.
    pub async fn list(&self) -> Result<Vec<Session>> {
        let mut sessions: Vec<Session> = vec![];
        if !self.cache_dir.exists() {
            return Ok(sessions);
        }

        let mut dir = fs::read_dir(&self.cache_dir).await?;
        while let Some(file) = dir.next_entry().await? {
            if file.path().extension().and_then(|ext| return ext.to_str()) != Some("yaml") {
                continue;
            }

            let payload = fs::read_to_string(file.path()).await?;
            match serde_yaml::from_str::<Session>(&payload) {
                Ok(session) => sessions.push(session),
                Err(err) => {
                    tracing::warn!(error = ?err, path = ?file.path(), "Skipping unreadable session file");
                }
            }
        }

        sessions.sort_by_cached_key(|session| {
            return DateTime::parse_from_rfc3339(&session.timestamp).ok();
        });

        return Ok(sessions);
    }

    pub async fn load(&self, id: &str) -> Result<Session> {
        let file_path = self.file_path(id);
        if !file_path.exists() {
            bail!(format!("No session found for id {id}"));
        }

        let payload = fs::read_to_string(file_path).await?;
        let session: Session = serde_yaml::from_str(&payload)?;

        return Ok(session);
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let file_path = self.file_path(id);
        if !file_path.exists() {
            return Ok(());
        }

        fs::remove_file(file_path).await?;
        return Ok(());
    }

    pub async fn delete_all(&self) -> Result<()> {
        if !self.cache_dir.exists() {
            return Ok(());
        }

        fs::remove_dir_all(&self.cache_dir).await?;
        return Ok(());
    }
}
