pub mod file;
pub mod memory;

use anyhow::Result;

use crate::domain::models::StorageBox;
use crate::domain::models::StorageName;
use crate::domain::services::Sessions;

/// File storage writes outlive the process; only `sessions delete` removes
/// them. Memory storage is gone when the process exits.
pub struct StorageManager {}

impl StorageManager {
    pub fn get(name: StorageName, session_id: &str) -> Result<StorageBox> {
        if name == StorageName::Memory {
            return Ok(Box::<memory::MemoryStorage>::default());
        }

        let sessions = Sessions::default();
        return Ok(Box::new(file::FileStorage::open(
            &sessions.file_path(session_id),
            session_id,
        )?));
    }
}
