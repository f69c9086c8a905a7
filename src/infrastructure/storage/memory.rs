#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;

use std::sync::Arc;

use anyhow::Result;
use dashmap::DashMap;

use crate::domain::models::SessionStorage;

/// Storage that lives as long as the process. Clones share entries.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<DashMap<String, String>>,
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        return Ok(self.entries.get(key).map(|val| return val.to_string()));
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        return Ok(());
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        return Ok(());
    }

    fn clear(&self) -> Result<()> {
        self.entries.clear();
        return Ok(());
    }
}
