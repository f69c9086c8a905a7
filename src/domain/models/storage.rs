#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;

use anyhow::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::EnumVariantNames, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum StorageName {
    File,
    Memory,
}

impl StorageName {
    pub fn parse(text: &str) -> Option<StorageName> {
        match text {
            "file" => return Some(StorageName::File),
            "memory" => return Some(StorageName::Memory),
            _ => return None,
        }
    }
}

/// Keyed string storage scoped to a single chat session.
pub trait SessionStorage {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    /// Drops every entry of the session.
    fn clear(&self) -> Result<()>;
}

pub type StorageBox = Box<dyn SessionStorage + Send + Sync>;
