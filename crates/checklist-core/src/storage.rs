use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info};

pub const DEFAULT_STORAGE_KEY: &str = "advanced_todo_tasks_v1";

/// A durable string slot store. Every write replaces the whole value.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// Slot key for a task list, optionally scoped to one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKey {
    base: String,
    namespace: Option<String>,
}

impl StorageKey {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            namespace: None,
        }
    }

    pub fn with_namespace(mut self, namespace: Option<&str>) -> Self {
        self.namespace = namespace
            .map(str::trim)
            .filter(|ns| !ns.is_empty())
            .map(str::to_string);
        self
    }

    pub fn as_key(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}:{}", self.base, ns),
            None => self.base.clone(),
        }
    }
}

impl Default for StorageKey {
    fn default() -> Self {
        Self::new(DEFAULT_STORAGE_KEY)
    }
}

#[derive(Debug)]
pub struct FileStorage {
    pub data_dir: PathBuf,
}

impl FileStorage {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        info!(data_dir = %data_dir.display(), "opened file storage");
        Ok(Self { data_dir })
    }

    pub fn slot_path(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", file_stem_for(key)))
    }
}

impl KeyValueStore for FileStorage {
    #[tracing::instrument(skip(self))]
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.slot_path(key);
        if !path.exists() {
            debug!(file = %path.display(), "slot file missing");
            return Ok(None);
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        debug!(file = %path.display(), bytes = raw.len(), "read slot");
        Ok(Some(raw))
    }

    #[tracing::instrument(skip(self, value))]
    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let path = self.slot_path(key);
        debug!(file = %path.display(), bytes = value.len(), "writing slot atomically");

        let mut temp = NamedTempFile::new_in(&self.data_dir)
            .with_context(|| format!("failed to create temp file in {}", self.data_dir.display()))?;
        temp.write_all(value.as_bytes())?;
        temp.flush()?;

        temp.persist(&path)
            .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    slots: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slot(mut self, key: &str, value: &str) -> Self {
        self.slots.insert(key.to_string(), value.to_string());
        self
    }
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.slots.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        self.slots.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for &mut S {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        (**self).set(key, value)
    }
}

// Keys may carry a user name; keep the file name portable.
fn file_stem_for(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
