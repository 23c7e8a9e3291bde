//! Settings collaborator.
//!
//! The catalog only needs one string key (the default video pointer), but the
//! store is a plain string map so other settings can live alongside it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};

/// Settings key holding the default video id
pub const DEFAULT_VIDEO_KEY: &str = "DefaultVideoId";

/// Key/value settings persistence owned outside the catalog
pub trait SettingsStore: Send + Sync {
    /// Read a value; `None` if absent
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value and persist it
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// In-process settings, never persisted
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("settings lock poisoned"))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Flat JSON object on disk, written through on every change
#[derive(Debug)]
pub struct JsonFileSettings {
    path: PathBuf,
    values: Mutex<HashMap<String, String>>,
}

impl JsonFileSettings {
    /// Load settings from `path` (missing file = empty settings)
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let values = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings: {}", path.display()))?;
            if content.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse settings: {}", path.display()))?
            }
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    /// Location of the settings file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, values: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(values)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write settings: {}", self.path.display()))
    }
}

impl SettingsStore for JsonFileSettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("settings lock poisoned"))?;

        // Memory only changes once the file is written
        let mut updated = values.clone();
        updated.insert(key.to_string(), value.to_string());
        self.save(&updated)?;
        *values = updated;
        Ok(())
    }
}
