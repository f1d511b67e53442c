//! Key-value settings persistence shared across runs.
//!
//! The pipeline is stateless between runs except for two slots it keeps here:
//! the last successful run date and the rolling ticket-error log. The store is
//! injected into the pipeline by the caller; nothing in the core reaches for
//! a global.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use hubwatch_common::error::{HubwatchError, HubwatchResult};

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, key: &str) -> HubwatchResult<Option<String>>;
    async fn put(&self, key: &str, value: &str) -> HubwatchResult<()>;
    async fn remove(&self, key: &str) -> HubwatchResult<()>;
}

/// Settings persisted as a single JSON object file. Every operation is a
/// read-modify-write of the whole file; the file is small (a handful of keys).
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    async fn load(&self) -> HubwatchResult<HashMap<String, String>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => {
                return Err(HubwatchError::Internal(format!(
                    "cannot read settings file {}: {e}",
                    self.path.display()
                )))
            }
        };
        serde_json::from_str(&raw).map_err(|e| {
            HubwatchError::Internal(format!(
                "corrupt settings file {}: {e}",
                self.path.display()
            ))
        })
    }

    async fn save(&self, settings: &HashMap<String, String>) -> HubwatchResult<()> {
        let raw = serde_json::to_string_pretty(settings)
            .map_err(|e| HubwatchError::Internal(format!("cannot serialize settings: {e}")))?;
        tokio::fs::write(&self.path, raw).await.map_err(|e| {
            HubwatchError::Internal(format!(
                "cannot write settings file {}: {e}",
                self.path.display()
            ))
        })
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn get(&self, key: &str) -> HubwatchResult<Option<String>> {
        Ok(self.load().await?.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> HubwatchResult<()> {
        let mut settings = self.load().await?;
        settings.insert(key.to_string(), value.to_string());
        self.save(&settings).await
    }

    async fn remove(&self, key: &str) -> HubwatchResult<()> {
        let mut settings = self.load().await?;
        settings.remove(key);
        self.save(&settings).await
    }
}

/// In-memory store for tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySettingsStore {
    inner: Arc<Mutex<HashMap<String, String>>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get(&self, key: &str) -> HubwatchResult<Option<String>> {
        Ok(self.inner.lock().expect("settings lock").get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> HubwatchResult<()> {
        self.inner
            .lock()
            .expect("settings lock")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> HubwatchResult<()> {
        self.inner.lock().expect("settings lock").remove(key);
        Ok(())
    }
}
