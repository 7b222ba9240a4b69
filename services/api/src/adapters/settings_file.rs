//! services/api/src/adapters/settings_file.rs
//!
//! This module contains the settings storage adapter, which is the concrete
//! implementation of the `SettingsStore` port from the `core` crate. Settings live
//! in a flat JSON object of string keys, the same two keys a browser build keeps
//! in local storage.

use async_trait::async_trait;
use mailer_core::domain::WorkerConfig;
use mailer_core::ports::{PortError, PortResult, SettingsStore};
use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const ENDPOINT_URL_KEY: &str = "cf_worker_url";
pub const AUTH_TOKEN_KEY: &str = "cf_worker_token";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A settings store backed by a single JSON file.
#[derive(Clone, Debug)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    /// Creates a new `FileSettingsStore`. The file does not need to exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every key currently in the file. A missing file is an empty object.
    async fn read_entries(&self) -> PortResult<Map<String, Value>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(PortError::Storage(e.to_string())),
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(entries)) => Ok(entries),
            Ok(_) | Err(_) => {
                warn!(path = %self.path.display(), "Settings file is not a JSON object; ignoring it.");
                Ok(Map::new())
            }
        }
    }
}

fn string_entry(entries: &Map<String, Value>, key: &str) -> String {
    entries
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

//=========================================================================================
// `SettingsStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn load(&self) -> PortResult<WorkerConfig> {
        let entries = self.read_entries().await?;
        Ok(WorkerConfig {
            endpoint_url: string_entry(&entries, ENDPOINT_URL_KEY),
            auth_token: string_entry(&entries, AUTH_TOKEN_KEY),
        })
    }

    async fn save(&self, config: &WorkerConfig) -> PortResult<()> {
        // Keys written by anything else are carried over untouched.
        let mut entries = self.read_entries().await?;
        entries.insert(
            ENDPOINT_URL_KEY.to_string(),
            Value::String(config.endpoint_url.clone()),
        );
        entries.insert(
            AUTH_TOKEN_KEY.to_string(),
            Value::String(config.auth_token.clone()),
        );

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PortError::Storage(e.to_string()))?;
        }

        let json = serde_json::to_string_pretty(&Value::Object(entries))
            .map_err(|e| PortError::Storage(e.to_string()))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| PortError::Storage(e.to_string()))?;

        info!(path = %self.path.display(), "Settings saved.");
        Ok(())
    }
}
