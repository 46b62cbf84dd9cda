//! Storage layer for persistent settings (JSON file in the data directory)

use crate::error::TransferError;
use resumer_types::Settings;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

const SETTINGS_FILE: &str = "settings.json";

/// Settings file manager
#[derive(Clone, Debug)]
pub struct SettingsStore {
    /// Data directory
    data_dir: PathBuf,
}

impl SettingsStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn path(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE)
    }

    /// Load settings, falling back to defaults when no file exists yet
    pub async fn load(&self) -> Result<Settings, TransferError> {
        let path = self.path();

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings at {:?}, using defaults", path);
                return Ok(Settings::default());
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&content)
            .map_err(|e| TransferError::Settings(format!("{}: {}", path.display(), e)))
    }

    /// Save settings, creating the data directory if needed
    pub async fn save(&self, settings: &Settings) -> Result<(), TransferError> {
        fs::create_dir_all(&self.data_dir).await?;

        let content = serde_json::to_string_pretty(settings)
            .map_err(|e| TransferError::Settings(e.to_string()))?;
        fs::write(self.path(), content).await?;

        Ok(())
    }

    /// Delete the settings file so defaults apply again
    pub async fn reset(&self) -> Result<(), TransferError> {
        match fs::remove_file(self.path()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
