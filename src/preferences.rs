use crate::link::types::{LinkError, LinkResult};
use crate::link::DeviceAddress;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "ecg-link";
const PREFERENCES_FILE: &str = "preferences.json";

/// Values remembered between sessions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub last_address: Option<String>,
}

/// Get the application configuration directory
pub fn get_app_config_dir() -> LinkResult<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| LinkError::Config("Could not find config directory".to_string()))?;

    let app_config_dir = config_dir.join(APP_DIR);
    fs::create_dir_all(&app_config_dir)?;

    Ok(app_config_dir)
}

/// JSON-backed store for `Preferences`
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    /// Store in the platform config directory
    pub fn open_default() -> LinkResult<Self> {
        Ok(Self::at(get_app_config_dir()?.join(PREFERENCES_FILE)))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read stored preferences; a missing or corrupt file yields defaults
    pub fn load(&self) -> Preferences {
        match fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                log::warn!("Ignoring unreadable preferences {}: {}", self.path.display(), e);
                Preferences::default()
            }),
            Err(_) => Preferences::default(),
        }
    }

    pub fn save(&self, preferences: &Preferences) -> LinkResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(preferences)?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    /// Last device address the user connected to
    pub fn last_address(&self) -> Option<String> {
        self.load().last_address
    }

    pub fn remember_address(&self, address: &DeviceAddress) -> LinkResult<()> {
        let mut preferences = self.load();
        preferences.last_address = Some(address.to_string());
        self.save(&preferences)
    }
}
