use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};
use thiserror::Error;

/// Placeholder in `capture_command` replaced by the screenshot path.
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Startup problems that must stop the monitor before its first cycle.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no capture region configured; run `subwatch setup` first")]
    MissingRegion,
    #[error("capture region {0} has zero width or height")]
    EmptyRegion(Region),
    #[error("no capture command configured for this platform")]
    MissingCaptureCommand,
    #[error("capture command must contain the {{output}} placeholder")]
    MissingOutputPlaceholder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    pub tesseract_path: String,
    pub lang: String,
    pub psm: u32,
    pub oem: Option<u32>,
    pub preprocess: bool,
    pub scale: f32,
    pub threshold: Option<u8>,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            tesseract_path: "tesseract".into(),
            lang: "jpn".into(),
            psm: 6,
            oem: None,
            preprocess: true,
            scale: 2.0,
            threshold: Some(180),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderSettings {
    /// Prefix of every external key, `<namespace>:<name>`.
    pub namespace: String,
    pub title_prefix: String,
    pub title_suffix: String,
    /// Lead time of the popup before the event starts.
    pub reminder_minutes: u32,
    pub event_duration_minutes: u32,
    /// Countdown drift needed before an already synced reminder is rewritten.
    pub min_change_minutes: u32,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            namespace: "ff14-sub".into(),
            title_prefix: "潜水艦".into(),
            title_suffix: "帰還".into(),
            reminder_minutes: 10,
            event_duration_minutes: 10,
            min_change_minutes: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub region: Option<Region>,
    pub capture_interval_secs: u64,
    pub capture_timeout_secs: u64,
    pub capture_command: Vec<String>,
    pub ocr: OcrSettings,
    pub reminder: ReminderSettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            region: None,
            capture_interval_secs: 300,
            capture_timeout_secs: 60,
            capture_command: default_capture_command(),
            ocr: OcrSettings::default(),
            reminder: ReminderSettings::default(),
        }
    }
}

fn default_capture_command() -> Vec<String> {
    #[cfg(target_os = "macos")]
    {
        vec!["screencapture".into(), "-x".into(), OUTPUT_PLACEHOLDER.into()]
    }

    #[cfg(target_os = "linux")]
    {
        vec!["grim".into(), OUTPUT_PLACEHOLDER.into()]
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        Vec::new()
    }
}

impl AppSettings {
    /// Everything the monitor needs before it may start. Returns the region to capture.
    pub fn validate_for_monitoring(&self) -> Result<Region, ConfigError> {
        let region = self.region.ok_or(ConfigError::MissingRegion)?;
        if region.width == 0 || region.height == 0 {
            return Err(ConfigError::EmptyRegion(region));
        }
        if self.capture_command.is_empty() {
            return Err(ConfigError::MissingCaptureCommand);
        }
        if !self
            .capture_command
            .iter()
            .any(|arg| arg.contains(OUTPUT_PLACEHOLDER))
        {
            return Err(ConfigError::MissingOutputPlaceholder);
        }
        Ok(region)
    }
}

/// `config.json` under the data dir, cached behind a lock.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<AppSettings>,
}

impl SettingsStore {
    /// Loads the file, writing defaults first if it does not exist yet.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            read_settings(&path)?
        } else {
            let defaults = AppSettings::default();
            write_settings(&path, &defaults)?;
            defaults
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> AppSettings {
        self.read().clone()
    }

    pub fn update_region(&self, region: Region) -> Result<()> {
        let mut guard = self.write();
        let mut next = guard.clone();
        next.region = Some(region);
        write_settings(&self.path, &next)?;
        *guard = next;
        Ok(())
    }

    pub fn reload(&self) -> Result<()> {
        let data = read_settings(&self.path)?;
        *self.write() = data;
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, AppSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, AppSettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn read_settings(path: &Path) -> Result<AppSettings> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings from {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse settings in {}", path.display()))
}

fn write_settings(path: &Path, data: &AppSettings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create settings directory {}", parent.display()))?;
    }
    let serialized = serde_json::to_string_pretty(data)?;
    fs::write(path, serialized)
        .with_context(|| format!("Failed to write settings to {}", path.display()))
}
