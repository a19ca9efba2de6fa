//! Persisted player state
//!
//! A small JSON record (`state.json`) that survives restarts: the theme and
//! the playlist labels. Audio content is never written to disk.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// File name of the persisted record inside the state directory
pub const STATE_FILE: &str = "state.json";

/// Current version of the persisted record
pub const STATE_VERSION: u32 = 1;

// ============================================================================
// Theme
// ============================================================================

/// Colour theme of the player UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Theme {
    #[default]
    #[serde(rename = "theme-light")]
    Light,
    #[serde(rename = "theme-dark")]
    Dark,
}

impl Theme {
    pub fn id(self) -> &'static str {
        match self {
            Theme::Light => "theme-light",
            Theme::Dark => "theme-dark",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "theme-light" | "light" => Ok(Theme::Light),
            "theme-dark" | "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme '{}'", other)),
        }
    }
}

/// Pick a theme from the environment when nothing was persisted
///
/// Checks `VEIL_THEME`, then a `GTK_THEME` mentioning "dark", then the
/// background index of `COLORFGBG` (0-6 and 8 are dark). Defaults to light.
pub fn detect_theme<F>(env: F) -> Theme
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(theme) = env("VEIL_THEME").and_then(|v| v.parse().ok()) {
        return theme;
    }

    if env("GTK_THEME").is_some_and(|v| v.to_ascii_lowercase().contains("dark")) {
        return Theme::Dark;
    }

    if let Some(colors) = env("COLORFGBG") {
        let background = colors.rsplit(';').next().and_then(|bg| bg.trim().parse::<u8>().ok());
        if let Some(bg) = background {
            return if bg <= 6 || bg == 8 { Theme::Dark } else { Theme::Light };
        }
    }

    Theme::Light
}

/// `detect_theme` over the process environment
pub fn detect_theme_from_env() -> Theme {
    detect_theme(|name| std::env::var(name).ok())
}

// ============================================================================
// Persisted State
// ============================================================================

/// What survives a restart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub theme: Theme,
    /// Display labels only, never content
    #[serde(default)]
    pub playlist_labels: Vec<String>,
    pub saved_at: DateTime<Utc>,
}

fn default_version() -> u32 {
    STATE_VERSION
}

impl PersistedState {
    pub fn new(theme: Theme, playlist_labels: Vec<String>) -> Self {
        Self {
            version: STATE_VERSION,
            theme,
            playlist_labels,
            saved_at: Utc::now(),
        }
    }
}

// ============================================================================
// Store
// ============================================================================

/// Reads and writes `state.json` in one directory
#[derive(Debug, Clone)]
pub struct SettingsStore {
    dir: PathBuf,
}

impl SettingsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    /// Load the record; `Ok(None)` when nothing has been saved yet
    pub fn load(&self) -> Result<Option<PersistedState>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        let state: PersistedState = serde_json::from_str(&content)?;
        debug!(
            "[STATE] Loaded {} labels, theme {} from {}",
            state.playlist_labels.len(),
            state.theme,
            path.display()
        );
        Ok(Some(state))
    }

    /// Write the record, creating the directory if needed
    ///
    /// Writes to a temporary file first and renames it over the old record.
    pub fn save(&self, state: &PersistedState) -> Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
        }

        let path = self.path();
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(state)?;
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &path)?;
        debug!("[STATE] Saved {}", path.display());
        Ok(())
    }

    /// Remove the record; a missing record is not an error
    pub fn reset(&self) -> Result<bool> {
        let path = self.path();
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        info!("[STATE] Removed {}", path.display());
        Ok(true)
    }
}
