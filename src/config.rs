//! Player configuration
//!
//! Every field has a default, so an empty JSON object (or no file at all)
//! is a valid configuration. CLI flags override what is loaded here.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::cover::{Key, TriggerKey};
use crate::dsp::DEFAULT_MAX_DELAY_SECS;
use crate::engine::OUTPUT_SAMPLE_RATE;
use crate::error::Result;

/// Default number of frames rendered per clock tick
pub const DEFAULT_BLOCK_FRAMES: usize = 512;

/// Session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Frames rendered per tick
    pub block_frames: usize,
    /// Delay time at effect intensity 1.0, in seconds
    pub max_delay_secs: f32,
    /// Cover trigger selected at startup
    pub default_trigger: TriggerKey,
    /// Key that always leaves the cover
    pub universal_escape: Key,
    /// Where `state.json` lives; None disables persistence
    pub state_dir: Option<PathBuf>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            sample_rate: OUTPUT_SAMPLE_RATE,
            block_frames: DEFAULT_BLOCK_FRAMES,
            max_delay_secs: DEFAULT_MAX_DELAY_SECS,
            default_trigger: TriggerKey::Escape,
            universal_escape: Key::Backquote,
            state_dir: None,
        }
    }
}

impl PlayerConfig {
    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: PlayerConfig = serde_json::from_str(&content)?;
        debug!("[CONFIG] Loaded {}", path.display());
        Ok(config)
    }

    /// Load from `path` if given, otherwise use defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Default state directory: `$XDG_STATE_HOME/veil` or `~/.local/state/veil`
    pub fn default_state_dir() -> Option<PathBuf> {
        if let Some(dir) = std::env::var_os("XDG_STATE_HOME") {
            return Some(PathBuf::from(dir).join("veil"));
        }
        std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local").join("state").join("veil"))
    }
}
