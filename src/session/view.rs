//! Screen projection
//!
//! What the host draws is a pure function of the session. Exactly one of
//! the two regions exists at any time, so both can never be visible.

use serde::Serialize;

use crate::cover::{DisplayHandle, TriggerKey};
use crate::state::Theme;

/// The visible region
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "screen", rename_all = "lowercase")]
pub enum Screen {
    Player(PlayerView),
    Cover(CoverView),
}

impl Screen {
    pub fn is_cover(&self) -> bool {
        matches!(self, Screen::Cover(_))
    }
}

/// One playlist row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaylistRow {
    pub index: usize,
    pub label: String,
    /// Row of the connected track (highlighted)
    pub active: bool,
}

/// The player region
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerView {
    pub theme: Theme,
    pub playlist: Vec<PlaylistRow>,
    pub now_playing: Option<String>,
    pub transport: String,
    pub position_secs: f64,
    pub volume: String,
    pub speed: String,
    pub effect: String,
    pub loop_enabled: bool,
    pub trigger: TriggerKey,
    pub notice: Option<String>,
}

impl PlayerView {
    /// Slider label, e.g. `0.8` -> `"80%"`
    pub fn percent(value: f32) -> String {
        format!("{}%", (value * 100.0).round() as i64)
    }
}

/// The cover region
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverView {
    pub display: DisplayHandle,
}
