//! State Management Module
//!
//! Persistence of the small record that survives restarts.

pub mod settings;

pub use settings::{
    detect_theme, detect_theme_from_env, PersistedState, SettingsStore, Theme, STATE_FILE,
    STATE_VERSION,
};
