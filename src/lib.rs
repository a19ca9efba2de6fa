//! Veil - a media player that can hide behind a document
//!
//! Veil plays a playlist through a small effect chain and can switch, on a
//! single key press, to a "cover" view showing an innocuous image or
//! document while playback pauses.
//!
//! # Architecture
//!
//! - `engine`: the playback graph, source → delay → gain → sink
//! - `cover`: the two-state cover machine and the asset it shows
//! - `track`: tracks, sources, masked titles and the playlist
//! - `session`: the per-session context, its events and the event loop
//! - `state`: the small record persisted across restarts

pub mod cli;
pub mod config;
pub mod cover;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod session;
pub mod state;
pub mod track;

pub use config::PlayerConfig;
pub use error::{Result, VeilError};
