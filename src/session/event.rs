//! Events and commands
//!
//! Everything that can happen to a session arrives as an `Event`. Work that
//! would block (reading and decoding a blob, writing the state file) leaves the
//! dispatcher as a `Command` and comes back later as another event.

use std::sync::Arc;

use crate::cover::{KeyEvent, TriggerKey};
use crate::state::{PersistedState, Theme};
use crate::engine::StreamHandle;
use crate::track::BlobSource;

/// A control change from the player UI
#[derive(Debug, Clone, PartialEq)]
pub enum ParamChange {
    Volume(f32),
    PlaybackRate(f32),
    EffectIntensity(f32),
    Loop(bool),
    Trigger(TriggerKey),
    Theme(Theme),
}

/// Transport buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCommand {
    Pause,
    Resume,
    /// Resume when paused, pause when playing
    Toggle,
    /// Jump to a random other track
    Shuffle,
}

/// Input to `Session::dispatch`
#[derive(Debug, Clone)]
pub enum Event {
    /// Raw keyboard event
    KeyPressed(KeyEvent),
    /// New playlist selection, replacing the old one
    FilesSelected(Vec<BlobSource>),
    /// Click on a playlist row
    TrackSelected(usize),
    /// A track was read and decoded
    TrackLoaded(StreamHandle),
    /// A track read or decode failed
    TrackFailed { index: usize, reason: String },
    /// A cover asset was picked
    AssetSelected(BlobSource),
    /// A cover asset read finished
    AssetLoaded { mime: String, data: Arc<[u8]> },
    /// A cover asset read failed
    ReadFailed { what: String, reason: String },
    ParamChanged(ParamChange),
    Transport(TransportCommand),
    TrackRenamed { index: usize, label: String },
    /// Clock tick: render one block
    Tick,
    Shutdown,
}

/// Asynchronous work requested by the dispatcher
#[derive(Debug, Clone)]
pub enum Command {
    ReadTrack {
        index: usize,
        label: String,
        source: BlobSource,
    },
    ReadAsset(BlobSource),
    Persist(PersistedState),
}
