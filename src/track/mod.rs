//! Tracks and the playlist
//!
//! Turns user-selected blobs into playable tracks and keeps the ordered
//! playlist the player shows under masked titles.

mod playlist;
mod source;

use std::fmt;
use std::sync::Arc;

pub use playlist::{Playlist, PlaylistEntry};
pub use source::{mask_title, mime_from_file_name, BlobSource, MASK_SUBJECTS};

/// One loaded playlist item
///
/// Owns the raw media bytes; the audio graph keeps the track alive for as
/// long as its stream is connected.
#[derive(Clone)]
pub struct Track {
    raw_data: Arc<[u8]>,
    display_label: String,
    index: usize,
}

impl Track {
    /// Wrap bytes read from a blob as a track
    pub fn from_bytes(data: impl Into<Arc<[u8]>>, label: impl Into<String>, index: usize) -> Self {
        Self {
            raw_data: data.into(),
            display_label: label.into(),
            index,
        }
    }

    /// Opaque media bytes
    pub fn raw_data(&self) -> &Arc<[u8]> {
        &self.raw_data
    }

    /// Label shown in the player
    pub fn display_label(&self) -> &str {
        &self.display_label
    }

    /// Rename the track
    pub fn set_display_label(&mut self, label: impl Into<String>) {
        self.display_label = label.into();
    }

    /// Position in the playlist it came from
    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Debug for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Track")
            .field("display_label", &self.display_label)
            .field("index", &self.index)
            .field("bytes", &self.raw_data.len())
            .finish()
    }
}
