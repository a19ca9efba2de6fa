//! Playlist
//!
//! Ordered entries addressed by index only. The whole list is replaced on
//! every new file selection.

use log::debug;
use rand::Rng;

use crate::error::{Result, VeilError};
use crate::track::source::{mask_title, BlobSource};

/// One playlist row
#[derive(Debug, Clone)]
pub struct PlaylistEntry {
    /// Label shown in the player (masked at selection time)
    pub label: String,
    /// Where the content comes from; None for labels restored from disk
    pub source: Option<BlobSource>,
}

/// Ordered list of selectable tracks
#[derive(Debug, Clone, Default)]
pub struct Playlist {
    entries: Vec<PlaylistEntry>,
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole playlist with freshly selected blobs
    ///
    /// Labels are masked from the index so real file names never show.
    pub fn replace(&mut self, sources: Vec<BlobSource>) {
        self.entries = sources
            .into_iter()
            .enumerate()
            .map(|(i, source)| PlaylistEntry {
                label: mask_title(&source.name(), i),
                source: Some(source),
            })
            .collect();
        debug!("[PLAYLIST] Replaced with {} entries", self.entries.len());
    }

    /// Show labels persisted by an earlier session
    ///
    /// Restored entries have no content until the user selects files again.
    pub fn restore_labels(&mut self, labels: Vec<String>) {
        self.entries = labels
            .into_iter()
            .map(|label| PlaylistEntry {
                label,
                source: None,
            })
            .collect();
    }

    /// Entry at `index`
    pub fn get(&self, index: usize) -> Option<&PlaylistEntry> {
        self.entries.get(index)
    }

    /// Entry at `index` that can actually be read
    ///
    /// # Errors
    /// * `TrackOutOfRange` - no entry, or a restored label without content
    pub fn playable(&self, index: usize) -> Result<(&str, &BlobSource)> {
        let out_of_range = || VeilError::TrackOutOfRange {
            index,
            len: self.playable_len(),
        };
        let entry = self.entries.get(index).ok_or_else(out_of_range)?;
        let source = entry.source.as_ref().ok_or_else(out_of_range)?;
        Ok((entry.label.as_str(), source))
    }

    /// Rename the entry at `index`
    pub fn rename(&mut self, index: usize, label: impl Into<String>) -> Result<()> {
        let len = self.entries.len();
        let entry = self
            .entries
            .get_mut(index)
            .ok_or(VeilError::TrackOutOfRange { index, len })?;
        entry.label = label.into();
        Ok(())
    }

    /// All labels in order
    pub fn labels(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.label.clone()).collect()
    }

    /// Number of entries (including restored labels)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries that have content
    pub fn playable_len(&self) -> usize {
        self.entries.iter().filter(|e| e.source.is_some()).count()
    }

    /// Pick a random playable index different from `current`
    ///
    /// Returns None unless at least two entries are playable.
    pub fn shuffle_pick<R: Rng + ?Sized>(&self, current: Option<usize>, rng: &mut R) -> Option<usize> {
        let candidates: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(i, e)| e.source.is_some() && Some(*i) != current)
            .map(|(i, _)| i)
            .collect();

        if self.playable_len() < 2 || candidates.is_empty() {
            return None;
        }
        Some(candidates[rng.gen_range(0..candidates.len())])
    }
}
