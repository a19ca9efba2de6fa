//! Transport State Machine for Veil
//!
//! Tracks whether the connected stream is playing, where the playhead is
//! (in source frames), and what happens when the stream runs out.

use std::fmt;

use log::{debug, warn};

/// Transport states representing the current playback mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    /// No stream connected (default state)
    #[default]
    Stopped,
    /// Audio is actively playing
    Playing,
    /// Stream connected, playback paused
    Paused,
    /// Reached the end of a non-looping stream
    Ended,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportState::Stopped => write!(f, "Stopped"),
            TransportState::Playing => write!(f, "Playing"),
            TransportState::Paused => write!(f, "Paused"),
            TransportState::Ended => write!(f, "Ended"),
        }
    }
}

/// Manages transport state and the playhead of the connected stream
///
/// The playhead is fractional so that playback rates other than 1.0 and
/// source rates other than the output rate can step through the stream.
#[derive(Debug, Clone)]
pub struct TransportManager {
    /// Current transport state
    state: TransportState,

    /// Current read position in source frames
    playhead: f64,

    /// Sample rate of the connected stream
    source_rate: u32,

    /// Restart from zero when the stream runs out
    loop_enabled: bool,
}

impl Default for TransportManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportManager {
    /// Create a stopped transport with nothing connected
    ///
    /// # Example
    /// ```
    /// use veil::engine::TransportManager;
    /// let transport = TransportManager::new();
    /// assert!(transport.is_paused());
    /// assert!(!transport.has_stream());
    /// ```
    pub fn new() -> Self {
        Self {
            state: TransportState::Stopped,
            playhead: 0.0,
            source_rate: 0,
            loop_enabled: false,
        }
    }

    // ========================================================================
    // Stream Lifecycle
    // ========================================================================

    /// A new stream was connected: rewind and optionally start playing
    pub fn connect(&mut self, source_rate: u32, autoplay: bool) {
        self.source_rate = source_rate;
        self.playhead = 0.0;
        self.state = if autoplay {
            TransportState::Playing
        } else {
            TransportState::Paused
        };
        debug!(
            "[TRANSPORT] Connected {} Hz stream, state {}",
            source_rate, self.state
        );
    }

    // ========================================================================
    // Standard Transport Controls
    // ========================================================================

    /// Start or continue playback
    ///
    /// State transitions:
    /// - Paused -> Playing
    /// - Ended -> Playing (from zero)
    /// - Playing -> Playing (no-op)
    /// - Stopped -> Stopped (nothing to play)
    pub fn play(&mut self) {
        match self.state {
            TransportState::Paused => {
                self.state = TransportState::Playing;
                debug!("[TRANSPORT] Play from {:.3}s", self.position_secs());
            }
            TransportState::Ended => {
                self.playhead = 0.0;
                self.state = TransportState::Playing;
                debug!("[TRANSPORT] Replay from start");
            }
            TransportState::Playing => {
                debug!("[TRANSPORT] Already playing");
            }
            TransportState::Stopped => {
                warn!("[TRANSPORT] Cannot play - no stream connected");
            }
        }
    }

    /// Pause playback
    ///
    /// Only Playing changes state; every other state is a no-op.
    pub fn pause(&mut self) {
        match self.state {
            TransportState::Playing => {
                self.state = TransportState::Paused;
                debug!("[TRANSPORT] Paused at {:.3}s", self.position_secs());
            }
            _ => {
                debug!("[TRANSPORT] Pause ignored in state {}", self.state);
            }
        }
    }

    /// Enable or disable restart at end of stream
    pub fn set_loop(&mut self, enabled: bool) {
        self.loop_enabled = enabled;
    }

    /// Whether end of stream restarts playback
    pub fn loop_enabled(&self) -> bool {
        self.loop_enabled
    }

    /// Return the playhead to read from and advance it by `step` frames
    ///
    /// Returns None when not playing. When the playhead passes
    /// `total_frames` it wraps (loop enabled) or the transport ends.
    pub fn step_playhead(&mut self, step: f64, total_frames: usize) -> Option<f64> {
        if self.state != TransportState::Playing {
            return None;
        }

        let total = total_frames as f64;
        if total_frames == 0 {
            self.state = TransportState::Ended;
            return None;
        }

        if self.playhead >= total {
            if self.loop_enabled {
                self.playhead %= total;
                debug!("[TRANSPORT] Loop restart");
            } else {
                self.state = TransportState::Ended;
                debug!("[TRANSPORT] End of stream");
                return None;
            }
        }

        let current = self.playhead;
        self.playhead += step;
        Some(current)
    }

    // ========================================================================
    // State Queries
    // ========================================================================

    /// Check if transport is currently playing
    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    /// Anything other than Playing counts as paused
    pub fn is_paused(&self) -> bool {
        !self.is_playing()
    }

    /// Check whether a stream is connected
    pub fn has_stream(&self) -> bool {
        self.state != TransportState::Stopped
    }

    /// Get the current transport state
    pub fn state(&self) -> TransportState {
        self.state
    }

    /// Playhead in source frames
    pub fn playhead_frames(&self) -> f64 {
        self.playhead
    }

    /// Playhead in seconds of source audio
    pub fn position_secs(&self) -> f64 {
        if self.source_rate == 0 {
            return 0.0;
        }
        self.playhead / self.source_rate as f64
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_stopped() {
        let transport = TransportManager::default();
        assert_eq!(transport.state(), TransportState::Stopped);
        assert!(transport.is_paused());
        assert!(!transport.has_stream());
        assert_eq!(transport.position_secs(), 0.0);
    }

    #[test]
    fn test_connect_autoplay() {
        let mut transport = TransportManager::new();
        transport.connect(44100, true);
        assert!(transport.is_playing());

        transport.connect(44100, false);
        assert_eq!(transport.state(), TransportState::Paused);
    }

    #[test]
    fn test_play_without_stream_is_noop() {
        let mut transport = TransportManager::new();
        transport.play();
        assert_eq!(transport.state(), TransportState::Stopped);
    }

    #[test]
    fn test_double_pause_no_op() {
        let mut transport = TransportManager::new();
        transport.connect(48000, true);
        transport.pause();
        transport.pause();
        assert_eq!(transport.state(), TransportState::Paused);
    }

    #[test]
    fn test_double_play_no_op() {
        let mut transport = TransportManager::new();
        transport.connect(48000, true);
        transport.play();
        assert!(transport.is_playing());
    }

    #[test]
    fn test_step_playhead_advances_only_while_playing() {
        let mut transport = TransportManager::new();
        transport.connect(48000, false);
        assert_eq!(transport.step_playhead(1.0, 100), None);
        assert_eq!(transport.playhead_frames(), 0.0);

        transport.play();
        assert_eq!(transport.step_playhead(1.5, 100), Some(0.0));
        assert_eq!(transport.step_playhead(1.5, 100), Some(1.5));
        assert_eq!(transport.playhead_frames(), 3.0);
    }

    #[test]
    fn test_end_of_stream_without_loop() {
        let mut transport = TransportManager::new();
        transport.connect(48000, true);
        for _ in 0..4 {
            assert!(transport.step_playhead(1.0, 4).is_some());
        }
        assert_eq!(transport.step_playhead(1.0, 4), None);
        assert_eq!(transport.state(), TransportState::Ended);
        assert!(transport.is_paused());

        // Play after end restarts from zero
        transport.play();
        assert_eq!(transport.step_playhead(1.0, 4), Some(0.0));
    }

    #[test]
    fn test_end_of_stream_with_loop() {
        let mut transport = TransportManager::new();
        transport.set_loop(true);
        transport.connect(48000, true);
        for _ in 0..4 {
            transport.step_playhead(1.0, 4);
        }
        assert_eq!(transport.step_playhead(1.0, 4), Some(0.0));
        assert!(transport.is_playing());
    }

    #[test]
    fn test_pause_after_end_keeps_ended() {
        let mut transport = TransportManager::new();
        transport.connect(48000, true);
        transport.step_playhead(2.0, 1);
        transport.step_playhead(2.0, 1);
        transport.pause();
        assert_eq!(transport.state(), TransportState::Ended);
    }

    #[test]
    fn test_transport_state_display() {
        assert_eq!(format!("{}", TransportState::Stopped), "Stopped");
        assert_eq!(format!("{}", TransportState::Playing), "Playing");
        assert_eq!(format!("{}", TransportState::Paused), "Paused");
        assert_eq!(format!("{}", TransportState::Ended), "Ended");
    }
}
