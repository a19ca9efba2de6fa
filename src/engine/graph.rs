//! Audio Graph
//!
//! The fixed playback topology of a session:
//!
//! ```text
//! source (decoded stream) → single-tap delay → gain → output sink
//! ```
//!
//! At most one stream is connected at a time. Parameter setters take effect
//! on the next rendered block, so playback is never interrupted by a control
//! change. Rendering is driven from outside (the session clock calls
//! `render`); a paused or empty graph still renders silence so the device
//! clock keeps running and the delay tail drains.

use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::dsp::{Effect, Gain, SingleTapDelay};
use crate::engine::buffer::{calculate_peak, AudioBuffer, ChannelLayout};
use crate::engine::io::decode_bytes;
use crate::engine::sink::OutputSink;
use crate::engine::transport::{TransportManager, TransportState};
use crate::error::{Result, VeilError};
use crate::track::Track;

// ============================================================================
// Stream Handle
// ============================================================================

/// A decoded track, ready to connect to the graph
///
/// Owns the track (and so its raw bytes) for as long as it is connected.
#[derive(Debug, Clone)]
pub struct StreamHandle {
    id: Uuid,
    track: Track,
    buffer: AudioBuffer,
}

impl StreamHandle {
    /// Decode `track.raw_data` into a playable stream
    ///
    /// This is the expensive part of a load; the event loop runs it on a
    /// blocking thread so connecting the result never stalls key handling.
    ///
    /// # Errors
    /// * `Unreadable` - the bytes do not decode as media, or decode to
    ///   nothing
    pub fn decode(track: Track) -> Result<Self> {
        let buffer = decode_bytes(Arc::clone(track.raw_data()))?;
        if buffer.is_empty() || buffer.sample_rate == 0 {
            return Err(VeilError::unreadable("decoded stream has no frames"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            track,
            buffer,
        })
    }

    /// Unique id used in log lines
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    /// Decoded audio at the track's native sample rate
    pub fn buffer(&self) -> &AudioBuffer {
        &self.buffer
    }
}

// ============================================================================
// Audio Graph
// ============================================================================

/// Source → delay → gain → sink
pub struct AudioGraph {
    transport: TransportManager,
    delay: SingleTapDelay,
    gain: Gain,
    sink: Box<dyn OutputSink>,
    current: Option<StreamHandle>,
    playback_rate: f32,
    effect_intensity: f32,
    output_rate: u32,
    /// Peak of the last rendered block, after gain
    last_peak: f32,
}

impl AudioGraph {
    /// Build an empty graph rendering into `sink`
    ///
    /// `max_delay_secs` is the delay time reached at effect intensity 1.0.
    pub fn new(sink: Box<dyn OutputSink>, max_delay_secs: f32) -> Self {
        let output_rate = sink.sample_rate();
        let mut delay = SingleTapDelay::new(max_delay_secs);
        delay.prepare(output_rate, 0);

        Self {
            transport: TransportManager::new(),
            delay,
            gain: Gain::new(1.0),
            sink,
            current: None,
            playback_rate: 1.0,
            effect_intensity: 0.0,
            output_rate,
            last_peak: 0.0,
        }
    }

    // ========================================================================
    // Track Loading
    // ========================================================================

    /// Decode `track`, replace the connected stream with it and play from zero
    ///
    /// # Errors
    /// * `Unreadable` - the bytes do not decode as media; the previously
    ///   connected stream (if any) stays connected and untouched
    pub fn load_track(&mut self, track: Track) -> Result<()> {
        self.connect_stream(StreamHandle::decode(track)?, true)
    }

    /// Like `load_track` but leave the transport paused at zero
    pub fn load_track_paused(&mut self, track: Track) -> Result<()> {
        self.connect_stream(StreamHandle::decode(track)?, false)
    }

    /// Swap in an already decoded stream, playing when `autoplay` is set
    ///
    /// # Errors
    /// * `Unreadable` - the stream has no frames; nothing changes
    pub fn connect_stream(&mut self, handle: StreamHandle, autoplay: bool) -> Result<()> {
        if handle.buffer.is_empty() || handle.buffer.sample_rate == 0 {
            return Err(VeilError::unreadable("decoded stream has no frames"));
        }

        if let Some(old) = self.current.take() {
            debug!("[GRAPH] Released stream {}", old.id);
        }

        self.delay.reset();
        self.transport.connect(handle.buffer.sample_rate, autoplay);
        info!(
            "[GRAPH] Connected stream {} ({:.2}s, {} ch) for track {}",
            handle.id,
            handle.buffer.duration_secs(),
            handle.buffer.channels(),
            handle.track.index()
        );
        self.current = Some(handle);
        Ok(())
    }

    /// Update the label of the connected track if it sits at `index`
    pub fn rename_track(&mut self, index: usize, label: &str) {
        if let Some(handle) = self.current.as_mut() {
            if handle.track.index() == index {
                handle.track.set_display_label(label);
            }
        }
    }

    // ========================================================================
    // Parameters
    // ========================================================================

    /// Set the output volume, clamped to `[0, 1]`; returns the applied level
    pub fn set_volume(&mut self, volume: f32) -> f32 {
        if !self.gain.set_level(volume) {
            warn!("[GRAPH] Ignoring non-finite volume {}", volume);
        }
        self.gain.level()
    }

    /// Set the playback rate multiplier
    ///
    /// # Errors
    /// * `InvalidParameter` - the rate is not finite or not positive; the
    ///   previous rate is kept
    pub fn set_playback_rate(&mut self, rate: f32) -> Result<()> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(VeilError::InvalidParameter {
                param: "playback_rate".to_string(),
                value: rate,
                reason: "must be a positive number".to_string(),
            });
        }
        self.playback_rate = rate;
        debug!("[GRAPH] Playback rate {}", rate);
        Ok(())
    }

    /// Set the effect intensity in `[0, 1]`
    ///
    /// Maps linearly onto the delay time: 0 is no delay, 1 is the maximum.
    /// This is a single-tap delay standing in for reverb, an approximation
    /// rather than an impulse-response effect.
    pub fn set_effect_intensity(&mut self, intensity: f32) -> f32 {
        if !intensity.is_finite() {
            warn!("[GRAPH] Ignoring non-finite effect intensity {}", intensity);
            return self.effect_intensity;
        }
        self.effect_intensity = intensity.clamp(0.0, 1.0);
        self.delay
            .set_delay_secs(self.effect_intensity * self.delay.max_delay_secs());
        self.effect_intensity
    }

    pub fn set_loop(&mut self, enabled: bool) {
        self.transport.set_loop(enabled);
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Pause playback (no-op when already paused)
    pub fn pause(&mut self) {
        self.transport.pause();
    }

    /// Resume playback (no-op when playing or when nothing is connected)
    pub fn resume(&mut self) {
        self.transport.play();
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Render `frames` output frames through the chain into the sink
    pub fn render(&mut self, frames: usize) -> Result<()> {
        let mut block = AudioBuffer::with_sample_rate(frames, ChannelLayout::Stereo, self.output_rate);

        if let Some(handle) = &self.current {
            let source = &handle.buffer;
            let total = source.num_samples();
            let source_channels = source.channels();
            let step = self.playback_rate as f64 * source.sample_rate as f64 / self.output_rate as f64;

            for i in 0..frames {
                let Some(position) = self.transport.step_playhead(step, total) else {
                    break;
                };
                let index = position.floor() as usize;
                let frac = (position - index as f64) as f32;

                for ch in 0..block.num_channels() {
                    let samples = &source.samples[ch.min(source_channels - 1)];
                    let a = samples[index];
                    let b = samples.get(index + 1).copied().unwrap_or(a);
                    block.samples[ch][i] = a + (b - a) * frac;
                }
            }
        }

        self.delay.process(&mut block);
        self.gain.process(&mut block);
        self.last_peak = calculate_peak(&block);
        self.sink.write(&block)
    }

    /// Flush the sink
    pub fn finish(&mut self) -> Result<()> {
        self.sink.finish()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn volume(&self) -> f32 {
        self.gain.level()
    }

    pub fn playback_rate(&self) -> f32 {
        self.playback_rate
    }

    pub fn effect_intensity(&self) -> f32 {
        self.effect_intensity
    }

    /// Delay time the effect intensity currently maps to
    pub fn delay_secs(&self) -> f32 {
        self.delay.delay_secs()
    }

    pub fn max_delay_secs(&self) -> f32 {
        self.delay.max_delay_secs()
    }

    pub fn loop_enabled(&self) -> bool {
        self.transport.loop_enabled()
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing()
    }

    pub fn is_paused(&self) -> bool {
        self.transport.is_paused()
    }

    pub fn transport_state(&self) -> TransportState {
        self.transport.state()
    }

    /// Playlist index of the connected track
    pub fn current_index(&self) -> Option<usize> {
        self.current.as_ref().map(|h| h.track.index())
    }

    pub fn current(&self) -> Option<&StreamHandle> {
        self.current.as_ref()
    }

    /// Playhead in seconds of source audio
    pub fn position_secs(&self) -> f64 {
        self.transport.position_secs()
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Output level of the last rendered block (linear)
    pub fn peak(&self) -> f32 {
        self.last_peak
    }

    pub fn frames_written(&self) -> u64 {
        self.sink.frames_written()
    }

    /// Current parameters and effect state as JSON
    pub fn snapshot(&self) -> Value {
        json!({
            "transport": self.transport.state().to_string(),
            "position_secs": self.position_secs(),
            "track": self.current.as_ref().map(|h| h.track.display_label().to_string()),
            "index": self.current_index(),
            "volume": self.volume(),
            "playback_rate": self.playback_rate,
            "effect_intensity": self.effect_intensity,
            "loop": self.loop_enabled(),
            "peak": self.last_peak,
            "effects": [self.delay.get_params(), self.gain.get_params()],
        })
    }
}

impl std::fmt::Debug for AudioGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioGraph")
            .field("transport", &self.transport.state())
            .field("current", &self.current_index())
            .field("volume", &self.volume())
            .field("playback_rate", &self.playback_rate)
            .field("effect_intensity", &self.effect_intensity)
            .finish()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::io::{encode_wav_bytes, generate_test_tone};
    use crate::engine::sink::{CapturedAudio, MemorySink};
    use approx::assert_abs_diff_eq;

    const RATE: u32 = 8000;

    fn graph() -> (AudioGraph, CapturedAudio) {
        let (sink, captured) = MemorySink::new(RATE);
        (AudioGraph::new(Box::new(sink), 0.5), captured)
    }

    fn constant_track(value: f32, frames: usize, index: usize) -> Track {
        let mut buffer = AudioBuffer::with_sample_rate(frames, ChannelLayout::Mono, RATE);
        buffer.channel_mut(0).fill(value);
        let bytes = encode_wav_bytes(&buffer).unwrap();
        Track::from_bytes(bytes, format!("track {}", index), index)
    }

    #[test]
    fn test_load_starts_playing_from_zero() {
        let (mut graph, _) = graph();
        graph.load_track(constant_track(0.5, 800, 3)).unwrap();
        assert!(graph.is_playing());
        assert_eq!(graph.current_index(), Some(3));
        assert_eq!(graph.position_secs(), 0.0);
    }

    #[test]
    fn test_render_passes_source_through() {
        let (mut graph, captured) = graph();
        graph.load_track(constant_track(0.5, 800, 0)).unwrap();
        graph.render(100).unwrap();

        let out = captured.snapshot();
        assert_eq!(out.num_samples(), 100);
        for ch in 0..2 {
            for &s in out.channel(ch) {
                assert_abs_diff_eq!(s, 0.5, epsilon = 1e-3);
            }
        }
    }

    #[test]
    fn test_volume_scales_output() {
        let (mut graph, captured) = graph();
        graph.load_track(constant_track(0.5, 800, 0)).unwrap();
        assert_eq!(graph.set_volume(0.5), 0.5);
        graph.render(10).unwrap();
        assert_abs_diff_eq!(captured.snapshot().channel(0)[5], 0.25, epsilon = 1e-3);
        assert_abs_diff_eq!(graph.peak(), 0.25, epsilon = 1e-3);
    }

    #[test]
    fn test_volume_clamped() {
        let (mut graph, _) = graph();
        assert_eq!(graph.set_volume(3.0), 1.0);
        assert_eq!(graph.set_volume(-1.0), 0.0);
        assert_eq!(graph.set_volume(f32::NAN), 0.0);
    }

    #[test]
    fn test_paused_graph_renders_silence() {
        let (mut graph, captured) = graph();
        graph.load_track(constant_track(0.5, 800, 0)).unwrap();
        graph.pause();
        graph.pause();
        assert!(graph.is_paused());
        graph.render(50).unwrap();
        assert!(captured.snapshot().is_silent());
        assert_eq!(graph.position_secs(), 0.0);

        graph.resume();
        graph.resume();
        assert!(graph.is_playing());
    }

    #[test]
    fn test_empty_graph_renders_silence() {
        let (mut graph, captured) = graph();
        graph.resume();
        assert!(graph.is_paused());
        graph.render(64).unwrap();
        assert_eq!(captured.frames(), 64);
        assert!(captured.snapshot().is_silent());
    }

    #[test]
    fn test_unreadable_track_keeps_current_stream() {
        let (mut graph, _) = graph();
        graph.load_track(constant_track(0.5, 800, 1)).unwrap();
        graph.render(100).unwrap();
        let position = graph.position_secs();

        let garbage = Track::from_bytes(vec![0u8, 1, 2, 3, 4, 5, 6, 7], "bad", 2);
        let err = graph.load_track(garbage).unwrap_err();
        assert_eq!(err.error_code(), "UNREADABLE");
        assert_eq!(graph.current_index(), Some(1));
        assert!(graph.is_playing());
        assert_eq!(graph.position_secs(), position);
    }

    #[test]
    fn test_playback_rate_rejects_non_positive() {
        let (mut graph, _) = graph();
        assert!(graph.set_playback_rate(2.0).is_ok());
        for bad in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let err = graph.set_playback_rate(bad).unwrap_err();
            assert!(matches!(err, VeilError::InvalidParameter { .. }));
        }
        assert_eq!(graph.playback_rate(), 2.0);
    }

    #[test]
    fn test_playback_rate_advances_faster() {
        let (mut graph, _) = graph();
        graph.load_track(constant_track(0.1, 8000, 0)).unwrap();
        graph.set_playback_rate(2.0).unwrap();
        graph.render(800).unwrap();
        assert_abs_diff_eq!(graph.position_secs(), 0.2, epsilon = 1e-9);
    }

    #[test]
    fn test_effect_intensity_maps_to_delay() {
        let (mut graph, _) = graph();
        graph.set_effect_intensity(1.0);
        assert_eq!(graph.delay_secs(), 0.5);
        graph.set_effect_intensity(0.0);
        assert_eq!(graph.delay_secs(), 0.0);
        graph.set_effect_intensity(0.5);
        assert_abs_diff_eq!(graph.delay_secs(), 0.25);
        graph.set_effect_intensity(7.0);
        assert_eq!(graph.effect_intensity(), 1.0);
    }

    #[test]
    fn test_delay_shifts_output() {
        let (mut graph, captured) = graph();
        graph.load_track(constant_track(0.5, 8000, 0)).unwrap();
        // 0.1 * 0.5s = 50ms = 400 frames at 8 kHz
        graph.set_effect_intensity(0.1);
        graph.render(800).unwrap();

        let out = captured.snapshot();
        assert_eq!(out.channel(0)[399], 0.0);
        assert_abs_diff_eq!(out.channel(0)[400], 0.5, epsilon = 1e-3);
    }

    #[test]
    fn test_end_of_stream_without_loop() {
        let (mut graph, captured) = graph();
        graph.load_track(constant_track(0.5, 100, 0)).unwrap();
        graph.render(150).unwrap();

        assert_eq!(graph.transport_state(), TransportState::Ended);
        assert!(graph.is_paused());
        let out = captured.snapshot();
        assert_abs_diff_eq!(out.channel(0)[99], 0.5, epsilon = 1e-3);
        assert_eq!(out.channel(0)[120], 0.0);

        graph.resume();
        assert!(graph.is_playing());
        assert_eq!(graph.position_secs(), 0.0);
    }

    #[test]
    fn test_loop_restarts_stream() {
        let (mut graph, captured) = graph();
        graph.set_loop(true);
        graph.load_track(constant_track(0.5, 100, 0)).unwrap();
        graph.render(250).unwrap();

        assert!(graph.is_playing());
        let out = captured.snapshot();
        assert!(out.channel(0).iter().all(|&s| (s - 0.5).abs() < 1e-3));
    }

    #[test]
    fn test_load_paused_and_rename() {
        let (mut graph, _) = graph();
        graph.load_track_paused(constant_track(0.5, 100, 4)).unwrap();
        assert!(graph.is_paused());
        assert_eq!(graph.transport_state(), TransportState::Paused);

        graph.rename_track(4, "Renamed");
        assert_eq!(graph.current().unwrap().track().display_label(), "Renamed");
        graph.rename_track(5, "Ignored");
        assert_eq!(graph.current().unwrap().track().display_label(), "Renamed");
    }

    #[test]
    fn test_connect_decoded_stream() {
        let (mut graph, captured) = graph();
        let handle = StreamHandle::decode(constant_track(0.5, 800, 2)).unwrap();
        assert_eq!(handle.buffer().num_samples(), 800);

        graph.connect_stream(handle, true).unwrap();
        assert_eq!(graph.current_index(), Some(2));
        graph.render(10).unwrap();
        assert_abs_diff_eq!(captured.snapshot().channel(1)[3], 0.5, epsilon = 1e-3);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = StreamHandle::decode(Track::from_bytes(vec![9u8; 64], "bad", 0)).unwrap_err();
        assert_eq!(err.error_code(), "UNREADABLE");
    }

    #[test]
    fn test_resampled_source() {
        let (mut graph, _) = graph();
        let tone = generate_test_tone(440.0, 1.0, RATE / 2);
        let bytes = encode_wav_bytes(&tone).unwrap();
        graph.load_track(Track::from_bytes(bytes, "half rate", 0)).unwrap();
        graph.render(RATE as usize / 2).unwrap();
        assert_abs_diff_eq!(graph.position_secs(), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_snapshot_lists_effects() {
        let (mut graph, _) = graph();
        graph.set_volume(0.3);
        let snapshot = graph.snapshot();
        assert_eq!(snapshot["transport"], "Stopped");
        assert_eq!(snapshot["effects"][0]["max_delay_secs"], 0.5);
        assert!(snapshot["track"].is_null());
    }
}
