//! Single-tap delay
//!
//! The graph's "reverb" is one delayed copy of the input, placed in series
//! (no dry path, no feedback). It approximates a room by smearing the
//! signal in time; it is not an impulse-response reverb.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::dsp::effect::{Effect, EffectParams};
use crate::engine::AudioBuffer;
use crate::impl_effect_common;

/// Default ceiling for the delay time in seconds
pub const DEFAULT_MAX_DELAY_SECS: f32 = 0.5;

/// Channels the delay line keeps history for
const DELAY_CHANNELS: usize = 2;

/// In-series delay line with a runtime-adjustable tap
///
/// Changing the delay time moves the read tap without clearing the line,
/// so playback continues uninterrupted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SingleTapDelay {
    params: EffectParams,
    /// Current delay time in seconds (0..=max_delay_secs)
    delay_secs: f32,
    /// Upper bound for the delay time
    max_delay_secs: f32,
    /// One circular buffer per channel
    #[serde(skip)]
    lines: Vec<Vec<f32>>,
    /// Current write position in the circular buffers
    #[serde(skip)]
    write_pos: usize,
    #[serde(skip)]
    sample_rate: u32,
}

impl SingleTapDelay {
    /// Create a delay with zero delay time and the given ceiling
    pub fn new(max_delay_secs: f32) -> Self {
        let max_delay_secs = if max_delay_secs.is_finite() {
            max_delay_secs.max(0.0)
        } else {
            DEFAULT_MAX_DELAY_SECS
        };
        Self {
            params: EffectParams::default(),
            delay_secs: 0.0,
            max_delay_secs,
            lines: Vec::new(),
            write_pos: 0,
            sample_rate: 0,
        }
    }

    /// Set the delay time (clamped to 0..=max)
    pub fn set_delay_secs(&mut self, secs: f32) {
        self.delay_secs = secs.clamp(0.0, self.max_delay_secs);
    }

    /// Current delay time in seconds
    pub fn delay_secs(&self) -> f32 {
        self.delay_secs
    }

    /// Delay ceiling in seconds
    pub fn max_delay_secs(&self) -> f32 {
        self.max_delay_secs
    }

    /// Current delay in samples at the prepared rate
    fn delay_samples(&self) -> usize {
        let samples = (self.delay_secs as f64 * self.sample_rate as f64).round() as usize;
        samples.min(self.line_len().saturating_sub(1))
    }

    fn line_len(&self) -> usize {
        self.lines.first().map(Vec::len).unwrap_or(0)
    }

    /// Line length that holds the maximum delay plus the current sample
    fn required_line_len(&self) -> usize {
        (self.max_delay_secs as f64 * self.sample_rate as f64).ceil() as usize + 1
    }
}

impl Default for SingleTapDelay {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DELAY_SECS)
    }
}

impl Effect for SingleTapDelay {
    impl_effect_common!("delay", "Delay");

    fn process(&mut self, buffer: &mut AudioBuffer) {
        if !self.params.enabled || buffer.is_empty() {
            return;
        }

        let size = self.line_len();
        if size == 0 {
            return;
        }

        let delay = self.delay_samples();
        let channels = buffer.num_channels().min(self.lines.len());

        for i in 0..buffer.num_samples() {
            let read_pos = (self.write_pos + size - delay) % size;
            for ch in 0..channels {
                let line = &mut self.lines[ch];
                line[self.write_pos] = buffer.samples[ch][i];
                buffer.samples[ch][i] = line[read_pos];
            }
            self.write_pos = (self.write_pos + 1) % size;
        }
    }

    fn prepare(&mut self, sample_rate: u32, _max_block_size: usize) {
        self.sample_rate = sample_rate;
        let size = self.required_line_len();
        self.lines = vec![vec![0.0; size]; DELAY_CHANNELS];
        self.write_pos = 0;
    }

    fn reset(&mut self) {
        for line in &mut self.lines {
            line.fill(0.0);
        }
        self.write_pos = 0;
    }

    fn get_params(&self) -> Value {
        json!({
            "id": self.params.id,
            "enabled": self.params.enabled,
            "delay_secs": self.delay_secs,
            "max_delay_secs": self.max_delay_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ChannelLayout;

    fn impulse(frames: usize) -> AudioBuffer {
        let mut buffer = AudioBuffer::with_sample_rate(frames, ChannelLayout::Stereo, 1000);
        buffer.samples[0][0] = 1.0;
        buffer.samples[1][0] = 1.0;
        buffer
    }

    #[test]
    fn test_zero_delay_is_passthrough() {
        let mut delay = SingleTapDelay::new(0.5);
        delay.prepare(1000, 64);

        let mut buffer = impulse(16);
        let original = buffer.clone();
        delay.process(&mut buffer);
        assert_eq!(buffer, original);
    }

    #[test]
    fn test_impulse_is_delayed() {
        let mut delay = SingleTapDelay::new(0.5);
        delay.prepare(1000, 64);
        delay.set_delay_secs(0.01); // 10 samples at 1 kHz

        let mut buffer = impulse(32);
        delay.process(&mut buffer);
        assert_eq!(buffer.samples[0][0], 0.0);
        assert_eq!(buffer.samples[0][10], 1.0);
        assert_eq!(buffer.samples[1][10], 1.0);
        assert_eq!(buffer.samples[0].iter().filter(|&&s| s != 0.0).count(), 1);
    }

    #[test]
    fn test_delay_spans_blocks() {
        let mut delay = SingleTapDelay::new(0.5);
        delay.prepare(1000, 8);
        delay.set_delay_secs(0.012);

        let mut first = impulse(8);
        delay.process(&mut first);
        assert!(first.is_silent());

        let mut second = AudioBuffer::with_sample_rate(8, ChannelLayout::Stereo, 1000);
        delay.process(&mut second);
        assert_eq!(second.samples[0][4], 1.0);
    }

    #[test]
    fn test_delay_clamped_to_max() {
        let mut delay = SingleTapDelay::new(0.5);
        delay.set_delay_secs(2.0);
        assert_eq!(delay.delay_secs(), 0.5);
        delay.set_delay_secs(-1.0);
        assert_eq!(delay.delay_secs(), 0.0);
    }

    #[test]
    fn test_max_delay_fits_line() {
        let mut delay = SingleTapDelay::new(0.5);
        delay.prepare(1000, 64);
        delay.set_delay_secs(0.5);

        let mut buffer = impulse(600);
        delay.process(&mut buffer);
        assert_eq!(buffer.samples[0][500], 1.0);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut delay = SingleTapDelay::new(0.5);
        delay.prepare(1000, 64);
        delay.set_delay_secs(0.02);

        let mut buffer = impulse(10);
        delay.process(&mut buffer);
        delay.reset();

        let mut next = AudioBuffer::with_sample_rate(40, ChannelLayout::Stereo, 1000);
        delay.process(&mut next);
        assert!(next.is_silent());
    }

    #[test]
    fn test_disabled_is_bypassed() {
        let mut delay = SingleTapDelay::new(0.5);
        delay.prepare(1000, 64);
        delay.set_delay_secs(0.1);
        delay.set_enabled(false);

        let mut buffer = impulse(16);
        let original = buffer.clone();
        delay.process(&mut buffer);
        assert_eq!(buffer, original);
    }

    #[test]
    fn test_get_params() {
        let mut delay = SingleTapDelay::new(0.5);
        delay.set_delay_secs(0.25);
        let params = delay.get_params();
        assert_eq!(params["delay_secs"].as_f64().unwrap(), 0.25);
        assert_eq!(params["max_delay_secs"].as_f64().unwrap(), 0.5);
        assert_eq!(delay.effect_type(), "delay");
    }
}
