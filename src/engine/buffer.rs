//! Audio Buffer Management
//!
//! Planar 32-bit float buffers used for decoded streams and for the
//! blocks that flow through the graph.

use crate::error::{Result, VeilError};

// ============================================================================
// Constants
// ============================================================================

/// Default output sample rate of the graph (48kHz)
pub const OUTPUT_SAMPLE_RATE: u32 = 48000;

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert linear amplitude to decibels
///
/// Returns -f32::INFINITY for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

/// Calculate the peak absolute sample value across all channels
pub fn calculate_peak(buffer: &AudioBuffer) -> f32 {
    buffer
        .samples
        .iter()
        .flat_map(|channel| channel.iter())
        .map(|&s| s.abs())
        .fold(0.0_f32, f32::max)
}

// ============================================================================
// Channel Layout
// ============================================================================

/// Audio channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelLayout {
    /// Single channel (mono)
    Mono,
    /// Two channels (stereo: left, right)
    #[default]
    Stereo,
}

impl ChannelLayout {
    /// Returns the number of channels for this layout
    pub fn num_channels(&self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }

    /// Create a ChannelLayout from a channel count
    pub fn from_count(count: usize) -> Option<Self> {
        match count {
            1 => Some(ChannelLayout::Mono),
            2 => Some(ChannelLayout::Stereo),
            _ => None,
        }
    }
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Non-interleaved 32-bit float audio
///
/// Outer Vec is channels, inner Vec is samples. Decoded streams keep
/// their source sample rate; render blocks use the graph's output rate.
///
/// # Example
/// ```
/// use veil::engine::{AudioBuffer, ChannelLayout};
///
/// let buffer = AudioBuffer::new(48000, ChannelLayout::Stereo);
/// assert_eq!(buffer.channels(), 2);
/// assert_eq!(buffer.len(), 48000);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Sample data: outer Vec is channels, inner Vec is samples
    pub samples: Vec<Vec<f32>>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Create a silent buffer at the default output rate
    pub fn new(num_samples: usize, layout: ChannelLayout) -> Self {
        Self::with_sample_rate(num_samples, layout, OUTPUT_SAMPLE_RATE)
    }

    /// Create a silent buffer at an explicit sample rate
    pub fn with_sample_rate(num_samples: usize, layout: ChannelLayout, sample_rate: u32) -> Self {
        Self {
            samples: vec![vec![0.0_f32; num_samples]; layout.num_channels()],
            sample_rate,
        }
    }

    /// Create an audio buffer from interleaved sample data
    ///
    /// Fails if the data length is not a multiple of the channel count.
    pub fn from_interleaved(
        interleaved: &[f32],
        layout: ChannelLayout,
        sample_rate: u32,
    ) -> Result<Self> {
        let num_channels = layout.num_channels();

        if interleaved.len() % num_channels != 0 {
            return Err(VeilError::unreadable(format!(
                "Interleaved data length {} is not divisible by channel count {}",
                interleaved.len(),
                num_channels
            )));
        }

        let num_samples = interleaved.len() / num_channels;
        let mut samples = vec![Vec::with_capacity(num_samples); num_channels];

        for frame in interleaved.chunks_exact(num_channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                samples[ch].push(sample);
            }
        }

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Convert the buffer to interleaved format (L, R, L, R, ...)
    pub fn to_interleaved(&self) -> Vec<f32> {
        let num_channels = self.channels();
        let num_samples = self.len();

        if num_channels == 0 || num_samples == 0 {
            return Vec::new();
        }

        let mut interleaved = Vec::with_capacity(num_channels * num_samples);
        for sample_idx in 0..num_samples {
            for channel in &self.samples {
                interleaved.push(channel[sample_idx]);
            }
        }
        interleaved
    }

    /// Get the number of channels
    #[inline]
    pub fn channels(&self) -> usize {
        self.samples.len()
    }

    /// Alias for channels()
    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels()
    }

    /// Get the number of samples per channel
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    /// Check if the buffer is empty (no samples)
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Alias for len()
    #[inline]
    pub fn num_samples(&self) -> usize {
        self.len()
    }

    /// Get the duration in seconds
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    /// Get the channel layout, if the channel count maps to one
    pub fn channel_layout(&self) -> Option<ChannelLayout> {
        ChannelLayout::from_count(self.channels())
    }

    /// Immutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    /// Mutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.samples[index]
    }

    /// Get a sample, or None if out of bounds
    #[inline]
    pub fn get_sample(&self, channel: usize, index: usize) -> Option<f32> {
        self.samples.get(channel).and_then(|ch| ch.get(index)).copied()
    }

    /// Check if all samples are exactly zero
    pub fn is_silent(&self) -> bool {
        self.samples.iter().flatten().all(|&s| s == 0.0)
    }

    /// Append another buffer's samples channel by channel
    ///
    /// Channels missing from `other` are padded with silence.
    pub fn append(&mut self, other: &AudioBuffer) {
        let frames = other.len();
        for (ch, channel) in self.samples.iter_mut().enumerate() {
            match other.samples.get(ch) {
                Some(src) => channel.extend_from_slice(src),
                None => channel.extend(std::iter::repeat(0.0).take(frames)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_silent() {
        let buffer = AudioBuffer::new(128, ChannelLayout::Stereo);
        assert_eq!(buffer.channels(), 2);
        assert_eq!(buffer.len(), 128);
        assert_eq!(buffer.sample_rate, OUTPUT_SAMPLE_RATE);
        assert!(buffer.is_silent());
    }

    #[test]
    fn test_interleave_round_trip() {
        let interleaved = vec![0.1, -0.1, 0.2, -0.2, 0.3, -0.3];
        let buffer = AudioBuffer::from_interleaved(&interleaved, ChannelLayout::Stereo, 44100)
            .unwrap();
        assert_eq!(buffer.channel(0), &[0.1, 0.2, 0.3]);
        assert_eq!(buffer.channel(1), &[-0.1, -0.2, -0.3]);
        assert_eq!(buffer.to_interleaved(), interleaved);
    }

    #[test]
    fn test_from_interleaved_rejects_ragged_data() {
        let result = AudioBuffer::from_interleaved(&[0.1, 0.2, 0.3], ChannelLayout::Stereo, 48000);
        assert!(result.is_err());
    }

    #[test]
    fn test_duration() {
        let buffer = AudioBuffer::with_sample_rate(22050, ChannelLayout::Mono, 44100);
        assert!((buffer.duration_secs() - 0.5).abs() < 1e-9);
        assert_eq!(buffer.channel_layout(), Some(ChannelLayout::Mono));
    }

    #[test]
    fn test_append_pads_missing_channels() {
        let mut stereo = AudioBuffer::new(2, ChannelLayout::Stereo);
        let mut mono = AudioBuffer::new(3, ChannelLayout::Mono);
        mono.channel_mut(0).fill(0.5);

        stereo.append(&mono);
        assert_eq!(stereo.len(), 5);
        assert_eq!(stereo.channel(0)[4], 0.5);
        assert_eq!(stereo.channel(1)[4], 0.0);
    }

    #[test]
    fn test_peak() {
        let mut buffer = AudioBuffer::new(4, ChannelLayout::Mono);
        buffer.channel_mut(0).copy_from_slice(&[0.5, -1.0, 0.25, 0.0]);
        assert_eq!(calculate_peak(&buffer), 1.0);
        assert_eq!(linear_to_db(calculate_peak(&buffer)), 0.0);

        let silent = AudioBuffer::new(0, ChannelLayout::Mono);
        assert_eq!(calculate_peak(&silent), 0.0);
    }
}
