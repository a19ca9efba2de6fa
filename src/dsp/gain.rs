//! Gain Effect
//!
//! Linear volume stage in front of the sink.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::dsp::effect::{Effect, EffectParams};
use crate::engine::buffer::linear_to_db;
use crate::engine::AudioBuffer;
use crate::impl_effect_common;

/// Linear gain in `[0, 1]`
///
/// # Example
/// ```
/// use veil::dsp::Gain;
///
/// let mut gain = Gain::new(1.0);
/// gain.set_level(1.7);
/// assert_eq!(gain.level(), 1.0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gain {
    params: EffectParams,
    level: f32,
}

impl Gain {
    /// Create a gain stage; the level is clamped to `[0, 1]`
    pub fn new(level: f32) -> Self {
        let mut gain = Self {
            params: EffectParams::default(),
            level: 1.0,
        };
        gain.set_level(level);
        gain
    }

    /// Set the level, clamped to `[0, 1]`
    ///
    /// Returns false (and keeps the old level) for NaN or infinite input.
    pub fn set_level(&mut self, level: f32) -> bool {
        if !level.is_finite() {
            return false;
        }
        self.level = level.clamp(0.0, 1.0);
        true
    }

    /// Current linear level
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Current level in dB (for display)
    pub fn gain_db(&self) -> f32 {
        linear_to_db(self.level)
    }
}

impl Default for Gain {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Effect for Gain {
    impl_effect_common!("gain", "Volume");

    fn process(&mut self, buffer: &mut AudioBuffer) {
        if !self.params.enabled {
            return;
        }

        // Unity gain optimization
        if (self.level - 1.0).abs() < f32::EPSILON {
            return;
        }

        for channel in 0..buffer.num_channels() {
            for sample in buffer.channel_mut(channel).iter_mut() {
                *sample *= self.level;
            }
        }
    }

    fn prepare(&mut self, _sample_rate: u32, _max_block_size: usize) {
        // Stateless
    }

    fn reset(&mut self) {
        // Stateless
    }

    fn get_params(&self) -> Value {
        json!({
            "id": self.params.id,
            "enabled": self.params.enabled,
            "level": self.level,
        })
    }
}
