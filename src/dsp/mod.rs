//! DSP Effects
//!
//! Processing nodes of the playback graph. Every effect implements the
//! `Effect` trait; the graph wires them in a fixed order:
//! source → delay → gain → sink.

mod delay;
mod effect;
mod gain;

pub use delay::{SingleTapDelay, DEFAULT_MAX_DELAY_SECS};
pub use effect::{Effect, EffectParams};
pub use gain::Gain;
