//! Audio Engine Module
//!
//! Core playback engine including:
//! - Audio buffer management
//! - Transport state machine
//! - Media decoding and WAV encoding
//! - Output sinks
//! - The playback graph

pub mod buffer;
pub mod graph;
pub mod io;
pub mod sink;
pub mod transport;

pub use buffer::{AudioBuffer, ChannelLayout, OUTPUT_SAMPLE_RATE};
pub use graph::{AudioGraph, StreamHandle};
pub use io::{decode_bytes, encode_wav_bytes, generate_test_tone};
pub use sink::{CapturedAudio, MemorySink, NullSink, OutputSink, WavSink};
pub use transport::{TransportManager, TransportState};
