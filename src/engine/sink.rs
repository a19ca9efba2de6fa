//! Output sinks
//!
//! The last node of the graph. A sink receives every rendered block in
//! order and never blocks the caller for longer than a write takes.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use hound::WavWriter;
use log::{debug, info};

use crate::engine::buffer::{AudioBuffer, ChannelLayout};
use crate::engine::io::{to_i16, wav_spec_for};
use crate::error::Result;

/// Destination for rendered audio blocks
pub trait OutputSink: Send {
    /// Sample rate the sink expects blocks at
    fn sample_rate(&self) -> u32;

    /// Consume one rendered block
    fn write(&mut self, block: &AudioBuffer) -> Result<()>;

    /// Flush and close; further writes are dropped
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }

    /// Total frames accepted so far
    fn frames_written(&self) -> u64;
}

// ============================================================================
// Null Sink
// ============================================================================

/// Discards audio, counting frames
#[derive(Debug, Clone)]
pub struct NullSink {
    sample_rate: u32,
    frames: u64,
}

impl NullSink {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            frames: 0,
        }
    }
}

impl OutputSink for NullSink {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write(&mut self, block: &AudioBuffer) -> Result<()> {
        self.frames += block.len() as u64;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames
    }
}

// ============================================================================
// Memory Sink
// ============================================================================

/// Read side of a [`MemorySink`]
#[derive(Debug, Clone)]
pub struct CapturedAudio {
    inner: Arc<Mutex<AudioBuffer>>,
}

impl CapturedAudio {
    /// Copy of everything captured so far
    pub fn snapshot(&self) -> AudioBuffer {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of frames captured so far
    pub fn frames(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

/// Appends every block to a shared stereo buffer
#[derive(Debug)]
pub struct MemorySink {
    inner: Arc<Mutex<AudioBuffer>>,
    sample_rate: u32,
}

impl MemorySink {
    /// Create a sink and the handle used to inspect what it received
    pub fn new(sample_rate: u32) -> (Self, CapturedAudio) {
        let inner = Arc::new(Mutex::new(AudioBuffer::with_sample_rate(
            0,
            ChannelLayout::Stereo,
            sample_rate,
        )));
        let captured = CapturedAudio {
            inner: Arc::clone(&inner),
        };
        (Self { inner, sample_rate }, captured)
    }
}

impl OutputSink for MemorySink {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write(&mut self, block: &AudioBuffer) -> Result<()> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .append(block);
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len() as u64
    }
}

// ============================================================================
// WAV File Sink
// ============================================================================

/// Streams rendered blocks into a 16-bit stereo WAV file
pub struct WavSink {
    writer: Option<WavWriter<BufWriter<File>>>,
    path: PathBuf,
    sample_rate: u32,
    frames: u64,
}

impl WavSink {
    /// Create (or truncate) the target file
    pub fn create(path: &Path, sample_rate: u32) -> Result<Self> {
        let writer = WavWriter::create(path, wav_spec_for(2, sample_rate))?;
        debug!("[SINK] Writing to {}", path.display());
        Ok(Self {
            writer: Some(writer),
            path: path.to_path_buf(),
            sample_rate,
            frames: 0,
        })
    }

    /// Target file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OutputSink for WavSink {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write(&mut self, block: &AudioBuffer) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };

        for i in 0..block.len() {
            let left = block.get_sample(0, i).unwrap_or(0.0);
            let right = block.get_sample(1, i).unwrap_or(left);
            writer.write_sample(to_i16(left))?;
            writer.write_sample(to_i16(right))?;
        }
        self.frames += block.len() as u64;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
            info!(
                "[SINK] Wrote {} frames to {}",
                self.frames,
                self.path.display()
            );
        }
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames
    }
}
