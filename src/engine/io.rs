//! Media decoding and WAV encoding for Veil
//!
//! Track blobs arrive as opaque bytes. They are probed and decoded in
//! memory with symphonia; anything that does not yield audio frames is
//! `Unreadable`. WAV encoding (hound) backs the file sink and fixtures.

use std::io::Cursor;
use std::sync::Arc;

use hound::{SampleFormat, WavSpec, WavWriter};
use log::{debug, warn};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::engine::buffer::{AudioBuffer, ChannelLayout};
use crate::error::{Result, VeilError};

/// Decode a media blob into a planar buffer at its native sample rate
///
/// Mono stays mono; anything with two or more channels keeps the first two.
///
/// # Errors
/// * `Unreadable` - the bytes are not a recognised container, carry no
///   audio track, or decode to zero frames
pub fn decode_bytes(data: Arc<[u8]>) -> Result<AudioBuffer> {
    if data.is_empty() {
        return Err(VeilError::unreadable("empty media blob"));
    }

    let mss = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| VeilError::Unreadable {
            reason: format!("Failed to probe media format: {}", e),
            source: Some(Box::new(e)),
        })?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| VeilError::unreadable("No audio track found"))?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| VeilError::Unreadable {
            reason: format!("Failed to create decoder: {}", e),
            source: Some(Box::new(e)),
        })?;

    let mut interleaved: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                if interleaved.is_empty() {
                    return Err(VeilError::Unreadable {
                        reason: format!("Failed to read packet: {}", e),
                        source: Some(Box::new(e)),
                    });
                }
                warn!("[DECODE] Stopping at unreadable packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count();

                let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                sample_buf.copy_interleaved_ref(decoded);
                interleaved.extend_from_slice(sample_buf.samples());
            }
            Err(SymphoniaError::DecodeError(e)) => {
                debug!("[DECODE] Skipping corrupt packet: {}", e);
                continue;
            }
            Err(e) => {
                return Err(VeilError::Unreadable {
                    reason: format!("Decode failed: {}", e),
                    source: Some(Box::new(e)),
                });
            }
        }
    }

    if interleaved.is_empty() || channels == 0 || sample_rate == 0 {
        return Err(VeilError::unreadable("Media contains no audio frames"));
    }

    let buffer = if channels <= 2 {
        let layout = ChannelLayout::from_count(channels).unwrap_or_default();
        AudioBuffer::from_interleaved(&interleaved, layout, sample_rate)?
    } else {
        let stereo: Vec<f32> = interleaved
            .chunks_exact(channels)
            .flat_map(|frame| [frame[0], frame[1]])
            .collect();
        AudioBuffer::from_interleaved(&stereo, ChannelLayout::Stereo, sample_rate)?
    };

    debug!(
        "[DECODE] {} frames, {} ch, {} Hz",
        buffer.len(),
        buffer.channels(),
        buffer.sample_rate
    );

    Ok(buffer)
}

/// Spec for 16-bit integer WAV output at the buffer's rate and width
pub fn wav_spec_for(channels: u16, sample_rate: u32) -> WavSpec {
    WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Scale a float sample to 16-bit PCM
#[inline]
pub fn to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}

/// Encode a buffer as an in-memory 16-bit WAV file
pub fn encode_wav_bytes(buffer: &AudioBuffer) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    {
        let spec = wav_spec_for(buffer.channels() as u16, buffer.sample_rate);
        let mut writer = WavWriter::new(Cursor::new(&mut bytes), spec)?;
        for sample in buffer.to_interleaved() {
            writer.write_sample(to_i16(sample))?;
        }
        writer.finalize()?;
    }
    Ok(bytes)
}

/// Generate a mono sine test tone
pub fn generate_test_tone(frequency: f32, duration_secs: f32, sample_rate: u32) -> AudioBuffer {
    let num_samples = (duration_secs * sample_rate as f32) as usize;
    let mut buffer = AudioBuffer::with_sample_rate(num_samples, ChannelLayout::Mono, sample_rate);

    let angular_freq = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;

    for (i, sample) in buffer.samples[0].iter_mut().enumerate() {
        *sample = (angular_freq * i as f32).sin();
    }

    buffer
}
