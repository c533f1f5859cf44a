//! WAV file transport for the external inference tools
//!
//! Transcription input is written as mono PCM16; the synthesis tool's output
//! is read back as PCM16. Float WAVs are coerced sample-for-sample to i16,
//! which is format coercion only, never resampling.

use std::path::Path;

use crate::audio::AudioBuffer;
use crate::{Error, Result};

/// Write a buffer to `path` as a mono PCM16 WAV file
///
/// # Errors
///
/// Returns [`Error::Audio`] if the file cannot be created or written.
pub fn write_pcm16(path: &Path, audio: &AudioBuffer) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec).map_err(|e| Error::Audio(e.to_string()))?;
    for &sample in &audio.samples {
        writer
            .write_sample(sample)
            .map_err(|e| Error::Audio(e.to_string()))?;
    }
    writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;

    Ok(())
}

/// Read a WAV file back as PCM16 samples at the rate the file declares
///
/// # Errors
///
/// Returns [`Error::Audio`] if the file cannot be opened, is not 16-bit
/// integer or float format, or is truncated mid-sample.
#[allow(clippy::cast_possible_truncation)]
pub fn read_pcm16(path: &Path) -> Result<AudioBuffer> {
    let mut reader = hound::WavReader::open(path).map_err(|e| Error::Audio(e.to_string()))?;
    let spec = reader.spec();

    let samples: Vec<i16> = match spec.sample_format {
        hound::SampleFormat::Int => {
            if spec.bits_per_sample != 16 {
                return Err(Error::Audio(format!(
                    "expected 16-bit samples, got {}-bit",
                    spec.bits_per_sample
                )));
            }
            reader
                .samples::<i16>()
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::Audio(e.to_string()))?
        }
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            // f32 [-1.0, 1.0] to i16, clamped
            .map(|sample| sample.map(|v| (v * 32767.0).clamp(-32768.0, 32767.0) as i16))
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Audio(e.to_string()))?,
    };

    Ok(AudioBuffer::new(samples, spec.sample_rate))
}
