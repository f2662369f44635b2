//! WAV encode/decode helpers built on `hound`.
//!
//! The recording worker persists accumulated frames as 16-bit PCM mono;
//! the speech engine reads them back as normalised `f32`.

use std::path::Path;

use thiserror::Error;

use super::convert::downmix_to_mono;

/// Errors from the WAV read/write paths.
#[derive(Debug, Error)]
pub enum WavError {
    #[error("WAV I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV codec error: {0}")]
    Codec(#[from] hound::Error),

    #[error("unsupported WAV sample format ({bits} bit)")]
    UnsupportedFormat { bits: u16 },
}

/// Write mono `f32` samples in `[-1.0, 1.0]` as a 16-bit PCM WAV file,
/// creating parent directories as needed.
pub fn write_wav_mono(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), WavError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer.write_sample(value)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Read a WAV file as mono `f32` in `[-1.0, 1.0]`, downmixing interleaved
/// channels.  Returns the samples and the file's sample rate.
///
/// Supports 16-bit integer and 32-bit float files.
pub fn read_wav_mono(path: &Path) -> Result<(Vec<f32>, u32), WavError> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
            .collect::<Result<_, _>>()?,
        (hound::SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()?,
        (_, bits) => return Err(WavError::UnsupportedFormat { bits }),
    };

    Ok((downmix_to_mono(&interleaved, spec.channels), spec.sample_rate))
}
