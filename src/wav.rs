use std::path::Path;

/// Channel count of every file the encoder writes.
pub const CHANNELS: u16 = 1;
pub const BITS_PER_SAMPLE: u16 = 16;

#[derive(thiserror::Error, Debug)]
pub enum WavError {
    #[error("WAV encoding failed: {0}")]
    Hound(#[from] hound::Error),
}

/// Convert one float sample to 16-bit PCM: clip to [-1, 1], scale by 32767,
/// truncate toward zero.
pub fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Write mono float samples as a canonical 16-bit PCM RIFF/WAVE file.
///
/// The header is the classic 44-byte layout: `RIFF`, chunk size
/// (36 + data length), `WAVE`, a 16-byte `fmt ` chunk with format code 1,
/// then the `data` chunk holding `2 * samples.len()` bytes. The file handle
/// is closed on every return path.
pub fn write_pcm16(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), WavError> {
    let spec = hound::WavSpec {
        channels: CHANNELS,
        sample_rate,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(to_pcm16(sample))?;
    }
    writer.finalize()?;
    Ok(())
}
