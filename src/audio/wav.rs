//! WAV file input/output for the offline host.
//!
//! Reads any PCM or float WAV into interleaved `f32` frames at the file's own
//! rate and channel count. The pipeline does its own resampling, so nothing is
//! converted here beyond sample format.

use crate::error::{LiveTransError, Result};
use std::io::{Read, Seek, Write};
use std::path::Path;

/// Interleaved audio clip with its stream format.
#[derive(Debug, Clone, PartialEq)]
pub struct WavClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: usize,
}

impl WavClip {
    /// Number of whole frames in the clip.
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1)
    }

    /// Clip duration in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.frames() as u64 * 1000 / u64::from(self.sample_rate)
    }

    /// Read a clip from any reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut wav_reader = hound::WavReader::new(reader)?;
        let spec = wav_reader.spec();

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => wav_reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<_>, _>>()?,
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1u64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                wav_reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
        };

        if spec.channels == 0 {
            return Err(LiveTransError::StreamFormat {
                message: "WAV file declares zero channels".to_string(),
            });
        }

        Ok(Self {
            samples,
            sample_rate: spec.sample_rate,
            channels: usize::from(spec.channels),
        })
    }

    /// Read a clip from a file path.
    pub fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Write the clip as 16-bit PCM, clamping samples to [-1.0, 1.0].
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<()> {
        let channels = u16::try_from(self.channels).map_err(|_| LiveTransError::StreamFormat {
            message: format!("too many channels for WAV: {}", self.channels),
        })?;
        let spec = hound::WavSpec {
            channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut wav_writer = hound::WavWriter::new(writer, spec)?;
        for &sample in &self.samples {
            let value = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16;
            wav_writer.write_sample(value)?;
        }
        wav_writer.finalize()?;
        Ok(())
    }

    /// Write the clip to a file path.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_to(std::io::BufWriter::new(file))
    }
}
