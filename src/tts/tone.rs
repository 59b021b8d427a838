//! Placeholder voice: a short enveloped tone per utterance.
//!
//! Lets the whole pipeline run (and be heard) without a synthesis service.
//! Duration follows text length and pitch follows the voice profile, so
//! different languages and voices are audibly distinct.

use crate::defaults::TARGET_SAMPLE_RATE;
use crate::error::Result;
use crate::tts::synthesizer::{ChunkSink, SpeechSynthesizer};
use crate::tts::voice::{Gender, VoiceProfile};
use std::f32::consts::PI;

const SECONDS_PER_CHAR: f32 = 0.02;
const MIN_SECONDS: f32 = 0.2;
const MAX_SECONDS: f32 = 1.5;
const AMPLITUDE: f32 = 0.2;
const ATTACK_SECONDS: f32 = 0.01;
const RELEASE_SECONDS: f32 = 0.05;
const MALE_PITCH_DROP_HZ: f32 = 40.0;

/// Tone synthesizer emitting 16kHz mono chunks.
#[derive(Debug, Clone, Copy)]
pub struct ToneSynthesizer {
    chunk_samples: usize,
}

impl Default for ToneSynthesizer {
    fn default() -> Self {
        // 100 ms
        Self::new(TARGET_SAMPLE_RATE as usize / 10)
    }
}

impl ToneSynthesizer {
    pub fn new(chunk_samples: usize) -> Self {
        Self {
            chunk_samples: chunk_samples.max(1),
        }
    }

    /// Tone frequency for a voice.
    pub fn pitch_hz(voice: &VoiceProfile) -> f32 {
        let base = match voice.style.to_ascii_lowercase().as_str() {
            "broadcast" => 190.0,
            "elegant" => 260.0,
            "warm" => 200.0,
            _ => 220.0,
        };
        if voice.gender == Gender::Male {
            base - MALE_PITCH_DROP_HZ
        } else {
            base
        }
    }

    /// Utterance length in samples for `text`.
    pub fn duration_samples(text: &str) -> usize {
        let seconds = (text.chars().count() as f32 * SECONDS_PER_CHAR).clamp(MIN_SECONDS, MAX_SECONDS);
        (seconds * TARGET_SAMPLE_RATE as f32).round() as usize
    }

    /// Render the whole utterance.
    pub fn render(text: &str, voice: &VoiceProfile) -> Vec<f32> {
        let rate = TARGET_SAMPLE_RATE as f32;
        let len = Self::duration_samples(text);
        let freq = Self::pitch_hz(voice);
        let attack = ATTACK_SECONDS * rate;
        let release = RELEASE_SECONDS * rate;

        (0..len)
            .map(|i| {
                let env = (i as f32 / attack).min(1.0) * ((len - i) as f32 / release).min(1.0);
                AMPLITUDE * env * (2.0 * PI * freq * i as f32 / rate).sin()
            })
            .collect()
    }
}

impl SpeechSynthesizer for ToneSynthesizer {
    fn synthesize(&self, text: &str, voice: &VoiceProfile, sink: &ChunkSink) -> Result<()> {
        if text.trim().is_empty() {
            sink.send(Vec::new(), true);
            return Ok(());
        }

        let pcm = Self::render(text, voice);
        let count = pcm.len().div_ceil(self.chunk_samples);
        for (i, chunk) in pcm.chunks(self.chunk_samples).enumerate() {
            sink.send(chunk.to_vec(), i + 1 == count);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "tone"
    }
}
