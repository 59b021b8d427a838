//! Data types that flow through the translation pipeline.

use crate::defaults;
use crate::error::{LiveTransError, Result};
use crate::language;
use serde::{Deserialize, Serialize};

/// Recognized text for one recognition window.
///
/// Immutable once enqueued on the message bus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptMessage {
    /// Recognized text (trimmed, never empty).
    pub text: String,
    /// Every window firing is reported as final; windows overlap, so
    /// consecutive messages may repeat text.
    pub is_final: bool,
    /// Pinned source language, the recognizer's detected language, or "auto".
    pub language: String,
    /// Window start in seconds of session stream time.
    pub start_secs: f64,
    /// Window end in seconds of session stream time.
    pub end_secs: f64,
}

impl TranscriptMessage {
    /// Creates a final transcript without timing.
    pub fn new(text: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
            language: language.into(),
            start_secs: 0.0,
            end_secs: 0.0,
        }
    }

    /// Attach the window position in stream time.
    pub fn with_span(mut self, start_secs: f64, end_secs: f64) -> Self {
        self.start_secs = start_secs;
        self.end_secs = end_secs;
        self
    }
}

/// One chunk of synthesized speech, 16kHz mono.
///
/// An utterance may span several chunks; the last one has `is_final` set and
/// may be empty (an empty final chunk after no audio signals failure).
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedAudio {
    /// Sequence number of the utterance this chunk belongs to.
    pub utterance: u64,
    /// PCM samples at 16kHz mono.
    pub pcm_16k: Vec<f32>,
    /// End-of-utterance flag.
    pub is_final: bool,
}

/// Source and target language of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguagePair {
    /// Source language code, or "auto" to let the recognizer detect it.
    pub source: String,
    /// Target language code.
    pub target: String,
}

impl Default for LanguagePair {
    fn default() -> Self {
        Self {
            source: defaults::DEFAULT_SOURCE_LANGUAGE.to_string(),
            target: defaults::DEFAULT_TARGET_LANGUAGE.to_string(),
        }
    }
}

impl LanguagePair {
    /// Creates a pair with both codes normalized.
    pub fn new(source: &str, target: &str) -> Self {
        Self {
            source: language::normalize(source),
            target: language::normalize(target),
        }
    }

    /// Language to pin the recognizer to, or `None` for auto-detection.
    pub fn recognition_language(&self) -> Option<String> {
        if language::is_auto(&self.source) {
            None
        } else {
            Some(language::resolve(&self.source))
        }
    }
}

/// Host audio stream format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    /// Host sample rate in Hz.
    pub sample_rate: u32,
    /// Interleaved channels per frame.
    pub channels: usize,
}

impl Default for StreamFormat {
    fn default() -> Self {
        Self {
            sample_rate: defaults::HOST_SAMPLE_RATE,
            channels: defaults::HOST_CHANNELS,
        }
    }
}

impl StreamFormat {
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Rejects zero rates and channel counts.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(LiveTransError::StreamFormat {
                message: "sample rate must be positive".to_string(),
            });
        }
        if self.channels == 0 {
            return Err(LiveTransError::StreamFormat {
                message: "channel count must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Frames covering `ms` milliseconds at this rate.
    pub fn frames_for_ms(&self, ms: u32) -> usize {
        defaults::ms_to_samples(ms, self.sample_rate)
    }
}
