//! livetrans - real-time speech translation
//!
//! Recognizes speech in a live audio stream, translates it and mixes a
//! synthesized voice back into the output without blocking the audio thread.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod language;
pub mod pipeline;
pub mod stt;
pub mod translate;
pub mod tts;

// Composition root for the offline host
#[cfg(feature = "cli")]
pub mod app;

// Capability traits (recognize → translate → synthesize)
pub use stt::recognizer::RecognitionBackend;
pub use translate::translator::Translator;
pub use tts::synthesizer::{ChunkSink, SpeechSynthesizer};

// Pipeline
pub use pipeline::orchestrator::{AudioPort, Pipeline, PipelineConfig, PipelineControl};
pub use pipeline::types::{LanguagePair, StreamFormat, SynthesizedAudio, TranscriptMessage};

// Error handling
pub use error::{LiveTransError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
