//! Real-time speech translation pipeline.
//!
//! The audio thread talks to an [`AudioPort`] through two lock-free ring
//! buffers; a single worker thread runs recognition, translation and synthesis
//! and exchanges messages over the [`MessageBus`].

pub mod bus;
pub mod monitor;
pub mod orchestrator;
pub mod settings;
pub mod types;

pub use bus::MessageBus;
pub use monitor::{Monitor, PipelineStats, StatsSnapshot};
pub use orchestrator::{AudioPort, Pipeline, PipelineConfig, PipelineControl};
pub use settings::{SessionSettings, SettingsSnapshot};
pub use types::{LanguagePair, StreamFormat, SynthesizedAudio, TranscriptMessage};
