//! Speech recognition: backend seam, Whisper backend and the sliding-window
//! engine that schedules passes.

pub mod engine;
pub mod recognizer;
pub mod whisper;

pub use engine::{EngineState, RecognitionConfig, RecognitionEngine, TickReport};
pub use recognizer::{MockRecognizer, Recognition, RecognitionBackend};
pub use whisper::{WhisperOptions, WhisperRecognizer};
