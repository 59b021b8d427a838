//! Speech synthesis: backend seam, voice selection and the tone voice.

pub mod synthesizer;
pub mod tone;
pub mod voice;

pub use synthesizer::{ChunkSink, MockSynthesizer, SpeechSynthesizer};
pub use tone::ToneSynthesizer;
pub use voice::{Gender, VoicePreference, VoiceProfile, pick_voice};
