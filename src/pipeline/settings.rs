//! Session settings written by the control thread and read by the worker.
//!
//! Each field is independently guarded. The worker takes one snapshot per
//! loop iteration, so a change applies from the next utterance on and is
//! never seen half-written.

use crate::pipeline::types::LanguagePair;
use crate::tts::voice::VoicePreference;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// Values the worker reads for one iteration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsSnapshot {
    pub languages: LanguagePair,
    pub voice: VoicePreference,
    pub auto_detect: bool,
}

impl SettingsSnapshot {
    /// Language to pin recognition to; `None` when auto-detecting.
    pub fn recognition_language(&self) -> Option<String> {
        if self.auto_detect {
            None
        } else {
            self.languages.recognition_language()
        }
    }
}

/// Shared, live-updatable session settings.
#[derive(Debug, Clone, Default)]
pub struct SessionSettings {
    languages: Arc<RwLock<LanguagePair>>,
    voice: Arc<RwLock<VoicePreference>>,
    auto_detect: Arc<AtomicBool>,
}

impl SessionSettings {
    pub fn new(languages: LanguagePair, voice: VoicePreference, auto_detect: bool) -> Self {
        Self {
            languages: Arc::new(RwLock::new(languages)),
            voice: Arc::new(RwLock::new(voice)),
            auto_detect: Arc::new(AtomicBool::new(auto_detect)),
        }
    }

    pub fn set_languages(&self, source: &str, target: &str) {
        let pair = LanguagePair::new(source, target);
        match self.languages.write() {
            Ok(mut guard) => *guard = pair,
            Err(poisoned) => *poisoned.into_inner() = pair,
        }
    }

    pub fn set_auto_detect(&self, enabled: bool) {
        self.auto_detect.store(enabled, Ordering::Relaxed);
    }

    pub fn set_voice_preference(&self, preference: VoicePreference) {
        match self.voice.write() {
            Ok(mut guard) => *guard = preference,
            Err(poisoned) => *poisoned.into_inner() = preference,
        }
    }

    pub fn languages(&self) -> LanguagePair {
        match self.languages.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn voice_preference(&self) -> VoicePreference {
        match self.voice.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn auto_detect(&self) -> bool {
        self.auto_detect.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> SettingsSnapshot {
        SettingsSnapshot {
            languages: self.languages(),
            voice: self.voice_preference(),
            auto_detect: self.auto_detect(),
        }
    }
}
