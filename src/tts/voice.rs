//! Voice selection for synthesized speech.
//!
//! A [`VoiceProfile`] is derived per utterance from the target language and
//! the session's [`VoicePreference`]; nothing about it is stored.

use crate::language;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Preferred voice gender.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    #[default]
    Female,
    Neutral,
}

impl Gender {
    /// Case-insensitive parse; anything other than male/neutral is female.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.eq_ignore_ascii_case("male") {
            Gender::Male
        } else if value.eq_ignore_ascii_case("neutral") {
            Gender::Neutral
        } else {
            Gender::Female
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Neutral => "neutral",
        };
        f.write_str(name)
    }
}

/// Session-level voice preference set from the control thread.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoicePreference {
    pub gender: Gender,
    /// Speaking style override; `None` keeps the voice's default style.
    pub style: Option<String>,
}

impl VoicePreference {
    pub fn new(gender: Gender, style: Option<&str>) -> Self {
        Self {
            gender,
            style: style
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        }
    }
}

/// Concrete voice for one utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceProfile {
    /// Synthesis voice identifier, e.g. `en-US-JennyNeural`.
    pub voice: String,
    pub style: String,
    pub role: Option<String>,
    pub gender: Gender,
    /// Resolved language the voice speaks.
    pub language: String,
}

struct VoiceSet {
    language: &'static str,
    male: &'static str,
    female: &'static str,
    neutral: &'static str,
    style: &'static str,
}

const VOICE_SETS: &[VoiceSet] = &[
    VoiceSet {
        language: "en",
        male: "en-US-GuyNeural",
        female: "en-US-JennyNeural",
        neutral: "en-US-AriaNeural",
        style: "Conversational",
    },
    VoiceSet {
        language: "de",
        male: "de-DE-ConradNeural",
        female: "de-DE-KatjaNeural",
        neutral: "de-DE-SeraphinaMultilingualNeural",
        style: "Broadcast",
    },
    VoiceSet {
        language: "fr",
        male: "fr-FR-HenriNeural",
        female: "fr-FR-DeniseNeural",
        neutral: "fr-FR-AlainNeural",
        style: "Elegant",
    },
    VoiceSet {
        language: "it",
        male: "it-IT-DiegoNeural",
        female: "it-IT-ElsaNeural",
        neutral: "it-IT-IsabellaNeural",
        style: "Warm",
    },
];

/// Pick a voice for `language` given the session preference.
///
/// Swiss German uses the German voices; languages without a voice set fall
/// back to English.
pub fn pick_voice(language: &str, preference: &VoicePreference) -> VoiceProfile {
    let resolved = language::resolve(language);
    let set = VOICE_SETS
        .iter()
        .find(|set| set.language == resolved)
        .unwrap_or(&VOICE_SETS[0]);

    let voice = match preference.gender {
        Gender::Male => set.male,
        Gender::Female => set.female,
        Gender::Neutral => set.neutral,
    };
    let style = preference
        .style
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(set.style);

    VoiceProfile {
        voice: voice.to_string(),
        style: style.to_string(),
        role: None,
        gender: preference.gender,
        language: set.language.to_string(),
    }
}
