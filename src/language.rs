//! Language table and code normalization.
//!
//! Codes are ISO-639-style strings as understood by Whisper and the
//! translation backend. Swiss German (`gsw`) has no recognition model or
//! translation target of its own and resolves to German everywhere.

use crate::defaults::AUTO_LANGUAGE;
use serde::Serialize;

/// Entry in the language table shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Language {
    pub code: &'static str,
    pub label: &'static str,
}

/// Languages offered by the control surface, in display order.
pub const LANGUAGES: &[Language] = &[
    Language {
        code: AUTO_LANGUAGE,
        label: "Auto Detect",
    },
    Language {
        code: "en",
        label: "English",
    },
    Language {
        code: "de",
        label: "German",
    },
    Language {
        code: "gsw",
        label: "Swiss German",
    },
    Language {
        code: "fr",
        label: "French",
    },
    Language {
        code: "it",
        label: "Italian",
    },
];

/// Look up a table entry by code (case-insensitive).
pub fn find(code: &str) -> Option<&'static Language> {
    let code = code.trim();
    LANGUAGES.iter().find(|l| l.code.eq_ignore_ascii_case(code))
}

/// Canonical form of a user-supplied language: trimmed, lowercased, with
/// English names mapped to codes. Empty input means auto-detect.
pub fn normalize(code: &str) -> String {
    let lower = code.trim().to_lowercase();
    if lower.is_empty() {
        return AUTO_LANGUAGE.to_string();
    }
    if lower.contains("english") {
        return "en".to_string();
    }
    if lower.contains("swiss") {
        return "gsw".to_string();
    }
    if lower.contains("german") {
        return "de".to_string();
    }
    if lower.contains("french") {
        return "fr".to_string();
    }
    if lower.contains("italian") {
        return "it".to_string();
    }
    lower
}

/// Code the recognition, translation and synthesis backends should use.
///
/// `gsw` maps to `de`; everything else is its normalized form.
pub fn resolve(code: &str) -> String {
    let normalized = normalize(code);
    if normalized == "gsw" {
        "de".to_string()
    } else {
        normalized
    }
}

/// Whether `code` asks for automatic detection.
pub fn is_auto(code: &str) -> bool {
    normalize(code) == AUTO_LANGUAGE
}

/// Whether two languages resolve to the same concrete language.
///
/// `auto` never matches: an undetected source cannot be proven equal.
pub fn same_language(a: &str, b: &str) -> bool {
    let a = resolve(a);
    let b = resolve(b);
    a != AUTO_LANGUAGE && a == b
}
