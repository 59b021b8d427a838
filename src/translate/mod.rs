//! Translation backends.

#[cfg(feature = "google-translate")]
pub mod google;
pub mod translator;

#[cfg(feature = "google-translate")]
pub use google::GoogleTranslator;
pub use translator::{
    MockTranslator, PassThroughTranslator, TranslationRequest, Translator, translate_or_original,
};
