use crate::error::{LiveTransError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One translation call as seen by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub text: String,
    /// Source language code, or "auto".
    pub source: String,
    pub target: String,
}

/// Trait for translation backends.
///
/// Called synchronously from the pipeline worker; may block on the network.
/// Backends report failures as errors and the pipeline falls back to the
/// original text, so a failed call never stops a session.
pub trait Translator: Send + Sync {
    /// Translate `text` from `source` (code or "auto") into `target`.
    fn translate(&self, text: &str, source: &str, target: &str) -> Result<String>;

    /// Backend name for logs.
    fn name(&self) -> &str;
}

impl<T: Translator + ?Sized> Translator for Arc<T> {
    fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        (**self).translate(text, source, target)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: Translator + ?Sized> Translator for Box<T> {
    fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        (**self).translate(text, source, target)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Translation with the fail-open policy: any error yields `text` unchanged.
pub fn translate_or_original(
    translator: &dyn Translator,
    text: &str,
    source: &str,
    target: &str,
) -> String {
    match translator.translate(text, source, target) {
        Ok(translated) if !translated.trim().is_empty() => translated,
        Ok(_) => text.to_string(),
        Err(e) => {
            tracing::warn!(
                backend = translator.name(),
                error = %e,
                "translation failed; using original text"
            );
            text.to_string()
        }
    }
}

/// Returns the input unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughTranslator;

impl Translator for PassThroughTranslator {
    fn translate(&self, text: &str, _source: &str, _target: &str) -> Result<String> {
        Ok(text.to_string())
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}

/// Mock translator for testing
#[derive(Debug, Clone, Default)]
pub struct MockTranslator {
    prefix: Option<String>,
    should_fail: bool,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<TranslationRequest>>>,
    call_count: Arc<AtomicUsize>,
}

impl MockTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix translated text with `[prefix]`, e.g. `[en] hallo`
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = Some(prefix.to_string());
        self
    }

    /// Configure the mock to fail every call
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Make every call take at least `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Shared log of every request (survives moving the mock into a pipeline)
    pub fn calls(&self) -> Arc<Mutex<Vec<TranslationRequest>>> {
        self.calls.clone()
    }

    /// Shared call counter
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.call_count.clone()
    }
}

impl Translator for MockTranslator {
    fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(TranslationRequest {
                text: text.to_string(),
                source: source.to_string(),
                target: target.to_string(),
            });
        }
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.should_fail {
            return Err(LiveTransError::Translation {
                message: "mock translation failure".to_string(),
            });
        }
        Ok(match &self.prefix {
            Some(prefix) => format!("[{}] {}", prefix, text),
            None => text.to_string(),
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}
