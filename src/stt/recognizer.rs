use crate::error::{LiveTransError, Result};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Output of one recognition pass over a window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recognition {
    /// Recognized text segments in order.
    pub segments: Vec<String>,
    /// Language detected by the backend, when it reports one.
    pub language: Option<String>,
}

impl Recognition {
    /// Segments joined with single spaces and trimmed.
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Trait for speech recognition backends.
///
/// This trait allows swapping implementations (real Whisper vs mock). A
/// backend is owned by the recognition worker while a session runs, so it
/// only needs to be `Send`.
pub trait RecognitionBackend: Send {
    /// Load a model from `path`, replacing any previously loaded one.
    fn load_model(&mut self, path: &Path) -> Result<()>;

    /// Whether a model is loaded and passes can run.
    fn is_loaded(&self) -> bool;

    /// Run one recognition pass.
    ///
    /// # Arguments
    /// * `samples` - Mono f32 audio at 16kHz
    /// * `language` - Pinned language code, or `None` to auto-detect
    fn run_on_window(&mut self, samples: &[f32], language: Option<&str>) -> Result<Recognition>;

    /// Name of the loaded model
    fn model_name(&self) -> &str;
}

impl<T: RecognitionBackend + ?Sized> RecognitionBackend for Box<T> {
    fn load_model(&mut self, path: &Path) -> Result<()> {
        (**self).load_model(path)
    }

    fn is_loaded(&self) -> bool {
        (**self).is_loaded()
    }

    fn run_on_window(&mut self, samples: &[f32], language: Option<&str>) -> Result<Recognition> {
        (**self).run_on_window(samples, language)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Mock recognizer for testing
#[derive(Debug, Clone)]
pub struct MockRecognizer {
    model_name: String,
    loaded: bool,
    response: String,
    language: Option<String>,
    fail_load: bool,
    fail_run: bool,
    delay: Option<Duration>,
    passes: Arc<AtomicUsize>,
    requested_languages: Arc<Mutex<Vec<Option<String>>>>,
}

impl Default for MockRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRecognizer {
    /// Create a new mock recognizer with default settings
    pub fn new() -> Self {
        Self {
            model_name: "mock".to_string(),
            loaded: false,
            response: "mock transcript".to_string(),
            language: None,
            fail_load: false,
            fail_run: false,
            delay: None,
            passes: Arc::new(AtomicUsize::new(0)),
            requested_languages: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Configure the text returned by every pass
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    /// Configure the language reported as detected
    pub fn with_language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }

    /// Configure the mock to fail on `load_model`
    pub fn with_load_failure(mut self) -> Self {
        self.fail_load = true;
        self
    }

    /// Configure the mock to fail every pass
    pub fn with_failure(mut self) -> Self {
        self.fail_run = true;
        self
    }

    /// Make every pass take at least `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Start out loaded, as if `load_model` had succeeded
    pub fn loaded(mut self) -> Self {
        self.loaded = true;
        self
    }

    /// Shared counter of passes run (survives moving the mock into a worker)
    pub fn pass_counter(&self) -> Arc<AtomicUsize> {
        self.passes.clone()
    }

    /// Shared log of the language argument of every pass
    pub fn requested_languages(&self) -> Arc<Mutex<Vec<Option<String>>>> {
        self.requested_languages.clone()
    }
}

impl RecognitionBackend for MockRecognizer {
    fn load_model(&mut self, path: &Path) -> Result<()> {
        if self.fail_load {
            self.loaded = false;
            return Err(LiveTransError::ModelLoad {
                message: format!("mock refused to load {}", path.display()),
            });
        }
        self.loaded = true;
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn run_on_window(&mut self, _samples: &[f32], language: Option<&str>) -> Result<Recognition> {
        self.passes.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut log) = self.requested_languages.lock() {
            log.push(language.map(str::to_string));
        }
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.fail_run {
            return Err(LiveTransError::Recognition {
                message: "mock recognition failure".to_string(),
            });
        }

        let detected = match language {
            Some(pinned) => Some(pinned.to_string()),
            None => self.language.clone(),
        };
        let segments = if self.response.is_empty() {
            Vec::new()
        } else {
            vec![self.response.clone()]
        };
        Ok(Recognition {
            segments,
            language: detected,
        })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
