//! Whisper-based recognition backend.
//!
//! # Feature Gate
//!
//! Real inference requires the `whisper` feature (and cmake to build
//! whisper.cpp):
//!
//! ```bash
//! cargo build --features whisper
//! ```
//!
//! Without it, [`WhisperRecognizer`] still reports missing model files, but
//! loading an existing one fails with a message saying how to enable it.

use crate::error::{LiveTransError, Result};
use crate::stt::recognizer::{Recognition, RecognitionBackend};
use std::path::Path;

#[cfg(feature = "whisper")]
use std::sync::Once;
#[cfg(feature = "whisper")]
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, install_logging_hooks,
};

#[cfg(feature = "whisper")]
static LOGGING_HOOKS_INSTALLED: Once = Once::new();

/// Inference options for [`WhisperRecognizer`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WhisperOptions {
    /// Number of threads for inference (None = whisper.cpp default)
    pub threads: Option<usize>,
}

/// Model file stem, used as the display name.
fn model_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string()
}

/// Whisper recognition backend.
///
/// Owned by the recognition worker; a fresh decoder state is created per
/// window so no context leaks between passes.
#[cfg(feature = "whisper")]
pub struct WhisperRecognizer {
    context: Option<WhisperContext>,
    options: WhisperOptions,
    model_name: String,
}

#[cfg(feature = "whisper")]
impl std::fmt::Debug for WhisperRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperRecognizer")
            .field("options", &self.options)
            .field("model_name", &self.model_name)
            .field("loaded", &self.context.is_some())
            .finish()
    }
}

/// Whisper recognizer placeholder (without whisper feature).
#[cfg(not(feature = "whisper"))]
#[derive(Debug)]
pub struct WhisperRecognizer {
    options: WhisperOptions,
    model_name: String,
}

impl Default for WhisperRecognizer {
    fn default() -> Self {
        Self::new(WhisperOptions::default())
    }
}

#[cfg(feature = "whisper")]
impl WhisperRecognizer {
    /// Create an unloaded recognizer.
    pub fn new(options: WhisperOptions) -> Self {
        Self {
            context: None,
            options,
            model_name: String::new(),
        }
    }

    pub fn options(&self) -> &WhisperOptions {
        &self.options
    }
}

#[cfg(not(feature = "whisper"))]
impl WhisperRecognizer {
    /// Create an unloaded recognizer.
    pub fn new(options: WhisperOptions) -> Self {
        Self {
            options,
            model_name: String::new(),
        }
    }

    pub fn options(&self) -> &WhisperOptions {
        &self.options
    }
}

#[cfg(feature = "whisper")]
impl RecognitionBackend for WhisperRecognizer {
    fn load_model(&mut self, path: &Path) -> Result<()> {
        // Route whisper.cpp output through its log hooks instead of stderr
        LOGGING_HOOKS_INSTALLED.call_once(|| {
            install_logging_hooks();
        });

        if !path.exists() {
            return Err(LiveTransError::ModelNotFound {
                path: path.to_string_lossy().to_string(),
            });
        }

        let mut context_params = WhisperContextParameters::default();
        context_params.flash_attn(true);
        let path_str = path.to_str().ok_or_else(|| LiveTransError::ModelLoad {
            message: "Invalid UTF-8 in model path".to_string(),
        })?;
        let context = WhisperContext::new_with_params(path_str, context_params).map_err(|e| {
            LiveTransError::ModelLoad {
                message: format!("Failed to load Whisper model: {}", e),
            }
        })?;

        self.context = Some(context);
        self.model_name = model_stem(path);
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.context.is_some()
    }

    fn run_on_window(&mut self, samples: &[f32], language: Option<&str>) -> Result<Recognition> {
        let context = self
            .context
            .as_ref()
            .ok_or_else(|| LiveTransError::Recognition {
                message: "No Whisper model loaded".to_string(),
            })?;

        let mut state = context
            .create_state()
            .map_err(|e| LiveTransError::Recognition {
                message: format!("Failed to create Whisper state: {}", e),
            })?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(language);
        if let Some(threads) = self.options.threads {
            params.set_n_threads(threads as i32);
        }

        // One window is one utterance; no timestamps or cross-window context
        params.set_single_segment(true);
        params.set_no_timestamps(true);
        params.set_no_context(true);
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, samples)
            .map_err(|e| LiveTransError::Recognition {
                message: format!("Whisper inference failed: {}", e),
            })?;

        let detected = if language.is_none() {
            let lang_id = state.full_lang_id_from_state();
            whisper_rs::get_lang_str(lang_id).map(str::to_string)
        } else {
            None
        };

        let segments = state.as_iter().map(|segment| segment.to_string()).collect();

        Ok(Recognition {
            segments,
            language: detected,
        })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(not(feature = "whisper"))]
const WHISPER_DISABLED: &str = concat!(
    "Whisper feature not enabled. This binary was built without speech recognition.\n",
    "To fix: cargo build --release --features whisper\n",
    "If build fails with cmake errors, install: sudo apt install cmake"
);

#[cfg(not(feature = "whisper"))]
impl RecognitionBackend for WhisperRecognizer {
    fn load_model(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(LiveTransError::ModelNotFound {
                path: path.to_string_lossy().to_string(),
            });
        }
        self.model_name = model_stem(path);
        Err(LiveTransError::ModelLoad {
            message: WHISPER_DISABLED.to_string(),
        })
    }

    fn is_loaded(&self) -> bool {
        false
    }

    fn run_on_window(&mut self, _samples: &[f32], _language: Option<&str>) -> Result<Recognition> {
        Err(LiveTransError::Recognition {
            message: WHISPER_DISABLED.to_string(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
