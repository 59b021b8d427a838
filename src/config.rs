use crate::defaults;
use crate::error::{LiveTransError, Result};
use crate::language;
use crate::tts::voice::{Gender, VoicePreference};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub pipeline: StreamConfig,
    pub languages: LanguageConfig,
    pub voice: VoiceConfig,
    pub recognition: SttConfig,
    pub translation: TranslationConfig,
}

/// Streaming and scheduling configuration (`[pipeline]`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamConfig {
    pub window_ms: u32,
    pub hop_ms: u32,
    pub energy_threshold: f32,
    pub input_capacity_ms: u32,
    pub output_capacity_ms: u32,
    pub block_frames: usize,
    pub max_blocks_per_iteration: usize,
    pub idle_sleep_ms: u64,
    pub tick_budget_ms: u64,
    pub stop_timeout_ms: u64,
    pub max_callback_frames: usize,
}

/// Session language configuration (`[languages]`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LanguageConfig {
    pub source: String,
    pub target: String,
    pub auto_detect: bool,
}

/// Voice preference (`[voice]`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VoiceConfig {
    pub gender: String,
    pub style: Option<String>,
}

/// Speech recognition configuration (`[recognition]`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SttConfig {
    pub model: String,
    pub threads: Option<usize>,
}

/// Translation backend selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationBackend {
    #[default]
    Passthrough,
    Google,
}

/// Translation configuration (`[translation]`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranslationConfig {
    pub backend: TranslationBackend,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            window_ms: defaults::WINDOW_MS,
            hop_ms: defaults::HOP_MS,
            energy_threshold: defaults::ENERGY_THRESHOLD,
            input_capacity_ms: defaults::INPUT_CAPACITY_MS,
            output_capacity_ms: defaults::OUTPUT_CAPACITY_MS,
            block_frames: defaults::BLOCK_FRAMES,
            max_blocks_per_iteration: defaults::MAX_BLOCKS_PER_ITERATION,
            idle_sleep_ms: defaults::IDLE_SLEEP_MS,
            tick_budget_ms: defaults::TICK_BUDGET_MS,
            stop_timeout_ms: defaults::STOP_TIMEOUT_MS,
            max_callback_frames: defaults::MAX_CALLBACK_FRAMES,
        }
    }
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            source: defaults::DEFAULT_SOURCE_LANGUAGE.to_string(),
            target: defaults::DEFAULT_TARGET_LANGUAGE.to_string(),
            auto_detect: false,
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            gender: Gender::default().to_string(),
            style: None,
        }
    }
}

impl VoiceConfig {
    pub fn preference(&self) -> VoicePreference {
        VoicePreference::new(Gender::parse(&self.gender), self.style.as_deref())
    }
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: defaults::DEFAULT_MODEL.to_string(),
            threads: None,
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            backend: TranslationBackend::default(),
            api_key: None,
            timeout_secs: defaults::TRANSLATION_TIMEOUT_SECS,
        }
    }
}

fn invalid(key: &str, message: &str) -> LiveTransError {
    LiveTransError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file is missing or contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LiveTransError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                LiveTransError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(LiveTransError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - LIVETRANS_MODEL → recognition.model
    /// - LIVETRANS_SOURCE_LANGUAGE → languages.source
    /// - LIVETRANS_TARGET_LANGUAGE → languages.target
    /// - LIVETRANS_GOOGLE_API_KEY → translation.api_key
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("LIVETRANS_MODEL")
            && !model.is_empty()
        {
            self.recognition.model = model;
        }

        if let Ok(source) = std::env::var("LIVETRANS_SOURCE_LANGUAGE")
            && !source.is_empty()
        {
            self.languages.source = source;
        }

        if let Ok(target) = std::env::var("LIVETRANS_TARGET_LANGUAGE")
            && !target.is_empty()
        {
            self.languages.target = target;
        }

        if let Ok(key) = std::env::var("LIVETRANS_GOOGLE_API_KEY")
            && !key.is_empty()
        {
            self.translation.api_key = Some(key);
        }

        self
    }

    /// Check values that would make the pipeline misbehave.
    pub fn validate(&self) -> Result<()> {
        let p = &self.pipeline;
        if p.window_ms == 0 {
            return Err(invalid("pipeline.window_ms", "must be positive"));
        }
        if p.hop_ms == 0 || p.hop_ms >= p.window_ms {
            return Err(invalid(
                "pipeline.hop_ms",
                "must be positive and smaller than window_ms",
            ));
        }
        if !p.energy_threshold.is_finite() || p.energy_threshold < 0.0 {
            return Err(invalid(
                "pipeline.energy_threshold",
                "must be a non-negative number",
            ));
        }
        if p.input_capacity_ms == 0 {
            return Err(invalid("pipeline.input_capacity_ms", "must be positive"));
        }
        if p.output_capacity_ms == 0 {
            return Err(invalid("pipeline.output_capacity_ms", "must be positive"));
        }
        if p.block_frames == 0 {
            return Err(invalid("pipeline.block_frames", "must be positive"));
        }
        if p.max_blocks_per_iteration == 0 {
            return Err(invalid(
                "pipeline.max_blocks_per_iteration",
                "must be positive",
            ));
        }
        if p.max_callback_frames == 0 {
            return Err(invalid("pipeline.max_callback_frames", "must be positive"));
        }
        if self.languages.target.trim().is_empty() || language::is_auto(&self.languages.target) {
            return Err(invalid(
                "languages.target",
                "must name a concrete language",
            ));
        }
        if self.recognition.model.trim().is_empty() {
            return Err(invalid("recognition.model", "must not be empty"));
        }
        if self.translation.timeout_secs == 0 {
            return Err(invalid("translation.timeout_secs", "must be positive"));
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/livetrans/config.toml on Linux
    #[cfg(feature = "cli")]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("livetrans")
            .join("config.toml")
    }

    /// Model path relative to the working directory, as configured.
    pub fn model_path(&self) -> PathBuf {
        PathBuf::from(&self.recognition.model)
    }
}
