//! Error types for livetrans.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LiveTransError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Recognition errors
    #[error("Recognition model not found at {path}")]
    ModelNotFound { path: String },

    #[error("Failed to load recognition model: {message}")]
    ModelLoad { message: String },

    #[error("Recognition failed: {message}")]
    Recognition { message: String },

    // Translation / synthesis errors
    #[error("Translation failed: {message}")]
    Translation { message: String },

    #[error("Speech synthesis failed: {message}")]
    Synthesis { message: String },

    // Pipeline errors
    #[error("Invalid stream format: {message}")]
    StreamFormat { message: String },

    #[error("Pipeline is already running")]
    AlreadyRunning,

    // Audio file errors
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, LiveTransError>;
