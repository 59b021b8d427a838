//! Default configuration constants for livetrans.
//!
//! Shared by the TOML config, the runtime `PipelineConfig` and the CLI so that
//! every entry point agrees on the same tuning.

/// Fixed sample rate of the recognition and synthesis engines in Hz.
pub const TARGET_SAMPLE_RATE: u32 = 16000;

/// Host sample rate assumed before the first audio block arrives.
pub const HOST_SAMPLE_RATE: u32 = 48000;

/// Host channel count assumed when none is configured.
pub const HOST_CHANNELS: usize = 2;

/// Length of the sliding recognition window in milliseconds.
pub const WINDOW_MS: u32 = 2000;

/// New audio required between two recognition passes, in milliseconds.
///
/// Must stay below `WINDOW_MS` so consecutive windows overlap.
pub const HOP_MS: u32 = 1000;

/// Mean-square amplitude below which a window counts as silence.
///
/// 1e-4 corresponds to an RMS of 0.01 (about -40 dBFS).
pub const ENERGY_THRESHOLD: f32 = 1.0e-4;

/// Input ring buffer capacity in milliseconds of host audio.
pub const INPUT_CAPACITY_MS: u32 = 10_000;

/// Output ring buffer capacity in milliseconds of host audio.
pub const OUTPUT_CAPACITY_MS: u32 = 10_000;

/// Frames popped from the input ring per block (~10ms at 48kHz).
pub const BLOCK_FRAMES: usize = 480;

/// Upper bound on blocks drained from the input ring per worker iteration.
pub const MAX_BLOCKS_PER_ITERATION: usize = 8;

/// Worker sleep when an iteration found no input.
pub const IDLE_SLEEP_MS: u64 = 5;

/// Time budget handed to each recognition tick.
pub const TICK_BUDGET_MS: u64 = 20;

/// Bounded join timeout used by `Pipeline::stop`.
pub const STOP_TIMEOUT_MS: u64 = 1000;

/// Largest host callback the `AudioPort` scratch buffers are sized for.
pub const MAX_CALLBACK_FRAMES: usize = 4096;

/// Language value that triggers automatic language detection.
pub const AUTO_LANGUAGE: &str = "auto";

/// Default source language.
pub const DEFAULT_SOURCE_LANGUAGE: &str = AUTO_LANGUAGE;

/// Default target language.
pub const DEFAULT_TARGET_LANGUAGE: &str = "en";

/// Default Whisper model path.
pub const DEFAULT_MODEL: &str = "models/ggml-base.bin";

/// Default timeout for network translation requests.
pub const TRANSLATION_TIMEOUT_SECS: u64 = 10;

/// Upper bound on the debug log kept between two UI drains.
pub const DEBUG_LOG_MAX_BYTES: usize = 64 * 1024;

/// Convert a duration in milliseconds to a sample count at `rate`.
pub fn ms_to_samples(ms: u32, rate: u32) -> usize {
    (u64::from(ms) * u64::from(rate) / 1000) as usize
}

/// Report the GPU backend compiled into this build.
pub fn gpu_backend() -> &'static str {
    if cfg!(feature = "cuda") {
        "CUDA"
    } else if cfg!(feature = "vulkan") {
        "Vulkan"
    } else {
        "CPU"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hop_is_shorter_than_window() {
        assert!(HOP_MS < WINDOW_MS);
    }

    #[test]
    fn ms_to_samples_at_target_rate() {
        assert_eq!(ms_to_samples(WINDOW_MS, TARGET_SAMPLE_RATE), 32000);
        assert_eq!(ms_to_samples(10, 48000), 480);
        assert_eq!(ms_to_samples(0, 48000), 0);
    }

    #[test]
    fn gpu_backend_matches_compiled_feature() {
        let expected = if cfg!(feature = "cuda") {
            "CUDA"
        } else if cfg!(feature = "vulkan") {
            "Vulkan"
        } else {
            "CPU"
        };
        assert_eq!(gpu_backend(), expected);
    }
}
