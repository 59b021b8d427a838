//! Sliding-window recognition scheduler.
//!
//! The engine is owned by the recognition worker. Host audio is downmixed,
//! resampled to 16kHz and staged by [`RecognitionEngine::push_audio`];
//! [`RecognitionEngine::tick`] moves staged samples into a fixed-length window
//! and fires once per hop:
//!
//! ```text
//!  Idle ──load──▶ Ready ──push──▶ Accumulating ──window full──▶ Deciding
//!                                                                 │   │
//!                         Listening ◀── below energy threshold ───┘   │
//!                            ▲  │                                     ▼
//!                            │  └──── hop samples staged ──▶ Deciding  Transcribing
//!                            └────────────────────────────────────────┘
//! ```
//!
//! Windows overlap (hop < window), so speech that straddles a hop boundary is
//! seen whole by at least one pass. Each firing is reported as an independent
//! final transcript; no deduplication happens across windows.

use crate::defaults;
use crate::error::Result;
use crate::audio::resample::StreamResampler;
use crate::pipeline::types::TranscriptMessage;
use crate::stt::recognizer::RecognitionBackend;
use std::collections::VecDeque;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Window geometry and gating for the recognition engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecognitionConfig {
    /// Window length in 16kHz samples.
    pub window_samples: usize,
    /// New samples between firings.
    pub hop_samples: usize,
    /// Mean-square amplitude below which a window is skipped as silence.
    pub energy_threshold: f32,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self::from_ms(
            defaults::WINDOW_MS,
            defaults::HOP_MS,
            defaults::ENERGY_THRESHOLD,
        )
    }
}

impl RecognitionConfig {
    /// Build from durations; the window is at least one sample and the hop is
    /// clamped to `1..=window`.
    pub fn from_ms(window_ms: u32, hop_ms: u32, energy_threshold: f32) -> Self {
        let window_samples = defaults::ms_to_samples(window_ms, defaults::TARGET_SAMPLE_RATE).max(1);
        let hop_samples = defaults::ms_to_samples(hop_ms, defaults::TARGET_SAMPLE_RATE)
            .clamp(1, window_samples);
        Self {
            window_samples,
            hop_samples,
            energy_threshold: energy_threshold.max(0.0),
        }
    }
}

/// Scheduler state, advanced only by the worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No model loaded; submitted audio is dropped.
    Idle,
    /// Model loaded, window empty.
    Ready,
    /// Receiving audio, window not yet full.
    Accumulating,
    /// Window full, waiting for the next hop.
    Listening,
    /// Hop reached, evaluating the energy gate.
    Deciding,
    /// Recognition pass in flight.
    Transcribing,
}

/// What one call to [`RecognitionEngine::tick`] did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Hop firings evaluated.
    pub firings: usize,
    /// Recognition passes run (firings that passed the energy gate).
    pub passes: usize,
    /// Firings skipped as silence.
    pub skipped_silent: usize,
    /// Passes that returned a backend error.
    pub failed: usize,
    /// Non-empty transcripts produced, in window order.
    pub transcripts: Vec<TranscriptMessage>,
}

/// Mean of squared samples; zero for an empty slice.
pub fn mean_square(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    (sum / samples.len() as f64) as f32
}

/// Average interleaved frames into mono, appending to `out`.
fn downmix_into(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    if channels <= 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    let scale = 1.0 / channels as f32;
    out.extend(
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale),
    );
}

/// Sliding-window recognition engine.
pub struct RecognitionEngine {
    backend: Box<dyn RecognitionBackend>,
    config: RecognitionConfig,
    state: EngineState,
    language: Option<String>,
    resampler: StreamResampler,
    mono: Vec<f32>,
    resampled: Vec<f32>,
    staging: VecDeque<f32>,
    window: Vec<f32>,
    /// Samples moved into the window since the session started.
    consumed: u64,
}

impl RecognitionEngine {
    /// Creates an engine around `backend`; Ready if it already has a model.
    pub fn new(backend: Box<dyn RecognitionBackend>, config: RecognitionConfig) -> Self {
        let state = if backend.is_loaded() {
            EngineState::Ready
        } else {
            EngineState::Idle
        };
        Self {
            backend,
            config,
            state,
            language: None,
            resampler: StreamResampler::new(),
            mono: Vec::new(),
            resampled: Vec::new(),
            staging: VecDeque::new(),
            window: Vec::with_capacity(config.window_samples),
            consumed: 0,
        }
    }

    /// Load a model. On failure the engine is left Idle and drops audio.
    pub fn load_model(&mut self, path: &Path) -> Result<()> {
        match self.backend.load_model(path) {
            Ok(()) => {
                debug!(model = %path.display(), "recognition model loaded");
                self.reset_stream();
                Ok(())
            }
            Err(e) => {
                warn!(model = %path.display(), error = %e, "recognition model failed to load");
                self.clear_audio();
                self.state = EngineState::Idle;
                Err(e)
            }
        }
    }

    /// Pin the recognizer to a language, or `None` to auto-detect.
    pub fn set_language(&mut self, language: Option<&str>) {
        if self.language.as_deref() != language {
            self.language = language.map(str::to_string);
        }
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> &RecognitionConfig {
        &self.config
    }

    /// Samples currently in the sliding window.
    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// 16kHz samples waiting to enter the window.
    pub fn staged_len(&self) -> usize {
        self.staging.len()
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    /// Downmix, resample to 16kHz and stage host audio.
    ///
    /// Does no recognition work. Returns the number of 16kHz samples staged;
    /// zero while Idle, in which case the audio is dropped.
    pub fn push_audio(&mut self, interleaved: &[f32], channels: usize, source_rate: u32) -> usize {
        if self.state == EngineState::Idle || interleaved.is_empty() || channels == 0 {
            return 0;
        }

        self.mono.clear();
        downmix_into(interleaved, channels, &mut self.mono);

        self.resampled.clear();
        let produced = self.resampler.process_into(
            &self.mono,
            source_rate,
            defaults::TARGET_SAMPLE_RATE,
            &mut self.resampled,
        );
        self.staging.extend(self.resampled.iter().copied());

        if self.state == EngineState::Ready && produced > 0 {
            self.state = EngineState::Accumulating;
        }
        produced
    }

    /// Move staged audio into the window and fire once per hop until the
    /// staging buffer runs short or `budget` is spent.
    ///
    /// At least one firing is evaluated when one is due, even with a zero
    /// budget. Samples left over stay staged for the next tick.
    pub fn tick(&mut self, budget: Duration) -> TickReport {
        let mut report = TickReport::default();
        if self.state == EngineState::Idle {
            return report;
        }

        let started = Instant::now();
        let window_samples = self.config.window_samples;
        let hop = self.config.hop_samples;

        loop {
            if self.window.len() < window_samples {
                let take = (window_samples - self.window.len()).min(self.staging.len());
                self.window.extend(self.staging.drain(..take));
                self.consumed += take as u64;
                if self.window.len() < window_samples {
                    if !self.window.is_empty() {
                        self.state = EngineState::Accumulating;
                    }
                    break;
                }
            } else if self.staging.len() >= hop {
                self.window.drain(..hop);
                self.window.extend(self.staging.drain(..hop));
                self.consumed += hop as u64;
            } else {
                self.state = EngineState::Listening;
                break;
            }

            self.fire(&mut report);

            if started.elapsed() >= budget {
                break;
            }
        }

        report
    }

    fn fire(&mut self, report: &mut TickReport) {
        report.firings += 1;
        self.state = EngineState::Deciding;

        let energy = mean_square(&self.window);
        if energy < self.config.energy_threshold {
            report.skipped_silent += 1;
            self.state = EngineState::Listening;
            return;
        }

        self.state = EngineState::Transcribing;
        report.passes += 1;
        let pass_started = Instant::now();
        let result = self
            .backend
            .run_on_window(&self.window, self.language.as_deref());
        self.state = EngineState::Listening;

        let recognition = match result {
            Ok(recognition) => recognition,
            Err(e) => {
                report.failed += 1;
                warn!(error = %e, "recognition pass failed; skipping window");
                return;
            }
        };

        let text = recognition.text();
        debug!(
            elapsed_ms = pass_started.elapsed().as_millis() as u64,
            energy,
            chars = text.len(),
            "recognition pass finished"
        );
        if text.is_empty() {
            return;
        }

        let language = match &self.language {
            Some(pinned) => pinned.clone(),
            None => recognition
                .language
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| defaults::AUTO_LANGUAGE.to_string()),
        };
        let rate = f64::from(defaults::TARGET_SAMPLE_RATE);
        let end_secs = self.consumed as f64 / rate;
        let start_secs = end_secs - self.window.len() as f64 / rate;
        report
            .transcripts
            .push(TranscriptMessage::new(text, language).with_span(start_secs.max(0.0), end_secs));
    }

    /// Forget all audio and interpolation history; keeps the model.
    pub fn reset_stream(&mut self) {
        self.clear_audio();
        self.state = if self.backend.is_loaded() {
            EngineState::Ready
        } else {
            EngineState::Idle
        };
    }

    fn clear_audio(&mut self) {
        self.resampler.reset();
        self.staging.clear();
        self.window.clear();
        self.consumed = 0;
    }

    /// Hand the backend back, e.g. when a session ends.
    pub fn into_backend(self) -> Box<dyn RecognitionBackend> {
        self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stt::recognizer::MockRecognizer;
    use std::sync::atomic::Ordering;

    /// 100ms window, 50ms hop: 1600 / 800 samples at 16kHz.
    fn small_config() -> RecognitionConfig {
        RecognitionConfig::from_ms(100, 50, 1.0e-4)
    }

    fn loaded_engine(mock: MockRecognizer) -> RecognitionEngine {
        RecognitionEngine::new(Box::new(mock.loaded()), small_config())
    }

    fn tone(len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|n| amplitude * (2.0 * std::f32::consts::PI * 440.0 * n as f32 / 16000.0).sin())
            .collect()
    }

    #[test]
    fn test_config_from_ms() {
        let config = RecognitionConfig::default();
        assert_eq!(config.window_samples, 32000);
        assert_eq!(config.hop_samples, 16000);

        let clamped = RecognitionConfig::from_ms(100, 500, -1.0);
        assert_eq!(clamped.hop_samples, clamped.window_samples);
        assert_eq!(clamped.energy_threshold, 0.0);
    }

    #[test]
    fn test_mean_square() {
        assert_eq!(mean_square(&[]), 0.0);
        assert!((mean_square(&[0.5, -0.5]) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_downmix_averages_channels() {
        let mut out = Vec::new();
        downmix_into(&[1.0, 0.0, 0.5, 0.5, 0.2, -0.2], 2, &mut out);
        assert_eq!(out, vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_new_engine_without_model_is_idle() {
        let engine = RecognitionEngine::new(Box::new(MockRecognizer::new()), small_config());
        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[test]
    fn test_idle_engine_drops_audio() {
        let mut engine = RecognitionEngine::new(Box::new(MockRecognizer::new()), small_config());
        assert_eq!(engine.push_audio(&tone(1600, 0.5), 1, 16000), 0);
        assert_eq!(engine.staged_len(), 0);
        assert_eq!(engine.tick(Duration::from_millis(10)), TickReport::default());
    }

    #[test]
    fn test_load_failure_leaves_engine_idle() {
        let mut engine = RecognitionEngine::new(
            Box::new(MockRecognizer::new().with_load_failure()),
            small_config(),
        );
        assert!(engine.load_model(Path::new("missing.bin")).is_err());
        assert_eq!(engine.state(), EngineState::Idle);
        assert_eq!(engine.push_audio(&tone(1600, 0.5), 1, 16000), 0);
    }

    #[test]
    fn test_load_success_makes_engine_ready() {
        let mut engine = RecognitionEngine::new(Box::new(MockRecognizer::new()), small_config());
        engine.load_model(Path::new("model.bin")).unwrap();
        assert_eq!(engine.state(), EngineState::Ready);
    }

    #[test]
    fn test_push_audio_downmixes_and_resamples() {
        let mut engine = loaded_engine(MockRecognizer::new());
        let stereo = vec![0.1f32; 4800 * 2];
        let staged = engine.push_audio(&stereo, 2, 48000);
        assert!((1598..=1600).contains(&staged), "staged {staged}");
        assert_eq!(engine.state(), EngineState::Accumulating);
        // Staging alone never touches the window.
        assert_eq!(engine.window_len(), 0);
    }

    #[test]
    fn test_accumulates_until_window_full() {
        let mock = MockRecognizer::new();
        let passes = mock.pass_counter();
        let mut engine = loaded_engine(mock);

        engine.push_audio(&tone(1000, 0.5), 1, 16000);
        let report = engine.tick(Duration::from_millis(50));
        assert_eq!(report.firings, 0);
        assert_eq!(engine.state(), EngineState::Accumulating);
        assert_eq!(engine.window_len(), 1000);
        assert_eq!(passes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_silent_window_never_triggers_pass() {
        let mock = MockRecognizer::new();
        let passes = mock.pass_counter();
        let mut engine = loaded_engine(mock);

        engine.push_audio(&vec![0.0; 16000], 1, 16000);
        let report = engine.tick(Duration::from_secs(1));

        assert!(report.firings > 0);
        assert_eq!(report.skipped_silent, report.firings);
        assert_eq!(report.passes, 0);
        assert!(report.transcripts.is_empty());
        assert_eq!(passes.load(Ordering::SeqCst), 0);
        assert_eq!(engine.state(), EngineState::Listening);
    }

    #[test]
    fn test_loud_window_fires_once_per_hop() {
        let mock = MockRecognizer::new().with_response("hello");
        let passes = mock.pass_counter();
        let mut engine = loaded_engine(mock);

        // Fill the window exactly: one firing.
        engine.push_audio(&tone(1600, 0.5), 1, 16000);
        let report = engine.tick(Duration::from_secs(1));
        assert_eq!(report.passes, 1);
        assert_eq!(report.transcripts.len(), 1);
        assert_eq!(report.transcripts[0].text, "hello");
        assert!(report.transcripts[0].is_final);

        // Less than a hop: nothing.
        engine.push_audio(&tone(799, 0.5), 1, 16000);
        assert_eq!(engine.tick(Duration::from_secs(1)).passes, 0);

        // Completing the hop fires exactly once.
        engine.push_audio(&tone(1, 0.5), 1, 16000);
        assert_eq!(engine.tick(Duration::from_secs(1)).passes, 1);

        // Five more hops at once fire five times.
        engine.push_audio(&tone(800 * 5, 0.5), 1, 16000);
        assert_eq!(engine.tick(Duration::from_secs(1)).passes, 5);

        assert_eq!(passes.load(Ordering::SeqCst), 7);
        assert_eq!(engine.window_len(), 1600);
    }

    #[test]
    fn test_window_slides_by_hop_and_keeps_latest_samples() {
        let mut engine = loaded_engine(MockRecognizer::new());
        let ramp: Vec<f32> = (0..2400).map(|i| i as f32 / 2400.0).collect();
        engine.push_audio(&ramp, 1, 16000);
        engine.tick(Duration::from_secs(1));

        assert_eq!(engine.window_len(), 1600);
        assert_eq!(engine.window.first().copied(), Some(ramp[800]));
        assert_eq!(engine.window.last().copied(), Some(ramp[2399]));
    }

    #[test]
    fn test_zero_budget_still_fires_once() {
        let mut engine = loaded_engine(MockRecognizer::new());
        engine.push_audio(&tone(1600 + 800 * 3, 0.5), 1, 16000);

        let report = engine.tick(Duration::ZERO);
        assert_eq!(report.firings, 1);
        assert_eq!(engine.staged_len(), 800 * 3);
    }

    #[test]
    fn test_failed_pass_produces_no_text_and_recovers() {
        let mut engine = loaded_engine(MockRecognizer::new().with_failure());
        engine.push_audio(&tone(2400, 0.5), 1, 16000);

        let report = engine.tick(Duration::from_secs(1));
        assert_eq!(report.passes, 2);
        assert_eq!(report.failed, 2);
        assert!(report.transcripts.is_empty());
        assert_eq!(engine.state(), EngineState::Listening);
    }

    #[test]
    fn test_empty_recognition_emits_nothing() {
        let mut engine = loaded_engine(MockRecognizer::new().with_response(""));
        engine.push_audio(&tone(1600, 0.5), 1, 16000);
        let report = engine.tick(Duration::from_secs(1));
        assert_eq!(report.passes, 1);
        assert!(report.transcripts.is_empty());
    }

    #[test]
    fn test_pinned_language_is_passed_and_reported() {
        let mock = MockRecognizer::new().with_language("fr");
        let requested = mock.requested_languages();
        let mut engine = loaded_engine(mock);
        engine.set_language(Some("de"));

        engine.push_audio(&tone(1600, 0.5), 1, 16000);
        let report = engine.tick(Duration::from_secs(1));

        assert_eq!(report.transcripts[0].language, "de");
        assert_eq!(*requested.lock().unwrap(), vec![Some("de".to_string())]);
    }

    #[test]
    fn test_auto_reports_detected_language() {
        let mut engine = loaded_engine(MockRecognizer::new().with_language("fr"));
        engine.push_audio(&tone(1600, 0.5), 1, 16000);
        let report = engine.tick(Duration::from_secs(1));
        assert_eq!(report.transcripts[0].language, "fr");
    }

    #[test]
    fn test_auto_without_detection_reports_auto() {
        let mut engine = loaded_engine(MockRecognizer::new());
        engine.push_audio(&tone(1600, 0.5), 1, 16000);
        let report = engine.tick(Duration::from_secs(1));
        assert_eq!(report.transcripts[0].language, "auto");
    }

    #[test]
    fn test_transcript_span_tracks_stream_time() {
        let mut engine = loaded_engine(MockRecognizer::new());
        engine.push_audio(&tone(2400, 0.5), 1, 16000);
        let report = engine.tick(Duration::from_secs(1));

        let second = &report.transcripts[1];
        assert!((second.start_secs - 0.05).abs() < 1e-9);
        assert!((second.end_secs - 0.15).abs() < 1e-9);
    }

    #[test]
    fn test_reset_stream_clears_window() {
        let mut engine = loaded_engine(MockRecognizer::new());
        engine.push_audio(&tone(2000, 0.5), 1, 16000);
        engine.tick(Duration::from_secs(1));
        engine.reset_stream();

        assert_eq!(engine.window_len(), 0);
        assert_eq!(engine.staged_len(), 0);
        assert_eq!(engine.state(), EngineState::Ready);
    }
}
