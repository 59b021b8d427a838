//! Real-time translation pipeline.
//!
//! ```text
//!  audio thread                          worker thread
//!  ────────────                          ─────────────
//!  AudioPort::push_audio ──▶ input ring ──▶ RecognitionEngine ──▶ bus (text)
//!                                                                    │
//!                                            translate ◀─────────────┘
//!                                                │
//!                                            synthesize ──▶ bus (audio)
//!                                                                │
//!  AudioPort::mix_output ◀── output ring ◀── resample to host ◀──┘
//! ```
//!
//! The audio thread only touches the two ring buffers and a few atomics.
//! Everything that can block (inference, network, synthesis) runs on the
//! single worker thread owned by [`Pipeline`].

use crate::audio::resample::StreamResampler;
use crate::audio::ring_buffer::{RingConsumer, RingProducer, ring_buffer};
use crate::config::Config;
use crate::defaults;
use crate::error::{LiveTransError, Result};
use crate::language;
use crate::pipeline::bus::MessageBus;
use crate::pipeline::monitor::{Monitor, PipelineStats, StatsSnapshot};
use crate::pipeline::settings::{SessionSettings, SettingsSnapshot};
use crate::pipeline::types::{LanguagePair, StreamFormat, SynthesizedAudio, TranscriptMessage};
use crate::stt::engine::{RecognitionConfig, RecognitionEngine, TickReport};
use crate::stt::recognizer::RecognitionBackend;
use crate::translate::translator::{PassThroughTranslator, Translator, translate_or_original};
use crate::tts::synthesizer::{ChunkSink, SpeechSynthesizer};
use crate::tts::tone::ToneSynthesizer;
use crate::tts::voice::{Gender, VoicePreference, pick_voice};
use crossbeam_channel::Sender;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Runtime tuning for the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Window geometry and energy gate
    pub recognition: RecognitionConfig,
    /// Ring buffer capacities, in milliseconds of host audio
    pub input_capacity_ms: u32,
    pub output_capacity_ms: u32,
    /// Frames popped from the input ring per block
    pub block_frames: usize,
    /// Blocks drained per worker iteration
    pub max_blocks_per_iteration: usize,
    /// Worker sleep after an iteration with no input
    pub idle_sleep: Duration,
    /// Time budget per recognition tick
    pub tick_budget: Duration,
    /// Bounded join timeout for `stop`
    pub stop_timeout: Duration,
    /// Largest host callback the audio port handles in one mix pass
    pub max_callback_frames: usize,
    /// Debug log cap between drains
    pub debug_log_max_bytes: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            recognition: RecognitionConfig::default(),
            input_capacity_ms: defaults::INPUT_CAPACITY_MS,
            output_capacity_ms: defaults::OUTPUT_CAPACITY_MS,
            block_frames: defaults::BLOCK_FRAMES,
            max_blocks_per_iteration: defaults::MAX_BLOCKS_PER_ITERATION,
            idle_sleep: Duration::from_millis(defaults::IDLE_SLEEP_MS),
            tick_budget: Duration::from_millis(defaults::TICK_BUDGET_MS),
            stop_timeout: Duration::from_millis(defaults::STOP_TIMEOUT_MS),
            max_callback_frames: defaults::MAX_CALLBACK_FRAMES,
            debug_log_max_bytes: defaults::DEBUG_LOG_MAX_BYTES,
        }
    }
}

impl From<&Config> for PipelineConfig {
    fn from(config: &Config) -> Self {
        let p = &config.pipeline;
        Self {
            recognition: RecognitionConfig::from_ms(p.window_ms, p.hop_ms, p.energy_threshold),
            input_capacity_ms: p.input_capacity_ms,
            output_capacity_ms: p.output_capacity_ms,
            block_frames: p.block_frames.max(1),
            max_blocks_per_iteration: p.max_blocks_per_iteration.max(1),
            idle_sleep: Duration::from_millis(p.idle_sleep_ms),
            tick_budget: Duration::from_millis(p.tick_budget_ms),
            stop_timeout: Duration::from_millis(p.stop_timeout_ms),
            max_callback_frames: p.max_callback_frames.max(1),
            debug_log_max_bytes: defaults::DEBUG_LOG_MAX_BYTES,
        }
    }
}

/// Control-thread handle: settings writes and diagnostic reads.
///
/// Cheap to clone and safe to use from any non-real-time thread while the
/// pipeline runs.
#[derive(Debug, Clone)]
pub struct PipelineControl {
    settings: SessionSettings,
    monitor: Arc<Monitor>,
}

impl PipelineControl {
    /// Takes effect from the next utterance.
    pub fn set_languages(&self, source: &str, target: &str) {
        self.settings.set_languages(source, target);
    }

    /// Force language detection even when a source language is set.
    pub fn set_auto_detect(&self, enabled: bool) {
        self.settings.set_auto_detect(enabled);
    }

    pub fn set_voice_preference(&self, gender: &str, style: Option<&str>) {
        self.settings
            .set_voice_preference(VoicePreference::new(Gender::parse(gender), style));
    }

    pub fn languages(&self) -> LanguagePair {
        self.settings.languages()
    }

    pub fn last_transcript(&self) -> String {
        self.monitor.last_transcript()
    }

    /// Advisory lines logged since the previous drain.
    pub fn drain_debug_log(&self) -> String {
        self.monitor.drain_debug_log()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.monitor.stats().snapshot()
    }
}

/// Audio-thread end of a running session.
///
/// Owns the writing half of the input ring and the reading half of the output
/// ring. Neither method allocates, locks or blocks.
pub struct AudioPort {
    input: RingProducer,
    output: RingConsumer,
    scratch: Vec<f32>,
    channels: usize,
    sample_rate: u32,
    running: Arc<AtomicBool>,
    monitor: Arc<Monitor>,
}

impl AudioPort {
    /// Submit interleaved host audio.
    ///
    /// Returns the number of frames accepted. Frames that do not fit in the
    /// input ring are dropped and counted. Nothing is accepted once the
    /// session has stopped, or if `channels` or `sample_rate` differs from
    /// the session format; a host that changes format restarts the session.
    pub fn push_audio(&mut self, interleaved: &[f32], channels: usize, sample_rate: u32) -> usize {
        if channels == 0 {
            return 0;
        }
        let frames = interleaved.len() / channels;
        if !self.running.load(Ordering::Acquire)
            || channels != self.channels
            || sample_rate != self.sample_rate
        {
            PipelineStats::add(&self.monitor.stats().input_frames_dropped, frames as u64);
            return 0;
        }

        let pushed = self.input.push(interleaved);
        PipelineStats::add(
            &self.monitor.stats().input_frames_dropped,
            (frames - pushed) as u64,
        );
        pushed
    }

    /// Add available synthesized audio into `out` (interleaved, `channels`
    /// wide). Returns the number of frames mixed; the rest of `out` is left
    /// untouched.
    pub fn mix_output(&mut self, out: &mut [f32], channels: usize) -> usize {
        if channels != self.channels || channels == 0 {
            return 0;
        }
        let wanted = out.len() / channels;
        let scratch_frames = self.scratch.len() / channels;
        let mut mixed = 0;

        while mixed < wanted {
            let take = (wanted - mixed).min(scratch_frames);
            let popped = self.output.pop(&mut self.scratch[..take * channels]);
            if popped == 0 {
                break;
            }
            let dst = &mut out[mixed * channels..(mixed + popped) * channels];
            for (o, s) in dst.iter_mut().zip(&self.scratch[..popped * channels]) {
                *o += *s;
            }
            mixed += popped;
        }
        mixed
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frames of synthesized audio waiting to be mixed.
    pub fn pending_output_frames(&self) -> usize {
        self.output.available_frames()
    }

    /// Free space in the input ring, in frames.
    pub fn input_free_frames(&self) -> usize {
        self.input.free_frames()
    }

    /// Frames pushed but not yet taken by the worker.
    pub fn input_backlog_frames(&self) -> usize {
        self.input.capacity_frames() - self.input.free_frames()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

type WorkerHandle = JoinHandle<Box<dyn RecognitionBackend>>;

struct Session {
    running: Arc<AtomicBool>,
    handle: WorkerHandle,
}

/// Speech translation pipeline: recognition → translation → synthesis.
///
/// Holds the recognition backend between sessions and lends it to the worker
/// thread while one runs. Language and voice settings persist across
/// start/stop cycles.
pub struct Pipeline {
    config: PipelineConfig,
    settings: SessionSettings,
    monitor: Arc<Monitor>,
    translator: Arc<dyn Translator>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    backend: Option<Box<dyn RecognitionBackend>>,
    transcript_listener: Option<Sender<TranscriptMessage>>,
    session: Option<Session>,
    /// Worker that outlived its stop timeout, reclaimed on the next start.
    detached: Option<WorkerHandle>,
}

impl Pipeline {
    /// Creates a pipeline with the pass-through translator and tone voice.
    pub fn new(config: PipelineConfig, backend: Box<dyn RecognitionBackend>) -> Self {
        let monitor = Arc::new(Monitor::new(config.debug_log_max_bytes));
        Self {
            config,
            settings: SessionSettings::default(),
            monitor,
            translator: Arc::new(PassThroughTranslator),
            synthesizer: Arc::new(ToneSynthesizer::default()),
            backend: Some(backend),
            transcript_listener: None,
            session: None,
            detached: None,
        }
    }

    /// Sets the translation backend.
    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = translator;
        self
    }

    /// Sets the speech synthesis backend.
    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    /// Receive a copy of every transcript the worker handles.
    pub fn with_transcript_listener(mut self, listener: Sender<TranscriptMessage>) -> Self {
        self.set_transcript_listener(listener);
        self
    }

    /// Applies from the next `start`.
    pub fn set_transcript_listener(&mut self, listener: Sender<TranscriptMessage>) {
        self.transcript_listener = Some(listener);
    }

    /// Sets the initial session settings.
    pub fn with_settings(self, languages: LanguagePair, voice: VoicePreference, auto_detect: bool) -> Self {
        self.settings.set_languages(&languages.source, &languages.target);
        self.settings.set_voice_preference(voice);
        self.settings.set_auto_detect(auto_detect);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Handle for control threads.
    pub fn control(&self) -> PipelineControl {
        PipelineControl {
            settings: self.settings.clone(),
            monitor: Arc::clone(&self.monitor),
        }
    }

    /// Starts a session: loads the model, allocates the ring buffers and
    /// spawns the worker.
    ///
    /// Leaves the pipeline unchanged if a session is already running
    /// ([`LiveTransError::AlreadyRunning`]) or the model fails to load (the
    /// failure is also written to the debug log).
    pub fn start(&mut self, model_path: &Path, format: StreamFormat) -> Result<AudioPort> {
        if self.session.is_some() {
            return Err(LiveTransError::AlreadyRunning);
        }
        format.validate()?;
        self.reclaim_backend()?;

        let mut backend = self.backend.take().ok_or_else(|| {
            LiveTransError::Other("recognition backend is unavailable".to_string())
        })?;

        if let Err(e) = backend.load_model(model_path) {
            warn!(model = %model_path.display(), error = %e, "model load failed; pipeline stays idle");
            self.monitor.append_debug(&format!("Model load failed: {}", e));
            self.backend = Some(backend);
            return Err(e);
        }
        let model_name = backend.model_name().to_string();

        let mut engine = RecognitionEngine::new(backend, self.config.recognition);
        engine.set_language(self.settings.snapshot().recognition_language().as_deref());

        let (input_tx, input_rx) = ring_buffer(
            format.frames_for_ms(self.config.input_capacity_ms),
            format.channels,
        );
        let (output_tx, output_rx) = ring_buffer(
            format.frames_for_ms(self.config.output_capacity_ms),
            format.channels,
        );

        let running = Arc::new(AtomicBool::new(true));

        let worker = Worker {
            engine,
            input: input_rx,
            output: output_tx,
            bus: MessageBus::new(),
            transcript_listener: self.transcript_listener.clone(),
            translator: Arc::clone(&self.translator),
            synthesizer: Arc::clone(&self.synthesizer),
            settings: self.settings.clone(),
            monitor: Arc::clone(&self.monitor),
            running: Arc::clone(&running),
            host_rate: format.sample_rate,
            channels: format.channels,
            config: self.config.clone(),
            output_resampler: StreamResampler::new(),
            block: vec![0.0; self.config.block_frames * format.channels],
            upsampled: Vec::new(),
            interleaved: Vec::new(),
            next_utterance: 0,
            failed_utterances: HashSet::new(),
        };

        let handle = thread::Builder::new()
            .name("livetrans-worker".to_string())
            .spawn(move || worker.run())?;

        info!(
            model = %model_name,
            sample_rate = format.sample_rate,
            channels = format.channels,
            "pipeline started"
        );
        self.monitor
            .append_debug(&format!("Started with model {}", model_name));

        self.session = Some(Session {
            running: Arc::clone(&running),
            handle,
        });

        Ok(AudioPort {
            input: input_tx,
            output: output_rx,
            scratch: vec![0.0; self.config.max_callback_frames * format.channels],
            channels: format.channels,
            sample_rate: format.sample_rate,
            running,
            monitor: Arc::clone(&self.monitor),
        })
    }

    /// Recover the backend from a worker that previously missed its stop
    /// deadline.
    fn reclaim_backend(&mut self) -> Result<()> {
        if self.backend.is_some() {
            return Ok(());
        }
        match self.detached.take() {
            Some(handle) if handle.is_finished() => match handle.join() {
                Ok(backend) => {
                    self.backend = Some(backend);
                    Ok(())
                }
                Err(_) => Err(LiveTransError::Other(
                    "recognition backend was lost when the worker panicked".to_string(),
                )),
            },
            Some(handle) => {
                self.detached = Some(handle);
                Err(LiveTransError::AlreadyRunning)
            }
            None => Err(LiveTransError::Other(
                "recognition backend is unavailable".to_string(),
            )),
        }
    }

    /// Stops the session and joins the worker.
    ///
    /// Waits up to `stop_timeout` for an in-flight recognition, translation or
    /// synthesis call to finish. After the deadline the worker is detached and
    /// will exit on its own; returns false in that case. Calling `stop`
    /// without a running session is a no-op that returns true.
    pub fn stop(&mut self) -> bool {
        let Some(session) = self.session.take() else {
            return true;
        };
        session.running.store(false, Ordering::Release);

        let deadline = Instant::now() + self.config.stop_timeout;
        let poll_interval = Duration::from_millis(5);

        loop {
            if session.handle.is_finished() {
                match session.handle.join() {
                    Ok(backend) => self.backend = Some(backend),
                    Err(panic_info) => {
                        let msg = panic_info
                            .downcast_ref::<&str>()
                            .copied()
                            .or_else(|| panic_info.downcast_ref::<String>().map(|s| s.as_str()))
                            .unwrap_or("unknown panic");
                        error!("pipeline worker panicked: {msg}");
                        self.monitor
                            .append_debug(&format!("Worker panicked: {}", msg));
                    }
                }
                info!("pipeline stopped");
                return true;
            }

            if Instant::now() >= deadline {
                warn!(
                    timeout_ms = self.config.stop_timeout.as_millis() as u64,
                    "worker still busy at stop deadline; detaching"
                );
                self.detached = Some(session.handle);
                return false;
            }

            thread::sleep(poll_interval);
        }
    }

    /// Returns true while a session's worker is alive.
    pub fn is_running(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.running.load(Ordering::Acquire) && !s.handle.is_finished())
    }

    pub fn set_languages(&self, source: &str, target: &str) {
        self.settings.set_languages(source, target);
    }

    pub fn set_auto_detect(&self, enabled: bool) {
        self.settings.set_auto_detect(enabled);
    }

    pub fn set_voice_preference(&self, gender: &str, style: Option<&str>) {
        self.control().set_voice_preference(gender, style);
    }

    pub fn last_transcript(&self) -> String {
        self.monitor.last_transcript()
    }

    pub fn drain_debug_log(&self) -> String {
        self.monitor.drain_debug_log()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.monitor.stats().snapshot()
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State owned by the worker thread for one session.
struct Worker {
    engine: RecognitionEngine,
    input: RingConsumer,
    output: RingProducer,
    bus: MessageBus,
    transcript_listener: Option<Sender<TranscriptMessage>>,
    translator: Arc<dyn Translator>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    settings: SessionSettings,
    monitor: Arc<Monitor>,
    running: Arc<AtomicBool>,
    host_rate: u32,
    channels: usize,
    config: PipelineConfig,
    output_resampler: StreamResampler,
    block: Vec<f32>,
    upsampled: Vec<f32>,
    interleaved: Vec<f32>,
    next_utterance: u64,
    /// Utterances whose synthesis failed; their queued chunks are discarded.
    failed_utterances: HashSet<u64>,
}

impl Worker {
    fn run(mut self) -> Box<dyn RecognitionBackend> {
        debug!(model = self.engine.model_name(), "worker loop started");

        while self.running.load(Ordering::Acquire) {
            let settings = self.settings.snapshot();
            self.engine
                .set_language(settings.recognition_language().as_deref());
            let frames_in = self.feed_engine();

            let report = self.engine.tick(self.config.tick_budget);
            self.record(&report);
            for transcript in report.transcripts {
                self.bus.push_text(transcript);
            }

            for transcript in self.bus.drain_text() {
                if !self.running.load(Ordering::Acquire) {
                    break;
                }
                self.handle_transcript(transcript, &settings);
            }

            self.mix_synthesized();

            if frames_in == 0 && report.firings == 0 {
                thread::sleep(self.config.idle_sleep);
            }
        }

        debug!("worker loop exiting");
        self.engine.into_backend()
    }

    /// Move up to `max_blocks_per_iteration` blocks from the input ring into
    /// the engine. Returns frames moved.
    fn feed_engine(&mut self) -> usize {
        let mut total = 0;
        for _ in 0..self.config.max_blocks_per_iteration {
            let frames = self.input.pop(&mut self.block);
            if frames == 0 {
                break;
            }
            self.engine
                .push_audio(&self.block[..frames * self.channels], self.channels, self.host_rate);
            total += frames;
        }
        total
    }

    fn record(&self, report: &TickReport) {
        let stats = self.monitor.stats();
        PipelineStats::add(&stats.recognition_passes, report.passes as u64);
        PipelineStats::add(&stats.silent_windows_skipped, report.skipped_silent as u64);
        PipelineStats::add(&stats.failed_passes, report.failed as u64);
        PipelineStats::add(&stats.transcripts, report.transcripts.len() as u64);
        if report.failed > 0 {
            self.monitor.append_debug(&format!(
                "Recognition failed on {} window(s)",
                report.failed
            ));
        }
    }

    /// Translate and synthesize one transcript, unless source and target are
    /// the same language.
    fn handle_transcript(&mut self, transcript: TranscriptMessage, settings: &SettingsSnapshot) {
        let target = &settings.languages.target;
        self.monitor.set_last_transcript(&transcript.text);
        self.monitor
            .append_debug(&format!("[{}] {}", transcript.language, transcript.text));
        let listener_gone = self
            .transcript_listener
            .as_ref()
            .is_some_and(|listener| listener.send(transcript.clone()).is_err());
        if listener_gone {
            self.transcript_listener = None;
        }

        if language::same_language(&transcript.language, target) {
            PipelineStats::add(&self.monitor.stats().utterances_skipped_same_language, 1);
            debug!(language = %transcript.language, "source equals target; not echoing");
            return;
        }

        let translated = translate_or_original(
            self.translator.as_ref(),
            &transcript.text,
            &transcript.language,
            target,
        );
        self.monitor
            .append_debug(&format!("→ [{}] {}", target, translated));

        let voice = pick_voice(target, &settings.voice);
        let utterance = self.next_utterance;
        self.next_utterance += 1;
        let sink = ChunkSink::new(utterance, self.bus.audio_sender());

        match self.synthesizer.synthesize(&translated, &voice, &sink) {
            Ok(()) => {
                PipelineStats::add(&self.monitor.stats().utterances_synthesized, 1);
                debug!(utterance, voice = %voice.voice, chunks = sink.chunk_count(), "utterance synthesized");
            }
            Err(e) => {
                warn!(
                    backend = self.synthesizer.name(),
                    error = %e,
                    "synthesis failed; utterance dropped"
                );
                self.failed_utterances.insert(utterance);
                self.monitor
                    .append_debug(&format!("Synthesis failed: {}", e));
            }
        }
        sink.finish();
    }

    /// Resample queued synthesis chunks to the host rate and write them to
    /// the output ring, duplicated across channels. Chunks of a failed
    /// utterance are discarded up to and including its final chunk.
    fn mix_synthesized(&mut self) {
        for chunk in self.bus.drain_audio() {
            if self.failed_utterances.contains(&chunk.utterance) {
                if chunk.is_final {
                    self.failed_utterances.remove(&chunk.utterance);
                }
                continue;
            }
            self.write_chunk(&chunk);
        }
    }

    fn write_chunk(&mut self, chunk: &SynthesizedAudio) {
        if chunk.pcm_16k.is_empty() {
            return;
        }
        self.upsampled.clear();
        self.output_resampler.process_into(
            &chunk.pcm_16k,
            defaults::TARGET_SAMPLE_RATE,
            self.host_rate,
            &mut self.upsampled,
        );

        self.interleaved.clear();
        for &sample in &self.upsampled {
            self.interleaved
                .extend(std::iter::repeat_n(sample, self.channels));
        }

        let frames = self.upsampled.len();
        let pushed = self.output.push(&self.interleaved);
        if pushed < frames {
            PipelineStats::add(
                &self.monitor.stats().output_frames_dropped,
                (frames - pushed) as u64,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stt::recognizer::MockRecognizer;
    use crate::translate::translator::MockTranslator;
    use crate::tts::synthesizer::MockSynthesizer;

    fn small_config() -> PipelineConfig {
        PipelineConfig {
            recognition: RecognitionConfig::from_ms(200, 100, defaults::ENERGY_THRESHOLD),
            ..PipelineConfig::default()
        }
    }

    fn tone_block(frames: usize, channels: usize, amplitude: f32) -> Vec<f32> {
        (0..frames)
            .flat_map(|n| {
                let v = amplitude * (2.0 * std::f32::consts::PI * 440.0 * n as f32 / 48000.0).sin();
                std::iter::repeat_n(v, channels)
            })
            .collect()
    }

    fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    #[test]
    fn test_pipeline_config_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.recognition.window_samples, 32000);
        assert_eq!(config.recognition.hop_samples, 16000);
        assert_eq!(config.block_frames, 480);
        assert_eq!(config.stop_timeout, Duration::from_millis(1000));
    }

    #[test]
    fn test_pipeline_config_from_config() {
        let mut config = Config::default();
        config.pipeline.window_ms = 1000;
        config.pipeline.hop_ms = 250;
        config.pipeline.block_frames = 0;

        let pipeline_config = PipelineConfig::from(&config);
        assert_eq!(pipeline_config.recognition.window_samples, 16000);
        assert_eq!(pipeline_config.recognition.hop_samples, 4000);
        assert_eq!(pipeline_config.block_frames, 1);
    }

    #[test]
    fn test_start_then_stop() {
        let mut pipeline = Pipeline::new(small_config(), Box::new(MockRecognizer::new()));
        let port = pipeline
            .start(Path::new("model.bin"), StreamFormat::default())
            .unwrap();
        assert!(pipeline.is_running());
        assert!(port.is_running());

        assert!(pipeline.stop());
        assert!(!pipeline.is_running());
        assert!(!port.is_running());
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let mut pipeline = Pipeline::new(small_config(), Box::new(MockRecognizer::new()));
        let _port = pipeline
            .start(Path::new("model.bin"), StreamFormat::default())
            .unwrap();
        let second = pipeline.start(Path::new("model.bin"), StreamFormat::default());
        assert!(matches!(second, Err(LiveTransError::AlreadyRunning)));
        assert!(pipeline.is_running());
    }

    #[test]
    fn test_model_load_failure_keeps_pipeline_idle() {
        let mut pipeline = Pipeline::new(
            small_config(),
            Box::new(MockRecognizer::new().with_load_failure()),
        );
        let result = pipeline.start(Path::new("missing.bin"), StreamFormat::default());

        assert!(matches!(result, Err(LiveTransError::ModelLoad { .. })));
        assert!(!pipeline.is_running());
        assert!(pipeline.drain_debug_log().contains("Model load failed"));
    }

    #[test]
    fn test_invalid_format_is_rejected() {
        let mut pipeline = Pipeline::new(small_config(), Box::new(MockRecognizer::new()));
        let result = pipeline.start(Path::new("model.bin"), StreamFormat::new(48000, 0));
        assert!(matches!(result, Err(LiveTransError::StreamFormat { .. })));
    }

    #[test]
    fn test_restart_reuses_backend_and_keeps_settings() {
        let mut pipeline = Pipeline::new(small_config(), Box::new(MockRecognizer::new()));
        pipeline.set_languages("fr", "de");

        let _first = pipeline
            .start(Path::new("model.bin"), StreamFormat::default())
            .unwrap();
        assert!(pipeline.stop());

        let _second = pipeline
            .start(Path::new("model.bin"), StreamFormat::default())
            .unwrap();
        assert_eq!(pipeline.control().languages(), LanguagePair::new("fr", "de"));
        assert!(pipeline.stop());
    }

    #[test]
    fn test_push_after_stop_is_dropped() {
        let mut pipeline = Pipeline::new(small_config(), Box::new(MockRecognizer::new()));
        let mut port = pipeline
            .start(Path::new("model.bin"), StreamFormat::default())
            .unwrap();
        pipeline.stop();

        assert_eq!(port.push_audio(&tone_block(480, 2, 0.5), 2, 48000), 0);
        assert_eq!(pipeline.stats().input_frames_dropped, 480);
    }

    #[test]
    fn test_push_with_wrong_channel_count_is_dropped() {
        let mut pipeline = Pipeline::new(small_config(), Box::new(MockRecognizer::new()));
        let mut port = pipeline
            .start(Path::new("model.bin"), StreamFormat::default())
            .unwrap();
        assert_eq!(port.push_audio(&tone_block(480, 1, 0.5), 1, 48000), 0);
        assert_eq!(port.push_audio(&[], 0, 48000), 0);
    }

    #[test]
    fn test_push_with_wrong_sample_rate_is_dropped() {
        let mut pipeline = Pipeline::new(small_config(), Box::new(MockRecognizer::new()));
        let mut port = pipeline
            .start(Path::new("model.bin"), StreamFormat::new(48000, 2))
            .unwrap();

        assert_eq!(port.push_audio(&tone_block(441, 2, 0.5), 2, 44100), 0);
        assert_eq!(pipeline.stats().input_frames_dropped, 441);
        assert_eq!(port.sample_rate(), 48000);
        assert_eq!(port.input_backlog_frames(), 0);

        assert_eq!(port.push_audio(&tone_block(480, 2, 0.5), 2, 48000), 480);
    }

    #[test]
    fn test_tone_is_translated_and_synthesized() {
        let translator = MockTranslator::new().with_prefix("en");
        let translated = translator.calls();
        let mut pipeline = Pipeline::new(
            small_config(),
            Box::new(MockRecognizer::new().with_response("hallo").with_language("de")),
        )
        .with_translator(Arc::new(translator))
        .with_synthesizer(Arc::new(MockSynthesizer::new()));

        let mut port = pipeline
            .start(Path::new("model.bin"), StreamFormat::default())
            .unwrap();
        // 0.5 s of stereo tone
        for _ in 0..50 {
            port.push_audio(&tone_block(480, 2, 0.5), 2, 48000);
        }

        assert!(wait_for(Duration::from_secs(3), || port.pending_output_frames() > 0));
        let mut out = vec![0.0f32; 960];
        assert!(port.mix_output(&mut out, 2) > 0);
        assert!(out.iter().any(|s| s.abs() > 0.0));

        let calls = translated.lock().unwrap();
        assert_eq!(calls[0].text, "hallo");
        assert_eq!(calls[0].source, "de");
        assert_eq!(calls[0].target, "en");
        drop(calls);

        assert_eq!(pipeline.last_transcript(), "hallo");
        let log = pipeline.drain_debug_log();
        assert!(log.contains("[de] hallo"));
        assert!(log.contains("[en] [en] hallo"));
        assert!(pipeline.stats().utterances_synthesized >= 1);
    }

    #[test]
    fn test_same_language_is_not_echoed() {
        let translator = MockTranslator::new();
        let translate_calls = translator.call_counter();
        let synthesizer = MockSynthesizer::new();
        let synth_calls = synthesizer.call_counter();
        let mock = MockRecognizer::new().with_response("hello");
        let passes = mock.pass_counter();

        let mut pipeline = Pipeline::new(small_config(), Box::new(mock))
            .with_translator(Arc::new(translator))
            .with_synthesizer(Arc::new(synthesizer));
        pipeline.set_languages("en", "en");

        let mut port = pipeline
            .start(Path::new("model.bin"), StreamFormat::default())
            .unwrap();
        for _ in 0..50 {
            port.push_audio(&tone_block(480, 2, 0.5), 2, 48000);
        }

        assert!(wait_for(Duration::from_secs(3), || {
            pipeline.stats().utterances_skipped_same_language >= 1
        }));
        assert!(passes.load(Ordering::SeqCst) >= 1);
        assert_eq!(translate_calls.load(Ordering::SeqCst), 0);
        assert_eq!(synth_calls.load(Ordering::SeqCst), 0);
        assert_eq!(port.pending_output_frames(), 0);
    }

    #[test]
    fn test_transcript_listener_receives_spans() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut pipeline = Pipeline::new(
            small_config(),
            Box::new(MockRecognizer::new().with_response("ciao").with_language("it")),
        )
        .with_transcript_listener(tx);

        let mut port = pipeline
            .start(Path::new("model.bin"), StreamFormat::default())
            .unwrap();
        for _ in 0..50 {
            port.push_audio(&tone_block(480, 2, 0.5), 2, 48000);
        }

        let first = rx.recv_timeout(Duration::from_secs(3)).unwrap();
        assert_eq!(first.text, "ciao");
        assert_eq!(first.language, "it");
        assert!(first.end_secs > first.start_secs);
        assert!((first.end_secs - first.start_secs - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_failed_translation_speaks_original_text() {
        let synthesizer = MockSynthesizer::new();
        let spoken = synthesizer.calls();
        let mut pipeline = Pipeline::new(
            small_config(),
            Box::new(MockRecognizer::new().with_response("bonjour").with_language("fr")),
        )
        .with_translator(Arc::new(MockTranslator::new().with_failure()))
        .with_synthesizer(Arc::new(synthesizer));

        let mut port = pipeline
            .start(Path::new("model.bin"), StreamFormat::default())
            .unwrap();
        for _ in 0..50 {
            port.push_audio(&tone_block(480, 2, 0.5), 2, 48000);
        }

        assert!(wait_for(Duration::from_secs(3), || {
            !spoken.lock().unwrap().is_empty()
        }));
        let calls = spoken.lock().unwrap();
        assert_eq!(calls[0].0, "bonjour");
        assert_eq!(calls[0].1.voice, "en-US-JennyNeural");
    }

    #[test]
    fn test_failed_synthesis_keeps_running() {
        let mut pipeline = Pipeline::new(
            small_config(),
            Box::new(MockRecognizer::new().with_language("it")),
        )
        .with_synthesizer(Arc::new(MockSynthesizer::new().with_failure()));

        let mut port = pipeline
            .start(Path::new("model.bin"), StreamFormat::default())
            .unwrap();
        for _ in 0..50 {
            port.push_audio(&tone_block(480, 2, 0.5), 2, 48000);
        }

        assert!(wait_for(Duration::from_secs(3), || {
            pipeline.drain_debug_log().contains("Synthesis failed")
        }));
        assert!(pipeline.is_running());
        assert_eq!(port.pending_output_frames(), 0);
    }

    #[test]
    fn test_partial_audio_of_failed_synthesis_is_discarded() {
        let mut pipeline = Pipeline::new(
            small_config(),
            Box::new(MockRecognizer::new().with_language("it")),
        )
        .with_synthesizer(Arc::new(
            MockSynthesizer::new()
                .with_failure_after(1)
                .with_samples_per_chunk(1600),
        ));

        let mut port = pipeline
            .start(Path::new("model.bin"), StreamFormat::default())
            .unwrap();
        for _ in 0..50 {
            port.push_audio(&tone_block(480, 2, 0.5), 2, 48000);
        }

        assert!(wait_for(Duration::from_secs(3), || {
            pipeline.drain_debug_log().contains("Synthesis failed")
        }));
        // Let the worker drain the bus after the failed utterance.
        thread::sleep(Duration::from_millis(50));
        assert!(pipeline.is_running());
        assert_eq!(port.pending_output_frames(), 0);
        assert_eq!(pipeline.stats().utterances_synthesized, 0);
    }

    #[test]
    fn test_voice_preference_applies_to_next_utterance() {
        let synthesizer = MockSynthesizer::new();
        let spoken = synthesizer.calls();
        let mut pipeline = Pipeline::new(
            small_config(),
            Box::new(MockRecognizer::new().with_language("en")),
        )
        .with_synthesizer(Arc::new(synthesizer));
        pipeline.set_languages("auto", "de");
        pipeline.set_voice_preference("male", Some("Warm"));

        let mut port = pipeline
            .start(Path::new("model.bin"), StreamFormat::default())
            .unwrap();
        for _ in 0..50 {
            port.push_audio(&tone_block(480, 2, 0.5), 2, 48000);
        }

        assert!(wait_for(Duration::from_secs(3), || {
            !spoken.lock().unwrap().is_empty()
        }));
        let calls = spoken.lock().unwrap();
        assert_eq!(calls[0].1.voice, "de-DE-ConradNeural");
        assert_eq!(calls[0].1.style, "Warm");
    }

    #[test]
    fn test_slow_backend_is_detached_and_reclaimed() {
        let config = PipelineConfig {
            stop_timeout: Duration::from_millis(20),
            ..small_config()
        };
        let mut pipeline = Pipeline::new(
            config,
            Box::new(MockRecognizer::new().with_delay(Duration::from_millis(300))),
        );
        let mut port = pipeline
            .start(Path::new("model.bin"), StreamFormat::default())
            .unwrap();
        for _ in 0..50 {
            port.push_audio(&tone_block(480, 2, 0.5), 2, 48000);
        }
        assert!(wait_for(Duration::from_secs(2), || {
            pipeline.stats().recognition_passes >= 1
        }));

        let started = Instant::now();
        assert!(!pipeline.stop());
        assert!(started.elapsed() < Duration::from_millis(250));

        // The detached worker finishes its pass and hands the backend back.
        assert!(wait_for(Duration::from_secs(3), || {
            pipeline.start(Path::new("model.bin"), StreamFormat::default()).is_ok()
        }));
        assert!(pipeline.stop() || !pipeline.is_running());
    }

    #[test]
    fn test_mix_output_adds_to_existing_signal() {
        let (mut tx, rx) = ring_buffer(16, 2);
        tx.push(&[0.5; 8]);
        let mut port = AudioPort {
            input: ring_buffer(16, 2).0,
            output: rx,
            scratch: vec![0.0; 2 * 2],
            channels: 2,
            sample_rate: 48000,
            running: Arc::new(AtomicBool::new(true)),
            monitor: Arc::new(Monitor::default()),
        };

        // Scratch holds two frames, so mixing four takes two pops.
        let mut out = vec![0.25f32; 12];
        assert_eq!(port.mix_output(&mut out, 2), 4);
        assert_eq!(&out[..8], &[0.75; 8]);
        assert_eq!(&out[8..], &[0.25; 4]);
        assert_eq!(port.mix_output(&mut out, 2), 0);
    }
}
