//! Offline host: streams a WAV file through the pipeline.
//!
//! Plays the part of an audio host. The file is cut into callback-sized
//! blocks, each block is pushed through the [`AudioPort`] and synthesized
//! speech is mixed back into the same block before it is written out.

use crate::audio::wav::WavClip;
use crate::cli::RunArgs;
use crate::config::{Config, TranslationBackend};
use crate::defaults;
use crate::error::Result;
use crate::pipeline::monitor::StatsSnapshot;
use crate::pipeline::orchestrator::{AudioPort, Pipeline, PipelineConfig};
use crate::pipeline::types::{LanguagePair, StreamFormat, TranscriptMessage};
use crate::stt::recognizer::RecognitionBackend;
use crate::stt::whisper::{WhisperOptions, WhisperRecognizer};
use crate::translate::translator::{PassThroughTranslator, Translator};
use crossbeam_channel::Receiver;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Host callback size used when cutting the input file.
const HOST_BLOCK_FRAMES: usize = 512;

/// Longest wait for synthesized audio after the input has ended.
const MAX_DRAIN: Duration = Duration::from_secs(10);

/// Output is considered complete after this long without new audio.
const DRAIN_QUIET: Duration = Duration::from_millis(300);

/// Result of one offline run.
#[derive(Debug)]
pub struct RunReport {
    /// Input with synthesized speech mixed in; may run past the input's end.
    pub output: WavClip,
    pub transcripts: Vec<TranscriptMessage>,
    pub stats: StatsSnapshot,
    /// False when the model failed to load and the input passed through dry.
    pub translated: bool,
}

/// Run the `run` command: WAV in → pipeline → mixed WAV out.
pub fn run_command(mut config: Config, args: RunArgs, verbosity: u8) -> Result<RunReport> {
    apply_overrides(&mut config, &args);
    config.validate()?;

    let clip = WavClip::open(&args.input)?;
    info!(
        input = %args.input.display(),
        sample_rate = clip.sample_rate,
        channels = clip.channels,
        duration_ms = clip.duration_ms(),
        "streaming input"
    );

    let mut pipeline = build_pipeline(&config, build_recognizer(&config))?;
    let report = stream_clip(
        &mut pipeline,
        &config.model_path(),
        &clip,
        args.realtime,
        |transcript| print_transcript(transcript, args.json),
        |line| {
            if verbosity > 0 {
                eprintln!("{}", line);
            }
        },
    )?;

    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.input));
    report.output.save(&output_path)?;

    if args.json {
        println!(
            "{}",
            serde_json::json!({ "output": output_path, "stats": report.stats })
        );
    } else {
        eprintln!("Wrote {}", output_path.display());
    }
    Ok(report)
}

/// Apply CLI overrides to the loaded configuration.
pub fn apply_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(model) = &args.model {
        config.recognition.model = model.to_string_lossy().into_owned();
    }
    if let Some(source) = &args.source {
        config.languages.source = source.clone();
    }
    if let Some(target) = &args.target {
        config.languages.target = target.clone();
    }
    if let Some(gender) = &args.gender {
        config.voice.gender = gender.clone();
    }
    if let Some(style) = &args.style {
        config.voice.style = Some(style.clone());
    }
}

/// `talk.wav` → `talk.translated.wav`
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{}.translated.wav", stem))
}

/// Recognition backend for the configured model.
pub fn build_recognizer(config: &Config) -> Box<dyn RecognitionBackend> {
    Box::new(WhisperRecognizer::new(WhisperOptions {
        threads: config.recognition.threads,
    }))
}

/// Translation backend for the configured service.
///
/// A Google backend without an API key, or in a build without the
/// `google-translate` feature, falls back to pass-through.
pub fn build_translator(config: &Config) -> Result<Arc<dyn Translator>> {
    match config.translation.backend {
        TranslationBackend::Passthrough => Ok(Arc::new(PassThroughTranslator)),
        TranslationBackend::Google => google_translator(config),
    }
}

#[cfg(feature = "google-translate")]
fn google_translator(config: &Config) -> Result<Arc<dyn Translator>> {
    use crate::translate::google::GoogleTranslator;

    let key = config.translation.api_key.clone().unwrap_or_default();
    if key.trim().is_empty() {
        warn!("translation.backend = google but no API key set; passing text through");
        return Ok(Arc::new(PassThroughTranslator));
    }
    let timeout = Duration::from_secs(config.translation.timeout_secs);
    Ok(Arc::new(GoogleTranslator::new(key, timeout)?))
}

#[cfg(not(feature = "google-translate"))]
fn google_translator(_config: &Config) -> Result<Arc<dyn Translator>> {
    warn!("built without google-translate; passing text through");
    Ok(Arc::new(PassThroughTranslator))
}

/// Assemble a pipeline from configuration.
pub fn build_pipeline(config: &Config, backend: Box<dyn RecognitionBackend>) -> Result<Pipeline> {
    let languages = LanguagePair::new(&config.languages.source, &config.languages.target);
    Ok(Pipeline::new(PipelineConfig::from(config), backend)
        .with_translator(build_translator(config)?)
        .with_settings(
            languages,
            config.voice.preference(),
            config.languages.auto_detect,
        ))
}

/// Stream `clip` through `pipeline` block by block and collect the mix.
///
/// With `realtime` the blocks are paced at the clip's sample rate and input
/// that does not fit the ring is dropped, as a live host would. Otherwise the
/// host waits out back-pressure so no input is lost.
///
/// If the model fails to load the clip is returned unchanged with
/// `translated = false`.
pub fn stream_clip(
    pipeline: &mut Pipeline,
    model_path: &Path,
    clip: &WavClip,
    realtime: bool,
    mut on_transcript: impl FnMut(&TranscriptMessage),
    mut on_debug: impl FnMut(&str),
) -> Result<RunReport> {
    let format = StreamFormat::new(clip.sample_rate, clip.channels);
    format.validate()?;

    let (listener_tx, listener_rx) = crossbeam_channel::unbounded();
    pipeline.set_transcript_listener(listener_tx);

    let mut port = match pipeline.start(model_path, format) {
        Ok(port) => port,
        Err(e) => {
            warn!(error = %e, "pipeline unavailable; writing input unchanged");
            drain_debug(pipeline, &mut on_debug);
            return Ok(RunReport {
                output: clip.clone(),
                transcripts: Vec::new(),
                stats: pipeline.stats(),
                translated: false,
            });
        }
    };

    let mut host = OfflineHost::new(format, realtime);
    let mut transcripts = Vec::new();
    let mut collect = |pipeline: &Pipeline, rx: &Receiver<TranscriptMessage>| {
        for transcript in rx.try_iter() {
            on_transcript(&transcript);
            transcripts.push(transcript);
        }
        drain_debug(pipeline, &mut on_debug);
    };

    for block in clip.samples.chunks(HOST_BLOCK_FRAMES * clip.channels) {
        host.process(&mut port, block);
        collect(pipeline, &listener_rx);
    }

    // Let the worker catch up, then run one window of silence so the last
    // stretch of speech gets a recognition pass.
    host.wait_for_backlog(&port);
    let tail_frames = pipeline.config().recognition.window_samples * clip.sample_rate as usize
        / defaults::TARGET_SAMPLE_RATE as usize;
    let tail = vec![0.0f32; tail_frames * clip.channels];
    host.realtime = true;
    for block in tail.chunks(HOST_BLOCK_FRAMES * clip.channels) {
        host.process(&mut port, block);
        collect(pipeline, &listener_rx);
    }

    host.drain_output(&mut port);
    pipeline.stop();
    collect(pipeline, &listener_rx);

    Ok(RunReport {
        output: WavClip {
            samples: host.mixed,
            sample_rate: clip.sample_rate,
            channels: clip.channels,
        },
        transcripts,
        stats: pipeline.stats(),
        translated: true,
    })
}

fn drain_debug(pipeline: &Pipeline, on_debug: &mut impl FnMut(&str)) {
    let log = pipeline.drain_debug_log();
    for line in log.lines() {
        on_debug(line);
    }
}

fn print_transcript(transcript: &TranscriptMessage, json: bool) {
    if json {
        match serde_json::to_string(transcript) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!(error = %e, "failed to encode transcript"),
        }
    } else {
        println!(
            "[{:>7.2}s - {:>7.2}s] ({}) {}",
            transcript.start_secs, transcript.end_secs, transcript.language, transcript.text
        );
    }
}

/// Simulated audio thread.
struct OfflineHost {
    format: StreamFormat,
    realtime: bool,
    block_duration: Duration,
    next_deadline: Option<Instant>,
    mixed: Vec<f32>,
}

impl OfflineHost {
    fn new(format: StreamFormat, realtime: bool) -> Self {
        Self {
            format,
            realtime,
            block_duration: Duration::from_secs_f64(
                HOST_BLOCK_FRAMES as f64 / f64::from(format.sample_rate),
            ),
            next_deadline: None,
            mixed: Vec::new(),
        }
    }

    /// One host callback: push the block, mix synthesized audio over it.
    fn process(&mut self, port: &mut AudioPort, block: &[f32]) {
        let channels = self.format.channels;
        let frames = block.len() / channels;

        if self.realtime {
            self.pace();
            port.push_audio(block, channels, self.format.sample_rate);
        } else {
            let mut offset = 0;
            while offset < frames {
                let pushed = port.push_audio(
                    &block[offset * channels..],
                    channels,
                    self.format.sample_rate,
                );
                if pushed == 0 {
                    if !port.is_running() {
                        break;
                    }
                    thread::sleep(Duration::from_millis(1));
                }
                offset += pushed;
            }
        }

        let start = self.mixed.len();
        self.mixed.extend_from_slice(&block[..frames * channels]);
        port.mix_output(&mut self.mixed[start..], channels);
    }

    fn pace(&mut self) {
        let now = Instant::now();
        let deadline = self.next_deadline.unwrap_or(now) + self.block_duration;
        if deadline > now {
            thread::sleep(deadline - now);
        }
        self.next_deadline = Some(deadline.max(now));
    }

    fn wait_for_backlog(&self, port: &AudioPort) {
        let deadline = Instant::now() + MAX_DRAIN;
        while port.input_backlog_frames() > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
    }

    /// Keep the stream going with silence until synthesis goes quiet.
    fn drain_output(&mut self, port: &mut AudioPort) {
        let channels = self.format.channels;
        let silence = vec![0.0f32; HOST_BLOCK_FRAMES * channels];
        let started = Instant::now();
        let mut last_audio = Instant::now();

        while started.elapsed() < MAX_DRAIN && last_audio.elapsed() < DRAIN_QUIET {
            if port.pending_output_frames() > 0 {
                last_audio = Instant::now();
                self.process(port, &silence);
            } else {
                port.push_audio(&silence, channels, self.format.sample_rate);
                thread::sleep(Duration::from_millis(5));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stt::recognizer::MockRecognizer;
    use crate::translate::translator::MockTranslator;

    fn tone_clip(seconds: f32, sample_rate: u32, channels: usize) -> WavClip {
        let frames = (seconds * sample_rate as f32) as usize;
        let samples = (0..frames)
            .flat_map(|n| {
                let v = 0.4
                    * (2.0 * std::f32::consts::PI * 300.0 * n as f32 / sample_rate as f32).sin();
                std::iter::repeat_n(v, channels)
            })
            .collect();
        WavClip {
            samples,
            sample_rate,
            channels,
        }
    }

    fn fast_config() -> Config {
        let mut config = Config::default();
        config.pipeline.window_ms = 500;
        config.pipeline.hop_ms = 250;
        config
    }

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("/tmp/talk.wav")),
            PathBuf::from("/tmp/talk.translated.wav")
        );
        assert_eq!(
            default_output_path(Path::new("clip")),
            PathBuf::from("clip.translated.wav")
        );
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = Config::default();
        let args = RunArgs {
            model: Some(PathBuf::from("/models/small.bin")),
            source: Some("de".to_string()),
            target: Some("fr".to_string()),
            gender: Some("male".to_string()),
            style: Some("Warm".to_string()),
            ..RunArgs::default()
        };
        apply_overrides(&mut config, &args);

        assert_eq!(config.recognition.model, "/models/small.bin");
        assert_eq!(config.languages.source, "de");
        assert_eq!(config.languages.target, "fr");
        assert_eq!(config.voice.gender, "male");
        assert_eq!(config.voice.style.as_deref(), Some("Warm"));
    }

    #[test]
    fn test_passthrough_translator_by_default() {
        let translator = build_translator(&Config::default()).unwrap();
        assert_eq!(translator.name(), "passthrough");
    }

    #[test]
    fn test_stream_clip_mixes_synthesized_speech() {
        let config = fast_config();
        let translator = MockTranslator::new().with_prefix("en");
        let calls = translator.call_counter();
        let mut pipeline = build_pipeline(
            &config,
            Box::new(MockRecognizer::new().with_response("guten tag").with_language("de")),
        )
        .unwrap()
        .with_translator(Arc::new(translator));

        let clip = tone_clip(1.0, 48000, 2);
        let report = stream_clip(
            &mut pipeline,
            Path::new("model.bin"),
            &clip,
            false,
            |_| {},
            |_| {},
        )
        .unwrap();

        assert!(report.translated);
        assert!(!report.transcripts.is_empty());
        assert_eq!(report.transcripts[0].text, "guten tag");
        assert!(calls.load(std::sync::atomic::Ordering::SeqCst) >= 1);
        assert!(report.output.frames() >= clip.frames());
        assert_eq!(report.output.channels, 2);
        assert!(report.stats.utterances_synthesized >= 1);

        // Somewhere the mix must differ from the dry input.
        let differs = report
            .output
            .samples
            .iter()
            .zip(&clip.samples)
            .any(|(a, b)| (a - b).abs() > 1e-6)
            || report.output.samples.len() > clip.samples.len();
        assert!(differs);
    }

    #[test]
    fn test_stream_clip_passes_audio_through_on_model_failure() {
        let config = fast_config();
        let mut pipeline =
            build_pipeline(&config, Box::new(MockRecognizer::new().with_load_failure())).unwrap();
        let clip = tone_clip(0.2, 16000, 1);

        let mut debug_lines = Vec::new();
        let report = stream_clip(
            &mut pipeline,
            Path::new("missing.bin"),
            &clip,
            false,
            |_| {},
            |line| debug_lines.push(line.to_string()),
        )
        .unwrap();

        assert!(!report.translated);
        assert_eq!(report.output, clip);
        assert!(debug_lines.iter().any(|l| l.contains("Model load failed")));
    }
}
