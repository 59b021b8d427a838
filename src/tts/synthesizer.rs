use crate::error::{LiveTransError, Result};
use crate::pipeline::types::SynthesizedAudio;
use crate::tts::voice::VoiceProfile;
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Handoff for streamed synthesis output.
///
/// Each chunk becomes a [`SynthesizedAudio`] message on the bus, so a
/// synthesizer may call [`ChunkSink::send`] from any thread. Exactly one final
/// chunk is delivered per utterance: chunks after the final one are ignored,
/// and [`ChunkSink::finish`] supplies an empty final chunk if the synthesizer
/// never sent one.
#[derive(Debug)]
pub struct ChunkSink {
    utterance: u64,
    sender: Sender<SynthesizedAudio>,
    finished: AtomicBool,
    chunks: AtomicUsize,
}

impl ChunkSink {
    pub fn new(utterance: u64, sender: Sender<SynthesizedAudio>) -> Self {
        Self {
            utterance,
            sender,
            finished: AtomicBool::new(false),
            chunks: AtomicUsize::new(0),
        }
    }

    pub fn utterance(&self) -> u64 {
        self.utterance
    }

    /// Deliver one chunk of 16kHz mono PCM.
    ///
    /// Returns false if the utterance is already finished or the bus is gone.
    pub fn send(&self, pcm_16k: Vec<f32>, is_final: bool) -> bool {
        if is_final {
            if self.finished.swap(true, Ordering::AcqRel) {
                return false;
            }
        } else if self.finished.load(Ordering::Acquire) {
            return false;
        }
        self.chunks.fetch_add(1, Ordering::Relaxed);
        self.sender
            .send(SynthesizedAudio {
                utterance: self.utterance,
                pcm_16k,
                is_final,
            })
            .is_ok()
    }

    /// Close the utterance with an empty final chunk unless one was sent.
    pub fn finish(&self) {
        if !self.is_finished() {
            self.send(Vec::new(), true);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Chunks accepted so far, including the final one.
    pub fn chunk_count(&self) -> usize {
        self.chunks.load(Ordering::Relaxed)
    }
}

/// Trait for speech synthesis backends.
///
/// `synthesize` streams 16kHz mono PCM into `sink` and may send zero or more
/// chunks. An error means the utterance produced no usable audio; the caller
/// closes the sink either way.
pub trait SpeechSynthesizer: Send + Sync {
    fn synthesize(&self, text: &str, voice: &VoiceProfile, sink: &ChunkSink) -> Result<()>;

    /// Backend name for logs.
    fn name(&self) -> &str;
}

impl<T: SpeechSynthesizer + ?Sized> SpeechSynthesizer for Arc<T> {
    fn synthesize(&self, text: &str, voice: &VoiceProfile, sink: &ChunkSink) -> Result<()> {
        (**self).synthesize(text, voice, sink)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: SpeechSynthesizer + ?Sized> SpeechSynthesizer for Box<T> {
    fn synthesize(&self, text: &str, voice: &VoiceProfile, sink: &ChunkSink) -> Result<()> {
        (**self).synthesize(text, voice, sink)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Mock synthesizer for testing
///
/// Emits `chunks` chunks of constant-amplitude PCM per utterance, the last
/// flagged final.
#[derive(Debug, Clone)]
pub struct MockSynthesizer {
    chunks: usize,
    samples_per_chunk: usize,
    amplitude: f32,
    should_fail: bool,
    fail_after: Option<usize>,
    skip_final: bool,
    calls: Arc<Mutex<Vec<(String, VoiceProfile)>>>,
    call_count: Arc<AtomicUsize>,
}

impl Default for MockSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSynthesizer {
    pub fn new() -> Self {
        Self {
            chunks: 2,
            samples_per_chunk: 1600,
            amplitude: 0.25,
            should_fail: false,
            fail_after: None,
            skip_final: false,
            calls: Arc::new(Mutex::new(Vec::new())),
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of chunks per utterance
    pub fn with_chunks(mut self, chunks: usize) -> Self {
        self.chunks = chunks;
        self
    }

    /// Samples per chunk (16kHz)
    pub fn with_samples_per_chunk(mut self, samples: usize) -> Self {
        self.samples_per_chunk = samples;
        self
    }

    /// Configure the mock to fail without sending anything
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Send `chunks` non-final chunks, then fail mid-utterance
    pub fn with_failure_after(mut self, chunks: usize) -> Self {
        self.fail_after = Some(chunks);
        self
    }

    /// Never flag a chunk final, leaving it to the caller to close the sink
    pub fn without_final(mut self) -> Self {
        self.skip_final = true;
        self
    }

    /// Shared log of (text, voice) for every call
    pub fn calls(&self) -> Arc<Mutex<Vec<(String, VoiceProfile)>>> {
        self.calls.clone()
    }

    /// Shared call counter
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.call_count.clone()
    }
}

impl SpeechSynthesizer for MockSynthesizer {
    fn synthesize(&self, text: &str, voice: &VoiceProfile, sink: &ChunkSink) -> Result<()> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((text.to_string(), voice.clone()));
        }
        if self.should_fail {
            return Err(LiveTransError::Synthesis {
                message: "mock synthesis failure".to_string(),
            });
        }
        if let Some(sent) = self.fail_after {
            for _ in 0..sent {
                sink.send(vec![self.amplitude; self.samples_per_chunk], false);
            }
            return Err(LiveTransError::Synthesis {
                message: "mock synthesis failed mid-utterance".to_string(),
            });
        }
        for i in 0..self.chunks {
            let is_final = !self.skip_final && i + 1 == self.chunks;
            sink.send(vec![self.amplitude; self.samples_per_chunk], is_final);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
