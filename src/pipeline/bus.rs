//! Message bus between recognition, synthesis and mixing.
//!
//! Two unbounded queues: recognized text and synthesized audio chunks. Any
//! number of producers may push (synthesizers get a sender through their
//! [`ChunkSink`](crate::tts::ChunkSink)); the worker drains both queues
//! completely once per loop iteration.

use crate::pipeline::types::{SynthesizedAudio, TranscriptMessage};
use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct MessageBus {
    text_tx: Sender<TranscriptMessage>,
    text_rx: Receiver<TranscriptMessage>,
    audio_tx: Sender<SynthesizedAudio>,
    audio_rx: Receiver<SynthesizedAudio>,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus {
    pub fn new() -> Self {
        let (text_tx, text_rx) = unbounded();
        let (audio_tx, audio_rx) = unbounded();
        Self {
            text_tx,
            text_rx,
            audio_tx,
            audio_rx,
        }
    }

    pub fn push_text(&self, message: TranscriptMessage) {
        if self.text_tx.send(message).is_err() {
            debug!("text queue disconnected; transcript dropped");
        }
    }

    /// Take every queued transcript, oldest first.
    pub fn drain_text(&self) -> Vec<TranscriptMessage> {
        self.text_rx.try_iter().collect()
    }

    /// Take every queued audio chunk, oldest first.
    pub fn drain_audio(&self) -> Vec<SynthesizedAudio> {
        self.audio_rx.try_iter().collect()
    }

    /// Sender for streamed synthesis output.
    pub fn audio_sender(&self) -> Sender<SynthesizedAudio> {
        self.audio_tx.clone()
    }
}
