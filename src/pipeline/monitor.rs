//! Display-facing state: last transcript, debug log and counters.
//!
//! Reads are short snapshots under a mutex that is never held during audio
//! processing. Counters are plain atomics so the audio thread can bump its
//! drop counters without locking.

use crate::defaults;
use serde::Serialize;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for one pipeline.
#[derive(Debug, Default)]
pub struct PipelineStats {
    pub input_frames_dropped: AtomicU64,
    pub output_frames_dropped: AtomicU64,
    pub recognition_passes: AtomicU64,
    pub silent_windows_skipped: AtomicU64,
    pub failed_passes: AtomicU64,
    pub transcripts: AtomicU64,
    pub utterances_synthesized: AtomicU64,
    pub utterances_skipped_same_language: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub input_frames_dropped: u64,
    pub output_frames_dropped: u64,
    pub recognition_passes: u64,
    pub silent_windows_skipped: u64,
    pub failed_passes: u64,
    pub transcripts: u64,
    pub utterances_synthesized: u64,
    pub utterances_skipped_same_language: u64,
}

impl PipelineStats {
    pub fn add(counter: &AtomicU64, n: u64) {
        if n > 0 {
            counter.fetch_add(n, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            input_frames_dropped: self.input_frames_dropped.load(Ordering::Relaxed),
            output_frames_dropped: self.output_frames_dropped.load(Ordering::Relaxed),
            recognition_passes: self.recognition_passes.load(Ordering::Relaxed),
            silent_windows_skipped: self.silent_windows_skipped.load(Ordering::Relaxed),
            failed_passes: self.failed_passes.load(Ordering::Relaxed),
            transcripts: self.transcripts.load(Ordering::Relaxed),
            utterances_synthesized: self.utterances_synthesized.load(Ordering::Relaxed),
            utterances_skipped_same_language: self
                .utterances_skipped_same_language
                .load(Ordering::Relaxed),
        }
    }
}

/// Shared diagnostics for one [`Pipeline`](crate::pipeline::Pipeline).
#[derive(Debug)]
pub struct Monitor {
    last_transcript: Mutex<String>,
    debug_log: Mutex<String>,
    debug_log_max_bytes: usize,
    stats: PipelineStats,
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new(defaults::DEBUG_LOG_MAX_BYTES)
    }
}

impl Monitor {
    pub fn new(debug_log_max_bytes: usize) -> Self {
        Self {
            last_transcript: Mutex::new(String::new()),
            debug_log: Mutex::new(String::new()),
            debug_log_max_bytes: debug_log_max_bytes.max(1),
            stats: PipelineStats::default(),
        }
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn set_last_transcript(&self, text: &str) {
        let mut guard = match self.last_transcript.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.clear();
        guard.push_str(text);
    }

    pub fn last_transcript(&self) -> String {
        match self.last_transcript.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Append one line, dropping the oldest lines beyond the byte cap.
    pub fn append_debug(&self, line: &str) {
        let mut log = match self.debug_log.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        log.push_str(line);
        log.push('\n');

        if log.len() > self.debug_log_max_bytes {
            let excess = log.len() - self.debug_log_max_bytes;
            // Cut just after the first newline at or past the excess
            let cut = match log.as_bytes()[excess - 1..].iter().position(|&b| b == b'\n') {
                Some(pos) => excess + pos,
                None => log.len(),
            };
            log.drain(..cut);
        }
    }

    /// Take everything logged since the previous drain.
    pub fn drain_debug_log(&self) -> String {
        let mut log = match self.debug_log.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::take(&mut *log)
    }
}
