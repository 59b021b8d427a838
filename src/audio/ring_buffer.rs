//! Single-producer/single-consumer ring buffer for interleaved audio.
//!
//! This is the only structure that crosses the real-time boundary. It wraps a
//! `ringbuf` heap buffer of `capacity * channels` samples and adds whole-frame
//! semantics on top. Each half is `Send` but not `Clone` and both operations
//! take `&mut self`, so the one-writer/one-reader topology is enforced at
//! compile time.
//!
//! Only the producer shrinks free space and only the consumer shrinks
//! occupied space, so a length checked before `push_slice`/`pop_slice` can
//! only grow until the call. Rounding that length down to whole frames keeps
//! every transfer frame-aligned.

use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::Arc;

/// Create a ring buffer holding `capacity_frames` frames of `channels` samples.
///
/// Zero capacity or zero channels are bumped to one.
pub fn ring_buffer(capacity_frames: usize, channels: usize) -> (RingProducer, RingConsumer) {
    let capacity = capacity_frames.max(1);
    let channels = channels.max(1);
    let (inner_tx, inner_rx) = HeapRb::<f32>::new(capacity * channels).split();
    let id = Arc::new(());

    (
        RingProducer {
            inner: inner_tx,
            capacity,
            channels,
            id: Arc::clone(&id),
        },
        RingConsumer {
            inner: inner_rx,
            capacity,
            channels,
            id,
        },
    )
}

/// Drop everything queued in a ring buffer.
///
/// Holding `&mut` to both halves proves neither side is mid-operation on
/// another thread. Returns `false` (and does nothing) when the halves belong
/// to different buffers.
pub fn clear(producer: &mut RingProducer, consumer: &mut RingConsumer) -> bool {
    if !Arc::ptr_eq(&producer.id, &consumer.id) {
        return false;
    }
    consumer.inner.clear();
    true
}

/// Writing half of the ring buffer.
pub struct RingProducer {
    inner: HeapProd<f32>,
    capacity: usize,
    channels: usize,
    id: Arc<()>,
}

impl RingProducer {
    /// Push whole frames from `interleaved`, returning the number of frames written.
    ///
    /// Writes as many frames as there is room for and never blocks; a short
    /// count is the back-pressure signal. A trailing partial frame is ignored.
    pub fn push(&mut self, interleaved: &[f32]) -> usize {
        let frames = (interleaved.len() / self.channels).min(self.free_frames());
        if frames == 0 {
            return 0;
        }
        let written = self.inner.push_slice(&interleaved[..frames * self.channels]);
        debug_assert_eq!(written, frames * self.channels);
        written / self.channels
    }

    /// Frames that can currently be pushed without dropping.
    pub fn free_frames(&self) -> usize {
        self.inner.vacant_len() / self.channels
    }

    pub fn capacity_frames(&self) -> usize {
        self.capacity
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}

/// Reading half of the ring buffer.
pub struct RingConsumer {
    inner: HeapCons<f32>,
    capacity: usize,
    channels: usize,
    id: Arc<()>,
}

impl RingConsumer {
    /// Pop whole frames into `interleaved`, returning the number of frames read.
    ///
    /// Reads at most `interleaved.len() / channels` frames and never blocks.
    pub fn pop(&mut self, interleaved: &mut [f32]) -> usize {
        let frames = (interleaved.len() / self.channels).min(self.available_frames());
        if frames == 0 {
            return 0;
        }
        let read = self.inner.pop_slice(&mut interleaved[..frames * self.channels]);
        debug_assert_eq!(read, frames * self.channels);
        read / self.channels
    }

    /// Frames currently waiting to be popped.
    pub fn available_frames(&self) -> usize {
        self.inner.occupied_len() / self.channels
    }

    pub fn capacity_frames(&self) -> usize {
        self.capacity
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(start: usize, frames: usize, channels: usize) -> Vec<f32> {
        (0..frames * channels)
            .map(|i| (start * channels + i) as f32)
            .collect()
    }

    #[test]
    fn test_push_pop_preserves_order() {
        let (mut tx, mut rx) = ring_buffer(8, 1);
        assert_eq!(tx.push(&[1.0, 2.0, 3.0]), 3);

        let mut out = [0.0f32; 3];
        assert_eq!(rx.pop(&mut out), 3);
        assert_eq!(out, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_push_returns_short_count_when_full() {
        let (mut tx, rx) = ring_buffer(4, 2);
        let written = tx.push(&ramp(0, 6, 2));
        assert_eq!(written, 4);
        assert_eq!(tx.free_frames(), 0);
        assert_eq!(rx.available_frames(), 4);
        assert_eq!(tx.push(&ramp(0, 1, 2)), 0);
    }

    #[test]
    fn test_pop_on_empty_returns_zero() {
        let (_tx, mut rx) = ring_buffer(4, 1);
        let mut out = [0.0f32; 4];
        assert_eq!(rx.pop(&mut out), 0);
    }

    #[test]
    fn test_partial_trailing_frame_is_ignored() {
        let (mut tx, mut rx) = ring_buffer(4, 2);
        assert_eq!(tx.push(&[1.0, 2.0, 3.0]), 1);

        let mut out = [0.0f32; 5];
        assert_eq!(rx.pop(&mut out), 1);
        assert_eq!(&out[..2], &[1.0, 2.0]);
    }

    #[test]
    fn test_wrap_around_multichannel() {
        let (mut tx, mut rx) = ring_buffer(5, 2);
        let mut out = vec![0.0f32; 10];

        assert_eq!(tx.push(&ramp(0, 4, 2)), 4);
        assert_eq!(rx.pop(&mut out[..6]), 3);
        assert_eq!(&out[..6], ramp(0, 3, 2).as_slice());

        // Write crosses the end of the storage.
        assert_eq!(tx.push(&ramp(4, 4, 2)), 4);
        assert_eq!(rx.available_frames(), 5);

        assert_eq!(rx.pop(&mut out), 5);
        assert_eq!(out, ramp(3, 5, 2));
    }

    #[test]
    fn test_short_push_stays_frame_aligned() {
        let (mut tx, mut rx) = ring_buffer(3, 2);
        assert_eq!(tx.push(&ramp(0, 2, 2)), 2);

        let mut out = vec![0.0f32; 6];
        assert_eq!(rx.pop(&mut out[..2]), 1);

        // Two frames of room; the third is refused whole, never split.
        assert_eq!(tx.push(&ramp(2, 3, 2)), 2);
        assert_eq!(tx.free_frames(), 0);
        assert_eq!(rx.available_frames(), 3);

        assert_eq!(rx.pop(&mut out), 3);
        assert_eq!(out, ramp(1, 3, 2));
    }

    #[test]
    fn test_adversarial_chunk_sizes_preserve_stream() {
        for capacity in [1usize, 2, 3, 7, 16, 31] {
            let (mut tx, mut rx) = ring_buffer(capacity, 3);
            let source = ramp(0, 500, 3);
            let mut sink = Vec::new();
            let mut pushed = 0usize;
            let mut seed = 17usize;
            let mut scratch = vec![0.0f32; 64 * 3];

            while sink.len() < source.len() {
                seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
                let push_frames = (seed >> 8) % 9;
                let end = (pushed + push_frames).min(500);
                pushed += tx.push(&source[pushed * 3..end * 3]);

                seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
                let pop_frames = (seed >> 8) % 9;
                let got = rx.pop(&mut scratch[..pop_frames * 3]);
                sink.extend_from_slice(&scratch[..got * 3]);

                assert!(sink.len() <= pushed * 3);
            }

            assert_eq!(sink, source, "capacity {capacity}");
        }
    }

    #[test]
    fn test_clear_resets_both_counters() {
        let (mut tx, mut rx) = ring_buffer(4, 1);
        tx.push(&[1.0, 2.0, 3.0]);
        assert!(clear(&mut tx, &mut rx));
        assert_eq!(rx.available_frames(), 0);
        assert_eq!(tx.free_frames(), 4);

        tx.push(&[9.0]);
        let mut out = [0.0f32; 1];
        assert_eq!(rx.pop(&mut out), 1);
        assert_eq!(out[0], 9.0);
    }

    #[test]
    fn test_clear_rejects_mismatched_halves() {
        let (mut tx_a, _rx_a) = ring_buffer(4, 1);
        let (_tx_b, mut rx_b) = ring_buffer(4, 1);
        tx_a.push(&[1.0]);
        assert!(!clear(&mut tx_a, &mut rx_b));
        assert_eq!(tx_a.free_frames(), 3);
    }

    #[test]
    fn test_zero_sizes_are_bumped() {
        let (tx, rx) = ring_buffer(0, 0);
        assert_eq!(tx.capacity_frames(), 1);
        assert_eq!(rx.channels(), 1);
    }

    #[test]
    fn test_halves_are_send() {
        fn assert_send<T: Send>() {}
        assert_send::<RingProducer>();
        assert_send::<RingConsumer>();
    }
}
