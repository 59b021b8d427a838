//! Audio primitives shared by the real-time side and the worker.

pub mod resample;
pub mod ring_buffer;
pub mod wav;

pub use resample::StreamResampler;
pub use ring_buffer::{RingConsumer, RingProducer, ring_buffer};
pub use wav::WavClip;
