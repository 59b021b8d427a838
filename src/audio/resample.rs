//! Streaming sample-rate conversion between the host rate and 16kHz.
//!
//! [`StreamResampler`] is a 4-point Lagrange interpolator that carries its
//! history and fractional read position across calls, so feeding a stream in
//! arbitrary chunks yields the same samples as feeding it in one piece. Each
//! direction (host to 16kHz, 16kHz to host) keeps its own instance.

/// Samples of history kept between calls (the interpolator looks one sample
/// back and two ahead).
const HISTORY: usize = 3;

/// One-direction streaming resampler.
#[derive(Debug, Clone)]
pub struct StreamResampler {
    history: [f32; HISTORY],
    /// Integer read position in the virtual stream `history ++ input`.
    whole: usize,
    /// Fractional read position, in units of `1 / rates.1`.
    frac: u64,
    /// `(from, to)` of the previous call.
    rates: (u32, u32),
}

impl Default for StreamResampler {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamResampler {
    pub fn new() -> Self {
        Self {
            history: [0.0; HISTORY],
            whole: HISTORY,
            frac: 0,
            rates: (0, 0),
        }
    }

    /// Clear interpolation history. Call when the stream restarts.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Resample `input` from `from_rate` to `to_rate`, appending to `out`.
    ///
    /// Returns the number of samples appended. Equal rates copy through.
    pub fn process_into(
        &mut self,
        input: &[f32],
        from_rate: u32,
        to_rate: u32,
        out: &mut Vec<f32>,
    ) -> usize {
        if input.is_empty() || from_rate == 0 || to_rate == 0 {
            return 0;
        }
        if from_rate == to_rate {
            out.extend_from_slice(input);
            return input.len();
        }

        let (from, to) = (u64::from(from_rate), u64::from(to_rate));
        if self.rates != (from_rate, to_rate) {
            let previous_to = u64::from(self.rates.1);
            if previous_to > 0 {
                self.frac = self.frac * to / previous_to;
            }
            self.rates = (from_rate, to_rate);
        }
        let step_whole = (from / to) as usize;
        let step_frac = from % to;

        let n = input.len();
        let before = out.len();
        out.reserve((n as u64 * to / from) as usize + 1);

        let sample = |idx: usize| -> f32 {
            if idx < HISTORY {
                self.history[idx]
            } else {
                input[idx - HISTORY]
            }
        };

        // The last virtual index is n + HISTORY - 1, and interpolating at
        // `whole` needs the sample two ahead of it.
        while self.whole < n + HISTORY - 2 {
            let base = self.whole;
            let t = (self.frac as f64 / to as f64) as f32;
            let y = lagrange4(
                sample(base - 1),
                sample(base),
                sample(base + 1),
                sample(base + 2),
                t,
            );
            out.push(y);

            self.frac += step_frac;
            self.whole += step_whole + (self.frac / to) as usize;
            self.frac %= to;
        }

        self.whole -= n;
        let mut next = [0.0f32; HISTORY];
        for (k, slot) in next.iter_mut().enumerate() {
            *slot = sample(n + k);
        }
        self.history = next;

        out.len() - before
    }

    /// Resample `input`, returning a fresh buffer.
    pub fn process(&mut self, input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
        let mut out = Vec::new();
        self.process_into(input, from_rate, to_rate, &mut out);
        out
    }
}

/// Interpolate between `p1` and `p2` at fraction `t` using nodes -1, 0, 1, 2.
fn lagrange4(p0: f32, p1: f32, p2: f32, p3: f32, t: f32) -> f32 {
    let c0 = -t * (t - 1.0) * (t - 2.0) / 6.0;
    let c1 = (t + 1.0) * (t - 1.0) * (t - 2.0) / 2.0;
    let c2 = -(t + 1.0) * t * (t - 2.0) / 2.0;
    let c3 = (t + 1.0) * t * (t - 1.0) / 6.0;
    p0 * c0 + p1 * c1 + p2 * c2 + p3 * c3
}
