//! Karplus-Strong plucked string.
//!
//! A noise-seeded ring buffer fed back through a 3-tap average. The read
//! position follows the shared clock tick, so several strings rendered against
//! the same [`RenderContext`] stay aligned with the render timeline.

use rand::Rng;

use super::graph::{Kernel, RenderContext, Sampler, SamplerRef};

#[derive(Debug, Clone)]
pub struct KarplusStrong {
    buffer: Vec<f64>,
}

impl KarplusStrong {
    /// `frequency` is fixed for the life of the string.
    ///
    /// The delay line holds between 1 and one second of samples; a zero
    /// frequency gets the longest line, a negative or NaN one the shortest.
    pub fn new(ctx: &RenderContext, frequency: f64, amplitude: f64, rng: &mut impl Rng) -> Self {
        let period = (ctx.sample_rate() / frequency).floor();
        let len = if period.is_nan() {
            1
        } else {
            period.clamp(1.0, ctx.sample_rate().max(1.0)) as usize
        };
        let buffer = (0..len)
            .map(|_| rng.gen_range(-1.0..=1.0) * amplitude)
            .collect();
        KarplusStrong { buffer }
    }

    /// Length of the delay line in samples.
    pub fn period(&self) -> usize {
        self.buffer.len()
    }

    pub fn into_sampler(self) -> SamplerRef {
        Sampler::generator(self)
    }
}

impl Kernel for KarplusStrong {
    fn next_sample(&mut self, ctx: &RenderContext, _time: f64) -> f64 {
        let n = self.buffer.len();
        let pos = (ctx.tick() % n as u64) as usize;
        let out = self.buffer[pos];
        self.buffer[pos] = (out + self.buffer[(pos + 1) % n] + self.buffer[(pos + 2) % n]) / 3.0;
        out
    }
}
