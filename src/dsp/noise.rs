//! White noise source.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::graph::{Kernel, RenderContext, Sampler, SamplerRef};

/// Uniform white noise in [-1, 1].
#[derive(Debug, Clone)]
pub struct Noise {
    rng: StdRng,
}

impl Noise {
    pub fn new(rng: StdRng) -> Self {
        Noise { rng }
    }

    /// Deterministic noise, identical for identical seeds.
    pub fn seeded(seed: u64) -> Self {
        Noise::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Noise::new(StdRng::from_entropy())
    }

    pub fn into_sampler(self) -> SamplerRef {
        Sampler::generator(self)
    }
}

impl Kernel for Noise {
    fn next_sample(&mut self, _ctx: &RenderContext, _time: f64) -> f64 {
        self.rng.gen_range(-1.0..=1.0)
    }
}
