//! Adder: sums independent voices into one signal.

use super::graph::{Kernel, RenderContext, Sampler, SamplerRef};

/// Sum of a fixed set of sub-samplers. No gain staging or clipping.
#[derive(Debug, Clone)]
pub struct Adder {
    inputs: Vec<SamplerRef>,
}

impl Adder {
    pub fn new(inputs: Vec<SamplerRef>) -> Self {
        Adder { inputs }
    }

    pub fn into_sampler(self) -> SamplerRef {
        Sampler::generator(self)
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

impl Kernel for Adder {
    fn next_sample(&mut self, ctx: &RenderContext, _time: f64) -> f64 {
        self.inputs.iter().map(|s| s.evaluate(ctx)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::noise::Noise;

    #[test]
    fn empty_adder_is_silent() {
        let ctx = RenderContext::new(44100.0);
        assert_eq!(Adder::new(vec![]).into_sampler().evaluate(&ctx), 0.0);
    }

    #[test]
    fn accumulates_inputs() {
        let ctx = RenderContext::new(44100.0);
        let sum = Adder::new(vec![
            Sampler::constant(0.5),
            Sampler::constant(0.3),
            Sampler::product(vec![Sampler::constant(2.0), Sampler::constant(-1.0)]),
        ])
        .into_sampler();
        assert!((sum.evaluate(&ctx) - (-1.2)).abs() < 1e-12);
    }

    #[test]
    fn shared_input_counted_twice_but_computed_once() {
        let mut ctx = RenderContext::new(44100.0);
        let noise = Noise::seeded(5).into_sampler();
        let sum = Adder::new(vec![noise.clone(), noise.clone()]).into_sampler();
        for _ in 0..32 {
            let total = sum.evaluate(&ctx);
            assert!((total - 2.0 * noise.evaluate(&ctx)).abs() < 1e-12);
            ctx.advance();
        }
    }
}
