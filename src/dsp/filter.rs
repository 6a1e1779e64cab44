//! Biquad filter with per-sample sweepable cutoff and Q.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use super::graph::{Kernel, RenderContext, Sampler, SamplerRef};

/// Filter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterType {
    Lowpass,
    Highpass,
}

/// Normalised-by-`a0` coefficients of one biquad section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coefficients {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Coefficients {
    /// Audio EQ Cookbook (Robert Bristow-Johnson) low/high-pass.
    ///
    /// A `q` of exactly 0 yields `alpha = 0` instead of a division by zero.
    pub fn new(filter_type: FilterType, frequency: f64, q: f64, sample_rate: f64) -> Self {
        let w0 = 2.0 * PI * frequency / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = if q == 0.0 { 0.0 } else { sin_w0 / (2.0 * q) };

        let sign = match filter_type {
            FilterType::Highpass => 1.0,
            FilterType::Lowpass => -1.0,
        };
        let b0 = (1.0 + sign * cos_w0) / 2.0;
        let b1 = -sign - cos_w0;
        let b2 = b0;
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        Coefficients {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }
}

/// A biquad IIR filter (2nd order), Direct Form I.
///
/// Coefficients are recomputed from the cutoff and Q samplers on every tick
/// and the output is clamped to [-1, 1].
#[derive(Debug)]
pub struct BiquadFilter {
    source: SamplerRef,
    filter_type: FilterType,
    frequency: SamplerRef,
    q: SamplerRef,

    x0: f64,
    x1: f64,
    y0: f64,
    y1: f64,
}

impl BiquadFilter {
    pub fn new(
        source: SamplerRef,
        filter_type: FilterType,
        frequency: SamplerRef,
        q: SamplerRef,
    ) -> Self {
        BiquadFilter {
            source,
            filter_type,
            frequency,
            q,
            x0: 0.0,
            x1: 0.0,
            y0: 0.0,
            y1: 0.0,
        }
    }

    pub fn into_sampler(self) -> SamplerRef {
        Sampler::generator(self)
    }

    /// Reset filter state.
    pub fn reset(&mut self) {
        self.x0 = 0.0;
        self.x1 = 0.0;
        self.y0 = 0.0;
        self.y1 = 0.0;
    }
}

impl Kernel for BiquadFilter {
    fn next_sample(&mut self, ctx: &RenderContext, _time: f64) -> f64 {
        let input = self.source.evaluate(ctx);
        let c = Coefficients::new(
            self.filter_type,
            self.frequency.evaluate(ctx),
            self.q.evaluate(ctx),
            ctx.sample_rate(),
        );

        let out = (c.b0 * input + c.b1 * self.x0 + c.b2 * self.x1 - c.a1 * self.y0 - c.a2 * self.y1)
            .clamp(-1.0, 1.0);

        self.x1 = self.x0;
        self.x0 = input;
        self.y1 = self.y0;
        self.y0 = out;
        out
    }
}
