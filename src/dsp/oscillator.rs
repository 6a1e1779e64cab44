//! Additive band-limited oscillators with hard sync.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use super::graph::{Kernel, RenderContext, Sampler, SamplerRef};

/// Number of odd (or consecutive, for sawtooth) partials summed by the
/// band-limited shapes.
const HARMONICS: usize = 6;

/// Supported waveform shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Waveform {
    Sine,
    /// Band-limited square (odd harmonics, 1/n).
    Square,
    /// Band-limited triangle (odd harmonics, 1/n², alternating sign).
    Triangle,
    /// Band-limited sawtooth (all harmonics, 1/n).
    Sawtooth,
    /// Hard ±1 square straight from the phase. Aliases.
    NaiveSquare,
}

/// Phase-accumulating oscillator driven by a frequency sampler.
#[derive(Debug)]
pub struct Oscillator {
    waveform: Waveform,
    frequency: SamplerRef,
    sync: Option<SamplerRef>,
    /// Grows without bound; only the fractional part is meaningful.
    phase: f64,
    prev_sync: bool,
}

impl Oscillator {
    pub fn new(waveform: Waveform, frequency: SamplerRef) -> Self {
        Oscillator {
            waveform,
            frequency,
            sync: None,
            phase: 0.0,
            prev_sync: false,
        }
    }

    /// Reset the phase whenever `sync` goes from anything else to exactly 1.
    pub fn with_sync(mut self, sync: SamplerRef) -> Self {
        self.sync = Some(sync);
        self
    }

    pub fn into_sampler(self) -> SamplerRef {
        Sampler::generator(self)
    }

    fn shape(&self) -> f64 {
        let x = self.phase * 2.0 * PI;
        match self.waveform {
            Waveform::NaiveSquare => (fract(self.phase) * 2.0).floor() * 2.0 - 1.0,
            Waveform::Sine => x.sin(),
            Waveform::Square => (0..HARMONICS)
                .map(|i| {
                    let n = (2 * i + 1) as f64;
                    (n * x).sin() / n
                })
                .sum(),
            Waveform::Triangle => (0..HARMONICS)
                .map(|i| {
                    let n = (2 * i + 1) as f64;
                    let sign = if i == 0 { 1.0 } else { -1.0 };
                    sign * (n * x).sin() / (n * n)
                })
                .sum(),
            Waveform::Sawtooth => (1..=HARMONICS)
                .map(|i| {
                    let n = i as f64;
                    (n * x).sin() / n
                })
                .sum(),
        }
    }
}

impl Kernel for Oscillator {
    fn next_sample(&mut self, ctx: &RenderContext, _time: f64) -> f64 {
        let sync = self
            .sync
            .as_ref()
            .is_some_and(|s| s.evaluate(ctx) == 1.0);
        if sync && !self.prev_sync {
            self.phase = 0.0;
        }
        self.prev_sync = sync;

        let out = self.shape();
        self.phase += self.frequency.evaluate(ctx) / ctx.sample_rate();
        out
    }
}

fn fract(x: f64) -> f64 {
    x - x.floor()
}
