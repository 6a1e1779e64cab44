//! ADSR envelope as a pure function of elapsed time.
//!
//! There is no gate: the note length is known up front (`held`), so the whole
//! curve is one continuous expression of the generator's own clock. Multiply it
//! into a product with a carrier to shape that carrier.

use serde::{Deserialize, Serialize};

use super::graph::{Kernel, RenderContext, Sampler, SamplerRef};

/// ADSR envelope with linear attack/decay/release curves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Envelope {
    /// How long the note is held before release may begin, in seconds.
    pub held: f64,
    /// Attack time in seconds.
    pub attack: f64,
    /// Decay time in seconds.
    pub decay: f64,
    /// Sustain level [0, 1].
    pub sustain: f64,
    /// Release time in seconds.
    pub release: f64,
}

impl Default for Envelope {
    fn default() -> Self {
        Envelope {
            held: 0.5,
            attack: 0.01,
            decay: 0.1,
            sustain: 0.7,
            release: 0.3,
        }
    }
}

impl Envelope {
    pub fn new(held: f64, attack: f64, decay: f64, sustain: f64, release: f64) -> Self {
        Envelope {
            held,
            attack,
            decay,
            sustain,
            release,
        }
    }

    /// Release never starts before attack and decay have finished.
    pub fn release_start(&self) -> f64 {
        self.held.max(self.attack + self.decay)
    }

    /// Time at which the envelope reaches silence for good.
    pub fn end(&self) -> f64 {
        self.release_start() + self.release
    }

    /// Envelope level at `t` seconds.
    pub fn level_at(&self, t: f64) -> f64 {
        let release_start = self.release_start();
        let attack = ramp(t, 0.0, self.attack);
        let sustain_release = self.sustain * (1.0 - ramp(t, release_start, release_start + self.release));
        lerp(attack, sustain_release, ramp(t, self.attack, self.attack + self.decay))
    }

    pub fn into_sampler(self) -> SamplerRef {
        Sampler::generator(self)
    }
}

impl Kernel for Envelope {
    fn next_sample(&mut self, _ctx: &RenderContext, time: f64) -> f64 {
        self.level_at(time)
    }
}

/// Position of `x` within `[a, b]`, clamped to [0, 1]. An empty interval is a
/// step at `a`.
fn ramp(x: f64, a: f64, b: f64) -> f64 {
    if b <= a {
        return if x >= a { 1.0 } else { 0.0 };
    }
    ((x - a) / (b - a)).clamp(0.0, 1.0)
}

fn lerp(a: f64, b: f64, x: f64) -> f64 {
    (1.0 - x) * a + x * b
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> Envelope {
        Envelope::new(1.0, 0.1, 0.2, 0.5, 0.3)
    }

    #[test]
    fn starts_silent_and_peaks_after_attack() {
        let env = reference();
        assert_eq!(env.level_at(0.0), 0.0);
        assert!((env.level_at(0.1) - 1.0).abs() < 1e-12);
        assert!((env.level_at(0.05) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn sustain_holds() {
        let env = reference();
        for t in [0.3, 0.5, 0.9, 1.0] {
            assert!((env.level_at(t) - 0.5).abs() < 1e-12, "Should sustain at 0.5 at t={t}");
        }
    }

    #[test]
    fn release_to_zero() {
        let env = reference();
        assert!((env.level_at(1.15) - 0.25).abs() < 1e-12);
        assert_eq!(env.level_at(1.3), 0.0);
        assert_eq!(env.level_at(5.0), 0.0);
    }

    #[test]
    fn continuous_at_stage_boundaries() {
        let env = reference();
        let eps = 1e-9;
        for boundary in [0.1, 0.3, env.release_start(), env.end()] {
            let before = env.level_at(boundary - eps);
            let after = env.level_at(boundary + eps);
            assert!(
                (before - after).abs() < 1e-6,
                "Jump at t={boundary}: {before} -> {after}"
            );
        }
    }

    #[test]
    fn release_waits_for_decay() {
        // Held shorter than attack + decay.
        let env = Envelope::new(0.05, 0.1, 0.2, 0.5, 0.3);
        assert!((env.release_start() - 0.3).abs() < 1e-12);
        assert!((env.level_at(0.3) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn zero_length_segments_are_steps() {
        let env = Envelope::new(0.0, 0.0, 0.0, 0.8, 0.0);
        assert_eq!(env.level_at(0.0), 0.0);
        assert!(env.level_at(-1.0).abs() < 1e-12);
        for t in [0.0, 0.1, 1.0] {
            assert!(env.level_at(t).is_finite());
        }
    }

    #[test]
    fn full_cycle_range() {
        let mut env = Envelope::new(0.2, 0.01, 0.05, 0.5, 0.1);
        let ctx = RenderContext::new(44100.0);
        for i in 0..44100 {
            let s = env.next_sample(&ctx, i as f64 / 44100.0);
            assert!((0.0..=1.0).contains(&s), "Envelope out of range: {s}");
        }
    }

    #[test]
    fn follows_its_own_clock() {
        let mut ctx = RenderContext::new(100.0);
        let env = reference().into_sampler();
        let mut last = 0.0;
        for _ in 0..=10 {
            last = env.evaluate(&ctx);
            ctx.advance();
        }
        assert!((last - 1.0).abs() < 1e-9, "Level after 10 ticks at 100 Hz should be 1, got {last}");
    }
}
