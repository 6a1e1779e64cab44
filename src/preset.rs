//! Instrument presets.
//!
//! A preset describes a per-note synthesis graph in data, so instruments can be
//! shipped as JSON and rendered into a [`NoteTable`] on demand. A recipe pairs a
//! preset with how it should be baked: note duration, which notes to render
//! directly and the noise seed.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::dsp::buffer::PcmBuffer;
use crate::dsp::envelope::Envelope;
use crate::dsp::filter::{BiquadFilter, FilterType};
use crate::dsp::graph::{RenderContext, Sampler, SamplerRef};
use crate::dsp::instrument::{NoteRange, NoteTable, note_to_frequency, render_instrument};
use crate::dsp::karplus::KarplusStrong;
use crate::dsp::mixer::Adder;
use crate::dsp::noise::Noise;
use crate::dsp::oscillator::{Oscillator, Waveform};
use crate::dsp::renderer::render_with;
use crate::error::EngineError;

// ── Preset graphs ───────────────────────────────────────────

/// A parametrized instrument graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InstrumentPreset {
    /// Plucked string (Karplus-Strong).
    Pluck {
        #[serde(default = "default_amplitude")]
        amplitude: f64,
    },
    /// Oscillator shaped by an envelope, optionally filtered.
    #[serde(rename_all = "camelCase")]
    Tone {
        waveform: Waveform,
        #[serde(default)]
        envelope: Envelope,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filter: Option<FilterConfig>,
        /// Hard-sync the oscillator to a master running at the note frequency,
        /// with the oscillator itself at `frequency * sync_ratio`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sync_ratio: Option<f64>,
        #[serde(default = "default_amplitude")]
        amplitude: f64,
    },
    /// Filtered noise burst, optionally layered with a pitched body.
    #[serde(rename_all = "camelCase")]
    Percussion {
        #[serde(default)]
        envelope: Envelope,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filter: Option<FilterConfig>,
        /// Level of a sine at the note frequency mixed under the noise.
        #[serde(default)]
        body: f64,
        #[serde(default = "default_amplitude")]
        amplitude: f64,
    },
}

fn default_amplitude() -> f64 {
    1.0
}

/// Static biquad settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConfig {
    #[serde(rename = "type")]
    pub filter_type: FilterType,
    /// Cutoff in Hz, or a multiple of the note frequency when `tracking`.
    pub cutoff: f64,
    #[serde(default = "default_q")]
    pub q: f64,
    /// Scale the cutoff with the note frequency.
    #[serde(default)]
    pub tracking: bool,
}

fn default_q() -> f64 {
    std::f64::consts::FRAC_1_SQRT_2
}

impl FilterConfig {
    fn apply(&self, source: SamplerRef, frequency: f64) -> SamplerRef {
        let cutoff = if self.tracking {
            self.cutoff * frequency
        } else {
            self.cutoff
        };
        BiquadFilter::new(
            source,
            self.filter_type,
            Sampler::constant(cutoff),
            Sampler::constant(self.q),
        )
        .into_sampler()
    }
}

impl InstrumentPreset {
    /// Built-in presets by name.
    pub fn named(name: &str) -> Option<Self> {
        let preset = match name {
            "pluck" => InstrumentPreset::Pluck { amplitude: 1.0 },
            "organ" => InstrumentPreset::Tone {
                waveform: Waveform::Square,
                envelope: Envelope::new(0.4, 0.02, 0.05, 0.8, 0.2),
                filter: None,
                sync_ratio: None,
                amplitude: 0.5,
            },
            "bass" => InstrumentPreset::Tone {
                waveform: Waveform::Sawtooth,
                envelope: Envelope::new(0.3, 0.005, 0.2, 0.5, 0.15),
                filter: Some(FilterConfig {
                    filter_type: FilterType::Lowpass,
                    cutoff: 4.0,
                    q: 2.0,
                    tracking: true,
                }),
                sync_ratio: None,
                amplitude: 0.7,
            },
            "sync-lead" => InstrumentPreset::Tone {
                waveform: Waveform::Sine,
                envelope: Envelope::default(),
                filter: None,
                sync_ratio: Some(2.5),
                amplitude: 0.6,
            },
            "hat" => InstrumentPreset::Percussion {
                envelope: Envelope::new(0.0, 0.001, 0.05, 0.0, 0.0),
                filter: Some(FilterConfig {
                    filter_type: FilterType::Highpass,
                    cutoff: 7000.0,
                    q: default_q(),
                    tracking: false,
                }),
                body: 0.0,
                amplitude: 0.5,
            },
            "kick" => InstrumentPreset::Percussion {
                envelope: Envelope::new(0.0, 0.001, 0.25, 0.0, 0.0),
                filter: Some(FilterConfig {
                    filter_type: FilterType::Lowpass,
                    cutoff: 200.0,
                    q: default_q(),
                    tracking: false,
                }),
                body: 1.0,
                amplitude: 0.8,
            },
            _ => return None,
        };
        Some(preset)
    }

    /// Build the graph for one note. `rng` seeds every random source in it.
    pub fn build(&self, ctx: &RenderContext, frequency: f64, rng: &mut StdRng) -> SamplerRef {
        match self {
            InstrumentPreset::Pluck { amplitude } => {
                KarplusStrong::new(ctx, frequency, *amplitude, rng).into_sampler()
            }
            InstrumentPreset::Tone {
                waveform,
                envelope,
                filter,
                sync_ratio,
                amplitude,
            } => {
                let oscillator = match sync_ratio {
                    Some(ratio) => {
                        let master =
                            Oscillator::new(Waveform::NaiveSquare, Sampler::constant(frequency))
                                .into_sampler();
                        Oscillator::new(*waveform, Sampler::constant(frequency * ratio))
                            .with_sync(master)
                            .into_sampler()
                    }
                    None => Oscillator::new(*waveform, Sampler::constant(frequency)).into_sampler(),
                };
                let source = match filter {
                    Some(f) => f.apply(oscillator, frequency),
                    None => oscillator,
                };
                Sampler::product(vec![
                    source,
                    envelope.into_sampler(),
                    Sampler::constant(*amplitude),
                ])
            }
            InstrumentPreset::Percussion {
                envelope,
                filter,
                body,
                amplitude,
            } => {
                let noise = Noise::seeded(rng.r#gen()).into_sampler();
                let mut source = match filter {
                    Some(f) => f.apply(noise, frequency),
                    None => noise,
                };
                if *body != 0.0 {
                    let tone = Sampler::product(vec![
                        Oscillator::new(Waveform::Sine, Sampler::constant(frequency)).into_sampler(),
                        Sampler::constant(*body),
                    ]);
                    source = Adder::new(vec![source, tone]).into_sampler();
                }
                Sampler::product(vec![
                    source,
                    envelope.into_sampler(),
                    Sampler::constant(*amplitude),
                ])
            }
        }
    }
}

// ── Recipes ─────────────────────────────────────────────────

/// A preset plus the parameters for baking it into a note table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentRecipe {
    pub preset: InstrumentPreset,
    /// Seconds rendered per note.
    #[serde(default = "default_duration")]
    pub duration: f64,
    #[serde(default = "default_range")]
    pub range: NoteRange,
    /// Fixed seed for reproducible noise; fresh entropy when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_duration() -> f64 {
    1.0
}

fn default_range() -> NoteRange {
    NoteRange::new(3.0, 6.0, 3)
}

impl InstrumentRecipe {
    pub fn new(preset: InstrumentPreset) -> Self {
        InstrumentRecipe {
            preset,
            duration: default_duration(),
            range: default_range(),
            seed: None,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let recipe: InstrumentRecipe = serde_json::from_str(json)?;
        recipe.validate()?;
        Ok(recipe)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.duration.is_finite() || self.duration < 0.0 {
            return Err(EngineError::InvalidDuration(self.duration));
        }
        if self.range.increment == 0 {
            return Err(EngineError::ZeroIncrement);
        }
        Ok(())
    }

    /// Render the preset into a note table.
    pub fn render(&self, config: &EngineConfig) -> Result<NoteTable, EngineError> {
        self.validate()?;
        let mut rng = self.rng();
        render_instrument(
            config,
            |ctx, frequency, _| self.preset.build(ctx, frequency, &mut rng),
            self.duration,
            &self.range,
        )
    }

    /// Render a single MIDI note directly, without building a table.
    pub fn render_note(&self, config: &EngineConfig, note: u8) -> Result<PcmBuffer, EngineError> {
        config.validate()?;
        self.validate()?;
        let mut rng = self.rng();
        let mut ctx = RenderContext::new(config.sample_rate as f64);
        let graph = self.preset.build(&ctx, note_to_frequency(note as i32), &mut rng);
        Ok(render_with(&mut ctx, &graph, self.duration))
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}
