pub mod config;
pub mod diagnostics;
pub mod dsp;
pub mod error;
pub mod host;
pub mod lexer;
pub mod preset;
pub mod sequencer;
pub mod token;

use std::rc::Rc;

use tracing::debug;
use wasm_bindgen::prelude::*;

use crate::config::EngineConfig;
use crate::dsp::buffer::PcmBuffer;
use crate::error::{EngineError, LexError};
use crate::host::{AudioHost, OfflineHost};
use crate::lexer::Lexer;
use crate::preset::InstrumentRecipe;
use crate::sequencer::Sequencer;
use crate::token::Spanned;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the zeptosynth version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// Tokenize sequence text, failing on the first unrecognised character.
pub fn parse_tokens(input: &str) -> Result<Vec<Spanned>, LexError> {
    match Lexer::new(input).tokenize() {
        (tokens, None) => Ok(tokens),
        (_, Some(e)) => Err(e),
    }
}

/// Result of playing a whole sequence through an [`OfflineHost`].
#[derive(Debug, Clone)]
pub struct SequenceRender {
    pub buffer: PcmBuffer,
    /// Set when the text stopped on something unrecognised; everything
    /// before it was still rendered.
    pub halted: Option<LexError>,
}

/// Render `recipe` into a note table and play `sequence` through it offline.
///
/// The host clock is stepped forward whenever the sequencer runs out of
/// lookahead. Mixes `duration` seconds, or until the last note stops sounding
/// when `None`.
pub fn render_sequence(
    config: &EngineConfig,
    recipe: &InstrumentRecipe,
    sequence: &str,
    duration: Option<f64>,
) -> Result<SequenceRender, EngineError> {
    config.validate()?;
    if let Some(d) = duration.filter(|d| !d.is_finite() || *d < 0.0) {
        return Err(EngineError::InvalidDuration(d));
    }

    let table = Rc::new(recipe.render(config)?);
    let mut host = OfflineHost::new();
    let mut sequencer = Sequencer::new(&mut host, config, table, sequence, 1.0);

    loop {
        sequencer.schedule(&mut host);
        if sequencer.is_finished() || sequencer.halted_at().is_some() {
            break;
        }
        match sequencer.current_timestamp() {
            Some(ts) if ts > host.current_time() => host.advance_to(ts),
            _ => break,
        }
    }

    let halted = sequencer.halted_at().cloned();
    if let Some(e) = &halted {
        debug!(error = %e, "sequence rendered up to a halt");
    }
    let duration = duration.unwrap_or_else(|| host.end_time());
    Ok(SequenceRender {
        buffer: host.mixdown(config.sample_rate, duration),
        halted,
    })
}

fn engine_config(sample_rate: u32) -> Result<EngineConfig, JsValue> {
    let config = EngineConfig::with_sample_rate(sample_rate);
    config
        .validate()
        .map_err(|e| JsValue::from_str(&format!("{e}")))?;
    Ok(config)
}

fn recipe_from_json(recipe_json: &str) -> Result<InstrumentRecipe, JsValue> {
    InstrumentRecipe::from_json(recipe_json).map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed: tokenize sequence text into a JSON token list.
/// Unrecognised text is reported as a rendered diagnostic.
#[wasm_bindgen]
pub fn parse_sequence(text: &str) -> Result<JsValue, JsValue> {
    let tokens = parse_tokens(text)
        .map_err(|e| JsValue::from_str(&diagnostics::render_halt(text, &e)))?;
    serde_wasm_bindgen::to_value(&tokens).map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed: render one note of an instrument recipe to a WAV byte array.
#[wasm_bindgen]
pub fn render_preset_wav(recipe_json: &str, note: u8, sample_rate: u32) -> Result<Vec<u8>, JsValue> {
    let config = engine_config(sample_rate)?;
    let recipe = recipe_from_json(recipe_json)?;
    let buffer = recipe
        .render_note(&config, note)
        .map_err(|e| JsValue::from_str(&format!("{e}")))?;
    Ok(dsp::renderer::render_wav(&buffer))
}

/// WASM-exposed: play a sequence through an instrument recipe and return the
/// mixdown as a WAV byte array. A `duration` of 0 or less mixes until the last
/// note ends.
#[wasm_bindgen]
pub fn render_sequence_wav(
    sequence: &str,
    recipe_json: &str,
    sample_rate: u32,
    duration: f64,
) -> Result<Vec<u8>, JsValue> {
    let config = engine_config(sample_rate)?;
    let recipe = recipe_from_json(recipe_json)?;
    let duration = (duration > 0.0).then_some(duration);
    let render = render_sequence(&config, &recipe, sequence, duration)
        .map_err(|e| JsValue::from_str(&format!("{e}")))?;
    Ok(dsp::renderer::render_wav(&render.buffer))
}

/// WASM-exposed: play a sequence and return mono f32 samples.
/// Returns the raw audio buffer for AudioWorklet playback.
#[wasm_bindgen]
pub fn render_sequence_samples(
    sequence: &str,
    recipe_json: &str,
    sample_rate: u32,
) -> Result<Vec<f32>, JsValue> {
    let config = engine_config(sample_rate)?;
    let recipe = recipe_from_json(recipe_json)?;
    let render = render_sequence(&config, &recipe, sequence, None)
        .map_err(|e| JsValue::from_str(&format!("{e}")))?;
    Ok(render.buffer.samples)
}
