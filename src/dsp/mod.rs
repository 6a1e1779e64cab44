//! DSP engine: sample-graph synthesis in pure Rust.
//!
//! Every signal is a [`graph::Sampler`] producing one value per tick of a
//! shared [`graph::RenderContext`] clock. The primitives below build on that;
//! the renderer bakes a graph into PCM and the instrument module turns a
//! per-note graph into a playable note table.

pub mod buffer;
pub mod envelope;
pub mod filter;
pub mod graph;
pub mod instrument;
pub mod karplus;
pub mod mixer;
pub mod noise;
pub mod oscillator;
pub mod renderer;
