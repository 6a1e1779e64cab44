//! Pre-rendered instruments.
//!
//! An instrument is a function from `(frequency, note)` to a sampler graph.
//! Rendering it bakes a subset of notes into PCM buffers and fills the rest of
//! the 128-note MIDI range by pitch-shifting the nearest rendered note through
//! its playback rate.

use std::iter::StepBy;
use std::ops::RangeInclusive;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::EngineError;

use super::buffer::PcmBuffer;
use super::graph::{RenderContext, SamplerRef};
use super::renderer::render_with;

/// Number of MIDI notes in a table.
pub const NOTE_COUNT: usize = 128;

/// Equal-tempered frequency of a MIDI note, A4 (69) = 440 Hz.
pub fn note_to_frequency(note: i32) -> f64 {
    440.0 * semitone_ratio(note as f64 - 69.0)
}

/// Frequency ratio of an interval of `semitones`.
pub fn semitone_ratio(semitones: f64) -> f64 {
    2.0_f64.powf(semitones / 12.0)
}

/// Which notes to render directly.
///
/// `start` and `end` are fractional octaves: the rendered notes are
/// `trunc(start * 12) ..= trunc(end * 12)` stepping by `increment` semitones.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteRange {
    pub start: f64,
    pub end: f64,
    pub increment: usize,
}

impl NoteRange {
    pub fn new(start: f64, end: f64, increment: usize) -> Self {
        NoteRange {
            start,
            end,
            increment,
        }
    }

    pub fn first_note(&self) -> i32 {
        (self.start * 12.0) as i32
    }

    pub fn last_note(&self) -> i32 {
        (self.end * 12.0) as i32
    }

    /// Note indices to render, limited to the MIDI range.
    ///
    /// Notes keep their place on the `increment` grid anchored at
    /// `first_note`; the part of the range outside 0..=127 is never visited.
    pub fn notes(&self) -> StepBy<RangeInclusive<i32>> {
        // Past u32::MAX no second grid point can land in range.
        let step = self.increment.clamp(1, u32::MAX as usize) as i64;
        let first = self.first_note() as i64;
        let start = if first >= 0 {
            first
        } else {
            first + (-first + step - 1) / step * step
        };
        let end = self.last_note().min(NOTE_COUNT as i32 - 1);
        (start.min(NOTE_COUNT as i64) as i32..=end).step_by(self.increment.max(1))
    }
}

/// One slot of a [`NoteTable`].
#[derive(Debug, Clone)]
pub struct NoteEntry {
    pub buffer: Rc<PcmBuffer>,
    /// Playback-rate multiplier that brings `buffer` to this note's pitch.
    pub playback_rate: f64,
    /// Rendered for this very note rather than borrowed from a neighbour.
    pub exact: bool,
}

/// 128 entries indexed by MIDI note. Immutable once built.
#[derive(Debug, Clone)]
pub struct NoteTable {
    entries: Vec<NoteEntry>,
}

impl NoteTable {
    /// Fill every note missing from `exact` from its nearest exact neighbour.
    ///
    /// Distance is in semitones; on a tie the lower note wins (first match
    /// scanning upwards). `None` when `exact` holds no buffer at all.
    pub fn from_exact(mut exact: Vec<Option<Rc<PcmBuffer>>>) -> Option<Self> {
        exact.resize(NOTE_COUNT, None);

        let mut entries = Vec::with_capacity(NOTE_COUNT);
        for note in 0..NOTE_COUNT {
            let entry = match &exact[note] {
                Some(buffer) => NoteEntry {
                    buffer: buffer.clone(),
                    playback_rate: 1.0,
                    exact: true,
                },
                None => {
                    let (nearest, buffer) = nearest_exact(&exact, note)?;
                    NoteEntry {
                        buffer,
                        playback_rate: note_to_frequency(note as i32)
                            / note_to_frequency(nearest as i32),
                        exact: false,
                    }
                }
            };
            entries.push(entry);
        }

        Some(NoteTable { entries })
    }

    pub fn entry(&self, note: u8) -> Option<&NoteEntry> {
        self.entries.get(note as usize)
    }

    /// Entry for an arbitrary note index; `None` outside 0..=127.
    pub fn get(&self, note: i32) -> Option<&NoteEntry> {
        usize::try_from(note).ok().and_then(|n| self.entries.get(n))
    }

    pub fn entries(&self) -> &[NoteEntry] {
        &self.entries
    }

    /// Notes that were rendered directly, ascending.
    pub fn exact_notes(&self) -> Vec<u8> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.exact)
            .map(|(n, _)| n as u8)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn nearest_exact(exact: &[Option<Rc<PcmBuffer>>], note: usize) -> Option<(usize, Rc<PcmBuffer>)> {
    let mut closest = None;
    let mut closest_dist = usize::MAX;
    for (candidate, slot) in exact.iter().enumerate() {
        let dist = note.abs_diff(candidate);
        if let Some(buffer) = slot {
            if dist < closest_dist {
                closest = Some((candidate, buffer.clone()));
                closest_dist = dist;
            }
        }
    }
    closest
}

/// Render an instrument into a [`NoteTable`].
///
/// `factory` is called once per rendered note with a fresh clock, the note's
/// frequency and its MIDI number; the graph it returns is rendered for
/// `duration` seconds. Notes of `range` outside 0..=127 are skipped.
pub fn render_instrument<F>(
    config: &EngineConfig,
    mut factory: F,
    duration: f64,
    range: &NoteRange,
) -> Result<NoteTable, EngineError>
where
    F: FnMut(&RenderContext, f64, u8) -> SamplerRef,
{
    config.validate()?;
    if range.increment == 0 {
        return Err(EngineError::ZeroIncrement);
    }
    if !duration.is_finite() || duration < 0.0 {
        return Err(EngineError::InvalidDuration(duration));
    }

    let mut exact: Vec<Option<Rc<PcmBuffer>>> = vec![None; NOTE_COUNT];
    for note in range.notes() {
        let Ok(midi) = u8::try_from(note) else {
            continue;
        };

        let mut ctx = RenderContext::new(config.sample_rate as f64);
        let frequency = note_to_frequency(note);
        let graph = factory(&ctx, frequency, midi);
        let buffer = render_with(&mut ctx, &graph, duration);
        debug!(note, frequency, frames = buffer.len(), "rendered instrument note");
        exact[midi as usize] = Some(Rc::new(buffer));
    }

    let table = NoteTable::from_exact(exact).ok_or(EngineError::NoExactNotes {
        start: range.first_note(),
        end: range.last_note(),
    })?;
    debug!(
        exact = table.exact_notes().len(),
        resampled = NOTE_COUNT - table.exact_notes().len(),
        "instrument table ready"
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::graph::Sampler;
    use crate::dsp::oscillator::{Oscillator, Waveform};

    fn marker(note: u8) -> Option<Rc<PcmBuffer>> {
        Some(Rc::new(PcmBuffer::new(vec![note as f32], 44100)))
    }

    fn sparse(notes: &[u8]) -> Vec<Option<Rc<PcmBuffer>>> {
        let mut exact = vec![None; NOTE_COUNT];
        for &n in notes {
            exact[n as usize] = marker(n);
        }
        exact
    }

    #[test]
    fn a4_is_440() {
        assert!((note_to_frequency(69) - 440.0).abs() < 1e-9);
        assert!((note_to_frequency(81) - 880.0).abs() < 1e-9);
        assert!((semitone_ratio(12.0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn range_truncates_fractional_octaves() {
        let range = NoteRange::new(4.99, 6.01, 3);
        assert_eq!(range.first_note(), 59);
        assert_eq!(range.last_note(), 72);
        assert_eq!(range.notes().collect::<Vec<_>>(), vec![59, 62, 65, 68, 71]);
    }

    #[test]
    fn notes_stay_on_grid_inside_midi_range() {
        let range = NoteRange::new(-0.25, 1.0, 5);
        assert_eq!(range.first_note(), -3);
        assert_eq!(range.notes().collect::<Vec<_>>(), vec![2, 7, 12]);

        let range = NoteRange::new(10.0, 11.0, 4);
        assert_eq!(range.notes().collect::<Vec<_>>(), vec![120, 124]);
    }

    #[test]
    fn huge_range_visits_only_midi_notes() {
        let range = NoteRange::new(-1e12, 1e12, 1);
        assert_eq!(range.first_note(), i32::MIN);
        assert_eq!(range.last_note(), i32::MAX);
        let notes: Vec<i32> = range.notes().collect();
        assert_eq!(notes.len(), NOTE_COUNT);
        assert_eq!(notes[0], 0);
        assert_eq!(notes[127], 127);

        let sparse = NoteRange::new(-1.0, 10.0, usize::MAX);
        assert_eq!(sparse.notes().count(), 0);

        let empty = NoteRange::new(20.0, 21.0, 1);
        assert_eq!(empty.notes().count(), 0);
    }

    #[test]
    fn empty_exact_set_builds_no_table() {
        assert!(NoteTable::from_exact(vec![None; NOTE_COUNT]).is_none());
        assert!(NoteTable::from_exact(Vec::new()).is_none());
    }

    #[test]
    fn nearest_note_resampling() {
        let table = NoteTable::from_exact(sparse(&[60, 72])).unwrap();

        let e = table.entry(66).unwrap();
        assert!(!e.exact);
        // Equidistant: the lower note is found first.
        assert_eq!(e.buffer.samples[0], 60.0);
        let expected = note_to_frequency(66) / note_to_frequency(60);
        assert!((e.playback_rate - expected).abs() < 1e-12);

        let e = table.entry(67).unwrap();
        assert_eq!(e.buffer.samples[0], 72.0);
        assert!((e.playback_rate - note_to_frequency(67) / note_to_frequency(72)).abs() < 1e-12);

        assert_eq!(table.exact_notes(), vec![60, 72]);
        assert_eq!(table.entry(72).unwrap().playback_rate, 1.0);
    }

    #[test]
    fn far_notes_use_edges() {
        let table = NoteTable::from_exact(sparse(&[60, 72])).unwrap();
        assert_eq!(table.entry(0).unwrap().buffer.samples[0], 60.0);
        assert_eq!(table.entry(127).unwrap().buffer.samples[0], 72.0);
        assert!((table.entry(48).unwrap().playback_rate - 0.5).abs() < 1e-12);
        assert_eq!(table.len(), 128);
    }

    #[test]
    fn shared_buffers_are_not_copied() {
        let table = NoteTable::from_exact(sparse(&[60])).unwrap();
        assert!(Rc::ptr_eq(&table.entry(10).unwrap().buffer, &table.entry(60).unwrap().buffer));
    }

    #[test]
    fn no_exact_notes_is_fatal() {
        let range = NoteRange::new(20.0, 21.0, 1);
        let err = render_instrument(
            &EngineConfig::default(),
            |_, _, _| Sampler::constant(0.0),
            0.01,
            &range,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::NoExactNotes { start: 240, end: 252 }));
    }

    #[test]
    fn zero_increment_rejected() {
        let range = NoteRange::new(4.0, 5.0, 0);
        let err = render_instrument(
            &EngineConfig::default(),
            |_, _, _| Sampler::constant(0.0),
            0.01,
            &range,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::ZeroIncrement));
    }

    #[test]
    fn renders_requested_notes_with_their_frequency() {
        let config = EngineConfig::with_sample_rate(8000);
        let mut seen = Vec::new();
        let table = render_instrument(
            &config,
            |ctx, freq, note| {
                assert_eq!(ctx.tick(), 0);
                seen.push((note, freq));
                Oscillator::new(Waveform::Sine, Sampler::constant(freq)).into_sampler()
            },
            0.05,
            &NoteRange::new(4.0, 5.0, 6),
        )
        .unwrap();

        assert_eq!(seen.iter().map(|(n, _)| *n).collect::<Vec<_>>(), vec![48, 54, 60]);
        assert!((seen[2].1 - note_to_frequency(60)).abs() < 1e-9);
        assert_eq!(table.exact_notes(), vec![48, 54, 60]);
        assert_eq!(table.entry(60).unwrap().buffer.len(), 400);
        assert_eq!(table.entry(60).unwrap().buffer.sample_rate, 8000);
    }

    #[test]
    fn out_of_range_notes_skipped() {
        let mut rendered = Vec::new();
        let table = render_instrument(
            &EngineConfig::with_sample_rate(1000),
            |_, _, note| {
                rendered.push(note);
                Sampler::constant(0.1)
            },
            0.01,
            &NoteRange::new(10.0, 11.0, 4),
        )
        .unwrap();
        assert_eq!(rendered, vec![120, 124]);
        assert!((table.get(127).unwrap().playback_rate - semitone_ratio(3.0)).abs() < 1e-12);
        assert!(table.get(128).is_none());
        assert!(table.get(-1).is_none());
    }
}
