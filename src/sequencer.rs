//! MML-style sequencer with lookahead scheduling.
//!
//! Sequence text is read a command at a time and turned into playback requests
//! on an [`AudioHost`]. Nothing is scheduled further ahead than the lookahead
//! window; the host is expected to call [`Sequencer::schedule`] periodically
//! (more often than the window length) so that elapsed time unlocks the next
//! commands.
//!
//! ```text
//! c d e f g a b   note, optionally followed by # (sharp) and a duration
//! r               rest, optionally followed by a duration
//! o<n>            set octave
//! > <             octave up / down
//! t<n>            set tempo in BPM
//! v<n>            set volume 0-10
//! ```
//!
//! A duration is a note-value denominator (`c8` is an eighth note) and sticks
//! until changed.

use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::config::EngineConfig;
use crate::dsp::instrument::NoteTable;
use crate::error::LexError;
use crate::host::AudioHost;
use crate::lexer::Lexer;
use crate::token::Token;

pub const DEFAULT_BPM: u32 = 120;
pub const DEFAULT_OCTAVE: i32 = 4;
pub const DEFAULT_NOTE_VALUE: u32 = 4;
pub const MAX_VOLUME: u32 = 10;

/// Musical state that persists between commands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequencerState {
    pub bpm: u32,
    pub octave: i32,
    /// Note-value denominator: 4 = quarter note.
    pub note_value: u32,
    /// 0 (silent) to 10 (full track gain).
    pub volume: u32,
}

impl Default for SequencerState {
    fn default() -> Self {
        SequencerState {
            bpm: DEFAULT_BPM,
            octave: DEFAULT_OCTAVE,
            note_value: DEFAULT_NOTE_VALUE,
            volume: MAX_VOLUME,
        }
    }
}

impl SequencerState {
    /// Length of one note at the current tempo and note value, in seconds.
    pub fn note_seconds(&self) -> f64 {
        240.0 / (self.bpm as f64 * self.note_value as f64)
    }
}

/// Drives one track of sequence text through a rendered instrument.
pub struct Sequencer<H: AudioHost> {
    table: Rc<NoteTable>,
    lexer: Lexer,
    state: SequencerState,
    bus: H::Bus,
    track_gain: f64,
    lookahead: f64,
    /// Unset until the first call to `schedule`.
    current_timestamp: Option<f64>,
    halted: Option<LexError>,
}

impl<H: AudioHost> Sequencer<H> {
    /// Create the track's gain bus on `host` at `track_gain`.
    pub fn new(
        host: &mut H,
        config: &EngineConfig,
        table: Rc<NoteTable>,
        sequence: &str,
        track_gain: f64,
    ) -> Self {
        let bus = host.create_bus(track_gain);
        Sequencer {
            table,
            lexer: Lexer::new(sequence),
            state: SequencerState::default(),
            bus,
            track_gain,
            lookahead: config.lookahead_seconds,
            current_timestamp: None,
            halted: None,
        }
    }

    pub fn state(&self) -> &SequencerState {
        &self.state
    }

    pub fn bus(&self) -> &H::Bus {
        &self.bus
    }

    /// Timestamp the next note or rest will start at.
    pub fn current_timestamp(&self) -> Option<f64> {
        self.current_timestamp
    }

    pub fn source(&self) -> &str {
        self.lexer.source()
    }

    /// Where the last `schedule` call stopped on unrecognised text, if it did.
    pub fn halted_at(&self) -> Option<&LexError> {
        self.halted.as_ref()
    }

    /// All text consumed.
    pub fn is_finished(&self) -> bool {
        self.lexer.is_exhausted()
    }

    /// Extend the sequence; picked up by the next `schedule` call.
    pub fn append(&mut self, text: &str) {
        self.lexer.append(text);
    }

    /// Schedule every command that starts within the lookahead window.
    ///
    /// Returns the number of notes handed to the host.
    pub fn schedule(&mut self, host: &mut H) -> usize {
        let now = host.current_time();
        let mut timestamp = *self.current_timestamp.get_or_insert(now);
        let lookahead = now + self.lookahead;
        let mut scheduled = 0;
        self.halted = None;

        while !self.lexer.is_exhausted() && timestamp <= lookahead {
            let command = match self.lexer.next_command() {
                Ok(command) => command,
                Err(e) => {
                    debug!(error = %e, "sequence halted");
                    self.halted = Some(e);
                    break;
                }
            };

            match command.token {
                Token::Note(pitch_class) => {
                    let note = self
                        .state
                        .octave
                        .saturating_mul(12)
                        .saturating_add(pitch_class as i32);
                    if self.play(host, note, timestamp) {
                        scheduled += 1;
                    }
                    self.read_note_value();
                    timestamp += self.state.note_seconds();
                }
                Token::Rest => {
                    self.read_note_value();
                    timestamp += self.state.note_seconds();
                }
                Token::Octave => {
                    if let Some(octave) = self.read_number() {
                        self.state.octave = i32::try_from(octave).unwrap_or(i32::MAX);
                    }
                }
                Token::OctaveUp => self.state.octave = self.state.octave.saturating_add(1),
                Token::OctaveDown => self.state.octave = self.state.octave.saturating_sub(1),
                Token::Tempo => {
                    if let Some(bpm) = self.read_number().filter(|&b| b > 0) {
                        self.state.bpm = bpm;
                    }
                }
                Token::Volume => {
                    if let Some(volume) = self.read_number() {
                        self.state.volume = volume.min(MAX_VOLUME);
                        let gain = self.track_gain * self.state.volume as f64 / MAX_VOLUME as f64;
                        host.set_gain_at(&self.bus, gain, timestamp);
                    }
                }
                Token::Number(_) | Token::End => break,
            }
        }

        self.current_timestamp = Some(timestamp);
        scheduled
    }

    fn play(&self, host: &mut H, note: i32, when: f64) -> bool {
        let Some(entry) = self.table.get(note) else {
            warn!(note, "note outside the MIDI range, not played");
            return false;
        };
        trace!(note, when, rate = entry.playback_rate, "note");
        host.schedule_playback(&entry.buffer, entry.playback_rate, &self.bus, when);
        true
    }

    fn read_number(&mut self) -> Option<u32> {
        match self.lexer.read_number()?.token {
            Token::Number(n) => Some(n),
            _ => None,
        }
    }

    /// A zero duration is ignored.
    fn read_note_value(&mut self) {
        if let Some(value) = self.read_number().filter(|&v| v > 0) {
            self.state.note_value = value;
        }
    }
}
