//! Host audio backend seam.
//!
//! The engine never plays audio itself. It asks an [`AudioHost`] for the
//! current time and hands it buffers to start at future timestamps on a gain
//! bus. [`OfflineHost`] is a host that only records those requests and can mix
//! them down into a single buffer afterwards.

use std::rc::Rc;

use tracing::trace;

use crate::dsp::buffer::{PcmBuffer, PlaybackCursor};
use crate::dsp::renderer::frame_count;

/// What the engine needs from an audio backend.
pub trait AudioHost {
    /// Handle to a gain stage playback can be routed through.
    type Bus: Clone;

    /// Monotonic "now" in seconds.
    fn current_time(&self) -> f64;

    /// Create a gain bus feeding the host's output.
    fn create_bus(&mut self, gain: f64) -> Self::Bus;

    /// Change a bus gain from `when` onwards.
    fn set_gain_at(&mut self, bus: &Self::Bus, gain: f64, when: f64);

    /// Start `buffer` at `when`, resampled by `playback_rate`, through `bus`.
    fn schedule_playback(
        &mut self,
        buffer: &Rc<PcmBuffer>,
        playback_rate: f64,
        bus: &Self::Bus,
        when: f64,
    );
}

/// One recorded playback request.
#[derive(Debug, Clone)]
pub struct ScheduledPlayback {
    pub buffer: Rc<PcmBuffer>,
    pub playback_rate: f64,
    pub bus: usize,
    pub when: f64,
}

/// One recorded gain change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainChange {
    pub gain: f64,
    pub when: f64,
}

#[derive(Debug, Clone)]
struct BusState {
    initial_gain: f64,
    changes: Vec<GainChange>,
}

impl BusState {
    /// Gain in effect at `time`: the latest change at or before it.
    fn gain_at(&self, time: f64) -> f64 {
        self.changes
            .iter()
            .filter(|c| c.when <= time)
            .max_by(|a, b| a.when.total_cmp(&b.when))
            .map_or(self.initial_gain, |c| c.gain)
    }
}

/// A host with a manually driven clock that records everything scheduled on it.
#[derive(Debug, Clone, Default)]
pub struct OfflineHost {
    now: f64,
    buses: Vec<BusState>,
    playbacks: Vec<ScheduledPlayback>,
}

impl OfflineHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward. Time never runs backwards.
    pub fn advance_to(&mut self, time: f64) {
        self.now = self.now.max(time);
    }

    pub fn playbacks(&self) -> &[ScheduledPlayback] {
        &self.playbacks
    }

    pub fn gain_changes(&self, bus: usize) -> &[GainChange] {
        self.buses
            .get(bus)
            .map(|b| b.changes.as_slice())
            .unwrap_or(&[])
    }

    /// Timestamp at which the last scheduled buffer stops sounding.
    pub fn end_time(&self) -> f64 {
        self.playbacks
            .iter()
            .map(|p| p.when + p.buffer.duration() / p.playback_rate.max(f64::MIN_POSITIVE))
            .fold(0.0, f64::max)
    }

    /// Mix every recorded playback into `duration` seconds of mono audio.
    ///
    /// Bus gain follows its changes frame by frame, so a change reaches every
    /// buffer sounding through the bus at that time.
    pub fn mixdown(&self, sample_rate: u32, duration: f64) -> PcmBuffer {
        let rate = sample_rate as f64;
        let frames = frame_count(duration.max(0.0), rate);
        let mut mix = vec![0.0_f64; frames];

        for playback in &self.playbacks {
            let bus = self.buses.get(playback.bus);
            let start = playback.when * rate;
            let first = start.max(0.0).ceil() as usize;
            let mut cursor = PlaybackCursor::new(&playback.buffer, playback.playback_rate, rate);
            // Align the cursor to the first whole output frame.
            cursor.skip(first as f64 - start);

            for (frame, slot) in mix.iter_mut().enumerate().skip(first) {
                if cursor.is_finished(&playback.buffer) {
                    break;
                }
                let gain = bus.map_or(1.0, |b| b.gain_at(frame as f64 / rate));
                *slot += cursor.next_sample(&playback.buffer) * gain;
            }
        }

        PcmBuffer::new(mix.into_iter().map(|s| s as f32).collect(), sample_rate)
    }
}

impl AudioHost for OfflineHost {
    type Bus = usize;

    fn current_time(&self) -> f64 {
        self.now
    }

    fn create_bus(&mut self, gain: f64) -> usize {
        self.buses.push(BusState {
            initial_gain: gain,
            changes: Vec::new(),
        });
        self.buses.len() - 1
    }

    fn set_gain_at(&mut self, bus: &usize, gain: f64, when: f64) {
        if let Some(state) = self.buses.get_mut(*bus) {
            state.changes.push(GainChange { gain, when });
        }
    }

    fn schedule_playback(
        &mut self,
        buffer: &Rc<PcmBuffer>,
        playback_rate: f64,
        bus: &usize,
        when: f64,
    ) {
        trace!(when, playback_rate, bus, "playback scheduled");
        self.playbacks.push(ScheduledPlayback {
            buffer: buffer.clone(),
            playback_rate,
            bus: *bus,
            when,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ones(len: usize, sample_rate: u32) -> Rc<PcmBuffer> {
        Rc::new(PcmBuffer::new(vec![1.0; len], sample_rate))
    }

    #[test]
    fn clock_only_moves_forward() {
        let mut host = OfflineHost::new();
        host.advance_to(2.0);
        host.advance_to(1.0);
        assert_eq!(host.current_time(), 2.0);
    }

    #[test]
    fn mixdown_places_buffers_at_their_start() {
        let mut host = OfflineHost::new();
        let bus = host.create_bus(0.5);
        host.schedule_playback(&ones(10, 100), 1.0, &bus, 0.2);

        let mix = host.mixdown(100, 1.0);
        assert_eq!(mix.len(), 100);
        assert_eq!(mix.samples[19], 0.0);
        assert_eq!(mix.samples[20], 0.5);
        assert_eq!(mix.samples[29], 0.5);
        assert_eq!(mix.samples[30], 0.0);
    }

    #[test]
    fn overlapping_playbacks_sum() {
        let mut host = OfflineHost::new();
        let bus = host.create_bus(1.0);
        host.schedule_playback(&ones(10, 100), 1.0, &bus, 0.0);
        host.schedule_playback(&ones(10, 100), 1.0, &bus, 0.05);
        let mix = host.mixdown(100, 0.2);
        assert_eq!(mix.samples[2], 1.0);
        assert_eq!(mix.samples[7], 2.0);
        assert_eq!(mix.samples[12], 1.0);
    }

    #[test]
    fn playback_rate_shortens_buffer() {
        let mut host = OfflineHost::new();
        let bus = host.create_bus(1.0);
        host.schedule_playback(&ones(10, 100), 2.0, &bus, 0.0);
        let mix = host.mixdown(100, 0.2);
        assert_eq!(mix.samples[4], 1.0);
        assert_eq!(mix.samples[5], 0.0);
        assert!((host.end_time() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn gain_change_reaches_buffer_already_playing() {
        let mut host = OfflineHost::new();
        let bus = host.create_bus(1.0);
        host.schedule_playback(&ones(100, 100), 1.0, &bus, 0.0);
        host.set_gain_at(&bus, 0.0, 0.5);
        host.set_gain_at(&bus, 0.5, 0.8);

        let mix = host.mixdown(100, 1.0);
        assert_eq!(mix.samples[49], 1.0);
        assert_eq!(mix.samples[50], 0.0);
        assert_eq!(mix.samples[75], 0.0);
        assert_eq!(mix.samples[80], 0.5);
        assert_eq!(mix.samples[99], 0.5);
    }

    #[test]
    fn gain_changes_apply_from_their_timestamp() {
        let mut host = OfflineHost::new();
        let bus = host.create_bus(1.0);
        host.set_gain_at(&bus, 0.0, 0.1);
        host.set_gain_at(&bus, 0.25, 0.3);
        host.schedule_playback(&ones(5, 100), 1.0, &bus, 0.0);
        host.schedule_playback(&ones(5, 100), 1.0, &bus, 0.1);
        host.schedule_playback(&ones(5, 100), 1.0, &bus, 0.4);
        let mix = host.mixdown(100, 0.5);
        assert_eq!(mix.samples[0], 1.0);
        assert_eq!(mix.samples[10], 0.0);
        assert_eq!(mix.samples[40], 0.25);
        assert_eq!(host.gain_changes(bus).len(), 2);
    }
}
