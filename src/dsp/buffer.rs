//! Mono PCM storage and rate-shifted playback.

/// A rendered mono buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    pub samples: Vec<f32>,
    /// Rate the samples were rendered at.
    pub sample_rate: u32,
}

impl PcmBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        PcmBuffer {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Length in seconds at the buffer's own rate.
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Read a sample with linear interpolation at a fractional position.
    /// Positions outside the buffer read as silence.
    pub fn read_interpolated(&self, position: f64) -> f64 {
        if self.samples.is_empty() || position < 0.0 {
            return 0.0;
        }

        let idx = position as usize;
        if idx >= self.samples.len() - 1 {
            return if idx < self.samples.len() {
                self.samples[idx] as f64
            } else {
                0.0
            };
        }

        let frac = position - idx as f64;
        self.samples[idx] as f64 * (1.0 - frac) + self.samples[idx + 1] as f64 * frac
    }

    /// 16-bit signed PCM, clipped to full scale.
    pub fn to_i16(&self) -> Vec<i16> {
        self.samples
            .iter()
            .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
            .collect()
    }
}

/// Reads a buffer from the start at a playback-rate multiplier.
#[derive(Debug, Clone)]
pub struct PlaybackCursor {
    position: f64,
    step: f64,
}

impl PlaybackCursor {
    /// `output_rate` is the rate the cursor is being pulled at; a buffer
    /// rendered at a different rate is converted on the fly.
    pub fn new(buffer: &PcmBuffer, playback_rate: f64, output_rate: f64) -> Self {
        PlaybackCursor {
            position: 0.0,
            step: playback_rate * buffer.sample_rate as f64 / output_rate,
        }
    }

    /// Skip `frames` (possibly fractional) output frames without reading.
    pub fn skip(&mut self, frames: f64) {
        self.position += self.step * frames;
    }

    pub fn next_sample(&mut self, buffer: &PcmBuffer) -> f64 {
        let sample = buffer.read_interpolated(self.position);
        self.position += self.step;
        sample
    }

    pub fn is_finished(&self, buffer: &PcmBuffer) -> bool {
        self.position >= buffer.len() as f64
    }
}
