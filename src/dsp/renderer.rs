//! Offline renderer. Drives a sampler graph into a PCM buffer, and encodes
//! buffers as WAV.

use tracing::trace;

use crate::config::EngineConfig;
use crate::error::EngineError;

use super::buffer::PcmBuffer;
use super::graph::{RenderContext, Sampler};

/// Number of frames covered by `duration` seconds (truncated).
pub fn frame_count(duration: f64, sample_rate: f64) -> usize {
    (duration * sample_rate) as usize
}

/// Render `duration` seconds of `sampler` against a fresh clock.
pub fn render(config: &EngineConfig, sampler: &Sampler, duration: f64) -> Result<PcmBuffer, EngineError> {
    if !duration.is_finite() || duration < 0.0 {
        return Err(EngineError::InvalidDuration(duration));
    }
    let mut ctx = RenderContext::new(config.sample_rate as f64);
    Ok(render_with(&mut ctx, sampler, duration))
}

/// Render against an existing context. The clock is rewound to 0 first and
/// left one past the last rendered frame.
pub fn render_with(ctx: &mut RenderContext, sampler: &Sampler, duration: f64) -> PcmBuffer {
    ctx.reset();
    let frames = frame_count(duration, ctx.sample_rate());
    trace!(frames, sample_rate = ctx.sample_rate(), "rendering sampler");

    let mut samples = Vec::with_capacity(frames);
    for _ in 0..frames {
        samples.push(sampler.evaluate(ctx) as f32);
        ctx.advance();
    }
    PcmBuffer::new(samples, ctx.sample_rate() as u32)
}

/// Render a buffer to a mono 16-bit PCM WAV file as bytes.
pub fn render_wav(buffer: &PcmBuffer) -> Vec<u8> {
    encode_wav(&buffer.to_i16(), buffer.sample_rate, 1)
}

/// Encode interleaved i16 PCM samples to a WAV byte buffer.
pub fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Vec<u8> {
    let bits_per_sample: u16 = 16;
    let byte_rate = sample_rate * channels as u32 * (bits_per_sample as u32 / 8);
    let block_align = channels * (bits_per_sample / 8);
    let data_size = (samples.len() * 2) as u32;
    let file_size = 36 + data_size;

    let mut buf = Vec::with_capacity(44 + data_size as usize);

    // RIFF header
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&file_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    // fmt chunk
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&bits_per_sample.to_le_bytes());

    // data chunk
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    for &sample in samples {
        buf.extend_from_slice(&sample.to_le_bytes());
    }

    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::envelope::Envelope;
    use crate::dsp::oscillator::{Oscillator, Waveform};

    #[test]
    fn render_length_truncates() {
        let config = EngineConfig::default();
        let buf = render(&config, &Sampler::Constant(0.25), 0.5).unwrap();
        assert_eq!(buf.len(), 22050);
        assert_eq!(buf.sample_rate, 44100);
        assert!(buf.samples.iter().all(|&s| s == 0.25));
    }

    #[test]
    fn negative_duration_rejected() {
        let config = EngineConfig::default();
        assert!(matches!(
            render(&config, &Sampler::Constant(0.0), -1.0),
            Err(EngineError::InvalidDuration(_))
        ));
    }

    #[test]
    fn render_resets_clock() {
        let mut ctx = RenderContext::new(1000.0);
        ctx.advance();
        ctx.advance();
        let buf = render_with(&mut ctx, &Sampler::Constant(1.0), 0.01);
        assert_eq!(buf.len(), 10);
        assert_eq!(ctx.tick(), 10);
    }

    #[test]
    fn enveloped_tone_is_audible_and_ends_silent() {
        let tone = Sampler::product(vec![
            Oscillator::new(Waveform::Triangle, Sampler::constant(330.0)).into_sampler(),
            Envelope::new(0.1, 0.01, 0.05, 0.6, 0.05).into_sampler(),
        ]);
        let buf = render_with(&mut RenderContext::new(22050.0), &tone, 0.3);
        let peak = buf.samples.iter().fold(0.0_f32, |m, s| m.max(s.abs()));
        assert!(peak > 0.3, "Tone should be audible, peak {peak}");
        assert_eq!(*buf.samples.last().unwrap(), 0.0);
    }

    #[test]
    fn wav_header_valid() {
        let buf = PcmBuffer::new(vec![0.0; 100], 44100);
        let wav = render_wav(&buf);

        // Check RIFF header
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(&wav[36..40], b"data");

        // Check sample rate
        let sr = u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]);
        assert_eq!(sr, 44100);

        // Check channels
        let ch = u16::from_le_bytes([wav[22], wav[23]]);
        assert_eq!(ch, 1);
    }

    #[test]
    fn wav_size_correct() {
        let buf = PcmBuffer::new(vec![0.5; 22050], 44100);
        let wav = render_wav(&buf);

        let data_size = u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]);
        assert_eq!(data_size, 44100);
        assert_eq!(wav.len(), 44 + 44100);
    }
}
