//! Continuous-phase 8-tone synthesis.
//!
//! Each symbol keys one of eight tones spaced 6.25 Hz above the base
//! frequency. Phase is carried by an accumulator across symbol boundaries
//! (no phase reset), the instantaneous frequency is blended linearly over a
//! short window at each transition, and the whole burst gets a
//! raised-cosine amplitude ramp at both ends. The output buffer is always
//! the full 15-second slot, silence-padded past the last symbol.

use std::f32::consts::PI;

use crate::error::{CodecError, Result};
use crate::symbols::NUM_SYMBOLS;
use crate::{NUM_TONES, SAMPLE_RATE, SLOT_SAMPLES, SYMBOL_SAMPLES, TONE_SPACING_HZ};

/// Peak amplitude of the synthesized tone.
const AMPLITUDE: f32 = 0.9;

/// Amplitude ramp length at burst start and end.
const EDGE_RAMP_SAMPLES: usize = 192; // 16 ms

/// Frequency blend window straddling each symbol boundary.
const FREQ_BLEND_SAMPLES: usize = 64;

/// Lowest and highest usable base frequencies: the top tone must stay
/// comfortably below Nyquist.
const MIN_BASE_FREQ: f32 = 100.0;
const MAX_BASE_FREQ: f32 = 5800.0;

pub struct ToneModulator {
    sample_rate: f32,
}

impl ToneModulator {
    pub fn new() -> Self {
        Self {
            sample_rate: SAMPLE_RATE as f32,
        }
    }

    /// Synthesize a 79-symbol frame at `base_freq` into a full slot buffer.
    pub fn synthesize(&self, tones: &[u8; NUM_SYMBOLS], base_freq: f32) -> Result<Vec<f32>> {
        if !(MIN_BASE_FREQ..=MAX_BASE_FREQ).contains(&base_freq) {
            return Err(CodecError::InvalidInputSize);
        }

        let signal_len = NUM_SYMBOLS * SYMBOL_SAMPLES;
        let mut freq = vec![0.0f32; signal_len];
        for (sym, &tone) in tones.iter().enumerate() {
            debug_assert!((tone as usize) < NUM_TONES);
            let f = base_freq + tone as f32 * TONE_SPACING_HZ;
            let start = sym * SYMBOL_SAMPLES;
            freq[start..start + SYMBOL_SAMPLES]
                .iter_mut()
                .for_each(|x| *x = f);
        }

        // Linear frequency blend centered on each boundary keeps the
        // spectrum from splattering at tone steps.
        for sym in 1..NUM_SYMBOLS {
            let prev = base_freq + tones[sym - 1] as f32 * TONE_SPACING_HZ;
            let next = base_freq + tones[sym] as f32 * TONE_SPACING_HZ;
            let boundary = sym * SYMBOL_SAMPLES;
            for k in 0..FREQ_BLEND_SAMPLES {
                let idx = boundary - FREQ_BLEND_SAMPLES / 2 + k;
                let w = (k as f32 + 0.5) / FREQ_BLEND_SAMPLES as f32;
                freq[idx] = prev + (next - prev) * w;
            }
        }

        let mut samples = vec![0.0f32; SLOT_SAMPLES];
        let mut phase = 0.0f32;
        for i in 0..signal_len {
            phase += 2.0 * PI * freq[i] / self.sample_rate;
            if phase > PI {
                phase -= 2.0 * PI;
            }
            samples[i] = AMPLITUDE * phase.sin();
        }

        apply_edge_ramp(&mut samples[..signal_len], EDGE_RAMP_SAMPLES);
        Ok(samples)
    }
}

impl Default for ToneModulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Raised-cosine amplitude ramp over the first and last `ramp_len` samples.
fn apply_edge_ramp(samples: &mut [f32], ramp_len: usize) {
    let ramp = ramp_len.min(samples.len() / 2);
    for k in 0..ramp {
        let w = (PI * (k as f32 + 0.5) / (2.0 * ramp as f32)).sin().powi(2);
        samples[k] *= w;
        let last = samples.len() - 1 - k;
        samples[last] *= w;
    }
}
